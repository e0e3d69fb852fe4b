use std::{ops::Deref, sync::Arc};

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{self, request},
};
use socialite_api::{AuthToken, Db, Role, UserId, Uuid};

use crate::{Config, Error, Feeds, PostLocks, RequestLocks};

#[derive(Clone, axum::extract::FromRef)]
pub struct AppState {
    pub db: DbPool,
    pub feeds: Feeds,
    pub locks: PostLocks,
    pub request_locks: RequestLocks,
    pub config: Config,
}

#[derive(Clone)]
pub struct DbPool(Arc<dyn Db>);

impl DbPool {
    pub fn new(db: Arc<dyn Db>) -> DbPool {
        DbPool(db)
    }
}

impl Deref for DbPool {
    type Target = dyn Db;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

pub struct PreAuth(pub AuthToken);

#[async_trait]
impl<S: Sync> FromRequestParts<S> for PreAuth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, _state: &S) -> Result<PreAuth, Error> {
        match req.headers.get(http::header::AUTHORIZATION) {
            None => Err(Error::permission_denied()),
            Some(auth) => {
                let auth = auth.to_str().map_err(|_| Error::permission_denied())?;
                let mut auth = auth.split(' ');
                if !auth
                    .next()
                    .ok_or(Error::permission_denied())?
                    .eq_ignore_ascii_case("bearer")
                {
                    return Err(Error::permission_denied());
                }
                let token = auth.next().ok_or(Error::permission_denied())?;
                if auth.next().is_some() {
                    return Err(Error::permission_denied());
                }
                let token = Uuid::try_from(token).map_err(|_| Error::permission_denied())?;
                Ok(PreAuth(AuthToken(token)))
            }
        }
    }
}

/// The user owning the request's session
pub struct Auth(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for Auth {
    type Rejection = Error;

    async fn from_request_parts(req: &mut request::Parts, state: &AppState) -> Result<Auth, Error> {
        let token = PreAuth::from_request_parts(req, state).await?.0;
        let user = state
            .db
            .recover_session(token)
            .await?
            .ok_or(Error::permission_denied())?;
        Ok(Auth(user))
    }
}

/// A session user, along with whether it holds the admin role
pub struct RoleAuth {
    pub user: UserId,
    pub is_admin: bool,
}

#[async_trait]
impl FromRequestParts<AppState> for RoleAuth {
    type Rejection = Error;

    async fn from_request_parts(
        req: &mut request::Parts,
        state: &AppState,
    ) -> Result<RoleAuth, Error> {
        let Auth(user) = Auth::from_request_parts(req, state).await?;
        let role = state
            .db
            .fetch_user(user)
            .await?
            .map(|u| u.role)
            .ok_or(Error::permission_denied())?;
        Ok(RoleAuth {
            user,
            is_admin: role == Role::Admin,
        })
    }
}

/// Requests carrying the server's admin token
pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = Error;

    async fn from_request_parts(
        req: &mut request::Parts,
        state: &AppState,
    ) -> Result<AdminAuth, Error> {
        let token = PreAuth::from_request_parts(req, state).await?.0;
        if Some(token) == state.config.admin_token {
            Ok(AdminAuth)
        } else {
            Err(Error::permission_denied())
        }
    }
}
