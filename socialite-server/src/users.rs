use anyhow::Context;
use socialite_api::{
    Account, AuthToken, Error as ApiError, NewSession, NewUser, ProfileUpdate, PublicProfile,
    Role, Session, User, UserId, Uuid,
};

use crate::{Ctx, Error};

#[cfg(not(test))]
const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;
// tests don't need to pay for strong hashes
#[cfg(test)]
const BCRYPT_COST: u32 = 4;

async fn hash_password(password: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST))
        .await
        .context("joining password hashing task")?
        .context("hashing password")
}

async fn verify_password(password: String, hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context("joining password verification task")?
        .context("verifying password")
}

async fn fetch(ctx: &Ctx<'_>, id: UserId) -> Result<User, Error> {
    Ok(ctx
        .db
        .fetch_user(id)
        .await
        .with_context(|| format!("fetching user {id:?}"))?
        .ok_or(ApiError::UserNotFound(id.0))?)
}

/// Saves `user`, surfacing a store-side email clash as `EmailAlreadyUsed`
async fn save(ctx: &Ctx<'_>, user: &User) -> Result<(), Error> {
    ctx.db.save_user(user).await.map_err(|e| match e.downcast::<ApiError>() {
        Ok(api) => Error::Api(api),
        Err(e) => Error::Anyhow(e.context(format!("saving user {:?}", user.id))),
    })
}

/// Creates an account, without opening a session
pub async fn create(ctx: &Ctx<'_>, data: NewUser, role: Role) -> Result<Account, Error> {
    data.validate()?;
    let email = data.email.trim().to_lowercase();
    if ctx
        .db
        .fetch_user_by_email(&email)
        .await
        .context("checking email availability")?
        .is_some()
    {
        return Err(ApiError::EmailAlreadyUsed(email).into());
    }
    let user = User {
        id: UserId(Uuid::new_v4()),
        email,
        password_hash: hash_password(data.password).await?,
        first_name: data.first_name,
        last_name: data.last_name,
        birthday: data.birthday,
        gender: data.gender,
        bio: None,
        avatar: None,
        cover_photo: None,
        role,
        created_at: chrono::Utc::now(),
    };
    save(ctx, &user).await?;
    tracing::info!(user=?user.id, "created user");
    Ok(user.account())
}

async fn open_session(ctx: &Ctx<'_>, user: Account, device: &str) -> Result<Session, Error> {
    let token = AuthToken(Uuid::new_v4());
    ctx.db
        .create_session(token, user.id, device)
        .await
        .with_context(|| format!("opening session for {:?}", user.id))?;
    Ok(Session { token, user })
}

pub async fn register(ctx: &Ctx<'_>, data: NewUser) -> Result<Session, Error> {
    let account = create(ctx, data, Role::User).await?;
    open_session(ctx, account, "").await
}

pub async fn login(ctx: &Ctx<'_>, data: NewSession) -> Result<Session, Error> {
    data.validate()?;
    let user = ctx
        .db
        .fetch_user_by_email(&data.email.trim().to_lowercase())
        .await
        .context("looking user up by email")?
        .ok_or(Error::permission_denied())?;
    if !verify_password(data.password, user.password_hash.clone()).await? {
        return Err(Error::permission_denied());
    }
    open_session(ctx, user.account(), &data.device).await
}

pub async fn logout(ctx: &Ctx<'_>, token: AuthToken) -> Result<(), Error> {
    if ctx.db.recover_session(token).await?.is_none() {
        return Err(Error::permission_denied());
    }
    ctx.db
        .delete_session(token)
        .await
        .context("deleting session")?;
    Ok(())
}

pub async fn whoami(ctx: &Ctx<'_>, user: UserId) -> Result<Account, Error> {
    Ok(fetch(ctx, user).await?.account())
}

pub async fn list(ctx: &Ctx<'_>) -> Result<Vec<PublicProfile>, Error> {
    Ok(ctx
        .db
        .fetch_users()
        .await
        .context("listing users")?
        .iter()
        .map(User::profile)
        .collect())
}

pub async fn list_accounts(ctx: &Ctx<'_>) -> Result<Vec<Account>, Error> {
    Ok(ctx
        .db
        .fetch_users()
        .await
        .context("listing users")?
        .iter()
        .map(User::account)
        .collect())
}

pub async fn profile(ctx: &Ctx<'_>, id: UserId) -> Result<Account, Error> {
    Ok(fetch(ctx, id).await?.account())
}

pub async fn update_profile(
    ctx: &Ctx<'_>,
    user: UserId,
    mut data: ProfileUpdate,
) -> Result<Account, Error> {
    data.validate()?;
    let mut u = fetch(ctx, user).await?;
    if let Some(email) = data.email.take() {
        let email = email.trim().to_lowercase();
        if email != u.email {
            if ctx
                .db
                .fetch_user_by_email(&email)
                .await
                .context("checking email availability")?
                .is_some()
            {
                return Err(ApiError::EmailAlreadyUsed(email).into());
            }
            u.email = email;
        }
    }
    data.apply_to(&mut u);
    save(ctx, &u).await?;
    Ok(u.account())
}

pub async fn delete(
    ctx: &Ctx<'_>,
    user: UserId,
    is_admin: bool,
    target: UserId,
) -> Result<(), Error> {
    if user != target && !is_admin {
        return Err(Error::permission_denied());
    }
    fetch(ctx, target).await?;
    ctx.db
        .delete_user(target)
        .await
        .with_context(|| format!("deleting user {target:?}"))?;
    tracing::info!(user=?target, by=?user, "deleted user");
    Ok(())
}
