use axum::{
    extract::{ws::Message, Multipart, Path, Query, State, WebSocketUpgrade},
    Json,
};
use futures::{SinkExt, StreamExt};
use socialite_api::{
    Account, AuthToken, ChatMessage, CommentId, CommentLocation, FriendEdge, FriendResponse,
    LikeStatus, NewAccount, NewComment, NewFriendRequest, NewMessage, NewPost, NewSession, NewUser,
    Notification, NotificationId, PendingRequest, PostId, PostSearch, PostUpdate, PostView,
    ProfileUpdate, PublicProfile, Session, SharePost, UnreadCount, UserId, Uuid,
};

use crate::{
    extractors::*, friends, messages, notifications, posts, uploads, users, Error, Feeds,
};

pub async fn register(
    State(state): State<AppState>,
    Json(data): Json<NewUser>,
) -> Result<Json<Session>, Error> {
    Ok(Json(users::register(&state.ctx(), data).await?))
}

pub async fn login(
    State(state): State<AppState>,
    Json(data): Json<NewSession>,
) -> Result<Json<Session>, Error> {
    Ok(Json(users::login(&state.ctx(), data).await?))
}

pub async fn logout(PreAuth(token): PreAuth, State(state): State<AppState>) -> Result<(), Error> {
    users::logout(&state.ctx(), token).await
}

pub async fn whoami(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Account>, Error> {
    Ok(Json(users::whoami(&state.ctx(), user).await?))
}

pub async fn admin_create_user(
    AdminAuth: AdminAuth,
    State(state): State<AppState>,
    Json(data): Json<NewAccount>,
) -> Result<Json<Account>, Error> {
    Ok(Json(users::create(&state.ctx(), data.user, data.role).await?))
}

pub async fn admin_list_users(
    AdminAuth: AdminAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Account>>, Error> {
    Ok(Json(users::list_accounts(&state.ctx()).await?))
}

pub async fn list_users(
    Auth(_): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicProfile>>, Error> {
    Ok(Json(users::list(&state.ctx()).await?))
}

pub async fn get_profile(
    Auth(_): Auth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Account>, Error> {
    Ok(Json(users::profile(&state.ctx(), UserId(id)).await?))
}

pub async fn update_profile(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(data): Json<ProfileUpdate>,
) -> Result<Json<Account>, Error> {
    Ok(Json(users::update_profile(&state.ctx(), user, data).await?))
}

pub async fn delete_user(
    auth: RoleAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(), Error> {
    users::delete(&state.ctx(), auth.user, auth.is_admin, UserId(id)).await
}

pub async fn list_posts(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<PostView>>, Error> {
    Ok(Json(posts::list(&state.ctx(), user).await?))
}

pub async fn create_post(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(data): Json<NewPost>,
) -> Result<Json<PostView>, Error> {
    Ok(Json(posts::create(&state.ctx(), user, data).await?))
}

pub async fn share_post(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(data): Json<SharePost>,
) -> Result<Json<PostView>, Error> {
    Ok(Json(posts::share(&state.ctx(), user, data).await?))
}

pub async fn search_posts(
    Auth(user): Auth,
    State(state): State<AppState>,
    Query(search): Query<PostSearch>,
) -> Result<Json<Vec<PostView>>, Error> {
    Ok(Json(posts::search(&state.ctx(), user, &search.query).await?))
}

pub async fn list_user_posts(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PostView>>, Error> {
    Ok(Json(posts::list_by(&state.ctx(), user, UserId(id)).await?))
}

pub async fn get_post(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PostView>, Error> {
    Ok(Json(posts::get(&state.ctx(), user, PostId(id)).await?))
}

pub async fn update_post(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(data): Json<PostUpdate>,
) -> Result<Json<PostView>, Error> {
    Ok(Json(posts::update(&state.ctx(), user, PostId(id), data).await?))
}

pub async fn delete_post(
    auth: RoleAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(), Error> {
    posts::delete(&state.ctx(), auth.user, auth.is_admin, PostId(id)).await
}

pub async fn like_post(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LikeStatus>, Error> {
    Ok(Json(posts::toggle_like(&state.ctx(), user, PostId(id)).await?))
}

pub async fn add_comment(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(data): Json<NewComment>,
) -> Result<Json<PostView>, Error> {
    Ok(Json(
        posts::add_comment(&state.ctx(), user, PostId(id), data).await?,
    ))
}

pub async fn delete_comment(
    auth: RoleAuth,
    State(state): State<AppState>,
    Path((id, comment)): Path<(Uuid, Uuid)>,
) -> Result<Json<PostView>, Error> {
    Ok(Json(
        posts::delete_comment(
            &state.ctx(),
            auth.user,
            auth.is_admin,
            PostId(id),
            CommentId(comment),
        )
        .await?,
    ))
}

pub async fn like_comment(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path((id, comment)): Path<(Uuid, Uuid)>,
) -> Result<Json<LikeStatus>, Error> {
    Ok(Json(
        posts::toggle_comment_like(&state.ctx(), user, PostId(id), CommentId(comment)).await?,
    ))
}

pub async fn get_comment(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(comment): Path<Uuid>,
) -> Result<Json<CommentLocation>, Error> {
    Ok(Json(
        posts::find_comment(&state.ctx(), user, CommentId(comment)).await?,
    ))
}

pub async fn list_friends(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicProfile>>, Error> {
    Ok(Json(friends::list(&state.ctx(), user).await?))
}

pub async fn send_friend_request(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(data): Json<NewFriendRequest>,
) -> Result<Json<FriendEdge>, Error> {
    Ok(Json(
        friends::send_request(&state.ctx(), user, data.friend_id).await?,
    ))
}

pub async fn respond_friend_request(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(data): Json<FriendResponse>,
) -> Result<Json<FriendEdge>, Error> {
    Ok(Json(friends::respond(&state.ctx(), user, data).await?))
}

pub async fn pending_friend_requests(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<PendingRequest>>, Error> {
    Ok(Json(friends::pending(&state.ctx(), user).await?))
}

pub async fn friend_suggestions(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicProfile>>, Error> {
    Ok(Json(friends::suggestions(&state.ctx(), user).await?))
}

pub async fn unfriend(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(friend): Path<Uuid>,
) -> Result<(), Error> {
    friends::unfriend(&state.ctx(), user, UserId(friend)).await
}

pub async fn list_notifications(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Notification>>, Error> {
    Ok(Json(notifications::list(&state.ctx(), user).await?))
}

pub async fn unread_notifications(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<usize>, Error> {
    Ok(Json(notifications::unread_count(&state.ctx(), user).await?))
}

pub async fn mark_notification_read(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, Error> {
    Ok(Json(
        notifications::mark_read(&state.ctx(), user, NotificationId(id)).await?,
    ))
}

pub async fn mark_all_notifications_read(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<(), Error> {
    notifications::mark_all_read(&state.ctx(), user).await
}

pub async fn delete_notification(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(), Error> {
    notifications::delete(&state.ctx(), user, NotificationId(id)).await
}

pub async fn delete_all_notifications(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<(), Error> {
    notifications::delete_all(&state.ctx(), user).await
}

pub async fn send_message(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(data): Json<NewMessage>,
) -> Result<Json<ChatMessage>, Error> {
    Ok(Json(messages::send(&state.ctx(), user, data).await?))
}

pub async fn conversation(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(other): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, Error> {
    Ok(Json(
        messages::conversation(&state.ctx(), user, UserId(other)).await?,
    ))
}

pub async fn mark_conversation_read(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(other): Path<Uuid>,
) -> Result<Json<usize>, Error> {
    Ok(Json(
        messages::mark_read(&state.ctx(), user, UserId(other)).await?,
    ))
}

pub async fn unread_messages(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<UnreadCount>>, Error> {
    Ok(Json(messages::unread_counts(&state.ctx(), user).await?))
}

pub async fn upload(
    Auth(user): Auth,
    State(state): State<AppState>,
    form: Multipart,
) -> Result<Json<Vec<String>>, Error> {
    let urls = uploads::store_all(&state.config.upload_dir, form).await?;
    tracing::debug!(?user, count = urls.len(), "handled upload");
    Ok(Json(urls))
}

pub async fn feed(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<axum::response::Response, Error> {
    Ok(ws.on_upgrade(move |sock| {
        let (write, read) = sock.split();
        feed_impl(write, read, state.db, state.feeds)
    }))
}

/// Authenticates a feed websocket, then hands it over to `feeds`
///
/// The client must first send its session token as a text frame. The server
/// answers "ok" and starts relaying, or "permission denied" and hangs up.
pub async fn feed_impl<W, R>(mut write: W, mut read: R, db: DbPool, feeds: Feeds)
where
    W: 'static + Send + Unpin + futures::Sink<Message>,
    <W as futures::Sink<Message>>::Error: Send,
    R: 'static + Send + Unpin + futures::Stream<Item = Result<Message, axum::Error>>,
{
    tracing::debug!("feed websocket connected");
    if let Some(Ok(Message::Text(token))) = read.next().await {
        if let Ok(token) = Uuid::try_from(&token as &str) {
            if let Ok(Some(user)) = db.recover_session(AuthToken(token)).await {
                if write.send(Message::Text(String::from("ok"))).await.is_ok() {
                    tracing::debug!(?user, "feed websocket auth success");
                    feeds.add_for_user(user, write, read).await;
                    return;
                }
            }
        }
        tracing::debug!(?token, "feed websocket auth failure");
        let _ = write
            .send(Message::Text(String::from("permission denied")))
            .await;
    }
}
