use async_trait::async_trait;

use crate::{
    AuthToken, ChatMessage, FriendEdge, FriendRequestId, Notification, NotificationId, Post,
    PostId, User, UserId,
};

/// Document store backing the server.
///
/// Lookups return `Ok(None)` for missing rows; `Err` is kept for storage
/// failures. `save_*` methods upsert by id.
#[async_trait]
pub trait Db: Send + Sync {
    async fn fetch_user(&self, id: UserId) -> anyhow::Result<Option<User>>;
    async fn fetch_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn fetch_users(&self) -> anyhow::Result<Vec<User>>;
    async fn save_user(&self, user: &User) -> anyhow::Result<()>;
    async fn delete_user(&self, id: UserId) -> anyhow::Result<()>;

    async fn create_session(
        &self,
        token: AuthToken,
        user: UserId,
        device: &str,
    ) -> anyhow::Result<()>;
    async fn recover_session(&self, token: AuthToken) -> anyhow::Result<Option<UserId>>;
    async fn delete_session(&self, token: AuthToken) -> anyhow::Result<()>;

    async fn fetch_post(&self, id: PostId) -> anyhow::Result<Option<Post>>;
    /// Newest first
    async fn fetch_posts(&self) -> anyhow::Result<Vec<Post>>;
    /// Newest first
    async fn fetch_posts_by(&self, author: UserId) -> anyhow::Result<Vec<Post>>;
    async fn save_post(&self, post: &Post) -> anyhow::Result<()>;
    async fn delete_post(&self, id: PostId) -> anyhow::Result<()>;

    async fn fetch_notification(&self, id: NotificationId)
        -> anyhow::Result<Option<Notification>>;
    /// Newest first
    async fn fetch_notifications_for(&self, user: UserId) -> anyhow::Result<Vec<Notification>>;
    async fn save_notification(&self, n: &Notification) -> anyhow::Result<()>;
    async fn delete_notification(&self, id: NotificationId) -> anyhow::Result<()>;
    async fn delete_notifications_for(&self, user: UserId) -> anyhow::Result<()>;

    async fn fetch_friend_edge(&self, id: FriendRequestId) -> anyhow::Result<Option<FriendEdge>>;
    /// Edges whose `user_id` is `user`
    async fn fetch_friend_edges_from(&self, user: UserId) -> anyhow::Result<Vec<FriendEdge>>;
    /// Edges whose `friend_id` is `user`
    async fn fetch_friend_edges_to(&self, user: UserId) -> anyhow::Result<Vec<FriendEdge>>;
    async fn save_friend_edge(&self, edge: &FriendEdge) -> anyhow::Result<()>;
    async fn delete_friend_edge(&self, id: FriendRequestId) -> anyhow::Result<()>;

    async fn save_message(&self, m: &ChatMessage) -> anyhow::Result<()>;
    /// Oldest first
    async fn fetch_conversation(&self, a: UserId, b: UserId) -> anyhow::Result<Vec<ChatMessage>>;
    async fn fetch_messages_to(&self, user: UserId) -> anyhow::Result<Vec<ChatMessage>>;
}
