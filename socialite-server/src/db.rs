use anyhow::Context;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use socialite_api::{
    AuthToken, ChatMessage, Db, Error as ApiError, FriendEdge, FriendRequestId, Notification,
    NotificationId, Post, PostId, Time, User, UserId, Uuid,
};
use sqlx::{types::Json, Row};

const UNIQUE_VIOLATION: &str = "23505";

fn is_unique_violation(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION)
    )
}

/// Postgres-backed store. Each collection is a table of JSON documents, see
/// the migrations for the layout.
pub struct PgDb(sqlx::PgPool);

impl PgDb {
    pub fn new(pool: sqlx::PgPool) -> PgDb {
        PgDb(pool)
    }

    async fn fetch_one<T: DeserializeOwned + Send + Unpin>(
        &self,
        table: &'static str,
        id: Uuid,
    ) -> anyhow::Result<Option<T>> {
        sqlx::query(&format!("SELECT body FROM {table} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.0)
            .await
            .with_context(|| format!("querying {table} for {id:?}"))?
            .map(|row| row.try_get::<Json<T>, _>("body").map(|b| b.0))
            .transpose()
            .with_context(|| format!("parsing body of {table} {id:?}"))
    }

    /// Runs `query`, which must select a `body` column, binding `ids` in order
    async fn fetch_many<T: DeserializeOwned + Send + Unpin>(
        &self,
        table: &'static str,
        query: &str,
        ids: &[Uuid],
    ) -> anyhow::Result<Vec<T>> {
        let mut q = sqlx::query(query);
        for id in ids {
            q = q.bind(*id);
        }
        q.fetch_all(&self.0)
            .await
            .with_context(|| format!("querying {table} with {ids:?}"))?
            .into_iter()
            .map(|row| {
                row.try_get::<Json<T>, _>("body")
                    .map(|b| b.0)
                    .with_context(|| format!("parsing a body of {table}"))
            })
            .collect()
    }

    async fn upsert<T: Serialize + Sync>(
        &self,
        table: &'static str,
        id: Uuid,
        created_at: Time,
        body: &T,
    ) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "
                INSERT INTO {table} (id, created_at, body)
                VALUES ($1, $2, $3)
                ON CONFLICT (id) DO UPDATE SET body = EXCLUDED.body
            "
        ))
        .bind(id)
        .bind(created_at)
        .bind(Json(body))
        .execute(&self.0)
        .await
        .with_context(|| format!("upserting {table} {id:?}"))?;
        Ok(())
    }

    async fn delete(&self, table: &'static str, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
            .bind(id)
            .execute(&self.0)
            .await
            .with_context(|| format!("deleting {table} {id:?}"))?;
        Ok(())
    }
}

#[async_trait]
impl Db for PgDb {
    async fn fetch_user(&self, id: UserId) -> anyhow::Result<Option<User>> {
        self.fetch_one("users", id.0).await
    }

    async fn fetch_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        sqlx::query("SELECT body FROM users WHERE body->>'email' = $1")
            .bind(email)
            .fetch_optional(&self.0)
            .await
            .with_context(|| format!("querying users for email {email:?}"))?
            .map(|row| row.try_get::<Json<User>, _>("body").map(|b| b.0))
            .transpose()
            .context("parsing user body")
    }

    async fn fetch_users(&self) -> anyhow::Result<Vec<User>> {
        self.fetch_many("users", "SELECT body FROM users ORDER BY created_at", &[])
            .await
    }

    async fn save_user(&self, user: &User) -> anyhow::Result<()> {
        let res = self.upsert("users", user.id.0, user.created_at, user).await;
        match res {
            // the only unique index left once ON CONFLICT (id) applies is users_email
            Err(e) if is_unique_violation(&e) => Err(anyhow::Error::new(
                ApiError::EmailAlreadyUsed(user.email.clone()),
            )),
            res => res,
        }
    }

    async fn delete_user(&self, id: UserId) -> anyhow::Result<()> {
        // sessions go away through ON DELETE CASCADE
        self.delete("users", id.0).await
    }

    async fn create_session(
        &self,
        token: AuthToken,
        user: UserId,
        device: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, device, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(token.0)
        .bind(user.0)
        .bind(device)
        .bind(chrono::Utc::now())
        .execute(&self.0)
        .await
        .with_context(|| format!("creating session for {user:?}"))?;
        Ok(())
    }

    async fn recover_session(&self, token: AuthToken) -> anyhow::Result<Option<UserId>> {
        sqlx::query("SELECT user_id FROM sessions WHERE id = $1")
            .bind(token.0)
            .fetch_optional(&self.0)
            .await
            .context("querying sessions table")?
            .map(|row| row.try_get("user_id").map(UserId))
            .transpose()
            .context("retrieving the user_id field")
    }

    async fn delete_session(&self, token: AuthToken) -> anyhow::Result<()> {
        self.delete("sessions", token.0).await
    }

    async fn fetch_post(&self, id: PostId) -> anyhow::Result<Option<Post>> {
        self.fetch_one("posts", id.0).await
    }

    async fn fetch_posts(&self) -> anyhow::Result<Vec<Post>> {
        self.fetch_many("posts", "SELECT body FROM posts ORDER BY created_at DESC", &[])
            .await
    }

    async fn fetch_posts_by(&self, author: UserId) -> anyhow::Result<Vec<Post>> {
        self.fetch_many(
            "posts",
            "
                SELECT body FROM posts
                WHERE (body->>'author_id')::uuid = $1
                ORDER BY created_at DESC
            ",
            &[author.0],
        )
        .await
    }

    async fn save_post(&self, post: &Post) -> anyhow::Result<()> {
        self.upsert("posts", post.id.0, post.created_at, post).await
    }

    async fn delete_post(&self, id: PostId) -> anyhow::Result<()> {
        self.delete("posts", id.0).await
    }

    async fn fetch_notification(
        &self,
        id: NotificationId,
    ) -> anyhow::Result<Option<Notification>> {
        self.fetch_one("notifications", id.0).await
    }

    async fn fetch_notifications_for(&self, user: UserId) -> anyhow::Result<Vec<Notification>> {
        self.fetch_many(
            "notifications",
            "
                SELECT body FROM notifications
                WHERE (body->>'recipient_id')::uuid = $1
                ORDER BY created_at DESC
            ",
            &[user.0],
        )
        .await
    }

    async fn save_notification(&self, n: &Notification) -> anyhow::Result<()> {
        self.upsert("notifications", n.id.0, n.created_at, n).await
    }

    async fn delete_notification(&self, id: NotificationId) -> anyhow::Result<()> {
        self.delete("notifications", id.0).await
    }

    async fn delete_notifications_for(&self, user: UserId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM notifications WHERE (body->>'recipient_id')::uuid = $1")
            .bind(user.0)
            .execute(&self.0)
            .await
            .with_context(|| format!("deleting notifications of {user:?}"))?;
        Ok(())
    }

    async fn fetch_friend_edge(&self, id: FriendRequestId) -> anyhow::Result<Option<FriendEdge>> {
        self.fetch_one("friend_edges", id.0).await
    }

    async fn fetch_friend_edges_from(&self, user: UserId) -> anyhow::Result<Vec<FriendEdge>> {
        self.fetch_many(
            "friend_edges",
            "SELECT body FROM friend_edges WHERE (body->>'user_id')::uuid = $1",
            &[user.0],
        )
        .await
    }

    async fn fetch_friend_edges_to(&self, user: UserId) -> anyhow::Result<Vec<FriendEdge>> {
        self.fetch_many(
            "friend_edges",
            "SELECT body FROM friend_edges WHERE (body->>'friend_id')::uuid = $1",
            &[user.0],
        )
        .await
    }

    async fn save_friend_edge(&self, edge: &FriendEdge) -> anyhow::Result<()> {
        self.upsert("friend_edges", edge.id.0, edge.created_at, edge)
            .await
    }

    async fn delete_friend_edge(&self, id: FriendRequestId) -> anyhow::Result<()> {
        self.delete("friend_edges", id.0).await
    }

    async fn save_message(&self, m: &ChatMessage) -> anyhow::Result<()> {
        self.upsert("messages", m.id.0, m.created_at, m).await
    }

    async fn fetch_conversation(&self, a: UserId, b: UserId) -> anyhow::Result<Vec<ChatMessage>> {
        self.fetch_many(
            "messages",
            "
                SELECT body FROM messages
                WHERE ((body->>'sender_id')::uuid = $1 AND (body->>'receiver_id')::uuid = $2)
                   OR ((body->>'sender_id')::uuid = $2 AND (body->>'receiver_id')::uuid = $1)
                ORDER BY created_at
            ",
            &[a.0, b.0],
        )
        .await
    }

    async fn fetch_messages_to(&self, user: UserId) -> anyhow::Result<Vec<ChatMessage>> {
        self.fetch_many(
            "messages",
            "SELECT body FROM messages WHERE (body->>'receiver_id')::uuid = $1",
            &[user.0],
        )
        .await
    }
}
