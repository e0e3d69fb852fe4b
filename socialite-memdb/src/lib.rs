use std::collections::HashMap;

use async_trait::async_trait;
use socialite_api::{
    AuthToken, ChatMessage, Db, Error, FriendEdge, FriendRequestId, MessageId, Notification,
    NotificationId, Post, PostId, User, UserId,
};
use tokio::sync::RwLock;

/// In-process store, used by the server's `--in-memory` mode and by tests
#[derive(Default)]
pub struct MemDb(RwLock<Tables>);

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    sessions: HashMap<AuthToken, Session>,
    posts: HashMap<PostId, Post>,
    notifications: HashMap<NotificationId, Notification>,
    friends: HashMap<FriendRequestId, FriendEdge>,
    messages: HashMap<MessageId, ChatMessage>,
}

#[derive(Debug)]
struct Session {
    user: UserId,
    #[allow(dead_code)] // kept for parity with the sql store
    device: String,
}

impl MemDb {
    pub fn new() -> MemDb {
        MemDb::default()
    }

    /// Return the current number of users
    pub async fn test_num_users(&self) -> usize {
        self.0.read().await.users.len()
    }
}

fn newest_first<T>(mut v: Vec<T>, date: impl Fn(&T) -> socialite_api::Time) -> Vec<T> {
    v.sort_by_key(|x| std::cmp::Reverse(date(x)));
    v
}

#[async_trait]
impl Db for MemDb {
    async fn fetch_user(&self, id: UserId) -> anyhow::Result<Option<User>> {
        Ok(self.0.read().await.users.get(&id).cloned())
    }

    async fn fetch_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .0
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn fetch_users(&self) -> anyhow::Result<Vec<User>> {
        let mut res = self
            .0
            .read()
            .await
            .users
            .values()
            .cloned()
            .collect::<Vec<_>>();
        res.sort_by_key(|u| u.created_at);
        Ok(res)
    }

    async fn save_user(&self, user: &User) -> anyhow::Result<()> {
        let mut t = self.0.write().await;
        let taken = t.users.values().any(|u| u.id != user.id && u.email == user.email);
        if taken {
            return Err(Error::EmailAlreadyUsed(user.email.clone()).into());
        }
        t.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> anyhow::Result<()> {
        let mut t = self.0.write().await;
        t.users.remove(&id);
        t.sessions.retain(|_, s| s.user != id);
        Ok(())
    }

    async fn create_session(
        &self,
        token: AuthToken,
        user: UserId,
        device: &str,
    ) -> anyhow::Result<()> {
        self.0.write().await.sessions.insert(
            token,
            Session {
                user,
                device: String::from(device),
            },
        );
        Ok(())
    }

    async fn recover_session(&self, token: AuthToken) -> anyhow::Result<Option<UserId>> {
        Ok(self.0.read().await.sessions.get(&token).map(|s| s.user))
    }

    async fn delete_session(&self, token: AuthToken) -> anyhow::Result<()> {
        self.0.write().await.sessions.remove(&token);
        Ok(())
    }

    async fn fetch_post(&self, id: PostId) -> anyhow::Result<Option<Post>> {
        Ok(self.0.read().await.posts.get(&id).cloned())
    }

    async fn fetch_posts(&self) -> anyhow::Result<Vec<Post>> {
        let posts = self.0.read().await.posts.values().cloned().collect();
        Ok(newest_first(posts, |p| p.created_at))
    }

    async fn fetch_posts_by(&self, author: UserId) -> anyhow::Result<Vec<Post>> {
        let posts = self
            .0
            .read()
            .await
            .posts
            .values()
            .filter(|p| p.author_id == author)
            .cloned()
            .collect();
        Ok(newest_first(posts, |p| p.created_at))
    }

    async fn save_post(&self, post: &Post) -> anyhow::Result<()> {
        self.0.write().await.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn delete_post(&self, id: PostId) -> anyhow::Result<()> {
        self.0.write().await.posts.remove(&id);
        Ok(())
    }

    async fn fetch_notification(
        &self,
        id: NotificationId,
    ) -> anyhow::Result<Option<Notification>> {
        Ok(self.0.read().await.notifications.get(&id).cloned())
    }

    async fn fetch_notifications_for(&self, user: UserId) -> anyhow::Result<Vec<Notification>> {
        let res = self
            .0
            .read()
            .await
            .notifications
            .values()
            .filter(|n| n.recipient_id == user)
            .cloned()
            .collect();
        Ok(newest_first(res, |n| n.created_at))
    }

    async fn save_notification(&self, n: &Notification) -> anyhow::Result<()> {
        self.0.write().await.notifications.insert(n.id, n.clone());
        Ok(())
    }

    async fn delete_notification(&self, id: NotificationId) -> anyhow::Result<()> {
        self.0.write().await.notifications.remove(&id);
        Ok(())
    }

    async fn delete_notifications_for(&self, user: UserId) -> anyhow::Result<()> {
        self.0
            .write()
            .await
            .notifications
            .retain(|_, n| n.recipient_id != user);
        Ok(())
    }

    async fn fetch_friend_edge(&self, id: FriendRequestId) -> anyhow::Result<Option<FriendEdge>> {
        Ok(self.0.read().await.friends.get(&id).cloned())
    }

    async fn fetch_friend_edges_from(&self, user: UserId) -> anyhow::Result<Vec<FriendEdge>> {
        Ok(self
            .0
            .read()
            .await
            .friends
            .values()
            .filter(|e| e.user_id == user)
            .cloned()
            .collect())
    }

    async fn fetch_friend_edges_to(&self, user: UserId) -> anyhow::Result<Vec<FriendEdge>> {
        Ok(self
            .0
            .read()
            .await
            .friends
            .values()
            .filter(|e| e.friend_id == user)
            .cloned()
            .collect())
    }

    async fn save_friend_edge(&self, edge: &FriendEdge) -> anyhow::Result<()> {
        self.0.write().await.friends.insert(edge.id, edge.clone());
        Ok(())
    }

    async fn delete_friend_edge(&self, id: FriendRequestId) -> anyhow::Result<()> {
        self.0.write().await.friends.remove(&id);
        Ok(())
    }

    async fn save_message(&self, m: &ChatMessage) -> anyhow::Result<()> {
        self.0.write().await.messages.insert(m.id, m.clone());
        Ok(())
    }

    async fn fetch_conversation(&self, a: UserId, b: UserId) -> anyhow::Result<Vec<ChatMessage>> {
        let mut res = self
            .0
            .read()
            .await
            .messages
            .values()
            .filter(|m| m.is_between(a, b))
            .cloned()
            .collect::<Vec<_>>();
        res.sort_by_key(|m| m.created_at);
        Ok(res)
    }

    async fn fetch_messages_to(&self, user: UserId) -> anyhow::Result<Vec<ChatMessage>> {
        Ok(self
            .0
            .read()
            .await
            .messages
            .values()
            .filter(|m| m.receiver_id == user)
            .cloned()
            .collect())
    }
}
