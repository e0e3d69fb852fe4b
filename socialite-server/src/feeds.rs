use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use axum::extract::ws::Message;
use futures::{channel::mpsc, select, SinkExt, StreamExt};
use socialite_api::{FeedMessage, Topic, UserId, Uuid};
use tokio::sync::RwLock;

/// Publish side of the websocket feeds. Delivery is best-effort: messages
/// published to a topic nobody listens on are dropped.
#[async_trait]
pub trait Broadcast: Send + Sync {
    async fn publish(&self, topic: Topic, msg: FeedMessage);
}

type Subscribers = HashMap<Uuid, mpsc::UnboundedSender<FeedMessage>>;

#[derive(Clone, Debug, Default)]
pub struct Feeds(Arc<RwLock<HashMap<Topic, Subscribers>>>);

#[async_trait]
impl Broadcast for Feeds {
    async fn publish(&self, topic: Topic, msg: FeedMessage) {
        if let Some(socks) = self.0.read().await.get(&topic) {
            for s in socks.values() {
                let _ = s.unbounded_send(msg.clone());
            }
        }
    }
}

enum ClientCommand {
    Ping,
    Subscribe(Topic),
    Unsubscribe(Topic),
}

fn parse_command(msg: &str) -> Option<ClientCommand> {
    if msg == "ping" {
        return Some(ClientCommand::Ping);
    }
    let (cmd, topic) = msg.split_once(' ')?;
    // only post topics are open to everyone
    let topic = match topic.parse::<Topic>().ok()? {
        t @ Topic::Post(_) => t,
        _ => return None,
    };
    match cmd {
        "subscribe" => Some(ClientCommand::Subscribe(topic)),
        "unsubscribe" => Some(ClientCommand::Unsubscribe(topic)),
        _ => None,
    }
}

impl Feeds {
    pub fn new() -> Feeds {
        Feeds::default()
    }

    async fn subscribe(
        &self,
        topic: Topic,
        socket: Uuid,
        sender: mpsc::UnboundedSender<FeedMessage>,
    ) {
        self.0
            .write()
            .await
            .entry(topic)
            .or_insert_with(HashMap::new)
            .insert(socket, sender);
    }

    async fn unsubscribe(&self, topic: Topic, socket: Uuid) {
        let mut feeds = self.0.write().await;
        if let Some(socks) = feeds.get_mut(&topic) {
            socks.remove(&socket);
            if socks.is_empty() {
                feeds.remove(&topic);
            }
        }
    }

    #[cfg(test)]
    pub async fn num_topics(&self) -> usize {
        self.0.read().await.len()
    }

    pub async fn add_for_user<W, R>(self, user: UserId, mut write: W, read: R)
    where
        W: 'static + Send + Unpin + futures::Sink<Message>,
        <W as futures::Sink<Message>>::Error: Send,
        R: 'static + Send + Unpin + futures::Stream<Item = Result<Message, axum::Error>>,
    {
        // Note: if this were bounded, there would be a deadlock between the write-lock to remove a channel and the read-lock to publish to all interested sockets
        let (sender, mut receiver) = mpsc::unbounded();
        let socket = Uuid::new_v4();

        let mut topics = HashSet::new();
        for t in Topic::for_user(user) {
            self.subscribe(t, socket, sender.clone()).await;
            topics.insert(t);
        }

        let this = self.clone();
        let mut read = read.fuse();
        tokio::spawn(async move {
            macro_rules! remove_self {
                () => {{
                    for t in topics.iter() {
                        this.unsubscribe(*t, socket).await;
                    }
                    tracing::debug!(?user, "feed websocket disconnected");
                    return;
                }};
            }
            macro_rules! send_message {
                ( $msg:expr ) => {{
                    let msg: FeedMessage = $msg;
                    let json = match serde_json::to_string(&msg) {
                        Ok(json) => json,
                        Err(err) => {
                            tracing::error!(?err, ?msg, "failed serializing message to json");
                            continue;
                        }
                    };
                    if write.send(Message::Text(json)).await.is_err() {
                        remove_self!();
                    }
                }};
            }
            loop {
                select! {
                    msg = receiver.next() => match msg {
                        None => remove_self!(),
                        Some(msg) => send_message!(msg),
                    },
                    msg = read.next() => match msg {
                        None => remove_self!(),
                        Some(Ok(Message::Close(_))) => remove_self!(),
                        Some(Ok(Message::Text(msg))) => match parse_command(&msg) {
                            Some(ClientCommand::Ping) => send_message!(FeedMessage::Pong),
                            Some(ClientCommand::Subscribe(t)) => {
                                this.subscribe(t, socket, sender.clone()).await;
                                topics.insert(t);
                            }
                            Some(ClientCommand::Unsubscribe(t)) => {
                                this.unsubscribe(t, socket).await;
                                topics.remove(&t);
                            }
                            None => {
                                tracing::warn!("received unexpected message from client: {msg:?}");
                                remove_self!();
                            }
                        },
                        Some(msg) => {
                            tracing::warn!("received unexpected message from client: {msg:?}");
                            remove_self!();
                        }
                    },
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use socialite_api::{FriendEvent, PostId};

    use super::*;

    struct Client {
        to_server: mpsc::UnboundedSender<Result<Message, axum::Error>>,
        from_server: mpsc::UnboundedReceiver<Message>,
    }

    impl Client {
        async fn connect(feeds: &Feeds, user: UserId) -> Client {
            let (write, from_server) = mpsc::unbounded();
            let (to_server, read) = mpsc::unbounded();
            feeds.clone().add_for_user(user, write, read).await;
            Client {
                to_server,
                from_server,
            }
        }

        fn send(&self, msg: &str) {
            self.to_server
                .unbounded_send(Ok(Message::Text(String::from(msg))))
                .unwrap();
        }

        async fn recv(&mut self) -> FeedMessage {
            match self.from_server.next().await {
                Some(Message::Text(json)) => serde_json::from_str(&json).unwrap(),
                other => panic!("unexpected message from server: {other:?}"),
            }
        }

        /// Waits until all previously sent commands have been processed
        async fn sync(&mut self) {
            self.send("ping");
            assert!(matches!(self.recv().await, FeedMessage::Pong));
        }
    }

    #[tokio::test]
    async fn user_topics_are_joined_on_connect() {
        let feeds = Feeds::new();
        let user = UserId(Uuid::new_v4());
        let mut client = Client::connect(&feeds, user).await;

        let event = FriendEvent::Unfriended {
            user_id: UserId::stub(),
            friend_id: user,
        };
        feeds
            .publish(Topic::Friends(user), FeedMessage::Friend(event.clone()))
            .await;
        match client.recv().await {
            FeedMessage::Friend(e) => assert_eq!(e, event),
            other => panic!("unexpected message {other:?}"),
        }

        // other users' topics stay silent
        feeds
            .publish(
                Topic::Friends(UserId::stub()),
                FeedMessage::Friend(event.clone()),
            )
            .await;
        client.sync().await;
    }

    #[tokio::test]
    async fn post_topics_need_subscription() {
        let feeds = Feeds::new();
        let post = PostId::new();
        let mut client = Client::connect(&feeds, UserId(Uuid::new_v4())).await;

        feeds
            .publish(Topic::Post(post), FeedMessage::PostDeleted(post))
            .await;
        client.send(&format!("subscribe posts/{}", post.0));
        client.sync().await;

        feeds
            .publish(Topic::Post(post), FeedMessage::PostDeleted(post))
            .await;
        assert!(matches!(client.recv().await, FeedMessage::PostDeleted(p) if p == post));

        client.send(&format!("unsubscribe posts/{}", post.0));
        client.sync().await;
        feeds
            .publish(Topic::Post(post), FeedMessage::PostDeleted(post))
            .await;
        client.sync().await;
    }

    #[tokio::test]
    async fn garbage_closes_the_socket() {
        let feeds = Feeds::new();
        let user = UserId(Uuid::new_v4());
        let mut client = Client::connect(&feeds, user).await;
        assert_eq!(feeds.num_topics().await, 3);

        // subscribing to another user's notifications is not allowed
        client.send(&format!("subscribe notifications/{}", Uuid::new_v4()));
        assert!(client.from_server.next().await.is_none());
        assert_eq!(feeds.num_topics().await, 0);
    }
}
