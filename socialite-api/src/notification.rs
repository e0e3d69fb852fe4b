use uuid::Uuid;

use crate::{CommentId, FriendRequestId, MessageId, PostId, PublicProfile, Time, UserId};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct NotificationId(pub Uuid);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    FriendRequest,
    FriendAccept,
    Comment,
    Reply,
    Like,
    Message,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub sender_id: UserId,
    pub kind: NotificationKind,
    pub content: String,

    /// Post, comment, friend request or message this is about
    pub entity_id: Uuid,

    pub read: bool,
    pub created_at: Time,
}

/// Something that happened and that may deserve a notification
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NotificationEvent {
    PostLiked {
        owner: UserId,
        liker: UserId,
        post: PostId,
    },
    CommentLiked {
        owner: UserId,
        liker: UserId,
        comment: CommentId,
    },
    Commented {
        post_owner: UserId,
        commenter: UserId,
        comment: CommentId,
    },
    Replied {
        parent_author: UserId,
        replier: UserId,
        reply: CommentId,
    },
    FriendRequested {
        to: UserId,
        from: UserId,
        request: FriendRequestId,
    },
    FriendAccepted {
        requester: UserId,
        accepter: UserId,
        request: FriendRequestId,
    },
    Messaged {
        receiver: UserId,
        sender: UserId,
        message: MessageId,
    },
}

impl NotificationEvent {
    pub fn kind(&self) -> NotificationKind {
        match self {
            NotificationEvent::PostLiked { .. } | NotificationEvent::CommentLiked { .. } => {
                NotificationKind::Like
            }
            NotificationEvent::Commented { .. } => NotificationKind::Comment,
            NotificationEvent::Replied { .. } => NotificationKind::Reply,
            NotificationEvent::FriendRequested { .. } => NotificationKind::FriendRequest,
            NotificationEvent::FriendAccepted { .. } => NotificationKind::FriendAccept,
            NotificationEvent::Messaged { .. } => NotificationKind::Message,
        }
    }

    pub fn recipient(&self) -> UserId {
        match *self {
            NotificationEvent::PostLiked { owner, .. } => owner,
            NotificationEvent::CommentLiked { owner, .. } => owner,
            NotificationEvent::Commented { post_owner, .. } => post_owner,
            NotificationEvent::Replied { parent_author, .. } => parent_author,
            NotificationEvent::FriendRequested { to, .. } => to,
            NotificationEvent::FriendAccepted { requester, .. } => requester,
            NotificationEvent::Messaged { receiver, .. } => receiver,
        }
    }

    pub fn actor(&self) -> UserId {
        match *self {
            NotificationEvent::PostLiked { liker, .. } => liker,
            NotificationEvent::CommentLiked { liker, .. } => liker,
            NotificationEvent::Commented { commenter, .. } => commenter,
            NotificationEvent::Replied { replier, .. } => replier,
            NotificationEvent::FriendRequested { from, .. } => from,
            NotificationEvent::FriendAccepted { accepter, .. } => accepter,
            NotificationEvent::Messaged { sender, .. } => sender,
        }
    }

    pub fn entity_id(&self) -> Uuid {
        match *self {
            NotificationEvent::PostLiked { post, .. } => post.0,
            NotificationEvent::CommentLiked { comment, .. } => comment.0,
            NotificationEvent::Commented { comment, .. } => comment.0,
            NotificationEvent::Replied { reply, .. } => reply.0,
            NotificationEvent::FriendRequested { request, .. } => request.0,
            NotificationEvent::FriendAccepted { request, .. } => request.0,
            NotificationEvent::Messaged { message, .. } => message.0,
        }
    }

    /// Nobody gets notified about their own actions
    pub fn is_suppressed(&self) -> bool {
        self.recipient() == self.actor()
    }

    /// Human-readable sentence, using the actor's name when it is known
    pub fn content(&self, actor: Option<&PublicProfile>) -> String {
        let (action, fallback) = match self {
            NotificationEvent::PostLiked { .. } => ("liked your post", "Someone liked your post"),
            NotificationEvent::CommentLiked { .. } => {
                ("liked your comment", "Someone liked your comment")
            }
            NotificationEvent::Commented { .. } => {
                ("commented on your post", "Someone commented on your post")
            }
            NotificationEvent::Replied { .. } => {
                ("replied to your comment", "Someone replied to your comment")
            }
            NotificationEvent::FriendRequested { .. } => {
                ("sent you a friend request", "You have a new friend request")
            }
            NotificationEvent::FriendAccepted { .. } => (
                "accepted your friend request",
                "Your friend request has been accepted",
            ),
            NotificationEvent::Messaged { .. } => {
                ("sent you a new message", "You have a new message")
            }
        };
        match actor {
            Some(a) => format!("{} {} {}", a.first_name, a.last_name, action),
            None => String::from(fallback),
        }
    }

    /// Builds the notification record, or `None` if it is suppressed
    pub fn to_notification(&self, actor: Option<&PublicProfile>) -> Option<Notification> {
        if self.is_suppressed() {
            return None;
        }
        Some(Notification {
            id: NotificationId(Uuid::new_v4()),
            recipient_id: self.recipient(),
            sender_id: self.actor(),
            kind: self.kind(),
            content: self.content(actor),
            entity_id: self.entity_id(),
            read: false,
            created_at: chrono::Utc::now(),
        })
    }
}
