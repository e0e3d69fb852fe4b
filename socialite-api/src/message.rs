use uuid::Uuid;

use crate::{validate_string, Error, Time, UserId};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct MessageId(pub Uuid);

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub read: bool,
    pub created_at: Time,
}

impl ChatMessage {
    pub fn now(sender_id: UserId, receiver_id: UserId, content: String) -> ChatMessage {
        ChatMessage {
            id: MessageId(Uuid::new_v4()),
            sender_id,
            receiver_id,
            content,
            read: false,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn is_between(&self, a: UserId, b: UserId) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewMessage {
    pub receiver_id: UserId,
    pub content: String,
}

impl NewMessage {
    pub fn validate(&self) -> Result<(), Error> {
        validate_string(&self.content)?;
        if self.content.trim().is_empty() {
            return Err(Error::validation("message content is required"));
        }
        Ok(())
    }
}

/// Number of unread messages received from `sender_id`
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct UnreadCount {
    pub sender_id: UserId,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversations_go_both_ways() {
        let (a, b, c) = (
            UserId(Uuid::new_v4()),
            UserId(Uuid::new_v4()),
            UserId(Uuid::new_v4()),
        );
        let m = ChatMessage::now(a, b, String::from("hi"));
        assert!(m.is_between(a, b));
        assert!(m.is_between(b, a));
        assert!(!m.is_between(a, c));
        assert!(!m.read);
    }

    #[test]
    fn blank_messages_are_rejected() {
        let m = NewMessage {
            receiver_id: UserId::stub(),
            content: String::from("  "),
        };
        assert!(matches!(m.validate(), Err(Error::Validation(_))));
    }
}
