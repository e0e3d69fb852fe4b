use std::{fmt, str::FromStr};

use anyhow::{anyhow, Context};
use uuid::Uuid;

use crate::{ChatMessage, FriendEvent, Notification, PostId, PostView, PublicProfile, UserId};

/// Broadcast channel name. Post topics are open to anyone who subscribes,
/// user topics only to that user's sockets.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Topic {
    Post(PostId),
    Notifications(UserId),
    Friends(UserId),
    Messages(UserId),
}

impl Topic {
    pub fn for_user(user: UserId) -> [Topic; 3] {
        [
            Topic::Notifications(user),
            Topic::Friends(user),
            Topic::Messages(user),
        ]
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Post(p) => write!(f, "posts/{}", p.0),
            Topic::Notifications(u) => write!(f, "notifications/{}", u.0),
            Topic::Friends(u) => write!(f, "friends/{}", u.0),
            Topic::Messages(u) => write!(f, "messages/{}", u.0),
        }
    }
}

impl FromStr for Topic {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Topic> {
        let (kind, id) = s
            .split_once('/')
            .ok_or_else(|| anyhow!("topic {s:?} has no '/'"))?;
        let id = Uuid::try_parse(id).with_context(|| format!("parsing id of topic {s:?}"))?;
        Ok(match kind {
            "posts" => Topic::Post(PostId(id)),
            "notifications" => Topic::Notifications(UserId(id)),
            "friends" => Topic::Friends(UserId(id)),
            "messages" => Topic::Messages(UserId(id)),
            _ => return Err(anyhow!("unknown topic kind {kind:?}")),
        })
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub enum FeedMessage {
    Pong,
    PostUpdated(PostView),
    PostDeleted(PostId),
    NewPost(PostView),
    Notification {
        notification: Notification,
        sender: Option<PublicProfile>,
    },
    Friend(FriendEvent),
    Message(ChatMessage),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_parse_back() {
        let id = Uuid::new_v4();
        for t in [
            Topic::Post(PostId(id)),
            Topic::Notifications(UserId(id)),
            Topic::Friends(UserId(id)),
            Topic::Messages(UserId(id)),
        ] {
            assert_eq!(t.to_string().parse::<Topic>().unwrap(), t);
        }
        assert_eq!(
            format!("posts/{id}").parse::<Topic>().unwrap(),
            Topic::Post(PostId(id))
        );
        assert!("posts".parse::<Topic>().is_err());
        assert!("walls/00000000-0000-0000-0000-000000000000"
            .parse::<Topic>()
            .is_err());
    }
}
