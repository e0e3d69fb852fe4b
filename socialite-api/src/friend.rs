use uuid::Uuid;

use crate::{Error, PublicProfile, Time, UserId};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct FriendRequestId(pub Uuid);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendStatus {
    Pending,
    Accepted,
    Rejected,
}

/// One direction of a friendship. An accepted friendship is stored as two
/// edges, `user_id -> friend_id` and `friend_id -> user_id`.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct FriendEdge {
    pub id: FriendRequestId,
    pub user_id: UserId,
    pub friend_id: UserId,
    pub status: FriendStatus,
    pub created_at: Time,
}

impl FriendEdge {
    pub fn now(user_id: UserId, friend_id: UserId, status: FriendStatus) -> FriendEdge {
        FriendEdge {
            id: FriendRequestId(Uuid::new_v4()),
            user_id,
            friend_id,
            status,
            created_at: chrono::Utc::now(),
        }
    }

    /// Moves a pending request to `to`. Only pending requests can be
    /// answered, and only with `Accepted` or `Rejected`.
    pub fn respond(&mut self, to: FriendStatus) -> Result<(), Error> {
        match (self.status, to) {
            (FriendStatus::Pending, FriendStatus::Accepted | FriendStatus::Rejected) => {
                self.status = to;
                Ok(())
            }
            (_, FriendStatus::Pending) => Err(Error::validation(
                "response must be ACCEPTED or REJECTED",
            )),
            (from, _) => Err(Error::validation(format!(
                "friend request was already answered with {from:?}"
            ))),
        }
    }

    pub fn reversed(&self) -> FriendEdge {
        FriendEdge::now(self.friend_id, self.user_id, self.status)
    }

    pub fn involves(&self, a: UserId, b: UserId) -> bool {
        (self.user_id == a && self.friend_id == b) || (self.user_id == b && self.friend_id == a)
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewFriendRequest {
    pub friend_id: UserId,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct FriendResponse {
    pub request_id: FriendRequestId,
    pub response: FriendStatus,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PendingRequest {
    pub request_id: FriendRequestId,
    pub user: PublicProfile,
}

/// Pushed on a user's friend topic
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendEvent {
    NewRequest {
        request_id: FriendRequestId,
        user: Option<PublicProfile>,
    },
    RequestAccepted {
        friend: PublicProfile,
    },
    FriendAdded {
        friend: PublicProfile,
    },
    RequestRejected {
        request_id: FriendRequestId,
    },
    Unfriended {
        user_id: UserId,
        friend_id: UserId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge() -> FriendEdge {
        FriendEdge::now(
            UserId(Uuid::new_v4()),
            UserId(Uuid::new_v4()),
            FriendStatus::Pending,
        )
    }

    #[test]
    fn pending_requests_can_be_answered_once() {
        let mut e = edge();
        e.respond(FriendStatus::Accepted).unwrap();
        assert_eq!(e.status, FriendStatus::Accepted);
        assert!(matches!(
            e.respond(FriendStatus::Rejected),
            Err(Error::Validation(_))
        ));

        let mut e = edge();
        assert!(matches!(
            e.respond(FriendStatus::Pending),
            Err(Error::Validation(_))
        ));
        e.respond(FriendStatus::Rejected).unwrap();
        assert_eq!(e.status, FriendStatus::Rejected);
    }

    #[test]
    fn reversed_edge_swaps_endpoints() {
        let mut e = edge();
        e.respond(FriendStatus::Accepted).unwrap();
        let r = e.reversed();
        assert_eq!((r.user_id, r.friend_id), (e.friend_id, e.user_id));
        assert_eq!(r.status, FriendStatus::Accepted);
        assert_ne!(r.id, e.id);
        assert!(r.involves(e.user_id, e.friend_id));
    }
}
