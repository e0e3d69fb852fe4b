use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Post not found {0}")]
    PostNotFound(Uuid),

    #[error("Comment not found {0}")]
    CommentNotFound(Uuid),

    #[error("Parent comment not found {0}")]
    ParentNotFound(Uuid),

    #[error("User not found {0}")]
    UserNotFound(Uuid),

    #[error("Notification not found {0}")]
    NotificationNotFound(Uuid),

    #[error("Friend request not found {0}")]
    FriendRequestNotFound(Uuid),

    #[error("Replies cannot nest deeper than {0} levels")]
    MaxDepthExceeded(usize),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Email already used {0}")]
    EmailAlreadyUsed(String),

    #[error("Friend request already exists")]
    FriendRequestExists,

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Error {
        Error::Validation(msg.into())
    }

    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::PermissionDenied => StatusCode::FORBIDDEN,
            Error::PostNotFound(_) => StatusCode::NOT_FOUND,
            Error::CommentNotFound(_) => StatusCode::NOT_FOUND,
            Error::ParentNotFound(_) => StatusCode::NOT_FOUND,
            Error::UserNotFound(_) => StatusCode::NOT_FOUND,
            Error::NotificationNotFound(_) => StatusCode::NOT_FOUND,
            Error::FriendRequestNotFound(_) => StatusCode::NOT_FOUND,
            Error::MaxDepthExceeded(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::EmailAlreadyUsed(_) => StatusCode::CONFLICT,
            Error::FriendRequestExists => StatusCode::CONFLICT,
            Error::NullByteInString(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "message": msg,
                "type": "unknown",
            }),
            Error::PermissionDenied => json!({
                "message": "permission denied",
                "type": "permission-denied",
            }),
            Error::PostNotFound(id) => json!({
                "message": "post not found",
                "type": "not-found-post",
                "id": id,
            }),
            Error::CommentNotFound(id) => json!({
                "message": "comment not found",
                "type": "not-found-comment",
                "id": id,
            }),
            Error::ParentNotFound(id) => json!({
                "message": "parent comment not found",
                "type": "not-found-parent",
                "id": id,
            }),
            Error::UserNotFound(id) => json!({
                "message": "user not found",
                "type": "not-found-user",
                "id": id,
            }),
            Error::NotificationNotFound(id) => json!({
                "message": "notification not found",
                "type": "not-found-notification",
                "id": id,
            }),
            Error::FriendRequestNotFound(id) => json!({
                "message": "friend request not found",
                "type": "not-found-friend-request",
                "id": id,
            }),
            Error::MaxDepthExceeded(max) => json!({
                "message": "maximum reply depth reached",
                "type": "max-depth-exceeded",
                "max_depth": max,
            }),
            Error::Validation(msg) => json!({
                "message": msg,
                "type": "validation",
            }),
            Error::EmailAlreadyUsed(email) => json!({
                "message": "email already used",
                "type": "conflict-email",
                "email": email,
            }),
            Error::FriendRequestExists => json!({
                "message": "friend request already exists",
                "type": "conflict-friend-request",
            }),
            Error::NullByteInString(s) => json!({
                "message": "there was a null byte in argument string",
                "type": "null-byte",
                "string": s,
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let id = || {
            data.get("id")
                .and_then(|id| id.as_str())
                .and_then(|id| Uuid::from_str(id).ok())
                .ok_or_else(|| anyhow!("not-found error without a proper id"))
        };
        let string = |field: &str| {
            data.get(field)
                .and_then(|s| s.as_str())
                .map(String::from)
                .ok_or_else(|| anyhow!("error is missing its {field:?} field"))
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(string("message").unwrap_or_default()),
                "permission-denied" => Error::PermissionDenied,
                "not-found-post" => Error::PostNotFound(id()?),
                "not-found-comment" => Error::CommentNotFound(id()?),
                "not-found-parent" => Error::ParentNotFound(id()?),
                "not-found-user" => Error::UserNotFound(id()?),
                "not-found-notification" => Error::NotificationNotFound(id()?),
                "not-found-friend-request" => Error::FriendRequestNotFound(id()?),
                "max-depth-exceeded" => Error::MaxDepthExceeded(
                    data.get("max_depth")
                        .and_then(|d| d.as_u64())
                        .ok_or_else(|| anyhow!("max-depth error without a depth"))?
                        as usize,
                ),
                "validation" => Error::Validation(string("message")?),
                "conflict-email" => Error::EmailAlreadyUsed(string("email")?),
                "conflict-friend-request" => Error::FriendRequestExists,
                "null-byte" => Error::NullByteInString(string("string")?),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_survive_json() {
        let id = Uuid::new_v4();
        for err in [
            Error::Unknown(String::from("boom")),
            Error::PermissionDenied,
            Error::PostNotFound(id),
            Error::ParentNotFound(id),
            Error::MaxDepthExceeded(3),
            Error::Validation(String::from("content is required")),
            Error::EmailAlreadyUsed(String::from("a@b.c")),
            Error::FriendRequestExists,
        ] {
            assert_eq!(Error::parse(&err.contents()).unwrap(), err);
        }
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            Error::MaxDepthExceeded(3).status_code(),
            http::StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Error::CommentNotFound(Uuid::nil()).status_code(),
            http::StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::PermissionDenied.status_code(),
            http::StatusCode::FORBIDDEN
        );
    }
}
