mod comment;
mod db;
mod error;
mod feed;
mod friend;
mod message;
mod notification;
mod post;
mod user;
mod view;

pub use comment::*;
pub use db::Db;
pub use error::Error;
pub use feed::*;
pub use friend::*;
pub use message::*;
pub use notification::*;
pub use post::*;
pub use user::*;
pub use view::*;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<chrono::Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

/// Default for how deep replies may nest, root comments being at depth 0
pub const DEFAULT_MAX_REPLY_DEPTH: usize = 3;

pub fn validate_string(s: &str) -> Result<(), Error> {
    if s.contains('\0') {
        return Err(Error::NullByteInString(String::from(s)));
    }
    Ok(())
}

/// Removes `item` from `v` if present, pushes it otherwise. Returns whether
/// `item` is in `v` afterwards.
pub fn toggle<T: PartialEq>(v: &mut Vec<T>, item: T) -> bool {
    match v.iter().position(|x| *x == item) {
        Some(i) => {
            v.remove(i);
            false
        }
        None => {
            v.push(item);
            true
        }
    }
}
