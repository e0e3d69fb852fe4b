use std::collections::HashMap;

use uuid::Uuid;

use crate::{validate_string, Error, Time, UserId};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn new() -> CommentId {
        CommentId(Uuid::new_v4())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub author_id: UserId,
    pub content: String,
    pub created_at: Time,

    /// `None` for comments attached directly to the post
    pub parent_id: Option<CommentId>,

    #[serde(default)]
    pub likes: Vec<UserId>,
}

impl Comment {
    pub fn now(author_id: UserId, content: String, parent_id: Option<CommentId>) -> Comment {
        Comment {
            id: CommentId::new(),
            author_id,
            content,
            created_at: chrono::Utc::now(),
            parent_id,
            likes: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub content: String,

    /// Comment being replied to, if any
    #[serde(default)]
    pub parent_id: Option<CommentId>,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), Error> {
        validate_string(&self.content)?;
        if self.content.trim().is_empty() {
            return Err(Error::validation("comment content is required"));
        }
        Ok(())
    }
}

/// Nested form of a comment, as stored in documents and sent to clients
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,

    #[serde(default)]
    pub replies: Vec<CommentNode>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Slot {
    comment: Comment,
    replies: Vec<CommentId>,
}

/// The comment threads of a post.
///
/// Comments live in an arena keyed by id. Sibling order is kept in the
/// `roots` list and in each slot's `replies` list. Ids are unique: both
/// `attach` and deserialization reject duplicates, so a lookup by id returns
/// the same comment a depth-first pre-order search would.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "Vec<CommentNode>", into = "Vec<CommentNode>")]
pub struct CommentForest {
    slots: HashMap<CommentId, Slot>,
    roots: Vec<CommentId>,
}

impl CommentForest {
    pub fn new() -> CommentForest {
        CommentForest::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn find(&self, id: CommentId) -> Option<&Comment> {
        self.slots.get(&id).map(|s| &s.comment)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Comment> {
        self.roots.iter().filter_map(|id| self.find(*id))
    }

    pub fn replies(&self, id: CommentId) -> impl Iterator<Item = &Comment> {
        self.slots
            .get(&id)
            .map(|s| &s.replies[..])
            .unwrap_or(&[])
            .iter()
            .filter_map(|id| self.find(*id))
    }

    /// Number of hops from `id` up to its root comment, or `None` if `id` is
    /// not in the forest. A dangling parent link counts as reaching the root.
    pub fn depth(&self, id: CommentId) -> Option<usize> {
        let mut current = self.find(id)?;
        let mut depth = 0;
        // parent links only ever point to comments attached earlier, so this
        // terminates; the bound only guards against a corrupted arena
        while let Some(parent) = current.parent_id.and_then(|p| self.find(p)) {
            if depth >= self.slots.len() {
                break;
            }
            depth += 1;
            current = parent;
        }
        Some(depth)
    }

    /// Checks that a reply to `parent` is allowed, returning its future depth
    pub fn check_reply(&self, parent: CommentId, max_depth: usize) -> Result<usize, Error> {
        let parent_depth = self.depth(parent).ok_or(Error::ParentNotFound(parent.0))?;
        if parent_depth >= max_depth {
            return Err(Error::MaxDepthExceeded(max_depth));
        }
        Ok(parent_depth + 1)
    }

    /// Appends `comment` to its parent's replies, or to the roots if it has
    /// no parent
    pub fn attach(&mut self, comment: Comment) -> Result<(), Error> {
        if self.slots.contains_key(&comment.id) {
            return Err(Error::validation(format!(
                "comment id {} is already used",
                comment.id.0
            )));
        }
        match comment.parent_id {
            None => self.roots.push(comment.id),
            Some(parent) => self
                .slots
                .get_mut(&parent)
                .ok_or(Error::ParentNotFound(parent.0))?
                .replies
                .push(comment.id),
        }
        self.slots.insert(
            comment.id,
            Slot {
                comment,
                replies: Vec::new(),
            },
        );
        Ok(())
    }

    /// Detaches `id` from its parent and drops its whole subtree, returning
    /// the removed comments in pre-order
    pub fn remove(&mut self, id: CommentId) -> Option<Vec<Comment>> {
        let parent_id = self.find(id)?.parent_id;
        let siblings = match parent_id.and_then(|p| self.slots.get_mut(&p)) {
            Some(parent) => &mut parent.replies,
            None => &mut self.roots,
        };
        siblings.retain(|c| *c != id);

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(slot) = self.slots.remove(&id) {
                stack.extend(slot.replies.iter().rev());
                removed.push(slot.comment);
            }
        }
        Some(removed)
    }

    /// Adds `user` to the likes of comment `id` if absent, removes it if
    /// present. Returns whether the comment is now liked by `user`.
    pub fn toggle_like(&mut self, id: CommentId, user: UserId) -> Option<bool> {
        let slot = self.slots.get_mut(&id)?;
        Some(crate::toggle(&mut slot.comment.likes, user))
    }

    /// All comments, depth-first, replies before the next sibling
    pub fn preorder(&self) -> Vec<&Comment> {
        let mut res = Vec::with_capacity(self.slots.len());
        let mut stack = self.roots.iter().rev().collect::<Vec<_>>();
        while let Some(id) = stack.pop() {
            if let Some(slot) = self.slots.get(id) {
                res.push(&slot.comment);
                stack.extend(slot.replies.iter().rev());
            }
        }
        res
    }

    pub fn to_nodes(&self) -> Vec<CommentNode> {
        self.roots.iter().filter_map(|id| self.node(*id)).collect()
    }

    fn node(&self, id: CommentId) -> Option<CommentNode> {
        let slot = self.slots.get(&id)?;
        Some(CommentNode {
            comment: slot.comment.clone(),
            replies: slot.replies.iter().filter_map(|r| self.node(*r)).collect(),
        })
    }
}

impl TryFrom<Vec<CommentNode>> for CommentForest {
    type Error = Error;

    fn try_from(nodes: Vec<CommentNode>) -> Result<CommentForest, Error> {
        let mut forest = CommentForest::new();
        // the structure is authoritative over any stored parent_id
        let mut stack = nodes
            .into_iter()
            .rev()
            .map(|n| (None, n))
            .collect::<Vec<_>>();
        while let Some((parent_id, node)) = stack.pop() {
            let CommentNode {
                mut comment,
                replies,
            } = node;
            comment.parent_id = parent_id;
            let id = comment.id;
            forest.attach(comment)?;
            stack.extend(replies.into_iter().rev().map(|r| (Some(id), r)));
        }
        Ok(forest)
    }
}

impl From<CommentForest> for Vec<CommentNode> {
    fn from(forest: CommentForest) -> Vec<CommentNode> {
        forest.to_nodes()
    }
}
