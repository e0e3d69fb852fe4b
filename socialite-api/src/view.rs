//! Read-side projections: posts and comments with their authors' profiles
//! copied in, so that clients can render them without further lookups.

use std::collections::{HashMap, HashSet};

use crate::{
    Comment, CommentForest, CommentId, Post, PostId, Privacy, PublicProfile, Time, UserId,
};

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<PublicProfile>,
    pub replies: Vec<CommentView>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PostView {
    pub id: PostId,
    pub author_id: UserId,
    pub author: Option<PublicProfile>,
    pub content: String,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub likes: Vec<UserId>,
    pub privacy: Privacy,
    pub original_post_id: Option<PostId>,
    pub original_post: Option<Box<PostView>>,
    pub comments: Vec<CommentView>,
    pub comment_count: usize,
    pub created_at: Time,
    pub updated_at: Option<Time>,
}

/// A comment found by id, along with the post holding it
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentLocation {
    pub post_id: PostId,
    pub comment: CommentView,
}

impl Post {
    /// Users whose profile is needed to render this post
    pub fn referenced_users(&self) -> HashSet<UserId> {
        let mut res = HashSet::new();
        res.insert(self.author_id);
        res.extend(self.comments.preorder().into_iter().map(|c| c.author_id));
        res
    }
}

fn comment_views(
    forest: &CommentForest,
    comments: impl Iterator<Item = CommentId>,
    profiles: &HashMap<UserId, PublicProfile>,
) -> Vec<CommentView> {
    comments
        .filter_map(|id| forest.find(id))
        .map(|c| CommentView {
            comment: c.clone(),
            author: profiles.get(&c.author_id).cloned(),
            replies: comment_views(
                forest,
                Box::new(forest.replies(c.id).map(|r| r.id))
                    as Box<dyn Iterator<Item = CommentId> + '_>,
                profiles,
            ),
        })
        .collect()
}

impl PostView {
    /// `original` is the already-built view of the shared post, if any.
    /// Authors missing from `profiles` are left as `None`.
    pub fn build(
        post: &Post,
        original: Option<PostView>,
        profiles: &HashMap<UserId, PublicProfile>,
    ) -> PostView {
        PostView {
            id: post.id,
            author_id: post.author_id,
            author: profiles.get(&post.author_id).cloned(),
            content: post.content.clone(),
            images: post.images.clone(),
            videos: post.videos.clone(),
            likes: post.likes.clone(),
            privacy: post.privacy,
            original_post_id: post.original_post_id,
            original_post: original.map(Box::new),
            comments: comment_views(
                &post.comments,
                post.comments.roots().map(|c| c.id),
                profiles,
            ),
            comment_count: post.comments.len(),
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }

    pub fn find_comment(&self, id: CommentId) -> Option<&CommentView> {
        fn find_in(comments: &[CommentView], id: CommentId) -> Option<&CommentView> {
            for c in comments {
                if c.comment.id == id {
                    return Some(c);
                }
                if let Some(res) = find_in(&c.replies, id) {
                    return Some(res);
                }
            }
            None
        }
        find_in(&self.comments, id)
    }
}
