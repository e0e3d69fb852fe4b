use uuid::Uuid;

use crate::{validate_string, CommentForest, Error, Time, UserId};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct PostId(pub Uuid);

impl PostId {
    pub fn new() -> PostId {
        PostId(Uuid::new_v4())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Privacy {
    Public,
    Private,
}

impl Default for Privacy {
    fn default() -> Privacy {
        Privacy::Public
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub comments: CommentForest,
    #[serde(default)]
    pub likes: Vec<UserId>,
    #[serde(default)]
    pub privacy: Privacy,

    /// Set once when the post is a share, never modified afterwards
    pub original_post_id: Option<PostId>,

    pub created_at: Time,
    pub updated_at: Option<Time>,
}

impl Post {
    pub fn now(author_id: UserId, new: NewPost) -> Post {
        Post {
            id: PostId::new(),
            author_id,
            content: new.content,
            images: new.images,
            videos: new.videos,
            comments: CommentForest::new(),
            likes: Vec::new(),
            privacy: new.privacy,
            original_post_id: None,
            created_at: chrono::Utc::now(),
            updated_at: None,
        }
    }

    pub fn is_share(&self) -> bool {
        self.original_post_id.is_some()
    }

    pub fn is_visible_to(&self, viewer: UserId) -> bool {
        self.privacy == Privacy::Public || self.author_id == viewer
    }

    /// Adds `user` to the likes if absent, removes it otherwise. Returns
    /// whether the post is now liked by `user`.
    pub fn toggle_like(&mut self, user: UserId) -> bool {
        crate::toggle(&mut self.likes, user)
    }
}

fn validate_media(urls: &[String]) -> Result<(), Error> {
    for u in urls {
        validate_string(u)?;
        if u.trim().is_empty() {
            return Err(Error::validation("media urls cannot be empty"));
        }
    }
    Ok(())
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct NewPost {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub privacy: Privacy,
}

impl NewPost {
    pub fn validate(&self) -> Result<(), Error> {
        validate_string(&self.content)?;
        validate_media(&self.images)?;
        validate_media(&self.videos)?;
        if self.content.trim().is_empty() && self.images.is_empty() && self.videos.is_empty() {
            return Err(Error::validation("a post needs content or media"));
        }
        Ok(())
    }
}

/// Fields left to `None` are not modified
#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
pub struct PostUpdate {
    pub content: Option<String>,
    pub images: Option<Vec<String>>,
    pub videos: Option<Vec<String>>,
    pub privacy: Option<Privacy>,
}

impl PostUpdate {
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(c) = &self.content {
            validate_string(c)?;
        }
        for urls in self.images.iter().chain(self.videos.iter()) {
            validate_media(urls)?;
        }
        Ok(())
    }

    pub fn apply_to(self, post: &mut Post) -> Result<(), Error> {
        let edits_content =
            self.content.is_some() || self.images.is_some() || self.videos.is_some();
        if post.is_share() && edits_content {
            return Err(Error::validation("shared posts cannot be edited"));
        }
        if let Some(c) = self.content {
            post.content = c;
        }
        if let Some(i) = self.images {
            post.images = i;
        }
        if let Some(v) = self.videos {
            post.videos = v;
        }
        if let Some(p) = self.privacy {
            post.privacy = p;
        }
        if !post.is_share()
            && post.content.trim().is_empty()
            && post.images.is_empty()
            && post.videos.is_empty()
        {
            return Err(Error::validation("a post needs content or media"));
        }
        post.updated_at = Some(chrono::Utc::now());
        Ok(())
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct SharePost {
    pub original_post_id: PostId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub privacy: Privacy,
}

impl SharePost {
    pub fn validate(&self) -> Result<(), Error> {
        validate_string(&self.content)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LikeStatus {
    pub liked: bool,
    pub likes: usize,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct PostSearch {
    pub query: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> Post {
        Post::now(
            UserId::stub(),
            NewPost {
                content: String::from("first!"),
                ..Default::default()
            },
        )
    }

    #[test]
    fn like_toggle_round_trips() {
        let mut p = post();
        p.likes.push(UserId(Uuid::new_v4()));
        let before = p.likes.clone();
        let u = UserId(Uuid::new_v4());
        assert!(p.toggle_like(u));
        assert_eq!(p.likes.len(), 2);
        assert!(!p.toggle_like(u));
        assert_eq!(p.likes, before);
    }

    #[test]
    fn empty_posts_are_rejected() {
        assert!(matches!(
            NewPost::default().validate(),
            Err(Error::Validation(_))
        ));
        let with_image = NewPost {
            images: vec![String::from("/uploads/1_cat.png")],
            ..Default::default()
        };
        assert_eq!(with_image.validate(), Ok(()));
    }

    #[test]
    fn shares_cannot_be_edited() {
        let mut p = post();
        p.original_post_id = Some(PostId::new());
        let res = PostUpdate {
            content: Some(String::from("edited")),
            ..Default::default()
        }
        .apply_to(&mut p);
        assert!(matches!(res, Err(Error::Validation(_))));
        assert_eq!(p.content, "first!");

        // privacy stays adjustable
        PostUpdate {
            privacy: Some(Privacy::Private),
            ..Default::default()
        }
        .apply_to(&mut p)
        .unwrap();
        assert_eq!(p.privacy, Privacy::Private);
    }

    #[test]
    fn private_posts_are_only_visible_to_their_author() {
        let mut p = post();
        p.privacy = Privacy::Private;
        assert!(p.is_visible_to(p.author_id));
        assert!(!p.is_visible_to(UserId(Uuid::new_v4())));
    }
}
