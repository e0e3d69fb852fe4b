//! Posts and their comment threads.
//!
//! Every mutation follows the same pipeline: lock the post, load it, run all
//! checks, mutate the in-memory document, save it whole, populate it,
//! broadcast it on the post's topic, dispatch notifications, and return the
//! populated post. Checks never run after the document has been touched, so
//! a failed request leaves the stored post unchanged.

use anyhow::Context;
use socialite_api::{
    Comment, CommentId, CommentLocation, Error as ApiError, FeedMessage, LikeStatus, NewComment,
    NewPost, NotificationEvent, Post, PostId, PostUpdate, PostView, SharePost, Topic, UserId,
};

use crate::{
    friends, notifications,
    populate::{populate, populate_all},
    Ctx, Error,
};

async fn fetch(ctx: &Ctx<'_>, id: PostId) -> Result<Post, Error> {
    Ok(ctx
        .db
        .fetch_post(id)
        .await
        .with_context(|| format!("fetching post {id:?}"))?
        .ok_or(ApiError::PostNotFound(id.0))?)
}

/// Like `fetch`, but hides private posts from anyone but their author
async fn fetch_visible(ctx: &Ctx<'_>, id: PostId, viewer: UserId) -> Result<Post, Error> {
    let post = fetch(ctx, id).await?;
    if !post.is_visible_to(viewer) {
        return Err(Error::permission_denied());
    }
    Ok(post)
}

/// Saves `post`, then pushes its populated version on its topic
async fn save_and_broadcast(ctx: &Ctx<'_>, post: &Post) -> Result<PostView, Error> {
    ctx.db
        .save_post(post)
        .await
        .with_context(|| format!("saving post {:?}", post.id))?;
    let view = populate(ctx.db, post).await?;
    ctx.feeds
        .publish(Topic::Post(post.id), FeedMessage::PostUpdated(view.clone()))
        .await;
    Ok(view)
}

/// Pushes a freshly published post to the author's friends
async fn fan_out(ctx: &Ctx<'_>, view: &PostView) {
    let friends = match friends::friend_ids(ctx.db, view.author_id).await {
        Ok(f) => f,
        Err(err) => {
            tracing::error!(?err, post=?view.id, "failed listing friends for new post fan-out");
            return;
        }
    };
    for f in friends {
        ctx.feeds
            .publish(Topic::Friends(f), FeedMessage::NewPost(view.clone()))
            .await;
    }
}

pub async fn create(ctx: &Ctx<'_>, author: UserId, data: NewPost) -> Result<PostView, Error> {
    data.validate()?;
    let post = Post::now(author, data);
    ctx.db
        .save_post(&post)
        .await
        .with_context(|| format!("saving new post {:?}", post.id))?;
    let view = populate(ctx.db, &post).await?;
    fan_out(ctx, &view).await;
    Ok(view)
}

pub async fn list(ctx: &Ctx<'_>, viewer: UserId) -> Result<Vec<PostView>, Error> {
    let posts = ctx.db.fetch_posts().await.context("listing posts")?;
    let visible = posts
        .into_iter()
        .filter(|p| p.is_visible_to(viewer))
        .collect::<Vec<_>>();
    Ok(populate_all(ctx.db, &visible).await?)
}

pub async fn list_by(
    ctx: &Ctx<'_>,
    viewer: UserId,
    author: UserId,
) -> Result<Vec<PostView>, Error> {
    let posts = ctx
        .db
        .fetch_posts_by(author)
        .await
        .with_context(|| format!("listing posts of {author:?}"))?;
    let visible = posts
        .into_iter()
        .filter(|p| p.is_visible_to(viewer))
        .collect::<Vec<_>>();
    Ok(populate_all(ctx.db, &visible).await?)
}

pub async fn get(ctx: &Ctx<'_>, viewer: UserId, id: PostId) -> Result<PostView, Error> {
    let post = fetch_visible(ctx, id, viewer).await?;
    Ok(populate(ctx.db, &post).await?)
}

/// Case-insensitive substring search over the content of visible posts
pub async fn search(ctx: &Ctx<'_>, viewer: UserId, query: &str) -> Result<Vec<PostView>, Error> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let posts = ctx.db.fetch_posts().await.context("listing posts")?;
    let found = posts
        .into_iter()
        .filter(|p| p.is_visible_to(viewer) && p.content.to_lowercase().contains(&query))
        .collect::<Vec<_>>();
    Ok(populate_all(ctx.db, &found).await?)
}

pub async fn update(
    ctx: &Ctx<'_>,
    user: UserId,
    id: PostId,
    data: PostUpdate,
) -> Result<PostView, Error> {
    data.validate()?;
    let _lock = ctx.locks.lock(id).await;
    let mut post = fetch(ctx, id).await?;
    if post.author_id != user {
        return Err(Error::permission_denied());
    }
    data.apply_to(&mut post)?;
    save_and_broadcast(ctx, &post).await
}

pub async fn delete(ctx: &Ctx<'_>, user: UserId, is_admin: bool, id: PostId) -> Result<(), Error> {
    let _lock = ctx.locks.lock(id).await;
    let post = fetch(ctx, id).await?;
    if post.author_id != user && !is_admin {
        return Err(Error::permission_denied());
    }
    ctx.db
        .delete_post(id)
        .await
        .with_context(|| format!("deleting post {id:?}"))?;
    ctx.feeds
        .publish(Topic::Post(id), FeedMessage::PostDeleted(id))
        .await;
    Ok(())
}

/// Creates a new post of `user` referencing the root of the shared post
pub async fn share(ctx: &Ctx<'_>, user: UserId, data: SharePost) -> Result<PostView, Error> {
    data.validate()?;
    let mut original = fetch(ctx, data.original_post_id).await?;
    if let Some(root) = original.original_post_id {
        original = fetch(ctx, root).await?;
    }
    if !original.is_visible_to(user) {
        return Err(Error::permission_denied());
    }
    let mut post = Post::now(
        user,
        NewPost {
            content: data.content,
            privacy: data.privacy,
            ..NewPost::default()
        },
    );
    post.original_post_id = Some(original.id);
    ctx.db
        .save_post(&post)
        .await
        .with_context(|| format!("saving share {:?}", post.id))?;
    let view = populate(ctx.db, &post).await?;
    fan_out(ctx, &view).await;
    Ok(view)
}

pub async fn toggle_like(ctx: &Ctx<'_>, user: UserId, id: PostId) -> Result<LikeStatus, Error> {
    let _lock = ctx.locks.lock(id).await;
    let mut post = fetch_visible(ctx, id, user).await?;
    let liked = post.toggle_like(user);
    save_and_broadcast(ctx, &post).await?;
    if liked {
        notifications::dispatch(
            ctx,
            NotificationEvent::PostLiked {
                owner: post.author_id,
                liker: user,
                post: id,
            },
        )
        .await;
    }
    Ok(LikeStatus {
        liked,
        likes: post.likes.len(),
    })
}

/// Adds a root comment, or a reply when `data.parent_id` is set
pub async fn add_comment(
    ctx: &Ctx<'_>,
    user: UserId,
    id: PostId,
    data: NewComment,
) -> Result<PostView, Error> {
    data.validate()?;
    let _lock = ctx.locks.lock(id).await;
    let mut post = fetch_visible(ctx, id, user).await?;

    let parent_author = match data.parent_id {
        None => None,
        Some(parent) => {
            post.comments.check_reply(parent, ctx.max_reply_depth)?;
            post.comments.find(parent).map(|p| p.author_id)
        }
    };

    let comment = Comment::now(user, data.content, data.parent_id);
    let comment_id = comment.id;
    post.comments.attach(comment)?;
    let view = save_and_broadcast(ctx, &post).await?;

    let event = match parent_author {
        None => NotificationEvent::Commented {
            post_owner: post.author_id,
            commenter: user,
            comment: comment_id,
        },
        Some(parent_author) => NotificationEvent::Replied {
            parent_author,
            replier: user,
            reply: comment_id,
        },
    };
    notifications::dispatch(ctx, event).await;
    Ok(view)
}

pub async fn toggle_comment_like(
    ctx: &Ctx<'_>,
    user: UserId,
    id: PostId,
    comment: CommentId,
) -> Result<LikeStatus, Error> {
    let _lock = ctx.locks.lock(id).await;
    let mut post = fetch_visible(ctx, id, user).await?;
    let liked = post
        .comments
        .toggle_like(comment, user)
        .ok_or(ApiError::CommentNotFound(comment.0))?;
    let (owner, likes) = post
        .comments
        .find(comment)
        .map(|c| (c.author_id, c.likes.len()))
        .ok_or(ApiError::CommentNotFound(comment.0))?;
    save_and_broadcast(ctx, &post).await?;
    if liked {
        notifications::dispatch(
            ctx,
            NotificationEvent::CommentLiked {
                owner,
                liker: user,
                comment,
            },
        )
        .await;
    }
    Ok(LikeStatus { liked, likes })
}

/// Removes a comment along with all its replies
pub async fn delete_comment(
    ctx: &Ctx<'_>,
    user: UserId,
    is_admin: bool,
    id: PostId,
    comment: CommentId,
) -> Result<PostView, Error> {
    let _lock = ctx.locks.lock(id).await;
    let mut post = fetch(ctx, id).await?;
    let author = post
        .comments
        .find(comment)
        .map(|c| c.author_id)
        .ok_or(ApiError::CommentNotFound(comment.0))?;
    if author != user && !is_admin {
        return Err(Error::permission_denied());
    }
    let removed = post
        .comments
        .remove(comment)
        .ok_or(ApiError::CommentNotFound(comment.0))?;
    tracing::debug!(post=?id, ?comment, removed=removed.len(), "deleted comment subtree");
    save_and_broadcast(ctx, &post).await
}

/// Looks `comment` up across all posts `viewer` can see
pub async fn find_comment(
    ctx: &Ctx<'_>,
    viewer: UserId,
    comment: CommentId,
) -> Result<CommentLocation, Error> {
    let posts = ctx.db.fetch_posts().await.context("listing posts")?;
    for post in posts {
        if post.comments.find(comment).is_some() {
            if !post.is_visible_to(viewer) {
                return Err(Error::permission_denied());
            }
            let view = populate(ctx.db, &post).await?;
            if let Some(c) = view.find_comment(comment) {
                return Ok(CommentLocation {
                    post_id: post.id,
                    comment: c.clone(),
                });
            }
        }
    }
    Err(ApiError::CommentNotFound(comment.0).into())
}
