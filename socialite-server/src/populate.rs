use std::collections::HashMap;

use anyhow::Context;
use async_recursion::async_recursion;
use socialite_api::{Db, Post, PostView, PublicProfile, UserId};

/// Shares only ever point to root posts, this only bounds corrupted data
const MAX_SHARE_CHAIN: usize = 4;

pub async fn profiles_for(
    db: &dyn Db,
    users: impl IntoIterator<Item = UserId>,
) -> anyhow::Result<HashMap<UserId, PublicProfile>> {
    let mut res = HashMap::new();
    for u in users {
        if res.contains_key(&u) {
            continue;
        }
        if let Some(user) = db
            .fetch_user(u)
            .await
            .with_context(|| format!("fetching profile of {u:?}"))?
        {
            res.insert(u, user.profile());
        }
    }
    Ok(res)
}

pub async fn profile_of(db: &dyn Db, user: UserId) -> anyhow::Result<Option<PublicProfile>> {
    Ok(db
        .fetch_user(user)
        .await
        .with_context(|| format!("fetching profile of {user:?}"))?
        .map(|u| u.profile()))
}

/// Copies the author profiles onto the post, its comments, and the post it
/// shares if any
pub async fn populate(db: &dyn Db, post: &Post) -> anyhow::Result<PostView> {
    populate_chain(db, post, MAX_SHARE_CHAIN).await
}

#[async_recursion]
async fn populate_chain(db: &dyn Db, post: &Post, hops_left: usize) -> anyhow::Result<PostView> {
    let original = match post.original_post_id {
        Some(id) if hops_left > 0 => match db
            .fetch_post(id)
            .await
            .with_context(|| format!("fetching original post {id:?}"))?
        {
            Some(original) => Some(populate_chain(db, &original, hops_left - 1).await?),
            None => None,
        },
        _ => None,
    };
    let profiles = profiles_for(db, post.referenced_users()).await?;
    Ok(PostView::build(post, original, &profiles))
}

pub async fn populate_all(db: &dyn Db, posts: &[Post]) -> anyhow::Result<Vec<PostView>> {
    let mut res = Vec::with_capacity(posts.len());
    for p in posts {
        res.push(populate(db, p).await?);
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use socialite_api::{Comment, NewPost};
    use socialite_memdb::MemDb;

    use super::*;
    use crate::tests::user;

    #[tokio::test]
    async fn shares_carry_their_populated_original() {
        let db = MemDb::new();
        let (alice, bob) = (user("Alice"), user("Bob"));
        db.save_user(&alice).await.unwrap();
        db.save_user(&bob).await.unwrap();

        let mut original = Post::now(
            alice.id,
            NewPost {
                content: String::from("hello"),
                ..Default::default()
            },
        );
        original
            .comments
            .attach(Comment::now(bob.id, String::from("hi alice"), None))
            .unwrap();
        db.save_post(&original).await.unwrap();

        let mut share = Post::now(bob.id, NewPost::default());
        share.original_post_id = Some(original.id);

        let view = populate(&db, &share).await.unwrap();
        assert_eq!(view.author, Some(bob.profile()));
        let orig = view.original_post.expect("original was not populated");
        assert_eq!(orig.id, original.id);
        assert_eq!(orig.author, Some(alice.profile()));
        assert_eq!(orig.comments[0].author, Some(bob.profile()));
    }

    #[tokio::test]
    async fn missing_original_is_left_out() {
        let db = MemDb::new();
        let bob = user("Bob");
        db.save_user(&bob).await.unwrap();
        let mut share = Post::now(bob.id, NewPost::default());
        share.original_post_id = Some(socialite_api::PostId::new());
        let view = populate(&db, &share).await.unwrap();
        assert!(view.original_post.is_none());
        assert_eq!(view.original_post_id, share.original_post_id);
    }
}
