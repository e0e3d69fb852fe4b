use std::collections::HashSet;

use anyhow::Context;
use socialite_api::{
    Db, Error as ApiError, FeedMessage, FriendEdge, FriendEvent, FriendResponse, FriendStatus,
    NotificationEvent, PendingRequest, PublicProfile, Topic, UserId,
};

use crate::{notifications, populate::profile_of, Ctx, Error};

const MAX_SUGGESTIONS: usize = 10;

/// Users `user` has an accepted friendship with
pub async fn friend_ids(db: &dyn Db, user: UserId) -> anyhow::Result<Vec<UserId>> {
    Ok(db
        .fetch_friend_edges_from(user)
        .await
        .with_context(|| format!("listing friend edges of {user:?}"))?
        .into_iter()
        .filter(|e| e.status == FriendStatus::Accepted)
        .map(|e| e.friend_id)
        .collect())
}

/// All edges between `a` and `b`, in both directions
async fn edges_between(db: &dyn Db, a: UserId, b: UserId) -> anyhow::Result<Vec<FriendEdge>> {
    Ok(db
        .fetch_friend_edges_from(a)
        .await
        .with_context(|| format!("listing friend edges of {a:?}"))?
        .into_iter()
        .chain(
            db.fetch_friend_edges_to(a)
                .await
                .with_context(|| format!("listing friend edges to {a:?}"))?,
        )
        .filter(|e| e.involves(a, b))
        .collect())
}

async fn profile_or_not_found(ctx: &Ctx<'_>, user: UserId) -> Result<PublicProfile, Error> {
    Ok(profile_of(ctx.db, user)
        .await?
        .ok_or(ApiError::UserNotFound(user.0))?)
}

pub async fn send_request(
    ctx: &Ctx<'_>,
    user: UserId,
    friend: UserId,
) -> Result<FriendEdge, Error> {
    if user == friend {
        return Err(Error::validation("cannot send a friend request to yourself"));
    }
    profile_or_not_found(ctx, friend).await?;
    let existing = edges_between(ctx.db, user, friend).await?;
    if existing.iter().any(|e| e.status != FriendStatus::Rejected) {
        return Err(ApiError::FriendRequestExists.into());
    }
    for stale in existing {
        ctx.db
            .delete_friend_edge(stale.id)
            .await
            .with_context(|| format!("deleting rejected request {:?}", stale.id))?;
    }

    let edge = FriendEdge::now(user, friend, FriendStatus::Pending);
    ctx.db
        .save_friend_edge(&edge)
        .await
        .with_context(|| format!("saving friend request {:?}", edge.id))?;

    let sender = profile_of(ctx.db, user).await?;
    ctx.feeds
        .publish(
            Topic::Friends(friend),
            FeedMessage::Friend(FriendEvent::NewRequest {
                request_id: edge.id,
                user: sender,
            }),
        )
        .await;
    notifications::dispatch(
        ctx,
        NotificationEvent::FriendRequested {
            to: friend,
            from: user,
            request: edge.id,
        },
    )
    .await;
    Ok(edge)
}

/// Answers a pending request addressed to `user`
pub async fn respond(
    ctx: &Ctx<'_>,
    user: UserId,
    data: FriendResponse,
) -> Result<FriendEdge, Error> {
    let _lock = ctx.request_locks.lock(data.request_id).await;
    let mut edge = ctx
        .db
        .fetch_friend_edge(data.request_id)
        .await?
        .ok_or(ApiError::FriendRequestNotFound(data.request_id.0))?;
    if edge.friend_id != user {
        return Err(Error::permission_denied());
    }
    let requester = edge.user_id;
    let (accepter_profile, requester_profile) = (
        profile_or_not_found(ctx, user).await?,
        profile_or_not_found(ctx, requester).await?,
    );
    edge.respond(data.response)?;
    ctx.db
        .save_friend_edge(&edge)
        .await
        .with_context(|| format!("saving answered request {:?}", edge.id))?;

    match edge.status {
        FriendStatus::Accepted => {
            ctx.db
                .save_friend_edge(&edge.reversed())
                .await
                .with_context(|| format!("saving reverse edge of {:?}", edge.id))?;
            ctx.feeds
                .publish(
                    Topic::Friends(requester),
                    FeedMessage::Friend(FriendEvent::RequestAccepted {
                        friend: accepter_profile,
                    }),
                )
                .await;
            ctx.feeds
                .publish(
                    Topic::Friends(user),
                    FeedMessage::Friend(FriendEvent::FriendAdded {
                        friend: requester_profile,
                    }),
                )
                .await;
            notifications::dispatch(
                ctx,
                NotificationEvent::FriendAccepted {
                    requester,
                    accepter: user,
                    request: edge.id,
                },
            )
            .await;
        }
        FriendStatus::Rejected => {
            ctx.feeds
                .publish(
                    Topic::Friends(requester),
                    FeedMessage::Friend(FriendEvent::RequestRejected {
                        request_id: edge.id,
                    }),
                )
                .await;
        }
        FriendStatus::Pending => (),
    }
    Ok(edge)
}

pub async fn unfriend(ctx: &Ctx<'_>, user: UserId, friend: UserId) -> Result<(), Error> {
    let edges = edges_between(ctx.db, user, friend).await?;
    if !edges.iter().any(|e| e.status == FriendStatus::Accepted) {
        return Err(Error::validation("users are not friends"));
    }
    for e in edges {
        ctx.db
            .delete_friend_edge(e.id)
            .await
            .with_context(|| format!("deleting friend edge {:?}", e.id))?;
    }
    let event = FriendEvent::Unfriended {
        user_id: user,
        friend_id: friend,
    };
    for u in [user, friend] {
        ctx.feeds
            .publish(Topic::Friends(u), FeedMessage::Friend(event.clone()))
            .await;
    }
    Ok(())
}

pub async fn list(ctx: &Ctx<'_>, user: UserId) -> Result<Vec<PublicProfile>, Error> {
    let mut res = Vec::new();
    for f in friend_ids(ctx.db, user).await? {
        if let Some(p) = profile_of(ctx.db, f).await? {
            res.push(p);
        }
    }
    Ok(res)
}

/// Requests waiting for an answer from `user`
pub async fn pending(ctx: &Ctx<'_>, user: UserId) -> Result<Vec<PendingRequest>, Error> {
    let edges = ctx
        .db
        .fetch_friend_edges_to(user)
        .await
        .with_context(|| format!("listing friend requests to {user:?}"))?;
    let mut res = Vec::new();
    for e in edges.into_iter().filter(|e| e.status == FriendStatus::Pending) {
        if let Some(p) = profile_of(ctx.db, e.user_id).await? {
            res.push(PendingRequest {
                request_id: e.id,
                user: p,
            });
        }
    }
    Ok(res)
}

/// Users `user` has no pending or accepted relationship with
pub async fn suggestions(ctx: &Ctx<'_>, user: UserId) -> Result<Vec<PublicProfile>, Error> {
    let mut related = HashSet::new();
    related.insert(user);
    for e in ctx
        .db
        .fetch_friend_edges_from(user)
        .await?
        .into_iter()
        .chain(ctx.db.fetch_friend_edges_to(user).await?)
        .filter(|e| e.status != FriendStatus::Rejected)
    {
        related.insert(e.user_id);
        related.insert(e.friend_id);
    }
    Ok(ctx
        .db
        .fetch_users()
        .await
        .context("listing users")?
        .into_iter()
        .filter(|u| !related.contains(&u.id))
        .take(MAX_SUGGESTIONS)
        .map(|u| u.profile())
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use socialite_api::{NotificationKind, User};

    use super::*;
    use crate::tests::{user, TestCtx};

    async fn two_users(t: &TestCtx) -> (User, User) {
        let (alice, bob) = (user("Alice"), user("Bob"));
        t.db.save_user(&alice).await.unwrap();
        t.db.save_user(&bob).await.unwrap();
        (alice, bob)
    }

    #[tokio::test]
    async fn accepted_requests_make_two_edges() {
        let t = TestCtx::new();
        let ctx = t.ctx();
        let (alice, bob) = two_users(&t).await;

        let req = send_request(&ctx, alice.id, bob.id).await.unwrap();
        let pend = pending(&ctx, bob.id).await.unwrap();
        assert_eq!(pend.len(), 1);
        assert_eq!(pend[0].user, alice.profile());
        let n = t.db.fetch_notifications_for(bob.id).await.unwrap();
        assert_eq!(n[0].kind, NotificationKind::FriendRequest);

        assert!(matches!(
            respond(
                &ctx,
                alice.id,
                FriendResponse {
                    request_id: req.id,
                    response: FriendStatus::Accepted,
                },
            )
            .await,
            Err(Error::Api(ApiError::PermissionDenied))
        ));
        t.feeds.take().await;
        respond(
            &ctx,
            bob.id,
            FriendResponse {
                request_id: req.id,
                response: FriendStatus::Accepted,
            },
        )
        .await
        .unwrap();

        assert_eq!(list(&ctx, alice.id).await.unwrap(), vec![bob.profile()]);
        assert_eq!(list(&ctx, bob.id).await.unwrap(), vec![alice.profile()]);
        assert!(pending(&ctx, bob.id).await.unwrap().is_empty());
        let n = t.db.fetch_notifications_for(alice.id).await.unwrap();
        assert_eq!(n[0].kind, NotificationKind::FriendAccept);

        let sent = t.feeds.take().await;
        assert!(sent.iter().any(|(topic, msg)| *topic == Topic::Friends(alice.id)
            && matches!(msg, FeedMessage::Friend(FriendEvent::RequestAccepted { .. }))));
        assert!(sent.iter().any(|(topic, msg)| *topic == Topic::Friends(bob.id)
            && matches!(msg, FeedMessage::Friend(FriendEvent::FriendAdded { .. }))));

        unfriend(&ctx, bob.id, alice.id).await.unwrap();
        assert!(list(&ctx, alice.id).await.unwrap().is_empty());
        assert!(list(&ctx, bob.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_and_self_requests_are_refused() {
        let t = TestCtx::new();
        let ctx = t.ctx();
        let (alice, bob) = two_users(&t).await;
        assert!(matches!(
            send_request(&ctx, alice.id, alice.id).await,
            Err(Error::Api(ApiError::Validation(_)))
        ));
        let req = send_request(&ctx, alice.id, bob.id).await.unwrap();
        for (from, to) in [(alice.id, bob.id), (bob.id, alice.id)] {
            assert!(matches!(
                send_request(&ctx, from, to).await,
                Err(Error::Api(ApiError::FriendRequestExists))
            ));
        }

        // once rejected, a new request may be sent
        respond(
            &ctx,
            bob.id,
            FriendResponse {
                request_id: req.id,
                response: FriendStatus::Rejected,
            },
        )
        .await
        .unwrap();
        assert!(matches!(
            respond(
                &ctx,
                bob.id,
                FriendResponse {
                    request_id: req.id,
                    response: FriendStatus::Accepted,
                },
            )
            .await,
            Err(Error::Api(ApiError::Validation(_)))
        ));
        send_request(&ctx, bob.id, alice.id).await.unwrap();
    }

    #[tokio::test]
    async fn answering_a_deleted_requester_changes_nothing() {
        let t = TestCtx::new();
        let ctx = t.ctx();
        let (alice, bob) = two_users(&t).await;
        let req = send_request(&ctx, alice.id, bob.id).await.unwrap();
        t.db.delete_user(alice.id).await.unwrap();
        t.feeds.take().await;

        assert!(matches!(
            respond(
                &ctx,
                bob.id,
                FriendResponse {
                    request_id: req.id,
                    response: FriendStatus::Accepted,
                },
            )
            .await,
            Err(Error::Api(ApiError::UserNotFound(_)))
        ));
        let stored = t.db.fetch_friend_edge(req.id).await.unwrap().unwrap();
        assert_eq!(stored.status, FriendStatus::Pending);
        assert!(t.db.fetch_friend_edges_from(bob.id).await.unwrap().is_empty());
        assert!(t.feeds.take().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_accepts_make_a_single_reverse_edge() {
        let t = Arc::new(TestCtx::new());
        let (alice, bob) = two_users(&t).await;
        let req = send_request(&t.ctx(), alice.id, bob.id).await.unwrap();

        let tasks = (0..4)
            .map(|_| {
                let t = t.clone();
                tokio::spawn(async move {
                    respond(
                        &t.ctx(),
                        bob.id,
                        FriendResponse {
                            request_id: req.id,
                            response: FriendStatus::Accepted,
                        },
                    )
                    .await
                    .is_ok()
                })
            })
            .collect::<Vec<_>>();
        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(t.db.fetch_friend_edges_from(bob.id).await.unwrap().len(), 1);
        assert_eq!(t.ctx().request_locks.len(), 0);
    }

    #[tokio::test]
    async fn suggestions_skip_self_and_relations() {
        let t = TestCtx::new();
        let ctx = t.ctx();
        let (alice, bob) = two_users(&t).await;
        for i in 0..12 {
            t.db.save_user(&user(&format!("Stranger{i}"))).await.unwrap();
        }
        send_request(&ctx, alice.id, bob.id).await.unwrap();
        let s = suggestions(&ctx, alice.id).await.unwrap();
        assert_eq!(s.len(), MAX_SUGGESTIONS);
        assert!(s.iter().all(|p| p.id != alice.id && p.id != bob.id));
    }
}
