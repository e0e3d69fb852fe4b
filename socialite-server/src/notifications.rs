use anyhow::Context;
use socialite_api::{
    Error as ApiError, FeedMessage, Notification, NotificationEvent, NotificationId, Topic, UserId,
};

use crate::{populate::profile_of, Ctx, Error};

/// Records `event` for its recipient and pushes it on their notification
/// topic. Self-inflicted events are dropped.
///
/// This runs after the triggering change has been saved, so failures are
/// only logged. Returns the notification that was sent, if any.
pub async fn dispatch(ctx: &Ctx<'_>, event: NotificationEvent) -> Option<Notification> {
    if event.is_suppressed() {
        tracing::debug!(?event, "not notifying user of their own action");
        return None;
    }
    let sender = match profile_of(ctx.db, event.actor()).await {
        Ok(p) => p,
        Err(err) => {
            tracing::error!(?err, ?event, "failed resolving notification sender");
            None
        }
    };
    let notification = event.to_notification(sender.as_ref())?;
    if let Err(err) = ctx.db.save_notification(&notification).await {
        tracing::error!(?err, ?event, "failed saving notification");
        return None;
    }
    ctx.feeds
        .publish(
            Topic::Notifications(notification.recipient_id),
            FeedMessage::Notification {
                notification: notification.clone(),
                sender,
            },
        )
        .await;
    Some(notification)
}

pub async fn list(ctx: &Ctx<'_>, user: UserId) -> Result<Vec<Notification>, Error> {
    Ok(ctx
        .db
        .fetch_notifications_for(user)
        .await
        .with_context(|| format!("listing notifications of {user:?}"))?)
}

pub async fn unread_count(ctx: &Ctx<'_>, user: UserId) -> Result<usize, Error> {
    Ok(list(ctx, user).await?.iter().filter(|n| !n.read).count())
}

async fn fetch_owned(
    ctx: &Ctx<'_>,
    user: UserId,
    id: NotificationId,
) -> Result<Notification, Error> {
    let n = ctx
        .db
        .fetch_notification(id)
        .await?
        .ok_or(ApiError::NotificationNotFound(id.0))?;
    if n.recipient_id != user {
        return Err(Error::permission_denied());
    }
    Ok(n)
}

pub async fn mark_read(
    ctx: &Ctx<'_>,
    user: UserId,
    id: NotificationId,
) -> Result<Notification, Error> {
    let mut n = fetch_owned(ctx, user, id).await?;
    if !n.read {
        n.read = true;
        ctx.db.save_notification(&n).await?;
    }
    Ok(n)
}

pub async fn mark_all_read(ctx: &Ctx<'_>, user: UserId) -> Result<(), Error> {
    for mut n in list(ctx, user).await?.into_iter().filter(|n| !n.read) {
        n.read = true;
        ctx.db
            .save_notification(&n)
            .await
            .with_context(|| format!("marking {:?} as read", n.id))?;
    }
    Ok(())
}

pub async fn delete(ctx: &Ctx<'_>, user: UserId, id: NotificationId) -> Result<(), Error> {
    fetch_owned(ctx, user, id).await?;
    ctx.db.delete_notification(id).await?;
    Ok(())
}

pub async fn delete_all(ctx: &Ctx<'_>, user: UserId) -> Result<(), Error> {
    ctx.db.delete_notifications_for(user).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use socialite_api::{Db, NotificationKind, PostId, Uuid};

    use super::*;
    use crate::tests::{user, TestCtx};

    #[tokio::test]
    async fn notifications_are_saved_then_published() {
        let t = TestCtx::new();
        let (ctx, db, feeds) = (t.ctx(), &t.db, &t.feeds);
        let (owner, liker) = (user("Olivia"), user("Liam"));
        db.save_user(&liker).await.unwrap();
        let post = PostId::new();

        let n = dispatch(
            &ctx,
            NotificationEvent::PostLiked {
                owner: owner.id,
                liker: liker.id,
                post,
            },
        )
        .await
        .expect("notification was suppressed");
        assert_eq!(n.kind, NotificationKind::Like);
        assert_eq!(n.entity_id, post.0);
        assert_eq!(n.content, "Liam Test liked your post");
        assert_eq!(db.fetch_notification(n.id).await.unwrap(), Some(n.clone()));

        let sent = feeds.take().await;
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            (
                Topic::Notifications(u),
                FeedMessage::Notification {
                    notification,
                    sender,
                },
            ) => {
                assert_eq!(*u, owner.id);
                assert_eq!(notification, &n);
                assert_eq!(sender.as_ref(), Some(&liker.profile()));
            }
            other => panic!("unexpected publication {other:?}"),
        }
    }

    #[tokio::test]
    async fn self_actions_notify_nobody() {
        let t = TestCtx::new();
        let (ctx, db, feeds) = (t.ctx(), &t.db, &t.feeds);
        let u = UserId(Uuid::new_v4());
        let res = dispatch(
            &ctx,
            NotificationEvent::PostLiked {
                owner: u,
                liker: u,
                post: PostId::new(),
            },
        )
        .await;
        assert_eq!(res, None);
        assert!(feeds.take().await.is_empty());
        assert!(db.fetch_notifications_for(u).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_senders_get_a_generic_sentence() {
        let t = TestCtx::new();
        let ctx = t.ctx();
        let n = dispatch(
            &ctx,
            NotificationEvent::Messaged {
                receiver: UserId(Uuid::new_v4()),
                sender: UserId(Uuid::new_v4()),
                message: socialite_api::MessageId(Uuid::new_v4()),
            },
        )
        .await
        .unwrap();
        assert_eq!(n.content, "You have a new message");
    }

    #[tokio::test]
    async fn only_recipients_touch_their_notifications() {
        let t = TestCtx::new();
        let ctx = t.ctx();
        let (owner, other) = (UserId(Uuid::new_v4()), UserId(Uuid::new_v4()));
        let n = dispatch(
            &ctx,
            NotificationEvent::PostLiked {
                owner,
                liker: other,
                post: PostId::new(),
            },
        )
        .await
        .unwrap();

        assert!(matches!(
            mark_read(&ctx, other, n.id).await,
            Err(Error::Api(ApiError::PermissionDenied))
        ));
        assert_eq!(unread_count(&ctx, owner).await.unwrap(), 1);
        assert!(mark_read(&ctx, owner, n.id).await.unwrap().read);
        assert_eq!(unread_count(&ctx, owner).await.unwrap(), 0);

        assert!(matches!(
            delete(&ctx, other, n.id).await,
            Err(Error::Api(ApiError::PermissionDenied))
        ));
        delete(&ctx, owner, n.id).await.unwrap();
        assert!(matches!(
            delete(&ctx, owner, n.id).await,
            Err(Error::Api(ApiError::NotificationNotFound(_)))
        ));
    }
}
