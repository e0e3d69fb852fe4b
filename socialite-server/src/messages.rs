use std::collections::BTreeMap;

use anyhow::Context;
use socialite_api::{
    ChatMessage, Error as ApiError, FeedMessage, NewMessage, NotificationEvent, Topic,
    UnreadCount, UserId,
};

use crate::{notifications, populate::profile_of, Ctx, Error};

pub async fn send(ctx: &Ctx<'_>, sender: UserId, data: NewMessage) -> Result<ChatMessage, Error> {
    data.validate()?;
    if data.receiver_id == sender {
        return Err(Error::validation("cannot send a message to yourself"));
    }
    profile_of(ctx.db, data.receiver_id)
        .await?
        .ok_or(ApiError::UserNotFound(data.receiver_id.0))?;

    let msg = ChatMessage::now(sender, data.receiver_id, data.content);
    ctx.db
        .save_message(&msg)
        .await
        .with_context(|| format!("saving message {:?}", msg.id))?;
    for u in [msg.receiver_id, msg.sender_id] {
        ctx.feeds
            .publish(Topic::Messages(u), FeedMessage::Message(msg.clone()))
            .await;
    }
    notifications::dispatch(
        ctx,
        NotificationEvent::Messaged {
            receiver: msg.receiver_id,
            sender,
            message: msg.id,
        },
    )
    .await;
    Ok(msg)
}

/// Messages between `user` and `other`, oldest first
pub async fn conversation(
    ctx: &Ctx<'_>,
    user: UserId,
    other: UserId,
) -> Result<Vec<ChatMessage>, Error> {
    Ok(ctx
        .db
        .fetch_conversation(user, other)
        .await
        .with_context(|| format!("fetching conversation of {user:?} with {other:?}"))?)
}

/// Marks everything `other` sent to `user` as read, returning how many
/// messages changed
pub async fn mark_read(ctx: &Ctx<'_>, user: UserId, other: UserId) -> Result<usize, Error> {
    let mut changed = 0;
    for mut m in conversation(ctx, user, other).await? {
        if m.receiver_id == user && !m.read {
            m.read = true;
            ctx.db
                .save_message(&m)
                .await
                .with_context(|| format!("marking {:?} as read", m.id))?;
            changed += 1;
        }
    }
    Ok(changed)
}

pub async fn unread_counts(ctx: &Ctx<'_>, user: UserId) -> Result<Vec<UnreadCount>, Error> {
    let mut counts = BTreeMap::new();
    for m in ctx
        .db
        .fetch_messages_to(user)
        .await
        .with_context(|| format!("listing messages to {user:?}"))?
    {
        if !m.read {
            *counts.entry(m.sender_id).or_insert(0) += 1;
        }
    }
    Ok(counts
        .into_iter()
        .map(|(sender_id, count)| UnreadCount { sender_id, count })
        .collect())
}

#[cfg(test)]
mod tests {
    use socialite_api::{Db, NotificationKind};

    use super::*;
    use crate::tests::{user, TestCtx};

    #[tokio::test]
    async fn messages_reach_both_sides_and_get_read() {
        let t = TestCtx::new();
        let ctx = t.ctx();
        let (alice, bob) = (user("Alice"), user("Bob"));
        t.db.save_user(&alice).await.unwrap();
        t.db.save_user(&bob).await.unwrap();

        for text in ["hi", "are you there?"] {
            send(
                &ctx,
                alice.id,
                NewMessage {
                    receiver_id: bob.id,
                    content: String::from(text),
                },
            )
            .await
            .unwrap();
        }
        let sent = t.feeds.take().await;
        let pushes = |u| {
            sent.iter()
                .filter(|(topic, _)| *topic == Topic::Messages(u))
                .count()
        };
        assert_eq!((pushes(alice.id), pushes(bob.id)), (2, 2));

        let convo = conversation(&ctx, bob.id, alice.id).await.unwrap();
        assert_eq!(convo.len(), 2);
        assert_eq!(
            unread_counts(&ctx, bob.id).await.unwrap(),
            vec![UnreadCount {
                sender_id: alice.id,
                count: 2
            }]
        );
        let n = t.db.fetch_notifications_for(bob.id).await.unwrap();
        assert!(n.iter().all(|n| n.kind == NotificationKind::Message));

        // the sender reading does not mark anything
        assert_eq!(mark_read(&ctx, alice.id, bob.id).await.unwrap(), 0);
        assert_eq!(mark_read(&ctx, bob.id, alice.id).await.unwrap(), 2);
        assert!(unread_counts(&ctx, bob.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_receivers_are_reported() {
        let t = TestCtx::new();
        let alice = user("Alice");
        t.db.save_user(&alice).await.unwrap();
        let nobody = UserId::stub();
        assert!(matches!(
            send(
                &t.ctx(),
                alice.id,
                NewMessage {
                    receiver_id: nobody,
                    content: String::from("hello?"),
                },
            )
            .await,
            Err(Error::Api(ApiError::UserNotFound(_)))
        ));
    }
}
