//! Channel subscriptions: one row per (subscriber, channel) pair.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct SubscriptionStore {
    pool: SqlitePool,
}

/// Subscription counters for a channel, relative to an optional viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelStats {
    pub subscribers: i64,
    pub subscribed_to: i64,
    pub viewer_is_subscribed: bool,
}

impl SubscriptionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Subscribe, or unsubscribe if already subscribed.
    /// Returns true when the subscriber is subscribed afterwards.
    pub async fn toggle(&self, subscriber_id: i64, channel_id: i64) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = ? AND channel_id = ?")
            .bind(subscriber_id)
            .bind(channel_id)
            .execute(&mut *tx)
            .await?;

        let subscribed = if removed.rows_affected() > 0 {
            false
        } else {
            sqlx::query("INSERT INTO subscriptions (subscriber_id, channel_id) VALUES (?, ?)")
                .bind(subscriber_id)
                .bind(channel_id)
                .execute(&mut *tx)
                .await?;
            true
        };

        tx.commit().await?;
        Ok(subscribed)
    }

    pub async fn stats(
        &self,
        channel_id: i64,
        viewer_id: Option<i64>,
    ) -> Result<ChannelStats, sqlx::Error> {
        let (subscribers, subscribed_to, viewer_is_subscribed): (i64, i64, i64) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?1),
                (SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = ?1),
                (SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?1 AND subscriber_id = ?2)",
        )
        .bind(channel_id)
        .bind(viewer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(ChannelStats {
            subscribers,
            subscribed_to,
            viewer_is_subscribed: viewer_is_subscribed > 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, NewAccount};

    async fn create(db: &Database, name: &str) -> i64 {
        let uuid = uuid::Uuid::new_v4().to_string();
        let email = format!("{}@example.com", name);
        db.users()
            .create(NewAccount {
                uuid: &uuid,
                username: name,
                email: &email,
                full_name: name,
                avatar: "http://localhost/media/a.png",
                cover_image: "",
                password_hash: "$argon2id$fake",
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_toggle_and_stats() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = create(&db, "alice").await;
        let bob = create(&db, "bob").await;
        let carol = create(&db, "carol").await;
        let subs = db.subscriptions();

        assert!(subs.toggle(bob, alice).await.unwrap());
        assert!(subs.toggle(carol, alice).await.unwrap());
        assert!(subs.toggle(alice, bob).await.unwrap());

        let stats = subs.stats(alice, Some(bob)).await.unwrap();
        assert_eq!(stats.subscribers, 2);
        assert_eq!(stats.subscribed_to, 1);
        assert!(stats.viewer_is_subscribed);

        // Toggling again unsubscribes
        assert!(!subs.toggle(bob, alice).await.unwrap());
        let stats = subs.stats(alice, Some(bob)).await.unwrap();
        assert_eq!(stats.subscribers, 1);
        assert!(!stats.viewer_is_subscribed);

        let anonymous = subs.stats(alice, None).await.unwrap();
        assert!(!anonymous.viewer_is_subscribed);
    }

    #[tokio::test]
    async fn test_deleting_account_removes_subscriptions() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = create(&db, "alice").await;
        let bob = create(&db, "bob").await;

        db.subscriptions().toggle(bob, alice).await.unwrap();
        db.users().delete(bob).await.unwrap();

        let stats = db.subscriptions().stats(alice, None).await.unwrap();
        assert_eq!(stats.subscribers, 0);
    }
}
