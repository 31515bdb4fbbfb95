//! NATS-backed event delivery for matching clients.
//!
//! Provides a trait-based notifier so domain code can run against a real
//! NATS connection in production and a recording mock in tests.
//!
//! Subjects:
//!   match.user.{userId}  per-user events
//!   match.pool           pool-churn broadcasts (NEW_USER / EXIT_USER)

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::RwLock;

use crate::domains::matching::events::MatchEvent;

pub const POOL_SUBJECT: &str = "match.pool";

pub fn user_subject(user_id: &str) -> String {
    format!("match.user.{user_id}")
}

#[async_trait]
pub trait BaseNotifier: Send + Sync {
    /// Deliver an event to a single user's subject.
    async fn notify_user(&self, user_id: &str, event: &MatchEvent) -> Result<()>;

    /// Deliver an event to everyone listening on the pool subject.
    async fn broadcast(&self, event: &MatchEvent) -> Result<()>;
}

/// Real NATS notifier.
pub struct NatsNotifier {
    client: async_nats::Client,
}

impl NatsNotifier {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }

    async fn publish(&self, subject: String, event: &MatchEvent) -> Result<()> {
        let payload = serde_json::to_vec(event).context("serialize match event")?;
        self.client
            .publish(subject, Bytes::from(payload))
            .await
            .context("publish match event")?;
        Ok(())
    }
}

#[async_trait]
impl BaseNotifier for NatsNotifier {
    async fn notify_user(&self, user_id: &str, event: &MatchEvent) -> Result<()> {
        self.publish(user_subject(user_id), event).await
    }

    async fn broadcast(&self, event: &MatchEvent) -> Result<()> {
        self.publish(POOL_SUBJECT.to_string(), event).await
    }
}

/// A delivered event, as recorded by [`TestNotifier`].
#[derive(Debug, Clone)]
pub struct DeliveredEvent {
    pub subject: String,
    pub event: MatchEvent,
}

/// Mock notifier that records every delivery for inspection.
#[derive(Default)]
pub struct TestNotifier {
    delivered: RwLock<Vec<DeliveredEvent>>,
}

impl TestNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded deliveries, in order.
    pub fn delivered(&self) -> Vec<DeliveredEvent> {
        self.delivered
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Events delivered to a specific user's subject, in order.
    pub fn events_for_user(&self, user_id: &str) -> Vec<MatchEvent> {
        let subject = user_subject(user_id);
        self.delivered
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|d| d.subject == subject)
            .map(|d| d.event.clone())
            .collect()
    }

    /// Events delivered to the pool subject, in order.
    pub fn broadcasts(&self) -> Vec<MatchEvent> {
        self.delivered
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|d| d.subject == POOL_SUBJECT)
            .map(|d| d.event.clone())
            .collect()
    }

    pub fn user_received(&self, user_id: &str, event: &MatchEvent) -> bool {
        self.events_for_user(user_id).iter().any(|e| e == event)
    }

    pub fn delivery_count(&self) -> usize {
        self.delivered
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn clear(&self) {
        self.delivered
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn record(&self, subject: String, event: &MatchEvent) {
        self.delivered
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(DeliveredEvent {
                subject,
                event: event.clone(),
            });
    }
}

#[async_trait]
impl BaseNotifier for TestNotifier {
    async fn notify_user(&self, user_id: &str, event: &MatchEvent) -> Result<()> {
        self.record(user_subject(user_id), event);
        Ok(())
    }

    async fn broadcast(&self, event: &MatchEvent) -> Result<()> {
        self.record(POOL_SUBJECT.to_string(), event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_user_and_broadcast_deliveries() {
        let notifier = TestNotifier::new();

        notifier.notify_user("u1", &MatchEvent::Waiting).await.unwrap();
        notifier
            .broadcast(&MatchEvent::ExitUser {
                user_id: "u1".into(),
            })
            .await
            .unwrap();

        assert_eq!(notifier.delivery_count(), 2);
        assert!(notifier.user_received("u1", &MatchEvent::Waiting));
        assert_eq!(notifier.events_for_user("u2").len(), 0);
        assert_eq!(notifier.broadcasts().len(), 1);
    }

    #[tokio::test]
    async fn clear_drops_history() {
        let notifier = TestNotifier::new();
        notifier.notify_user("u1", &MatchEvent::Waiting).await.unwrap();

        notifier.clear();

        assert_eq!(notifier.delivery_count(), 0);
    }
}
