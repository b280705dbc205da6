//! Notification outbox
//!
//! Margin-call and settlement alerts are recorded here as durable outbound
//! messages and delivered by a background drain task, at-least-once. A
//! notification-channel outage re-queues the message; it never propagates
//! into the engine transition that produced it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What a notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTopic {
    MarginCall,
    AutoLiquidation,
    SettlementAlert,
    ReconciliationReport,
}

/// An outbound message awaiting delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub topic: NotificationTopic,
    /// Account or user the message concerns
    pub account_id: Uuid,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// Delivery attempts so far
    pub attempts: u32,
}

impl Notification {
    pub fn new(
        topic: NotificationTopic,
        account_id: Uuid,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic,
            account_id,
            subject: subject.into(),
            body: body.into(),
            created_at: Utc::now(),
            attempts: 0,
        }
    }
}

/// Delivery failure from a notification channel
#[derive(Debug, thiserror::Error)]
#[error("Notification channel unavailable: {0}")]
pub struct NotifyError(pub String);

/// A notification channel (email, chat, ops pager). Best-effort and
/// fallible; the outbox owns retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, note: &Notification) -> Result<(), NotifyError>;
}

/// Default channel: writes notifications to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, note: &Notification) -> Result<(), NotifyError> {
        info!(
            topic = ?note.topic,
            account = %note.account_id,
            subject = %note.subject,
            "notification delivered"
        );
        Ok(())
    }
}

/// Durable queue of outbound notifications
pub struct Outbox {
    queue: Mutex<VecDeque<Notification>>,
}

impl Outbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
        })
    }

    /// Record a notification for delivery. Never fails; the engine
    /// transition that produced it must not depend on channel health.
    pub async fn enqueue(&self, note: Notification) {
        debug!(id = %note.id, topic = ?note.topic, "notification queued");
        self.queue.lock().await.push_back(note);
    }

    pub async fn pending(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Attempt delivery of everything currently queued. Failed messages are
    /// re-queued with their attempt count bumped. Returns the number
    /// delivered.
    pub async fn drain_once(&self, notifier: &dyn Notifier) -> usize {
        let batch: Vec<Notification> = {
            let mut queue = self.queue.lock().await;
            queue.drain(..).collect()
        };

        let mut delivered = 0;
        for mut note in batch {
            note.attempts += 1;
            match notifier.deliver(&note).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        id = %note.id,
                        attempts = note.attempts,
                        error = %e,
                        "notification delivery failed, re-queued"
                    );
                    self.queue.lock().await.push_back(note);
                }
            }
        }
        delivered
    }

    /// Background drain loop. Runs until the shutdown signal flips.
    pub async fn run(
        self: Arc<Self>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut timer = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.drain_once(notifier.as_ref()).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let remaining = self.pending().await;
                        if remaining > 0 {
                            warn!(remaining, "outbox shutting down with undelivered notifications");
                        }
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Notifier that fails the first `fail_first` deliveries
    struct FlakyNotifier {
        fail_first: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn deliver(&self, _note: &Notification) -> Result<(), NotifyError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(NotifyError("channel down".into()))
            } else {
                Ok(())
            }
        }
    }

    fn test_note() -> Notification {
        Notification::new(
            NotificationTopic::MarginCall,
            Uuid::new_v4(),
            "Margin call",
            "Post additional collateral",
        )
    }

    #[tokio::test]
    async fn test_drain_delivers() {
        let outbox = Outbox::new();
        outbox.enqueue(test_note()).await;
        outbox.enqueue(test_note()).await;

        let delivered = outbox.drain_once(&LogNotifier).await;
        assert_eq!(delivered, 2);
        assert_eq!(outbox.pending().await, 0);
    }

    #[tokio::test]
    async fn test_failed_delivery_requeued() {
        let outbox = Outbox::new();
        outbox.enqueue(test_note()).await;

        let flaky = FlakyNotifier {
            fail_first: 1,
            calls: AtomicUsize::new(0),
        };

        let delivered = outbox.drain_once(&flaky).await;
        assert_eq!(delivered, 0);
        assert_eq!(outbox.pending().await, 1);

        // Second drain succeeds, attempt count carried over
        let delivered = outbox.drain_once(&flaky).await;
        assert_eq!(delivered, 1);
        assert_eq!(outbox.pending().await, 0);
    }
}
