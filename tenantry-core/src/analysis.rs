//! Analysis-completed notifications.
//!
//! An analysis worker raises [`AnalysisCompleted`] once per finished analysis.
//! [`AnalysisCompletedNotifier`] is its only listener: it turns the event into
//! a [`Notification`] and hands it to a [`NotificationQueue`]. Delivery,
//! retries and formatting belong to whoever drains the queue.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::errors::TenantryError;
use crate::events::{Event, EventBus, ListenerId};
use crate::identity::UserId;
use crate::resumes::{Resume, ResumeId};
use crate::tenant::TenantId;

/// Output of one analysis run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalysisResult {
    pub id: Uuid,
    pub resume_id: ResumeId,
    /// 0..=100
    pub score: u8,
    pub summary: String,
    pub completed_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn new(resume_id: ResumeId, score: u8, summary: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            resume_id,
            score: score.min(100),
            summary: summary.into(),
            completed_at: Utc::now(),
        }
    }
}

/// Immutable snapshot of a finished analysis.
#[derive(Debug, Clone)]
pub struct AnalysisCompleted {
    tenant_id: TenantId,
    resume: Resume,
    result: AnalysisResult,
}

impl Event for AnalysisCompleted {
    const NAME: &'static str = "analysis.completed";
}

impl AnalysisCompleted {
    /// Both halves are required and must refer to the same resume.
    pub fn try_new(
        tenant_id: TenantId,
        resume: Option<Resume>,
        result: Option<AnalysisResult>,
    ) -> Result<Self> {
        let Some(resume) = resume else {
            return Err(
                TenantryError::precondition("analysis completed without a resume").into_anyhow(),
            );
        };
        let Some(result) = result else {
            return Err(
                TenantryError::precondition("analysis completed without a result").into_anyhow(),
            );
        };
        if result.resume_id != resume.id {
            return Err(TenantryError::precondition(format!(
                "analysis result {} belongs to resume {}, not {}",
                result.id, result.resume_id, resume.id
            ))
            .into_anyhow());
        }

        Ok(Self {
            tenant_id,
            resume,
            result,
        })
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn resume(&self) -> &Resume {
        &self.resume
    }

    pub fn result(&self) -> &AnalysisResult {
        &self.result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NotificationChannel {
    Mail,
    InApp,
}

/// A user-facing message waiting for delivery.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Notification {
    pub tenant_id: TenantId,
    pub recipient: UserId,
    pub channels: Vec<NotificationChannel>,
    pub resume_id: ResumeId,
    pub resume_title: String,
    pub result: AnalysisResult,
}

impl Notification {
    pub fn analysis_completed(event: &AnalysisCompleted) -> Self {
        Self {
            tenant_id: event.tenant_id.clone(),
            recipient: event.resume.owner_id,
            channels: vec![NotificationChannel::Mail, NotificationChannel::InApp],
            resume_id: event.resume.id,
            resume_title: event.resume.title.clone(),
            result: event.result.clone(),
        }
    }
}

#[async_trait]
pub trait NotificationQueue: Send + Sync {
    async fn enqueue(&self, notification: Notification) -> Result<()>;
}

/// Keeps every enqueued notification. Handy for tests and local runs.
#[derive(Default)]
pub struct InMemoryNotificationQueue {
    items: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.items.lock())
    }
}

#[async_trait]
impl NotificationQueue for InMemoryNotificationQueue {
    async fn enqueue(&self, notification: Notification) -> Result<()> {
        self.items.lock().push(notification);
        Ok(())
    }
}

/// Forwards notifications to a worker over an unbounded channel.
#[derive(Clone)]
pub struct ChannelNotificationQueue {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotificationQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationQueue for ChannelNotificationQueue {
    async fn enqueue(&self, notification: Notification) -> Result<()> {
        self.tx.send(notification).map_err(|_| {
            TenantryError::infrastructure("notification worker has shut down").into_anyhow()
        })
    }
}

/// The single listener for [`AnalysisCompleted`].
pub struct AnalysisCompletedNotifier {
    queue: Arc<dyn NotificationQueue>,
}

impl AnalysisCompletedNotifier {
    pub fn new(queue: Arc<dyn NotificationQueue>) -> Self {
        Self { queue }
    }

    pub fn register(self, bus: &EventBus) -> ListenerId {
        let queue = self.queue;
        bus.listen::<AnalysisCompleted, _, _>(move |event, cancel| {
            let queue = Arc::clone(&queue);
            async move {
                if cancel.is_cancelled() {
                    return Ok(());
                }
                let notification = Notification::analysis_completed(&event);
                tracing::info!(
                    tenant = %notification.tenant_id,
                    user = %notification.recipient,
                    resume = %notification.resume_id,
                    "queueing analysis notification"
                );
                queue.enqueue(notification).await
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{has_kind, ErrorKind};
    use crate::resumes::ResumeDraft;

    fn resume() -> Resume {
        Resume::new(UserId(3), ResumeDraft::new("Data Engineer", "sql"))
    }

    #[test]
    fn missing_parts_are_rejected() {
        let r = resume();
        let result = AnalysisResult::new(r.id, 80, "solid");

        let err = AnalysisCompleted::try_new(TenantId::new("t"), None, Some(result.clone()))
            .unwrap_err();
        assert!(has_kind(&err, ErrorKind::Precondition));

        let err = AnalysisCompleted::try_new(TenantId::new("t"), Some(r), None).unwrap_err();
        assert!(has_kind(&err, ErrorKind::Precondition));
    }

    #[test]
    fn mismatched_result_is_rejected() {
        let result = AnalysisResult::new(ResumeId::new(), 50, "other");
        let err = AnalysisCompleted::try_new(TenantId::new("t"), Some(resume()), Some(result))
            .unwrap_err();
        assert!(has_kind(&err, ErrorKind::Precondition));
    }

    #[test]
    fn score_is_clamped() {
        assert_eq!(AnalysisResult::new(ResumeId::new(), 250, "").score, 100);
    }

    #[tokio::test]
    async fn notifier_enqueues_exactly_once() {
        let bus = EventBus::new();
        let queue = Arc::new(InMemoryNotificationQueue::new());
        AnalysisCompletedNotifier::new(queue.clone()).register(&bus);

        let r = resume();
        let result = AnalysisResult::new(r.id, 91, "strong profile");
        let event =
            AnalysisCompleted::try_new(TenantId::new("acme"), Some(r.clone()), Some(result.clone()))
                .unwrap();

        let dispatch = bus.raise(event).unwrap();
        assert_eq!(dispatch.listeners(), 1);
        dispatch.join().await;

        let sent = queue.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, UserId(3));
        assert_eq!(sent[0].resume_id, r.id);
        assert_eq!(sent[0].result, result);
    }

    #[tokio::test]
    async fn channel_queue_reports_closed_worker() {
        let (queue, rx) = ChannelNotificationQueue::new();
        let r = resume();
        let event = AnalysisCompleted::try_new(
            TenantId::new("acme"),
            Some(r.clone()),
            Some(AnalysisResult::new(r.id, 10, "")),
        )
        .unwrap();

        drop(rx);
        let err = queue
            .enqueue(Notification::analysis_completed(&event))
            .await
            .unwrap_err();
        assert!(has_kind(&err, ErrorKind::Infrastructure));
    }
}
