//! Transient user notifications.
//!
//! [`NotificationQueue`] is the plain state machine: events are shown,
//! hidden (timeout or dismissal) and finally purged. An event is never
//! purged while visible, so a renderer holding it mid-animation never sees
//! it vanish.
//!
//! [`NotificationCenter`] shares a queue between producers and a presenter,
//! drives expiry timers and broadcasts [`NotificationChange`]s.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SyncConfig;

/// Monotonic notification identifier, assigned in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Visual intent of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message shown to the user for a bounded time.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub id: NotificationId,
    pub message: String,
    pub severity: Severity,
    pub duration: Duration,
    pub visible: bool,
    pub created_at: Instant,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("notification {0} is still visible")]
    StillVisible(NotificationId),
    #[error("notification {0} does not exist")]
    Unknown(NotificationId),
}

/// Result of [`NotificationQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    pub id: NotificationId,
    /// Oldest visible event hidden to respect the visibility cap.
    pub displaced: Option<NotificationId>,
}

/// Ordered list of active notifications.
#[derive(Debug)]
pub struct NotificationQueue {
    events: VecDeque<NotificationEvent>,
    next_id: u64,
    max_visible: usize,
}

impl NotificationQueue {
    pub fn new(max_visible: usize) -> Self {
        Self {
            events: VecDeque::new(),
            next_id: 1,
            max_visible: max_visible.max(1),
        }
    }

    /// Append a visible event.
    ///
    /// When the cap is reached the oldest visible event is hidden (not
    /// removed); it still goes through the normal exit and purge.
    pub fn enqueue(
        &mut self,
        message: impl Into<String>,
        severity: Severity,
        duration: Duration,
    ) -> Enqueued {
        let displaced = if self.visible_count() >= self.max_visible {
            self.events.iter_mut().find(|e| e.visible).map(|e| {
                e.visible = false;
                e.id
            })
        } else {
            None
        };

        let id = NotificationId(self.next_id);
        self.next_id += 1;
        self.events.push_back(NotificationEvent {
            id,
            message: message.into(),
            severity,
            duration,
            visible: true,
            created_at: Instant::now(),
        });

        Enqueued { id, displaced }
    }

    /// Hide an event at the user's request. Returns whether it was visible.
    pub fn dismiss(&mut self, id: NotificationId) -> bool {
        self.hide(id)
    }

    /// Hide an event whose display time elapsed. Returns whether it was
    /// visible.
    pub fn expire(&mut self, id: NotificationId) -> bool {
        self.hide(id)
    }

    /// Remove a hidden event once its exit transition has completed.
    pub fn purge(&mut self, id: NotificationId) -> Result<NotificationEvent, NotificationError> {
        let index = self
            .position(id)
            .ok_or(NotificationError::Unknown(id))?;
        if self.events[index].visible {
            return Err(NotificationError::StillVisible(id));
        }
        self.events
            .remove(index)
            .ok_or(NotificationError::Unknown(id))
    }

    pub fn get(&self, id: NotificationId) -> Option<&NotificationEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    /// All active events, oldest first, visible or exiting.
    pub fn events(&self) -> impl Iterator<Item = &NotificationEvent> {
        self.events.iter()
    }

    pub fn visible(&self) -> impl Iterator<Item = &NotificationEvent> {
        self.events.iter().filter(|e| e.visible)
    }

    /// Hidden events still waiting for their exit transition.
    pub fn exiting(&self) -> impl Iterator<Item = &NotificationEvent> {
        self.events.iter().filter(|e| !e.visible)
    }

    pub fn visible_count(&self) -> usize {
        self.visible().count()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn hide(&mut self, id: NotificationId) -> bool {
        match self.events.iter_mut().find(|e| e.id == id) {
            Some(event) if event.visible => {
                event.visible = false;
                true
            }
            _ => false,
        }
    }

    fn position(&self, id: NotificationId) -> Option<usize> {
        self.events.iter().position(|e| e.id == id)
    }
}

/// Change broadcast to presenters.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationChange {
    /// A new event became visible.
    Shown(NotificationEvent),
    /// An event was hidden; the presenter runs its exit transition and then
    /// calls [`NotificationCenter::transition_finished`].
    Hidden(NotificationId),
    /// An event left the active list.
    Removed(NotificationId),
}

struct Inner {
    queue: Mutex<NotificationQueue>,
    changes: broadcast::Sender<NotificationChange>,
    default_duration: Duration,
    timers: CancellationToken,
}

impl Inner {
    fn queue(&self) -> MutexGuard<'_, NotificationQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, change: NotificationChange) {
        // No presenter listening is fine.
        let _ = self.changes.send(change);
    }

    /// Follow-up after an event went invisible.
    fn hidden(&self, id: NotificationId) {
        if self.changes.receiver_count() == 0 {
            // Nothing is rendering it, so the exit transition is trivially over.
            if self.queue().purge(id).is_ok() {
                debug!("Purged notification {} (no presenter)", id);
            }
            return;
        }
        self.publish(NotificationChange::Hidden(id));
    }

    fn expire(&self, id: NotificationId) {
        let changed = self.queue().expire(id);
        if changed {
            debug!("Notification {} expired", id);
            self.hidden(id);
        }
    }
}

/// Shared, timer-driven notification queue.
///
/// Cheap to clone; all clones refer to the same queue.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

impl NotificationCenter {
    pub fn new(max_visible: usize, default_duration: Duration) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(NotificationQueue::new(max_visible)),
                changes,
                default_duration,
                timers: CancellationToken::new(),
            }),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.max_visible_notifications,
            config.notification_duration,
        )
    }

    /// Show a message for the default duration.
    pub fn notify(&self, message: impl Into<String>, severity: Severity) -> NotificationId {
        self.notify_for(message, severity, self.inner.default_duration)
    }

    pub fn info(&self, message: impl Into<String>) -> NotificationId {
        self.notify(message, Severity::Info)
    }

    pub fn success(&self, message: impl Into<String>) -> NotificationId {
        self.notify(message, Severity::Success)
    }

    pub fn warning(&self, message: impl Into<String>) -> NotificationId {
        self.notify(message, Severity::Warning)
    }

    pub fn error(&self, message: impl Into<String>) -> NotificationId {
        self.notify(message, Severity::Error)
    }

    /// Show a message for `duration`, then hide it.
    pub fn notify_for(
        &self,
        message: impl Into<String>,
        severity: Severity,
        duration: Duration,
    ) -> NotificationId {
        let (enqueued, event) = {
            let mut queue = self.inner.queue();
            let enqueued = queue.enqueue(message, severity, duration);
            let event = queue.get(enqueued.id).cloned();
            (enqueued, event)
        };

        if let Some(displaced) = enqueued.displaced {
            self.inner.hidden(displaced);
        }
        if let Some(event) = event {
            self.inner.publish(NotificationChange::Shown(event));
        }
        self.schedule_expiry(enqueued.id, duration);
        enqueued.id
    }

    /// Hide an event before its timer fires.
    pub fn dismiss(&self, id: NotificationId) {
        let changed = self.inner.queue().dismiss(id);
        if changed {
            self.inner.hidden(id);
        }
    }

    /// Called by the presenter once the exit transition of a hidden event
    /// has completed.
    pub fn transition_finished(&self, id: NotificationId) -> Result<(), NotificationError> {
        self.inner.queue().purge(id)?;
        self.inner.publish(NotificationChange::Removed(id));
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationChange> {
        self.inner.changes.subscribe()
    }

    /// All active events, oldest first.
    pub fn snapshot(&self) -> Vec<NotificationEvent> {
        self.inner.queue().events().cloned().collect()
    }

    pub fn visible(&self) -> Vec<NotificationEvent> {
        self.inner.queue().visible().cloned().collect()
    }

    /// Whether the event is still held, visible or exiting.
    pub fn is_active(&self, id: NotificationId) -> bool {
        self.inner.queue().get(id).is_some()
    }

    /// Ids of hidden events whose exit transition has not been reported.
    ///
    /// A presenter that fell behind on [`NotificationChange`]s finishes
    /// these instead of waiting for `Hidden` changes it will never see.
    pub fn pending_exits(&self) -> Vec<NotificationId> {
        self.inner.queue().exiting().map(|e| e.id).collect()
    }

    /// Cancel all pending expiry timers.
    pub fn shutdown(&self) {
        self.inner.timers.cancel();
    }

    fn schedule_expiry(&self, id: NotificationId, duration: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime for notification timer; {} stays until dismissed", id);
            return;
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let cancelled = self.inner.timers.clone();
        runtime.spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    if let Some(inner) = weak.upgrade() {
                        inner.expire(id);
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOUR_SECONDS: Duration = Duration::from_millis(4000);

    #[test]
    fn test_enqueue_dismiss_purge() {
        let mut queue = NotificationQueue::new(5);
        let first = queue.enqueue("done", Severity::Success, FOUR_SECONDS);
        let second = queue.enqueue("oops", Severity::Error, FOUR_SECONDS);
        assert!(first.id < second.id);
        assert_eq!(first.displaced, None);
        assert_eq!(queue.visible_count(), 2);

        assert_eq!(
            queue.purge(first.id),
            Err(NotificationError::StillVisible(first.id))
        );

        assert!(queue.dismiss(first.id));
        assert!(!queue.dismiss(first.id));
        let removed = queue.purge(first.id).unwrap();
        assert_eq!(removed.message, "done");
        assert_eq!(queue.purge(first.id), Err(NotificationError::Unknown(first.id)));

        // unrelated event untouched
        assert!(queue.get(second.id).unwrap().visible);
    }

    #[test]
    fn test_cap_hides_oldest_visible() {
        let mut queue = NotificationQueue::new(2);
        let a = queue.enqueue("a", Severity::Info, FOUR_SECONDS).id;
        let b = queue.enqueue("b", Severity::Info, FOUR_SECONDS).id;
        let c = queue.enqueue("c", Severity::Info, FOUR_SECONDS);

        assert_eq!(c.displaced, Some(a));
        assert_eq!(queue.visible_count(), 2);
        // still held until its exit transition is done
        assert_eq!(queue.len(), 3);
        assert!(!queue.get(a).unwrap().visible);
        assert!(queue.get(b).unwrap().visible);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_then_purge_by_presenter() {
        let center = NotificationCenter::new(5, FOUR_SECONDS);
        let mut changes = center.subscribe();

        let id = center.notify_for("done", Severity::Success, FOUR_SECONDS);
        assert!(matches!(changes.recv().await.unwrap(), NotificationChange::Shown(e) if e.id == id));

        tokio::time::sleep(Duration::from_millis(3999)).await;
        assert_eq!(center.visible().len(), 1);
        assert_eq!(
            center.transition_finished(id),
            Err(NotificationError::StillVisible(id))
        );

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(changes.recv().await.unwrap(), NotificationChange::Hidden(id));
        assert!(center.visible().is_empty());
        // hidden but still held for the exit transition
        assert_eq!(center.snapshot().len(), 1);

        center.transition_finished(id).unwrap();
        assert_eq!(changes.recv().await.unwrap(), NotificationChange::Removed(id));
        assert!(center.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_presenter_events_are_purged_on_hide() {
        let center = NotificationCenter::new(5, FOUR_SECONDS);
        let id = center.success("saved");
        center.dismiss(id);
        assert!(center.snapshot().is_empty());

        center.info("later");
        tokio::time::sleep(FOUR_SECONDS + Duration::from_millis(1)).await;
        assert!(center.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_exits_survive_a_lagging_subscriber() {
        let center = NotificationCenter::new(5, FOUR_SECONDS);
        let mut changes = center.subscribe();
        for n in 0..200 {
            center.info(format!("event {}", n));
        }

        assert!(matches!(
            changes.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        let pending = center.pending_exits();
        assert_eq!(pending.len(), 195);
        assert_eq!(center.visible().len(), 5);

        for id in pending {
            center.transition_finished(id).unwrap();
        }
        assert!(center.pending_exits().is_empty());
        assert_eq!(center.snapshot().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_timers() {
        let center = NotificationCenter::new(5, FOUR_SECONDS);
        let _changes = center.subscribe();
        center.info("pending");
        center.shutdown();

        tokio::time::sleep(FOUR_SECONDS * 2).await;
        assert_eq!(center.visible().len(), 1);
    }
}
