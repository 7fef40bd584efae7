//! Prints notifications as they appear.

use std::time::Duration;

use rustc_hash::FxHashSet;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use vexa_sync::{
    NotificationCenter, NotificationChange, NotificationEvent, NotificationId, Severity,
};

pub(crate) struct Presenter {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Presenter {
    pub(crate) fn spawn(center: NotificationCenter, exit_transition: Duration) -> Self {
        let mut changes = center.subscribe();
        let (stop, mut stopped) = oneshot::channel::<()>();
        let mut screen = Screen::new(center, exit_transition);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    change = changes.recv() => match change {
                        Ok(change) => screen.apply(change),
                        Err(RecvError::Lagged(missed)) => {
                            debug!("Presenter missed {} notification changes", missed);
                            screen.resync();
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = &mut stopped => {
                        loop {
                            match changes.try_recv() {
                                Ok(change) => screen.apply(change),
                                Err(TryRecvError::Lagged(_)) => screen.resync(),
                                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                            }
                        }
                        screen.close();
                        break;
                    }
                }
            }
        });

        Self { stop, handle }
    }

    /// Print whatever is still pending and stop.
    pub(crate) async fn finish(self) {
        let _ = self.stop.send(());
        let _ = self.handle.await;
    }
}

/// What the terminal has shown so far.
struct Screen {
    center: NotificationCenter,
    exit_transition: Duration,
    printed: FxHashSet<NotificationId>,
}

impl Screen {
    fn new(center: NotificationCenter, exit_transition: Duration) -> Self {
        Self {
            center,
            exit_transition,
            printed: FxHashSet::default(),
        }
    }

    fn apply(&mut self, change: NotificationChange) {
        match change {
            NotificationChange::Shown(event) => {
                // A resync may already have printed or purged it.
                if self.center.is_active(event.id) {
                    self.print(&event);
                }
            }
            NotificationChange::Hidden(id) => self.start_exit(id),
            NotificationChange::Removed(id) => {
                self.printed.remove(&id);
                debug!("Notification {} removed", id);
            }
        }
    }

    /// Catch up from the center after changes were dropped.
    fn resync(&mut self) {
        let active = self.center.snapshot();
        self.printed.retain(|id| active.iter().any(|event| event.id == *id));
        for event in active.iter().filter(|event| event.visible) {
            self.print(event);
        }
        for id in self.center.pending_exits() {
            self.start_exit(id);
        }
    }

    /// Finish every exit that is still pending; nothing renders after this.
    fn close(&mut self) {
        for id in self.center.pending_exits() {
            let _ = self.center.transition_finished(id);
        }
        self.printed.clear();
    }

    fn print(&mut self, event: &NotificationEvent) {
        if self.printed.insert(event.id) {
            println!("{} {}", badge(event.severity), event.message);
        }
    }

    fn start_exit(&self, id: NotificationId) {
        // Nothing to animate in a terminal; only wait out the exit time.
        let center = self.center.clone();
        let exit_transition = self.exit_transition;
        tokio::spawn(async move {
            tokio::time::sleep(exit_transition).await;
            let _ = center.transition_finished(id);
        });
    }
}

fn badge(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "[info]",
        Severity::Success => "[ok]",
        Severity::Warning => "[warn]",
        Severity::Error => "[error]",
    }
}
