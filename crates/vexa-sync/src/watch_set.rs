//! The set of resources being watched for a terminal transition.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use vexa_client::{ResourceId, ResourceStatus, TrackedResource};

use crate::notifications::Severity;

/// Last observed state of a watched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub status: ResourceStatus,
    pub progress: u8,
}

/// A watched resource reached a terminal status and left the set.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub id: ResourceId,
    pub label: String,
    /// Status at the previous observation, `None` if never observed.
    pub from: Option<ResourceStatus>,
    pub to: ResourceStatus,
}

impl Transition {
    pub fn severity(&self) -> Severity {
        match self.to {
            ResourceStatus::Completed => Severity::Success,
            ResourceStatus::Failed => Severity::Error,
            ResourceStatus::Stopped => Severity::Warning,
            ResourceStatus::Pending | ResourceStatus::Running => Severity::Info,
        }
    }

    pub fn message(&self) -> String {
        match self.to {
            ResourceStatus::Completed => {
                format!("Training of {} completed successfully", self.label)
            }
            ResourceStatus::Failed => format!("Training of {} failed", self.label),
            ResourceStatus::Stopped => format!("Training of {} was stopped", self.label),
            other => format!("{} is now {}", self.label, other),
        }
    }
}

/// Insertion-ordered watch list with the last observation per entry.
#[derive(Debug, Default, Clone)]
pub struct WatchSet {
    entries: IndexMap<ResourceId, Option<Observation>>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start watching `id`. Returns false if it was already watched.
    pub fn track(&mut self, id: ResourceId) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, None);
        true
    }

    /// Stop watching `id` without a transition.
    pub fn untrack(&mut self, id: &ResourceId) -> bool {
        self.entries.shift_remove(id).is_some()
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn observation(&self, id: &ResourceId) -> Option<Observation> {
        self.entries.get(id).copied().flatten()
    }

    pub fn ids(&self) -> Vec<ResourceId> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Diff a fetched collection against the last observations.
    ///
    /// Watched resources found in a terminal status are removed and
    /// reported, once. Others have their observation refreshed. Watched
    /// resources absent from `fetched` are left as they are, and resources
    /// that are not watched are ignored.
    pub fn apply(&mut self, fetched: &[TrackedResource]) -> Vec<Transition> {
        let mut by_id: FxHashMap<&ResourceId, &TrackedResource> = FxHashMap::default();
        for resource in fetched {
            by_id.entry(&resource.id).or_insert(resource);
        }

        let mut transitions = Vec::new();
        for (id, last) in self.entries.iter_mut() {
            let Some(resource) = by_id.get(id) else {
                continue;
            };

            if resource.status.is_terminal() {
                transitions.push(Transition {
                    id: id.clone(),
                    label: resource.label(),
                    from: last.map(|o| o.status),
                    to: resource.status,
                });
            } else {
                *last = Some(Observation {
                    status: resource.status,
                    progress: resource.progress,
                });
            }
        }

        for transition in &transitions {
            self.entries.shift_remove(&transition.id);
        }
        transitions
    }
}
