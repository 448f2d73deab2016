//! Activity entries: the append-only record of state transitions
//!
//! Every run-level and node-level transition produces exactly one entry.
//! Entries carry a monotonically increasing sequence; per-run order matches
//! the order the transitions occurred in.

use crate::{ActorId, NodeId, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A status value as it appears in a transition.
///
/// The same four states describe both run-level and node-level transitions;
/// a run begins with an `Idle -> Running` entry just like a node does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStatus {
    Idle,
    Running,
    Completed,
    Error,
}

impl std::fmt::Display for TransitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// One state transition in the activity log
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Monotonically increasing sequence number within one recorder
    pub sequence: u64,
    /// When the transition occurred
    pub timestamp: DateTime<Utc>,
    /// The run this transition belongs to
    pub run_id: RunId,
    /// The node this transition belongs to; `None` for run-level transitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Status before the transition
    pub from_status: TransitionStatus,
    /// Status after the transition
    pub to_status: TransitionStatus,
    /// Who caused the transition; `None` for engine-driven transitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<ActorId>,
}

impl ActivityEntry {
    /// Whether this is a run-level transition
    pub fn is_run_level(&self) -> bool {
        self.node_id.is_none()
    }
}

/// Filter for querying the activity log.
///
/// An unset field matches everything; set fields must all match.
#[derive(Clone, Debug, Default)]
pub struct ActivityFilter {
    pub run_id: Option<RunId>,
    pub node_id: Option<NodeId>,
    pub actor: Option<ActorId>,
}

impl ActivityFilter {
    pub fn for_run(run_id: RunId) -> Self {
        Self {
            run_id: Some(run_id),
            ..Self::default()
        }
    }

    pub fn with_node(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    pub fn with_actor(mut self, actor: ActorId) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Check whether an entry passes this filter
    pub fn matches(&self, entry: &ActivityEntry) -> bool {
        if let Some(run_id) = &self.run_id {
            if &entry.run_id != run_id {
                return false;
            }
        }
        if let Some(node_id) = &self.node_id {
            if entry.node_id.as_ref() != Some(node_id) {
                return false;
            }
        }
        if let Some(actor) = &self.actor {
            if entry.actor.as_ref() != Some(actor) {
                return false;
            }
        }
        true
    }
}
