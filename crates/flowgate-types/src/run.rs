//! Workflow runs: one execution instance of a workflow
//!
//! A run tracks a [`NodeRun`] per node the coordinator has reached. Node
//! runs are created lazily — a node downstream of a failure never gets one.
//! Runs are terminal once `Completed` or `Error` and are never deleted;
//! failed and cancelled runs stay queryable indefinitely.

use crate::{ActorId, NodeId, RunId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ── Run Status ───────────────────────────────────────────────────────

/// The lifecycle state of a workflow run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// At least one node run is running or more nodes are still schedulable
    #[default]
    Running,
    /// Every reachable node finished successfully
    Completed,
    /// A node failed, an approval was rejected or timed out, or the run
    /// was cancelled
    Error,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Why a run ended in `Error`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// A node executor returned an error
    NodeFailed { node_id: NodeId },
    /// An approval was explicitly rejected
    Rejected { node_id: NodeId },
    /// An approval deadline expired
    TimedOut { node_id: NodeId },
    /// The run was stopped by an actor
    Cancelled,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeFailed { node_id } => write!(f, "node '{}' failed", node_id),
            Self::Rejected { node_id } => write!(f, "approval for node '{}' rejected", node_id),
            Self::TimedOut { node_id } => write!(f, "approval for node '{}' timed out", node_id),
            Self::Cancelled => write!(f, "run cancelled"),
        }
    }
}

// ── Node Run ─────────────────────────────────────────────────────────

/// Status of one node within one run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeRunStatus {
    /// Created but not yet started
    #[default]
    Idle,
    /// Executing, or awaiting approval for human nodes
    Running,
    /// Finished successfully
    Completed,
    /// Failed, was rejected, or timed out
    Error,
}

impl NodeRunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// The execution record of one node within one run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeRun {
    /// The node this record belongs to
    pub node_id: NodeId,
    /// Current status
    pub status: NodeRunStatus,
    /// When the node started running
    pub started_at: DateTime<Utc>,
    /// When the node reached a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Input payload handed to the executor
    pub input: Value,
    /// Output payload, present once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Error message, present once failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeRun {
    /// Create a node run in `Running` state
    pub fn start(node_id: NodeId, input: Value) -> Self {
        Self {
            node_id,
            status: NodeRunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            input,
            output: None,
            error: None,
        }
    }

    /// Mark the node run completed with an output payload
    pub fn complete(&mut self, output: Value) {
        self.status = NodeRunStatus::Completed;
        self.ended_at = Some(Utc::now());
        self.output = Some(output);
    }

    /// Mark the node run failed
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = NodeRunStatus::Error;
        self.ended_at = Some(Utc::now());
        self.error = Some(error.into());
    }
}

// ── Workflow Run ─────────────────────────────────────────────────────

/// One execution instance of a workflow
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Unique run identifier
    pub id: RunId,
    /// The workflow this run executes
    pub workflow_id: WorkflowId,
    /// Current status
    pub status: RunStatus,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Node runs, keyed by node id; created lazily as nodes are reached
    pub node_runs: HashMap<NodeId, NodeRun>,
    /// Who triggered this run
    pub triggered_by: ActorId,
    /// Why the run errored, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl WorkflowRun {
    /// Create a new run in `Running` state
    pub fn new(workflow_id: WorkflowId, triggered_by: ActorId) -> Self {
        Self {
            id: RunId::generate(),
            workflow_id,
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            node_runs: HashMap::new(),
            triggered_by,
            failure: None,
        }
    }

    /// Check if the run is terminal
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Get a node run
    pub fn node_run(&self, node_id: &NodeId) -> Option<&NodeRun> {
        self.node_runs.get(node_id)
    }

    /// Node ids whose node runs are currently `Running`
    pub fn running_nodes(&self) -> Vec<NodeId> {
        self.node_runs
            .values()
            .filter(|nr| nr.status == NodeRunStatus::Running)
            .map(|nr| nr.node_id.clone())
            .collect()
    }

    /// Start a node run; a no-op if one already exists for this node.
    ///
    /// Returns true if a node run was created. Join semantics: the first
    /// incoming edge starts a node, later edges find it already started.
    pub fn start_node(&mut self, node_id: NodeId, input: Value) -> bool {
        if self.node_runs.contains_key(&node_id) {
            return false;
        }
        self.node_runs
            .insert(node_id.clone(), NodeRun::start(node_id, input));
        true
    }

    /// Complete the run
    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.ended_at = Some(Utc::now());
    }

    /// Fail the run with a reason
    pub fn fail(&mut self, reason: FailureReason) {
        self.status = RunStatus::Error;
        self.ended_at = Some(Utc::now());
        self.failure = Some(reason);
    }

    /// Run duration, once terminal
    pub fn execution_time(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }
}
