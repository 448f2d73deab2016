//! Error type shared by all Flowgate crates

use crate::{NodeId, RunId, WorkflowId};
use thiserror::Error;

/// Result alias used throughout the workspace
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Everything that can go wrong in the workflow engine.
///
/// Approval misuse (`NotAwaitingApproval`, `AlreadyResolved`) is returned to
/// the caller without mutating any state. Execution failures propagate to the
/// node run and then to the run itself; nothing is retried automatically.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("invalid workflow graph: {0}")]
    InvalidGraph(String),

    #[error("workflow '{0}' not found")]
    WorkflowNotFound(WorkflowId),

    #[error("workflow '{0}' is already published")]
    AlreadyPublished(WorkflowId),

    #[error("run '{0}' not found")]
    RunNotFound(RunId),

    #[error("node '{0}' not found")]
    NodeNotFound(NodeId),

    #[error("run '{0}' is already in a terminal state")]
    RunAlreadyTerminal(RunId),

    #[error("node '{0}' is not running")]
    NodeNotRunning(NodeId),

    #[error("node '{0}' is not awaiting approval")]
    NotAwaitingApproval(NodeId),

    #[error("approval for node '{0}' was already resolved")]
    AlreadyResolved(NodeId),

    #[error("node '{node_id}' execution failed: {message}")]
    NodeExecutionError { node_id: NodeId, message: String },

    #[error("run was cancelled")]
    Cancelled,
}
