//! Node executor: the collaborator that does the actual work
//!
//! The engine coordinates; it never executes agent/logic/io nodes itself.
//! Callers hand the coordinator a settled [`NodeResult`] — typically
//! produced by awaiting a [`NodeExecutor`] through the run driver. Human
//! nodes never go through the executor; they resolve via the approval gate.

use async_trait::async_trait;
use flowgate_types::WorkflowNode;
use serde_json::Value;

/// Executes one non-human node. Implemented outside the engine
/// (agent runtimes, scripted logic, I/O adapters).
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Execute a node with its input payload. `Err` carries a
    /// human-readable failure message that ends up on the node run.
    async fn execute(&self, node: &WorkflowNode, input: &Value) -> Result<Value, String>;
}

/// The settled outcome of one node execution
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeResult {
    Success { output: Value },
    Failure { error: String },
}

impl NodeResult {
    pub fn success(output: Value) -> Self {
        Self::Success { output }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }
}

impl From<Result<Value, String>> for NodeResult {
    fn from(result: Result<Value, String>) -> Self {
        match result {
            Ok(output) => Self::Success { output },
            Err(error) => Self::Failure { error },
        }
    }
}
