//! Domain types for Flowgate workflows
//!
//! A [`Workflow`] is a directed acyclic graph of nodes (agent calls, logic
//! steps, I/O steps, and human approvals) joined by connections. A
//! [`WorkflowRun`] is one execution of that graph, tracking a [`NodeRun`]
//! per node the coordinator has reached. Every state transition is described
//! by an [`ActivityEntry`].
//!
//! Definitions are immutable once published. To modify, publish a new
//! workflow under a new id.

#![deny(unsafe_code)]

pub mod activity;
pub mod errors;
pub mod ids;
pub mod run;
pub mod workflow;

pub use activity::{ActivityEntry, ActivityFilter, TransitionStatus};
pub use errors::{WorkflowError, WorkflowResult};
pub use ids::{ActorId, NodeId, RunId, WorkflowId};
pub use run::{FailureReason, NodeRun, NodeRunStatus, RunStatus, WorkflowRun};
pub use workflow::{NodeKind, Workflow, WorkflowConnection, WorkflowNode};
