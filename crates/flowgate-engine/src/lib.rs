//! Flowgate engine: workflow run coordination with human approvals
//!
//! The engine takes validated workflow definitions and drives runs of them:
//! sequencing node executions along the graph, pausing at human approval
//! nodes, enforcing approval deadlines, and recording every state
//! transition in an append-only activity log.
//!
//! The coordinator never performs node work itself. Executors settle
//! agent/logic/io nodes and feed outcomes back through
//! [`RunCoordinator::advance`]; humans settle approval nodes through
//! [`RunCoordinator::approve`] and [`RunCoordinator::reject`]. For async
//! callers, [`RunDriver`] wires a [`NodeExecutor`] to a shared coordinator
//! and drives runs until they complete or park at an approval.
//!
//! ```
//! use flowgate_engine::{CoordinatorConfig, DefinitionStore, NodeResult, RunCoordinator};
//! use flowgate_types::{ActorId, NodeId, RunStatus, Workflow, WorkflowNode};
//! use serde_json::json;
//!
//! # fn main() -> flowgate_types::WorkflowResult<()> {
//! let mut workflow = Workflow::new("Review Pipeline", ActorId::new("author"));
//! workflow.add_node(WorkflowNode::io("fetch", "Fetch"))?;
//! workflow.add_node(WorkflowNode::human("review", "Review"))?;
//! workflow.connect(NodeId::new("fetch"), NodeId::new("review"))?;
//!
//! let mut coordinator = RunCoordinator::new(DefinitionStore::new(), CoordinatorConfig::default());
//! let workflow_id = coordinator.publish_workflow(workflow)?;
//!
//! let run_id = coordinator.start(&workflow_id, ActorId::new("bob"))?;
//! coordinator.advance(&run_id, &NodeId::new("fetch"), NodeResult::success(json!({})))?;
//! coordinator.approve(&run_id, &NodeId::new("review"), ActorId::new("alice"))?;
//!
//! assert_eq!(coordinator.get_run(&run_id)?.status, RunStatus::Completed);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

mod approval_gate;
mod coordinator;
mod definition_store;
mod executor;
mod recorder;
mod runner;

pub use approval_gate::{ApprovalGate, PendingApproval};
pub use coordinator::{CoordinatorConfig, RunCoordinator};
pub use definition_store::DefinitionStore;
pub use executor::{NodeExecutor, NodeResult};
pub use recorder::ActivityRecorder;
pub use runner::RunDriver;
