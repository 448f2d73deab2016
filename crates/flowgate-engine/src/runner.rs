//! Run driver: pushes a run forward by awaiting node executors
//!
//! The driver owns nothing; it borrows the coordinator through a shared
//! lock, snapshots the executable nodes, runs them through the
//! [`NodeExecutor`] without holding the lock, and feeds the results back.
//! It stops on its own at human approval nodes and at terminal runs.

use crate::{NodeExecutor, NodeResult, RunCoordinator};
use flowgate_types::{ActorId, NodeId, RunId, WorkflowId, WorkflowNode, WorkflowResult};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Drives runs of one coordinator with one executor
#[derive(Debug)]
pub struct RunDriver<E> {
    coordinator: Arc<Mutex<RunCoordinator>>,
    executor: Arc<E>,
}

impl<E> Clone for RunDriver<E> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<E: NodeExecutor> RunDriver<E> {
    pub fn new(coordinator: Arc<Mutex<RunCoordinator>>, executor: Arc<E>) -> Self {
        Self {
            coordinator,
            executor,
        }
    }

    /// The shared coordinator, for queries and approvals
    pub fn coordinator(&self) -> &Arc<Mutex<RunCoordinator>> {
        &self.coordinator
    }

    /// Start a run and drive it until it completes, fails, or parks at an
    /// approval node.
    pub async fn start_and_drive(
        &self,
        workflow_id: &WorkflowId,
        triggered_by: ActorId,
    ) -> WorkflowResult<RunId> {
        let run_id = {
            let mut coord = self.coordinator.lock().await;
            coord.start(workflow_id, triggered_by)?
        };
        self.drive(&run_id).await?;
        Ok(run_id)
    }

    /// Drive a run until no executable node remains.
    ///
    /// Returns normally when the run is terminal or every running node is a
    /// human node awaiting approval. The coordinator lock is never held
    /// across an executor await.
    pub async fn drive(&self, run_id: &RunId) -> WorkflowResult<()> {
        loop {
            let batch = self.executable_nodes(run_id).await?;
            if batch.is_empty() {
                return Ok(());
            }

            for (node, input) in batch {
                tracing::debug!(run_id = %run_id, node_id = %node.id, "executing node");
                let result = NodeResult::from(self.executor.execute(&node, &input).await);

                let mut coord = self.coordinator.lock().await;
                // A sibling failure in the same batch ends the run
                if coord.get_run(run_id)?.is_terminal() {
                    return Ok(());
                }
                coord.advance(run_id, &node.id, result)?;
            }
        }
    }

    /// Approve an awaiting node, then keep driving from wherever that took
    /// the run. Returns the node ids the approval started.
    pub async fn approve_and_drive(
        &self,
        run_id: &RunId,
        node_id: &NodeId,
        actor: ActorId,
    ) -> WorkflowResult<Vec<NodeId>> {
        let activated = {
            let mut coord = self.coordinator.lock().await;
            coord.approve(run_id, node_id, actor)?
        };
        self.drive(run_id).await?;
        Ok(activated)
    }

    /// Reject an awaiting node. The run fails; nothing left to drive.
    pub async fn reject(
        &self,
        run_id: &RunId,
        node_id: &NodeId,
        actor: ActorId,
    ) -> WorkflowResult<()> {
        let mut coord = self.coordinator.lock().await;
        coord.reject(run_id, node_id, actor)
    }

    /// Snapshot the running non-human nodes with their inputs
    async fn executable_nodes(
        &self,
        run_id: &RunId,
    ) -> WorkflowResult<Vec<(WorkflowNode, Value)>> {
        let coord = self.coordinator.lock().await;
        let run = coord.get_run(run_id)?;
        if run.is_terminal() {
            return Ok(Vec::new());
        }
        let workflow = coord.definitions().get(&run.workflow_id)?;

        let mut batch = Vec::new();
        for node_id in run.running_nodes() {
            let Some(node) = workflow.get_node(&node_id) else {
                continue;
            };
            if node.requires_approval() {
                continue;
            }
            if let Some(node_run) = run.node_run(&node_id) {
                batch.push((node.clone(), node_run.input.clone()));
            }
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CoordinatorConfig, DefinitionStore};
    use async_trait::async_trait;
    use flowgate_types::{FailureReason, RunStatus, Workflow, WorkflowError};
    use serde_json::json;

    /// Echoes the node id back as output
    struct EchoExecutor;

    #[async_trait]
    impl NodeExecutor for EchoExecutor {
        async fn execute(&self, node: &WorkflowNode, _input: &Value) -> Result<Value, String> {
            Ok(json!({ "executed": node.id.0 }))
        }
    }

    /// Fails exactly one node, succeeds on everything else
    struct FailOn(&'static str);

    #[async_trait]
    impl NodeExecutor for FailOn {
        async fn execute(&self, node: &WorkflowNode, _input: &Value) -> Result<Value, String> {
            if node.id.0 == self.0 {
                Err(format!("{} blew up", self.0))
            } else {
                Ok(json!({}))
            }
        }
    }

    fn approval_workflow() -> Workflow {
        let mut wf = Workflow::new("Review Pipeline", ActorId::new("author"));
        wf.add_node(WorkflowNode::io("fetch", "Fetch")).unwrap();
        wf.add_node(WorkflowNode::human("review", "Review")).unwrap();
        wf.add_node(WorkflowNode::io("publish", "Publish")).unwrap();
        wf.connect(NodeId::new("fetch"), NodeId::new("review"))
            .unwrap();
        wf.connect(NodeId::new("review"), NodeId::new("publish"))
            .unwrap();
        wf
    }

    fn make_driver<E: NodeExecutor>(workflow: Workflow, executor: E) -> (RunDriver<E>, WorkflowId) {
        let mut store = DefinitionStore::new();
        let wf_id = store.publish(workflow).unwrap();
        let coord = RunCoordinator::new(store, CoordinatorConfig::default());
        (
            RunDriver::new(Arc::new(Mutex::new(coord)), Arc::new(executor)),
            wf_id,
        )
    }

    #[tokio::test]
    async fn test_drives_straight_through() {
        let mut wf = Workflow::new("Two Steps", ActorId::new("author"));
        wf.add_node(WorkflowNode::io("a", "A")).unwrap();
        wf.add_node(WorkflowNode::agent("b", "B", "agent-1")).unwrap();
        wf.connect(NodeId::new("a"), NodeId::new("b")).unwrap();

        let (driver, wf_id) = make_driver(wf, EchoExecutor);
        let run_id = driver
            .start_and_drive(&wf_id, ActorId::new("bob"))
            .await
            .unwrap();

        let coord = driver.coordinator().lock().await;
        let run = coord.get_run(&run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        // Executor output is threaded downstream as input
        assert_eq!(
            run.node_run(&NodeId::new("b")).unwrap().input,
            json!({ "executed": "a" })
        );
    }

    #[tokio::test]
    async fn test_parks_at_approval_node() {
        let (driver, wf_id) = make_driver(approval_workflow(), EchoExecutor);
        let run_id = driver
            .start_and_drive(&wf_id, ActorId::new("bob"))
            .await
            .unwrap();

        {
            let coord = driver.coordinator().lock().await;
            let run = coord.get_run(&run_id).unwrap();
            assert_eq!(run.status, RunStatus::Running);
            assert_eq!(run.running_nodes(), vec![NodeId::new("review")]);
            assert_eq!(coord.pending_approvals().len(), 1);
        }

        driver
            .approve_and_drive(&run_id, &NodeId::new("review"), ActorId::new("alice"))
            .await
            .unwrap();

        let coord = driver.coordinator().lock().await;
        assert_eq!(coord.get_run(&run_id).unwrap().status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_reject_fails_run() {
        let (driver, wf_id) = make_driver(approval_workflow(), EchoExecutor);
        let run_id = driver
            .start_and_drive(&wf_id, ActorId::new("bob"))
            .await
            .unwrap();

        driver
            .reject(&run_id, &NodeId::new("review"), ActorId::new("alice"))
            .await
            .unwrap();

        let coord = driver.coordinator().lock().await;
        let run = coord.get_run(&run_id).unwrap();
        assert_eq!(run.status, RunStatus::Error);
        assert_eq!(
            run.failure,
            Some(FailureReason::Rejected {
                node_id: NodeId::new("review")
            })
        );
    }

    #[tokio::test]
    async fn test_executor_failure_stops_driving() {
        let (driver, wf_id) = make_driver(approval_workflow(), FailOn("fetch"));
        let run_id = driver
            .start_and_drive(&wf_id, ActorId::new("bob"))
            .await
            .unwrap();

        let coord = driver.coordinator().lock().await;
        let run = coord.get_run(&run_id).unwrap();
        assert_eq!(run.status, RunStatus::Error);
        assert_eq!(
            run.failure,
            Some(FailureReason::NodeFailed {
                node_id: NodeId::new("fetch")
            })
        );
        assert_eq!(
            run.node_run(&NodeId::new("fetch")).unwrap().error.as_deref(),
            Some("fetch blew up")
        );
        assert!(run.node_run(&NodeId::new("review")).is_none());
    }

    #[tokio::test]
    async fn test_drive_unknown_run() {
        let (driver, _) = make_driver(approval_workflow(), EchoExecutor);
        let result = driver.drive(&RunId::new("ghost")).await;
        assert!(matches!(result, Err(WorkflowError::RunNotFound(_))));
    }
}
