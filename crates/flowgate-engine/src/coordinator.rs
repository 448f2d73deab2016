//! Run coordinator: creates and advances workflow runs
//!
//! The coordinator is the single logical owner of all run state. It
//! sequences node runs along the workflow graph, pauses at human approval
//! nodes, and records every transition in the activity log before the
//! transition is considered complete.
//!
//! **The coordinator never executes nodes itself.** Executors settle
//! agent/logic/io nodes and feed the outcome back through [`advance`];
//! humans settle approval nodes through [`approve`]/[`reject`].
//!
//! [`advance`]: RunCoordinator::advance
//! [`approve`]: RunCoordinator::approve
//! [`reject`]: RunCoordinator::reject

use crate::{ActivityRecorder, ApprovalGate, DefinitionStore, NodeResult, PendingApproval};
use chrono::{DateTime, Utc};
use flowgate_types::{
    ActorId, FailureReason, NodeId, NodeRunStatus, RunId, TransitionStatus, Workflow,
    WorkflowError, WorkflowId, WorkflowResult, WorkflowRun,
};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Configuration handed to the coordinator at construction.
///
/// Replaces any notion of process-wide defaults; everything the engine
/// needs is passed in explicitly.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Buffer size of the activity subscription stream
    pub activity_buffer: usize,
    /// Deadline applied to human nodes that do not set their own,
    /// in seconds from node activation. `None` means no default deadline.
    pub default_approval_deadline_secs: Option<u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            activity_buffer: 256,
            default_approval_deadline_secs: None,
        }
    }
}

/// The run coordinator — coordinates, never executes
#[derive(Debug)]
pub struct RunCoordinator {
    config: CoordinatorConfig,
    /// Published workflow definitions (read-only for the engine)
    definitions: DefinitionStore,
    /// All runs, active and terminal; terminal runs are never deleted
    runs: HashMap<RunId, WorkflowRun>,
    /// Approval validation and deadline detection
    gate: ApprovalGate,
    /// Append-only transition log
    recorder: ActivityRecorder,
}

impl RunCoordinator {
    /// Create a coordinator over a definition store
    pub fn new(definitions: DefinitionStore, config: CoordinatorConfig) -> Self {
        let recorder = ActivityRecorder::new(config.activity_buffer);
        Self {
            config,
            definitions,
            runs: HashMap::new(),
            gate: ApprovalGate::new(),
            recorder,
        }
    }

    // ── Definitions ──────────────────────────────────────────────────

    /// Publish a workflow definition through the coordinator's store
    pub fn publish_workflow(&mut self, workflow: Workflow) -> WorkflowResult<WorkflowId> {
        self.definitions.publish(workflow)
    }

    /// The definition store
    pub fn definitions(&self) -> &DefinitionStore {
        &self.definitions
    }

    // ── Run lifecycle ────────────────────────────────────────────────

    /// Start a new run of a published workflow.
    ///
    /// Fails with `InvalidGraph` if the definition is malformed (cyclic,
    /// not exactly one entry node) and `WorkflowNotFound` if unknown.
    /// On success the run is `Running` and the entry node's node run has
    /// been started.
    pub fn start(
        &mut self,
        workflow_id: &WorkflowId,
        triggered_by: ActorId,
    ) -> WorkflowResult<RunId> {
        let workflow = self.definitions.get(workflow_id)?.clone();
        workflow.validate()?;
        let entry = workflow
            .entry_node()
            .ok_or_else(|| WorkflowError::InvalidGraph("workflow has no entry node".into()))?;

        let mut run = WorkflowRun::new(workflow_id.clone(), triggered_by);
        let run_id = run.id.clone();

        self.recorder.record(
            &run_id,
            None,
            TransitionStatus::Idle,
            TransitionStatus::Running,
            Some(&run.triggered_by),
        );

        run.start_node(entry.id.clone(), Value::Null);
        self.recorder.record(
            &run_id,
            Some(&entry.id),
            TransitionStatus::Idle,
            TransitionStatus::Running,
            None,
        );

        tracing::info!(
            run_id = %run_id,
            workflow_id = %workflow_id,
            triggered_by = %run.triggered_by,
            "workflow run started"
        );

        self.runs.insert(run_id.clone(), run);
        Ok(run_id)
    }

    /// Feed a settled node execution back into the run.
    ///
    /// On success the node run completes and every target of the node's
    /// outgoing connections is started (fan-out; a target that already has
    /// a node run is left alone — first incoming edge wins). On failure the
    /// node run and the whole run go to `Error` and no further nodes are
    /// scheduled.
    ///
    /// Returns the node ids started by this call.
    pub fn advance(
        &mut self,
        run_id: &RunId,
        node_id: &NodeId,
        result: NodeResult,
    ) -> WorkflowResult<Vec<NodeId>> {
        match result {
            NodeResult::Success { output } => {
                self.complete_node_inner(run_id, node_id, output, None)
            }
            NodeResult::Failure { error } => {
                self.fail_node_inner(
                    run_id,
                    node_id,
                    &error,
                    FailureReason::NodeFailed {
                        node_id: node_id.clone(),
                    },
                    None,
                )?;
                Ok(Vec::new())
            }
        }
    }

    /// Stop a run. The run goes to `Error` with reason `Cancelled`; nodes
    /// still running are failed, completed node effects are not rolled back.
    pub fn stop(&mut self, run_id: &RunId, actor: ActorId) -> WorkflowResult<()> {
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| WorkflowError::RunNotFound(run_id.clone()))?;
        if run.is_terminal() {
            return Err(WorkflowError::RunAlreadyTerminal(run_id.clone()));
        }

        for node_id in run.running_nodes() {
            if let Some(node_run) = run.node_runs.get_mut(&node_id) {
                node_run.fail("run cancelled");
                self.recorder.record(
                    run_id,
                    Some(&node_id),
                    TransitionStatus::Running,
                    TransitionStatus::Error,
                    Some(&actor),
                );
            }
        }

        run.fail(FailureReason::Cancelled);
        self.recorder.record(
            run_id,
            None,
            TransitionStatus::Running,
            TransitionStatus::Error,
            Some(&actor),
        );

        tracing::info!(run_id = %run_id, stopped_by = %actor, "workflow run cancelled");
        Ok(())
    }

    // ── Approvals ────────────────────────────────────────────────────

    /// Approve a human node currently awaiting approval.
    ///
    /// `NotAwaitingApproval` if the node is not approval-gated or was never
    /// reached; `AlreadyResolved` if the approval already settled (safe
    /// no-op, nothing mutates).
    pub fn approve(
        &mut self,
        run_id: &RunId,
        node_id: &NodeId,
        actor: ActorId,
    ) -> WorkflowResult<Vec<NodeId>> {
        let workflow = self.workflow_for(run_id)?;
        let node = workflow
            .get_node(node_id)
            .ok_or_else(|| WorkflowError::NodeNotFound(node_id.clone()))?;
        let run = self
            .runs
            .get(run_id)
            .ok_or_else(|| WorkflowError::RunNotFound(run_id.clone()))?;

        self.gate.check_awaiting(run, node)?;
        if run.is_terminal() {
            return Err(WorkflowError::RunAlreadyTerminal(run_id.clone()));
        }

        tracing::info!(run_id = %run_id, node_id = %node_id, approver = %actor, "approval granted");
        self.complete_node_inner(run_id, node_id, json!({ "approved": true }), Some(&actor))
    }

    /// Reject a human node currently awaiting approval. The run goes to
    /// `Error` with reason `Rejected`. Same preconditions as [`approve`].
    ///
    /// [`approve`]: RunCoordinator::approve
    pub fn reject(
        &mut self,
        run_id: &RunId,
        node_id: &NodeId,
        actor: ActorId,
    ) -> WorkflowResult<()> {
        let workflow = self.workflow_for(run_id)?;
        let node = workflow
            .get_node(node_id)
            .ok_or_else(|| WorkflowError::NodeNotFound(node_id.clone()))?;
        let run = self
            .runs
            .get(run_id)
            .ok_or_else(|| WorkflowError::RunNotFound(run_id.clone()))?;

        self.gate.check_awaiting(run, node)?;
        if run.is_terminal() {
            return Err(WorkflowError::RunAlreadyTerminal(run_id.clone()));
        }

        tracing::info!(run_id = %run_id, node_id = %node_id, rejected_by = %actor, "approval rejected");
        self.fail_node_inner(
            run_id,
            node_id,
            "approval rejected",
            FailureReason::Rejected {
                node_id: node_id.clone(),
            },
            Some(&actor),
        )
    }

    /// Sweep all active runs for approvals whose deadline has passed as of
    /// `now` and auto-reject them with reason `TimedOut`.
    ///
    /// The engine does not own a timer; callers schedule this check.
    /// Returns the (run, node) pairs that timed out.
    pub fn check_deadlines(&mut self, now: DateTime<Utc>) -> Vec<(RunId, NodeId)> {
        let mut expired = Vec::new();
        for run in self.runs.values() {
            if run.is_terminal() {
                continue;
            }
            if let Ok(workflow) = self.definitions.get(&run.workflow_id) {
                for node_id in self.gate.expired(
                    run,
                    workflow,
                    self.config.default_approval_deadline_secs,
                    now,
                ) {
                    expired.push((run.id.clone(), node_id));
                }
            }
        }

        for (run_id, node_id) in &expired {
            tracing::warn!(run_id = %run_id, node_id = %node_id, "approval deadline expired");
            // A sibling expiry in the same run may already have failed it
            let _ = self.fail_node_inner(
                run_id,
                node_id,
                "approval deadline expired",
                FailureReason::TimedOut {
                    node_id: node_id.clone(),
                },
                None,
            );
        }

        expired
    }

    /// All approvals awaiting resolution across active runs
    pub fn pending_approvals(&self) -> Vec<PendingApproval> {
        let mut pending = Vec::new();
        for run in self.runs.values() {
            if run.is_terminal() {
                continue;
            }
            if let Ok(workflow) = self.definitions.get(&run.workflow_id) {
                pending.extend(self.gate.pending(
                    run,
                    workflow,
                    self.config.default_approval_deadline_secs,
                ));
            }
        }
        pending
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Get a run; terminal runs stay queryable indefinitely
    pub fn get_run(&self, run_id: &RunId) -> WorkflowResult<&WorkflowRun> {
        self.runs
            .get(run_id)
            .ok_or_else(|| WorkflowError::RunNotFound(run_id.clone()))
    }

    /// Node ids currently running (or awaiting approval) in one run
    pub fn pending_nodes(&self, run_id: &RunId) -> WorkflowResult<Vec<NodeId>> {
        Ok(self.get_run(run_id)?.running_nodes())
    }

    /// All runs of one workflow, newest first
    pub fn runs_for_workflow(&self, workflow_id: &WorkflowId) -> Vec<&WorkflowRun> {
        let mut runs: Vec<&WorkflowRun> = self
            .runs
            .values()
            .filter(|r| &r.workflow_id == workflow_id)
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs
    }

    /// All non-terminal runs
    pub fn active_runs(&self) -> Vec<&WorkflowRun> {
        self.runs.values().filter(|r| !r.is_terminal()).collect()
    }

    /// Total number of runs (active + terminal)
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// The activity log
    pub fn activity(&self) -> &ActivityRecorder {
        &self.recorder
    }

    /// Subscribe to the live activity stream
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<flowgate_types::ActivityEntry> {
        self.recorder.subscribe()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn workflow_for(&self, run_id: &RunId) -> WorkflowResult<Workflow> {
        let run = self
            .runs
            .get(run_id)
            .ok_or_else(|| WorkflowError::RunNotFound(run_id.clone()))?;
        Ok(self.definitions.get(&run.workflow_id)?.clone())
    }

    /// Complete a running node, fan out to its successors, and complete the
    /// run if nothing is left running.
    fn complete_node_inner(
        &mut self,
        run_id: &RunId,
        node_id: &NodeId,
        output: Value,
        actor: Option<&ActorId>,
    ) -> WorkflowResult<Vec<NodeId>> {
        let workflow = self.workflow_for(run_id)?;
        if workflow.get_node(node_id).is_none() {
            return Err(WorkflowError::NodeNotFound(node_id.clone()));
        }

        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| WorkflowError::RunNotFound(run_id.clone()))?;
        if run.is_terminal() {
            return Err(WorkflowError::RunAlreadyTerminal(run_id.clone()));
        }

        {
            let node_run = run
                .node_runs
                .get_mut(node_id)
                .ok_or_else(|| WorkflowError::NodeNotRunning(node_id.clone()))?;
            if node_run.status != NodeRunStatus::Running {
                return Err(WorkflowError::NodeNotRunning(node_id.clone()));
            }
            node_run.complete(output.clone());
        }
        self.recorder.record(
            run_id,
            Some(node_id),
            TransitionStatus::Running,
            TransitionStatus::Completed,
            actor,
        );

        // Fan-out: successor input is the completed node's output
        let mut activated = Vec::new();
        for conn in workflow.outgoing(node_id) {
            if run.start_node(conn.target.clone(), output.clone()) {
                self.recorder.record(
                    run_id,
                    Some(&conn.target),
                    TransitionStatus::Idle,
                    TransitionStatus::Running,
                    None,
                );
                activated.push(conn.target.clone());
            }
        }

        if run.running_nodes().is_empty() {
            run.complete();
            self.recorder.record(
                run_id,
                None,
                TransitionStatus::Running,
                TransitionStatus::Completed,
                None,
            );
            tracing::info!(run_id = %run_id, "workflow run completed");
        }

        Ok(activated)
    }

    /// Fail a running node and the whole run; no further scheduling.
    fn fail_node_inner(
        &mut self,
        run_id: &RunId,
        node_id: &NodeId,
        error: &str,
        reason: FailureReason,
        actor: Option<&ActorId>,
    ) -> WorkflowResult<()> {
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| WorkflowError::RunNotFound(run_id.clone()))?;
        if run.is_terminal() {
            return Err(WorkflowError::RunAlreadyTerminal(run_id.clone()));
        }

        {
            let node_run = run
                .node_runs
                .get_mut(node_id)
                .ok_or_else(|| WorkflowError::NodeNotRunning(node_id.clone()))?;
            if node_run.status != NodeRunStatus::Running {
                return Err(WorkflowError::NodeNotRunning(node_id.clone()));
            }
            node_run.fail(error);
        }
        self.recorder.record(
            run_id,
            Some(node_id),
            TransitionStatus::Running,
            TransitionStatus::Error,
            actor,
        );

        run.fail(reason.clone());
        self.recorder.record(
            run_id,
            None,
            TransitionStatus::Running,
            TransitionStatus::Error,
            actor,
        );

        tracing::warn!(run_id = %run_id, reason = %reason, "workflow run failed");
        Ok(())
    }
}
