//! Approval gate: pause/resume for human-in-the-loop nodes
//!
//! A human node's run sits in `Running` until someone approves or rejects
//! it. The gate validates resolutions and detects expired deadlines; it
//! never mutates run state itself — the coordinator acts on its answers.

use chrono::{DateTime, Duration, Utc};
use flowgate_types::{
    ActorId, NodeId, NodeKind, NodeRun, RunId, Workflow, WorkflowError, WorkflowId, WorkflowNode,
    WorkflowResult, WorkflowRun,
};
use serde::Serialize;

/// An approval currently awaiting resolution
#[derive(Clone, Debug, Serialize)]
pub struct PendingApproval {
    pub run_id: RunId,
    pub workflow_id: WorkflowId,
    pub node_id: NodeId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<ActorId>,
    pub requested_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

/// Validates approval resolutions and detects expired deadlines
#[derive(Clone, Debug, Default)]
pub struct ApprovalGate;

impl ApprovalGate {
    pub fn new() -> Self {
        Self
    }

    /// Check that a node is currently awaiting approval.
    ///
    /// Returns `NotAwaitingApproval` for non-human nodes and nodes that were
    /// never reached, and `AlreadyResolved` for approvals that already
    /// settled — both without any state change, so a duplicate resolution
    /// is a safe no-op for the caller.
    pub fn check_awaiting(&self, run: &WorkflowRun, node: &WorkflowNode) -> WorkflowResult<()> {
        if !node.requires_approval() {
            return Err(WorkflowError::NotAwaitingApproval(node.id.clone()));
        }
        match run.node_run(&node.id) {
            None => Err(WorkflowError::NotAwaitingApproval(node.id.clone())),
            Some(nr) if nr.status.is_terminal() => {
                Err(WorkflowError::AlreadyResolved(node.id.clone()))
            }
            Some(_) => Ok(()),
        }
    }

    /// All approvals awaiting resolution in one run
    pub fn pending(
        &self,
        run: &WorkflowRun,
        workflow: &Workflow,
        default_deadline_secs: Option<u64>,
    ) -> Vec<PendingApproval> {
        self.awaiting(run, workflow)
            .map(|(node, nr)| PendingApproval {
                run_id: run.id.clone(),
                workflow_id: run.workflow_id.clone(),
                node_id: node.id.clone(),
                title: node.title.clone(),
                assignee: node_assignee(node).cloned(),
                requested_at: nr.started_at,
                deadline: approval_deadline(node, nr, default_deadline_secs),
            })
            .collect()
    }

    /// Node ids whose approval deadline has passed as of `now`.
    ///
    /// Detection only; the coordinator turns these into timed-out
    /// rejections. Passing `now` keeps the sweep deterministic under test.
    pub fn expired(
        &self,
        run: &WorkflowRun,
        workflow: &Workflow,
        default_deadline_secs: Option<u64>,
        now: DateTime<Utc>,
    ) -> Vec<NodeId> {
        self.awaiting(run, workflow)
            .filter(|(node, nr)| {
                approval_deadline(node, nr, default_deadline_secs)
                    .map(|deadline| now >= deadline)
                    .unwrap_or(false)
            })
            .map(|(node, _)| node.id.clone())
            .collect()
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Human nodes with a node run currently awaiting resolution
    fn awaiting<'a>(
        &self,
        run: &'a WorkflowRun,
        workflow: &'a Workflow,
    ) -> impl Iterator<Item = (&'a WorkflowNode, &'a NodeRun)> {
        run.node_runs.values().filter_map(move |nr| {
            let node = workflow.get_node(&nr.node_id)?;
            if node.requires_approval() && !nr.status.is_terminal() {
                Some((node, nr))
            } else {
                None
            }
        })
    }
}

fn node_assignee(node: &WorkflowNode) -> Option<&ActorId> {
    match &node.kind {
        NodeKind::Human { assignee, .. } => assignee.as_ref(),
        _ => None,
    }
}

/// The moment an awaiting approval expires: node deadline first, then the
/// coordinator-wide default, else no deadline at all.
fn approval_deadline(
    node: &WorkflowNode,
    node_run: &NodeRun,
    default_deadline_secs: Option<u64>,
) -> Option<DateTime<Utc>> {
    let secs = match &node.kind {
        NodeKind::Human { deadline_secs, .. } => deadline_secs.or(default_deadline_secs),
        _ => None,
    }?;
    Some(node_run.started_at + Duration::seconds(secs as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgate_types::WorkflowRun;
    use serde_json::Value;

    fn make_workflow() -> Workflow {
        let mut wf = Workflow::new("Review", ActorId::new("author"));
        wf.add_node(WorkflowNode::io("fetch", "Fetch")).unwrap();
        wf.add_node(
            WorkflowNode::human("review", "Review")
                .with_assignee(ActorId::new("alice"))
                .with_deadline_secs(3600),
        )
        .unwrap();
        wf.connect(NodeId::new("fetch"), NodeId::new("review"))
            .unwrap();
        wf
    }

    fn make_run(wf: &Workflow) -> WorkflowRun {
        let mut run = WorkflowRun::new(wf.id.clone(), ActorId::new("bob"));
        run.start_node(NodeId::new("fetch"), Value::Null);
        run
    }

    #[test]
    fn test_check_awaiting_ok() {
        let wf = make_workflow();
        let mut run = make_run(&wf);
        run.start_node(NodeId::new("review"), Value::Null);

        let gate = ApprovalGate::new();
        let node = wf.get_node(&NodeId::new("review")).unwrap();
        assert!(gate.check_awaiting(&run, node).is_ok());
    }

    #[test]
    fn test_check_non_approval_node() {
        let wf = make_workflow();
        let run = make_run(&wf);

        let gate = ApprovalGate::new();
        let node = wf.get_node(&NodeId::new("fetch")).unwrap();
        assert!(matches!(
            gate.check_awaiting(&run, node),
            Err(WorkflowError::NotAwaitingApproval(_))
        ));
    }

    #[test]
    fn test_check_unreached_node() {
        let wf = make_workflow();
        let run = make_run(&wf);

        let gate = ApprovalGate::new();
        let node = wf.get_node(&NodeId::new("review")).unwrap();
        assert!(matches!(
            gate.check_awaiting(&run, node),
            Err(WorkflowError::NotAwaitingApproval(_))
        ));
    }

    #[test]
    fn test_check_already_resolved() {
        let wf = make_workflow();
        let mut run = make_run(&wf);
        run.start_node(NodeId::new("review"), Value::Null);
        run.node_runs
            .get_mut(&NodeId::new("review"))
            .unwrap()
            .complete(Value::Null);

        let gate = ApprovalGate::new();
        let node = wf.get_node(&NodeId::new("review")).unwrap();
        assert!(matches!(
            gate.check_awaiting(&run, node),
            Err(WorkflowError::AlreadyResolved(_))
        ));
    }

    #[test]
    fn test_pending() {
        let wf = make_workflow();
        let mut run = make_run(&wf);
        run.start_node(NodeId::new("review"), Value::Null);

        let gate = ApprovalGate::new();
        let pending = gate.pending(&run, &wf, None);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].node_id, NodeId::new("review"));
        assert_eq!(pending[0].assignee, Some(ActorId::new("alice")));
        assert!(pending[0].deadline.is_some());
    }

    #[test]
    fn test_expired_sweep() {
        let wf = make_workflow();
        let mut run = make_run(&wf);
        run.start_node(NodeId::new("review"), Value::Null);

        let gate = ApprovalGate::new();
        let started = run.node_run(&NodeId::new("review")).unwrap().started_at;

        // Before the deadline
        assert!(gate
            .expired(&run, &wf, None, started + Duration::seconds(10))
            .is_empty());

        // After the deadline
        let expired = gate.expired(&run, &wf, None, started + Duration::seconds(3601));
        assert_eq!(expired, vec![NodeId::new("review")]);
    }

    #[test]
    fn test_default_deadline_applies_when_node_has_none() {
        let mut wf = Workflow::new("Review", ActorId::new("author"));
        wf.add_node(WorkflowNode::human("review", "Review")).unwrap();

        let mut run = WorkflowRun::new(wf.id.clone(), ActorId::new("bob"));
        run.start_node(NodeId::new("review"), Value::Null);
        let started = run.node_run(&NodeId::new("review")).unwrap().started_at;

        let gate = ApprovalGate::new();
        // No node deadline, no default: never expires
        assert!(gate
            .expired(&run, &wf, None, started + Duration::days(365))
            .is_empty());
        // Coordinator-wide default kicks in
        let expired = gate.expired(&run, &wf, Some(60), started + Duration::seconds(61));
        assert_eq!(expired, vec![NodeId::new("review")]);
    }
}
