//! Workflow definitions: directed acyclic graphs of work
//!
//! A workflow is a set of nodes joined by directed connections. Sequencing
//! is deterministic because the graph must be acyclic with exactly one entry
//! node (no incoming connections). Definitions are immutable once published;
//! to modify, publish a new workflow.

use crate::{ActorId, NodeId, WorkflowError, WorkflowId, WorkflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

// ── Workflow ─────────────────────────────────────────────────────────

/// A workflow definition — the blueprint a run executes
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier
    pub id: WorkflowId,
    /// Human-readable title
    pub title: String,
    /// Description of what this workflow accomplishes
    pub description: String,
    /// The nodes in the graph
    pub nodes: Vec<WorkflowNode>,
    /// The directed connections in the graph
    pub connections: Vec<WorkflowConnection>,
    /// Who authored this workflow
    pub created_by: ActorId,
    /// When this definition was created
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    /// Create a new, empty workflow definition
    pub fn new(title: impl Into<String>, created_by: ActorId) -> Self {
        Self {
            id: WorkflowId::generate(),
            title: title.into(),
            description: String::new(),
            nodes: Vec::new(),
            connections: Vec::new(),
            created_by,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a node to the workflow graph
    pub fn add_node(&mut self, node: WorkflowNode) -> WorkflowResult<()> {
        if self.nodes.iter().any(|n| n.id == node.id) {
            return Err(WorkflowError::InvalidGraph(format!(
                "duplicate node id '{}'",
                node.id
            )));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Add a directed connection between two existing nodes
    pub fn connect(&mut self, source: NodeId, target: NodeId) -> WorkflowResult<()> {
        if !self.nodes.iter().any(|n| n.id == source) {
            return Err(WorkflowError::NodeNotFound(source));
        }
        if !self.nodes.iter().any(|n| n.id == target) {
            return Err(WorkflowError::NodeNotFound(target));
        }
        if self
            .connections
            .iter()
            .any(|c| c.source == source && c.target == target)
        {
            return Err(WorkflowError::InvalidGraph(format!(
                "duplicate connection '{}' -> '{}'",
                source, target
            )));
        }
        self.connections.push(WorkflowConnection::new(source, target));
        Ok(())
    }

    /// Get a node by id
    pub fn get_node(&self, id: &NodeId) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// The single entry node (no incoming connections), if well formed
    pub fn entry_node(&self) -> Option<&WorkflowNode> {
        let mut entries = self
            .nodes
            .iter()
            .filter(|n| !self.connections.iter().any(|c| c.target == n.id));
        let first = entries.next();
        match entries.next() {
            // More than one entry: not well formed, validation will reject
            Some(_) => None,
            None => first,
        }
    }

    /// Outgoing connections from a node
    pub fn outgoing(&self, node_id: &NodeId) -> Vec<&WorkflowConnection> {
        self.connections
            .iter()
            .filter(|c| &c.source == node_id)
            .collect()
    }

    /// Incoming connections to a node
    pub fn incoming(&self, node_id: &NodeId) -> Vec<&WorkflowConnection> {
        self.connections
            .iter()
            .filter(|c| &c.target == node_id)
            .collect()
    }

    /// Check if a node is terminal (no outgoing connections)
    pub fn is_terminal_node(&self, node_id: &NodeId) -> bool {
        self.outgoing(node_id).is_empty()
    }

    /// Validate the workflow for structural correctness.
    ///
    /// Enforces: at least one node, unique node ids, connections referencing
    /// existing nodes, exactly one entry node, an acyclic graph, and every
    /// node reachable from the entry.
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.nodes.is_empty() {
            return Err(WorkflowError::InvalidGraph(
                "workflow must have at least one node".into(),
            ));
        }

        let mut seen_ids = HashSet::new();
        for node in &self.nodes {
            if !seen_ids.insert(&node.id) {
                return Err(WorkflowError::InvalidGraph(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        for conn in &self.connections {
            if !seen_ids.contains(&conn.source) {
                return Err(WorkflowError::NodeNotFound(conn.source.clone()));
            }
            if !seen_ids.contains(&conn.target) {
                return Err(WorkflowError::NodeNotFound(conn.target.clone()));
            }
        }

        let entries: Vec<&WorkflowNode> = self
            .nodes
            .iter()
            .filter(|n| self.incoming(&n.id).is_empty())
            .collect();
        if entries.is_empty() {
            return Err(WorkflowError::InvalidGraph(
                "workflow has no entry node".into(),
            ));
        }
        if entries.len() > 1 {
            return Err(WorkflowError::InvalidGraph(format!(
                "workflow must have exactly one entry node, found {}",
                entries.len()
            )));
        }

        self.check_acyclic()?;

        let reachable = self.reachable_from(&entries[0].id);
        for node in &self.nodes {
            if !reachable.contains(&node.id) {
                return Err(WorkflowError::InvalidGraph(format!(
                    "node '{}' is unreachable from the entry node",
                    node.id
                )));
            }
        }

        Ok(())
    }

    /// Total number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Kahn's algorithm: if not every node can be peeled off in topological
    /// order, the graph contains a cycle.
    fn check_acyclic(&self) -> WorkflowResult<()> {
        let mut in_degree: Vec<usize> = self
            .nodes
            .iter()
            .map(|n| self.incoming(&n.id).len())
            .collect();

        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect();

        let mut peeled = 0usize;
        while let Some(i) = queue.pop_front() {
            peeled += 1;
            for conn in self.outgoing(&self.nodes[i].id) {
                if let Some(j) = self.nodes.iter().position(|n| n.id == conn.target) {
                    in_degree[j] -= 1;
                    if in_degree[j] == 0 {
                        queue.push_back(j);
                    }
                }
            }
        }

        if peeled != self.nodes.len() {
            return Err(WorkflowError::InvalidGraph(
                "workflow graph contains a cycle".into(),
            ));
        }
        Ok(())
    }

    /// Find all nodes reachable from a given node via BFS
    fn reachable_from(&self, start: &NodeId) -> HashSet<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = vec![start.clone()];

        while let Some(current) = queue.pop() {
            if visited.insert(current.clone()) {
                for conn in self.outgoing(&current) {
                    if !visited.contains(&conn.target) {
                        queue.push(conn.target.clone());
                    }
                }
            }
        }

        visited
    }
}

// ── Workflow Node ────────────────────────────────────────────────────

/// A node in the workflow graph — one unit of work
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Unique identifier within this workflow
    pub id: NodeId,
    /// Human-readable title
    pub title: String,
    /// What kind of work this node represents
    pub kind: NodeKind,
    /// Description of what this node does
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl WorkflowNode {
    pub fn new(id: impl Into<String>, title: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(id),
            title: title.into(),
            kind,
            description: String::new(),
        }
    }

    /// Create an agent node (executed by an AI agent collaborator)
    pub fn agent(
        id: impl Into<String>,
        title: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            title,
            NodeKind::Agent {
                agent_id: agent_id.into(),
            },
        )
    }

    /// Create a logic node
    pub fn logic(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, title, NodeKind::Logic { condition: None })
    }

    /// Create an I/O node
    pub fn io(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(id, title, NodeKind::Io)
    }

    /// Create a human approval node
    pub fn human(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(
            id,
            title,
            NodeKind::Human {
                assignee: None,
                deadline_secs: None,
            },
        )
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Assign an approver (human nodes only; a no-op for other kinds)
    pub fn with_assignee(mut self, assignee: ActorId) -> Self {
        if let NodeKind::Human {
            assignee: slot, ..
        } = &mut self.kind
        {
            *slot = Some(assignee);
        }
        self
    }

    /// Set an approval deadline in seconds from node activation
    /// (human nodes only; a no-op for other kinds)
    pub fn with_deadline_secs(mut self, secs: u64) -> Self {
        if let NodeKind::Human {
            deadline_secs: slot,
            ..
        } = &mut self.kind
        {
            *slot = Some(secs);
        }
        self
    }

    /// Set a branch condition (logic nodes only; a no-op for other kinds)
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        if let NodeKind::Logic { condition: slot } = &mut self.kind {
            *slot = Some(condition.into());
        }
        self
    }

    /// Whether a run pauses at this node until explicit approve/reject
    pub fn requires_approval(&self) -> bool {
        matches!(self.kind, NodeKind::Human { .. })
    }
}

/// The kind of work a node represents.
///
/// Each variant carries only the fields that kind needs; there is no
/// free-form metadata blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Executed by an AI agent collaborator
    Agent {
        /// Which agent handles this node
        agent_id: String,
    },
    /// A logic/branching step
    Logic {
        /// Optional branch condition expression
        #[serde(skip_serializing_if = "Option::is_none")]
        condition: Option<String>,
    },
    /// An input/output step (fetch, store, notify, ...)
    Io,
    /// A human approval step — the run pauses here until resolved
    Human {
        /// Who should resolve the approval
        #[serde(skip_serializing_if = "Option::is_none")]
        assignee: Option<ActorId>,
        /// Seconds from activation until the approval times out
        #[serde(skip_serializing_if = "Option::is_none")]
        deadline_secs: Option<u64>,
    },
}

// ── Workflow Connection ──────────────────────────────────────────────

/// A directed edge between two nodes
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowConnection {
    /// Unique identifier
    pub id: String,
    /// Source node
    pub source: NodeId,
    /// Target node
    pub target: NodeId,
}

impl WorkflowConnection {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source,
            target,
        }
    }
}
