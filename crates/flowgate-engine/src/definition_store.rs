//! Definition store: holds immutable, validated workflow definitions
//!
//! A workflow is validated when published and never mutated afterwards.
//! To change a workflow, publish a new one. The run engine only reads from
//! the store; editing definitions is an external collaborator's concern.

use flowgate_types::{Workflow, WorkflowError, WorkflowId, WorkflowResult};
use std::collections::HashMap;

/// Store of published workflow definitions
#[derive(Clone, Debug, Default)]
pub struct DefinitionStore {
    workflows: HashMap<WorkflowId, Workflow>,
}

impl DefinitionStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            workflows: HashMap::new(),
        }
    }

    /// Publish a workflow definition.
    ///
    /// Validates the graph before storing. Publishing a second workflow
    /// under an existing id is rejected; definitions are immutable.
    pub fn publish(&mut self, workflow: Workflow) -> WorkflowResult<WorkflowId> {
        workflow.validate()?;

        let id = workflow.id.clone();
        if self.workflows.contains_key(&id) {
            return Err(WorkflowError::AlreadyPublished(id));
        }
        self.workflows.insert(id.clone(), workflow);

        tracing::info!(workflow_id = %id, "workflow published");
        Ok(id)
    }

    /// Get a workflow by id
    pub fn get(&self, id: &WorkflowId) -> WorkflowResult<&Workflow> {
        self.workflows
            .get(id)
            .ok_or_else(|| WorkflowError::WorkflowNotFound(id.clone()))
    }

    /// List all published workflows
    pub fn list(&self) -> Vec<&Workflow> {
        self.workflows.values().collect()
    }

    /// Check if a workflow is published
    pub fn contains(&self, id: &WorkflowId) -> bool {
        self.workflows.contains_key(id)
    }

    /// Total number of published workflows
    pub fn count(&self) -> usize {
        self.workflows.len()
    }
}
