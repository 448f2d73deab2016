//! Activity recorder: the append-only log of state transitions
//!
//! Every coordinator transition appends exactly one entry, synchronously,
//! before the transition is considered complete. Consumers either query the
//! log (lazy, restartable, ordered by sequence) or subscribe to the live
//! stream. The log is the source of truth; the stream is best effort and a
//! lagging subscriber can always catch up by replaying the log.

use flowgate_types::{ActivityEntry, ActivityFilter, ActorId, NodeId, RunId, TransitionStatus};
use tokio::sync::broadcast;

/// Append-only activity log with a live subscription stream
#[derive(Debug)]
pub struct ActivityRecorder {
    entries: Vec<ActivityEntry>,
    tx: broadcast::Sender<ActivityEntry>,
}

impl ActivityRecorder {
    /// Create a recorder whose subscription stream buffers `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            entries: Vec::new(),
            tx,
        }
    }

    /// Append one transition entry. Called by the coordinator before the
    /// transition is considered complete.
    pub(crate) fn record(
        &mut self,
        run_id: &RunId,
        node_id: Option<&NodeId>,
        from_status: TransitionStatus,
        to_status: TransitionStatus,
        actor: Option<&ActorId>,
    ) {
        let entry = ActivityEntry {
            sequence: self.entries.len() as u64,
            timestamp: chrono::Utc::now(),
            run_id: run_id.clone(),
            node_id: node_id.cloned(),
            from_status,
            to_status,
            actor: actor.cloned(),
        };
        // Send errors only mean there are no subscribers right now
        let _ = self.tx.send(entry.clone());
        self.entries.push(entry);
    }

    /// Lazily iterate entries matching a filter, in sequence order.
    ///
    /// Pure read; each call restarts from the beginning of the log.
    pub fn query<'a>(
        &'a self,
        filter: &'a ActivityFilter,
    ) -> impl Iterator<Item = &'a ActivityEntry> + 'a {
        self.entries.iter().filter(move |e| filter.matches(e))
    }

    /// All entries for one run, in transition order
    pub fn entries_for_run(&self, run_id: &RunId) -> Vec<&ActivityEntry> {
        self.entries
            .iter()
            .filter(|e| &e.run_id == run_id)
            .collect()
    }

    /// Reconstruct a run's current status by replaying its run-level entries
    pub fn replay_run_status(&self, run_id: &RunId) -> Option<TransitionStatus> {
        self.entries
            .iter()
            .filter(|e| &e.run_id == run_id && e.is_run_level())
            .last()
            .map(|e| e.to_status)
    }

    /// Subscribe to the live entry stream
    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEntry> {
        self.tx.subscribe()
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
