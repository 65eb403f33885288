//! The persisted unit of work and its successor-graph bookkeeping.

use crate::id::{FileId, JobStoreId, PredecessorId};
use crate::resources::Resources;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// One entry in a job's pending-successor stack: a child or follow-on not
/// yet issued.
///
/// `predecessor_id` is `None` for successors with a single parent;
/// otherwise it distinguishes which parent this reference came from so a
/// multi-parent join can track partial completion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuccessorDescriptor {
    pub successor_job_store_id: JobStoreId,
    pub resources: Resources,
    pub predecessor_id: Option<PredecessorId>,
}

impl SuccessorDescriptor {
    pub fn new(successor_job_store_id: JobStoreId, resources: Resources) -> Self {
        Self { successor_job_store_id, resources, predecessor_id: None }
    }

    pub fn with_predecessor(mut self, predecessor_id: PredecessorId) -> Self {
        self.predecessor_id = Some(predecessor_id);
        self
    }
}

/// A group of successors that become eligible together. The job's `stack`
/// is an ordered sequence of phases; the *top* (last) phase runs first.
pub type StackPhase = IndexSet<SuccessorDescriptor>;

/// The persisted unit of work.
///
/// Owned by exactly one actor at a time: the leader while queued, the
/// worker while running, the leader again while processing completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_store_id: JobStoreId,
    pub command: Option<String>,
    pub resources: Resources,
    pub remaining_retry_count: u32,

    /// Total in-degree in the parent graph, fixed at creation.
    pub predecessor_number: u32,
    /// Predecessors that have completed so far; a join fires when this
    /// reaches `predecessor_number`.
    pub predecessors_finished: IndexSet<PredecessorId>,

    /// Pending successor phases; the last element is the top of the stack.
    pub stack: Vec<StackPhase>,

    /// Tentative child IDs not yet fully committed. Non-empty only while a
    /// worker's two-phase commit is in flight or after a crash left it torn.
    pub jobs_to_delete: IndexSet<JobStoreId>,

    /// File holding the most recent failed attempt's log, if any.
    pub log_job_store_file_id: Option<FileId>,

    /// File holding the job's serialized `UserJob` payload (type tag plus
    /// captured arguments and promise table), written once at creation and
    /// read back by the worker before `run` is invoked. `None` for a record
    /// that only carries successors (no work of its own).
    pub job_spec_file_id: Option<FileId>,

    /// Random token stamped at creation; used to recognize a record across
    /// crash/retry cycles for idempotent cleanup.
    pub update_id: String,
}

impl JobRecord {
    /// Construct a fresh record with no successors and no predecessors.
    pub fn new(job_store_id: JobStoreId, command: Option<String>, resources: Resources) -> Self {
        Self {
            job_store_id,
            command,
            resources,
            remaining_retry_count: 1,
            predecessor_number: 0,
            predecessors_finished: IndexSet::new(),
            stack: Vec::new(),
            jobs_to_delete: IndexSet::new(),
            log_job_store_file_id: None,
            job_spec_file_id: None,
            update_id: nanoid::nanoid!(12),
        }
    }

    /// The phase a leader would issue successors from next, if any.
    pub fn top_phase(&self) -> Option<&StackPhase> {
        self.stack.last()
    }

    /// Pop and return the top phase, if any.
    pub fn pop_phase(&mut self) -> Option<StackPhase> {
        self.stack.pop()
    }

    /// Push follow-ons then children so children end up on top and run first.
    pub fn push_phases(&mut self, follow_ons: StackPhase, children: StackPhase) {
        if !follow_ons.is_empty() {
            self.stack.push(follow_ons);
        }
        if !children.is_empty() {
            self.stack.push(children);
        }
    }

    /// True when a record has nothing left to run and no successors: safe
    /// to delete once its own predecessor link is cleared.
    pub fn is_terminal(&self) -> bool {
        self.command.is_none() && self.stack.is_empty()
    }

    /// True when a crash left tentative children uncommitted.
    pub fn is_torn(&self) -> bool {
        !self.jobs_to_delete.is_empty()
    }

    /// Record one predecessor's completion; returns true once the join is
    /// satisfied (all predecessors finished).
    pub fn record_predecessor_finished(&mut self, predecessor_id: PredecessorId) -> bool {
        self.predecessors_finished.insert(predecessor_id);
        self.predecessors_finished.len() as u32 >= self.predecessor_number
    }
}

#[cfg(test)]
#[path = "job_record_tests.rs"]
mod tests;
