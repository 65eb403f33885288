//! Per-invocation handle user code uses to declare successors, vend
//! promises, and touch the file store.

use crate::error::WorkerError;
use crate::user_job::JobSpec;
use trellis_core::{FileId, JobStoreId, PredecessorId, PromiseReference, Resources};
use trellis_storage::JobStore;

/// One successor a job declared during its run: either a fresh job the
/// worker must create, or a reference to an already-existing job (a
/// multi-parent join target created earlier by a common ancestor).
#[derive(Debug, Clone)]
pub enum SuccessorDecl {
    New { job_store_id: JobStoreId, spec: JobSpec },
    Existing { job_store_id: JobStoreId, predecessor_id: PredecessorId, resources: Resources },
}

impl SuccessorDecl {
    pub fn job_store_id(&self) -> JobStoreId {
        match self {
            Self::New { job_store_id, .. } => *job_store_id,
            Self::Existing { job_store_id, .. } => *job_store_id,
        }
    }
}

/// Handed to [`crate::user_job::UserJob::run`]. Every declaration made
/// through this type is tentative until [`crate::commit::commit_successors`]
/// persists it.
pub struct JobContext<'a> {
    store: &'a dyn JobStore,
    job_store_id: JobStoreId,
    own_promise_file_id: Option<FileId>,
    children: Vec<SuccessorDecl>,
    follow_ons: Vec<SuccessorDecl>,
    /// Jobs created for a later multi-parent join: not added to this job's
    /// own stack, just persisted so their id can be embedded in the
    /// captured arguments of children or follow-ons declared in this run.
    detached: Vec<(JobStoreId, JobSpec, u32)>,
    log_messages: Vec<String>,
}

impl<'a> JobContext<'a> {
    pub fn new(store: &'a dyn JobStore, job_store_id: JobStoreId) -> Self {
        Self {
            store,
            job_store_id,
            own_promise_file_id: None,
            children: Vec::new(),
            follow_ons: Vec::new(),
            detached: Vec::new(),
            log_messages: Vec::new(),
        }
    }

    pub fn job_store_id(&self) -> JobStoreId {
        self.job_store_id
    }

    /// Vend a reference to the `index`-th component of this job's own
    /// return value, to be embedded in a child's or follow-on's arguments.
    pub fn rv(&mut self, index: u32) -> Result<PromiseReference, WorkerError> {
        let file_id = match self.own_promise_file_id {
            Some(id) => id,
            None => {
                let id = self.store.empty_file_id(self.job_store_id)?;
                self.own_promise_file_id = Some(id);
                id
            }
        };
        Ok(PromiseReference::new(file_id, index))
    }

    /// Declare a child: runs before this job's follow-ons.
    pub fn add_child(&mut self, spec: JobSpec) -> JobStoreId {
        let id = JobStoreId::new();
        self.children.push(SuccessorDecl::New { job_store_id: id, spec });
        id
    }

    /// Declare a follow-on: runs after this job's children (and their
    /// descendants) have all finished.
    pub fn add_follow_on(&mut self, spec: JobSpec) -> JobStoreId {
        let id = JobStoreId::new();
        self.follow_ons.push(SuccessorDecl::New { job_store_id: id, spec });
        id
    }

    /// Declare a follow-on that reuses an id another job already minted
    /// with [`JobContext::create_shared_job`] — a multi-parent join. The
    /// leader counts `predecessor_id`s against the shared job's
    /// `predecessor_number` and issues it only once every parent has
    /// recorded its completion.
    pub fn add_follow_on_join(
        &mut self,
        job_store_id: JobStoreId,
        predecessor_id: PredecessorId,
        resources: Resources,
    ) {
        self.follow_ons.push(SuccessorDecl::Existing { job_store_id, predecessor_id, resources });
    }

    /// Declare a child that reuses an id from [`JobContext::create_shared_job`].
    pub fn add_child_join(
        &mut self,
        job_store_id: JobStoreId,
        predecessor_id: PredecessorId,
        resources: Resources,
    ) {
        self.children.push(SuccessorDecl::Existing { job_store_id, predecessor_id, resources });
    }

    /// Create a job up front, without adding it to this job's own stack.
    /// Used by a common ancestor to mint the id of a multi-parent join
    /// target before the jobs that will join on it exist.
    pub fn create_shared_job(&mut self, spec: JobSpec, predecessor_number: u32) -> JobStoreId {
        let id = JobStoreId::new();
        self.detached.push((id, spec, predecessor_number));
        id
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.log_messages.push(message.into());
    }

    pub fn read_file(&self, file_id: FileId) -> Result<Vec<u8>, WorkerError> {
        Ok(self.store.read_file(file_id)?)
    }

    pub fn write_file(&self, bytes: &[u8]) -> Result<FileId, WorkerError> {
        Ok(self.store.write_file(self.job_store_id, bytes)?)
    }

    /// Consume the context, handing ownership of its declarations to the
    /// caller (the two-phase commit).
    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> (
        Option<FileId>,
        Vec<SuccessorDecl>,
        Vec<SuccessorDecl>,
        Vec<(JobStoreId, JobSpec, u32)>,
        Vec<String>,
    ) {
        (self.own_promise_file_id, self.children, self.follow_ons, self.detached, self.log_messages)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
