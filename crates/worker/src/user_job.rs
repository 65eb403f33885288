//! Dynamic dispatch for user-defined work: the `UserJob` trait plus two
//! built-in adapters covering the common authoring patterns.

use crate::context::JobContext;
use crate::error::WorkerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use trellis_core::{JobReturn, PromiseSlot, ResolvePromises, Resources};

/// A not-yet-persisted job: a type tag plus its serialized captured state,
/// ready to be written to the store by the two-phase commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub tag: String,
    pub payload: serde_json::Value,
    pub resources: Resources,
}

impl JobSpec {
    pub fn new(tag: impl Into<String>, payload: serde_json::Value, resources: Resources) -> Self {
        Self { tag: tag.into(), payload, resources }
    }
}

/// Capability set a unit of user work must provide.
pub trait UserJob: ResolvePromises {
    /// Run user code, given a handle for declaring children/follow-ons,
    /// vending promises, and writing auxiliary files. The returned
    /// [`JobReturn`] tags whether this is a single value or a tuple of
    /// components addressable via `rv(index)`.
    fn run(&mut self, ctx: &mut JobContext<'_>) -> Result<JobReturn, WorkerError>;

    fn resources(&self) -> Resources {
        Resources::default()
    }
}

type JobFactory = fn(serde_json::Value) -> Result<Box<dyn UserJob>, WorkerError>;

/// Maps a `JobSpec`'s type tag back to a concrete `UserJob`. Populated by
/// the process wiring user job types together, consulted by the worker
/// before it dispatches a loaded job.
#[derive(Default)]
pub struct JobRegistry {
    factories: HashMap<String, JobFactory>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tag: impl Into<String>, factory: JobFactory) {
        self.factories.insert(tag.into(), factory);
    }

    pub fn construct(&self, tag: &str, payload: serde_json::Value) -> Result<Box<dyn UserJob>, WorkerError> {
        let factory = self.factories.get(tag).ok_or_else(|| WorkerError::UnknownTag(tag.to_string()))?;
        factory(payload)
    }
}

/// "Function wrapping" adapter: invokes a free function with captured,
/// positional, promise-aware arguments.
#[derive(Serialize, Deserialize)]
pub struct FnJob {
    pub args: Vec<PromiseSlot>,
    pub resources: Resources,
    #[serde(skip, default)]
    pub func: Option<fn(&[serde_json::Value]) -> serde_json::Value>,
}

impl ResolvePromises for FnJob {
    fn promise_slots(&mut self) -> Vec<&mut PromiseSlot> {
        self.args.iter_mut().collect()
    }
}

impl UserJob for FnJob {
    fn run(&mut self, _ctx: &mut JobContext<'_>) -> Result<JobReturn, WorkerError> {
        let func = self.func.ok_or(WorkerError::MissingFunction)?;
        let values = resolved_values(&self.args);
        Ok(JobReturn::Single(func(&values)))
    }

    fn resources(&self) -> Resources {
        self.resources
    }
}

/// "Self-wrapping function" adapter: like [`FnJob`], but the function also
/// receives the job context, so it can declare children/follow-ons or vend
/// promises of its own.
#[derive(Serialize, Deserialize)]
pub struct ContextFnJob {
    pub args: Vec<PromiseSlot>,
    pub resources: Resources,
    #[serde(skip, default)]
    pub func: Option<fn(&[serde_json::Value], &mut JobContext<'_>) -> Result<JobReturn, WorkerError>>,
}

impl ResolvePromises for ContextFnJob {
    fn promise_slots(&mut self) -> Vec<&mut PromiseSlot> {
        self.args.iter_mut().collect()
    }
}

impl UserJob for ContextFnJob {
    fn run(&mut self, ctx: &mut JobContext<'_>) -> Result<JobReturn, WorkerError> {
        let func = self.func.ok_or(WorkerError::MissingFunction)?;
        let values = resolved_values(&self.args);
        func(&values, ctx)
    }

    fn resources(&self) -> Resources {
        self.resources
    }
}

fn resolved_values(args: &[PromiseSlot]) -> Vec<serde_json::Value> {
    args.iter()
        .map(|slot| match slot {
            PromiseSlot::Value(v) => v.clone(),
            // Any remaining Reference/Seq/Map here means the worker ran
            // this job without first calling resolve_promise_slots.
            _ => serde_json::Value::Null,
        })
        .collect()
}

#[cfg(test)]
#[path = "user_job_tests.rs"]
mod tests;
