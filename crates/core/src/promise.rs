//! Promise dataflow: deferred values vended by one job and materialized
//! before a consuming job runs.

use crate::id::FileId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A deferred value handle. Produced by `UserJob::rv(index)`, materialized
/// by the worker into a literal value immediately before the consuming
/// job's `run` is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromiseReference {
    pub job_store_file_id: FileId,
    /// Selects a component of the producing job's return value; `0` when
    /// the return value is not a tuple.
    pub index: u32,
}

impl PromiseReference {
    pub const fn new(job_store_file_id: FileId, index: u32) -> Self {
        Self { job_store_file_id, index }
    }
}

/// A promise slot as declared by a user job: either a resolved value, an
/// unresolved reference, or a one-level container of either.
///
/// Containers may not nest: a `Seq`/`Map` holding another `Seq`/`Map` is an
/// authoring error the worker rejects at substitution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromiseSlot {
    Value(serde_json::Value),
    Reference(PromiseReference),
    Seq(Vec<PromiseSlot>),
    Map(indexmap::IndexMap<String, PromiseSlot>),
}

impl PromiseSlot {
    pub fn value(v: impl Serialize) -> Self {
        Self::Value(serde_json::to_value(v).unwrap_or(serde_json::Value::Null))
    }

    pub fn reference(r: PromiseReference) -> Self {
        Self::Reference(r)
    }
}

/// A job's return value as handed to the worker: tagged explicitly as a
/// single value or a tuple of components, so a consumer's `rv(index)` never
/// has to infer tuple-ness from the value's JSON shape (a plain array
/// return and a two-element tuple return would otherwise be indistinguishable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobReturn {
    Single(serde_json::Value),
    Tuple(Vec<serde_json::Value>),
}

impl JobReturn {
    pub fn single(v: impl Serialize) -> Self {
        Self::Single(serde_json::to_value(v).unwrap_or(serde_json::Value::Null))
    }

    pub fn tuple(values: Vec<serde_json::Value>) -> Self {
        Self::Tuple(values)
    }
}

impl From<serde_json::Value> for JobReturn {
    fn from(v: serde_json::Value) -> Self {
        Self::Single(v)
    }
}

/// Error surfaced when a promise slot cannot be substituted.
#[derive(Debug, Error)]
pub enum PromiseError {
    #[error("promise slot nests a container more than one level deep")]
    NestingTooDeep,
    #[error("job returned a bare PromiseReference, which cannot outlive its producer")]
    ReturnedBarePromise,
    #[error("promise index {index} out of range for producer return value")]
    IndexOutOfRange { index: u32 },
}

/// Implemented by concrete user-job types that carry promise-bearing
/// fields. The worker calls [`ResolvePromises::promise_slots`] to obtain
/// mutable access to every slot that must be substituted before `run`.
pub trait ResolvePromises {
    fn promise_slots(&mut self) -> Vec<&mut PromiseSlot>;
}
