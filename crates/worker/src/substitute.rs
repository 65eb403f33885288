//! Promise substitution: replaces `PromiseReference`s in a user job's
//! declared slots with their materialized value before `run` is invoked.
//!
//! Containers nest at most one level (`Seq`/`Map` of `Value`/`Reference`);
//! anything deeper is rejected rather than silently dropped.

use crate::error::WorkerError;
use trellis_core::{JobReturn, PromiseReference, PromiseSlot};
use trellis_storage::JobStore;

/// Resolve every promise slot in place. Called after a job's arguments are
/// deserialized and before `UserJob::run`.
pub fn resolve_promise_slots(
    store: &dyn JobStore,
    slots: Vec<&mut PromiseSlot>,
) -> Result<(), WorkerError> {
    for slot in slots {
        resolve_one(store, slot)?;
    }
    Ok(())
}

fn resolve_one(store: &dyn JobStore, slot: &mut PromiseSlot) -> Result<(), WorkerError> {
    match slot {
        PromiseSlot::Value(_) => Ok(()),
        PromiseSlot::Reference(r) => {
            *slot = PromiseSlot::Value(materialize(store, *r)?);
            Ok(())
        }
        PromiseSlot::Seq(items) => {
            for item in items.iter_mut() {
                resolve_shallow(store, item)?;
            }
            Ok(())
        }
        PromiseSlot::Map(entries) => {
            for item in entries.values_mut() {
                resolve_shallow(store, item)?;
            }
            Ok(())
        }
    }
}

/// Resolve one level inside a container: a nested `Seq`/`Map` here is a
/// second level of nesting, which is out of scope.
fn resolve_shallow(store: &dyn JobStore, slot: &mut PromiseSlot) -> Result<(), WorkerError> {
    match slot {
        PromiseSlot::Value(_) => Ok(()),
        PromiseSlot::Reference(r) => {
            *slot = PromiseSlot::Value(materialize(store, *r)?);
            Ok(())
        }
        PromiseSlot::Seq(_) | PromiseSlot::Map(_) => Err(WorkerError::NestedContainerTooDeep),
    }
}

/// Read a producer's promise file and pick out the requested component.
///
/// The file holds the producer's [`JobReturn`], JSON-encoded: tagged
/// explicitly as `Single` or `Tuple` when it was written, so indexing never
/// has to guess tuple-ness from the value's shape. A plain array return
/// (`Single(Value::Array(..))`) at index `0` yields the whole array
/// untouched; only a `Tuple` indexes into its components.
fn materialize(store: &dyn JobStore, r: PromiseReference) -> Result<serde_json::Value, WorkerError> {
    let bytes = store.read_file(r.job_store_file_id)?;
    let value: JobReturn = serde_json::from_slice(&bytes)?;
    match value {
        JobReturn::Tuple(items) => {
            items.into_iter().nth(r.index as usize).ok_or(WorkerError::PromiseIndexOutOfRange { index: r.index })
        }
        JobReturn::Single(v) if r.index == 0 => Ok(v),
        JobReturn::Single(_) => Err(WorkerError::PromiseIndexOutOfRange { index: r.index }),
    }
}

#[cfg(test)]
#[path = "substitute_tests.rs"]
mod tests;
