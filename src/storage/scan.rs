//! Worker orchestration for parallel scans.

use std::any::Any;
use std::thread;

use tracing::warn;

use crate::types::{Result, StoreError};

/// Runs `work` once per cursor, each on its own scoped thread, and joins them
/// all before returning.
///
/// Results come back in cursor order. A panicking worker is reported as
/// [`StoreError::WorkerPanicked`]; when more than one worker fails every
/// failure is kept in a [`StoreError::Aggregate`].
pub fn run_workers<C, T, F>(cursors: Vec<C>, work: F) -> Result<Vec<T>>
where
    C: Send,
    T: Send,
    F: Fn(C) -> Result<T> + Sync,
{
    let work = &work;
    let outcomes: Vec<Result<T>> = thread::scope(|scope| {
        let handles: Vec<_> = cursors
            .into_iter()
            .map(|cursor| scope.spawn(move || work(cursor)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| Err(StoreError::WorkerPanicked(panic_message(payload))))
            })
            .collect()
    });

    let mut values = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(value) => values.push(value),
            Err(err) => failures.push(err),
        }
    }
    match failures.len() {
        0 => Ok(values),
        1 => Err(failures.remove(0)),
        failed => {
            warn!(failed, "scan.workers.failed");
            Err(StoreError::Aggregate(failures))
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
