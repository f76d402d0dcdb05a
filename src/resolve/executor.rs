use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use super::types::Answer;
use crate::sources::AdapterError;

/// A named unit of work handed to [`run`].
pub type AttemptFuture = BoxFuture<'static, Result<Answer, AdapterError>>;

/// How one attempt ended.
#[derive(Debug)]
pub enum AttemptState {
    Completed(Answer),
    Failed(AdapterError),
    TimedOut,
}

impl AttemptState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::Completed(a) if a.is_hit() => "hit",
            AttemptState::Completed(_) => "miss",
            AttemptState::Failed(_) => "failed",
            AttemptState::TimedOut => "timed_out",
        }
    }
}

/// Run every task concurrently under one shared deadline.
///
/// Returns once all tasks finish or the deadline passes, whichever is first.
/// Tasks still running at the deadline are aborted and reported as
/// `TimedOut`; nothing they produce afterwards can reach the caller. A task
/// that errors or panics is reported as `Failed` without disturbing the
/// others. Task names must be unique.
pub async fn run(
    tasks: Vec<(String, AttemptFuture)>,
    deadline: Duration,
) -> BTreeMap<String, AttemptState> {
    let cutoff = Instant::now() + deadline;
    let mut pending: BTreeSet<String> = BTreeSet::new();
    let mut outcomes = BTreeMap::new();
    let mut set = JoinSet::new();

    for (name, attempt) in tasks {
        pending.insert(name.clone());
        set.spawn(async move {
            let state = match AssertUnwindSafe(attempt).catch_unwind().await {
                Ok(Ok(answer)) => AttemptState::Completed(answer),
                Ok(Err(err)) => AttemptState::Failed(err),
                Err(panic) => AttemptState::Failed(AdapterError::Panicked {
                    adapter: name.clone(),
                    message: panic_message(panic.as_ref()),
                }),
            };
            (name, state)
        });
    }

    while !set.is_empty() {
        match timeout_at(cutoff, set.join_next()).await {
            Ok(Some(Ok((name, state)))) => {
                debug!(task = %name, state = state.as_str(), "attempt finished");
                pending.remove(&name);
                outcomes.insert(name, state);
            }
            Ok(Some(Err(e))) => {
                // Only reachable if the runtime cancels the task under us.
                warn!(error = %e, "attempt task did not complete");
            }
            Ok(None) => break,
            Err(_) => {
                warn!(
                    pending = pending.len(),
                    deadline_ms = deadline.as_millis() as u64,
                    "deadline elapsed, abandoning pending attempts"
                );
                set.abort_all();
                break;
            }
        }
    }

    for name in pending {
        outcomes.insert(name, AttemptState::TimedOut);
    }
    outcomes
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
