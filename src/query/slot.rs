//! Latest-request-wins bookkeeping for a single query cell.
//!
//! A cell may be re-run while an earlier run is still in flight. Each run
//! takes a ticket; starting a new run cancels the previous ticket, and only
//! the newest ticket may publish its outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::executor::{run, RunOutcome};
use crate::assembler::{compile_script, AssembleOptions};
use crate::dsl::DslCompiler;
use crate::engine::AnalyticalEngine;

/// Unique identifier for a run, increasing with every `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Generates a new unique request ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle for one in-flight run.
#[derive(Debug)]
pub struct Ticket {
    id: RequestId,
    cancel: CancellationToken,
}

impl Ticket {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Returns true once a newer run has started.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when a newer run starts.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// Tracks which run of a cell is the latest.
#[derive(Debug, Default)]
pub struct QuerySlot {
    latest: Mutex<Option<(RequestId, CancellationToken)>>,
}

impl QuerySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a run, cancelling whichever run was in flight.
    pub fn begin(&self) -> Ticket {
        let ticket = Ticket {
            id: RequestId::new(),
            cancel: CancellationToken::new(),
        };

        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((previous, token)) = latest.take() {
            debug!("Request {} superseded by {}", previous, ticket.id);
            token.cancel();
        }
        *latest = Some((ticket.id, ticket.cancel.clone()));
        ticket
    }

    /// Returns true if `ticket` belongs to the newest unfinished run.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        let latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        matches!(latest.as_ref(), Some((id, _)) if *id == ticket.id)
    }

    /// Publishes `outcome` if `ticket` is still the newest run.
    ///
    /// Returns `None` when a newer run has started since; the outcome is
    /// then stale and dropped.
    pub fn finish(&self, ticket: Ticket, outcome: RunOutcome) -> Option<RunOutcome> {
        let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        match latest.as_ref() {
            Some((id, _)) if *id == ticket.id => {
                *latest = None;
                Some(outcome)
            }
            _ => {
                debug!("Discarding stale result for request {}", ticket.id);
                None
            }
        }
    }

    /// Compiles and runs `script` as the newest run of this cell.
    ///
    /// Returns `None` if a newer run started before this one finished. A
    /// superseded run stops waiting on the engine as soon as it is
    /// cancelled.
    pub async fn run<C, E>(
        &self,
        script: &str,
        compiler: &C,
        engine: &E,
        options: &AssembleOptions,
    ) -> Option<RunOutcome>
    where
        C: DslCompiler + ?Sized,
        E: AnalyticalEngine + ?Sized,
    {
        let ticket = self.begin();

        let outcome = match compile_script(script, compiler, options) {
            Err(e) => RunOutcome::CompileFailed(e),
            Ok(statement) => {
                tokio::select! {
                    _ = ticket.cancelled() => {
                        debug!("Request {} cancelled while running", ticket.id);
                        return None;
                    }
                    outcome = run(statement.sql(), engine) => outcome,
                }
            }
        };

        self.finish(ticket, outcome)
    }
}
