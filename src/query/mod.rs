//! Query execution for cellquery.
//!
//! This module runs assembled statements against an engine and decides
//! which results are still worth showing.

pub mod executor;
pub mod pipeline;
pub mod slot;

pub use executor::{run, run_legacy, RunOutcome};
pub use pipeline::QueryPipeline;
pub use slot::{QuerySlot, RequestId, Ticket};
