//! cellquery - compiles notebook scripts that mix PRQL with raw `SQL { .. }`
//! and `PIVOT { .. }` escape blocks into one SQL statement.
//!
//! This library exposes the core modules for use in integration tests.

pub mod assembler;
pub mod chunk;
pub mod cli;
pub mod config;
pub mod dsl;
pub mod engine;
pub mod error;
pub mod logging;
pub mod output;
pub mod query;
pub mod safety;
pub mod stages;
