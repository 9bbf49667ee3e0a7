//! Deterministic, pure logic shared by the pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod budget;
pub mod compare;
pub mod extract;
pub mod language;
pub mod retry;
pub mod types;
pub mod workflow;
pub mod workspace;
