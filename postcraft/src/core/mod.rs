//! Deterministic, pure logic for the workflow core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod history;
pub mod round;
pub mod step;
pub mod types;
pub mod validation;
