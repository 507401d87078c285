//! Deterministic, pure logic shared by the robots.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod division;
pub mod invariants;
pub mod knowledge;
pub mod path;
pub mod types;
