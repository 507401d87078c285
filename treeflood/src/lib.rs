//! Collective tree exploration by robots that only talk through local storage.
//!
//! A team of synchronous robots starts at the root of an unknown tree, moves at
//! most one edge per round and coordinates exclusively by appending records to
//! a message board attached to the node it occupies. The architecture keeps a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (fair division, knowledge
//!   reconstruction, tree invariants). No I/O, fully testable in isolation.
//! - **[`robot`], [`storage`], [`pulse`]**: The per-robot state machine, the
//!   shared message boards and the barrier-synchronized runtime driving them.
//! - **[`io`]**: Side-effecting operations (configuration files).
//!
//! [`exploration`] ties these together; [`listener`] and [`stringify`] are the
//! observation surface used by the binaries.

pub mod core;
pub mod exit_codes;
pub mod exploration;
pub mod generator;
pub mod io;
pub mod listener;
pub mod logging;
pub mod looping;
pub mod pulse;
pub mod robot;
pub mod storage;
pub mod stringify;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tree;
