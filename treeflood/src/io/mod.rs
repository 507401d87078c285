//! I/O helpers for treeflood commands.

pub mod config;
