//! Tracing setup shared by the `treeflood` and `bench` binaries.
//!
//! Events emitted by the library, by level:
//!
//! - `warn`: failed or timed-out pulses and the poisoning that follows,
//!   ignored second `set_robots` calls.
//! - `info`: exploration ready and finished, bench series start and end.
//! - `debug`: pulse manager setup, per-step completion, robots stopping at
//!   the root, bench data points.
//! - `trace`: every move, every `REGULAR` decision, knowledge
//!   reconstruction and first traversals seen by the tree builder.
//!
//! Rendered trees, summaries and TSV rows go to stdout or disk and are not
//! affected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a compact stderr subscriber filtered by `RUST_LOG` (default `warn`).
///
/// # Example
/// ```bash
/// RUST_LOG=treeflood=debug cargo run -- explore --size 20 --robots 4
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
