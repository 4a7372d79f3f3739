// src/api/mod.rs
//
// API Surface (spec.md §4.9): a minimal HTTP read/control surface over
// the same singletons the poller drives — snapshots, device-enable map,
// tank list, log query/listing/download, and alarm thresholds.

mod logquery;
mod routes;
mod server;
mod state;

pub use server::{build_router, serve};
pub use state::AppState;
