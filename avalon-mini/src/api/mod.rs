//! HTTP API server.
//!
//! A thin axum layer over a [`MonitorHandle`](crate::monitor::MonitorHandle):
//! reads come from the monitor's latest published state, writes become
//! monitor commands.

mod server;
mod v0;

pub use server::{SharedState, router, serve};
