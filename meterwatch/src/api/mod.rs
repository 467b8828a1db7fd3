//! HTTP API for reading meter state and adjusting settings.

pub mod commands;
mod server;
mod v0;

pub use server::{SharedState, build_router, serve};
