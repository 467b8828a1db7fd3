//! Water meter simulation and flow-alarm monitoring.
//!
//! The [`monitor`] module holds the alarm engine: four threshold
//! detectors (leak, no-flow, burst, backflow) evaluated once per tick
//! against a bounded [`meter::ReadingLog`], feeding an append-only
//! alarm ledger. Everything around it (the simulated meter, the
//! monitoring task, the HTTP API and its client) exists to drive the
//! engine and show its state.

pub mod api;
pub mod api_client;
pub mod config;
pub mod error;
pub mod meter;
pub mod monitor;
pub mod tracing;
