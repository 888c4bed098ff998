//! queryprom exporter library entry.
//!
//! This crate wires config loading, database adapters, the metric registry,
//! per-metric pollers, and the HTTP exposition surface into one exporter. It
//! is consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod poller;
pub mod registry;
pub mod router;
pub mod source;
pub mod supervisor;
