//! `sysobserver-agent` library crate.
//!
//! Host probes, the two periodic schedulers and the HTTP control surface.
//! The binary entrypoint lives in `main.rs`; everything is re-exported
//! here for integration testing.

pub mod accel;
pub mod api;
pub mod config;
pub mod host;
pub mod info;
pub mod periodic;
pub mod sampler;
pub mod scheduler;
pub mod snapshot;
