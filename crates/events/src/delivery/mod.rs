//! Concrete notification sinks.
//!
//! This module provides the webhook, log and fan-out sinks the agent wires
//! together at startup.

pub mod fanout;
pub mod log;
pub mod webhook;
