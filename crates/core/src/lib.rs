//! Threshold evaluation engine for host metrics.
//!
//! All logic in this crate is pure (no I/O). Metric retrieval, notification
//! delivery and scheduling live in the agent and events crates, which plug
//! in through the [`limits::Retrieve`], [`registry::HostProbes`] and
//! [`history::SnapshotSource`] traits.

pub mod badness;
pub mod category;
pub mod error;
pub mod history;
pub mod limits;
pub mod metric_names;
pub mod notify;
pub mod registry;
pub mod stats;
pub mod table;
pub mod types;
