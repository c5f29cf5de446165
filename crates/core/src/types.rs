/// Stable key of an observable limit, unique within a registry.
pub type LimitId = String;

/// Monotonically increasing snapshot sequence number.
pub type SequenceId = u64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
