//! Running counters reported by the evaluation scheduler.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::LimitId;

/// Totals accumulated over the lifetime of a monitoring session.
///
/// Counters survive `stop`/`start`; only the notification state is reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObserverStats {
    /// Completed evaluation ticks.
    pub ticks: u64,
    /// Failed checks observed, over all limits.
    pub limits_reached: u64,
    pub alerts_sent: u64,
    pub recoveries_sent: u64,
    /// Limits skipped because their value could not be read.
    pub retrieval_failures: u64,
    /// Failed checks observed, per limit.
    pub limits_reached_by_id: BTreeMap<LimitId, u64>,
}

impl ObserverStats {
    pub fn record_breach(&mut self, id: &str) {
        self.limits_reached += 1;
        *self.limits_reached_by_id.entry(id.to_string()).or_insert(0) += 1;
    }

    /// Flat `name -> value` view for tabular status output.
    pub fn as_rows(&self) -> Vec<(String, u64)> {
        let mut rows = vec![
            ("num_checks".to_string(), self.ticks),
            ("num_limits_reached".to_string(), self.limits_reached),
            ("num_limits_notified".to_string(), self.alerts_sent),
            ("num_normal_notified".to_string(), self.recoveries_sent),
            ("num_retrieval_failures".to_string(), self.retrieval_failures),
        ];
        rows.extend(
            self.limits_reached_by_id
                .iter()
                .map(|(id, n)| (format!("num_limits_reached:{id}"), *n)),
        );
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_breach_counts_total_and_per_limit() {
        let mut stats = ObserverStats::default();
        stats.record_breach("cpu");
        stats.record_breach("cpu");
        stats.record_breach("mem");

        assert_eq!(stats.limits_reached, 3);
        assert_eq!(stats.limits_reached_by_id["cpu"], 2);
        assert_eq!(stats.limits_reached_by_id["mem"], 1);
    }

    #[test]
    fn rows_list_totals_first() {
        let mut stats = ObserverStats::default();
        stats.ticks = 4;
        stats.record_breach("disk0");
        let rows = stats.as_rows();
        assert_eq!(rows[0], ("num_checks".to_string(), 4));
        assert_eq!(rows.last().unwrap(), &("num_limits_reached:disk0".to_string(), 1));
    }
}
