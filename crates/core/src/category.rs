//! Metric category tags.
//!
//! Limit categories select which limits the registry builds. Snapshot
//! categories are coarser and select which groups of readings end up in a
//! history snapshot.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// A category of observable limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Cpu,
    Memory,
    DiskUsage,
    DiskFree,
    AcceleratorLoad,
    AcceleratorTemperature,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Cpu,
        Category::Memory,
        Category::DiskUsage,
        Category::DiskFree,
        Category::AcceleratorLoad,
        Category::AcceleratorTemperature,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Category::Cpu => "cpu",
            Category::Memory => "memory",
            Category::DiskUsage => "disk-usage",
            Category::DiskFree => "disk-free",
            Category::AcceleratorLoad => "accelerator-load",
            Category::AcceleratorTemperature => "accelerator-temperature",
        }
    }

    /// Parse a tag. Unknown tags yield `None` so callers can skip them.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }

    pub fn is_disk(self) -> bool {
        matches!(self, Category::DiskUsage | Category::DiskFree)
    }

    pub fn is_accelerator(self) -> bool {
        matches!(
            self,
            Category::AcceleratorLoad | Category::AcceleratorTemperature
        )
    }

    /// The snapshot group this limit category belongs to.
    pub fn snapshot_category(self) -> SnapshotCategory {
        match self {
            Category::Cpu | Category::Memory => SnapshotCategory::Cpu,
            Category::DiskUsage | Category::DiskFree => SnapshotCategory::Disk,
            Category::AcceleratorLoad | Category::AcceleratorTemperature => {
                SnapshotCategory::Accelerator
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Groups of readings collected into a history snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotCategory {
    /// Load averages and memory.
    Cpu,
    Disk,
    Accelerator,
}

/// Parse a comma-separated tag list, silently dropping unknown tags.
pub fn parse_categories(raw: &str) -> BTreeSet<Category> {
    raw.split(',')
        .map(str::trim)
        .filter_map(Category::from_tag)
        .collect()
}

/// Snapshot groups covering the given limit categories.
pub fn snapshot_categories(categories: &BTreeSet<Category>) -> BTreeSet<SnapshotCategory> {
    categories.iter().map(|c| c.snapshot_category()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_tag(category.tag()), Some(category));
        }
    }

    #[test]
    fn unknown_tags_are_ignored() {
        let parsed = parse_categories("cpu, gpu ,disk-free,,network");
        assert_eq!(
            parsed,
            BTreeSet::from([Category::Cpu, Category::DiskFree])
        );
    }

    #[test]
    fn snapshot_groups_are_coarser() {
        let parsed = parse_categories("memory,disk-usage,disk-free");
        assert_eq!(
            snapshot_categories(&parsed),
            BTreeSet::from([SnapshotCategory::Cpu, SnapshotCategory::Disk])
        );
    }
}
