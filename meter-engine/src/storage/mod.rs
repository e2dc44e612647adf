pub mod counters;
pub mod snapshot_list;

pub use counters::{BucketCounters, SkillTable, Tally};
pub use snapshot_list::{ListSnapshot, SnapshotList};
