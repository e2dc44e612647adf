use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::HitKind;
use crate::snapshot::{SplitSnapshot, TallySnapshot};

const UNSET_TICK: i64 = i64::MIN;

#[derive(Debug, Default)]
struct SplitCounter {
    count: AtomicU64,
    value: AtomicU64,
}

/// Running sums for one metric, split four ways by hit kind.
///
/// Every field is updated with its own fetch-add, so a concurrent reader can observe
/// `total` and `hit_count` momentarily out of step. Once writers go quiet the
/// split counts and values always add up to the totals.
#[derive(Debug, Default)]
pub struct Tally {
    total: AtomicU64,
    hit_count: AtomicU64,
    splits: [SplitCounter; 4],
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, value: u64, kind: HitKind) {
        self.total.fetch_add(value, Ordering::Relaxed);
        self.hit_count.fetch_add(1, Ordering::Relaxed);
        let split = &self.splits[kind.index()];
        split.value.fetch_add(value, Ordering::Relaxed);
        split.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TallySnapshot {
        let split = |kind: HitKind| {
            let counter = &self.splits[kind.index()];
            SplitSnapshot {
                count: counter.count.load(Ordering::Relaxed),
                value: counter.value.load(Ordering::Relaxed),
            }
        };
        TallySnapshot {
            total: self.total(),
            hit_count: self.hit_count(),
            normal: split(HitKind::Normal),
            critical: split(HitKind::Critical),
            lucky: split(HitKind::Lucky),
            critical_lucky: split(HitKind::CriticalLucky),
        }
    }
}

/// Per-skill tallies. Find-or-create goes through one short lock scoped to the map;
/// counting happens on the returned handle after the lock is released.
#[derive(Debug, Default)]
pub struct SkillTable {
    skills: Mutex<HashMap<u32, Arc<Tally>>>,
}

impl SkillTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, skill_id: u32) -> Arc<Tally> {
        self.skills
            .lock()
            .entry(skill_id)
            .or_insert_with(|| Arc::new(Tally::new()))
            .clone()
    }

    pub fn record(&self, skill_id: u32, value: u64, kind: HitKind) {
        self.get_or_create(skill_id).record(value, kind);
    }

    pub fn len(&self) -> usize {
        self.skills.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.lock().is_empty()
    }

    /// Copies every skill's counters, sorted by skill id.
    pub fn snapshot(&self) -> Vec<(u32, TallySnapshot)> {
        let handles: Vec<(u32, Arc<Tally>)> = self
            .skills
            .lock()
            .iter()
            .map(|(id, tally)| (*id, tally.clone()))
            .collect();

        let mut skills: Vec<(u32, TallySnapshot)> = handles
            .into_iter()
            .map(|(id, tally)| (id, tally.snapshot()))
            .collect();
        skills.sort_unstable_by_key(|(id, _)| *id);
        skills
    }
}

/// Aggregate bucket for one entity and one metric.
#[derive(Debug)]
pub struct BucketCounters {
    tally: Tally,
    first_tick: AtomicI64,
    last_tick: AtomicI64,
    is_npc: AtomicBool,
    skills: SkillTable,
}

impl Default for BucketCounters {
    fn default() -> Self {
        Self {
            tally: Tally::new(),
            first_tick: AtomicI64::new(UNSET_TICK),
            last_tick: AtomicI64::new(UNSET_TICK),
            is_npc: AtomicBool::new(false),
            skills: SkillTable::new(),
        }
    }
}

impl BucketCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, skill_id: u32, value: u64, kind: HitKind, tick: i64) {
        self.touch(tick);
        self.tally.record(value, kind);
        self.skills.record(skill_id, value, kind);
    }

    /// First-seen is written once; last-seen only moves forward.
    pub fn touch(&self, tick: i64) {
        let _ = self.first_tick.compare_exchange(
            UNSET_TICK,
            tick,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.last_tick.fetch_max(tick, Ordering::AcqRel);
    }

    pub fn mark_npc(&self) {
        self.is_npc.store(true, Ordering::Relaxed);
    }

    pub fn is_npc(&self) -> bool {
        self.is_npc.load(Ordering::Relaxed)
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn skills(&self) -> &SkillTable {
        &self.skills
    }

    pub fn first_tick(&self) -> Option<i64> {
        match self.first_tick.load(Ordering::Acquire) {
            UNSET_TICK => None,
            tick => Some(tick),
        }
    }

    pub fn last_tick(&self) -> Option<i64> {
        match self.last_tick.load(Ordering::Acquire) {
            UNSET_TICK => None,
            tick => Some(tick),
        }
    }
}
