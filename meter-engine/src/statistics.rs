use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::models::*;
use crate::snapshot::{value_per_second, AggregateSnapshot, BucketSnapshot, SkillSnapshot};
use crate::storage::{BucketCounters, SnapshotList};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    AttackDamage,
    Healing,
    TakenDamage,
}

/// The bucket set of one entity in one view.
#[derive(Debug, Default)]
pub struct EntityStats {
    attack_damage: BucketCounters,
    healing: BucketCounters,
    taken_damage: BucketCounters,
    events: SnapshotList<CombatEvent>,
}

impl EntityStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket(&self, metric: Metric) -> &BucketCounters {
        match metric {
            Metric::AttackDamage => &self.attack_damage,
            Metric::Healing => &self.healing,
            Metric::TakenDamage => &self.taken_damage,
        }
    }

    pub fn record(&self, metric: Metric, event: &CombatEvent) {
        self.bucket(metric)
            .record(event.skill_id, event.value, event.hit_kind(), event.tick);
    }

    pub fn log_event(&self, event: CombatEvent) {
        self.events.push(event);
    }

    fn snapshot(&self, entity_id: EntityId, options: &StatsOptions) -> AggregateSnapshot {
        AggregateSnapshot {
            entity_id,
            attack_damage: bucket_snapshot(&self.attack_damage, options),
            healing: bucket_snapshot(&self.healing, options),
            taken_damage: bucket_snapshot(&self.taken_damage, options),
            events: self.events.snapshot(),
        }
    }
}

fn bucket_snapshot(bucket: &BucketCounters, options: &StatsOptions) -> BucketSnapshot {
    let tally = bucket.tally().snapshot();
    let first_tick = bucket.first_tick();
    let last_tick = bucket.last_tick();
    let skills = bucket
        .skills()
        .snapshot()
        .into_iter()
        .map(|(skill_id, tally)| SkillSnapshot {
            skill_id,
            name: options.skill_names.display_name(skill_id),
            crit_rate: tally.crit_rate(),
            lucky_rate: tally.lucky_rate(),
            tally,
        })
        .collect();

    BucketSnapshot {
        value_per_second: value_per_second(tally.total, first_tick, last_tick, options.ticks_per_second),
        crit_rate: tally.crit_rate(),
        lucky_rate: tally.lucky_rate(),
        tally,
        first_tick,
        last_tick,
        is_npc: bucket.is_npc(),
        skills,
    }
}

#[derive(Debug, Clone)]
pub struct StatsOptions {
    pub ticks_per_second: u64,
    pub record_event_log: bool,
    pub skill_names: Arc<SkillNames>,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            ticks_per_second: crate::clock::DEFAULT_TICKS_PER_SECOND,
            record_event_log: true,
            skill_names: Arc::new(SkillNames::new()),
        }
    }
}

type StatsMap = DashMap<EntityId, Arc<EntityStats>>;

/// Owns every entity's aggregate state for the full session and the current section.
///
/// The section is a whole map behind one pointer. Resetting it swaps in an empty map,
/// so a reader either sees the old section or the new one, never a half-cleared bucket.
#[derive(Debug)]
pub struct StatisticsContext {
    full: StatsMap,
    section: RwLock<Arc<StatsMap>>,
    options: StatsOptions,
}

impl Default for StatisticsContext {
    fn default() -> Self {
        Self::new(StatsOptions::default())
    }
}

impl StatisticsContext {
    pub fn new(options: StatsOptions) -> Self {
        Self {
            full: DashMap::new(),
            section: RwLock::new(Arc::new(DashMap::new())),
            options,
        }
    }

    pub fn options(&self) -> &StatsOptions {
        &self.options
    }

    pub fn get_or_create_full(&self, id: EntityId) -> Arc<EntityStats> {
        get_or_create(&self.full, id)
    }

    pub fn get_or_create_section(&self, id: EntityId) -> Arc<EntityStats> {
        let section = self.section.read().clone();
        get_or_create(&section, id)
    }

    /// Both views of one entity, full first.
    pub fn get_or_create_both(&self, id: EntityId) -> [Arc<EntityStats>; 2] {
        [self.get_or_create_full(id), self.get_or_create_section(id)]
    }

    pub fn reset_section(&self) {
        let fresh = Arc::new(DashMap::new());
        let previous = std::mem::replace(&mut *self.section.write(), fresh);
        log::info!("Section reset, {} entities cleared", previous.len());
    }

    /// Clears one entity's section view by swapping in a fresh bucket set.
    pub fn reset_entity_section(&self, id: EntityId) {
        let section = self.section.read().clone();
        if section.insert(id, Arc::new(EntityStats::new())).is_some() {
            log::debug!("Section reset for entity {}", id);
        }
    }

    pub fn full_statistics(&self, id: EntityId) -> Option<AggregateSnapshot> {
        let stats = self.full.get(&id).map(|entry| entry.value().clone())?;
        Some(stats.snapshot(id, &self.options))
    }

    /// Entities tracked for the session but idle since the last reset get an empty snapshot.
    pub fn section_statistics(&self, id: EntityId) -> Option<AggregateSnapshot> {
        let section = self.section.read().clone();
        match section.get(&id).map(|entry| entry.value().clone()) {
            Some(stats) => Some(stats.snapshot(id, &self.options)),
            None if self.full.contains_key(&id) => Some(AggregateSnapshot::empty(id)),
            None => None,
        }
    }

    pub fn tracked_entities(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.full.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn section_entities(&self) -> Vec<EntityId> {
        let section = self.section.read().clone();
        let mut ids: Vec<EntityId> = section.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Records one event into `metric` of both views for `id`.
    pub fn record(&self, id: EntityId, metric: Metric, event: &CombatEvent, as_npc: bool) {
        for stats in self.get_or_create_both(id) {
            if as_npc {
                stats.bucket(metric).mark_npc();
            }
            stats.record(metric, event);
            if self.options.record_event_log {
                stats.log_event(*event);
            }
        }
    }
}

fn get_or_create(map: &StatsMap, id: EntityId) -> Arc<EntityStats> {
    if let Some(stats) = map.get(&id) {
        return stats.value().clone();
    }
    map.entry(id)
        .or_insert_with(|| Arc::new(EntityStats::new()))
        .clone()
}
