//! Immutable point-in-time views handed to readers (UI, exporters).
//!
//! Nothing in here references live counters; a snapshot can be held and iterated
//! for as long as the caller likes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{CombatEvent, Entity, EntityId};
use crate::storage::ListSnapshot;

/// Detailed per-event log of one entity in one view.
pub type EventLogSnapshot = ListSnapshot<CombatEvent>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SplitSnapshot {
    pub count: u64,
    pub value: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TallySnapshot {
    pub total: u64,
    pub hit_count: u64,
    pub normal: SplitSnapshot,
    pub critical: SplitSnapshot,
    pub lucky: SplitSnapshot,
    pub critical_lucky: SplitSnapshot,
}

impl TallySnapshot {
    pub fn split_value_sum(&self) -> u64 {
        self.normal.value + self.critical.value + self.lucky.value + self.critical_lucky.value
    }

    pub fn split_count_sum(&self) -> u64 {
        self.normal.count + self.critical.count + self.lucky.count + self.critical_lucky.count
    }

    /// Share of hits that were critical, lucky or not.
    pub fn crit_rate(&self) -> f64 {
        ratio(self.critical.count + self.critical_lucky.count, self.hit_count)
    }

    /// Share of hits that were lucky, critical or not.
    pub fn lucky_rate(&self) -> f64 {
        ratio(self.lucky.count + self.critical_lucky.count, self.hit_count)
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// `total * ticks_per_second / (last - first)`, NaN when no time has elapsed.
pub fn value_per_second(total: u64, first_tick: Option<i64>, last_tick: Option<i64>, ticks_per_second: u64) -> f64 {
    match (first_tick, last_tick) {
        (Some(first), Some(last)) if last > first => {
            let elapsed = (last as i128 - first as i128) as f64;
            total as f64 * ticks_per_second as f64 / elapsed
        }
        _ => f64::NAN,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillSnapshot {
    pub skill_id: u32,
    pub name: String,
    #[serde(flatten)]
    pub tally: TallySnapshot,
    pub crit_rate: f64,
    pub lucky_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSnapshot {
    #[serde(flatten)]
    pub tally: TallySnapshot,
    pub first_tick: Option<i64>,
    pub last_tick: Option<i64>,
    pub value_per_second: f64,
    pub crit_rate: f64,
    pub lucky_rate: f64,
    pub is_npc: bool,
    pub skills: Vec<SkillSnapshot>,
}

impl Default for BucketSnapshot {
    fn default() -> Self {
        Self {
            tally: TallySnapshot::default(),
            first_tick: None,
            last_tick: None,
            value_per_second: f64::NAN,
            crit_rate: 0.0,
            lucky_rate: 0.0,
            is_npc: false,
            skills: Vec::new(),
        }
    }
}

impl BucketSnapshot {
    pub fn total(&self) -> u64 {
        self.tally.total
    }

    pub fn hit_count(&self) -> u64 {
        self.tally.hit_count
    }

    pub fn skill(&self, skill_id: u32) -> Option<&SkillSnapshot> {
        self.skills.iter().find(|skill| skill.skill_id == skill_id)
    }
}

/// All three metrics for one entity in one view (full session or current section).
#[derive(Debug, Clone, Serialize)]
pub struct AggregateSnapshot {
    pub entity_id: EntityId,
    pub attack_damage: BucketSnapshot,
    pub healing: BucketSnapshot,
    pub taken_damage: BucketSnapshot,
    #[serde(skip)]
    pub events: EventLogSnapshot,
}

impl AggregateSnapshot {
    pub fn empty(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            attack_damage: BucketSnapshot::default(),
            healing: BucketSnapshot::default(),
            taken_damage: BucketSnapshot::default(),
            events: EventLogSnapshot::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attack_damage.hit_count() == 0
            && self.healing.hit_count() == 0
            && self.taken_damage.hit_count() == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitySnapshot {
    pub entity: Entity,
    pub display_name: String,
    pub profession: Option<&'static str>,
    pub full: AggregateSnapshot,
    pub section: AggregateSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub captured_at: DateTime<Utc>,
    pub entities: Vec<EntitySnapshot>,
}
