use serde::{Deserialize, Serialize};

use super::entity::EntityId;

/// Normalized combat action, consumed by every calculator in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatEvent {
    pub attacker_id: EntityId,
    pub target_id: EntityId,
    pub skill_id: u32,
    pub value: u64,
    pub attacker_is_player: bool,
    pub target_is_player: bool,
    pub is_heal: bool,
    pub is_crit: bool,
    pub is_lucky: bool,
    pub tick: i64,
}

/// Exactly one of these applies to every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitKind {
    Normal,
    Critical,
    Lucky,
    CriticalLucky,
}

impl HitKind {
    pub const ALL: [HitKind; 4] = [
        HitKind::Normal,
        HitKind::Critical,
        HitKind::Lucky,
        HitKind::CriticalLucky,
    ];

    pub fn classify(is_crit: bool, is_lucky: bool) -> Self {
        match (is_crit, is_lucky) {
            (true, true) => HitKind::CriticalLucky,
            (true, false) => HitKind::Critical,
            (false, true) => HitKind::Lucky,
            (false, false) => HitKind::Normal,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl CombatEvent {
    /// A plain player-on-monster hit. Use the `with_*` methods to adjust flags.
    pub fn new(attacker_id: EntityId, target_id: EntityId, skill_id: u32, value: u64, tick: i64) -> Self {
        Self {
            attacker_id,
            target_id,
            skill_id,
            value,
            attacker_is_player: true,
            target_is_player: false,
            is_heal: false,
            is_crit: false,
            is_lucky: false,
            tick,
        }
    }

    pub fn with_players(mut self, attacker_is_player: bool, target_is_player: bool) -> Self {
        self.attacker_is_player = attacker_is_player;
        self.target_is_player = target_is_player;
        self
    }

    pub fn with_heal(mut self, is_heal: bool) -> Self {
        self.is_heal = is_heal;
        self
    }

    pub fn with_crit(mut self, is_crit: bool) -> Self {
        self.is_crit = is_crit;
        self
    }

    pub fn with_lucky(mut self, is_lucky: bool) -> Self {
        self.is_lucky = is_lucky;
        self
    }

    pub fn hit_kind(&self) -> HitKind {
        HitKind::classify(self.is_crit, self.is_lucky)
    }
}
