//! Calculators route one combat event into the right aggregate buckets.
//!
//! Each calculator filters events without side effects and, when it matches, records the
//! event into both the full-session and section views. Calculators are independent of each
//! other and of their order, but not idempotent: feeding an event twice counts it twice.

use crate::models::CombatEvent;
use crate::statistics::{Metric, StatisticsContext};

pub trait Calculator: Send + Sync {
    fn name(&self) -> &'static str;

    fn accepts(&self, event: &CombatEvent) -> bool;

    fn apply(&self, stats: &StatisticsContext, event: &CombatEvent);
}

/// Player damage dealt to non-players.
#[derive(Debug, Default)]
pub struct AttackDamageCalculator;

impl Calculator for AttackDamageCalculator {
    fn name(&self) -> &'static str {
        "attack-damage"
    }

    fn accepts(&self, event: &CombatEvent) -> bool {
        event.attacker_is_player && !event.target_is_player && !event.is_heal
    }

    fn apply(&self, stats: &StatisticsContext, event: &CombatEvent) {
        stats.record(event.attacker_id, Metric::AttackDamage, event, false);
    }
}

/// Heals landing on players, credited to the healer.
#[derive(Debug, Default)]
pub struct HealingCalculator;

impl Calculator for HealingCalculator {
    fn name(&self) -> &'static str {
        "healing"
    }

    fn accepts(&self, event: &CombatEvent) -> bool {
        event.target_is_player && event.is_heal
    }

    fn apply(&self, stats: &StatisticsContext, event: &CombatEvent) {
        stats.record(event.attacker_id, Metric::Healing, event, false);
    }
}

/// Damage landing on players. When a non-player dealt it, the same hit is also
/// credited to that NPC's attack-damage bucket.
#[derive(Debug, Default)]
pub struct TakenDamageCalculator;

impl Calculator for TakenDamageCalculator {
    fn name(&self) -> &'static str {
        "taken-damage"
    }

    fn accepts(&self, event: &CombatEvent) -> bool {
        event.target_is_player && !event.is_heal
    }

    fn apply(&self, stats: &StatisticsContext, event: &CombatEvent) {
        stats.record(event.target_id, Metric::TakenDamage, event, false);
        if !event.attacker_is_player {
            stats.record(event.attacker_id, Metric::AttackDamage, event, true);
        }
    }
}

/// Ordered, extensible list of calculators.
pub struct CalculatorPipeline {
    calculators: Vec<Box<dyn Calculator>>,
}

impl Default for CalculatorPipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for CalculatorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.calculators.iter().map(|c| c.name()))
            .finish()
    }
}

impl CalculatorPipeline {
    pub fn empty() -> Self {
        Self {
            calculators: Vec::new(),
        }
    }

    pub fn standard() -> Self {
        Self::empty()
            .with(AttackDamageCalculator)
            .with(HealingCalculator)
            .with(TakenDamageCalculator)
    }

    pub fn with<C: Calculator + 'static>(mut self, calculator: C) -> Self {
        self.calculators.push(Box::new(calculator));
        self
    }

    pub fn len(&self) -> usize {
        self.calculators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }

    /// Runs every matching calculator. Returns how many matched.
    pub fn process(&self, stats: &StatisticsContext, event: &CombatEvent) -> usize {
        let mut matched = 0;
        for calculator in &self.calculators {
            if calculator.accepts(event) {
                calculator.apply(stats, event);
                matched += 1;
            }
        }
        if matched == 0 {
            log::trace!("No calculator accepted event {:?}", event);
        }
        matched
    }

    pub fn process_batch<'a, I>(&self, stats: &StatisticsContext, events: I) -> usize
    where
        I: IntoIterator<Item = &'a CombatEvent>,
    {
        events
            .into_iter()
            .map(|event| self.process(stats, event))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const PLAYER_A: EntityId = 10;
    const PLAYER_P: EntityId = 20;
    const HEALER_H: EntityId = 30;
    const NPC_N: EntityId = 40;

    #[test]
    fn test_damage_scenario() {
        let stats = StatisticsContext::default();
        let pipeline = CalculatorPipeline::standard();

        pipeline.process(&stats, &CombatEvent::new(PLAYER_A, NPC_N, 1001, 100, 1));
        pipeline.process(
            &stats,
            &CombatEvent::new(PLAYER_A, NPC_N, 1001, 50, 2)
                .with_crit(true)
                .with_lucky(true),
        );

        for snap in [
            stats.full_statistics(PLAYER_A).unwrap(),
            stats.section_statistics(PLAYER_A).unwrap(),
        ] {
            let attack = snap.attack_damage.tally;
            assert_eq!(attack.total, 150);
            assert_eq!(attack.hit_count, 2);
            assert_eq!(attack.critical_lucky.count, 1);
            assert_eq!(attack.normal.count, 1);
            assert_eq!(attack.critical.value + attack.lucky.value + attack.critical_lucky.value, 50);
            assert_eq!(attack.split_value_sum(), attack.total);
            assert!(!snap.attack_damage.is_npc);
        }

        // the NPC only received damage, it has no buckets of its own
        assert!(stats.full_statistics(NPC_N).is_none());
    }

    #[test]
    fn test_heal_scenario() {
        let stats = StatisticsContext::default();
        let pipeline = CalculatorPipeline::standard();

        let heal = CombatEvent::new(HEALER_H, PLAYER_P, 2001, 200, 5)
            .with_players(true, true)
            .with_heal(true)
            .with_lucky(true);
        assert_eq!(pipeline.process(&stats, &heal), 1);

        let healing = stats.full_statistics(HEALER_H).unwrap().healing;
        assert_eq!(healing.total(), 200);
        assert_eq!(healing.tally.lucky.count, 1);
        assert_eq!(healing.tally.lucky.value, 200);
        assert!(stats.full_statistics(PLAYER_P).is_none());
    }

    #[test]
    fn test_npc_symmetric_accounting() {
        let stats = StatisticsContext::default();
        let pipeline = CalculatorPipeline::standard();

        let hit = CombatEvent::new(NPC_N, PLAYER_P, 3001, 80, 7)
            .with_players(false, true)
            .with_crit(true);
        assert_eq!(pipeline.process(&stats, &hit), 1);

        let taken = stats.full_statistics(PLAYER_P).unwrap().taken_damage;
        let npc_attack = stats.full_statistics(NPC_N).unwrap().attack_damage;

        assert_eq!(taken.tally, npc_attack.tally);
        assert_eq!(taken.tally.critical.value, 80);
        assert!(npc_attack.is_npc);
        assert!(!taken.is_npc);
        assert_eq!(npc_attack.skill(3001).unwrap().tally.total, 80);
    }

    #[test]
    fn test_player_vs_player_damage_only_counts_as_taken() {
        let stats = StatisticsContext::default();
        let pipeline = CalculatorPipeline::standard();

        let pvp = CombatEvent::new(PLAYER_A, PLAYER_P, 1001, 60, 3).with_players(true, true);
        assert_eq!(pipeline.process(&stats, &pvp), 1);

        assert_eq!(stats.full_statistics(PLAYER_P).unwrap().taken_damage.total(), 60);
        assert!(stats.full_statistics(PLAYER_A).is_none());
    }

    #[test]
    fn test_heal_on_monster_is_ignored() {
        let stats = StatisticsContext::default();
        let pipeline = CalculatorPipeline::standard();

        let heal = CombatEvent::new(NPC_N, NPC_N + 1, 1, 10, 1)
            .with_players(false, false)
            .with_heal(true);
        assert_eq!(pipeline.process(&stats, &heal), 0);
        assert!(stats.tracked_entities().is_empty());
    }

    #[test]
    fn test_replay_double_counts() {
        let stats = StatisticsContext::default();
        let pipeline = CalculatorPipeline::standard();
        let event = CombatEvent::new(PLAYER_A, NPC_N, 1001, 25, 1);

        pipeline.process_batch(&stats, [&event, &event]);
        assert_eq!(stats.full_statistics(PLAYER_A).unwrap().attack_damage.total(), 50);
    }

    #[test]
    fn test_totals_survive_reset_of_other_entity() {
        let stats = StatisticsContext::default();
        let pipeline = CalculatorPipeline::standard();
        let values = [13u64, 7, 250, 1, 99];

        for (i, value) in values.iter().enumerate() {
            pipeline.process(&stats, &CombatEvent::new(PLAYER_A, NPC_N, 1001, *value, i as i64));
        }
        pipeline.process(&stats, &CombatEvent::new(PLAYER_P, NPC_N, 1001, 5, 0));

        let expected: u64 = values.iter().sum();
        let check = || {
            let full = stats.full_statistics(PLAYER_A).unwrap().attack_damage;
            let section = stats.section_statistics(PLAYER_A).unwrap().attack_damage;
            assert_eq!(full.total(), expected);
            assert_eq!(section.total(), expected);
            assert_eq!(full.hit_count(), values.len() as u64);
            assert_eq!(section.hit_count(), values.len() as u64);
        };

        check();
        stats.reset_entity_section(PLAYER_P);
        check();
        assert_eq!(stats.section_statistics(PLAYER_P).unwrap().attack_damage.total(), 0);
    }

    #[test]
    fn test_custom_calculator_extends_pipeline() {
        struct Counting(Arc<AtomicUsize>);

        impl Calculator for Counting {
            fn name(&self) -> &'static str {
                "counting"
            }

            fn accepts(&self, _event: &CombatEvent) -> bool {
                true
            }

            fn apply(&self, _stats: &StatisticsContext, _event: &CombatEvent) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let seen = Arc::new(AtomicUsize::new(0));
        let pipeline = CalculatorPipeline::standard().with(Counting(seen.clone()));
        let stats = StatisticsContext::default();

        assert_eq!(pipeline.len(), 4);
        assert_eq!(pipeline.process(&stats, &CombatEvent::new(PLAYER_A, NPC_N, 1, 1, 1)), 2);
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_exactly_one_classification_per_event() {
        let stats = StatisticsContext::default();
        let pipeline = CalculatorPipeline::standard();

        for i in 0..40i64 {
            let event = CombatEvent::new(PLAYER_A, NPC_N, (i % 3) as u32, 10, i)
                .with_crit(i % 2 == 0)
                .with_lucky(i % 5 == 0);
            pipeline.process(&stats, &event);
        }

        let attack = stats.full_statistics(PLAYER_A).unwrap().attack_damage;
        assert_eq!(attack.tally.split_count_sum(), attack.hit_count());
        assert_eq!(attack.hit_count(), 40);
        for skill in &attack.skills {
            assert_eq!(skill.tally.split_count_sum(), skill.tally.hit_count);
        }
    }

    #[test]
    fn test_concurrent_writers_single_entity() {
        let stats = StatisticsContext::default();
        let pipeline = CalculatorPipeline::standard();
        let threads = 8u64;
        let per_thread = 2_500u64;
        let value = 3u64;

        std::thread::scope(|scope| {
            for t in 0..threads {
                let stats = &stats;
                let pipeline = &pipeline;
                scope.spawn(move || {
                    for i in 0..per_thread {
                        let event = CombatEvent::new(PLAYER_A, NPC_N, (t % 4) as u32, value, i as i64)
                            .with_crit(i % 2 == 1);
                        pipeline.process(stats, &event);
                    }
                });
            }
        });

        for snap in [
            stats.full_statistics(PLAYER_A).unwrap(),
            stats.section_statistics(PLAYER_A).unwrap(),
        ] {
            assert_eq!(snap.attack_damage.total(), threads * per_thread * value);
            assert_eq!(snap.attack_damage.hit_count(), threads * per_thread);
            assert_eq!(snap.events.len() as u64, threads * per_thread);
        }
    }
}
