pub mod attr;
pub mod calculator;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod models;
pub mod packet_parser;
pub mod registry;
pub mod replay;
pub mod snapshot;
pub mod statistics;
pub mod storage;

use chrono::Utc;
use log::info;
use std::sync::Arc;

use calculator::CalculatorPipeline;
use clock::TickClock;
use config::AppConfig;
use dispatch::{DispatchOutcome, DispatchTable, Envelope, HandlerContext};
use registry::EntityRegistry;
use snapshot::{AggregateSnapshot, EntitySnapshot, SessionSnapshot};
use statistics::{StatisticsContext, StatsOptions};

// Error types
#[derive(Debug, thiserror::Error)]
pub enum MeterError {
    #[error("Malformed attribute 0x{attr_id:x}: {reason}")]
    MalformedAttribute { attr_id: u32, reason: String },
    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("Truncated buffer: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
    #[error("Config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Hex error: {0}")]
    Hex(#[from] hex::FromHexError),
}

// Result type alias
pub type Result<T> = std::result::Result<T, MeterError>;

/// Ingestion front door and read API over one combat session.
///
/// Safe to share across producer threads; every method takes `&self`.
#[derive(Debug)]
pub struct MeterEngine {
    context: HandlerContext,
    table: DispatchTable,
}

impl Default for MeterEngine {
    fn default() -> Self {
        Self::with_options(StatsOptions::default())
    }
}

impl MeterEngine {
    /// Builds an engine from configuration, loading the skill-name table if one is configured.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let skill_names = match &config.engine.skill_names_path {
            Some(path) => models::SkillNames::load_from_file(path)?,
            None => models::SkillNames::new(),
        };

        Ok(Self::with_options(StatsOptions {
            ticks_per_second: config.engine.ticks_per_second,
            record_event_log: config.engine.record_event_log,
            skill_names: Arc::new(skill_names),
        }))
    }

    pub fn with_options(options: StatsOptions) -> Self {
        Self::with_parts(options, CalculatorPipeline::standard(), DispatchTable::standard())
    }

    pub fn with_parts(options: StatsOptions, pipeline: CalculatorPipeline, table: DispatchTable) -> Self {
        let clock = TickClock::new(options.ticks_per_second);
        info!(
            "Meter engine ready: {} handlers, {} calculators, {} ticks/s",
            table.len(),
            pipeline.len(),
            options.ticks_per_second
        );
        let context = HandlerContext::new(StatisticsContext::new(options), pipeline, clock);
        Self { context, table }
    }

    pub fn dispatch(&self, method_id: u32, payload: &[u8]) -> DispatchOutcome {
        self.table.dispatch(&self.context, method_id, payload)
    }

    pub fn dispatch_envelope(&self, envelope: &Envelope) -> DispatchOutcome {
        self.table.dispatch_envelope(&self.context, envelope)
    }

    /// Feeds an already-normalized event through the calculators.
    pub fn submit_event(&self, event: &models::CombatEvent) -> usize {
        self.context.submit(event)
    }

    pub fn get_full_statistics(&self, id: models::EntityId) -> Option<AggregateSnapshot> {
        self.context.stats.full_statistics(id)
    }

    pub fn get_section_statistics(&self, id: models::EntityId) -> Option<AggregateSnapshot> {
        self.context.stats.section_statistics(id)
    }

    pub fn list_tracked_entities(&self) -> Vec<models::EntityId> {
        self.context.stats.tracked_entities()
    }

    pub fn reset_section(&self) {
        self.context.stats.reset_section();
    }

    pub fn entity(&self, id: models::EntityId) -> Option<models::Entity> {
        self.context.registry.get(id)
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.context.registry
    }

    pub fn statistics(&self) -> &StatisticsContext {
        &self.context.stats
    }

    pub fn local_player_uuid(&self) -> Option<u64> {
        self.context.local_player_uuid()
    }

    /// Captures every tracked entity's identity with both views.
    pub fn export_snapshot(&self) -> SessionSnapshot {
        let entities = self
            .list_tracked_entities()
            .into_iter()
            .filter_map(|id| {
                let full = self.get_full_statistics(id)?;
                let section = self
                    .get_section_statistics(id)
                    .unwrap_or_else(|| AggregateSnapshot::empty(id));
                let entity = self.entity(id).unwrap_or_else(|| models::Entity::new(id));
                Some(EntitySnapshot {
                    display_name: entity.display_name(),
                    profession: entity.profession_name(),
                    entity,
                    full,
                    section,
                })
            })
            .collect();

        SessionSnapshot {
            captured_at: Utc::now(),
            entities,
        }
    }
}

// Re-export for convenience
pub use models::*;
