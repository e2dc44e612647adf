use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::calculator::CalculatorPipeline;
use crate::clock::TickClock;
use crate::models::CombatEvent;
use crate::registry::EntityRegistry;
use crate::statistics::StatisticsContext;
use crate::Result;

/// One inbound message: a method id and its still-encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub method_id: u32,
    pub payload: Bytes,
}

impl Envelope {
    pub fn new(method_id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            method_id,
            payload: payload.into(),
        }
    }
}

/// Shared state every handler writes into.
#[derive(Debug)]
pub struct HandlerContext {
    pub registry: EntityRegistry,
    pub stats: StatisticsContext,
    pub pipeline: CalculatorPipeline,
    pub clock: TickClock,
    local_player_uuid: AtomicU64,
}

impl HandlerContext {
    pub fn new(stats: StatisticsContext, pipeline: CalculatorPipeline, clock: TickClock) -> Self {
        Self {
            registry: EntityRegistry::new(),
            stats,
            pipeline,
            clock,
            local_player_uuid: AtomicU64::new(0),
        }
    }

    pub fn submit(&self, event: &CombatEvent) -> usize {
        self.pipeline.process(&self.stats, event)
    }

    pub fn local_player_uuid(&self) -> Option<u64> {
        match self.local_player_uuid.load(Ordering::Acquire) {
            0 => None,
            uuid => Some(uuid),
        }
    }

    /// Returns true when the uuid changed.
    pub fn set_local_player_uuid(&self, uuid: u64) -> bool {
        self.local_player_uuid.swap(uuid, Ordering::AcqRel) != uuid
    }
}

impl Default for HandlerContext {
    fn default() -> Self {
        Self::new(
            StatisticsContext::default(),
            CalculatorPipeline::standard(),
            TickClock::default(),
        )
    }
}

pub trait MessageHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decodes and applies one payload. An error means the payload is not a structurally
    /// valid message of this kind; the dispatcher drops it and moves on.
    fn handle(&self, ctx: &HandlerContext, payload: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    Unknown,
    Dropped,
}

/// Method id -> handler. Built once, read-only afterwards.
pub struct DispatchTable {
    handlers: HashMap<u32, Box<dyn MessageHandler>>,
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.handlers.iter().map(|(id, h)| (format!("0x{:x}", id), h.name())))
            .finish()
    }
}

#[derive(Default)]
pub struct DispatchTableBuilder {
    handlers: HashMap<u32, Box<dyn MessageHandler>>,
}

impl DispatchTableBuilder {
    pub fn register<H: MessageHandler + 'static>(mut self, method_id: u32, handler: H) -> Self {
        if let Some(previous) = self.handlers.insert(method_id, Box::new(handler)) {
            log::warn!("Handler {} for method 0x{:x} was replaced", previous.name(), method_id);
        }
        self
    }

    pub fn build(self) -> DispatchTable {
        DispatchTable {
            handlers: self.handlers,
        }
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl DispatchTable {
    pub fn builder() -> DispatchTableBuilder {
        DispatchTableBuilder::default()
    }

    /// Table with every handler this crate knows about.
    pub fn standard() -> Self {
        crate::packet_parser::register_handlers(Self::builder()).build()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn handles(&self, method_id: u32) -> bool {
        self.handlers.contains_key(&method_id)
    }

    pub fn dispatch(&self, ctx: &HandlerContext, method_id: u32, payload: &[u8]) -> DispatchOutcome {
        let Some(handler) = self.handlers.get(&method_id) else {
            log::debug!("Unknown notify method: 0x{:x}", method_id);
            return DispatchOutcome::Unknown;
        };

        match handler.handle(ctx, payload) {
            Ok(()) => DispatchOutcome::Handled,
            Err(e) => {
                log::warn!(
                    "Dropping {} message (method 0x{:x}, {} bytes): {}",
                    handler.name(),
                    method_id,
                    payload.len(),
                    e
                );
                DispatchOutcome::Dropped
            }
        }
    }

    pub fn dispatch_envelope(&self, ctx: &HandlerContext, envelope: &Envelope) -> DispatchOutcome {
        self.dispatch(ctx, envelope.method_id, &envelope.payload)
    }
}
