use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::attr::{decode_attr, AttrKind};
use crate::models::*;

/// Counts of what happened to a batch of attribute records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttrReport {
    pub applied: usize,
    pub unknown: usize,
    pub malformed: usize,
    pub skipped: usize,
}

/// Identity fields of every entity seen this session. Entries are never removed.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: DashMap<EntityId, Arc<RwLock<Entity>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure(&self, id: EntityId) -> Arc<RwLock<Entity>> {
        self.entities
            .entry(id)
            .or_insert_with(|| Arc::new(RwLock::new(Entity::new(id))))
            .clone()
    }

    pub fn ensure_kind(&self, id: EntityId, kind: EntityKind) -> Arc<RwLock<Entity>> {
        let entity = self
            .entities
            .entry(id)
            .or_insert_with(|| {
                let entity = match kind {
                    EntityKind::Monster => Entity::npc(id),
                    EntityKind::Character => Entity::new(id),
                };
                Arc::new(RwLock::new(entity))
            })
            .clone();
        // an entity first created from a bare id learns its type here
        if kind.is_npc() && !entity.read().is_npc {
            entity.write().is_npc = true;
        }
        entity
    }

    pub fn set_field(&self, id: EntityId, field: EntityField) {
        self.ensure(id).write().set_field(field);
    }

    pub fn get(&self, id: EntityId) -> Option<Entity> {
        self.entities.get(&id).map(|entry| entry.value().read().clone())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Decodes and applies attribute records to one entity.
    ///
    /// Unknown kinds and malformed payloads are logged and skipped. Empty payloads and
    /// kinds not tracked for this entity type are skipped silently.
    pub fn apply_attrs<'a, I>(&self, id: EntityId, kind: EntityKind, attrs: I) -> AttrReport
    where
        I: IntoIterator<Item = (u32, &'a [u8])>,
    {
        let entity = self.ensure_kind(id, kind);
        let mut report = AttrReport::default();

        for (attr_id, raw) in attrs {
            if raw.is_empty() {
                report.skipped += 1;
                continue;
            }

            let attr_kind = match AttrKind::from_id(attr_id) {
                Some(attr_kind) => attr_kind,
                None => {
                    log::debug!("Unknown attribute ID: 0x{:x} for {:?} {}", attr_id, kind, id);
                    report.unknown += 1;
                    continue;
                }
            };

            if !attr_kind.is_tracked_for(kind) {
                report.skipped += 1;
                continue;
            }

            let value = match decode_attr(attr_kind, raw) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!(
                        "Malformed attribute on {:?} {}: {} raw={}",
                        kind,
                        id,
                        e,
                        hex::encode(raw)
                    );
                    report.malformed += 1;
                    continue;
                }
            };

            match attr_kind.to_field(value) {
                Some(field) => {
                    entity.write().set_field(field);
                    report.applied += 1;
                }
                None => report.skipped += 1,
            }
        }

        report
    }
}
