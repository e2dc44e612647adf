use bytes::Buf;
use prost::Message;

use crate::dispatch::{DispatchTableBuilder, HandlerContext, MessageHandler};
use crate::models::*;
use crate::{MeterError, Result};

// Protobuf message definitions (only the fields the meter reads)
#[derive(Clone, PartialEq, Message)]
pub struct SyncNearEntities {
    #[prost(message, repeated, tag = "1")]
    pub appear: Vec<EntityAppear>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EntityAppear {
    #[prost(uint64, optional, tag = "1")]
    pub uuid: Option<u64>,
    #[prost(uint32, optional, tag = "2")]
    pub ent_type: Option<u32>,
    #[prost(message, optional, tag = "3")]
    pub attrs: Option<AttrCollection>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SyncNearDeltaInfo {
    #[prost(message, repeated, tag = "1")]
    pub delta_infos: Vec<AoiSyncDelta>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SyncToMeDeltaInfo {
    #[prost(message, optional, tag = "1")]
    pub delta_info: Option<AoiSyncToMeDelta>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AoiSyncToMeDelta {
    #[prost(message, optional, tag = "1")]
    pub base_delta: Option<AoiSyncDelta>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AoiSyncDelta {
    #[prost(uint64, optional, tag = "1")]
    pub uuid: Option<u64>,
    #[prost(message, optional, tag = "2")]
    pub attrs: Option<AttrCollection>,
    #[prost(message, optional, tag = "3")]
    pub skill_effects: Option<SkillEffects>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AttrCollection {
    #[prost(message, repeated, tag = "1")]
    pub attrs: Vec<Attr>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Attr {
    #[prost(uint32, optional, tag = "1")]
    pub id: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub raw_data: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SkillEffects {
    #[prost(message, repeated, tag = "1")]
    pub damages: Vec<SyncDamageInfo>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SyncDamageInfo {
    #[prost(uint32, optional, tag = "1")]
    pub owner_id: Option<u32>,
    #[prost(uint64, optional, tag = "2")]
    pub attacker_uuid: Option<u64>,
    #[prost(uint64, optional, tag = "3")]
    pub target_uuid: Option<u64>,
    #[prost(uint64, optional, tag = "4")]
    pub value: Option<u64>,
    #[prost(uint64, optional, tag = "5")]
    pub lucky_value: Option<u64>,
    #[prost(uint32, optional, tag = "6")]
    pub type_flag: Option<u32>,
    #[prost(bool, optional, tag = "7")]
    pub is_miss: Option<bool>,
    #[prost(uint64, optional, tag = "13")]
    pub top_summoner_id: Option<u64>,
    #[prost(uint32, optional, tag = "14")]
    pub r#type: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SyncContainerData {
    #[prost(message, optional, tag = "1")]
    pub v_data: Option<VData>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SyncContainerDirtyData {
    #[prost(message, optional, tag = "1")]
    pub v_data: Option<VData>,
}

#[derive(Clone, PartialEq, Message)]
pub struct VData {
    #[prost(uint32, optional, tag = "1")]
    pub char_id: Option<u32>,
    #[prost(message, optional, tag = "2")]
    pub role_level: Option<RoleLevel>,
    #[prost(message, optional, tag = "3")]
    pub attr: Option<AttrData>,
    #[prost(message, optional, tag = "4")]
    pub char_base: Option<CharBase>,
    #[prost(message, optional, tag = "5")]
    pub profession_list: Option<ProfessionList>,
    #[prost(bytes = "vec", optional, tag = "6")]
    pub buffer: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct RoleLevel {
    #[prost(uint32, optional, tag = "1")]
    pub level: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AttrData {
    #[prost(uint32, optional, tag = "1")]
    pub cur_hp: Option<u32>,
    #[prost(uint32, optional, tag = "2")]
    pub max_hp: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CharBase {
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    #[prost(uint32, optional, tag = "2")]
    pub fight_point: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProfessionList {
    #[prost(uint32, optional, tag = "1")]
    pub cur_profession_id: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum NotifyMethod {
    SyncNearEntities = 0x00000006,
    SyncContainerData = 0x00000015,
    SyncContainerDirtyData = 0x00000016,
    SyncNearDeltaInfo = 0x0000002d,
    SyncToMeDeltaInfo = 0x0000002e,
}

impl NotifyMethod {
    pub fn id(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EDamageType {
    Damage = 0,
    Heal = 1,
}

pub fn register_handlers(builder: DispatchTableBuilder) -> DispatchTableBuilder {
    builder
        .register(NotifyMethod::SyncNearEntities.id(), NearEntitiesHandler)
        .register(NotifyMethod::SyncNearDeltaInfo.id(), NearDeltaHandler)
        .register(NotifyMethod::SyncToMeDeltaInfo.id(), ToMeDeltaHandler)
        .register(NotifyMethod::SyncContainerData.id(), ContainerDataHandler)
        .register(NotifyMethod::SyncContainerDirtyData.id(), ContainerDirtyDataHandler)
}

pub struct NearEntitiesHandler;

impl MessageHandler for NearEntitiesHandler {
    fn name(&self) -> &'static str {
        "SyncNearEntities"
    }

    fn handle(&self, ctx: &HandlerContext, payload: &[u8]) -> Result<()> {
        let message = SyncNearEntities::decode(payload)?;

        for entity in &message.appear {
            let Some(uuid) = entity.uuid else { continue };
            let Some(id) = entity_id_from_uuid(uuid) else {
                log::trace!("Dropping entity with zero id (uuid {})", uuid);
                continue;
            };
            let tag = entity.ent_type.unwrap_or(0);

            match EntityKind::from_tag(tag) {
                Some(kind) => {
                    let attrs = entity.attrs.as_ref().map(|a| a.attrs.as_slice()).unwrap_or(&[]);
                    ctx.registry.apply_attrs(id, kind, attr_records(attrs));
                }
                None => log::debug!("Ignoring entity {} with type tag {}", id, tag),
            }
        }
        Ok(())
    }
}

pub struct NearDeltaHandler;

impl MessageHandler for NearDeltaHandler {
    fn name(&self) -> &'static str {
        "SyncNearDeltaInfo"
    }

    fn handle(&self, ctx: &HandlerContext, payload: &[u8]) -> Result<()> {
        let message = SyncNearDeltaInfo::decode(payload)?;
        for delta in &message.delta_infos {
            process_aoi_delta(ctx, delta);
        }
        Ok(())
    }
}

pub struct ToMeDeltaHandler;

impl MessageHandler for ToMeDeltaHandler {
    fn name(&self) -> &'static str {
        "SyncToMeDeltaInfo"
    }

    fn handle(&self, ctx: &HandlerContext, payload: &[u8]) -> Result<()> {
        let message = SyncToMeDeltaInfo::decode(payload)?;
        let Some(base_delta) = message.delta_info.and_then(|d| d.base_delta) else {
            return Ok(());
        };

        if let Some(uuid) = base_delta.uuid {
            if ctx.set_local_player_uuid(uuid) {
                log::info!("Got player UUID! UUID: {}, UID: {}", uuid, uuid >> 16);
            }
        }
        process_aoi_delta(ctx, &base_delta);
        Ok(())
    }
}

pub struct ContainerDataHandler;

impl MessageHandler for ContainerDataHandler {
    fn name(&self) -> &'static str {
        "SyncContainerData"
    }

    fn handle(&self, ctx: &HandlerContext, payload: &[u8]) -> Result<()> {
        let message = SyncContainerData::decode(payload)?;
        let Some(v_data) = message.v_data else {
            return Ok(());
        };
        let Some(id) = v_data.char_id.filter(|id| *id != 0).map(EntityId::from) else {
            log::trace!("Dropping container data without a character id");
            return Ok(());
        };

        if let Some(level) = v_data.role_level.and_then(|r| r.level) {
            ctx.registry.set_field(id, EntityField::Level(level as i32));
        }
        if let Some(attr) = v_data.attr {
            if let Some(cur_hp) = attr.cur_hp {
                ctx.registry.set_field(id, EntityField::Hp(cur_hp as i32));
            }
            if let Some(max_hp) = attr.max_hp {
                ctx.registry.set_field(id, EntityField::MaxHp(max_hp as i32));
            }
        }
        if let Some(char_base) = v_data.char_base {
            if let Some(name) = char_base.name {
                ctx.registry.set_field(id, EntityField::Name(name));
            }
            if let Some(fight_point) = char_base.fight_point {
                ctx.registry.set_field(id, EntityField::FightPoint(fight_point as i32));
            }
        }
        if let Some(profession_id) = v_data.profession_list.and_then(|p| p.cur_profession_id) {
            ctx.registry.set_field(id, EntityField::ProfessionId(profession_id as i32));
        }
        Ok(())
    }
}

pub struct ContainerDirtyDataHandler;

impl MessageHandler for ContainerDirtyDataHandler {
    fn name(&self) -> &'static str {
        "SyncContainerDirtyData"
    }

    fn handle(&self, ctx: &HandlerContext, payload: &[u8]) -> Result<()> {
        let Some(id) = ctx.local_player_uuid().and_then(entity_id_from_uuid) else {
            log::debug!("Skipping dirty data before the local player is known");
            return Ok(());
        };

        let message = SyncContainerDirtyData::decode(payload)?;
        match message.v_data.and_then(|v| v.buffer) {
            Some(buffer) => apply_dirty_buffer(ctx, id, &buffer),
            None => Ok(()),
        }
    }
}

mod dirty_field {
    pub const CHAR_BASE: u32 = 2;
    pub const CHAR_BASE_NAME: u32 = 5;
    pub const CHAR_BASE_FIGHT_POINT: u32 = 35;
    pub const FIGHT_ATTR: u32 = 16;
    pub const FIGHT_ATTR_CUR_HP: u32 = 1;
    pub const FIGHT_ATTR_MAX_HP: u32 = 2;
    pub const PROFESSION_LIST: u32 = 61;
    pub const PROFESSION_LIST_CUR: u32 = 1;
}

/// Applies a little-endian field-indexed patch of the local character.
/// Each index is a `u32` followed by four bytes of padding.
fn apply_dirty_buffer(ctx: &HandlerContext, id: EntityId, buffer: &[u8]) -> Result<()> {
    use dirty_field::*;

    let mut reader = BinaryReader::new(buffer);
    let field_index = reader.read_padded_u32_le()?;
    let sub_field_index = match field_index {
        CHAR_BASE | FIGHT_ATTR | PROFESSION_LIST => reader.read_padded_u32_le()?,
        _ => {
            log::trace!("Ignoring dirty field {}", field_index);
            return Ok(());
        }
    };

    let field = match (field_index, sub_field_index) {
        (CHAR_BASE, CHAR_BASE_NAME) => EntityField::Name(reader.read_string()?),
        (CHAR_BASE, CHAR_BASE_FIGHT_POINT) => EntityField::FightPoint(reader.read_padded_u32_le()? as i32),
        (FIGHT_ATTR, FIGHT_ATTR_CUR_HP) => EntityField::Hp(reader.read_u32_le()? as i32),
        (FIGHT_ATTR, FIGHT_ATTR_MAX_HP) => EntityField::MaxHp(reader.read_u32_le()? as i32),
        (PROFESSION_LIST, PROFESSION_LIST_CUR) => EntityField::ProfessionId(reader.read_padded_u32_le()? as i32),
        _ => return Ok(()),
    };
    ctx.registry.set_field(id, field);
    Ok(())
}

fn attr_records(attrs: &[Attr]) -> impl Iterator<Item = (u32, &[u8])> {
    attrs
        .iter()
        .filter_map(|attr| Some((attr.id?, attr.raw_data.as_deref()?)))
}

fn process_aoi_delta(ctx: &HandlerContext, delta: &AoiSyncDelta) {
    let Some(target_uuid) = delta.uuid else { return };
    let Some(target_id) = entity_id_from_uuid(target_uuid) else {
        log::trace!("Dropping delta for zero id (uuid {})", target_uuid);
        return;
    };

    if let Some(attrs) = &delta.attrs {
        match EntityKind::from_uuid(target_uuid) {
            Some(kind) => {
                ctx.registry.apply_attrs(target_id, kind, attr_records(&attrs.attrs));
            }
            None => log::debug!("Ignoring attributes for unclassified uuid {}", target_uuid),
        }
    }

    if let Some(skill_effects) = &delta.skill_effects {
        for damage_info in &skill_effects.damages {
            if let Some(event) = damage_event(damage_info, target_uuid, ctx.clock.now()) {
                log_event(&event);
                ctx.submit(&event);
            }
        }
    }
}

/// Normalizes one damage record. Records without a skill, without a resolvable attacker
/// or target, or without any value are dropped.
pub fn damage_event(damage_info: &SyncDamageInfo, target_uuid: u64, tick: i64) -> Option<CombatEvent> {
    let skill_id = damage_info.owner_id.unwrap_or(0);
    if skill_id == 0 {
        return None;
    }

    let attacker_uuid = damage_info
        .top_summoner_id
        .filter(|uuid| *uuid != 0)
        .or(damage_info.attacker_uuid)
        .unwrap_or(0);
    let (Some(attacker_id), Some(target_id)) = (
        entity_id_from_uuid(attacker_uuid),
        entity_id_from_uuid(target_uuid),
    ) else {
        log::trace!("Dropping damage with zero id: {} -> {}", attacker_uuid, target_uuid);
        return None;
    };

    let value = damage_info.value.unwrap_or(0);
    let lucky_value = damage_info.lucky_value.unwrap_or(0);
    let damage = if value > 0 { value } else { lucky_value };
    if damage == 0 {
        return None;
    }

    let type_flag = damage_info.type_flag.unwrap_or(0);
    Some(CombatEvent {
        attacker_id,
        target_id,
        skill_id,
        value: damage,
        attacker_is_player: is_uuid_player(attacker_uuid),
        target_is_player: is_uuid_player(target_uuid),
        is_heal: damage_info.r#type == Some(EDamageType::Heal as u32),
        is_crit: (type_flag & 1) == 1,
        is_lucky: lucky_value > 0,
        tick,
    })
}

fn log_event(event: &CombatEvent) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let side = |is_player: bool| if is_player { "Player" } else { "Enemy" };
    let extra = match event.hit_kind() {
        HitKind::Normal => "Normal",
        HitKind::Critical => "Crit",
        HitKind::Lucky => "Lucky",
        HitKind::CriticalLucky => "Crit|Lucky",
    };
    log::debug!(
        "[{}] SRC: {}#{} TGT: {}#{} ID: {} VAL: {} EXT: {}",
        if event.is_heal { "HEAL" } else { "DMG" },
        side(event.attacker_is_player),
        event.attacker_id,
        side(event.target_is_player),
        event.target_id,
        event.skill_id,
        event.value,
        extra
    );
}

/// Bounds-checked cursor over a byte slice.
pub struct BinaryReader<'a> {
    data: &'a [u8],
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn remaining(&self) -> usize {
        self.data.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.data.remaining() < needed {
            return Err(MeterError::Truncated {
                needed,
                remaining: self.data.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.data.get_u32_le())
    }

    /// A `u32` followed by four bytes of padding.
    pub fn read_padded_u32_le(&mut self) -> Result<u32> {
        let value = self.read_u32_le()?;
        self.skip(4)?;
        Ok(value)
    }

    pub fn skip(&mut self, length: usize) -> Result<()> {
        self.ensure(length)?;
        self.data.advance(length);
        Ok(())
    }

    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        self.ensure(length)?;
        let (head, tail) = self.data.split_at(length);
        self.data = tail;
        Ok(head)
    }

    /// Length-prefixed string: padded length, bytes, then padding.
    pub fn read_string(&mut self) -> Result<String> {
        let length = self.read_padded_u32_le()? as usize;
        let bytes = self.read_bytes(length)?;
        self.skip(4)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::AttrKind;
    use crate::dispatch::{DispatchOutcome, DispatchTable};

    const PLAYER_UUID: u64 = (1001 << 16) | 640;
    const OTHER_PLAYER_UUID: u64 = (1002 << 16) | 640;
    const MONSTER_UUID: u64 = (5001 << 16) | 64;

    fn int_attr(kind: AttrKind, value: i32) -> Attr {
        let mut raw = Vec::new();
        prost::encoding::encode_varint(value as i64 as u64, &mut raw);
        Attr {
            id: Some(kind.id()),
            raw_data: Some(raw),
        }
    }

    fn name_attr(name: &str) -> Attr {
        let mut raw = Vec::new();
        prost::encoding::encode_varint(name.len() as u64, &mut raw);
        raw.extend_from_slice(name.as_bytes());
        Attr {
            id: Some(AttrKind::Name.id()),
            raw_data: Some(raw),
        }
    }

    fn damage(attacker_uuid: u64, skill_id: u32, value: u64) -> SyncDamageInfo {
        SyncDamageInfo {
            owner_id: Some(skill_id),
            attacker_uuid: Some(attacker_uuid),
            value: Some(value),
            ..Default::default()
        }
    }

    fn delta(target_uuid: u64, damages: Vec<SyncDamageInfo>) -> AoiSyncDelta {
        AoiSyncDelta {
            uuid: Some(target_uuid),
            attrs: None,
            skill_effects: Some(SkillEffects { damages }),
        }
    }

    fn dispatch<M: Message>(ctx: &HandlerContext, method: NotifyMethod, message: &M) -> DispatchOutcome {
        DispatchTable::standard().dispatch(ctx, method.id(), &message.encode_to_vec())
    }

    #[test]
    fn test_near_entities_routes_by_type() {
        let ctx = HandlerContext::default();
        let message = SyncNearEntities {
            appear: vec![
                EntityAppear {
                    uuid: Some(PLAYER_UUID),
                    ent_type: Some(EntityKind::TAG_CHARACTER),
                    attrs: Some(AttrCollection {
                        attrs: vec![name_attr("Alice"), int_attr(AttrKind::FightPoint, 31_000)],
                    }),
                },
                EntityAppear {
                    uuid: Some(MONSTER_UUID),
                    ent_type: Some(EntityKind::TAG_MONSTER),
                    attrs: Some(AttrCollection {
                        attrs: vec![int_attr(AttrKind::TemplateId, 75), int_attr(AttrKind::MaxHp, 5_000)],
                    }),
                },
                EntityAppear {
                    uuid: Some((7 << 16) | 12),
                    ent_type: Some(99),
                    attrs: Some(AttrCollection {
                        attrs: vec![name_attr("Ghost")],
                    }),
                },
                EntityAppear {
                    uuid: Some(640),
                    ent_type: Some(EntityKind::TAG_CHARACTER),
                    attrs: None,
                },
            ],
        };

        assert_eq!(dispatch(&ctx, NotifyMethod::SyncNearEntities, &message), DispatchOutcome::Handled);

        let player = ctx.registry.get(1001).unwrap();
        assert_eq!(player.name, "Alice");
        assert_eq!(player.fight_point, 31_000);
        assert!(!player.is_npc);

        let monster = ctx.registry.get(5001).unwrap();
        assert!(monster.is_npc);
        assert_eq!(monster.template_id, Some(75));
        assert_eq!(monster.max_hp, 5_000);

        assert!(ctx.registry.get(7).is_none());
        assert_eq!(ctx.registry.len(), 2);
    }

    #[test]
    fn test_near_delta_produces_combat_events() {
        let ctx = HandlerContext::default();
        let mut crit_lucky = damage(PLAYER_UUID, 1241, 0);
        crit_lucky.lucky_value = Some(50);
        crit_lucky.type_flag = Some(1);

        let message = SyncNearDeltaInfo {
            delta_infos: vec![delta(MONSTER_UUID, vec![damage(PLAYER_UUID, 1241, 100), crit_lucky])],
        };
        assert_eq!(dispatch(&ctx, NotifyMethod::SyncNearDeltaInfo, &message), DispatchOutcome::Handled);

        let attack = ctx.stats.full_statistics(1001).unwrap().attack_damage;
        assert_eq!(attack.total(), 150);
        assert_eq!(attack.hit_count(), 2);
        assert_eq!(attack.tally.critical_lucky.count, 1);
        assert_eq!(attack.tally.critical_lucky.value, 50);
    }

    #[test]
    fn test_monster_hitting_player() {
        let ctx = HandlerContext::default();
        let message = SyncNearDeltaInfo {
            delta_infos: vec![delta(PLAYER_UUID, vec![damage(MONSTER_UUID, 9001, 300)])],
        };
        dispatch(&ctx, NotifyMethod::SyncNearDeltaInfo, &message);

        assert_eq!(ctx.stats.full_statistics(1001).unwrap().taken_damage.total(), 300);
        let npc = ctx.stats.full_statistics(5001).unwrap().attack_damage;
        assert_eq!(npc.total(), 300);
        assert!(npc.is_npc);
    }

    #[test]
    fn test_heal_credits_healer_only() {
        let ctx = HandlerContext::default();
        ctx.registry.set_field(1002, EntityField::Name("Patient".to_string()));
        let before = ctx.registry.get(1002).unwrap();

        let mut heal = damage(PLAYER_UUID, 20301, 0);
        heal.lucky_value = Some(200);
        heal.r#type = Some(EDamageType::Heal as u32);
        let message = SyncNearDeltaInfo {
            delta_infos: vec![delta(OTHER_PLAYER_UUID, vec![heal])],
        };
        dispatch(&ctx, NotifyMethod::SyncNearDeltaInfo, &message);

        let healing = ctx.stats.full_statistics(1001).unwrap().healing;
        assert_eq!(healing.total(), 200);
        assert_eq!(healing.tally.lucky.count, 1);
        assert_eq!(healing.tally.lucky.value, 200);
        assert_eq!(ctx.registry.get(1002).unwrap(), before);
    }

    #[test]
    fn test_damage_event_drops_invalid_records() {
        assert!(damage_event(&damage(PLAYER_UUID, 0, 10), MONSTER_UUID, 0).is_none());
        assert!(damage_event(&damage(640, 1, 10), MONSTER_UUID, 0).is_none());
        assert!(damage_event(&damage(PLAYER_UUID, 1, 10), 64, 0).is_none());
        assert!(damage_event(&damage(PLAYER_UUID, 1, 0), MONSTER_UUID, 0).is_none());
    }

    #[test]
    fn test_damage_event_prefers_top_summoner() {
        let mut info = damage(MONSTER_UUID, 77, 10);
        info.top_summoner_id = Some(PLAYER_UUID);
        let event = damage_event(&info, MONSTER_UUID, 42).unwrap();

        assert_eq!(event.attacker_id, 1001);
        assert!(event.attacker_is_player);
        assert!(!event.target_is_player);
        assert_eq!(event.tick, 42);
    }

    #[test]
    fn test_to_me_delta_sets_local_player() {
        let ctx = HandlerContext::default();
        let message = SyncToMeDeltaInfo {
            delta_info: Some(AoiSyncToMeDelta {
                base_delta: Some(AoiSyncDelta {
                    uuid: Some(PLAYER_UUID),
                    attrs: Some(AttrCollection {
                        attrs: vec![int_attr(AttrKind::Level, 60)],
                    }),
                    skill_effects: None,
                }),
            }),
        };
        dispatch(&ctx, NotifyMethod::SyncToMeDeltaInfo, &message);

        assert_eq!(ctx.local_player_uuid(), Some(PLAYER_UUID));
        assert_eq!(ctx.registry.get(1001).unwrap().level, 60);
    }

    #[test]
    fn test_container_data() {
        let ctx = HandlerContext::default();
        let message = SyncContainerData {
            v_data: Some(VData {
                char_id: Some(1001),
                role_level: Some(RoleLevel { level: Some(55) }),
                attr: Some(AttrData {
                    cur_hp: Some(800),
                    max_hp: Some(1000),
                }),
                char_base: Some(CharBase {
                    name: Some("Alice".to_string()),
                    fight_point: Some(20_000),
                }),
                profession_list: Some(ProfessionList {
                    cur_profession_id: Some(13),
                }),
                buffer: None,
            }),
        };
        dispatch(&ctx, NotifyMethod::SyncContainerData, &message);

        let entity = ctx.registry.get(1001).unwrap();
        assert_eq!(entity.level, 55);
        assert_eq!(entity.hp, 800);
        assert_eq!(entity.max_hp, 1000);
        assert_eq!(entity.name, "Alice");
        assert_eq!(entity.fight_point, 20_000);
        assert_eq!(entity.profession_name(), Some("灵魂乐手"));
    }

    fn dirty(buffer: Vec<u8>) -> SyncContainerDirtyData {
        SyncContainerDirtyData {
            v_data: Some(VData {
                buffer: Some(buffer),
                ..Default::default()
            }),
        }
    }

    fn padded(values: &[u32]) -> Vec<u8> {
        values
            .iter()
            .flat_map(|v| v.to_le_bytes().into_iter().chain([0u8; 4]))
            .collect()
    }

    #[test]
    fn test_dirty_data_requires_local_player() {
        let ctx = HandlerContext::default();
        let message = dirty(padded(&[16, 2, 4200]));

        assert_eq!(dispatch(&ctx, NotifyMethod::SyncContainerDirtyData, &message), DispatchOutcome::Handled);
        assert!(ctx.registry.is_empty());

        ctx.set_local_player_uuid(PLAYER_UUID);
        dispatch(&ctx, NotifyMethod::SyncContainerDirtyData, &message);
        assert_eq!(ctx.registry.get(1001).unwrap().max_hp, 4200);
    }

    #[test]
    fn test_dirty_data_name() {
        let ctx = HandlerContext::default();
        ctx.set_local_player_uuid(PLAYER_UUID);

        let mut buffer = padded(&[2, 5, 3]);
        buffer.extend_from_slice(b"Bob");
        buffer.extend_from_slice(&[0u8; 4]);
        dispatch(&ctx, NotifyMethod::SyncContainerDirtyData, &dirty(buffer));

        assert_eq!(ctx.registry.get(1001).unwrap().name, "Bob");
    }

    #[test]
    fn test_truncated_dirty_buffer_is_dropped() {
        let ctx = HandlerContext::default();
        ctx.set_local_player_uuid(PLAYER_UUID);
        let message = dirty(vec![2, 0, 0, 0]);

        assert_eq!(dispatch(&ctx, NotifyMethod::SyncContainerDirtyData, &message), DispatchOutcome::Dropped);
    }

    // server time sync, deliberately not handled
    const UNHANDLED_METHOD: u32 = 0x2b;

    #[test]
    fn test_garbage_payload_is_dropped() {
        let ctx = HandlerContext::default();
        let table = DispatchTable::standard();
        // field 1, wire type 2 (length-delimited) claiming more bytes than exist
        let garbage = [0x0a, 0x7f, 0x01];

        assert_eq!(
            table.dispatch(&ctx, NotifyMethod::SyncNearDeltaInfo.id(), &garbage),
            DispatchOutcome::Dropped
        );
        assert_eq!(
            table.dispatch(&ctx, UNHANDLED_METHOD, &garbage),
            DispatchOutcome::Unknown
        );
    }

    #[test]
    fn test_binary_reader_bounds() {
        let data = [1u8, 0, 0, 0, 0, 0, 0, 0, 9];
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_padded_u32_le().unwrap(), 1);
        assert_eq!(reader.remaining(), 1);
        assert!(matches!(
            reader.read_u32_le(),
            Err(MeterError::Truncated { needed: 4, remaining: 1 })
        ));
        assert_eq!(reader.read_bytes(1).unwrap(), &[9]);
    }
}
