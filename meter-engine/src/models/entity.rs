use serde::{Deserialize, Serialize};

/// Stable entity identifier: the on-wire uuid with its low 16 type bits discarded.
pub type EntityId = u64;

const UUID_TYPE_MASK: u64 = 0xffff;
const UUID_TYPE_PLAYER: u64 = 640;
const UUID_TYPE_MONSTER: u64 = 64;

/// Normalizes a raw wire uuid. A zero id is dropped.
pub fn entity_id_from_uuid(uuid: u64) -> Option<EntityId> {
    match uuid >> 16 {
        0 => None,
        id => Some(id),
    }
}

pub fn is_uuid_player(uuid: u64) -> bool {
    (uuid & UUID_TYPE_MASK) == UUID_TYPE_PLAYER
}

pub fn is_uuid_monster(uuid: u64) -> bool {
    (uuid & UUID_TYPE_MASK) == UUID_TYPE_MONSTER
}

/// The two entity types the engine tracks. Every other tag on the wire is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Monster,
    Character,
}

impl EntityKind {
    pub const TAG_MONSTER: u32 = 1;
    pub const TAG_CHARACTER: u32 = 10;

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            Self::TAG_MONSTER => Some(EntityKind::Monster),
            Self::TAG_CHARACTER => Some(EntityKind::Character),
            _ => None,
        }
    }

    pub fn from_uuid(uuid: u64) -> Option<Self> {
        if is_uuid_player(uuid) {
            Some(EntityKind::Character)
        } else if is_uuid_monster(uuid) {
            Some(EntityKind::Monster)
        } else {
            None
        }
    }

    pub fn is_npc(self) -> bool {
        matches!(self, EntityKind::Monster)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub is_npc: bool,
    pub template_id: Option<i32>,
    pub profession_id: i32,
    pub level: i32,
    pub rank_level: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub fight_point: i32,
    pub crit: i32,
    pub lucky: i32,
    pub season_level: i32,
    pub season_strength: i32,
    pub element_flag: i32,
    pub energy_flag: i32,
    pub reduction_level: i32,
    pub reduction_id: i32,
}

/// One identity field together with its new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityField {
    Name(String),
    TemplateId(i32),
    ProfessionId(i32),
    Level(i32),
    RankLevel(i32),
    Hp(i32),
    MaxHp(i32),
    FightPoint(i32),
    Crit(i32),
    Lucky(i32),
    SeasonLevel(i32),
    SeasonStrength(i32),
    ElementFlag(i32),
    EnergyFlag(i32),
    ReductionLevel(i32),
    ReductionId(i32),
}

impl Entity {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn npc(id: EntityId) -> Self {
        Self {
            id,
            is_npc: true,
            ..Default::default()
        }
    }

    pub fn set_field(&mut self, field: EntityField) {
        match field {
            EntityField::Name(name) => self.name = name,
            EntityField::TemplateId(v) => self.template_id = Some(v),
            EntityField::ProfessionId(v) => self.profession_id = v,
            EntityField::Level(v) => self.level = v,
            EntityField::RankLevel(v) => self.rank_level = v,
            EntityField::Hp(v) => self.hp = v,
            EntityField::MaxHp(v) => self.max_hp = v,
            EntityField::FightPoint(v) => self.fight_point = v,
            EntityField::Crit(v) => self.crit = v,
            EntityField::Lucky(v) => self.lucky = v,
            EntityField::SeasonLevel(v) => self.season_level = v,
            EntityField::SeasonStrength(v) => self.season_strength = v,
            EntityField::ElementFlag(v) => self.element_flag = v,
            EntityField::EnergyFlag(v) => self.energy_flag = v,
            EntityField::ReductionLevel(v) => self.reduction_level = v,
            EntityField::ReductionId(v) => self.reduction_id = v,
        }
    }

    pub fn profession_name(&self) -> Option<&'static str> {
        profession_name_from_id(self.profession_id)
    }

    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            match self.template_id {
                Some(template_id) if self.is_npc => format!("Monster_{}", template_id),
                _ => format!("Entity_{}", self.id),
            }
        } else {
            self.name.clone()
        }
    }
}

pub fn profession_name_from_id(profession_id: i32) -> Option<&'static str> {
    match profession_id {
        1 => Some("雷影剑士"),
        2 => Some("冰魔导师"),
        3 => Some("涤罪恶火·战斧"),
        4 => Some("青岚骑士"),
        5 => Some("森语者"),
        8 => Some("雷霆一闪·手炮"),
        9 => Some("巨刃守护者"),
        10 => Some("暗灵祈舞·仪刀/仪仗"),
        11 => Some("神射手"),
        12 => Some("神盾骑士"),
        13 => Some("灵魂乐手"),
        _ => None,
    }
}
