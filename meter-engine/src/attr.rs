//! Decoding of single attribute records (`id + raw bytes`) into typed values.
//!
//! Payloads are protobuf-encoded primitives: a varint for integers and a
//! length-delimited UTF-8 run for strings.

use bytes::Buf;

use crate::models::{EntityField, EntityKind};
use crate::{MeterError, Result};

/// Attribute kinds understood by this protocol revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AttrKind {
    Name = 0x01,
    TemplateId = 0x0a,
    ProfessionId = 0xdc,
    Level = 0x2710,
    FightPoint = 0x272e,
    RankLevel = 0x274c,
    SeasonLevel = 0x2774,
    Crit = 0x2b66,
    Lucky = 0x2b7a,
    Hp = 0x2c2e,
    MaxHp = 0x2c38,
    SeasonStrength = 0x4e8e,
    ElementFlag = 0x646d6c,
    ReductionLevel = 0x64696d,
    ReductionId = 0x6f6c65,
    EnergyFlag = 0x543cd3c6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    String,
    Int32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    String(String),
    Int32(i32),
}

impl AttrKind {
    pub const ALL: [AttrKind; 16] = [
        AttrKind::Name,
        AttrKind::TemplateId,
        AttrKind::ProfessionId,
        AttrKind::Level,
        AttrKind::FightPoint,
        AttrKind::RankLevel,
        AttrKind::SeasonLevel,
        AttrKind::Crit,
        AttrKind::Lucky,
        AttrKind::Hp,
        AttrKind::MaxHp,
        AttrKind::SeasonStrength,
        AttrKind::ElementFlag,
        AttrKind::ReductionLevel,
        AttrKind::ReductionId,
        AttrKind::EnergyFlag,
    ];

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.id() == id)
    }

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn attr_type(self) -> AttrType {
        match self {
            AttrKind::Name => AttrType::String,
            _ => AttrType::Int32,
        }
    }

    /// Monsters only carry a handful of fields; characters carry everything but a template id.
    pub fn is_tracked_for(self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Monster => matches!(
                self,
                AttrKind::Name | AttrKind::TemplateId | AttrKind::Hp | AttrKind::MaxHp
            ),
            EntityKind::Character => self != AttrKind::TemplateId,
        }
    }

    pub fn to_field(self, value: AttrValue) -> Option<EntityField> {
        let field = match (self, value) {
            (AttrKind::Name, AttrValue::String(name)) => EntityField::Name(name),
            (_, AttrValue::String(_)) | (AttrKind::Name, _) => return None,
            (AttrKind::TemplateId, AttrValue::Int32(v)) => EntityField::TemplateId(v),
            (AttrKind::ProfessionId, AttrValue::Int32(v)) => EntityField::ProfessionId(v),
            (AttrKind::Level, AttrValue::Int32(v)) => EntityField::Level(v),
            (AttrKind::FightPoint, AttrValue::Int32(v)) => EntityField::FightPoint(v),
            (AttrKind::RankLevel, AttrValue::Int32(v)) => EntityField::RankLevel(v),
            (AttrKind::SeasonLevel, AttrValue::Int32(v)) => EntityField::SeasonLevel(v),
            (AttrKind::Crit, AttrValue::Int32(v)) => EntityField::Crit(v),
            (AttrKind::Lucky, AttrValue::Int32(v)) => EntityField::Lucky(v),
            (AttrKind::Hp, AttrValue::Int32(v)) => EntityField::Hp(v),
            (AttrKind::MaxHp, AttrValue::Int32(v)) => EntityField::MaxHp(v),
            (AttrKind::SeasonStrength, AttrValue::Int32(v)) => EntityField::SeasonStrength(v),
            (AttrKind::ElementFlag, AttrValue::Int32(v)) => EntityField::ElementFlag(v),
            (AttrKind::ReductionLevel, AttrValue::Int32(v)) => EntityField::ReductionLevel(v),
            (AttrKind::ReductionId, AttrValue::Int32(v)) => EntityField::ReductionId(v),
            (AttrKind::EnergyFlag, AttrValue::Int32(v)) => EntityField::EnergyFlag(v),
        };
        Some(field)
    }
}

/// Decodes one attribute payload according to the kind's wire type.
pub fn decode_attr(kind: AttrKind, raw: &[u8]) -> Result<AttrValue> {
    let mut buf = raw;
    match kind.attr_type() {
        AttrType::Int32 => {
            let value = read_varint(kind, &mut buf)?;
            // int32 is sign-extended to 64 bits on the wire
            Ok(AttrValue::Int32(value as i32))
        }
        AttrType::String => {
            let len = read_varint(kind, &mut buf)? as usize;
            if len > buf.remaining() {
                return Err(malformed(
                    kind,
                    format!("string length {} exceeds {} remaining bytes", len, buf.remaining()),
                ));
            }
            let text = std::str::from_utf8(&buf[..len])
                .map_err(|e| malformed(kind, format!("invalid utf-8: {}", e)))?;
            Ok(AttrValue::String(text.to_string()))
        }
    }
}

fn read_varint(kind: AttrKind, buf: &mut &[u8]) -> Result<u64> {
    prost::encoding::decode_varint(buf).map_err(|e| malformed(kind, e.to_string()))
}

fn malformed(kind: AttrKind, reason: String) -> MeterError {
    MeterError::MalformedAttribute {
        attr_id: kind.id(),
        reason,
    }
}
