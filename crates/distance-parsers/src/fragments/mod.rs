//! Concrete fragment classes
//!
//! | Tag | Key | Versions | Module |
//! |-----|-----|----------|--------|
//! | `Object` | M3 0x01 | 0 | [`base`] |
//! | `Group` | M2 0x1d | 1-2 | [`base`] |
//! | `CustomName` | M2 0x63 | 0 | [`base`] |
//! | `GoldenSimples` | M2 0x83 | 0-3 | [`base`] |
//! | `Material` | M3 0x03 | 1-2 | [`base`] |
//! | `Animator` | M2 0x9a | 1-7 | [`animation`] |
//! | `EventListener` | M2 0x8a | 0-1 | [`animation`] |
//! | `EventTrigger` | M2 0x89 | 0-1 | [`animation`] |
//! | `MusicTrigger` | M2 0xd3 | 1-2 | [`triggers`] |
//! | `TeleporterEntrance` | M2 0x3e | 0-3 | [`triggers`] |
//! | `TeleporterExit` | M2 0x3f | 0-1 | [`triggers`] |
//! | `InfoDisplayLogic` | M2 0x4a | any | [`triggers`] |
//! | `CarScreenTextDecodeTrigger` | M2 0x57 | any | [`triggers`] |
//! | `GravityTrigger` | M2 0x45 | any | [`triggers`] |
//! | `LevelSettings` | M2 0x52 | 0-26 | [`levelsettings`] |
//! | `Leaderboard` | M2 0x37 | 0-1 | [`files`] |
//! | `LevelInfos` | M2 0x97 | 0 | [`files`] |
//! | `WorkshopLevelInfos` | M2 0x6d | 0 | [`files`] |
//! | `Replay` | M2 0x7f | 1-4 | [`files`] |
//! | `ProfileProgress` | M2 0x6a | 0-2 | [`profile`] |

pub mod animation;
pub mod base;
pub mod files;
pub mod levelsettings;
pub mod profile;
pub mod triggers;

use crate::schema::{Codec, Cond, ConstValue, Field};

// Shorthands shared by the schema tables

pub(crate) const STR: Field = Field::Codec(Codec::Str);
pub(crate) const U8: Field = Field::Codec(Codec::U8);
pub(crate) const U32: Field = Field::Codec(Codec::U32);
pub(crate) const I32: Field = Field::Codec(Codec::I32);
pub(crate) const U64: Field = Field::Codec(Codec::U64);
pub(crate) const F32: Field = Field::Codec(Codec::F32);
pub(crate) const BOOL: Field = Field::Codec(Codec::Bool);
pub(crate) const VEC3: Field = Field::Codec(Codec::Vec3);

pub(crate) const fn string(default: &'static str) -> Field {
    Field::Default(&STR, ConstValue::Str(default))
}

pub(crate) const fn uint(default: u64) -> Field {
    Field::Default(&U32, ConstValue::UInt(default))
}

pub(crate) const fn int(default: i64) -> Field {
    Field::Default(&I32, ConstValue::Int(default))
}

pub(crate) const fn float(default: f32) -> Field {
    Field::Default(&F32, ConstValue::F32(default))
}

pub(crate) const fn flag(default: bool) -> Field {
    Field::Default(&BOOL, ConstValue::Bool(default))
}

pub(crate) const fn vec3(default: [f32; 3]) -> Field {
    Field::Default(&VEC3, ConstValue::Vec3(default))
}

/// `field` from section version `version` on; absent before
pub(crate) const fn since(version: u32, field: &'static Field) -> Field {
    Field::IfThenElse(Cond::VersionAtLeast(version), field, &Field::Pass)
}
