//! Profile progress fragment
//!
//! Hand-written codec; the layout nests counted lists that the schema
//! combinators could express only awkwardly:
//!
//! ```text
//! level_count u32
//! repeat level_count:
//!     path        dst-string
//!     mode_count  u32
//!     repeat mode_count:
//!         completion u32
//!         score      i32
//! v1+: official_count u32, official_count × dst-string
//! v2+: stats, opaque to the section end
//! ```

use std::io::{Seek, Write};

use distance_core::{Error, Result};

use crate::bytes::{DstBytes, DstWriter};
use crate::fragment::{FragmentClass, Repr, Versions};
use crate::registry::Registrar;
use crate::schema::{FromValue, Record, Value};
use crate::section::Magic;

pub static PROFILE_PROGRESS: FragmentClass = FragmentClass::new(
    "ProfileProgress",
    Magic::M2,
    0x6a,
    Versions::Range(0, 2),
    Repr::ProfileProgress,
    "fragments::profile",
)
.interesting();

pub fn register(reg: &mut Registrar<'_>) -> Result<()> {
    reg.fragment(&PROFILE_PROGRESS)
}

/// Progress in one game mode of a level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeProgress {
    pub completion: u32,
    pub score: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelProgress {
    pub path: String,
    pub modes: Vec<ModeProgress>,
}

/// Decoded profile progress payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileProgressData {
    pub levels: Vec<LevelProgress>,
    pub official_levels: Vec<String>,
    pub stats: Vec<u8>,
}

impl ProfileProgressData {
    pub fn read(r: &mut DstBytes, version: u32) -> Result<Self> {
        let mut out = Self::default();

        let level_count = r.read_u32()?;
        for _ in 0..level_count {
            let path = r.read_str()?;
            let mode_count = r.read_u32()?;
            // Each mode needs 8 bytes; a bogus count must not allocate
            r.ensure(u64::from(mode_count) * 8)?;
            let modes = (0..mode_count)
                .map(|_| {
                    Ok(ModeProgress {
                        completion: r.read_u32()?,
                        score: r.read_i32()?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            out.levels.push(LevelProgress { path, modes });
        }

        if version >= 1 {
            let count = r.read_u32()?;
            for _ in 0..count {
                out.official_levels.push(r.read_str()?);
            }
        }
        if version >= 2 {
            out.stats = r.read_bytes(r.remaining())?.to_vec();
        }
        Ok(out)
    }

    pub fn write<W: Write + Seek>(&self, w: &mut DstWriter<W>, version: u32) -> Result<()> {
        w.write_u32(self.levels.len() as u32)?;
        for level in &self.levels {
            w.write_str(&level.path)?;
            w.write_u32(level.modes.len() as u32)?;
            for mode in &level.modes {
                w.write_u32(mode.completion)?;
                w.write_i32(mode.score)?;
            }
        }
        if version >= 1 {
            w.write_u32(self.official_levels.len() as u32)?;
            for path in &self.official_levels {
                w.write_str(path)?;
            }
        }
        if version >= 2 {
            w.write_bytes(&self.stats)?;
        }
        Ok(())
    }

    /// Typed view of `levels`, `official_levels` or `stats`
    pub fn field(&self, name: &str) -> Result<Value> {
        Ok(match name {
            "levels" => Value::List(self.levels.iter().map(level_to_value).collect()),
            "official_levels" => Value::List(self.official_levels.iter().cloned().map(Value::Str).collect()),
            "stats" => Value::Bytes(self.stats.clone()),
            _ => return Err(Error::schema(name, "no such field on ProfileProgress")),
        })
    }

    /// Replace a field from its typed view; returns whether it changed
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<bool> {
        let changed = match name {
            "levels" => {
                let levels = list_of(name, &value)?
                    .iter()
                    .map(level_from_value)
                    .collect::<Result<Vec<_>>>()?;
                replace(&mut self.levels, levels)
            }
            "official_levels" => {
                let paths = list_of(name, &value)?
                    .iter()
                    .map(String::from_value)
                    .collect::<Result<Vec<_>>>()?;
                replace(&mut self.official_levels, paths)
            }
            "stats" => match value {
                Value::Bytes(stats) => replace(&mut self.stats, stats),
                other => return Err(Error::schema(name, format!("expected bytes, found {}", other.kind()))),
            },
            _ => return Err(Error::schema(name, "no such field on ProfileProgress")),
        };
        Ok(changed)
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn list_of<'a>(name: &str, value: &'a Value) -> Result<&'a [Value]> {
    value
        .as_list()
        .ok_or_else(|| Error::schema(name, format!("expected list, found {}", value.kind())))
}

fn level_to_value(level: &LevelProgress) -> Value {
    let mut record = Record::new();
    record.push("path", Value::Str(level.path.clone()));
    let modes = level
        .modes
        .iter()
        .map(|m| {
            let mut mode = Record::new();
            mode.push("completion", Value::UInt(m.completion.into()));
            mode.push("score", Value::Int(m.score.into()));
            Value::Record(mode)
        })
        .collect();
    record.push("modes", Value::List(modes));
    Value::Record(record)
}

fn level_from_value(value: &Value) -> Result<LevelProgress> {
    let record = Record::from_value(value)?;
    let modes = list_of("modes", record.get("modes").unwrap_or(&Value::None))?
        .iter()
        .map(|m| {
            let mode = Record::from_value(m)?;
            Ok(ModeProgress {
                completion: mode.get_as("completion")?,
                score: mode.get_as("score")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(LevelProgress {
        path: record.get_as("path")?,
        modes,
    })
}
