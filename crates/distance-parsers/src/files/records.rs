//! Files holding a single top-level object (`M6`)
//!
//! | Type | Object type | Fragment |
//! |------|-------------|----------|
//! | [`Leaderboard`] | `LocalLeaderboard` | `Leaderboard` |
//! | [`LevelInfos`] | `LevelInfos` | `LevelInfos` |
//! | [`WorkshopLevelInfos`] | `WorkshopLevelInfos` | `WorkshopLevelInfos` |
//! | [`ProfileProgress`] | `ProfileProgress` | `ProfileProgress` |
//! | [`Replay`] | `Replay: <name>` | `Replay` |

use std::io::{Seek, Write};
use std::sync::Arc;

use distance_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::bytes::{DstBytes, DstWriter};
use crate::fragment::{Fragment, FragmentData};
use crate::fragments::profile::ProfileProgressData;
use crate::object::{DstObject, ObjectClass};
use crate::objects::files::{
    LEVEL_INFOS, LOCAL_LEADERBOARD, PROFILE_PROGRESS, REPLAY, REPLAY_PREFIX, WORKSHOP_LEVEL_INFOS,
};
use crate::registry::{Class, Registry};
use crate::schema::{Record, Value};
use crate::section::{Magic, Section};
use crate::traits::{DstFormat, HumanReadable, ReadContext};

/// Read an `M6` object that must resolve to `class` among the non-level objects
pub(crate) fn read_single(r: &mut DstBytes, ctx: &ReadContext, class: &'static ObjectClass) -> Result<DstObject> {
    let section = Section::expect(r, Magic::M6)?;
    match ctx.registry.probe("non_level_objects", &section)? {
        Class::Object(cls) if std::ptr::eq(cls, class) => {}
        other => {
            return Err(Error::Probe {
                key: format!("{} resolves to {other}, not {}", section.key(), class.name),
            })
        }
    }
    Ok(DstObject::read_body(r, section, class, ctx))
}

macro_rules! single_object_file {
    ($(#[$meta:meta])* $name:ident, $class:expr, $tag:literal) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            object: DstObject,
        }

        impl $name {
            /// Tag of the fragment carrying the payload
            pub const TAG: &'static str = $tag;

            pub fn from_object(object: DstObject) -> Self {
                Self { object }
            }

            pub fn object(&self) -> &DstObject {
                &self.object
            }

            pub fn object_mut(&mut self) -> &mut DstObject {
                &mut self.object
            }

            pub fn into_object(self) -> DstObject {
                self.object
            }

            pub fn fragment(&self) -> Result<&Fragment> {
                self.object.get($tag)
            }

            pub fn fragment_mut(&mut self) -> Result<&mut Fragment> {
                self.object.get_mut($tag)
            }
        }

        impl DstFormat for $name {
            const NAME: &'static str = stringify!($name);

            fn read_with(r: &mut DstBytes, ctx: &ReadContext) -> Result<Self> {
                read_single(r, ctx, &$class).map(Self::from_object)
            }

            fn write_to<W: Write + Seek>(&self, w: &mut DstWriter<W>) -> Result<()> {
                self.object.write(w)
            }

            fn materialize_all(&self) {
                self.object.materialize_all();
            }

            fn check_exceptions(&self) -> Result<()> {
                self.object.check_exceptions()
            }
        }

        impl HumanReadable for $name {
            fn to_readable_string(&self) -> String {
                describe(&self.object, $tag)
            }

            fn to_json(&self) -> serde_json::Value {
                serde_json::json!({
                    "format": Self::NAME,
                    "type": self.object.type_name(),
                    "fragment": fragment_json(&self.object, $tag),
                })
            }
        }
    };
}

fn describe(object: &DstObject, tag: &str) -> String {
    let mut out = format!("{object}\n");
    match object.get(tag).map(Fragment::data) {
        Ok(FragmentData::Record(record)) => {
            for (name, value) in record.iter() {
                let shown = match value {
                    Value::List(items) => format!("[{} items]", items.len()),
                    Value::Bytes(data) => format!("<{} bytes>", data.len()),
                    other => other.to_json().to_string(),
                };
                out.push_str(&format!("  {name}: {shown}\n"));
            }
        }
        Ok(_) => {}
        Err(err) => out.push_str(&format!("  {tag}: {err}\n")),
    }
    out
}

fn fragment_json(object: &DstObject, tag: &str) -> serde_json::Value {
    match object.get(tag).map(Fragment::data) {
        Ok(FragmentData::Record(record)) => record.to_json(),
        Ok(FragmentData::ProfileProgress(data)) => serde_json::json!({
            "levels": data.levels.len(),
            "official_levels": data.official_levels,
            "stats": data.stats.len(),
        }),
        Ok(_) => serde_json::Value::Null,
        Err(err) => serde_json::json!({ "error": err.to_string() }),
    }
}

fn records(fragment: &Fragment, field: &str) -> Result<Vec<Record>> {
    fragment.get(field)
}

single_object_file!(
    /// Local leaderboard of a level
    Leaderboard, LOCAL_LEADERBOARD, "Leaderboard"
);
single_object_file!(
    /// Official level list
    LevelInfos, LEVEL_INFOS, "LevelInfos"
);
single_object_file!(
    /// Subscribed workshop level list
    WorkshopLevelInfos, WORKSHOP_LEVEL_INFOS, "WorkshopLevelInfos"
);
single_object_file!(
    /// Per-profile level completion
    ProfileProgress, PROFILE_PROGRESS, "ProfileProgress"
);
single_object_file!(
    /// A recorded run
    Replay, REPLAY, "Replay"
);

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub playername: String,
    /// Milliseconds
    pub time: i32,
    /// Replay id; only stored from version 1
    pub replay: Option<u64>,
}

impl Leaderboard {
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        DstObject::create(registry, &LOCAL_LEADERBOARD, "LocalLeaderboard").map(Self::from_object)
    }

    pub fn version(&self) -> Option<u32> {
        self.fragment().ok().and_then(Fragment::version)
    }

    pub fn entries(&self) -> Result<Vec<LeaderboardEntry>> {
        records(self.fragment()?, "entries")?
            .iter()
            .map(|row| {
                Ok(LeaderboardEntry {
                    playername: row.get_as("playername")?,
                    time: row.get_as("time")?,
                    replay: row.get_as("replay")?,
                })
            })
            .collect()
    }

    /// Replace all rows; replay ids are dropped on version 0
    pub fn set_entries(&mut self, entries: &[LeaderboardEntry]) -> Result<()> {
        let with_replay = self.version().unwrap_or_default() >= 1;
        let rows: Vec<Value> = entries
            .iter()
            .map(|entry| {
                let mut row = Record::new();
                row.push("playername", Value::Str(entry.playername.clone()));
                row.push("time", Value::Int(entry.time.into()));
                let replay = match (with_replay, entry.replay) {
                    (true, id) => Value::UInt(id.unwrap_or_default()),
                    (false, _) => Value::None,
                };
                row.push("replay", replay);
                Value::Record(row)
            })
            .collect();
        self.fragment_mut()?.set_field("entries", Value::List(rows))
    }
}

/// One official level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub level_name: String,
    pub level_path: String,
    pub level_basename: String,
    pub modes: u32,
    pub medal_times: Vec<f32>,
    pub medal_scores: Vec<i32>,
}

impl LevelInfos {
    pub fn levels(&self) -> Result<Vec<LevelInfo>> {
        records(self.fragment()?, "levels")?
            .iter()
            .map(|row| {
                Ok(LevelInfo {
                    level_name: row.get_as("level_name")?,
                    level_path: row.get_as("level_path")?,
                    level_basename: row.get_as("level_basename")?,
                    modes: row.get_as("modes")?,
                    medal_times: row.get_as("medal_times")?,
                    medal_scores: row.get_as("medal_scores")?,
                })
            })
            .collect()
    }
}

/// One subscribed workshop level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkshopLevelInfo {
    pub id: u64,
    pub title: String,
    pub path: String,
    pub author: String,
    pub authorid: u64,
    pub published_by_user: bool,
    pub tags: String,
    pub published_date: u32,
    pub updated_date: u32,
    pub rating: u8,
}

impl WorkshopLevelInfos {
    pub fn levels(&self) -> Result<Vec<WorkshopLevelInfo>> {
        records(self.fragment()?, "levels")?
            .iter()
            .map(|row| {
                Ok(WorkshopLevelInfo {
                    id: row.get_as("id")?,
                    title: row.get_as("title")?,
                    path: row.get_as("path")?,
                    author: row.get_as("author")?,
                    authorid: row.get_as("authorid")?,
                    published_by_user: row.get_as("published_by_user")?,
                    tags: row.get_as("tags")?,
                    published_date: row.get_as("published_date")?,
                    updated_date: row.get_as("updated_date")?,
                    rating: row.get_as("rating")?,
                })
            })
            .collect()
    }
}

impl ProfileProgress {
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        DstObject::create(registry, &PROFILE_PROGRESS, "ProfileProgress").map(Self::from_object)
    }

    pub fn data(&self) -> Result<&ProfileProgressData> {
        match self.fragment()?.data() {
            FragmentData::ProfileProgress(data) => Ok(data),
            _ => Err(Error::schema("ProfileProgress", "fragment was not decoded")),
        }
    }

    /// Mutable payload; the fragment is re-serialized on write
    pub fn data_mut(&mut self) -> Result<&mut ProfileProgressData> {
        let fragment = self.fragment_mut()?;
        if !matches!(fragment.data(), FragmentData::ProfileProgress(_)) {
            return Err(Error::schema("ProfileProgress", "fragment was not decoded"));
        }
        match fragment.data_mut() {
            FragmentData::ProfileProgress(data) => Ok(data),
            _ => Err(Error::schema("ProfileProgress", "fragment was not decoded")),
        }
    }
}

impl Replay {
    pub fn new(registry: Arc<Registry>, name: &str) -> Result<Self> {
        let type_name = format!("{REPLAY_PREFIX}{name}");
        DstObject::create(registry, &REPLAY, &type_name).map(Self::from_object)
    }

    /// Replay name, from the object type
    pub fn name(&self) -> &str {
        let type_name = self.object.type_name();
        type_name.strip_prefix(REPLAY_PREFIX).unwrap_or(type_name)
    }

    pub fn set_name(&mut self, name: &str) {
        self.object.set_type_name(format!("{REPLAY_PREFIX}{name}"));
    }

    pub fn player_name(&self) -> Result<String> {
        self.fragment()?.get("player_name")
    }

    /// Milliseconds; -1 when the run was not finished
    pub fn finish_time(&self) -> Result<i32> {
        self.fragment()?.get("finish_time")
    }

    pub fn car_name(&self) -> Result<String> {
        self.fragment()?.get("car_name")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragments::profile::{LevelProgress, ModeProgress};
    use crate::traits::ReadOptions;

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::eager().unwrap())
    }

    fn entry(name: &str, time: i32) -> LeaderboardEntry {
        LeaderboardEntry {
            playername: name.into(),
            time,
            replay: Some(7),
        }
    }

    #[test]
    fn test_leaderboard_entries_roundtrip() {
        let registry = registry();
        let mut board = Leaderboard::new(registry.clone()).unwrap();
        assert_eq!(board.version(), Some(1));
        board
            .set_entries(&[entry("Ferreus", 86260), entry("Someone", 90000)])
            .unwrap();

        let bytes = board.to_bytes().unwrap();
        let back = Leaderboard::from_bytes_with(bytes.clone(), registry, &ReadOptions::strict()).unwrap();
        let entries = back.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], entry("Ferreus", 86260));
        assert_eq!(back.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_wrong_object_type() {
        let registry = registry();
        let board = Leaderboard::new(registry.clone()).unwrap();
        let bytes = board.to_bytes().unwrap();

        let err = LevelInfos::from_bytes_with(bytes, registry, &ReadOptions::default()).unwrap_err();
        assert!(err.is_registry_error());
    }

    #[test]
    fn test_profile_progress_edit() {
        let registry = registry();
        let mut profile = ProfileProgress::new(registry.clone()).unwrap();
        profile.data_mut().unwrap().levels.push(LevelProgress {
            path: "OfficialLevels/Broken Symmetry.bytes".into(),
            modes: vec![ModeProgress {
                completion: 1,
                score: 61234,
            }],
        });

        let bytes = profile.to_bytes().unwrap();
        let back = ProfileProgress::from_bytes_with(bytes, registry, &ReadOptions::default()).unwrap();
        let data = back.data().unwrap();
        assert_eq!(data.levels.len(), 1);
        assert_eq!(data.levels[0].modes[0].score, 61234);
    }

    #[test]
    fn test_replay_name() {
        let registry = registry();
        let mut replay = Replay::new(registry.clone(), "Ferreus").unwrap();
        assert_eq!(replay.name(), "Ferreus");
        assert_eq!(replay.finish_time().unwrap(), -1);
        replay.set_name("Other");

        let bytes = replay.to_bytes().unwrap();
        let back = Replay::from_bytes_with(bytes, registry, &ReadOptions::default()).unwrap();
        assert_eq!(back.name(), "Other");
        assert_eq!(back.car_name().unwrap(), "Refractor");
        assert!(back.to_json()["fragment"]["car_name"].is_string());
    }
}
