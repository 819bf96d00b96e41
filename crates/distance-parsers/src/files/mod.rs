// distance-parsers/src/files/mod.rs
//! File entry points
//!
//! Each `.bytes` file holds one outer section. [`probe_file`] looks at that
//! header and tells which entry point reads it; [`DstFile`] dispatches to it.
//!
//! | Outer section | Resolves to | Type |
//! |---------------|-------------|------|
//! | `M9` | level | [`Level`] |
//! | `M6 "LocalLeaderboard"` | object | [`Leaderboard`] |
//! | `M6 "LevelInfos"` | object | [`LevelInfos`] |
//! | `M6 "WorkshopLevelInfos"` | object | [`WorkshopLevelInfos`] |
//! | `M6 "ProfileProgress"` | object | [`ProfileProgress`] |
//! | `M6 "Replay: *"` | object | [`Replay`] |
//! | any other `M6` | object | [`CustomObject`] |

pub mod custom;
pub mod layer;
pub mod level;
pub mod records;

pub use custom::CustomObject;
pub use layer::{Layer, LayerFlags};
pub use level::{LegacySettings, Level, LevelContent, LEVEL_VERSION};
pub use records::{
    Leaderboard, LeaderboardEntry, LevelInfo, LevelInfos, ProfileProgress, Replay, WorkshopLevelInfo,
    WorkshopLevelInfos,
};

use std::io::{Seek, Write};
use std::path::Path;

use distance_core::{Error, Result};

use crate::bytes::{DstBytes, DstWriter};
use crate::objects::files::{LEVEL_INFOS, LOCAL_LEADERBOARD, PROFILE_PROGRESS, REPLAY, WORKSHOP_LEVEL_INFOS};
use crate::registry::{Class, ContainerKind, Registry};
use crate::section::Section;
use crate::traits::{DstFormat, HumanReadable, ReadContext};

/// What a file contains, as told by its outer header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Level,
    Leaderboard,
    LevelInfos,
    WorkshopLevelInfos,
    ProfileProgress,
    Replay,
    CustomObject,
}

impl FileKind {
    pub fn name(self) -> &'static str {
        match self {
            FileKind::Level => Level::NAME,
            FileKind::Leaderboard => Leaderboard::NAME,
            FileKind::LevelInfos => LevelInfos::NAME,
            FileKind::WorkshopLevelInfos => WorkshopLevelInfos::NAME,
            FileKind::ProfileProgress => ProfileProgress::NAME,
            FileKind::Replay => Replay::NAME,
            FileKind::CustomObject => CustomObject::NAME,
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify the file at the reader's position without moving it
pub fn probe_file(r: &DstBytes, registry: &Registry) -> Result<FileKind> {
    let section = Section::read(&mut r.clone())?;
    let kind = match registry.probe("file", &section)? {
        Class::Container(ContainerKind::Level) => FileKind::Level,
        Class::Object(cls) if std::ptr::eq(cls, &LOCAL_LEADERBOARD) => FileKind::Leaderboard,
        Class::Object(cls) if std::ptr::eq(cls, &LEVEL_INFOS) => FileKind::LevelInfos,
        Class::Object(cls) if std::ptr::eq(cls, &WORKSHOP_LEVEL_INFOS) => FileKind::WorkshopLevelInfos,
        Class::Object(cls) if std::ptr::eq(cls, &PROFILE_PROGRESS) => FileKind::ProfileProgress,
        Class::Object(cls) if std::ptr::eq(cls, &REPLAY) => FileKind::Replay,
        Class::Object(_) => FileKind::CustomObject,
        other => {
            return Err(Error::Probe {
                key: format!("{} resolves to {other}, which is not a file", section.key()),
            })
        }
    };
    tracing::debug!(section = %section, kind = %kind, "probed file");
    Ok(kind)
}

/// Any `.bytes` file
#[derive(Debug)]
pub enum DstFile {
    Level(Level),
    Leaderboard(Leaderboard),
    LevelInfos(LevelInfos),
    WorkshopLevelInfos(WorkshopLevelInfos),
    ProfileProgress(ProfileProgress),
    Replay(Replay),
    CustomObject(CustomObject),
}

macro_rules! each_file {
    ($value:expr, $file:ident => $body:expr) => {
        match $value {
            DstFile::Level($file) => $body,
            DstFile::Leaderboard($file) => $body,
            DstFile::LevelInfos($file) => $body,
            DstFile::WorkshopLevelInfos($file) => $body,
            DstFile::ProfileProgress($file) => $body,
            DstFile::Replay($file) => $body,
            DstFile::CustomObject($file) => $body,
        }
    };
}

impl DstFile {
    pub fn kind(&self) -> FileKind {
        match self {
            DstFile::Level(_) => FileKind::Level,
            DstFile::Leaderboard(_) => FileKind::Leaderboard,
            DstFile::LevelInfos(_) => FileKind::LevelInfos,
            DstFile::WorkshopLevelInfos(_) => FileKind::WorkshopLevelInfos,
            DstFile::ProfileProgress(_) => FileKind::ProfileProgress,
            DstFile::Replay(_) => FileKind::Replay,
            DstFile::CustomObject(_) => FileKind::CustomObject,
        }
    }

    pub fn as_level(&self) -> Option<&Level> {
        match self {
            DstFile::Level(level) => Some(level),
            _ => None,
        }
    }
}

impl DstFormat for DstFile {
    const NAME: &'static str = "DstFile";

    fn read_with(r: &mut DstBytes, ctx: &ReadContext) -> Result<Self> {
        Ok(match probe_file(r, &ctx.registry)? {
            FileKind::Level => DstFile::Level(Level::read_with(r, ctx)?),
            FileKind::Leaderboard => DstFile::Leaderboard(Leaderboard::read_with(r, ctx)?),
            FileKind::LevelInfos => DstFile::LevelInfos(LevelInfos::read_with(r, ctx)?),
            FileKind::WorkshopLevelInfos => DstFile::WorkshopLevelInfos(WorkshopLevelInfos::read_with(r, ctx)?),
            FileKind::ProfileProgress => DstFile::ProfileProgress(ProfileProgress::read_with(r, ctx)?),
            FileKind::Replay => DstFile::Replay(Replay::read_with(r, ctx)?),
            FileKind::CustomObject => DstFile::CustomObject(CustomObject::read_with(r, ctx)?),
        })
    }

    fn write_to<W: Write + Seek>(&self, w: &mut DstWriter<W>) -> Result<()> {
        each_file!(self, file => file.write_to(w))
    }

    fn materialize_all(&self) {
        each_file!(self, file => file.materialize_all())
    }

    fn check_exceptions(&self) -> Result<()> {
        each_file!(self, file => file.check_exceptions())
    }
}

impl HumanReadable for DstFile {
    fn to_readable_string(&self) -> String {
        each_file!(self, file => file.to_readable_string())
    }

    fn to_json(&self) -> serde_json::Value {
        each_file!(self, file => file.to_json())
    }
}

/// Open any `.bytes` file with the default registry
pub fn open(path: impl AsRef<Path>) -> Result<DstFile> {
    DstFile::open(path)
}
