//! distance-parsers
//!
//! Lazy, round-trip-exact reader and writer for the `.bytes` files of the
//! game Distance.
//!
//! # Supported Files
//!
//! | File | Outer section | Entry point |
//! |------|---------------|-------------|
//! | Level | `M9` | [`Level`] |
//! | Local leaderboard | `M6 "LocalLeaderboard"` | [`Leaderboard`] |
//! | Official level list | `M6 "LevelInfos"` | [`LevelInfos`] |
//! | Workshop level list | `M6 "WorkshopLevelInfos"` | [`WorkshopLevelInfos`] |
//! | Profile progress | `M6 "ProfileProgress"` | [`ProfileProgress`] |
//! | Replay | `M6 "Replay: <name>"` | [`Replay`] |
//! | Custom object | any other `M6` | [`CustomObject`] |
//!
//! Reading only frames the outer section; layers, objects and fragments are
//! read when first accessed. Anything not modified is written back from its
//! original bytes, so an untouched file re-emits bit-identically.
//!
//! # Example
//!
//! ```rust,ignore
//! use distance_parsers::{DstFormat, Level, LevelSettingsAttrs};
//!
//! let mut level = Level::open("Test-straightroad.bytes")?;
//! println!("{} has {} layers", level.name(), level.layer_count());
//!
//! level.settings_mut().unwrap().set_name("New".into())?;
//! level.save("out.bytes")?;
//! ```

pub mod bytes;
pub mod files;
pub mod fragment;
pub mod fragments;
pub mod lazy;
pub mod logging;
pub mod object;
pub mod objects;
pub mod registry;
pub mod schema;
pub mod section;
pub mod traits;

// Re-export main types
pub use traits::{load_source, DstFormat, HumanReadable, ReadContext, ReadOptions, WriteOptions};

pub use crate::bytes::{DstBytes, DstWriter};
pub use section::{Extent, Ident, Magic, Section, SectionKey};
pub use lazy::{LazySeq, MappedSeq};

pub use registry::{default_registry, Class, ContainerKind, Manifest, Registry, DEFAULT_REGISTRY};

pub use fragment::{Fragment, FragmentClass, FragmentData, NamedProperties, Repr, Versions};
pub use schema::{FromValue, IntoValue, Record, Value};

pub use object::{DstObject, FragmentHost, ObjectClass};
pub use objects::{
    CustomNameAttrs, GoldenSimplesAttrs, GravityTriggerAttrs, GroupAttrs, InfoDisplayAttrs, LevelSettingsAttrs,
    MusicTriggerAttrs, TeleporterAttrs,
};

pub use files::{
    probe_file, CustomObject, DstFile, FileKind, Layer, LayerFlags, Leaderboard, LeaderboardEntry, LegacySettings,
    Level, LevelContent, LevelInfo, LevelInfos, ProfileProgress, Replay, WorkshopLevelInfo, WorkshopLevelInfos,
};

pub use logging::TracingConfig;

pub use distance_core::{Error, Quat, Result, ResultExt, Transform, Vec3, SKIP};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
