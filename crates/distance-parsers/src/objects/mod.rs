//! Concrete object classes
//!
//! Each module binds type strings to [`ObjectClass`](crate::object::ObjectClass)
//! values in one of the object collections and declares the accessor traits
//! that forward fragment fields to the object.
//!
//! | Collection | Types |
//! |------------|-------|
//! | `level_objects` | `Group`, `*GS`, `EmpireStartZone`, `EmpireEndZone`, `EmpireCheckpoint`, triggers |
//! | `level_subobjects` | `Group`, `*GS`, `Teleporter` |
//! | `level_content` | `LevelSettings` |
//! | `non_level_objects` | `LocalLeaderboard`, `LevelInfos`, `ProfileProgress`, `WorkshopLevelInfos`, `Replay: *` |

pub mod base;
pub mod files;
pub mod levelsettings;
pub mod triggers;

pub use base::{CustomNameAttrs, GoldenSimplesAttrs, GroupAttrs};
pub use levelsettings::LevelSettingsAttrs;
pub use triggers::{GravityTriggerAttrs, InfoDisplayAttrs, MusicTriggerAttrs, TeleporterAttrs};
