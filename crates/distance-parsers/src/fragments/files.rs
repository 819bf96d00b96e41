//! Fragments of the non-level file types

use distance_core::Result;

use super::{float, int, since, string, BOOL, F32, I32, STR, U32, U64, U8};
use crate::fragment::{FragmentClass, Repr, Versions};
use crate::registry::Registrar;
use crate::schema::{Codec, Field};
use crate::section::Magic;

const MODULE: &str = "fragments::files";

static LEADERBOARD_ENTRY: Field = Field::Struct(&[
    ("playername", STR),
    ("time", I32),
    ("replay", since(1, &U64)),
]);

static LEADERBOARD_SCHEMA: Field = Field::Struct(&[("entries", Field::PrefixedArray(Codec::U32, &LEADERBOARD_ENTRY))]);

/// Rows of a local leaderboard; times are in milliseconds
pub static LEADERBOARD: FragmentClass = FragmentClass::new(
    "Leaderboard",
    Magic::M2,
    0x37,
    Versions::Range(0, 1),
    Repr::Schema(&LEADERBOARD_SCHEMA),
    MODULE,
)
.interesting();

static LEVEL_INFO: Field = Field::Struct(&[
    ("level_name", STR),
    ("level_path", STR),
    ("level_basename", STR),
    ("modes", U32),
    ("medal_times", Field::Repeat(&F32, 4)),
    ("medal_scores", Field::Repeat(&I32, 4)),
]);

static LEVEL_INFOS_SCHEMA: Field = Field::Struct(&[("levels", Field::PrefixedArray(Codec::U32, &LEVEL_INFO))]);

pub static LEVEL_INFOS: FragmentClass =
    FragmentClass::new("LevelInfos", Magic::M2, 0x97, Versions::Range(0, 0), Repr::Schema(&LEVEL_INFOS_SCHEMA), MODULE)
        .interesting();

static WORKSHOP_LEVEL: Field = Field::Struct(&[
    ("id", U64),
    ("title", STR),
    ("path", STR),
    ("author", STR),
    ("authorid", U64),
    ("published_by_user", BOOL),
    ("tags", STR),
    ("published_date", U32),
    ("updated_date", U32),
    ("rating", U8),
]);

static WORKSHOP_LEVEL_INFOS_SCHEMA: Field =
    Field::Struct(&[("levels", Field::PrefixedArray(Codec::U32, &WORKSHOP_LEVEL))]);

pub static WORKSHOP_LEVEL_INFOS: FragmentClass = FragmentClass::new(
    "WorkshopLevelInfos",
    Magic::M2,
    0x6d,
    Versions::Range(0, 0),
    Repr::Schema(&WORKSHOP_LEVEL_INFOS_SCHEMA),
    MODULE,
)
.interesting();

static COLOR: Field = Field::Repeat(&F32, 4);

static REPLAY_SCHEMA: Field = Field::Struct(&[
    ("player_name", string("")),
    ("player_id", since(2, &U64)),
    ("finish_time", int(-1)),
    ("replay_duration", since(3, &float(0.0))),
    ("car_name", string("Refractor")),
    ("car_colors", Field::Repeat(&COLOR, 4)),
    ("rest", Field::Remainder),
]);

/// Replay header; the recorded frames stay opaque
pub static REPLAY: FragmentClass =
    FragmentClass::new("Replay", Magic::M2, 0x7f, Versions::Range(1, 4), Repr::Schema(&REPLAY_SCHEMA), MODULE)
        .interesting();

pub fn register(reg: &mut Registrar<'_>) -> Result<()> {
    for cls in [&LEADERBOARD, &LEVEL_INFOS, &WORKSHOP_LEVEL_INFOS, &REPLAY] {
        reg.fragment(cls)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::{DstBytes, DstWriter};
    use crate::fragment::Fragment;
    use crate::schema::Value;
    use crate::section::Section;

    #[test]
    fn test_leaderboard_rows() {
        let mut w = DstWriter::memory();
        w.write_section(&Section::component(Magic::M2, 0x37, 1), |w| {
            w.write_u32(2)?;
            for (name, time) in [("Ferreus", 86260), ("Someone", 90000)] {
                w.write_str(name)?;
                w.write_i32(time)?;
                w.write_u64(0)?;
            }
            Ok(())
        })
        .unwrap();
        let bytes = w.into_bytes();
        let source = DstBytes::new(bytes.clone());
        let section = Section::read(&mut source.clone()).unwrap();
        let frag = Fragment::read(&LEADERBOARD, section, &source);

        let entries = frag.field("entries").unwrap();
        let rows = entries.as_list().unwrap();
        assert_eq!(rows.len(), 2);
        let first = rows[0].as_record().unwrap();
        assert_eq!(first.get_as::<String>("playername").unwrap(), "Ferreus");
        assert_eq!(first.get_as::<i32>("time").unwrap(), 86260);
    }

    #[test]
    fn test_replay_v1_layout() {
        let frag = Fragment::new_with_section(&REPLAY, Section::component(Magic::M2, 0x7f, 1));
        assert_eq!(frag.field("player_id").unwrap(), Value::None);
        assert_eq!(frag.field("replay_duration").unwrap(), Value::None);
        assert_eq!(frag.get::<i32>("finish_time").unwrap(), -1);

        let raw = frag.raw_data().unwrap();
        // name, finish time, car name, four colors
        assert_eq!(raw.len(), 1 + 4 + (1 + 2 * 9) + 4 * 16);
    }
}
