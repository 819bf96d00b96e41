//! Trigger fragments
//!
//! Several trigger kinds store their settings as named-property dictionaries
//! rather than fixed layouts; their typed accessors are listed here.

use distance_core::Result;

use super::{flag, since, uint, STR};
use crate::fragment::{FragmentClass, NamedProp, PropKind, Repr, Versions};
use crate::registry::Registrar;
use crate::schema::{Codec, Field};
use crate::section::Magic;

const MODULE: &str = "fragments::triggers";

static MUSIC_TRIGGER_SCHEMA: Field = Field::Struct(&[
    ("music_id", uint(19)),
    ("one_time_trigger", flag(true)),
    ("reset_before_trigger", flag(false)),
    ("disable_music_trigger", since(2, &flag(false))),
]);

pub static MUSIC_TRIGGER: FragmentClass = FragmentClass::new(
    "MusicTrigger",
    Magic::M2,
    0xd3,
    Versions::Range(1, 2),
    Repr::Schema(&MUSIC_TRIGGER_SCHEMA),
    MODULE,
)
.interesting();

static TELEPORTER_ENTRANCE_SCHEMA: Field = Field::Struct(&[
    ("destination", uint(0)),
    ("trigger_checkpoint", since(3, &flag(true))),
]);

pub static TELEPORTER_ENTRANCE: FragmentClass = FragmentClass::new(
    "TeleporterEntrance",
    Magic::M2,
    0x3e,
    Versions::Range(0, 3),
    Repr::Schema(&TELEPORTER_ENTRANCE_SCHEMA),
    MODULE,
)
.interesting();

static TELEPORTER_EXIT_SCHEMA: Field = Field::Struct(&[
    ("link_id", uint(0)),
    ("trigger_checkpoint", since(1, &flag(true))),
]);

pub static TELEPORTER_EXIT: FragmentClass = FragmentClass::new(
    "TeleporterExit",
    Magic::M2,
    0x3f,
    Versions::Range(0, 1),
    Repr::Schema(&TELEPORTER_EXIT_SCHEMA),
    MODULE,
)
.interesting();

const fn prop(field: &'static str, key: &'static str, codec: Codec) -> NamedProp {
    NamedProp::new(field, key, PropKind::Codec(codec))
}

static INFO_DISPLAY_PROPS: &[NamedProp] = &[
    prop("fadeout_time", "FadeOutTime", Codec::F32),
    prop("text0", "InfoText0", Codec::Str),
    prop("text1", "InfoText1", Codec::Str),
    prop("text2", "InfoText2", Codec::Str),
    prop("text3", "InfoText3", Codec::Str),
    prop("text4", "InfoText4", Codec::Str),
    prop("per_char_speed", "PerCharSpeed", Codec::F32),
    prop("destroy_on_trigger_exit", "DestroyOnTriggerExit", Codec::Bool),
    prop("display_time", "DisplayTime", Codec::F32),
];

pub static INFO_DISPLAY_LOGIC: FragmentClass = FragmentClass::new(
    "InfoDisplayLogic",
    Magic::M2,
    0x4a,
    Versions::Any(2),
    Repr::NamedProperties(INFO_DISPLAY_PROPS),
    MODULE,
)
.interesting();

static ANNOUNCER_PHRASES: Field = Field::PrefixedArray(Codec::U32, &STR);

static CAR_SCREEN_PROPS: &[NamedProp] = &[
    prop("text", "Text", Codec::Str),
    prop("per_char_speed", "PerCharSpeed", Codec::F32),
    prop("clear_on_finish", "ClearOnFinish", Codec::Bool),
    prop("clear_on_trigger_exit", "ClearOnTriggerExit", Codec::Bool),
    prop("destroy_on_trigger_exit", "DestroyOnTriggerExit", Codec::Bool),
    prop("time_text", "TimeText", Codec::Str),
    prop("static_time_text", "StaticTimeText", Codec::Bool),
    prop("delay", "Delay", Codec::F32),
    prop("announcer_action", "AnnouncerAction", Codec::I32),
    NamedProp::new("announcer_phrases", "AnnouncerPhrases", PropKind::Struct(&ANNOUNCER_PHRASES)),
];

pub static CAR_SCREEN_TEXT_DECODE_TRIGGER: FragmentClass = FragmentClass::new(
    "CarScreenTextDecodeTrigger",
    Magic::M2,
    0x57,
    Versions::Any(2),
    Repr::NamedProperties(CAR_SCREEN_PROPS),
    MODULE,
)
.interesting();

static GRAVITY_PROPS: &[NamedProp] = &[
    prop("disable_gravity", "DisableGravity", Codec::Bool),
    prop("drag_scale", "DragScale", Codec::F32),
    prop("drag_scale_angular", "DragScaleAngular", Codec::F32),
    prop("music_id", "MusicId", Codec::U32),
    prop("one_time_trigger", "OneTimeTrigger", Codec::Bool),
    prop("reset_before_trigger", "ResetBeforeTrigger", Codec::Bool),
    prop("disable_music_trigger", "DisableMusicTrigger", Codec::Bool),
];

pub static GRAVITY_TRIGGER: FragmentClass = FragmentClass::new(
    "GravityTrigger",
    Magic::M2,
    0x45,
    Versions::Any(2),
    Repr::NamedProperties(GRAVITY_PROPS),
    MODULE,
)
.interesting();

pub fn register(reg: &mut Registrar<'_>) -> Result<()> {
    for cls in [
        &MUSIC_TRIGGER,
        &TELEPORTER_ENTRANCE,
        &TELEPORTER_EXIT,
        &INFO_DISPLAY_LOGIC,
        &CAR_SCREEN_TEXT_DECODE_TRIGGER,
        &GRAVITY_TRIGGER,
    ] {
        reg.fragment(cls)?;
    }
    // Pre-dictionary info display boxes; layout unknown
    reg.raw(Magic::M2, 0x4a, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::{DstBytes, DstWriter};
    use crate::fragment::{Fragment, FragmentData};
    use crate::schema::Value;
    use crate::section::Section;

    fn reread(frag: &Fragment) -> (Vec<u8>, Fragment) {
        let mut w = DstWriter::memory();
        frag.write(&mut w).unwrap();
        let bytes = w.into_bytes();
        let source = DstBytes::new(bytes.clone());
        let section = Section::read(&mut source.clone()).unwrap();
        (bytes, Fragment::read(frag.class(), section, &source))
    }

    #[test]
    fn test_music_trigger_defaults() {
        let frag = Fragment::new(&MUSIC_TRIGGER);
        assert_eq!(frag.get::<u32>("music_id").unwrap(), 19);
        assert_eq!(frag.get::<bool>("disable_music_trigger").unwrap(), false);
    }

    #[test]
    fn test_named_properties_roundtrip() {
        let mut frag = Fragment::new_with_section(&GRAVITY_TRIGGER, Section::component(Magic::M2, 0x45, 1));
        frag.set("disable_gravity", true).unwrap();
        frag.set("drag_scale", 0.5f32).unwrap();
        frag.set_field("music_id", Value::None).unwrap();

        let (bytes, back) = reread(&frag);
        assert_eq!(back.get::<bool>("disable_gravity").unwrap(), true);
        assert_eq!(back.get::<f32>("drag_scale").unwrap(), 0.5);
        assert_eq!(back.field("music_id").unwrap(), Value::None);
        assert_eq!(back.field("drag_scale_angular").unwrap(), Value::None);

        // Offsets are absolute: re-serialized at the same position, the bytes match
        let (again, _) = reread(&back);
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_struct_property() {
        let mut frag = Fragment::new_with_section(
            &CAR_SCREEN_TEXT_DECODE_TRIGGER,
            Section::component(Magic::M2, 0x57, 0),
        );
        let phrases = Value::List(vec![Value::Str("Go".into()), Value::Str("Faster".into())]);
        frag.set_field("announcer_phrases", phrases.clone()).unwrap();
        frag.set("text", "Hello").unwrap();

        let (_, back) = reread(&frag);
        assert_eq!(back.field("announcer_phrases").unwrap(), phrases);
        match back.data() {
            FragmentData::NamedProperties(props) => {
                assert!(!props.old_format);
                assert_eq!(props.keys().collect::<Vec<_>>(), vec!["AnnouncerPhrases", "Text"]);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_legacy_dictionary() {
        // No end offsets, 4-byte values
        let mut w = DstWriter::memory();
        w.write_section(&Section::component(Magic::M2, 0x4a, 2), |w| {
            w.write_u32(2)?;
            w.write_str("FadeOutTime")?;
            w.write_f32(2.5)?;
            w.write_str("DisplayTime")?;
            w.write_bytes(&distance_core::SKIP)
        })
        .unwrap();
        let bytes = w.into_bytes();
        let source = DstBytes::new(bytes.clone());
        let section = Section::read(&mut source.clone()).unwrap();
        let frag = Fragment::read(&INFO_DISPLAY_LOGIC, section, &source);

        assert!(frag.exception().is_none());
        assert_eq!(frag.get::<f32>("fadeout_time").unwrap(), 2.5);
        assert_eq!(frag.field("display_time").unwrap(), Value::None);

        let (again, _) = reread(&frag);
        assert_eq!(again, bytes);
    }
}
