//! Animator and event fragments

use distance_core::Result;

use super::{flag, float, int, since, string, vec3};
use crate::fragment::{FragmentClass, Repr, Versions};
use crate::registry::Registrar;
use crate::schema::Field;
use crate::section::Magic;

const MODULE: &str = "fragments::animation";

static ANIMATOR_SCHEMA: Field = Field::Struct(&[
    ("motion_mode", int(0)),
    ("do_scale", flag(false)),
    ("scale_exponent", vec3([0.0, 1.0, 0.0])),
    ("do_rotate", flag(true)),
    ("rotate_axis", vec3([0.0, 1.0, 0.0])),
    ("rotate_global", flag(false)),
    ("rotate_magnitude", float(90.0)),
    ("centerpoint", vec3([0.0, 0.0, 0.0])),
    ("translate_type", int(0)),
    ("translate_vector", vec3([0.0, 10.0, 0.0])),
    ("delay", float(1.0)),
    ("duration", float(1.0)),
    ("time_offset", float(0.0)),
    ("do_loop", flag(true)),
    ("extrapolation_type", int(0)),
    ("curve_type", int(0)),
    ("editor_anim_time", since(2, &float(0.0))),
    ("follow_track_distance", since(3, &float(0.0))),
    ("use_custom_pong_values", since(4, &flag(false))),
    ("pong_delay", since(4, &float(1.0))),
    ("pong_duration", since(4, &float(1.0))),
    ("pong_curve_type", since(4, &int(0))),
    ("anim_physics", since(5, &flag(true))),
    ("always_animate", since(6, &flag(false))),
    ("default_action", since(7, &int(0))),
    ("finished_action", since(7, &int(0))),
]);

pub static ANIMATOR: FragmentClass =
    FragmentClass::new("Animator", Magic::M2, 0x9a, Versions::Range(1, 7), Repr::Schema(&ANIMATOR_SCHEMA), MODULE)
        .interesting();

static EVENT_LISTENER_SCHEMA: Field = Field::Struct(&[
    ("event_name", string("")),
    ("enabled_by_default", since(1, &flag(true))),
]);

pub static EVENT_LISTENER: FragmentClass = FragmentClass::new(
    "EventListener",
    Magic::M2,
    0x8a,
    Versions::Range(0, 1),
    Repr::Schema(&EVENT_LISTENER_SCHEMA),
    MODULE,
);

static EVENT_TRIGGER_SCHEMA: Field = Field::Struct(&[
    ("event_name", string("")),
    ("one_time", since(1, &flag(false))),
]);

pub static EVENT_TRIGGER: FragmentClass = FragmentClass::new(
    "EventTrigger",
    Magic::M2,
    0x89,
    Versions::Range(0, 1),
    Repr::Schema(&EVENT_TRIGGER_SCHEMA),
    MODULE,
);

pub fn register(reg: &mut Registrar<'_>) -> Result<()> {
    reg.fragment(&ANIMATOR)?;
    reg.fragment(&EVENT_LISTENER)?;
    reg.fragment(&EVENT_TRIGGER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::{DstBytes, DstWriter};
    use crate::fragment::Fragment;
    use crate::schema::Value;
    use crate::section::Section;

    fn read_section(section: Section, body: impl FnOnce(&mut DstWriter<std::io::Cursor<Vec<u8>>>) -> Result<()>) -> Fragment {
        let mut w = DstWriter::memory();
        w.write_section(&section, body).unwrap();
        let source = DstBytes::new(w.into_bytes());
        let section = Section::read(&mut source.clone()).unwrap();
        Fragment::read(&ANIMATOR, section, &source)
    }

    #[test]
    fn test_animator_versions_gate_fields() {
        let v1 = Fragment::new_with_section(&ANIMATOR, Section::component(Magic::M2, 0x9a, 1));
        assert_eq!(v1.field("editor_anim_time").unwrap(), Value::None);
        assert_eq!(v1.field("finished_action").unwrap(), Value::None);

        let v7 = Fragment::new(&ANIMATOR);
        assert_eq!(v7.version(), Some(7));
        assert_eq!(v7.get::<bool>("anim_physics").unwrap(), true);
        assert_eq!(v7.get::<f32>("rotate_magnitude").unwrap(), 90.0);
    }

    #[test]
    fn test_short_animator_keeps_defaults() {
        // Only the first two fields are stored
        let frag = read_section(Section::component(Magic::M2, 0x9a, 3), |w| {
            w.write_i32(2)?;
            w.write_u8(1)
        });

        assert!(frag.exception().is_none());
        assert_eq!(frag.get::<i32>("motion_mode").unwrap(), 2);
        assert_eq!(frag.get::<bool>("do_scale").unwrap(), true);
        assert_eq!(frag.get::<f32>("delay").unwrap(), 1.0);
        assert!(frag.record().unwrap().is_truncated());

        let raw = frag.raw_data().unwrap();
        assert_eq!(raw.len(), 5);
    }
}
