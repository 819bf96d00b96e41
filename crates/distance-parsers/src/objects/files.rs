//! Top-level objects of the non-level file types

use distance_core::{Result, Transform};

use crate::object::ObjectClass;
use crate::registry::{Class, Registrar};
use crate::section::Section;

const MODULE: &str = "objects::files";

/// Type prefix of replay objects; the rest of the type is the replay name
pub const REPLAY_PREFIX: &str = "Replay: ";

macro_rules! file_object {
    ($static:ident, $type:literal, $tag:literal) => {
        pub static $static: ObjectClass = ObjectClass {
            name: $type,
            type_name: Some($type),
            default_fragments: &[$tag],
            default_transform: Transform::EMPTY,
            has_children: false,
            module: MODULE,
        };
    };
}

file_object!(LOCAL_LEADERBOARD, "LocalLeaderboard", "Leaderboard");
file_object!(LEVEL_INFOS, "LevelInfos", "LevelInfos");
file_object!(PROFILE_PROGRESS, "ProfileProgress", "ProfileProgress");
file_object!(WORKSHOP_LEVEL_INFOS, "WorkshopLevelInfos", "WorkshopLevelInfos");

pub static REPLAY: ObjectClass = ObjectClass {
    name: "Replay",
    type_name: None,
    default_fragments: &["Replay"],
    default_transform: Transform::EMPTY,
    has_children: false,
    module: MODULE,
};

fn probe_replay(section: &Section) -> Option<Class> {
    section
        .type_name()
        .filter(|t| t.starts_with(REPLAY_PREFIX))
        .map(|_| Class::Object(&REPLAY))
}

pub fn register(reg: &mut Registrar<'_>) -> Result<()> {
    for cls in [&LOCAL_LEADERBOARD, &LEVEL_INFOS, &PROFILE_PROGRESS, &WORKSHOP_LEVEL_INFOS] {
        reg.object("non_level_objects", cls)?;
    }
    reg.func("non_level_objects", probe_replay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn test_file_probe() {
        let registry = Registry::eager().unwrap();
        let probe = |t: &str| registry.probe("file", &Section::object(t)).unwrap().name();

        assert_eq!(probe("LocalLeaderboard"), "LocalLeaderboard");
        assert_eq!(probe("Replay: Ferreus"), "Replay");
        assert_eq!(probe("ProfileProgress"), "ProfileProgress");
        assert_eq!(probe("Group"), "Group");
        assert_eq!(probe("Whatever"), "DstObject");
    }

    #[test]
    fn test_level_object_not_in_files() {
        let registry = Registry::eager().unwrap();
        let class = registry.probe("non_level_objects", &Section::object("Group"));
        assert!(class.unwrap_err().is_registry_error());
    }
}
