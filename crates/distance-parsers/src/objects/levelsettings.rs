//! Level settings object, the first entry of a level's content

use distance_core::{Result, Transform};

use crate::fragment_attrs;
use crate::object::ObjectClass;
use crate::registry::Registrar;

pub static LEVEL_SETTINGS: ObjectClass = ObjectClass {
    name: "LevelSettings",
    type_name: Some("LevelSettings"),
    default_fragments: &["LevelSettings"],
    default_transform: Transform::EMPTY,
    has_children: false,
    module: "objects::levelsettings",
};

pub fn register(reg: &mut Registrar<'_>) -> Result<()> {
    reg.object("level_content", &LEVEL_SETTINGS)
}

fragment_attrs! {
    /// Level-wide settings
    pub trait LevelSettingsAttrs: "LevelSettings" {
        name / set_name: String;
    }
}
