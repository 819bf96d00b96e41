//! Trigger objects

use distance_core::{Result, Transform};

use crate::fragment_attrs;
use crate::object::ObjectClass;
use crate::registry::Registrar;

const MODULE: &str = "objects::triggers";

pub static MUSIC_TRIGGER: ObjectClass = ObjectClass {
    name: "MusicTrigger",
    type_name: Some("MusicTrigger"),
    default_fragments: &["Object", "MusicTrigger"],
    default_transform: Transform::EMPTY,
    has_children: false,
    module: MODULE,
};

pub static INFO_DISPLAY_BOX: ObjectClass = ObjectClass {
    name: "InfoDisplayBox",
    type_name: Some("InfoDisplayBox"),
    default_fragments: &["Object", "InfoDisplayLogic"],
    default_transform: Transform::EMPTY,
    has_children: false,
    module: MODULE,
};

pub static CAR_SCREEN_TEXT_DECODE_TRIGGER: ObjectClass = ObjectClass {
    name: "CarScreenTextDecodeTrigger",
    type_name: Some("CarScreenTextDecodeTrigger"),
    default_fragments: &["Object", "CarScreenTextDecodeTrigger"],
    default_transform: Transform::EMPTY,
    has_children: false,
    module: MODULE,
};

pub static GRAVITY_TRIGGER: ObjectClass = ObjectClass {
    name: "GravityTrigger",
    type_name: Some("GravityTrigger"),
    default_fragments: &["Object", "GravityTrigger"],
    default_transform: Transform::EMPTY,
    has_children: false,
    module: MODULE,
};

/// Entrance or exit of a teleporter pair, placed as a child of its model
pub static TELEPORTER: ObjectClass = ObjectClass {
    name: "Teleporter",
    type_name: Some("Teleporter"),
    default_fragments: &["Object", "TeleporterEntrance", "TeleporterExit"],
    default_transform: Transform::EMPTY,
    has_children: false,
    module: MODULE,
};

pub fn register(reg: &mut Registrar<'_>) -> Result<()> {
    for cls in [
        &MUSIC_TRIGGER,
        &INFO_DISPLAY_BOX,
        &CAR_SCREEN_TEXT_DECODE_TRIGGER,
        &GRAVITY_TRIGGER,
    ] {
        reg.object("level_objects", cls)?;
    }
    reg.object("level_subobjects", &TELEPORTER)
}

fragment_attrs! {
    pub trait MusicTriggerAttrs: "MusicTrigger" {
        music_id / set_music_id: u32;
        one_time_trigger / set_one_time_trigger: bool;
        reset_before_trigger / set_reset_before_trigger: bool;
        disable_music_trigger / set_disable_music_trigger: bool;
    }

    /// Text shown by info display boxes
    pub trait InfoDisplayAttrs: "InfoDisplayLogic" {
        fadeout_time / set_fadeout_time: f32;
        text0 / set_text0: String;
        text1 / set_text1: String;
        text2 / set_text2: String;
        text3 / set_text3: String;
        text4 / set_text4: String;
        per_char_speed / set_per_char_speed: f32;
        destroy_on_trigger_exit / set_destroy_on_trigger_exit: bool;
        display_time / set_display_time: f32;
    }

    pub trait GravityTriggerAttrs: "GravityTrigger" {
        disable_gravity / set_disable_gravity: bool;
        drag_scale / set_drag_scale: f32;
        drag_scale_angular / set_drag_scale_angular: f32;
    }

    pub trait TeleporterAttrs: "TeleporterEntrance" {
        destination / set_destination: u32;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::registry::Registry;
    use crate::schema::Value;

    #[test]
    fn test_music_id_forwarding() {
        let registry = Arc::new(Registry::eager().unwrap());
        let mut obj = registry.create_object("MusicTrigger").unwrap();
        assert_eq!(obj.music_id().unwrap(), 19);
        obj.set_music_id(7).unwrap();
        assert_eq!(obj.field("MusicTrigger", "music_id").unwrap(), Value::UInt(7));
    }

    #[test]
    fn test_info_display_unset_property() {
        let registry = Arc::new(Registry::eager().unwrap());
        let mut obj = registry.create_object("InfoDisplayBox").unwrap();
        assert_eq!(obj.get("InfoDisplayLogic").unwrap().version(), Some(2));

        // Missing keys read as absent and do not convert to a string
        assert!(obj.text0().is_err());
        obj.set_text0("Welcome".into()).unwrap();
        assert_eq!(obj.text0().unwrap(), "Welcome");
    }

    #[test]
    fn test_teleporter_is_subobject() {
        let registry = Registry::eager().unwrap();
        let section = crate::section::Section::object("Teleporter");
        assert_eq!(registry.probe("level_subobjects", &section).unwrap().name(), "Teleporter");
        assert_eq!(registry.probe("level_objects", &section).unwrap().name(), "DstObject");
    }
}
