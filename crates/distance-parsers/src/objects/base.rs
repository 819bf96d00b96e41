//! Groups, golden simples and zone markers

use distance_core::{Result, Transform, Vec3};

use crate::fragment_attrs;
use crate::object::ObjectClass;
use crate::registry::{Class, Registrar};
use crate::section::Section;

const MODULE: &str = "objects::base";

/// Container of child objects
pub static GROUP: ObjectClass = ObjectClass {
    name: "Group",
    type_name: Some("Group"),
    default_fragments: &["Object", "Group", "CustomName"],
    default_transform: Transform::EMPTY,
    has_children: true,
    module: MODULE,
};

/// Any of the textured primitive shapes (`CubeGS`, `SphereGS`, ...)
pub static GOLDEN_SIMPLE: ObjectClass = ObjectClass {
    name: "GoldenSimple",
    type_name: None,
    default_fragments: &["Object", "GoldenSimples"],
    default_transform: Transform::EMPTY,
    has_children: false,
    module: MODULE,
};

pub static EMPIRE_START_ZONE: ObjectClass = ObjectClass {
    name: "EmpireStartZone",
    type_name: Some("EmpireStartZone"),
    default_fragments: &["Object"],
    default_transform: Transform::EMPTY,
    has_children: false,
    module: MODULE,
};

pub static EMPIRE_END_ZONE: ObjectClass = ObjectClass {
    name: "EmpireEndZone",
    type_name: Some("EmpireEndZone"),
    default_fragments: &["Object"],
    default_transform: Transform::EMPTY,
    has_children: false,
    module: MODULE,
};

pub static EMPIRE_CHECKPOINT: ObjectClass = ObjectClass {
    name: "EmpireCheckpoint",
    type_name: Some("EmpireCheckpoint"),
    default_fragments: &["Object"],
    default_transform: Transform::EMPTY,
    has_children: false,
    module: MODULE,
};

fn probe_golden_simple(section: &Section) -> Option<Class> {
    section
        .type_name()
        .filter(|t| t.len() > 2 && t.ends_with("GS"))
        .map(|_| Class::Object(&GOLDEN_SIMPLE))
}

pub fn register(reg: &mut Registrar<'_>) -> Result<()> {
    for collection in ["level_objects", "level_subobjects"] {
        reg.object(collection, &GROUP)?;
        reg.func(collection, probe_golden_simple)?;
    }
    for cls in [&EMPIRE_START_ZONE, &EMPIRE_END_ZONE, &EMPIRE_CHECKPOINT] {
        reg.object("level_objects", cls)?;
    }
    Ok(())
}

fragment_attrs! {
    /// Group settings
    pub trait GroupAttrs: "Group" {
        inspect_children / set_inspect_children: i32;
    }

    /// Editor name of an object
    pub trait CustomNameAttrs: "CustomName" {
        custom_name / set_custom_name: String;
    }

    /// Texturing of golden simples
    pub trait GoldenSimplesAttrs: "GoldenSimples" {
        image_index / set_image_index: i32;
        emit_index / set_emit_index: i32;
        preset / set_preset: i32;
        tex_scale / set_tex_scale: Vec3;
        tex_offset / set_tex_offset: Vec3;
        world_mapped / set_world_mapped: bool;
        disable_collision / set_disable_collision: bool;
        additive_transp / set_additive_transp: bool;
    }
}
