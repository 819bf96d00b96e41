//! Fragments shared by most placed objects

use distance_core::Result;

use super::{flag, float, int, since, string, vec3, F32, STR};
use crate::fragment::{FragmentClass, Repr, Versions};
use crate::registry::Registrar;
use crate::schema::{Codec, Field};
use crate::section::Magic;

const MODULE: &str = "fragments::base";

/// Transform block carried by every placed object
pub static OBJECT: FragmentClass = FragmentClass::new("Object", Magic::M3, 0x01, Versions::Range(0, 0), Repr::Transform, MODULE);

static GROUP_SCHEMA: Field = Field::Struct(&[
    ("inspect_children", int(0)),
    ("custom_name_visible", since(2, &flag(false))),
]);

pub static GROUP: FragmentClass =
    FragmentClass::new("Group", Magic::M2, 0x1d, Versions::Range(1, 2), Repr::Schema(&GROUP_SCHEMA), MODULE).interesting();

static CUSTOM_NAME_SCHEMA: Field = Field::Struct(&[("custom_name", string(""))]);

pub static CUSTOM_NAME: FragmentClass = FragmentClass::new(
    "CustomName",
    Magic::M2,
    0x63,
    Versions::Range(0, 0),
    Repr::Schema(&CUSTOM_NAME_SCHEMA),
    MODULE,
)
.interesting();

static GOLDEN_SIMPLES_SCHEMA: Field = Field::Struct(&[
    ("image_index", int(17)),
    ("emit_index", int(17)),
    ("preset", int(0)),
    ("tex_scale", vec3([1.0, 1.0, 1.0])),
    ("tex_offset", vec3([0.0, 0.0, 0.0])),
    ("flip_tex_uv", flag(false)),
    ("world_mapped", flag(false)),
    ("disable_diffuse", flag(false)),
    ("disable_bump", flag(false)),
    ("bump_strength", float(0.0)),
    ("disable_reflect", flag(false)),
    ("disable_collision", flag(false)),
    ("additive_transp", flag(false)),
    ("multip_transp", flag(false)),
    ("invert_emit", since(2, &flag(false))),
    ("emit_strength", since(3, &float(1.0))),
]);

pub static GOLDEN_SIMPLES: FragmentClass = FragmentClass::new(
    "GoldenSimples",
    Magic::M2,
    0x83,
    Versions::Range(0, 3),
    Repr::Schema(&GOLDEN_SIMPLES_SCHEMA),
    MODULE,
)
.interesting();

const COLOR: Field = Field::Repeat(&F32, 4);

static MATERIAL_COLOR: Field = Field::Struct(&[
    ("name", since(2, &STR)),
    ("color", COLOR),
]);

static MATERIAL_ENTRY: Field = Field::Struct(&[
    ("name", STR),
    ("colors", Field::PrefixedArray(Codec::U32, &MATERIAL_COLOR)),
]);

static MATERIAL_SCHEMA: Field = Field::Struct(&[("materials", Field::PrefixedArray(Codec::U32, &MATERIAL_ENTRY))]);

/// Per-object material color overrides
pub static MATERIAL: FragmentClass =
    FragmentClass::new("Material", Magic::M3, 0x03, Versions::Range(1, 2), Repr::Schema(&MATERIAL_SCHEMA), MODULE);

/// Component kinds seen in files whose layout is not known
const UNKNOWN_COMPONENTS: &[(Magic, u32, u32)] = &[
    (Magic::M2, 0x16, 0),
    (Magic::M2, 0x5b, 0),
    (Magic::M2, 0x0e, 0),
    (Magic::M3, 0x02, 0),
];

pub fn register(reg: &mut Registrar<'_>) -> Result<()> {
    for cls in [&OBJECT, &GROUP, &CUSTOM_NAME, &GOLDEN_SIMPLES, &MATERIAL] {
        reg.fragment(cls)?;
    }
    for &(magic, id, version) in UNKNOWN_COMPONENTS {
        reg.raw(magic, id, version)?;
    }
    Ok(())
}
