//! Level settings fragment
//!
//! Only the level name is typed. Everything after it changes layout between
//! versions and is kept as an opaque remainder that is written back verbatim.

use distance_core::Result;

use super::string;
use crate::fragment::{FragmentClass, Repr, Versions};
use crate::registry::Registrar;
use crate::schema::Field;
use crate::section::Magic;

static LEVEL_SETTINGS_SCHEMA: Field = Field::Struct(&[
    ("name", string("Unnamed Level")),
    ("rest", Field::Remainder),
]);

pub static LEVEL_SETTINGS: FragmentClass = FragmentClass::new(
    "LevelSettings",
    Magic::M2,
    0x52,
    Versions::Range(0, 26),
    Repr::Schema(&LEVEL_SETTINGS_SCHEMA),
    "fragments::levelsettings",
)
.interesting();

pub fn register(reg: &mut Registrar<'_>) -> Result<()> {
    reg.fragment(&LEVEL_SETTINGS)
}
