//! Standalone objects (`.bytes` files under `CustomObjects/`)

use std::io::{Seek, Write};

use distance_core::{Error, Result};

use crate::bytes::{DstBytes, DstWriter};
use crate::object::DstObject;
use crate::registry::Class;
use crate::section::Section;
use crate::traits::{DstFormat, HumanReadable, ReadContext};

/// A level object saved on its own, with its subtree
#[derive(Debug)]
pub struct CustomObject {
    object: DstObject,
}

impl CustomObject {
    pub fn from_object(object: DstObject) -> Self {
        Self { object }
    }

    pub fn object(&self) -> &DstObject {
        &self.object
    }

    pub fn object_mut(&mut self) -> &mut DstObject {
        &mut self.object
    }

    pub fn into_object(self) -> DstObject {
        self.object
    }
}

impl DstFormat for CustomObject {
    const NAME: &'static str = "CustomObject";

    fn read_with(r: &mut DstBytes, ctx: &ReadContext) -> Result<Self> {
        let section = Section::read(&mut r.clone())?;
        match ctx.registry.probe("customobjects", &section)? {
            Class::Object(_) => Ok(Self::from_object(DstObject::read(r, ctx, "customobjects"))),
            other => Err(Error::Probe {
                key: format!("{} resolves to {other}, not an object", section.key()),
            }),
        }
    }

    fn write_to<W: Write + Seek>(&self, w: &mut DstWriter<W>) -> Result<()> {
        self.object.write(w)
    }

    fn materialize_all(&self) {
        self.object.materialize_all();
    }

    fn check_exceptions(&self) -> Result<()> {
        self.object.check_exceptions()
    }
}

impl HumanReadable for CustomObject {
    fn to_readable_string(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![(0usize, &self.object)];
        while let Some((depth, obj)) = stack.pop() {
            out.push_str(&format!("{:indent$}{obj}\n", "", indent = depth * 2));
            let children: Vec<&DstObject> = obj.children().iter().collect();
            stack.extend(children.into_iter().rev().map(|c| (depth + 1, c)));
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "format": Self::NAME,
            "type": self.object.type_name(),
            "fragments": self.object.fragment_sections().map(|s| s.key().to_string()).collect::<Vec<_>>(),
            "children": self.object.children().len(),
        })
    }
}
