//! Named-property dictionaries
//!
//! Some fragments store a string-keyed dictionary of variable-length values:
//!
//! ```text
//! count u32
//! repeat count:
//!     key    dst-string
//!     end    u64          absolute file offset of the end of the value
//!     value  bytes        up to `end`
//! ```
//!
//! Very old maps omit `end` and always store 4 value bytes. That layout is
//! detected when the first purported `end` lies beyond the section, and is kept
//! on write (`old_format`). A value equal to SKIP means the key is present but
//! empty. Since `end` is absolute, these fragments are always re-serialized.

use std::io::{Seek, Write};

use distance_core::{Error, Result, SKIP};

use crate::bytes::{DstBytes, DstWriter};
use crate::schema::{self, Codec, Ctx, Field, Value};

/// How a named value is encoded
#[derive(Debug, Clone, Copy)]
pub enum PropKind {
    Codec(Codec),
    Struct(&'static Field),
}

/// Typed accessor for one dictionary entry
#[derive(Debug, Clone, Copy)]
pub struct NamedProp {
    /// Field name exposed on the fragment
    pub field: &'static str,
    /// Dictionary key on disk
    pub key: &'static str,
    pub kind: PropKind,
}

impl NamedProp {
    pub const fn new(field: &'static str, key: &'static str, kind: PropKind) -> Self {
        Self { field, key, kind }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let mut r = DstBytes::new(bytes.to_vec());
        match self.kind {
            PropKind::Codec(codec) => codec.read(&mut r),
            PropKind::Struct(field) => schema::parse(field, &mut r, &mut Ctx::new(0)),
        }
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let mut w = DstWriter::memory();
        match self.kind {
            PropKind::Codec(codec) => codec.write(&mut w, value)?,
            PropKind::Struct(field) => schema::emit(field, value, &mut w, &mut Ctx::new(0))?,
        }
        Ok(w.into_bytes())
    }
}

/// An ordered dictionary entry; `None` is the SKIP value
#[derive(Debug, Clone, PartialEq)]
pub struct NamedEntry {
    pub key: String,
    pub value: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedProperties {
    entries: Vec<NamedEntry>,
    /// Legacy layout without end offsets
    pub old_format: bool,
}

impl NamedProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[NamedEntry] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// Raw value of `key`: `None` if missing, `Some(None)` if present but empty
    pub fn get_raw(&self, key: &str) -> Option<Option<&[u8]>> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_deref())
    }

    /// Set a raw value, appending the key if it is new; returns whether anything changed
    pub fn set_raw(&mut self, key: &str, value: Option<Vec<u8>>) -> bool {
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) if entry.value == value => false,
            Some(entry) => {
                entry.value = value;
                true
            }
            None => {
                self.entries.push(NamedEntry {
                    key: key.to_owned(),
                    value,
                });
                true
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.key != key);
        self.entries.len() != before
    }

    /// Typed read through an accessor; missing and empty keys read as [`Value::None`]
    pub fn get(&self, prop: &NamedProp) -> Result<Value> {
        match self.get_raw(prop.key) {
            Some(Some(bytes)) => prop.decode(bytes).map_err(|e| e.with_context(format!("property {}", prop.key))),
            _ => Ok(Value::None),
        }
    }

    /// Typed write through an accessor; [`Value::None`] stores SKIP
    pub fn set(&mut self, prop: &NamedProp, value: &Value) -> Result<bool> {
        let encoded = match value {
            Value::None => None,
            v => Some(prop.encode(v)?),
        };
        Ok(self.set_raw(prop.key, encoded))
    }

    /// Parse a dictionary; the reader's limit must be the section end
    pub fn read(r: &mut DstBytes) -> Result<Self> {
        let section_end = r.end();
        let count = r.read_u32()?;
        let mut out = NamedProperties::new();

        for i in 0..count {
            let key = r.read_str()?;

            if i == 0 {
                let after_key = r.tell();
                let legacy = r.remaining() < 8 || r.read_u64()? > section_end;
                r.seek_to(after_key);
                out.old_format = legacy;
            }

            let value_start;
            let value = if out.old_format {
                value_start = r.tell();
                r.read_bytes(4)?
            } else {
                let end = r.read_u64()?;
                value_start = r.tell();
                if end < value_start || end > section_end {
                    return Err(Error::bad_framing(
                        value_start,
                        format!("property {key:?} ends at {end}, outside {value_start}..{section_end}"),
                    ));
                }
                r.read_bytes(end - value_start)?
            };
            tracing::trace!(key = %key, at = value_start, len = value.len(), "named property");

            let value = (value[..] != SKIP).then(|| value.to_vec());
            out.entries.push(NamedEntry { key, value });
        }

        Ok(out)
    }

    /// Emit the dictionary; end offsets are absolute positions in the sink
    pub fn write<W: Write + Seek>(&self, w: &mut DstWriter<W>) -> Result<()> {
        w.write_u32(self.entries.len() as u32)?;
        for entry in &self.entries {
            w.write_str(&entry.key)?;
            let value = entry.value.as_deref().unwrap_or(&SKIP);
            if self.old_format {
                if value.len() != 4 {
                    return Err(Error::ValueOutOfRange {
                        codec: "legacy property",
                        value: format!("{} bytes for {:?}", value.len(), entry.key),
                    });
                }
            } else {
                let end = w.tell()? + 8 + value.len() as u64;
                w.write_u64(end)?;
            }
            w.write_bytes(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: NamedProp = NamedProp::new("text", "Text", PropKind::Codec(Codec::Str));
    const DELAY: NamedProp = NamedProp::new("delay", "Delay", PropKind::Codec(Codec::F32));

    fn read_at(data: Vec<u8>) -> NamedProperties {
        let mut r = DstBytes::new(data);
        let end = r.len();
        r.with_limit(end, NamedProperties::read).unwrap()
    }

    #[test]
    fn test_new_format_roundtrip() {
        let mut props = NamedProperties::new();
        props.set(&TEXT, &Value::Str("Hello".into())).unwrap();
        props.set(&DELAY, &Value::None).unwrap();

        let mut w = DstWriter::memory();
        props.write(&mut w).unwrap();
        let bytes = w.into_bytes();

        let read = read_at(bytes.clone());
        assert!(!read.old_format);
        assert_eq!(read.get(&TEXT).unwrap(), Value::Str("Hello".into()));
        assert_eq!(read.get_raw("Delay"), Some(None));
        assert_eq!(read.get(&DELAY).unwrap(), Value::None);

        let mut w = DstWriter::memory();
        read.write(&mut w).unwrap();
        assert_eq!(w.into_bytes(), bytes);
    }

    #[test]
    fn test_legacy_detection() {
        let mut w = DstWriter::memory();
        w.write_u32(2).unwrap();
        w.write_str("Delay").unwrap();
        w.write_f32(2.5).unwrap();
        w.write_str("Flag").unwrap();
        w.write_bytes(&SKIP).unwrap();
        let bytes = w.into_bytes();

        let read = read_at(bytes.clone());
        assert!(read.old_format);
        assert_eq!(read.get(&DELAY).unwrap(), Value::F32(2.5));
        assert_eq!(read.get_raw("Flag"), Some(None));

        let mut w = DstWriter::memory();
        read.write(&mut w).unwrap();
        assert_eq!(w.into_bytes(), bytes);
    }

    #[test]
    fn test_set_same_value() {
        let mut props = NamedProperties::new();
        assert!(props.set(&DELAY, &Value::F32(1.0)).unwrap());
        assert!(!props.set(&DELAY, &Value::F32(1.0)).unwrap());
        assert_eq!(props.keys().collect::<Vec<_>>(), vec!["Delay"]);
    }

    #[test]
    fn test_bad_offset() {
        let mut w = DstWriter::memory();
        w.write_u32(1).unwrap();
        w.write_str("A").unwrap();
        w.write_u64(2).unwrap();
        let mut bytes = w.into_bytes();
        bytes.extend_from_slice(&[0; 8]);
        let mut r = DstBytes::new(bytes);
        let end = r.len();
        let err = r.with_limit(end, NamedProperties::read).unwrap_err();
        assert!(matches!(err, Error::BadFraming { .. }));
    }
}
