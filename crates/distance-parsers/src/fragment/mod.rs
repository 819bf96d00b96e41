//! Fragment model
//!
//! A fragment is the typed view of one component section (`M2`/`M3`) of an
//! object. Every fragment keeps the body bytes it was read from; as long as
//! it is not modified, writing it emits those bytes unchanged. Components
//! whose version is unknown become raw fragments that only know their section
//! and body.
//!
//! The payload representation is chosen by the fragment's
//! [`FragmentClass`]:
//!
//! | [`Repr`] | Payload |
//! |----------|---------|
//! | `Raw` | body bytes only |
//! | `Schema` | a [`Record`] driven by a static [`Field`] tree |
//! | `Transform` | the object transform block |
//! | `NamedProperties` | a string-keyed dictionary with typed accessors |
//! | `ProfileProgress` | hand-written profile progress codec |

mod named;
mod transform;

pub use named::{NamedEntry, NamedProp, NamedProperties, PropKind};
pub use transform::{read_transform, write_transform};

use std::fmt;
use std::io::{Seek, Write};

use bytes::Bytes;
use distance_core::{Error, Result, Transform};
use smallvec::SmallVec;

use crate::bytes::{DstBytes, DstWriter};
use crate::fragments::profile::ProfileProgressData;
use crate::schema::{self, Field, FromValue, IntoValue, Record, Value};
use crate::section::{Magic, Section, SectionKey};

/// Versions a fragment class implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Versions {
    /// Registered on the base key; any version parses, fresh instances use the given one
    Any(u32),
    /// Inclusive range
    Range(u32, u32),
}

impl Versions {
    pub fn contains(&self, version: u32) -> bool {
        match *self {
            Versions::Any(_) => true,
            Versions::Range(lo, hi) => (lo..=hi).contains(&version),
        }
    }

    /// Explicit version list; empty for `Any`
    pub fn list(&self) -> SmallVec<[u32; 8]> {
        match *self {
            Versions::Any(_) => SmallVec::new(),
            Versions::Range(lo, hi) => (lo..=hi).collect(),
        }
    }

    pub fn highest(&self) -> Option<u32> {
        match *self {
            Versions::Any(_) => None,
            Versions::Range(_, hi) => Some(hi),
        }
    }

    /// Version fresh instances are created with
    pub fn create_version(&self) -> u32 {
        match *self {
            Versions::Any(v) => v,
            Versions::Range(_, hi) => hi,
        }
    }
}

/// Payload representation of a fragment class
#[derive(Debug, Clone, Copy)]
pub enum Repr {
    Raw,
    Schema(&'static Field),
    Transform,
    NamedProperties(&'static [NamedProp]),
    ProfileProgress,
}

/// Static description of a fragment implementation
#[derive(Debug)]
pub struct FragmentClass {
    pub name: &'static str,
    /// Human-readable tag for object subscript lookup
    pub tag: Option<&'static str>,
    pub magic: Magic,
    pub id: u32,
    pub versions: Versions,
    pub repr: Repr,
    /// Hint for pretty-printers
    pub interesting: bool,
    /// Module that registers this class (for the autoload manifest)
    pub module: &'static str,
}

impl FragmentClass {
    /// Class named after its tag
    pub const fn new(tag: &'static str, magic: Magic, id: u32, versions: Versions, repr: Repr, module: &'static str) -> Self {
        Self {
            name: tag,
            tag: Some(tag),
            magic,
            id,
            versions,
            repr,
            interesting: false,
            module,
        }
    }

    /// Same class, flagged for pretty-printers
    pub const fn interesting(self) -> Self {
        Self {
            interesting: true,
            ..self
        }
    }

    /// Whether unmodified fragments may be written from their original bytes
    pub fn reuse_raw(&self) -> bool {
        !matches!(self.repr, Repr::NamedProperties(_))
    }

    pub fn base_key(&self) -> SectionKey {
        SectionKey::component(self.magic, self.id)
    }

    /// Base identity of the sections this class reads
    pub fn base_container(&self) -> SectionKey {
        self.base_key()
    }

    /// Section a fresh instance is created with
    pub fn default_container(&self) -> Section {
        Section::component(self.magic, self.id, self.versions.create_version())
    }

    pub fn is_raw(&self) -> bool {
        matches!(self.repr, Repr::Raw)
    }
}

impl PartialEq for FragmentClass {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for FragmentClass {}

/// The generic raw fragment class
pub static RAW: FragmentClass = FragmentClass {
    name: "Fragment",
    tag: None,
    magic: Magic::M2,
    id: 0,
    versions: Versions::Any(0),
    repr: Repr::Raw,
    interesting: false,
    module: "core",
};

/// Parsed payload
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentData {
    Raw,
    Record(Record),
    Transform(Option<Transform>),
    NamedProperties(NamedProperties),
    ProfileProgress(ProfileProgressData),
}

impl Repr {
    fn parse(&self, r: &mut DstBytes, section: &Section) -> Result<FragmentData> {
        let version = section.version.unwrap_or(0);
        Ok(match *self {
            Repr::Raw => FragmentData::Raw,
            Repr::Schema(field) => FragmentData::Record(schema::parse_record(field, r, version)?),
            Repr::Transform => FragmentData::Transform(read_transform(r)?),
            Repr::NamedProperties(_) => FragmentData::NamedProperties(NamedProperties::read(r)?),
            Repr::ProfileProgress => FragmentData::ProfileProgress(ProfileProgressData::read(r, version)?),
        })
    }

    fn emit<W: Write + Seek>(&self, data: &FragmentData, w: &mut DstWriter<W>, section: &Section) -> Result<()> {
        let version = section.version.unwrap_or(0);
        match (self, data) {
            (Repr::Schema(field), FragmentData::Record(record)) => schema::emit_record(field, record, w, version),
            (Repr::Transform, FragmentData::Transform(t)) => write_transform(w, t.as_ref()),
            (Repr::NamedProperties(_), FragmentData::NamedProperties(props)) => props.write(w),
            (Repr::ProfileProgress, FragmentData::ProfileProgress(p)) => p.write(w, version),
            (_, FragmentData::Raw) => Ok(()),
            (repr, data) => Err(Error::schema(
                "",
                format!("payload {:?} does not match representation {:?}", data.kind(), repr),
            )),
        }
    }

    fn defaults(&self, version: u32) -> FragmentData {
        match *self {
            Repr::Raw => FragmentData::Raw,
            Repr::Schema(field) => FragmentData::Record(schema::default_record(field, version)),
            Repr::Transform => FragmentData::Transform(Some(Transform::EMPTY)),
            Repr::NamedProperties(_) => FragmentData::NamedProperties(NamedProperties::new()),
            Repr::ProfileProgress => FragmentData::ProfileProgress(ProfileProgressData::default()),
        }
    }
}

impl FragmentData {
    fn kind(&self) -> &'static str {
        match self {
            FragmentData::Raw => "raw",
            FragmentData::Record(_) => "record",
            FragmentData::Transform(_) => "transform",
            FragmentData::NamedProperties(_) => "named-properties",
            FragmentData::ProfileProgress(_) => "profile-progress",
        }
    }
}

/// A typed view over one component section
#[derive(Debug, Clone)]
pub struct Fragment {
    class: &'static FragmentClass,
    section: Section,
    /// Body as read; `None` for fresh fragments
    raw: Option<Bytes>,
    /// Body bytes the typed parse did not consume
    tail: Bytes,
    data: FragmentData,
    dirty: bool,
    exception: Option<Error>,
    sane_end_pos: bool,
}

impl Fragment {
    /// Read the body of `section` from `source` with `class`
    ///
    /// Never fails: a body that cannot be sliced or parsed yields a raw
    /// fragment with the error captured in [`exception`](Self::exception).
    pub fn read(class: &'static FragmentClass, section: Section, source: &DstBytes) -> Fragment {
        let Some(extent) = section.extent else {
            return Fragment::new_with_section(class, section);
        };

        let raw = match source.slice(extent.content_start, extent.end) {
            Ok(raw) => raw,
            Err(err) => return Fragment::failed(class, section, None, err),
        };

        if class.is_raw() {
            return Fragment::raw(class, section, raw);
        }

        let mut body = source.at(extent.content_start);
        let parsed = body.with_limit(extent.end, |r| {
            let data = class.repr.parse(r, &section)?;
            let tail = r.read_bytes(r.remaining())?;
            Ok((data, tail))
        });

        match parsed {
            Ok((data, tail)) => Fragment {
                class,
                section,
                raw: Some(raw),
                tail,
                data,
                dirty: false,
                exception: None,
                sane_end_pos: true,
            },
            Err(err) => Fragment::failed(class, section, Some(raw), err),
        }
    }

    /// Raw fragment over known body bytes
    pub fn raw(class: &'static FragmentClass, section: Section, raw: Bytes) -> Fragment {
        Fragment {
            class,
            section,
            raw: Some(raw),
            tail: Bytes::new(),
            data: FragmentData::Raw,
            dirty: false,
            exception: None,
            sane_end_pos: true,
        }
    }

    /// Raw fragment carrying an error
    pub fn failed(class: &'static FragmentClass, section: Section, raw: Option<Bytes>, err: Error) -> Fragment {
        tracing::warn!(class = class.name, section = %section, error = %err, "fragment captured error");
        Fragment {
            class,
            sane_end_pos: !err.is_framing_error(),
            exception: Some(err),
            ..Fragment::raw(class, section, raw.unwrap_or_default())
        }
    }

    /// Fresh fragment with class defaults, at the class's highest version
    pub fn new(class: &'static FragmentClass) -> Fragment {
        Fragment::new_with_section(class, class.default_container())
    }

    /// Fresh fragment with defaults for the version of `section`
    pub fn new_with_section(class: &'static FragmentClass, section: Section) -> Fragment {
        let data = class.repr.defaults(section.version.unwrap_or(0));
        Fragment {
            class,
            section,
            raw: None,
            tail: Bytes::new(),
            data,
            dirty: true,
            exception: None,
            sane_end_pos: true,
        }
    }

    pub fn class(&self) -> &'static FragmentClass {
        self.class
    }

    pub fn section(&self) -> &Section {
        &self.section
    }

    pub fn tag(&self) -> Option<&'static str> {
        self.class.tag
    }

    pub fn version(&self) -> Option<u32> {
        self.section.version
    }

    pub fn is_interesting(&self) -> bool {
        self.class.interesting
    }

    pub fn is_raw(&self) -> bool {
        matches!(self.data, FragmentData::Raw)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn exception(&self) -> Option<&Error> {
        self.exception.as_ref()
    }

    pub fn sane_end_pos(&self) -> bool {
        self.sane_end_pos
    }

    pub fn default_container(&self) -> Section {
        self.class.default_container()
    }

    pub fn base_container(&self) -> SectionKey {
        self.section.base_key()
    }

    pub fn data(&self) -> &FragmentData {
        &self.data
    }

    /// Mutable payload; the fragment is re-serialized on write afterwards
    pub fn data_mut(&mut self) -> &mut FragmentData {
        self.dirty = true;
        &mut self.data
    }

    pub fn record(&self) -> Option<&Record> {
        match &self.data {
            FragmentData::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Body bytes: the original ones if unmodified, else a fresh serialization
    pub fn raw_data(&self) -> Result<Bytes> {
        if let (false, Some(raw)) = (self.dirty, &self.raw) {
            return Ok(raw.clone());
        }
        let mut w = DstWriter::memory();
        self.write_body(&mut w)?;
        Ok(Bytes::from(w.into_bytes()))
    }

    fn typed_error(&self, name: &str) -> Error {
        match &self.exception {
            Some(err) => err.clone(),
            None => Error::schema(name, format!("{} fragment has no typed fields", self.class.name)),
        }
    }

    /// Read a typed field
    pub fn field(&self, name: &str) -> Result<Value> {
        match (&self.data, self.class.repr) {
            (FragmentData::Record(record), _) => record
                .get(name)
                .cloned()
                .ok_or_else(|| Error::schema(name, format!("no such field on {}", self.class.name))),
            (FragmentData::NamedProperties(props), Repr::NamedProperties(accessors)) => {
                let prop = find_prop(accessors, name, self.class)?;
                props.get(prop)
            }
            (FragmentData::ProfileProgress(p), _) => p.field(name),
            (FragmentData::Transform(t), _) if name == "transform" => Ok(t.map_or(Value::None, |t| {
                Value::List(vec![t.pos.into_value(), t.rot.into_value(), t.scale.into_value()])
            })),
            _ => Err(self.typed_error(name)),
        }
    }

    /// Typed read with conversion
    pub fn get<T: FromValue>(&self, name: &str) -> Result<T> {
        T::from_value(&self.field(name)?).map_err(|e| match e {
            Error::Schema { message, .. } => Error::schema(name, message),
            other => other,
        })
    }

    /// Write a typed field; setting a field to its current value changes nothing
    pub fn set_field(&mut self, name: &str, value: Value) -> Result<()> {
        let changed = match (&mut self.data, self.class.repr) {
            (FragmentData::Record(record), _) => record.set(name, value)?,
            (FragmentData::NamedProperties(props), Repr::NamedProperties(accessors)) => {
                let prop = find_prop(accessors, name, self.class)?;
                props.set(prop, &value)?
            }
            (FragmentData::ProfileProgress(p), _) => p.set_field(name, value)?,
            _ => return Err(self.typed_error(name)),
        };
        self.dirty |= changed;
        Ok(())
    }

    /// Typed write with conversion
    pub fn set<T: IntoValue>(&mut self, name: &str, value: T) -> Result<()> {
        self.set_field(name, value.into_value())
    }

    /// Transform of an object fragment
    pub fn transform(&self) -> Option<Transform> {
        match &self.data {
            FragmentData::Transform(t) => *t,
            _ => None,
        }
    }

    /// Replace the transform of an object fragment
    pub fn set_transform(&mut self, transform: Option<Transform>) -> Result<()> {
        match &mut self.data {
            FragmentData::Transform(t) => {
                if *t != transform {
                    *t = transform;
                    self.dirty = true;
                }
                Ok(())
            }
            _ => Err(self.typed_error("transform")),
        }
    }

    fn write_body<W: Write + Seek>(&self, w: &mut DstWriter<W>) -> Result<()> {
        let reuse = self.is_raw() || (!self.dirty && self.class.reuse_raw());
        match (&self.raw, reuse) {
            (Some(raw), true) => w.write_bytes(raw),
            _ => {
                self.class.repr.emit(&self.data, w, &self.section)?;
                w.write_bytes(&self.tail)
            }
        }
    }

    /// Write the section header and body
    pub fn write<W: Write + Seek>(&self, w: &mut DstWriter<W>) -> Result<()> {
        w.write_section(&self.section, |w| self.write_body(w))
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tag().unwrap_or(self.class.name), self.section)?;
        if self.exception.is_some() {
            write!(f, " (error)")?;
        }
        Ok(())
    }
}

fn find_prop<'a>(accessors: &'a [NamedProp], name: &str, class: &FragmentClass) -> Result<&'a NamedProp> {
    accessors
        .iter()
        .find(|p| p.field == name)
        .ok_or_else(|| Error::schema(name, format!("no such property on {}", class.name)))
}
