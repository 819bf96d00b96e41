//! Section framing
//!
//! Every `.bytes` file is a tree of sections. A section header is a 4-byte
//! magic followed (for everything except `M1`) by an 8-byte size slot and a
//! magic-specific set of fields:
//!
//! ```text
//! ┌────────┬──────────┬──────────────────────────────────────┬──────────┐
//! │ magic  │ size u64 │ fields (depend on magic)             │ body ... │
//! └────────┴──────────┴──────────────────────────────────────┴──────────┘
//!                     └──────────────── size bytes ───────────────────┘
//!
//! M2/M3  id u32, version u32, id_stamp u32              component
//! M5     id_stamp u32, count u32                        children list
//! M6     type str, id_stamp u32, count u32              object
//! M7     name str, id_stamp u32, count u32              layer
//! M8     -                                              legacy settings
//! M9     name str, id_stamp u32, version u32, count u32 level
//! M1     count u32 (no size slot)                       list marker
//! ```

use std::fmt;
use std::io::{Seek, SeekFrom, Write};

use distance_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::bytes::{DstBytes, DstWriter, SizeSlot};

/// Section framing kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Magic {
    M1,
    M2,
    M3,
    M5,
    M6,
    M7,
    M8,
    M9,
}

impl Magic {
    pub const ALL: [Magic; 8] = [
        Magic::M1,
        Magic::M2,
        Magic::M3,
        Magic::M5,
        Magic::M6,
        Magic::M7,
        Magic::M8,
        Magic::M9,
    ];

    /// On-disk value
    pub const fn value(self) -> u32 {
        match self {
            Magic::M1 => 11_111_111,
            Magic::M2 => 22_222_222,
            Magic::M3 => 33_333_333,
            Magic::M5 => 55_555_555,
            Magic::M6 => 66_666_666,
            Magic::M7 => 77_777_777,
            Magic::M8 => 88_888_888,
            Magic::M9 => 99_999_999,
        }
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.value() == value)
    }

    /// Whether headers of this kind carry a size slot
    pub const fn is_container(self) -> bool {
        !matches!(self, Magic::M1)
    }

    /// Component containers (fragments)
    pub const fn is_component(self) -> bool {
        matches!(self, Magic::M2 | Magic::M3)
    }
}

impl fmt::Display for Magic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The identifying payload of a header
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ident {
    None,
    /// Component id (M2/M3)
    Id(u32),
    /// Object type string (M6)
    Type(String),
    /// Layer or level name (M7/M9); not part of the identity key
    Name(String),
}

/// Identity used for probing and registration
///
/// A *versioned* key carries the component version; a *base* key does not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionKey {
    pub magic: Magic,
    pub ident: Ident,
    pub version: Option<u32>,
}

impl SectionKey {
    pub const fn new(magic: Magic, ident: Ident, version: Option<u32>) -> Self {
        Self { magic, ident, version }
    }

    /// Base key of a component
    pub const fn component(magic: Magic, id: u32) -> Self {
        Self::new(magic, Ident::Id(id), None)
    }

    /// Base key of an object type
    pub fn object(type_name: impl Into<String>) -> Self {
        Self::new(Magic::M6, Ident::Type(type_name.into()), None)
    }

    /// Key for a magic with no identifying payload
    pub const fn magic(magic: Magic) -> Self {
        Self::new(magic, Ident::None, None)
    }

    /// This key with `version` attached
    pub fn versioned(&self, version: u32) -> Self {
        Self {
            version: Some(version),
            ..self.clone()
        }
    }

    /// This key without a version
    pub fn base(&self) -> Self {
        Self {
            version: None,
            ..self.clone()
        }
    }

    pub fn is_base(&self) -> bool {
        self.version.is_none()
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.magic)?;
        match &self.ident {
            Ident::None => {}
            Ident::Id(id) => write!(f, " 0x{id:02x}")?,
            Ident::Type(t) | Ident::Name(t) => write!(f, " {t:?}")?,
        }
        if let Some(v) = self.version {
            write!(f, " v{v}")?;
        }
        Ok(())
    }
}

/// Where a section sits in its source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    /// Position of the magic
    pub start: u64,
    /// Position right after the header
    pub content_start: u64,
    /// Position right after the body
    pub end: u64,
}

/// A parsed or freshly built section header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub magic: Magic,
    pub ident: Ident,
    /// Component version (M2/M3) or level version (M9)
    pub version: Option<u32>,
    /// `None` on fresh sections; assigned by the writer
    pub id_stamp: Option<u32>,
    /// Component, child, object, layer or list count, as read
    pub count: u32,
    /// Only set for sections read from a source
    pub extent: Option<Extent>,
}

impl Section {
    fn fresh(magic: Magic, ident: Ident, version: Option<u32>) -> Self {
        Self {
            magic,
            ident,
            version,
            id_stamp: None,
            count: 0,
            extent: None,
        }
    }

    /// Fresh component header
    pub fn component(magic: Magic, id: u32, version: u32) -> Self {
        Self::fresh(magic, Ident::Id(id), Some(version))
    }

    /// Fresh object header
    pub fn object(type_name: impl Into<String>) -> Self {
        Self::fresh(Magic::M6, Ident::Type(type_name.into()), None)
    }

    /// Fresh layer header
    pub fn layer(name: impl Into<String>) -> Self {
        Self::fresh(Magic::M7, Ident::Name(name.into()), None)
    }

    /// Fresh level header
    pub fn level(name: impl Into<String>, version: u32) -> Self {
        Self::fresh(Magic::M9, Ident::Name(name.into()), Some(version))
    }

    /// Fresh children-list header
    pub fn children() -> Self {
        Self::fresh(Magic::M5, Ident::None, None)
    }

    /// List marker with a count
    pub fn list(count: u32) -> Self {
        Self {
            count,
            ..Self::fresh(Magic::M1, Ident::None, None)
        }
    }

    /// Fresh legacy settings header
    pub fn legacy_settings() -> Self {
        Self::fresh(Magic::M8, Ident::None, None)
    }

    /// Same header with a different count
    pub fn with_count(&self, count: u32) -> Self {
        Self {
            count,
            ..self.clone()
        }
    }

    /// Identity key; versioned for components
    pub fn key(&self) -> SectionKey {
        match (&self.ident, self.magic) {
            (Ident::Id(id), m) if m.is_component() => SectionKey::new(m, Ident::Id(*id), self.version),
            (Ident::Type(t), Magic::M6) => SectionKey::new(Magic::M6, Ident::Type(t.clone()), None),
            (_, m) => SectionKey::magic(m),
        }
    }

    /// Identity key without the version
    pub fn base_key(&self) -> SectionKey {
        self.key().base()
    }

    pub fn id(&self) -> Option<u32> {
        match self.ident {
            Ident::Id(id) => Some(id),
            _ => None,
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        match &self.ident {
            Ident::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match &self.ident {
            Ident::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn start(&self) -> Option<u64> {
        self.extent.map(|e| e.start)
    }

    pub fn content_start(&self) -> Option<u64> {
        self.extent.map(|e| e.content_start)
    }

    pub fn end_pos(&self) -> Option<u64> {
        self.extent.map(|e| e.end)
    }

    /// Body length, for sections read from a source
    pub fn content_size(&self) -> Option<u64> {
        self.extent.map(|e| e.end - e.content_start)
    }

    /// Parse a header; the cursor is left at the content start
    pub fn read(r: &mut DstBytes) -> Result<Section> {
        let start = r.tell();
        let raw = r.read_u32()?;
        let magic = Magic::from_u32(raw)
            .ok_or_else(|| Error::bad_framing(start, format!("unknown section magic {raw}")))?;

        if magic == Magic::M1 {
            let count = r.read_u32()?;
            let pos = r.tell();
            return Ok(Section {
                extent: Some(Extent {
                    start,
                    content_start: pos,
                    end: pos,
                }),
                ..Section::list(count)
            });
        }

        let size = r.read_u64()?;
        let body_start = r.tell();
        let end = body_start
            .checked_add(size)
            .ok_or_else(|| Error::bad_framing(start, format!("section size {size} overflows")))?;

        let mut section = Section::fresh(magic, Ident::None, None);
        match magic {
            Magic::M2 | Magic::M3 => {
                section.ident = Ident::Id(r.read_u32()?);
                section.version = Some(r.read_u32()?);
                section.id_stamp = Some(r.read_u32()?);
            }
            Magic::M5 => {
                section.id_stamp = Some(r.read_u32()?);
                section.count = r.read_u32()?;
            }
            Magic::M6 => {
                section.ident = Ident::Type(r.read_str()?);
                section.id_stamp = Some(r.read_u32()?);
                section.count = r.read_u32()?;
            }
            Magic::M7 => {
                section.ident = Ident::Name(r.read_str()?);
                section.id_stamp = Some(r.read_u32()?);
                section.count = r.read_u32()?;
            }
            Magic::M9 => {
                section.ident = Ident::Name(r.read_str()?);
                section.id_stamp = Some(r.read_u32()?);
                section.version = Some(r.read_u32()?);
                section.count = r.read_u32()?;
            }
            Magic::M8 | Magic::M1 => {}
        }

        let content_start = r.tell();
        if end < content_start {
            return Err(Error::bad_framing(
                start,
                format!("{magic} section ends at {end} before its content at {content_start}"),
            ));
        }
        section.extent = Some(Extent {
            start,
            content_start,
            end,
        });

        tracing::trace!(key = %section.key(), start, content_start, end, "section");
        Ok(section)
    }

    /// Parse a header and leave the cursor at its end, skipping the body
    pub fn read_skip(r: &mut DstBytes) -> Result<Section> {
        let section = Section::read(r)?;
        if let Some(end) = section.end_pos() {
            r.seek(SeekFrom::Start(end))?;
        }
        Ok(section)
    }

    /// Read the next header only if its magic is `expected`; otherwise leave the cursor
    pub fn read_if(r: &mut DstBytes, expected: Magic) -> Result<Option<Section>> {
        if r.remaining() < 4 || r.peek_u32()? != expected.value() {
            return Ok(None);
        }
        Section::read(r).map(Some)
    }

    /// Like [`read`](Self::read), but fail unless the magic is `expected`
    pub fn expect(r: &mut DstBytes, expected: Magic) -> Result<Section> {
        let start = r.tell();
        let section = Section::read(r)?;
        if section.magic != expected {
            return Err(Error::bad_framing(
                start,
                format!("expected {expected} section, found {}", section.magic),
            ));
        }
        Ok(section)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())?;
        if let Ident::Name(n) = &self.ident {
            write!(f, " {n:?}")?;
        }
        if let (Magic::M9, Some(v)) = (self.magic, self.version) {
            write!(f, " v{v}")?;
        }
        if let Some(e) = self.extent {
            write!(f, " @0x{:x}..0x{:x}", e.start, e.end)?;
        }
        Ok(())
    }
}

/// A header written but not yet closed
#[derive(Debug)]
#[must_use = "an open section must be closed with end_section"]
pub struct OpenSection {
    slot: Option<SizeSlot>,
    /// Stamp that was written (read or freshly assigned)
    pub id_stamp: Option<u32>,
}

impl<W: Write + Seek> DstWriter<W> {
    /// Write a header and open its size slot
    ///
    /// Counts are written from `section.count` as given; callers pass
    /// synthetic counts via [`Section::with_count`].
    pub fn begin_section(&mut self, section: &Section) -> Result<OpenSection> {
        self.write_u32(section.magic.value())?;
        if section.magic == Magic::M1 {
            self.write_u32(section.count)?;
            return Ok(OpenSection { slot: None, id_stamp: None });
        }

        let slot = self.begin_size()?;
        let id_stamp = match section.magic {
            Magic::M2 | Magic::M3 => {
                self.write_u32(section.id().unwrap_or_default())?;
                self.write_u32(section.version.unwrap_or_default())?;
                let stamp = section.id_stamp.unwrap_or_else(|| self.new_id());
                self.write_u32(stamp)?;
                Some(stamp)
            }
            Magic::M5 => {
                let stamp = section.id_stamp.unwrap_or_else(|| self.new_id());
                self.write_u32(stamp)?;
                self.write_u32(section.count)?;
                Some(stamp)
            }
            Magic::M6 | Magic::M7 => {
                let text = match &section.ident {
                    Ident::Type(s) | Ident::Name(s) => s.as_str(),
                    _ => "",
                };
                self.write_str(text)?;
                let stamp = section.id_stamp.unwrap_or_else(|| self.new_id());
                self.write_u32(stamp)?;
                self.write_u32(section.count)?;
                Some(stamp)
            }
            Magic::M9 => {
                self.write_str(section.name().unwrap_or_default())?;
                let stamp = section.id_stamp.unwrap_or_else(|| self.new_id());
                self.write_u32(stamp)?;
                self.write_u32(section.version.unwrap_or_default())?;
                self.write_u32(section.count)?;
                Some(stamp)
            }
            Magic::M8 | Magic::M1 => None,
        };

        Ok(OpenSection {
            slot: Some(slot),
            id_stamp,
        })
    }

    /// Close a section opened with [`begin_section`](Self::begin_section)
    pub fn end_section(&mut self, open: OpenSection) -> Result<u64> {
        match open.slot {
            Some(slot) => self.end_size(slot),
            None => self.tell(),
        }
    }

    /// Write a header, run `f` for the body, then patch the size
    pub fn write_section<T>(&mut self, section: &Section, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let open = self.begin_section(section)?;
        let out = f(self)?;
        self.end_section(open)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(section: &Section, body: &[u8]) -> (Vec<u8>, Section) {
        let mut w = DstWriter::memory();
        w.write_section(section, |w| w.write_bytes(body)).unwrap();
        let bytes = w.into_bytes();
        let mut r = DstBytes::new(bytes.clone());
        let read = Section::read(&mut r).unwrap();
        (bytes, read)
    }

    #[test]
    fn test_component_header() {
        let mut section = Section::component(Magic::M2, 0x1d, 2);
        section.id_stamp = Some(77);
        let (bytes, read) = roundtrip(&section, &[1, 2, 3]);

        assert_eq!(bytes.len(), 4 + 8 + 12 + 3);
        assert_eq!(read.key(), SectionKey::component(Magic::M2, 0x1d).versioned(2));
        assert_eq!(read.id_stamp, Some(77));
        assert_eq!(read.content_size(), Some(3));
        assert_eq!(read.end_pos(), Some(bytes.len() as u64));
    }

    #[test]
    fn test_object_header() {
        let section = Section::object("EmpireEndZone").with_count(3);
        let (_, read) = roundtrip(&section, &[]);

        assert_eq!(read.type_name(), Some("EmpireEndZone"));
        assert_eq!(read.count, 3);
        assert_eq!(read.id_stamp, Some(1));
        assert_eq!(read.base_key(), SectionKey::object("EmpireEndZone"));
    }

    #[test]
    fn test_level_header() {
        let section = Section::level("Test-straightroad", 3).with_count(1);
        let (_, read) = roundtrip(&section, &[]);

        assert_eq!(read.name(), Some("Test-straightroad"));
        assert_eq!(read.version, Some(3));
        assert_eq!(read.key(), SectionKey::magic(Magic::M9));
    }

    #[test]
    fn test_list_marker() {
        let (bytes, read) = roundtrip(&Section::list(5), &[]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(read.count, 5);
        assert_eq!(read.content_size(), Some(0));
    }

    #[test]
    fn test_read_skip() {
        let (bytes, _) = roundtrip(&Section::children(), &[0u8; 10]);
        let mut r = DstBytes::new(bytes.clone());
        let section = Section::read_skip(&mut r).unwrap();
        assert_eq!(r.tell(), bytes.len() as u64);
        assert_eq!(section.content_size(), Some(10));
    }

    #[test]
    fn test_unknown_magic() {
        let mut r = DstBytes::new(12345u32.to_le_bytes().to_vec());
        assert!(matches!(Section::read(&mut r), Err(Error::BadFraming { offset: 0, .. })));
    }

    #[test]
    fn test_impossible_size() {
        let mut data = Vec::new();
        data.extend_from_slice(&Magic::M2.value().to_le_bytes());
        data.extend_from_slice(&4u64.to_le_bytes());
        data.extend_from_slice(&[0u8; 12]);
        let mut r = DstBytes::new(data);
        assert!(matches!(Section::read(&mut r), Err(Error::BadFraming { .. })));
    }
}
