//! Levels (`M9`)
//!
//! ```text
//! M9 "name" v3, layer_count
//! ├── M6 "LevelSettings"      (M8 in very old maps)
//! ├── M7 "Layer 0"
//! │   ├── flags
//! │   └── M6 objects ...
//! └── M7 ...
//! ```

use std::io::{Seek, Write};
use std::sync::Arc;

use bytes::Bytes;
use distance_core::{Error, Result};
use once_cell::sync::OnceCell;

use super::layer::{Layer, Trailing};
use crate::bytes::{DstBytes, DstWriter};
use crate::lazy::LazySeq;
use crate::object::DstObject;
use crate::registry::{Class, ContainerKind, Registry};
use crate::section::{Ident, Magic, Section};
use crate::traits::{DstFormat, HumanReadable, ReadContext};

/// Level version written for fresh levels
pub const LEVEL_VERSION: u32 = 3;

/// Opaque settings block of very old maps (`M8`)
#[derive(Debug, Clone)]
pub struct LegacySettings {
    pub section: Section,
    pub data: Bytes,
    exception: Option<Error>,
}

impl LegacySettings {
    pub fn exception(&self) -> Option<&Error> {
        self.exception.as_ref()
    }
}

/// One element of a level body
#[derive(Debug)]
pub enum LevelContent {
    /// The settings object, or any other object stored at level scope
    Object(DstObject),
    LegacySettings(LegacySettings),
    Layer(Layer),
}

impl LevelContent {
    fn is_sane(&self) -> bool {
        match self {
            LevelContent::Object(obj) => obj.sane_end_pos(),
            LevelContent::LegacySettings(s) => s.exception.is_none(),
            LevelContent::Layer(layer) => layer.sane_end_pos(),
        }
    }

    fn end_pos(&self) -> Option<u64> {
        match self {
            LevelContent::Object(obj) => obj.section().end_pos(),
            LevelContent::LegacySettings(s) => s.section.end_pos(),
            LevelContent::Layer(layer) => layer.section().end_pos(),
        }
    }

    pub fn materialize_all(&self) {
        match self {
            LevelContent::Object(obj) => obj.materialize_all(),
            LevelContent::LegacySettings(_) => {}
            LevelContent::Layer(layer) => layer.materialize_all(),
        }
    }

    pub fn check_exceptions(&self) -> Result<()> {
        match self {
            LevelContent::Object(obj) => obj.check_exceptions(),
            LevelContent::LegacySettings(s) => match &s.exception {
                Some(err) => Err(err.clone().with_context(format!("in {}", s.section))),
                None => Ok(()),
            },
            LevelContent::Layer(layer) => layer.check_exceptions(),
        }
    }

    fn write<W: Write + Seek>(&self, w: &mut DstWriter<W>) -> Result<()> {
        match self {
            LevelContent::Object(obj) => obj.write(w),
            LevelContent::LegacySettings(s) => w.write_section(&s.section, |w| w.write_bytes(&s.data)),
            LevelContent::Layer(layer) => layer.write(w),
        }
    }
}

/// Reads level content one section at a time
struct ContentIter {
    reader: DstBytes,
    end: u64,
    remaining: usize,
    ctx: ReadContext,
    done: bool,
    finished_at: Arc<OnceCell<u64>>,
}

impl ContentIter {
    fn read_one(&mut self) -> LevelContent {
        let start = self.reader.tell();
        let ctx = &self.ctx;
        let read = self.reader.with_limit(self.end, |r| {
            let section = Section::read(r)?;
            let class = ctx.registry.probe("level_like", &section);
            Ok((section, class))
        });
        let (section, class) = match read {
            Ok(found) => found,
            Err(err) => return LevelContent::Object(DstObject::broken(ctx.registry.clone(), err)),
        };

        match (section.magic, class) {
            (Magic::M7, Ok(Class::Container(ContainerKind::Layer))) => {
                LevelContent::Layer(Layer::read_body(&mut self.reader, section, ctx))
            }
            (Magic::M8, Ok(Class::Container(ContainerKind::LegacySettings))) => {
                LevelContent::LegacySettings(read_legacy_settings(&self.reader, section))
            }
            (Magic::M6, _) => {
                self.reader.seek_to(start);
                let end = self.end;
                let obj = self
                    .reader
                    .with_limit(end, |r| Ok(DstObject::read(r, ctx, "level_content")))
                    .unwrap_or_else(|err| DstObject::broken(ctx.registry.clone(), err));
                LevelContent::Object(obj)
            }
            (Magic::M7 | Magic::M8, Err(err)) => LevelContent::Object(DstObject::broken(ctx.registry.clone(), err)),
            (magic, _) => LevelContent::Object(DstObject::broken(
                ctx.registry.clone(),
                Error::bad_framing(start, format!("unexpected {magic} section inside a level")),
            )),
        }
    }
}

fn read_legacy_settings(r: &DstBytes, section: Section) -> LegacySettings {
    let (start, end) = match section.extent {
        Some(e) => (e.content_start, e.end),
        None => (0, 0),
    };
    let limit = r.end();
    let (data, exception) = if end > limit {
        let data = r.slice(start.min(limit), limit).unwrap_or_default();
        (data, Some(Error::short_read(start, end - start, limit.saturating_sub(start))))
    } else {
        (r.slice(start, end).unwrap_or_default(), None)
    };
    if let Some(err) = &exception {
        tracing::warn!(section = %section, error = %err, "legacy settings cut short");
    }
    LegacySettings {
        section,
        data,
        exception,
    }
}

impl Iterator for ContentIter {
    type Item = LevelContent;

    fn next(&mut self) -> Option<LevelContent> {
        if self.done || self.remaining == 0 || self.reader.tell() >= self.end.min(self.reader.len()) {
            self.done = true;
            return None;
        }
        self.remaining -= 1;

        let item = self.read_one();
        match (item.is_sane(), item.end_pos()) {
            (true, Some(end)) => {
                self.reader.seek_to(end);
                if self.remaining == 0 {
                    let _ = self.finished_at.set(end);
                }
            }
            _ => self.done = true,
        }
        Some(item)
    }
}

/// A level file
pub struct Level {
    section: Section,
    content: LazySeq<LevelContent>,
    exception: Option<Error>,
    trailing: Option<Trailing>,
    registry: Arc<Registry>,
}

impl Level {
    /// Fresh level with default settings and no layers
    pub fn new(registry: Arc<Registry>, name: impl Into<String>) -> Result<Self> {
        let settings = registry.create_object("LevelSettings")?;
        Ok(Self {
            section: Section::level(name, LEVEL_VERSION),
            content: LazySeq::from_vec(vec![LevelContent::Object(settings)]),
            exception: None,
            trailing: None,
            registry,
        })
    }

    pub fn section(&self) -> &Section {
        &self.section
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn name(&self) -> &str {
        self.section.name().unwrap_or_default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.section.ident = Ident::Name(name.into());
    }

    pub fn version(&self) -> u32 {
        self.section.version.unwrap_or_default()
    }

    /// Settings, legacy settings and layers in file order
    pub fn content(&self) -> &LazySeq<LevelContent> {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut LazySeq<LevelContent> {
        &mut self.content
    }

    /// The first object of the level body
    pub fn settings(&self) -> Option<&DstObject> {
        self.content.iter().find_map(|c| match c {
            LevelContent::Object(obj) => Some(obj),
            _ => None,
        })
    }

    pub fn settings_mut(&mut self) -> Option<&mut DstObject> {
        self.content.iter_mut().find_map(|c| match c {
            LevelContent::Object(obj) => Some(obj),
            _ => None,
        })
    }

    pub fn legacy_settings(&self) -> Option<&LegacySettings> {
        self.content.iter().find_map(|c| match c {
            LevelContent::LegacySettings(s) => Some(s),
            _ => None,
        })
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> + '_ {
        self.content.iter().filter_map(|c| match c {
            LevelContent::Layer(layer) => Some(layer),
            _ => None,
        })
    }

    pub fn layers_mut(&mut self) -> impl Iterator<Item = &mut Layer> + '_ {
        self.content.iter_mut().filter_map(|c| match c {
            LevelContent::Layer(layer) => Some(layer),
            _ => None,
        })
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers().nth(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers_mut().nth(index)
    }

    /// Layer with the given name
    pub fn layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers().find(|layer| layer.name() == name)
    }

    pub fn layer_count(&self) -> usize {
        self.layers().count()
    }

    pub fn add_layer(&mut self, layer: Layer) -> &mut Layer {
        self.content.push(LevelContent::Layer(layer));
        let last = self.content.len() - 1;
        match self.content.get_mut(last) {
            Some(LevelContent::Layer(layer)) => layer,
            _ => unreachable!("layer was just pushed"),
        }
    }

    /// Every object in every layer, without subobjects
    pub fn objects(&self) -> impl Iterator<Item = &DstObject> + '_ {
        self.layers().flat_map(|layer| layer.objects().iter())
    }
}

impl DstFormat for Level {
    const NAME: &'static str = "Level";

    fn read_with(r: &mut DstBytes, ctx: &ReadContext) -> Result<Self> {
        let section = Section::expect(r, Magic::M9)?;
        let Some(extent) = section.extent else {
            return Err(Error::bad_framing(r.tell(), "level header without extent"));
        };
        tracing::debug!(level = %section, layers = section.count, "reading level");

        let limit = r.end();
        let exception = (extent.end > limit).then(|| {
            Error::short_read(extent.start, extent.end - extent.start, limit.saturating_sub(extent.start))
        });

        let count = section.count as usize + 1;
        let children_end = Arc::new(OnceCell::new());
        let trailing = exception.is_none().then(|| Trailing {
            source: r.at(0),
            end: extent.end,
            children_end: children_end.clone(),
        });
        let iter = ContentIter {
            reader: r.at(extent.content_start),
            end: extent.end,
            remaining: count,
            ctx: ctx.clone(),
            done: false,
            finished_at: children_end,
        };
        r.seek_to(extent.end);
        Ok(Level {
            section,
            content: LazySeq::new(count, iter),
            exception,
            trailing,
            registry: ctx.registry.clone(),
        })
    }

    fn write_to<W: Write + Seek>(&self, w: &mut DstWriter<W>) -> Result<()> {
        self.content.materialize_all();
        let header = self.section.with_count(self.layer_count() as u32);
        w.write_section(&header, |w| {
            for item in self.content.iter() {
                item.write(w)?;
            }
            if let Some(tail) = self.trailing.as_ref().and_then(Trailing::bytes) {
                w.write_bytes(&tail)?;
            }
            Ok(())
        })
    }

    fn materialize_all(&self) {
        self.content.materialize_all();
        for item in self.content.iter() {
            item.materialize_all();
        }
    }

    fn check_exceptions(&self) -> Result<()> {
        for item in self.content.iter() {
            item.check_exceptions()
                .map_err(|e| e.with_context(format!("in {}", self.section)))?;
        }
        match &self.exception {
            Some(err) => Err(err.clone().with_context(format!("in {}", self.section))),
            None => Ok(()),
        }
    }
}

impl HumanReadable for Level {
    fn to_readable_string(&self) -> String {
        let mut out = format!("Level {:?} v{}\n", self.name(), self.version());
        for item in self.content.iter() {
            match item {
                LevelContent::Object(obj) => out.push_str(&format!("  {obj}\n")),
                LevelContent::LegacySettings(s) => {
                    out.push_str(&format!("  legacy settings ({} bytes)\n", s.data.len()))
                }
                LevelContent::Layer(layer) => {
                    out.push_str(&format!("  Layer {:?}: {} objects\n", layer.name(), layer.objects().len()));
                    for obj in layer.objects().iter() {
                        out.push_str(&format!("    {obj}\n"));
                    }
                }
            }
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        let layers: Vec<serde_json::Value> = self
            .layers()
            .map(|layer| {
                serde_json::json!({
                    "name": layer.name(),
                    "flags": layer.flags().map(|f| serde_json::json!({
                        "version": f.version,
                        "active": f.is_active(),
                        "frozen": f.is_frozen(),
                        "visible": f.is_visible(),
                    })),
                    "objects": layer.objects().iter().map(|o| o.type_name().to_owned()).collect::<Vec<_>>(),
                })
            })
            .collect();
        serde_json::json!({
            "format": Self::NAME,
            "name": self.name(),
            "version": self.version(),
            "settings": self.settings().map(|s| s.type_name().to_owned()),
            "layers": layers,
        })
    }
}

impl std::fmt::Debug for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Level")
            .field("name", &self.name())
            .field("version", &self.version())
            .field("content", &self.content.len())
            .field("exception", &self.exception)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::LevelSettingsAttrs;
    use crate::traits::ReadOptions;

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::eager().unwrap())
    }

    fn sample(registry: &Arc<Registry>) -> Level {
        let mut level = Level::new(registry.clone(), "Sample").unwrap();
        let layer = level.add_layer(Layer::new("Main"));
        for _ in 0..3 {
            layer.objects_mut().push(registry.create_object("CubeGS").unwrap());
        }
        layer.objects_mut().push(registry.create_object("EmpireEndZone").unwrap());
        level
    }

    fn reread(registry: &Arc<Registry>, bytes: Vec<u8>) -> Level {
        Level::from_bytes_with(bytes, registry.clone(), &ReadOptions::default()).unwrap()
    }

    #[test]
    fn test_fresh_level_roundtrip() {
        let registry = registry();
        let level = sample(&registry);
        let bytes = level.to_bytes().unwrap();

        let back = reread(&registry, bytes.clone());
        assert_eq!(back.name(), "Sample");
        assert_eq!(back.version(), LEVEL_VERSION);
        assert_eq!(back.layer_count(), 1);
        let layer = back.layer(0).unwrap();
        assert_eq!(layer.objects().len(), 4);
        assert_eq!(layer.objects().last().unwrap().type_name(), "EmpireEndZone");
        assert_eq!(back.settings().unwrap().type_name(), "LevelSettings");
        assert!(back.check_exceptions().is_ok());
        assert_eq!(back.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_settings_rename() {
        let registry = registry();
        let bytes = sample(&registry).to_bytes().unwrap();

        let mut level = reread(&registry, bytes);
        level.settings_mut().unwrap().set_name("New".into()).unwrap();
        let level = reread(&registry, level.to_bytes().unwrap());
        assert_eq!(level.settings().unwrap().name().unwrap(), "New");
    }

    #[test]
    fn test_legacy_settings() {
        let registry = registry();
        let mut w = DstWriter::memory();
        let header = Section::level("Old", 0).with_count(0);
        w.write_section(&header, |w| {
            w.write_section(&Section::legacy_settings(), |w| w.write_bytes(&[1, 2, 3, 4]))
        })
        .unwrap();
        let bytes = w.into_bytes();

        let level = reread(&registry, bytes.clone());
        assert!(level.settings().is_none());
        assert_eq!(&level.legacy_settings().unwrap().data[..], &[1, 2, 3, 4]);
        assert_eq!(level.layer_count(), 0);
        assert_eq!(level.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_truncated_level() {
        let registry = registry();
        let bytes = sample(&registry).to_bytes().unwrap();
        let cut = bytes[..bytes.len() - 10].to_vec();

        let level = reread(&registry, cut);
        let layer = level.layer(0).unwrap();
        assert!(layer.sane_end_pos());
        assert!(layer.exception().is_none());
        assert!(level.settings().unwrap().sane_end_pos());
        assert_eq!(layer.objects().len(), 4);
        let last = layer.objects().last().unwrap();
        assert!(last.exception().unwrap().is_short_read());
        assert!(layer.objects().get(2).unwrap().exception().is_none());
        assert!(level.check_exceptions().unwrap_err().is_short_read());
    }

    #[test]
    fn test_component_inside_level_is_captured() {
        let registry = registry();
        let mut w = DstWriter::memory();
        w.write_section(&Section::level("Bad", 3).with_count(0), |w| {
            w.write_section(&Section::component(Magic::M2, 0x63, 0), |_| Ok(()))
        })
        .unwrap();

        let level = reread(&registry, w.into_bytes());
        let err = level.check_exceptions().unwrap_err();
        assert!(err.is_framing_error());
    }

    #[test]
    fn test_trailing_bytes_kept() {
        let registry = registry();
        let mut w = DstWriter::memory();
        w.write_section(&Section::level("Padded", 3).with_count(1), |w| {
            registry.create_object("LevelSettings")?.write(w)?;
            w.write_section(&Section::layer("Main").with_count(1), |w| {
                registry.create_object("CubeGS")?.write(w)?;
                w.write_bytes(&[0xaa; 3])
            })?;
            w.write_bytes(&[0xbb; 5])
        })
        .unwrap();
        let bytes = w.into_bytes();

        let level = reread(&registry, bytes.clone());
        assert_eq!(level.layer(0).unwrap().objects().len(), 1);
        assert!(level.check_exceptions().is_ok());
        assert_eq!(level.to_bytes().unwrap(), bytes);

        let mut edited = reread(&registry, bytes.clone());
        let cube = edited.layer_mut(0).unwrap().objects_mut().remove(0).unwrap();
        let removed = cube.to_bytes().unwrap().len();
        assert_eq!(edited.to_bytes().unwrap().len(), bytes.len() - removed);
    }
}
