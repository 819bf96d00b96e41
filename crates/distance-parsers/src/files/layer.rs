//! Level layers (`M7`)

use std::io::{Seek, Write};
use std::sync::Arc;

use bytes::Bytes;
use distance_core::{Error, Result};
use once_cell::sync::OnceCell;

use crate::bytes::{DstBytes, DstWriter};
use crate::lazy::LazySeq;
use crate::object::{ChildIter, DstObject};
use crate::section::{Ident, Magic, Section};
use crate::traits::ReadContext;

/// Flag block at the start of a layer body
///
/// Flag bytes are kept as stored; any nonzero value counts as set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerFlags {
    /// 0 or 1; version 1 stores one extra byte
    pub version: u32,
    pub active: u8,
    pub frozen: u8,
    pub visible: u8,
    pub extra: Option<u8>,
}

impl Default for LayerFlags {
    fn default() -> Self {
        Self {
            version: 1,
            active: 1,
            frozen: 0,
            visible: 1,
            extra: Some(0),
        }
    }
}

impl LayerFlags {
    pub fn is_active(&self) -> bool {
        self.active != 0
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen != 0
    }

    pub fn is_visible(&self) -> bool {
        self.visible != 0
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = u8::from(active);
    }

    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = u8::from(frozen);
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = u8::from(visible);
    }

    /// Read the block if present; legacy layers start with their objects
    fn read(r: &mut DstBytes) -> Result<Option<Self>> {
        if r.remaining() < 8 || r.peek_u32()? != Magic::M1.value() {
            return Ok(None);
        }
        r.read_u32()?;
        let version = r.read_u32()?;
        let [active, frozen, visible] = r.read_array::<3>()?;
        let extra = match version {
            0 => None,
            1 => Some(r.read_u8()?),
            v => {
                return Err(Error::bad_framing(
                    r.tell(),
                    format!("unknown layer flags version {v}"),
                ))
            }
        };
        Ok(Some(Self {
            version,
            active,
            frozen,
            visible,
            extra,
        }))
    }

    fn write<W: Write + Seek>(&self, w: &mut DstWriter<W>) -> Result<()> {
        w.write_u32(Magic::M1.value())?;
        w.write_u32(self.version)?;
        for flag in [self.active, self.frozen, self.visible] {
            w.write_u8(flag)?;
        }
        if let Some(extra) = self.extra {
            w.write_u8(extra)?;
        }
        Ok(())
    }
}

/// Bytes of a container body that follow its last counted child
///
/// The start is only known once the children were read, so readers publish
/// it through `children_end`.
pub(crate) struct Trailing {
    pub(crate) source: DstBytes,
    pub(crate) end: u64,
    pub(crate) children_end: Arc<OnceCell<u64>>,
}

impl Trailing {
    pub(crate) fn bytes(&self) -> Option<Bytes> {
        let start = *self.children_end.get()?;
        if start >= self.end {
            return None;
        }
        self.source.slice(start, self.end).ok()
    }
}

/// A named list of level objects
pub struct Layer {
    section: Section,
    flags: Option<LayerFlags>,
    objects: LazySeq<DstObject>,
    exception: Option<Error>,
    /// Set when the body runs past the end of the source
    cut: Option<Error>,
    trailing: Option<Trailing>,
    sane_end_pos: bool,
}

impl Layer {
    /// Fresh empty layer with default flags
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            section: Section::layer(name),
            flags: Some(LayerFlags::default()),
            objects: LazySeq::default(),
            exception: None,
            cut: None,
            trailing: None,
            sane_end_pos: true,
        }
    }

    /// Read the body of a framed `M7` section; objects are read on access
    ///
    /// A body running past the end of the source is recorded as a deferred
    /// short-read; the layer itself stays sane since its header was framed.
    pub(crate) fn read_body(r: &mut DstBytes, section: Section, ctx: &ReadContext) -> Layer {
        let mut layer = Layer {
            flags: None,
            objects: LazySeq::default(),
            exception: None,
            cut: None,
            trailing: None,
            sane_end_pos: true,
            section,
        };
        let Some(extent) = layer.section.extent else {
            return layer;
        };
        let limit = r.end();
        if extent.end > limit {
            layer.cut = Some(Error::short_read(
                extent.start,
                extent.end - extent.start,
                limit.saturating_sub(extent.start),
            ));
        }

        let mut body = r.at(extent.content_start);
        match body.with_limit(extent.end, LayerFlags::read) {
            Ok(flags) => layer.flags = flags,
            Err(err) => {
                tracing::warn!(layer = %layer.section, error = %err, "layer flags unreadable");
                layer.sane_end_pos = !err.is_framing_error();
                layer.exception = Some(err);
                return layer;
            }
        }

        let count = layer.section.count as usize;
        let children_end = Arc::new(OnceCell::new());
        if count == 0 {
            let _ = children_end.set(body.tell());
        }
        if layer.cut.is_none() {
            layer.trailing = Some(Trailing {
                source: body.at(0),
                end: extent.end,
                children_end: children_end.clone(),
            });
        }

        let iter = ChildIter {
            reader: body,
            end: extent.end,
            remaining: count,
            ctx: ctx.clone(),
            collection: "level_objects",
            done: false,
            finished_at: Some(children_end),
        };
        layer.objects = LazySeq::new(count, iter);
        r.seek_to(extent.end);
        layer
    }

    pub fn section(&self) -> &Section {
        &self.section
    }

    pub fn name(&self) -> &str {
        self.section.name().unwrap_or_default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.section.ident = Ident::Name(name.into());
    }

    pub fn flags(&self) -> Option<&LayerFlags> {
        self.flags.as_ref()
    }

    pub fn set_flags(&mut self, flags: Option<LayerFlags>) {
        self.flags = flags;
    }

    pub fn objects(&self) -> &LazySeq<DstObject> {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut LazySeq<DstObject> {
        &mut self.objects
    }

    pub fn exception(&self) -> Option<&Error> {
        self.exception.as_ref()
    }

    pub fn sane_end_pos(&self) -> bool {
        self.sane_end_pos
    }

    pub fn materialize_all(&self) {
        self.objects.materialize_all();
        for obj in self.objects.iter() {
            obj.materialize_all();
        }
    }

    /// First captured error; a cut inside an object is reported by that object
    pub fn check_exceptions(&self) -> Result<()> {
        if let Some(err) = &self.exception {
            return Err(err.clone().with_context(format!("in {}", self.section)));
        }
        for obj in self.objects.iter() {
            obj.check_exceptions()
                .map_err(|e| e.with_context(format!("in {}", self.section)))?;
        }
        match &self.cut {
            Some(err) => Err(err.clone().with_context(format!("in {}", self.section))),
            None => Ok(()),
        }
    }

    pub fn write<W: Write + Seek>(&self, w: &mut DstWriter<W>) -> Result<()> {
        self.objects.materialize_all();
        let header = self.section.with_count(self.objects.len() as u32);
        w.write_section(&header, |w| {
            if let Some(flags) = &self.flags {
                flags.write(w)?;
            }
            for obj in self.objects.iter() {
                obj.write(w)?;
            }
            if let Some(tail) = self.trailing.as_ref().and_then(Trailing::bytes) {
                w.write_bytes(&tail)?;
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("name", &self.name())
            .field("flags", &self.flags)
            .field("objects", &self.objects.len())
            .field("exception", &self.exception)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::registry::Registry;
    use crate::traits::ReadOptions;

    fn roundtrip(layer: &Layer, registry: &Arc<Registry>) -> (Vec<u8>, Layer) {
        let mut w = DstWriter::memory();
        layer.write(&mut w).unwrap();
        let bytes = w.into_bytes();
        let mut r = DstBytes::new(bytes.clone());
        let section = Section::expect(&mut r, Magic::M7).unwrap();
        let ctx = ReadContext::new(registry.clone(), ReadOptions::default());
        (bytes, Layer::read_body(&mut r, section, &ctx))
    }

    #[test]
    fn test_flags_versions() {
        let registry = Arc::new(Registry::eager().unwrap());
        for flags in [
            None,
            Some(LayerFlags::default()),
            Some(LayerFlags {
                version: 0,
                active: 0,
                frozen: 1,
                visible: 2,
                extra: None,
            }),
        ] {
            let mut layer = Layer::new("Main");
            layer.set_flags(flags);
            layer.objects_mut().push(registry.create_object("CubeGS").unwrap());

            let (bytes, back) = roundtrip(&layer, &registry);
            assert_eq!(back.flags(), flags.as_ref());
            if let Some(flags) = back.flags() {
                assert_eq!(flags.is_visible(), flags.visible != 0);
            }
            assert_eq!(back.name(), "Main");
            assert_eq!(back.objects().len(), 1);
            assert_eq!(roundtrip(&back, &registry).0, bytes);
        }
    }

    #[test]
    fn test_empty_legacy_layer() {
        let registry = Arc::new(Registry::eager().unwrap());
        let mut layer = Layer::new("Old");
        layer.set_flags(None);

        let (bytes, back) = roundtrip(&layer, &registry);
        assert!(back.flags().is_none());
        assert!(back.objects().is_empty());
        assert!(back.check_exceptions().is_ok());
        assert_eq!(roundtrip(&back, &registry).0, bytes);
    }

    fn padded_layer(registry: &Arc<Registry>, objects: u32, padding: &[u8]) -> Vec<u8> {
        let mut w = DstWriter::memory();
        w.write_section(&Section::layer("Pad").with_count(objects), |w| {
            LayerFlags::default().write(w)?;
            for _ in 0..objects {
                registry.create_object("CubeGS")?.write(w)?;
            }
            w.write_bytes(padding)
        })
        .unwrap();
        w.into_bytes()
    }

    fn read(registry: &Arc<Registry>, bytes: Vec<u8>) -> Layer {
        let mut r = DstBytes::new(bytes);
        let section = Section::expect(&mut r, Magic::M7).unwrap();
        let ctx = ReadContext::new(registry.clone(), ReadOptions::default());
        Layer::read_body(&mut r, section, &ctx)
    }

    #[test]
    fn test_trailing_bytes_kept() {
        let registry = Arc::new(Registry::eager().unwrap());
        for objects in [0, 2] {
            let bytes = padded_layer(&registry, objects, &[9, 8, 7, 6, 5]);
            let layer = read(&registry, bytes.clone());
            assert_eq!(layer.objects().len(), objects as usize);

            let mut w = DstWriter::memory();
            layer.write(&mut w).unwrap();
            assert_eq!(w.into_bytes(), bytes);
        }
    }

    #[test]
    fn test_flag_bytes_kept() {
        let registry = Arc::new(Registry::eager().unwrap());
        let mut layer = Layer::new("Flags");
        layer.set_flags(Some(LayerFlags {
            active: 2,
            ..LayerFlags::default()
        }));

        let (bytes, back) = roundtrip(&layer, &registry);
        let flags = back.flags().unwrap();
        assert_eq!(flags.active, 2);
        assert!(flags.is_active());
        assert_eq!(roundtrip(&back, &registry).0, bytes);
    }

    #[test]
    fn test_cut_keeps_layer_sane() {
        let registry = Arc::new(Registry::eager().unwrap());
        let mut bytes = padded_layer(&registry, 2, &[]);
        bytes.truncate(bytes.len() - 6);

        let layer = read(&registry, bytes);
        assert!(layer.sane_end_pos());
        assert!(layer.exception().is_none());
        assert_eq!(layer.objects().len(), 2);
        assert!(layer.objects().get(1).unwrap().exception().unwrap().is_short_read());
        assert!(layer.check_exceptions().unwrap_err().is_short_read());
    }
}
