//! Object model
//!
//! An object (`M6`) is an ordered list of component fragments followed by an
//! optional `M5` list of child objects:
//!
//! ```text
//! M6 "Group" ┬─ M3 0x01 v0   Object (transform)
//!            ├─ M2 0x1d v2   Group
//!            ├─ M2 0x63 v0   CustomName
//!            └─ M5 ┬─ M6 "CubeGS" ...
//!                  └─ M6 "CubeGS" ...
//! ```
//!
//! Component headers are framed when the object is read, but each body is
//! only probed and parsed when the fragment is first accessed. Children are a
//! [`LazySeq`] read one sibling at a time.
//!
//! Fragments are addressed by tag: `get("Group")` finds the component whose
//! base key is the one registered for `Group`. Deep trees are written,
//! materialized, checked and dropped with explicit work stacks.

mod attrs;

pub use attrs::*;

use std::fmt;
use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;

use bytes::Bytes;
use distance_core::{Error, Result, Transform};
use once_cell::sync::OnceCell;

use crate::bytes::{DstBytes, DstWriter};
use crate::fragment::{Fragment, RAW};
use crate::lazy::{LazySeq, MappedSeq};
use crate::registry::{Class, Registry};
use crate::schema::Value;
use crate::section::{Ident, Magic, OpenSection, Section, SectionKey};
use crate::traits::ReadContext;

/// Tag of the transform-carrying component every placed object starts with
pub const OBJECT_TAG: &str = "Object";

/// Static description of an object type
#[derive(Debug)]
pub struct ObjectClass {
    pub name: &'static str,
    /// Type string the class is registered under; `None` for probed classes
    pub type_name: Option<&'static str>,
    /// Tags of the fragments a fresh object is created with, in order
    pub default_fragments: &'static [&'static str],
    /// Transform elements absent on disk resolve to these
    pub default_transform: Transform,
    /// Whether fresh objects get an (empty) children list
    pub has_children: bool,
    pub module: &'static str,
}

impl PartialEq for ObjectClass {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

/// Fallback for object types nothing else claims
pub static GENERIC: ObjectClass = ObjectClass {
    name: "DstObject",
    type_name: None,
    default_fragments: &[OBJECT_TAG],
    default_transform: Transform::EMPTY,
    has_children: true,
    module: "core",
};

fn object_key() -> SectionKey {
    SectionKey::component(Magic::M3, 0x01)
}

/// Components of an object: lazily probed until first mutation
enum FragmentList {
    Lazy(MappedSeq<Section, Fragment>),
    Owned(Vec<Fragment>),
}

impl FragmentList {
    fn len(&self) -> usize {
        match self {
            FragmentList::Lazy(seq) => seq.len(),
            FragmentList::Owned(list) => list.len(),
        }
    }

    fn get(&self, index: usize) -> Option<&Fragment> {
        match self {
            FragmentList::Lazy(seq) => seq.get(index),
            FragmentList::Owned(list) => list.get(index),
        }
    }

    fn get_cached(&self, index: usize) -> Option<&Fragment> {
        match self {
            FragmentList::Lazy(seq) => seq.get_cached(index),
            FragmentList::Owned(list) => list.get(index),
        }
    }

    fn section(&self, index: usize) -> Option<&Section> {
        match self {
            FragmentList::Lazy(seq) => seq.base().get(index),
            FragmentList::Owned(list) => list.get(index).map(Fragment::section),
        }
    }

    fn owned(&mut self) -> &mut Vec<Fragment> {
        if let FragmentList::Lazy(_) = self {
            if let FragmentList::Lazy(seq) = std::mem::replace(self, FragmentList::Owned(Vec::new())) {
                *self = FragmentList::Owned(seq.into_vec());
            }
        }
        match self {
            FragmentList::Owned(list) => list,
            FragmentList::Lazy(_) => unreachable!("fragment list was just made owned"),
        }
    }
}

/// Probe and read one component body
fn read_fragment(registry: &Registry, section: &Section, source: &DstBytes) -> Fragment {
    let raw = || {
        section
            .extent
            .and_then(|e| source.slice(e.content_start, e.end).ok())
    };
    match registry.probe("fragment", section) {
        Ok(Class::Fragment(cls)) => Fragment::read(cls, section.clone(), source),
        Ok(other) => Fragment::failed(
            &RAW,
            section.clone(),
            raw(),
            Error::Probe {
                key: format!("{} resolves to {other}, not a fragment", section.key()),
            },
        ),
        Err(err) => Fragment::failed(&RAW, section.clone(), raw(), err),
    }
}

/// A level object, subobject or customobject
pub struct DstObject {
    class: &'static ObjectClass,
    section: Section,
    fragments: FragmentList,
    /// `M5` header as read; `None` if the object has no children list
    children_section: Option<Section>,
    children: LazySeq<DstObject>,
    /// Body bytes after the components and children
    tail: Bytes,
    exception: Option<Error>,
    sane_end_pos: bool,
    /// The `M6` header itself could not be read
    header_lost: bool,
    registry: Arc<Registry>,
}

impl DstObject {
    fn empty(registry: Arc<Registry>, class: &'static ObjectClass, section: Section) -> Self {
        Self {
            class,
            section,
            fragments: FragmentList::Owned(Vec::new()),
            children_section: None,
            children: LazySeq::default(),
            tail: Bytes::new(),
            exception: None,
            sane_end_pos: true,
            header_lost: false,
            registry,
        }
    }

    /// Fresh object with no fragments
    pub fn new(registry: Arc<Registry>, class: &'static ObjectClass, type_name: &str) -> Self {
        let mut obj = Self::empty(registry, class, Section::object(type_name));
        if class.has_children {
            obj.children_section = Some(Section::children());
        }
        obj
    }

    /// Fresh object with the class's default fragments
    pub fn create(registry: Arc<Registry>, class: &'static ObjectClass, type_name: &str) -> Result<Self> {
        let mut obj = Self::new(registry, class, type_name);
        let mut fragments = Vec::with_capacity(class.default_fragments.len());
        for tag in class.default_fragments {
            fragments.push(obj.registry.create(tag)?);
        }
        obj.fragments = FragmentList::Owned(fragments);
        Ok(obj)
    }

    /// Placeholder for an object whose header could not be read
    pub fn broken(registry: Arc<Registry>, err: Error) -> Self {
        tracing::warn!(error = %err, "object header unreadable");
        let mut obj = Self::empty(registry, &GENERIC, Section::object(""));
        obj.sane_end_pos = false;
        obj.header_lost = true;
        obj.exception = Some(err);
        obj
    }

    /// Read an object from the reader's position, resolving its class in `collection`
    ///
    /// Never fails: errors are captured on the returned object. When the
    /// object is sane the reader is left at its end.
    pub fn read(r: &mut DstBytes, ctx: &ReadContext, collection: &str) -> DstObject {
        let section = match Section::expect(r, Magic::M6) {
            Ok(section) => section,
            Err(err) => return DstObject::broken(ctx.registry.clone(), err),
        };
        let (class, probe_error) = match ctx.registry.probe(collection, &section) {
            Ok(Class::Object(cls)) => (cls, None),
            Ok(other) => (
                &GENERIC,
                Some(Error::Probe {
                    key: format!("{} resolves to {other}, not an object", section.key()),
                }),
            ),
            Err(err) => (&GENERIC, Some(err)),
        };
        let mut obj = DstObject::read_body(r, section, class, ctx);
        if let (Some(err), None) = (probe_error, &obj.exception) {
            tracing::warn!(object = %obj.section, error = %err, "object class not resolved");
            obj.exception = Some(err);
        }
        obj
    }

    /// Read the body of an already framed `M6` section with a known class
    pub fn read_body(r: &mut DstBytes, section: Section, class: &'static ObjectClass, ctx: &ReadContext) -> DstObject {
        let Some(extent) = section.extent else {
            return DstObject::new(ctx.registry.clone(), class, section.type_name().unwrap_or_default());
        };
        let limit = r.end();
        let count = section.count;
        let mut obj = DstObject::empty(ctx.registry.clone(), class, section);

        let mut sections = Vec::new();
        let mut body = r.at(extent.content_start);
        let framed = body.with_limit(extent.end, |b| {
            for _ in 0..count {
                let start = b.tell();
                let comp = Section::read(b)?;
                if !comp.magic.is_component() {
                    return Err(Error::bad_framing(start, format!("expected a component, found {comp}")));
                }
                let end = comp.end_pos().unwrap_or(start);
                if end > b.end() {
                    return Err(Error::short_read(start, end - start, b.end().saturating_sub(start)));
                }
                b.seek_to(end);
                sections.push(comp);
            }
            Section::read_if(b, Magic::M5)
        });

        let source = body.at(0);
        match framed {
            Ok(children) => {
                let mut pos = body.tell();
                // A cut inside the children list is captured by the child it hits
                let mut deferred = false;
                if let Some(children) = children {
                    let end = children.end_pos().unwrap_or(pos);
                    if end > extent.end {
                        obj.fail(Error::bad_framing(
                            pos,
                            format!("children end at {end}, past their object at {}", extent.end),
                        ));
                    }
                    deferred = end > limit;
                    obj.read_children(&body, children, ctx);
                    pos = end;
                }
                let truncated = extent.end > limit;
                if obj.sane_end_pos && truncated && !deferred {
                    obj.fail(Error::short_read(
                        extent.start,
                        extent.end - extent.start,
                        limit.saturating_sub(extent.start),
                    ));
                } else if obj.sane_end_pos && !truncated && pos < extent.end {
                    obj.tail = source.slice(pos, extent.end).unwrap_or_default();
                }
            }
            Err(err) => obj.fail(err),
        }

        let registry = ctx.registry.clone();
        let fragment_source = source.clone();
        obj.fragments = FragmentList::Lazy(MappedSeq::new(Arc::new(LazySeq::from_vec(sections)), move |s| {
            read_fragment(&registry, s, &fragment_source)
        }));

        if obj.sane_end_pos {
            r.seek_to(extent.end);
        }
        obj
    }

    fn read_children(&mut self, body: &DstBytes, section: Section, ctx: &ReadContext) {
        let (Some(start), Some(end)) = (section.content_start(), section.end_pos()) else {
            return;
        };
        let iter = ChildIter {
            reader: body.at(start),
            end,
            remaining: section.count as usize,
            ctx: ctx.nested(),
            collection: "level_subobjects",
            done: false,
            finished_at: None,
        };
        self.children = LazySeq::new(section.count as usize, iter);
        self.children_section = Some(section);
    }

    fn fail(&mut self, err: Error) {
        tracing::warn!(object = %self.section, error = %err, "object captured error");
        self.sane_end_pos = false;
        self.exception = Some(err);
    }

    pub fn class(&self) -> &'static ObjectClass {
        self.class
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn section(&self) -> &Section {
        &self.section
    }

    pub fn type_name(&self) -> &str {
        self.section.type_name().unwrap_or_default()
    }

    /// Rename the object type; the class stays as resolved
    pub fn set_type_name(&mut self, type_name: impl Into<String>) {
        self.section.ident = Ident::Type(type_name.into());
    }

    pub fn exception(&self) -> Option<&Error> {
        self.exception.as_ref()
    }

    /// False when the object's extent could not be trusted and sibling reads stopped
    pub fn sane_end_pos(&self) -> bool {
        self.sane_end_pos
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Fragment at `index`, probing and parsing it on first access
    pub fn fragment(&self, index: usize) -> Option<&Fragment> {
        self.fragments.get(index)
    }

    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> + '_ {
        (0..self.fragments.len()).map_while(move |i| self.fragments.get(i))
    }

    /// Mutable fragments; materializes the whole list
    pub fn fragments_mut(&mut self) -> &mut Vec<Fragment> {
        self.fragments.owned()
    }

    /// Component headers, without reading any body
    pub fn fragment_sections(&self) -> impl Iterator<Item = &Section> + '_ {
        (0..self.fragments.len()).map_while(move |i| self.fragments.section(i))
    }

    pub fn children(&self) -> &LazySeq<DstObject> {
        &self.children
    }

    /// Mutable children; adding a child to an object without a list creates one
    pub fn children_mut(&mut self) -> &mut LazySeq<DstObject> {
        if self.children_section.is_none() {
            self.children_section = Some(Section::children());
        }
        &mut self.children
    }

    pub fn has_children_section(&self) -> bool {
        self.children_section.is_some()
    }

    fn find(&self, base: &SectionKey) -> Option<usize> {
        self.fragment_sections().position(|s| s.base_key() == *base)
    }

    fn missing(tag: &str, is_present: bool) -> Error {
        Error::FragmentKey {
            tag: tag.to_owned(),
            is_present,
        }
    }

    /// Index of the `tag` fragment if subscript access would succeed
    fn lookup(&self, tag: &str) -> Result<usize> {
        let base = self.registry.tag_base_key(tag)?;
        let index = self.find(&base).ok_or_else(|| Self::missing(tag, false))?;
        if let Some(frag) = self.fragments.get_cached(index) {
            if frag.tag() == Some(tag) {
                return Ok(index);
            }
        }
        let section = self.fragments.section(index).ok_or_else(|| Self::missing(tag, false))?;
        if self.registry.is_implemented(tag, section)? {
            Ok(index)
        } else {
            Err(Self::missing(tag, true))
        }
    }

    /// Fragment for `tag`, if present with an implemented version
    pub fn get(&self, tag: &str) -> Result<&Fragment> {
        let index = self.lookup(tag)?;
        self.fragments.get(index).ok_or_else(|| Self::missing(tag, false))
    }

    pub fn get_mut(&mut self, tag: &str) -> Result<&mut Fragment> {
        let index = self.lookup(tag)?;
        self.fragments
            .owned()
            .get_mut(index)
            .ok_or_else(|| Self::missing(tag, false))
    }

    /// Replace the `tag` fragment, or add it
    ///
    /// The object fragment is inserted first; others are appended.
    pub fn set(&mut self, tag: &str, fragment: Fragment) -> Result<()> {
        let base = self.registry.tag_base_key(tag)?;
        if fragment.section().base_key() != base || fragment.tag() != Some(tag) {
            return Err(Error::schema(
                tag,
                format!("fragment {fragment} cannot be stored under tag {tag}"),
            ));
        }
        let index = self.find(&base);
        let list = self.fragments.owned();
        match index {
            Some(i) => list[i] = fragment,
            None if tag == OBJECT_TAG => list.insert(0, fragment),
            None => list.push(fragment),
        }
        Ok(())
    }

    /// Remove the first `tag` fragment
    pub fn remove(&mut self, tag: &str) -> Result<Fragment> {
        let base = self.registry.tag_base_key(tag)?;
        let index = self.find(&base).ok_or_else(|| Self::missing(tag, false))?;
        Ok(self.fragments.owned().remove(index))
    }

    /// Whether [`get`](Self::get) would succeed
    pub fn contains(&self, tag: &str) -> bool {
        self.lookup(tag).is_ok()
    }

    /// Whether any fragment has the base key of `tag`, implemented or not
    pub fn has_any(&self, tag: &str) -> Result<bool> {
        let base = self.registry.tag_base_key(tag)?;
        Ok(self.find(&base).is_some())
    }

    /// The fragment with the base key of `tag`, implemented or not
    pub fn get_any(&self, tag: &str) -> Result<Option<&Fragment>> {
        let base = self.registry.tag_base_key(tag)?;
        Ok(self.find(&base).and_then(|i| self.fragments.get(i)))
    }

    /// Transform as stored; absent if there is no object fragment or it is empty
    pub fn transform(&self) -> Option<Transform> {
        let index = self.find(&object_key())?;
        self.fragments.get(index)?.transform()
    }

    /// Transform with absent elements filled from the class defaults
    pub fn real_transform(&self) -> Transform {
        self.transform()
            .unwrap_or(Transform::EMPTY)
            .effective(&self.class.default_transform)
    }

    /// Set the transform, adding an object fragment if there is none
    pub fn set_transform(&mut self, transform: Option<Transform>) -> Result<()> {
        if self.find(&object_key()).is_none() {
            let fragment = self.registry.create(OBJECT_TAG)?;
            self.set(OBJECT_TAG, fragment)?;
        }
        let index = self.find(&object_key()).ok_or_else(|| Self::missing(OBJECT_TAG, false))?;
        match self.fragments.owned().get_mut(index) {
            Some(frag) => frag.set_transform(transform),
            None => Err(Self::missing(OBJECT_TAG, false)),
        }
    }

    /// Typed field of the `tag` fragment
    pub fn field(&self, tag: &str, name: &str) -> Result<Value> {
        self.get(tag)?.field(name)
    }

    pub fn set_field(&mut self, tag: &str, name: &str, value: Value) -> Result<()> {
        self.get_mut(tag)?.set_field(name, value)
    }

    /// Read every fragment and child of the subtree
    pub fn materialize_all(&self) {
        let mut stack = vec![self];
        while let Some(obj) = stack.pop() {
            for _ in obj.fragments() {}
            obj.children.materialize_all();
            stack.extend(obj.children.iter());
        }
    }

    /// First error captured anywhere in the subtree, in document order
    pub fn check_exceptions(&self) -> Result<()> {
        let mut stack = vec![self];
        while let Some(obj) = stack.pop() {
            if let Some(err) = &obj.exception {
                return Err(err.clone().with_context(format!("in {}", obj.section)));
            }
            if let Some(err) = obj.fragments().find_map(Fragment::exception) {
                return Err(err.clone().with_context(format!("in {}", obj.section)));
            }
            let children: Vec<&DstObject> = obj.children.iter().collect();
            stack.extend(children.into_iter().rev());
        }
        Ok(())
    }

    /// Write the object and its subtree
    pub fn write<W: Write + Seek>(&self, w: &mut DstWriter<W>) -> Result<()> {
        enum Step<'a> {
            Enter(&'a DstObject),
            Exit(&'a DstObject, OpenSection, Option<OpenSection>),
        }

        let mut stack = vec![Step::Enter(self)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(obj) => {
                    if obj.header_lost {
                        let err = obj
                            .exception
                            .clone()
                            .unwrap_or_else(|| Error::bad_framing(0, "object header was not read"));
                        return Err(err.with_context("writing an object without a header"));
                    }
                    let count = obj.fragments.len() as u32;
                    let open = w.begin_section(&obj.section.with_count(count))?;
                    for frag in obj.fragments() {
                        frag.write(w)?;
                    }
                    let children = match (&obj.children_section, obj.children.is_empty()) {
                        (None, true) => None,
                        (section, _) => {
                            obj.children.materialize_all();
                            let header = section.clone().unwrap_or_else(Section::children);
                            Some(w.begin_section(&header.with_count(obj.children.len() as u32))?)
                        }
                    };
                    stack.push(Step::Exit(obj, open, children));
                    let kids: Vec<&DstObject> = obj.children.iter().collect();
                    stack.extend(kids.into_iter().rev().map(Step::Enter));
                }
                Step::Exit(obj, open, children) => {
                    if let Some(children) = children {
                        w.end_section(children)?;
                    }
                    w.write_bytes(&obj.tail)?;
                    w.end_section(open)?;
                }
            }
        }
        Ok(())
    }

    /// Serialized bytes of the subtree
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut w = DstWriter::memory();
        self.write(&mut w)?;
        Ok(w.into_bytes())
    }
}

impl Drop for DstObject {
    fn drop(&mut self) {
        let mut stack = self.children.take_materialized();
        while let Some(mut obj) = stack.pop() {
            stack.extend(obj.children.take_materialized());
        }
    }
}

impl fmt::Debug for DstObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DstObject")
            .field("type", &self.type_name())
            .field("class", &self.class.name)
            .field("fragments", &self.fragments.len())
            .field("children", &self.children.len())
            .field("exception", &self.exception)
            .finish()
    }
}

impl fmt::Display for DstObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.section)?;
        if self.exception.is_some() {
            write!(f, " (error)")?;
        }
        Ok(())
    }
}

/// Reads sibling objects one at a time until the list ends or an object is unsound
pub(crate) struct ChildIter {
    pub(crate) reader: DstBytes,
    pub(crate) end: u64,
    pub(crate) remaining: usize,
    pub(crate) ctx: ReadContext,
    pub(crate) collection: &'static str,
    pub(crate) done: bool,
    /// Receives the end of the last child once every counted child was read
    pub(crate) finished_at: Option<Arc<OnceCell<u64>>>,
}

impl Iterator for ChildIter {
    type Item = DstObject;

    fn next(&mut self) -> Option<DstObject> {
        if self.done || self.remaining == 0 || self.reader.tell() >= self.end.min(self.reader.len()) {
            self.done = true;
            return None;
        }
        self.remaining -= 1;

        if self.ctx.too_deep() {
            self.done = true;
            let at = self.reader.tell();
            return Some(DstObject::broken(
                self.ctx.registry.clone(),
                Error::bad_framing(at, format!("objects nested deeper than {}", self.ctx.options.max_nesting_depth)),
            ));
        }

        let ctx = &self.ctx;
        let collection = self.collection;
        let obj = self
            .reader
            .with_limit(self.end, |r| Ok(DstObject::read(r, ctx, collection)))
            .unwrap_or_else(|err| DstObject::broken(ctx.registry.clone(), err));

        if !obj.sane_end_pos() {
            self.done = true;
        } else if let Some(end) = obj.section.end_pos() {
            if self.reader.seek(SeekFrom::Start(end)).is_err() {
                self.done = true;
            } else if self.remaining == 0 {
                if let Some(cell) = &self.finished_at {
                    let _ = cell.set(end);
                }
            }
        }
        Some(obj)
    }
}
