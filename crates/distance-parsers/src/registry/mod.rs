//! Class registry
//!
//! The registry resolves sections to the classes that read them. It is made
//! of named [`Collection`]s, each a set of registrations keyed by
//! [`SectionKey`], and [`Composite`]s that probe several collections in turn:
//!
//! | Name | Kind | Contents |
//! |------|------|----------|
//! | `fragment` | collection | component classes, raw fallback |
//! | `level_objects` | collection | objects placed in layers, generic fallback |
//! | `level_subobjects` | collection | child objects, generic fallback |
//! | `non_level_objects` | collection | standalone files (leaderboards, profiles, ...) |
//! | `level_content` | collection | layers and the settings object of a level |
//! | `level` | collection | the level container |
//! | `file` | composite | `level`, `non_level_objects`, `level_objects` |
//! | `level_like` | composite | `level`, `level_content` |
//! | `customobjects` | composite | `level_objects`, rejects levels and layers |
//!
//! Tags name component base keys for object subscript lookup and select the
//! implementation for each version ([`Registry::klass`]).
//!
//! Implementations are grouped in modules (see [`autoload::MODULES`]). A
//! registry built with [`Registry::eager`] runs every module up front; one
//! built with [`Registry::from_manifest`] runs a module the first time a
//! probe or tag lookup needs it.

pub mod autoload;
mod collection;

pub use autoload::{Manifest, Module, MODULES};
pub use collection::{Collection, Composite, ProbeFn, ProbeOutcome, Registration};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use distance_core::{Error, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::fragment::{Fragment, FragmentClass, RAW};
use crate::object::{DstObject, ObjectClass, GENERIC};
use crate::section::{Ident, Magic, Section, SectionKey};

use autoload::Autoload;

/// Non-object containers a probe can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Level,
    Layer,
    LegacySettings,
}

/// What a probe resolves to
#[derive(Debug, Clone, Copy)]
pub enum Class {
    Fragment(&'static FragmentClass),
    Object(&'static ObjectClass),
    Container(ContainerKind),
}

impl Class {
    pub fn name(&self) -> &'static str {
        match self {
            Class::Fragment(cls) => cls.name,
            Class::Object(cls) => cls.name,
            Class::Container(ContainerKind::Level) => "Level",
            Class::Container(ContainerKind::Layer) => "Layer",
            Class::Container(ContainerKind::LegacySettings) => "OldLevelSettings",
        }
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Class::Fragment(a), Class::Fragment(b)) => std::ptr::eq(*a, *b),
            (Class::Object(a), Class::Object(b)) => std::ptr::eq(*a, *b),
            (Class::Container(a), Class::Container(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-tag implementations
#[derive(Debug, Clone)]
struct TagInfo {
    base: SectionKey,
    versions: BTreeMap<u32, &'static FragmentClass>,
    /// Version-less registration
    any: Option<&'static FragmentClass>,
    module: &'static str,
}

#[derive(Debug, Default)]
struct RegistryState {
    collections: BTreeMap<&'static str, Collection>,
    composites: BTreeMap<&'static str, Composite>,
    tags: BTreeMap<String, TagInfo>,
    objects: HashMap<String, (&'static ObjectClass, &'static str)>,
    loaded: BTreeSet<&'static str>,
}

impl RegistryState {
    fn collection_mut(&mut self, name: &str) -> Result<&mut Collection> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| Error::register(format!("unknown collection {name}")))
    }

    fn add_tag(&mut self, tag: &str, base: SectionKey, module: &'static str) -> Result<&mut TagInfo> {
        let info = self.tags.entry(tag.to_owned()).or_insert_with(|| TagInfo {
            base: base.clone(),
            versions: BTreeMap::new(),
            any: None,
            module,
        });
        if info.base != base {
            return Err(Error::register(format!(
                "tag {tag} names {}, cannot rebind it to {base}",
                info.base
            )));
        }
        Ok(info)
    }

    fn add_tag_class(&mut self, tag: &str, cls: &'static FragmentClass, module: &'static str) -> Result<()> {
        let info = self.add_tag(tag, cls.base_key(), module)?;
        let versions = cls.versions.list();
        if versions.is_empty() {
            match info.any {
                Some(existing) if !std::ptr::eq(existing, cls) => {
                    return Err(Error::register(format!(
                        "tag {tag} already has version-less class {}",
                        existing.name
                    )))
                }
                _ => info.any = Some(cls),
            }
        }
        for v in versions {
            match info.versions.get(&v) {
                Some(existing) if !std::ptr::eq(*existing, cls) => {
                    return Err(Error::register(format!(
                        "tag {tag} version {v} is implemented by {}, cannot add {}",
                        existing.name, cls.name
                    )))
                }
                _ => {
                    info.versions.insert(v, cls);
                }
            }
        }
        Ok(())
    }

    fn members_of(&self, name: &str) -> Vec<&'static str> {
        if let Some(composite) = self.composites.get(name) {
            return composite.members.clone();
        }
        self.collections.get(name).map(|c| vec![c.name]).unwrap_or_default()
    }

    fn probe(&self, name: &str, section: &Section) -> Result<Class> {
        if let Some(collection) = self.collections.get(name) {
            return collection.probe(section);
        }
        let composite = self.composites.get(name).ok_or_else(|| Error::Probe {
            key: format!("{} in unknown collection {name}", section.key()),
        })?;
        if composite.is_blacklisted(section) {
            return Err(Error::Probe {
                key: format!("{} rejected by {name}", section.key()),
            });
        }
        let members: Vec<&Collection> = composite
            .members
            .iter()
            .filter_map(|m| self.collections.get(m))
            .collect();
        for collection in &members {
            if let ProbeOutcome::Found(class) = collection.lookup(section) {
                return Ok(class);
            }
        }
        match members.iter().find(|c| c.probe_baseclass()) {
            Some(fallback) => fallback.probe(section),
            None => Err(Error::Probe {
                key: format!("{} in {name}", section.key()),
            }),
        }
    }
}

/// Registration handle passed to module register functions
pub struct Registrar<'a> {
    state: &'a mut RegistryState,
    module: &'static str,
}

impl Registrar<'_> {
    pub fn module(&self) -> &'static str {
        self.module
    }

    /// Register a component class in the `fragment` collection, and its tag
    pub fn fragment(&mut self, cls: &'static FragmentClass) -> Result<()> {
        self.fragment_in("fragment", cls)
    }

    pub fn fragment_in(&mut self, collection: &str, cls: &'static FragmentClass) -> Result<()> {
        let module = self.module;
        self.state.collection_mut(collection)?.add_fragment(cls, module)?;
        if let Some(tag) = cls.tag {
            self.state.add_tag_class(tag, cls, module)?;
        }
        Ok(())
    }

    /// Bind a component key to the raw class so it is never parsed
    pub fn raw(&mut self, magic: Magic, id: u32, version: u32) -> Result<()> {
        let module = self.module;
        let key = SectionKey::component(magic, id).versioned(version);
        self.state
            .collection_mut("fragment")?
            .add_key(key, Class::Fragment(&RAW), module)
    }

    /// Register an object class under its type name
    pub fn object(&mut self, collection: &str, cls: &'static ObjectClass) -> Result<()> {
        let type_name = cls
            .type_name
            .ok_or_else(|| Error::register(format!("object class {} has no type name", cls.name)))?;
        let module = self.module;
        self.state.collection_mut(collection)?.add_object(type_name, cls, module)?;
        match self.state.objects.get(type_name) {
            Some((existing, _)) if !std::ptr::eq(*existing, cls) => Err(Error::register(format!(
                "object type {type_name} is bound to {}, cannot bind {}",
                existing.name, cls.name
            ))),
            Some(_) => Ok(()),
            None => {
                self.state.objects.insert(type_name.to_owned(), (cls, module));
                Ok(())
            }
        }
    }

    pub fn key(&mut self, collection: &str, key: SectionKey, class: Class) -> Result<()> {
        let module = self.module;
        self.state.collection_mut(collection)?.add_key(key, class, module)
    }

    pub fn func(&mut self, collection: &str, func: ProbeFn) -> Result<()> {
        let module = self.module;
        self.state.collection_mut(collection)?.add_func(func, module);
        Ok(())
    }

    pub fn tag(&mut self, tag: &str, base: SectionKey) -> Result<()> {
        let module = self.module;
        self.state.add_tag(tag, base, module).map(|_| ())
    }
}

/// Produces fresh fragments for one tag and version
#[derive(Debug, Clone)]
pub struct Factory {
    class: &'static FragmentClass,
    section: Section,
}

impl Factory {
    pub fn class(&self) -> &'static FragmentClass {
        self.class
    }

    pub fn section(&self) -> &Section {
        &self.section
    }

    pub fn create(&self) -> Fragment {
        Fragment::new_with_section(self.class, self.section.clone())
    }
}

/// Section-to-class dispatch
pub struct Registry {
    state: RwLock<RegistryState>,
    autoload: Option<Autoload>,
}

impl Registry {
    /// Registry with the built-in collections and containers only
    pub fn core() -> Self {
        let mut state = RegistryState::default();

        let mut add = |c: Collection| {
            state.collections.insert(c.name, c);
        };
        add(Collection::new("fragment").with_base(Class::Fragment(&RAW)));
        add(Collection::new("level_objects").with_base(Class::Object(&GENERIC)));
        add(Collection::new("level_subobjects").with_base(Class::Object(&GENERIC)));
        add(Collection::new("non_level_objects"));
        add(Collection::new("level_content"));
        add(Collection::new("level"));

        for composite in [
            Composite::new("file", &["level", "non_level_objects", "level_objects"]),
            Composite::new("level_like", &["level", "level_content"]),
            Composite::new("customobjects", &["level_objects"])
                .reject(Magic::M9)
                .reject(Magic::M7),
        ] {
            state.composites.insert(composite.name, composite);
        }

        let containers = [
            ("level", SectionKey::magic(Magic::M9), ContainerKind::Level),
            ("level_content", SectionKey::magic(Magic::M7), ContainerKind::Layer),
            ("level_content", SectionKey::magic(Magic::M8), ContainerKind::LegacySettings),
        ];
        for (name, key, kind) in containers {
            if let Some(collection) = state.collections.get_mut(name) {
                // Fresh collections cannot conflict
                let _ = collection.add_key(key, Class::Container(kind), "core");
            }
        }

        Self {
            state: RwLock::new(state),
            autoload: None,
        }
    }

    /// Registry with every implementation module loaded
    pub fn eager() -> Result<Self> {
        let registry = Self::core();
        for module in MODULES {
            registry.load_module(module.name)?;
        }
        Ok(registry)
    }

    /// Registry that loads implementation modules as the manifest says they are needed
    pub fn from_manifest(manifest: Manifest) -> Result<Self> {
        let mut registry = Self::core();
        registry.autoload = Some(Autoload::new(manifest)?);
        Ok(registry)
    }

    /// Run extra registrations under a module name
    pub fn register(&self, module: &'static str, f: impl FnOnce(&mut Registrar<'_>) -> Result<()>) -> Result<()> {
        let mut state = self.state.write();
        f(&mut Registrar {
            state: &mut state,
            module,
        })
    }

    /// Load one implementation module; loading twice is a no-op
    pub fn load_module(&self, name: &str) -> Result<()> {
        if self.state.read().loaded.contains(name) {
            return Ok(());
        }
        let module = MODULES
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| Error::register(format!("unknown module {name}")))?;

        let mut state = self.state.write();
        if state.loaded.contains(module.name) {
            return Ok(());
        }
        (module.register)(&mut Registrar {
            state: &mut state,
            module: module.name,
        })?;
        state.loaded.insert(module.name);
        tracing::debug!(module = module.name, "loaded registry module");
        Ok(())
    }

    pub fn loaded_modules(&self) -> Vec<&'static str> {
        self.state.read().loaded.iter().copied().collect()
    }

    pub fn is_autoloading(&self) -> bool {
        self.autoload.is_some()
    }

    fn load_all(&self, modules: &[&'static str]) -> Result<()> {
        for module in modules {
            self.load_module(module)?;
        }
        Ok(())
    }

    /// Resolve `section` to a class through a collection or composite
    pub fn probe(&self, collection: &str, section: &Section) -> Result<Class> {
        if let Some(autoload) = &self.autoload {
            let members = self.state.read().members_of(collection);
            for member in members {
                let key = section.key();
                let mut wanted = autoload.modules_for_key(member, &key);
                if !key.is_base() {
                    wanted.extend(autoload.modules_for_key(member, &key.base()));
                }
                if wanted.is_empty() {
                    wanted = autoload.func_modules(member);
                }
                self.load_all(&wanted)?;
            }
        }
        self.state.read().probe(collection, section)
    }

    fn autoload_tag(&self, tag: &str) -> Result<()> {
        if let Some(autoload) = &self.autoload {
            self.load_all(&autoload.modules_for_tag(tag))?;
        }
        Ok(())
    }

    /// Declare a tag naming a base key
    pub fn add_tag(&self, tag: &str, base: SectionKey) -> Result<()> {
        self.register("user", |r| r.tag(tag, base))
    }

    /// Implementation of `tag`, for `version` or the highest known one
    pub fn klass(&self, tag: &str, version: Option<u32>) -> Result<&'static FragmentClass> {
        self.autoload_tag(tag)?;
        let state = self.state.read();
        let info = state.tags.get(tag).ok_or_else(|| Error::Tag { tag: tag.to_owned() })?;
        let found = match version {
            Some(v) => info.versions.get(&v).copied().or(info.any),
            None => info.versions.values().next_back().copied().or(info.any),
        };
        found.ok_or_else(|| Error::ClassLookup {
            tag: tag.to_owned(),
            version,
        })
    }

    /// Base key named by `tag`
    pub fn tag_base_key(&self, tag: &str) -> Result<SectionKey> {
        self.autoload_tag(tag)?;
        self.state
            .read()
            .tags
            .get(tag)
            .map(|info| info.base.clone())
            .ok_or_else(|| Error::Tag { tag: tag.to_owned() })
    }

    /// Whether `section` is a `tag` component with an implemented version
    pub fn is_implemented(&self, tag: &str, section: &Section) -> Result<bool> {
        self.autoload_tag(tag)?;
        let state = self.state.read();
        let info = state.tags.get(tag).ok_or_else(|| Error::Tag { tag: tag.to_owned() })?;
        if section.base_key() != info.base {
            return Ok(false);
        }
        // Versions explicitly bound to another class (raw) are not this tag's
        if let Some(ProbeOutcome::Found(Class::Fragment(cls))) =
            state.collections.get("fragment").map(|c| c.lookup(section))
        {
            return Ok(cls.tag == Some(tag));
        }
        Ok(info.any.is_some() || section.version.is_some_and(|v| info.versions.contains_key(&v)))
    }

    /// Factory for `tag`; `fallback` is used when no implementation matches
    pub fn factory(
        &self,
        tag: &str,
        version: Option<u32>,
        fallback: Option<&'static FragmentClass>,
    ) -> Result<Factory> {
        let class = match (self.klass(tag, version), fallback) {
            (Ok(class), _) => class,
            (Err(Error::ClassLookup { .. } | Error::Tag { .. }), Some(fallback)) => {
                let section = match self.tag_base_key(tag) {
                    Ok(SectionKey {
                        magic,
                        ident: Ident::Id(id),
                        ..
                    }) => Section::component(magic, id, version.unwrap_or(0)),
                    Ok(_) | Err(_) => fallback.default_container(),
                };
                return Ok(Factory {
                    class: fallback,
                    section,
                });
            }
            (Err(err), _) => return Err(err),
        };
        let section = match version {
            Some(v) => Section::component(class.magic, class.id, v),
            None => class.default_container(),
        };
        Ok(Factory { class, section })
    }

    /// Fresh fragment of `tag` at its highest version
    pub fn create(&self, tag: &str) -> Result<Fragment> {
        Ok(self.factory(tag, None, None)?.create())
    }

    /// Fresh fragment of `tag` at `version`
    pub fn create_fragment(&self, tag: &str, version: Option<u32>) -> Result<Fragment> {
        Ok(self.factory(tag, version, None)?.create())
    }

    /// Object class for a type name
    pub fn object_class(&self, type_name: &str) -> Result<&'static ObjectClass> {
        let section = Section::object(type_name);
        if let Some(autoload) = &self.autoload {
            self.load_all(&autoload.modules_for_object(&section.key()))?;
        }
        if let Some((cls, _)) = self.state.read().objects.get(type_name) {
            return Ok(cls);
        }
        match self.probe("file", &section)? {
            Class::Object(cls) => Ok(cls),
            other => Err(Error::Probe {
                key: format!("{} resolves to {other}, not an object", section.key()),
            }),
        }
    }

    /// Fresh object of `type_name` with its class's default fragments
    pub fn create_object(self: &Arc<Self>, type_name: &str) -> Result<DstObject> {
        let class = self.object_class(type_name)?;
        DstObject::create(self.clone(), class, type_name)
    }

    /// Manifest describing every registration made by a module
    pub fn export_manifest(&self) -> Manifest {
        let state = self.state.read();
        let mut manifest = Manifest::default();
        for collection in state.collections.values() {
            for (key, reg) in collection.registrations() {
                if reg.module != "core" {
                    manifest.add_key(collection.name, key.clone(), reg.module);
                }
            }
            for module in collection.func_modules() {
                manifest.add_func(collection.name, module);
            }
        }
        for (tag, info) in &state.tags {
            manifest.add_tag(tag, info.module);
        }
        manifest.normalize();
        manifest
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Registry")
            .field("collections", &state.collections.keys().collect::<Vec<_>>())
            .field("tags", &state.tags.len())
            .field("loaded", &state.loaded)
            .field("autoload", &self.autoload.is_some())
            .finish()
    }
}

/// Process-wide default registry, built eagerly on first use
pub static DEFAULT_REGISTRY: Lazy<Result<Arc<Registry>>> = Lazy::new(|| Registry::eager().map(Arc::new));

/// Handle to the default registry
pub fn default_registry() -> Result<Arc<Registry>> {
    (*DEFAULT_REGISTRY).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{Repr, Versions};

    static OLD: FragmentClass = FragmentClass {
        name: "Widget1",
        tag: Some("Widget"),
        magic: Magic::M2,
        id: 0x77,
        versions: Versions::Range(0, 1),
        repr: Repr::Raw,
        interesting: false,
        module: "test",
    };

    static NEW: FragmentClass = FragmentClass {
        name: "Widget3",
        tag: Some("Widget"),
        magic: Magic::M2,
        id: 0x77,
        versions: Versions::Range(3, 3),
        repr: Repr::Raw,
        interesting: false,
        module: "test",
    };

    fn widget_registry() -> Registry {
        let registry = Registry::core();
        registry
            .register("test", |r| {
                r.fragment(&OLD)?;
                r.fragment(&NEW)
            })
            .unwrap();
        registry
    }

    #[test]
    fn test_klass_versions() {
        let registry = widget_registry();
        assert!(std::ptr::eq(registry.klass("Widget", None).unwrap(), &NEW));
        assert!(std::ptr::eq(registry.klass("Widget", Some(1)).unwrap(), &OLD));
        assert!(matches!(
            registry.klass("Widget", Some(2)),
            Err(Error::ClassLookup { version: Some(2), .. })
        ));
        assert!(matches!(registry.klass("Nope", None), Err(Error::Tag { .. })));
    }

    #[test]
    fn test_factory() {
        let registry = widget_registry();
        let frag = registry.create("Widget").unwrap();
        assert_eq!(frag.version(), Some(3));

        let factory = registry.factory("Widget", Some(2), Some(&RAW)).unwrap();
        assert!(std::ptr::eq(factory.class(), &RAW));
        assert_eq!(factory.section().key(), SectionKey::component(Magic::M2, 0x77).versioned(2));
    }

    #[test]
    fn test_is_implemented() {
        let registry = widget_registry();
        assert!(registry.is_implemented("Widget", &Section::component(Magic::M2, 0x77, 1)).unwrap());
        assert!(!registry.is_implemented("Widget", &Section::component(Magic::M2, 0x77, 2)).unwrap());
        assert!(!registry.is_implemented("Widget", &Section::component(Magic::M2, 0x78, 1)).unwrap());
    }

    #[test]
    fn test_tag_rebind_conflict() {
        let registry = widget_registry();
        let err = registry
            .add_tag("Widget", SectionKey::component(Magic::M3, 0x77))
            .unwrap_err();
        assert!(matches!(err, Error::Register { .. }));
    }

    #[test]
    fn test_composites() {
        let registry = Registry::eager().unwrap();
        let level = Section::level("x", 3);
        assert_eq!(registry.probe("file", &level).unwrap(), Class::Container(ContainerKind::Level));
        assert!(matches!(registry.probe("customobjects", &level), Err(Error::Probe { .. })));

        let custom = Section::object("SomethingNew");
        assert_eq!(registry.probe("customobjects", &custom).unwrap(), Class::Object(&GENERIC));
        assert_eq!(registry.probe("file", &custom).unwrap(), Class::Object(&GENERIC));
        assert!(matches!(registry.probe("level", &custom), Err(Error::Probe { .. })));
    }

    #[test]
    fn test_unknown_collection() {
        let registry = Registry::core();
        assert!(matches!(
            registry.probe("nowhere", &Section::object("x")),
            Err(Error::Probe { .. })
        ));
    }
}
