//! Collections and composites

use std::collections::HashMap;

use distance_core::{Error, Result};
use smallvec::SmallVec;

use super::Class;
use crate::fragment::FragmentClass;
use crate::object::ObjectClass;
use crate::section::{Magic, Section, SectionKey};

/// Dynamic fallback prober
pub type ProbeFn = fn(&Section) -> Option<Class>;

/// Result of looking a section up in a collection, before any base-class fallback
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeOutcome {
    Found(Class),
    Miss,
}

/// A registered class and the module that registered it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Registration {
    pub class: Class,
    pub module: &'static str,
}

/// Named set of registrations keyed by section identity
#[derive(Debug)]
pub struct Collection {
    pub name: &'static str,
    keys: HashMap<SectionKey, Registration>,
    funcs: Vec<(ProbeFn, &'static str)>,
    base: Option<Class>,
    probe_baseclass: bool,
}

impl Collection {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            keys: HashMap::new(),
            funcs: Vec::new(),
            base: None,
            probe_baseclass: false,
        }
    }

    /// Set the fallback class and enable base-class probing
    pub fn with_base(mut self, base: Class) -> Self {
        self.set_base(base);
        self
    }

    pub fn set_base(&mut self, base: Class) {
        self.base = Some(base);
        self.probe_baseclass = true;
    }

    pub fn base(&self) -> Option<Class> {
        self.base
    }

    pub fn set_probe_baseclass(&mut self, enabled: bool) {
        self.probe_baseclass = enabled;
    }

    pub fn probe_baseclass(&self) -> bool {
        self.probe_baseclass && self.base.is_some()
    }

    /// Bind `class` to `key`; re-binding the same class is a no-op
    pub fn add_key(&mut self, key: SectionKey, class: Class, module: &'static str) -> Result<()> {
        match self.keys.get(&key) {
            Some(existing) if existing.class == class => Ok(()),
            Some(existing) => Err(Error::register(format!(
                "{key} in collection {} is bound to {}, cannot bind {}",
                self.name,
                existing.class.name(),
                class.name()
            ))),
            None => {
                self.keys.insert(key, Registration { class, module });
                Ok(())
            }
        }
    }

    /// Bind a fragment class to each of its versioned keys, or to its base key
    pub fn add_fragment(&mut self, cls: &'static FragmentClass, module: &'static str) -> Result<()> {
        let base = cls.base_key();
        let versions = cls.versions.list();
        if versions.is_empty() {
            return self.add_key(base, Class::Fragment(cls), module);
        }
        for v in versions {
            self.add_key(base.versioned(v), Class::Fragment(cls), module)?;
        }
        Ok(())
    }

    /// Bind an object class to `(M6, type)`
    pub fn add_object(&mut self, type_name: &str, cls: &'static ObjectClass, module: &'static str) -> Result<()> {
        self.add_key(SectionKey::object(type_name), Class::Object(cls), module)
    }

    pub fn add_func(&mut self, func: ProbeFn, module: &'static str) {
        if !self.funcs.iter().any(|(f, _)| *f as usize == func as usize) {
            self.funcs.push((func, module));
        }
    }

    /// Versioned key, then base key, then each prober in registration order
    pub fn lookup(&self, section: &Section) -> ProbeOutcome {
        let key = section.key();
        if let Some(reg) = self.keys.get(&key) {
            return ProbeOutcome::Found(reg.class);
        }
        if !key.is_base() {
            if let Some(reg) = self.keys.get(&key.base()) {
                return ProbeOutcome::Found(reg.class);
            }
        }
        for (func, _) in &self.funcs {
            if let Some(class) = func(section) {
                return ProbeOutcome::Found(class);
            }
        }
        ProbeOutcome::Miss
    }

    /// [`lookup`](Self::lookup) with the base-class fallback
    pub fn probe(&self, section: &Section) -> Result<Class> {
        match self.lookup(section) {
            ProbeOutcome::Found(class) => Ok(class),
            ProbeOutcome::Miss => match (self.probe_baseclass, self.base) {
                (true, Some(base)) => Ok(base),
                _ => Err(Error::Probe {
                    key: format!("{} in {}", section.key(), self.name),
                }),
            },
        }
    }

    pub fn registrations(&self) -> impl Iterator<Item = (&SectionKey, &Registration)> + '_ {
        self.keys.iter()
    }

    pub fn func_modules(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.funcs.iter().map(|(_, m)| *m)
    }
}

/// Ordered list of collections probed in turn, with a magic blacklist
#[derive(Debug, Clone)]
pub struct Composite {
    pub name: &'static str,
    pub members: Vec<&'static str>,
    pub blacklist: SmallVec<[Magic; 2]>,
}

impl Composite {
    pub fn new(name: &'static str, members: &[&'static str]) -> Self {
        Self {
            name,
            members: members.to_vec(),
            blacklist: SmallVec::new(),
        }
    }

    pub fn reject(mut self, magic: Magic) -> Self {
        self.blacklist.push(magic);
        self
    }

    pub fn is_blacklisted(&self, section: &Section) -> bool {
        self.blacklist.contains(&section.magic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{Repr, Versions, RAW};

    static VERSIONED: FragmentClass = FragmentClass {
        name: "Versioned",
        tag: Some("Versioned"),
        magic: Magic::M2,
        id: 0x10,
        versions: Versions::Range(1, 2),
        repr: Repr::Raw,
        interesting: false,
        module: "test",
    };

    static ANY: FragmentClass = FragmentClass {
        name: "Any",
        tag: Some("Any"),
        magic: Magic::M2,
        id: 0x10,
        versions: Versions::Any(0),
        repr: Repr::Raw,
        interesting: false,
        module: "test",
    };

    fn by_id(section: &Section) -> Option<Class> {
        (section.id() == Some(0x99)).then_some(Class::Fragment(&ANY))
    }

    #[test]
    fn test_probe_order() {
        let mut coll = Collection::new("fragment").with_base(Class::Fragment(&RAW));
        coll.add_fragment(&VERSIONED, "test").unwrap();
        coll.add_fragment(&ANY, "test").unwrap();
        coll.add_func(by_id, "test");

        let probe = |id, v| coll.probe(&Section::component(Magic::M2, id, v)).unwrap();
        assert_eq!(probe(0x10, 2), Class::Fragment(&VERSIONED));
        assert_eq!(probe(0x10, 5), Class::Fragment(&ANY));
        assert_eq!(probe(0x99, 0), Class::Fragment(&ANY));
        assert_eq!(probe(0x11, 0), Class::Fragment(&RAW));
    }

    #[test]
    fn test_probe_error_without_base() {
        let coll = Collection::new("level");
        let err = coll.probe(&Section::object("Thing")).unwrap_err();
        assert!(matches!(err, Error::Probe { .. }));
        assert_eq!(coll.lookup(&Section::object("Thing")), ProbeOutcome::Miss);
    }

    #[test]
    fn test_conflict() {
        let mut coll = Collection::new("fragment");
        coll.add_fragment(&VERSIONED, "test").unwrap();
        coll.add_fragment(&VERSIONED, "test").unwrap();
        let key = SectionKey::component(Magic::M2, 0x10).versioned(1);
        let err = coll.add_key(key, Class::Fragment(&ANY), "test").unwrap_err();
        assert!(matches!(err, Error::Register { .. }));
    }
}
