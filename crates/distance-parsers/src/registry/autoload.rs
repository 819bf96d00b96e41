//! Autoload manifests
//!
//! A manifest records which implementation module registers each key, tag
//! and fallback prober, so that a registry can defer running a module until
//! something asks for one of its classes. It is stored as JSON:
//!
//! ```json
//! {
//!   "keys": [{ "collection": "fragment", "key": { ... }, "module": "fragments::base" }],
//!   "funcs": [{ "collection": "level_objects", "module": "objects::base" }],
//!   "tags": [{ "tag": "Group", "module": "fragments::base" }]
//! }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use distance_core::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};

use super::Registrar;
use crate::section::{Magic, SectionKey};
use crate::{fragments, objects};

/// A named group of registrations
#[derive(Debug, Clone, Copy)]
pub struct Module {
    pub name: &'static str,
    pub register: fn(&mut Registrar<'_>) -> Result<()>,
}

/// Every implementation module, in load order
pub static MODULES: &[Module] = &[
    Module {
        name: "fragments::base",
        register: fragments::base::register,
    },
    Module {
        name: "fragments::animation",
        register: fragments::animation::register,
    },
    Module {
        name: "fragments::triggers",
        register: fragments::triggers::register,
    },
    Module {
        name: "fragments::levelsettings",
        register: fragments::levelsettings::register,
    },
    Module {
        name: "fragments::files",
        register: fragments::files::register,
    },
    Module {
        name: "fragments::profile",
        register: fragments::profile::register,
    },
    Module {
        name: "objects::base",
        register: objects::base::register,
    },
    Module {
        name: "objects::triggers",
        register: objects::triggers::register,
    },
    Module {
        name: "objects::levelsettings",
        register: objects::levelsettings::register,
    },
    Module {
        name: "objects::files",
        register: objects::files::register,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyEntry {
    pub collection: String,
    pub key: SectionKey,
    pub module: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FuncEntry {
    pub collection: String,
    pub module: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagEntry {
    pub tag: String,
    pub module: String,
}

/// Which module provides each key, prober and tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub keys: Vec<KeyEntry>,
    #[serde(default)]
    pub funcs: Vec<FuncEntry>,
    #[serde(default)]
    pub tags: Vec<TagEntry>,
}

fn json_error(err: serde_json::Error) -> Error {
    Error::from(std::io::Error::from(err))
}

impl Manifest {
    pub fn add_key(&mut self, collection: &str, key: SectionKey, module: &str) {
        self.keys.push(KeyEntry {
            collection: collection.to_owned(),
            key,
            module: module.to_owned(),
        });
    }

    pub fn add_func(&mut self, collection: &str, module: &str) {
        self.funcs.push(FuncEntry {
            collection: collection.to_owned(),
            module: module.to_owned(),
        });
    }

    pub fn add_tag(&mut self, tag: &str, module: &str) {
        self.tags.push(TagEntry {
            tag: tag.to_owned(),
            module: module.to_owned(),
        });
    }

    /// Sort and deduplicate every list
    pub fn normalize(&mut self) {
        self.keys.sort();
        self.keys.dedup();
        self.funcs.sort();
        self.funcs.dedup();
        self.tags.sort();
        self.tags.dedup();
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let mut manifest: Manifest = serde_json::from_str(text).map_err(json_error)?;
        manifest.normalize();
        Ok(manifest)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(json_error)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(Error::from)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        Self::from_json(&text)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()? + "\n")
            .map_err(Error::from)
            .with_context(|| format!("writing manifest {}", path.display()))
    }

    /// Differences between this manifest and one exported from an eager registry
    ///
    /// An empty list means the manifest is up to date.
    pub fn check(&self, eager: &Manifest) -> Vec<String> {
        let mut problems = Vec::new();
        diff(&mut problems, "key", &self.keys, &eager.keys, |e| {
            format!("{} in {} -> {}", e.key, e.collection, e.module)
        });
        diff(&mut problems, "prober", &self.funcs, &eager.funcs, |e| {
            format!("{} -> {}", e.collection, e.module)
        });
        diff(&mut problems, "tag", &self.tags, &eager.tags, |e| format!("{} -> {}", e.tag, e.module));
        problems
    }

    pub fn modules(&self) -> BTreeSet<&str> {
        self.keys
            .iter()
            .map(|e| e.module.as_str())
            .chain(self.funcs.iter().map(|e| e.module.as_str()))
            .chain(self.tags.iter().map(|e| e.module.as_str()))
            .collect()
    }
}

fn diff<T: Ord>(problems: &mut Vec<String>, what: &str, stored: &[T], eager: &[T], show: impl Fn(&T) -> String) {
    let stored: BTreeSet<&T> = stored.iter().collect();
    let eager: BTreeSet<&T> = eager.iter().collect();
    for missing in eager.difference(&stored) {
        problems.push(format!("missing {what}: {}", show(missing)));
    }
    for stale in stored.difference(&eager) {
        problems.push(format!("stale {what}: {}", show(stale)));
    }
}

/// Manifest index used by a lazily loading registry
#[derive(Debug)]
pub(crate) struct Autoload {
    keys: HashMap<(String, SectionKey), Vec<&'static str>>,
    funcs: HashMap<String, Vec<&'static str>>,
    tags: HashMap<String, Vec<&'static str>>,
}

fn module_name(name: &str) -> Result<&'static str> {
    MODULES
        .iter()
        .find(|m| m.name == name)
        .map(|m| m.name)
        .ok_or_else(|| Error::register(format!("manifest names unknown module {name}")))
}

impl Autoload {
    pub(crate) fn new(manifest: Manifest) -> Result<Self> {
        let mut index = Self {
            keys: HashMap::new(),
            funcs: HashMap::new(),
            tags: HashMap::new(),
        };
        for entry in manifest.keys {
            let module = module_name(&entry.module)?;
            push_unique(index.keys.entry((entry.collection, entry.key)).or_default(), module);
        }
        for entry in manifest.funcs {
            let module = module_name(&entry.module)?;
            push_unique(index.funcs.entry(entry.collection).or_default(), module);
        }
        for entry in manifest.tags {
            let module = module_name(&entry.module)?;
            push_unique(index.tags.entry(entry.tag).or_default(), module);
        }
        Ok(index)
    }

    pub(crate) fn modules_for_key(&self, collection: &str, key: &SectionKey) -> Vec<&'static str> {
        self.keys
            .get(&(collection.to_owned(), key.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// Modules binding an object key in any collection, plus every object prober
    pub(crate) fn modules_for_object(&self, key: &SectionKey) -> Vec<&'static str> {
        let mut modules = Vec::new();
        for ((_, k), found) in &self.keys {
            if k == key && k.magic == Magic::M6 {
                for m in found {
                    push_unique(&mut modules, *m);
                }
            }
        }
        if modules.is_empty() {
            for found in self.funcs.values() {
                for m in found {
                    push_unique(&mut modules, *m);
                }
            }
        }
        modules
    }

    pub(crate) fn func_modules(&self, collection: &str) -> Vec<&'static str> {
        self.funcs.get(collection).cloned().unwrap_or_default()
    }

    pub(crate) fn modules_for_tag(&self, tag: &str) -> Vec<&'static str> {
        self.tags.get(tag).cloned().unwrap_or_default()
    }
}

fn push_unique(list: &mut Vec<&'static str>, module: &'static str) {
    if !list.contains(&module) {
        list.push(module);
    }
}
