// distance-parsers/src/traits.rs
//! Core traits and options shared by every file entry point.
//!
//! This module establishes the reading interface that enables:
//! - Probing and lazily reading any `.bytes` file through one trait
//! - Memory-mapped reading of large files
//! - Strict reads that surface errors captured during lazy materialization
//! - Writing back through a seekable sink

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use distance_core::{Error, Result, ResultExt};

use crate::bytes::{DstBytes, DstWriter};
use crate::registry::{default_registry, Registry};

/// Configuration options for reading
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Whether to use memory mapping for large files
    pub use_memory_mapping: bool,
    /// Minimum file size to enable memory mapping
    pub memory_mapping_threshold: u64,
    /// Materialize the whole tree after reading and fail on the first captured error
    pub strict: bool,
    /// Maximum nesting depth of child objects
    pub max_nesting_depth: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            use_memory_mapping: true,
            memory_mapping_threshold: 10 * 1024 * 1024, // 10 MB
            strict: false,
            max_nesting_depth: 4096,
        }
    }
}

impl ReadOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }
}

/// Configuration options for writing
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// First identity stamp handed to sections created in memory
    pub first_id: u32,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { first_id: 1 }
    }
}

/// What readers need besides the bytes: the registry, options and the nesting depth
#[derive(Debug, Clone)]
pub struct ReadContext {
    pub registry: Arc<Registry>,
    pub options: ReadOptions,
    depth: usize,
}

impl ReadContext {
    pub fn new(registry: Arc<Registry>, options: ReadOptions) -> Self {
        Self {
            registry,
            options,
            depth: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Context for one level further down
    pub fn nested(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self.clone()
        }
    }

    pub fn too_deep(&self) -> bool {
        self.depth > self.options.max_nesting_depth
    }
}

/// Load a file, memory-mapping it when large enough
pub fn load_source(path: &Path, options: &ReadOptions) -> Result<Bytes> {
    let file = File::open(path)
        .map_err(Error::from)
        .with_context(|| format!("opening {}", path.display()))?;

    if options.use_memory_mapping {
        let metadata = file.metadata()?;
        if metadata.len() >= options.memory_mapping_threshold {
            // SAFETY: the file is treated as read-only for the lifetime of the map
            let mmap = unsafe { memmap2::Mmap::map(&file)? };
            tracing::debug!(path = %path.display(), len = mmap.len(), "memory-mapped source");
            return Ok(Bytes::from_owner(mmap));
        }
    }

    Ok(Bytes::from(std::fs::read(path)?))
}

/// A top-level `.bytes` file kind
///
/// Implementors read one outer section and expose typed accessors over it.
/// Reading is lazy: only the outer framing is touched until the caller asks
/// for more.
pub trait DstFormat: Sized {
    /// Human-readable name of the format
    const NAME: &'static str;

    /// Read from the reader's current position
    fn read_with(r: &mut DstBytes, ctx: &ReadContext) -> Result<Self>;

    /// Write the whole tree
    fn write_to<W: Write + Seek>(&self, w: &mut DstWriter<W>) -> Result<()>;

    /// Pull every lazily read element into memory
    fn materialize_all(&self);

    /// First error captured anywhere in the tree
    fn check_exceptions(&self) -> Result<()>;

    /// Read with the default registry and options
    fn read_from(r: &mut DstBytes) -> Result<Self> {
        let ctx = ReadContext::new(default_registry()?, ReadOptions::default());
        Self::read_with(r, &ctx)
    }

    fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        Self::from_bytes_with(data, default_registry()?, &ReadOptions::default())
    }

    fn from_bytes_with(data: impl Into<Bytes>, registry: Arc<Registry>, options: &ReadOptions) -> Result<Self> {
        let mut r = DstBytes::new(data);
        let ctx = ReadContext::new(registry, options.clone());
        let out = Self::read_with(&mut r, &ctx).with_context(|| format!("reading {}", Self::NAME))?;
        if options.strict {
            out.materialize_all();
            out.check_exceptions()?;
        }
        Ok(out)
    }

    /// Read a file with the default registry and options
    fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, default_registry()?, &ReadOptions::default())
    }

    fn open_with(path: impl AsRef<Path>, registry: Arc<Registry>, options: &ReadOptions) -> Result<Self> {
        let path = path.as_ref();
        let data = load_source(path, options)?;
        Self::from_bytes_with(data, registry, options).with_context(|| path.display().to_string())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_with(&WriteOptions::default())
    }

    fn to_bytes_with(&self, options: &WriteOptions) -> Result<Vec<u8>> {
        let mut w = DstWriter::with_first_id(Cursor::new(Vec::new()), options.first_id);
        self.write_to(&mut w)?;
        Ok(w.into_inner().into_inner())
    }

    /// Write to a file
    fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(Error::from)
            .with_context(|| format!("creating {}", path.display()))?;
        let mut w = DstWriter::new(BufWriter::new(file));
        self.write_to(&mut w)?;
        w.into_inner().flush()?;
        Ok(())
    }
}

/// Trait for converting parsed data to human-readable formats
pub trait HumanReadable {
    /// Convert to a human-readable string representation
    fn to_readable_string(&self) -> String;

    /// Convert to formatted JSON
    fn to_json(&self) -> serde_json::Value;
}
