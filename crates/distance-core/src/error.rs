//! Unified error handling for the Distance codec
//!
//! This module provides the single error type used across the byte stream,
//! the section framer, the class registry and the object model.
//!
//! Errors are `Clone` so that a failure hit during lazy materialization can be
//! captured on the offending element and re-raised later by an explicit
//! `check_exceptions` walk.

use std::sync::Arc;
use thiserror::Error;

/// Unified error type for all codec operations
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ==================== I/O Errors ====================

    /// Underlying source or sink failed
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// Fewer bytes were available than requested, or a read limit was crossed
    #[error("Short read at offset {offset}: need {need} bytes, {available} available")]
    ShortRead {
        offset: u64,
        need: u64,
        available: u64,
    },

    // ==================== Format Errors ====================

    /// A section header is inconsistent or carries an unknown magic
    #[error("Bad framing at offset {offset}: {message}")]
    BadFraming {
        offset: u64,
        message: String,
    },

    /// A dst-string or varint could not be decoded
    #[error("Bad encoding at offset {offset}: {message}")]
    BadEncoding {
        offset: u64,
        message: String,
    },

    // ==================== Registry Errors ====================

    /// No class could be resolved for a section
    #[error("No class registered for section {key}")]
    Probe {
        key: String,
    },

    /// The tag is not known to the registry
    #[error("Unknown tag: {tag}")]
    Tag {
        tag: String,
    },

    /// The tag is known but has no implementation for the requested version
    #[error("Tag {tag} has no implementation for version {version:?}")]
    ClassLookup {
        tag: String,
        version: Option<u32>,
    },

    /// Two registrations disagree about the same key
    #[error("Registration conflict: {message}")]
    Register {
        message: String,
    },

    // ==================== Model Errors ====================

    /// Transform composition is not representable
    #[error("Transform error: {message}")]
    Transform {
        message: String,
    },

    /// A tag lookup on an object failed
    #[error("{}", describe_fragment_key(.tag, .is_present))]
    FragmentKey {
        tag: String,
        is_present: bool,
    },

    /// A value does not fit the codec it is written with
    #[error("Value out of range for {codec}: {value}")]
    ValueOutOfRange {
        codec: &'static str,
        value: String,
    },

    /// A typed value does not match the shape of its schema field
    #[error("Schema mismatch for field '{field}': {message}")]
    Schema {
        field: String,
        message: String,
    },

    // ==================== General Errors ====================

    /// Error with additional context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

fn describe_fragment_key(tag: &str, is_present: &bool) -> String {
    if *is_present {
        format!("Fragment {tag} is present but its version is not implemented")
    } else {
        format!("Fragment {tag} is not present")
    }
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::ShortRead {
                offset: 0,
                need: 0,
                available: 0,
            }
        } else {
            Error::Io(Arc::new(err))
        }
    }
}

impl Error {
    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a short-read error
    pub fn short_read(offset: u64, need: u64, available: u64) -> Self {
        Error::ShortRead {
            offset,
            need,
            available,
        }
    }

    /// Create a bad-framing error
    pub fn bad_framing(offset: u64, message: impl Into<String>) -> Self {
        Error::BadFraming {
            offset,
            message: message.into(),
        }
    }

    /// Create a bad-encoding error
    pub fn bad_encoding(offset: u64, message: impl Into<String>) -> Self {
        Error::BadEncoding {
            offset,
            message: message.into(),
        }
    }

    /// Create a registration conflict error
    pub fn register(message: impl Into<String>) -> Self {
        Error::Register {
            message: message.into(),
        }
    }

    /// Create a schema mismatch error
    pub fn schema(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Schema {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The innermost error, skipping any context wrappers
    pub fn root(&self) -> &Error {
        let mut err = self;
        while let Error::WithContext { source, .. } = err {
            err = source;
        }
        err
    }

    /// Check if this is a short read
    pub fn is_short_read(&self) -> bool {
        matches!(self.root(), Error::ShortRead { .. })
    }

    /// Check if this is a framing or encoding error
    pub fn is_framing_error(&self) -> bool {
        matches!(
            self.root(),
            Error::ShortRead { .. } | Error::BadFraming { .. } | Error::BadEncoding { .. }
        )
    }

    /// Check if this error comes from misusing the registry
    pub fn is_registry_error(&self) -> bool {
        matches!(
            self.root(),
            Error::Probe { .. } | Error::Tag { .. } | Error::ClassLookup { .. } | Error::Register { .. }
        )
    }

    /// For fragment-key errors, whether the fragment was present
    pub fn fragment_is_present(&self) -> Option<bool> {
        match self.root() {
            Error::FragmentKey { is_present, .. } => Some(*is_present),
            _ => None,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
