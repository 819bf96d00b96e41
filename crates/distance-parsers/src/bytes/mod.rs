//! Byte stream: typed cursor reader and seekable writer
//!
//! All multi-byte values are little-endian.
//!
//! | Type        | Bytes                    | Notes |
//! |-------------|--------------------------|-------|
//! | `u8`..`u64` | 1, 2, 4, 8               | unsigned |
//! | `i8`..`i64` | 1, 2, 4, 8               | signed |
//! | `f32`/`f64` | 4, 8                     | IEEE 754, bit patterns preserved |
//! | varint      | 1..=10                   | 7 bits per byte, low group first, high bit = continue |
//! | dst-string  | varint + `len` bytes     | `len` counts bytes of UTF-16LE payload |
//!
//! The reader works over a shared [`bytes::Bytes`] source so lazily parsed
//! elements can keep a cheap handle to it and slice raw bodies without copying.
//! The writer needs `Write + Seek` because section sizes are written as
//! placeholders and patched when the section closes.

mod reader;
mod string;
mod writer;

pub use reader::DstBytes;
pub use string::{decode_utf16le, encode_utf16le, SURROGATE_ESCAPE_BASE, SURROGATE_ESCAPE_MARKER};
pub use writer::{DstWriter, SizeSlot};

/// Longest varint accepted (enough for a `u64`)
pub const MAX_VARINT_LEN: usize = 10;
