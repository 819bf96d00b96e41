//! Typed cursor over a shared byte source

use std::io::{Cursor, Read, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use bytes::Bytes;
use distance_core::{Error, Result};

use super::string::decode_utf16le;
use super::MAX_VARINT_LEN;

/// Little-endian reader over a [`Bytes`] source
///
/// Cloning is cheap: the clone shares the source and starts at the same
/// position. An optional read limit makes every read that would cross it fail
/// with a short-read, exactly as if the source ended there.
#[derive(Debug, Clone)]
pub struct DstBytes {
    cursor: Cursor<Bytes>,
    /// Absolute position reads may not cross
    limit: Option<u64>,
}

macro_rules! read_prim {
    ($(#[$doc:meta] $name:ident => $ty:ty, $size:expr, $read:expr;)*) => {
        $(
            #[$doc]
            pub fn $name(&mut self) -> Result<$ty> {
                self.ensure($size)?;
                let read: fn(&mut Cursor<Bytes>) -> std::io::Result<$ty> = $read;
                read(&mut self.cursor).map_err(|_| self.short($size))
            }
        )*
    };
}

impl DstBytes {
    /// Create a reader positioned at the start of `data`
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            cursor: Cursor::new(data.into()),
            limit: None,
        }
    }

    /// The whole backing source
    pub fn source(&self) -> &Bytes {
        self.cursor.get_ref()
    }

    /// An independent reader on the same source, positioned at `pos`, without limit
    pub fn at(&self, pos: u64) -> Self {
        let mut cursor = Cursor::new(self.cursor.get_ref().clone());
        cursor.set_position(pos);
        Self { cursor, limit: None }
    }

    /// Total length of the source
    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    /// Current absolute position
    pub fn tell(&self) -> u64 {
        self.cursor.position()
    }

    /// The position reads may not cross (the active limit or the source end)
    pub fn end(&self) -> u64 {
        match self.limit {
            Some(limit) => limit.min(self.len()),
            None => self.len(),
        }
    }

    /// Bytes left before [`end`](Self::end)
    pub fn remaining(&self) -> u64 {
        self.end().saturating_sub(self.tell())
    }

    /// The active limit, if any
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Move the cursor; positions beyond the end are allowed until the next read
    pub fn seek(&mut self, to: SeekFrom) -> Result<u64> {
        let pos = match to {
            SeekFrom::Start(pos) => pos,
            SeekFrom::Current(delta) => self.tell().checked_add_signed(delta).ok_or_else(|| {
                Error::bad_framing(self.tell(), format!("seek by {delta} leaves the source"))
            })?,
            SeekFrom::End(delta) => self.len().checked_add_signed(delta).ok_or_else(|| {
                Error::bad_framing(self.tell(), format!("seek to end{delta:+} leaves the source"))
            })?,
        };
        self.cursor.set_position(pos);
        Ok(pos)
    }

    /// Absolute seek shorthand
    pub fn seek_to(&mut self, pos: u64) {
        self.cursor.set_position(pos);
    }

    fn short(&self, need: u64) -> Error {
        Error::short_read(self.tell(), need, self.remaining())
    }

    /// Fail with a short-read unless `n` more bytes can be read
    pub fn ensure(&self, n: u64) -> Result<()> {
        if self.tell() > self.end() || self.remaining() < n {
            Err(self.short(n))
        } else {
            Ok(())
        }
    }

    read_prim! {
        /// Read a `u8`
        read_u8 => u8, 1, |c| c.read_u8();
        /// Read a little-endian `u16`
        read_u16 => u16, 2, |c| c.read_u16::<LittleEndian>();
        /// Read a little-endian `u32`
        read_u32 => u32, 4, |c| c.read_u32::<LittleEndian>();
        /// Read a little-endian `u64`
        read_u64 => u64, 8, |c| c.read_u64::<LittleEndian>();
        /// Read an `i8`
        read_i8 => i8, 1, |c| c.read_i8();
        /// Read a little-endian `i16`
        read_i16 => i16, 2, |c| c.read_i16::<LittleEndian>();
        /// Read a little-endian `i32`
        read_i32 => i32, 4, |c| c.read_i32::<LittleEndian>();
        /// Read a little-endian `i64`
        read_i64 => i64, 8, |c| c.read_i64::<LittleEndian>();
        /// Read a little-endian `f32`
        read_f32 => f32, 4, |c| c.read_f32::<LittleEndian>();
        /// Read a little-endian `f64`
        read_f64 => f64, 8, |c| c.read_f64::<LittleEndian>();
    }

    /// Read `n` bytes as a zero-copy slice of the source
    pub fn read_bytes(&mut self, n: u64) -> Result<Bytes> {
        self.ensure(n)?;
        let start = self.tell() as usize;
        let out = self.cursor.get_ref().slice(start..start + n as usize);
        self.cursor.set_position(self.tell() + n);
        Ok(out)
    }

    /// Read a fixed-size array
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure(N as u64)?;
        let mut buf = [0u8; N];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| self.short(N as u64))?;
        Ok(buf)
    }

    /// Look at the next `n` bytes without moving the cursor
    pub fn peek(&self, n: u64) -> Result<Bytes> {
        self.clone().read_bytes(n)
    }

    /// Look at the next `u32` without moving the cursor
    pub fn peek_u32(&self) -> Result<u32> {
        self.clone().read_u32()
    }

    /// Read a 7-bit continuation varint, low group first
    pub fn read_varint(&mut self) -> Result<u64> {
        let start = self.tell();
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            let group = u64::from(byte & 0x7f);
            if i == MAX_VARINT_LEN - 1 && group > 1 {
                return Err(Error::bad_encoding(start, "varint overflows 64 bits"));
            }
            value |= group << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::bad_encoding(
            start,
            format!("varint longer than {MAX_VARINT_LEN} bytes"),
        ))
    }

    /// Read a dst-string: varint byte length, then UTF-16LE
    pub fn read_str(&mut self) -> Result<String> {
        let start = self.tell();
        let len = self.read_varint()?;
        let data = self.read_bytes(len)?;
        decode_utf16le(&data, start)
    }

    /// Run `f` with reads limited to absolute position `end`
    ///
    /// Limits nest: the effective bound is the tighter of `end` and any
    /// enclosing limit. The previous limit is restored afterwards, whether or
    /// not `f` succeeds.
    pub fn with_limit<T>(&mut self, end: u64, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.limit;
        self.limit = Some(match saved {
            Some(outer) => outer.min(end),
            None => end,
        });
        let result = f(self);
        self.limit = saved;
        result
    }

    /// Slice of the source between two absolute positions
    pub fn slice(&self, start: u64, end: u64) -> Result<Bytes> {
        if start > end || end > self.len() {
            return Err(Error::short_read(start, end.saturating_sub(start), self.len().saturating_sub(start)));
        }
        Ok(self.cursor.get_ref().slice(start as usize..end as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives() {
        let mut data = Vec::new();
        data.extend_from_slice(&0x1234_5678u32.to_le_bytes());
        data.extend_from_slice(&(-2i16).to_le_bytes());
        data.extend_from_slice(&1.5f32.to_le_bytes());
        data.push(0xAB);

        let mut r = DstBytes::new(data);
        assert_eq!(r.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(r.read_i16().unwrap(), -2);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert_eq!(r.read_u8().unwrap(), 0xAB);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_short_read() {
        let mut r = DstBytes::new(vec![1u8, 2, 3]);
        let err = r.read_u32().unwrap_err();
        assert!(matches!(err, Error::ShortRead { offset: 0, need: 4, available: 3 }));
    }

    #[test]
    fn test_limit_nesting() {
        let mut r = DstBytes::new(vec![0u8; 16]);
        r.with_limit(8, |r| {
            r.with_limit(12, |r| {
                assert_eq!(r.end(), 8);
                r.read_u64()
            })?;
            assert!(r.read_u8().unwrap_err().is_short_read());
            Ok(())
        })
        .unwrap();
        assert_eq!(r.limit(), None);
        assert_eq!(r.read_u64().unwrap(), 0);
    }

    #[test]
    fn test_peek_does_not_move() {
        let r = DstBytes::new(vec![7u8, 0, 0, 0, 9]);
        assert_eq!(r.peek_u32().unwrap(), 7);
        assert_eq!(r.tell(), 0);
        assert_eq!(&r.peek(5).unwrap()[4..], &[9]);
    }

    #[test]
    fn test_varint() {
        let mut r = DstBytes::new(vec![0xAC, 0x02, 0x05]);
        assert_eq!(r.read_varint().unwrap(), 300);
        assert_eq!(r.read_varint().unwrap(), 5);

        let mut r = DstBytes::new(vec![0xFF; 11]);
        assert!(matches!(r.read_varint(), Err(Error::BadEncoding { .. })));
    }

    #[test]
    fn test_read_bytes_is_slice() {
        let mut r = DstBytes::new(vec![1u8, 2, 3, 4]);
        r.seek(SeekFrom::Current(1)).unwrap();
        let b = r.read_bytes(2).unwrap();
        assert_eq!(&b[..], &[2, 3]);
        assert_eq!(r.tell(), 3);

        let other = r.at(0);
        assert_eq!(other.tell(), 0);
        assert_eq!(r.tell(), 3);
    }
}
