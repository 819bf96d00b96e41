//! Seekable little-endian writer with deferred size slots

use std::io::{Cursor, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use distance_core::Result;

use super::string::encode_utf16le;

/// Placeholder for an 8-byte size that is patched once the section closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "an open size slot must be closed with end_size"]
pub struct SizeSlot {
    /// Absolute position of the slot
    pub pos: u64,
}

impl SizeSlot {
    /// Position right after the slot; the size counts from here
    pub fn body_start(&self) -> u64 {
        self.pos + 8
    }
}

/// Little-endian writer over any `Write + Seek` sink
pub struct DstWriter<W: Write + Seek> {
    inner: W,
    next_id: u32,
}

impl DstWriter<Cursor<Vec<u8>>> {
    /// Writer over a fresh in-memory buffer
    pub fn memory() -> Self {
        Self::new(Cursor::new(Vec::new()))
    }

    /// Finish an in-memory writer
    pub fn into_bytes(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

impl<W: Write + Seek> DstWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_first_id(inner, 1)
    }

    /// Writer whose freshly assigned identity stamps start at `first_id`
    pub fn with_first_id(inner: W, first_id: u32) -> Self {
        Self {
            inner,
            next_id: first_id,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Current absolute position
    pub fn tell(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Hand out the next identity stamp
    pub fn new_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        Ok(self.inner.write_u8(v)?)
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        Ok(self.inner.write_u16::<LittleEndian>(v)?)
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        Ok(self.inner.write_u32::<LittleEndian>(v)?)
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        Ok(self.inner.write_u64::<LittleEndian>(v)?)
    }

    pub fn write_i8(&mut self, v: i8) -> Result<()> {
        Ok(self.inner.write_i8(v)?)
    }

    pub fn write_i16(&mut self, v: i16) -> Result<()> {
        Ok(self.inner.write_i16::<LittleEndian>(v)?)
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        Ok(self.inner.write_i32::<LittleEndian>(v)?)
    }

    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        Ok(self.inner.write_i64::<LittleEndian>(v)?)
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        Ok(self.inner.write_f32::<LittleEndian>(v)?)
    }

    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        Ok(self.inner.write_f64::<LittleEndian>(v)?)
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        Ok(self.inner.write_all(data)?)
    }

    /// Write a 7-bit continuation varint, low group first
    pub fn write_varint(&mut self, mut v: u64) -> Result<()> {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                return self.write_u8(byte);
            }
            self.write_u8(byte | 0x80)?;
        }
    }

    /// Write a dst-string
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        let payload = encode_utf16le(s);
        self.write_varint(payload.len() as u64)?;
        self.write_bytes(&payload)
    }

    /// Reserve an 8-byte size slot
    pub fn begin_size(&mut self) -> Result<SizeSlot> {
        let pos = self.tell()?;
        self.write_u64(0)?;
        Ok(SizeSlot { pos })
    }

    /// Patch `slot` with the number of bytes written since it; returns the end position
    pub fn end_size(&mut self, slot: SizeSlot) -> Result<u64> {
        let end = self.tell()?;
        let size = end.saturating_sub(slot.body_start());
        self.inner.seek(SeekFrom::Start(slot.pos))?;
        self.write_u64(size)?;
        self.inner.seek(SeekFrom::Start(end))?;
        Ok(end)
    }

    /// Run `f` inside a size slot
    pub fn write_size<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let slot = self.begin_size()?;
        let out = f(self)?;
        self.end_size(slot)?;
        Ok(out)
    }
}
