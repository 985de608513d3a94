use std::mem;

use byteorder::{ByteOrder, LittleEndian};

use crate::{leb128, write_err, Result};

// ----------------------------------------------------------------------------
// ByteBufferProvider
// ----------------------------------------------------------------------------

/// Leases the backing storage the writer serializes into. A buffer belongs
/// to exactly one writer at a time; it is handed back through
/// [`release`](ByteBufferProvider::release) on every exit path unless the
/// caller took ownership with [`OutputBuffer::steal_buffer`].
pub trait ByteBufferProvider {
    fn acquire(&self, size_hint: usize) -> Vec<u8>;

    /// Upper bound on buffer growth. Writes past it fail with
    /// `BufferExhausted`.
    fn max_size(&self) -> usize;

    fn release(&self, buffer: Vec<u8>);
}

/// Plain heap-backed provider with an optional growth limit.
pub struct HeapBufferProvider {
    max_size: usize,
}

impl HeapBufferProvider {
    pub fn new() -> Self {
        Self {
            max_size: usize::MAX,
        }
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self { max_size }
    }
}

impl Default for HeapBufferProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteBufferProvider for HeapBufferProvider {
    fn acquire(&self, size_hint: usize) -> Vec<u8> {
        Vec::with_capacity(size_hint.min(self.max_size))
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn release(&self, buffer: Vec<u8>) {
        drop(buffer);
    }
}

// ----------------------------------------------------------------------------
// OutputBuffer
// ----------------------------------------------------------------------------

/// Cursor-addressable little-endian byte sink. The cursor moves freely;
/// writing past the current length grows the storage with zero bytes, which
/// is what makes the reserve-then-backpatch emission patterns work. The
/// high-water mark of written bytes is the end of file.
pub struct OutputBuffer<'p> {
    data: Vec<u8>,
    pos: usize,
    end: usize,
    provider: &'p dyn ByteBufferProvider,
    stolen: bool,
}

impl<'p> OutputBuffer<'p> {
    pub fn new(provider: &'p dyn ByteBufferProvider, size_hint: usize) -> Self {
        Self {
            data: provider.acquire(size_hint),
            pos: 0,
            end: 0,
            provider,
            stolen: false,
        }
    }

    #[inline(always)]
    pub fn position(&self) -> u32 {
        self.pos as u32
    }

    #[inline(always)]
    pub fn end_of_file(&self) -> u32 {
        self.end as u32
    }

    #[inline]
    pub fn move_to(&mut self, position: u32) {
        self.pos = position as usize;
    }

    #[inline]
    pub fn forward(&mut self, amount: u32) {
        self.pos += amount as usize;
    }

    #[inline]
    pub fn rewind(&mut self, amount: u32) {
        debug_assert!(amount as usize <= self.pos);
        self.pos -= amount as usize;
    }

    #[inline(always)]
    pub fn is_aligned(&self, alignment: u32) -> bool {
        self.pos % alignment as usize == 0
    }

    /// Advances to the next `alignment`-aligned position, writing zero
    /// padding, and returns that position.
    pub fn align(&mut self, alignment: u32) -> Result<u32> {
        debug_assert!(alignment.is_power_of_two());
        while !self.is_aligned(alignment) {
            self.write_u8(0)?;
        }
        Ok(self.position())
    }

    /// Everything written so far, up to the end of file.
    #[inline]
    pub fn written(&self) -> &[u8] {
        &self.data[..self.end]
    }

    fn reserve(&mut self, amount: usize) -> Result<()> {
        let required = self.pos + amount;
        if required > self.data.len() {
            if required > self.provider.max_size() {
                return write_err!(BufferExhausted {
                    requested: required,
                    limit: self.provider.max_size(),
                });
            }
            self.data.resize(required, 0);
        }
        Ok(())
    }

    #[inline]
    fn advance(&mut self, amount: usize) {
        self.pos += amount;
        if self.pos > self.end {
            self.end = self.pos;
        }
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.reserve(1)?;
        self.data[self.pos] = value;
        self.advance(1);
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.reserve(2)?;
        LittleEndian::write_u16(&mut self.data[self.pos..self.pos + 2], value);
        self.advance(2);
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.reserve(4)?;
        LittleEndian::write_u32(&mut self.data[self.pos..self.pos + 4], value);
        self.advance(4);
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        self.data[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.advance(bytes.len());
        Ok(())
    }

    pub fn write_uleb128(&mut self, value: u32) -> Result<()> {
        let (bytes, size) = leb128::encode_leb128(value);
        self.write_bytes(&bytes[..size])
    }

    pub fn write_sleb128(&mut self, value: i32) -> Result<()> {
        let (bytes, size) = leb128::encode_sleb128(value);
        self.write_bytes(&bytes[..size])
    }

    pub fn write_uleb128p1(&mut self, value: i32) -> Result<()> {
        let (bytes, size) = leb128::encode_leb128p1(value);
        self.write_bytes(&bytes[..size])
    }

    /// Ends the lease by transferring the storage, truncated to the end of
    /// file, to the caller.
    pub fn steal_buffer(mut self) -> Vec<u8> {
        self.stolen = true;
        let mut data = mem::take(&mut self.data);
        data.truncate(self.end);
        data
    }
}

impl Drop for OutputBuffer<'_> {
    fn drop(&mut self) {
        if !self.stolen {
            self.provider.release(mem::take(&mut self.data));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DexWriteError;

    fn buffer(provider: &HeapBufferProvider) -> OutputBuffer<'_> {
        OutputBuffer::new(provider, 64)
    }

    #[test]
    fn test_little_endian_writes() {
        let provider = HeapBufferProvider::new();
        let mut out = buffer(&provider);
        out.write_u8(0x01).unwrap();
        out.write_u16(0x0302).unwrap();
        out.write_u32(0x07060504).unwrap();
        assert_eq!(out.written(), &[1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_align_pads_with_zeros() {
        let provider = HeapBufferProvider::new();
        let mut out = buffer(&provider);
        out.write_u8(0xff).unwrap();
        let position = out.align(4).unwrap();
        assert_eq!(position, 4);
        assert!(out.is_aligned(4));
        assert_eq!(out.written(), &[0xff, 0, 0, 0]);
    }

    #[test]
    fn test_backpatching() {
        let provider = HeapBufferProvider::new();
        let mut out = buffer(&provider);
        let patch_pos = out.position();
        out.write_u32(0).unwrap();
        out.write_u16(0xbeef).unwrap();
        let end = out.position();
        out.move_to(patch_pos);
        out.write_u32(0xcafe).unwrap();
        out.move_to(end);
        assert_eq!(out.end_of_file(), 6);
        assert_eq!(out.written(), &[0xfe, 0xca, 0, 0, 0xef, 0xbe]);
    }

    #[test]
    fn test_forward_reserves_zeroed_space() {
        let provider = HeapBufferProvider::new();
        let mut out = buffer(&provider);
        out.forward(4);
        out.write_u8(9).unwrap();
        assert_eq!(out.written(), &[0, 0, 0, 0, 9]);
    }

    #[test]
    fn test_exhaustion() {
        let provider = HeapBufferProvider::with_max_size(4);
        let mut out = OutputBuffer::new(&provider, 16);
        out.write_u32(1).unwrap();
        match out.write_u8(2) {
            Err(DexWriteError::BufferExhausted { requested, limit }) => {
                assert_eq!(requested, 5);
                assert_eq!(limit, 4);
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn test_leb128_writes() {
        let provider = HeapBufferProvider::new();
        let mut out = buffer(&provider);
        out.write_uleb128(128).unwrap();
        out.write_sleb128(-1).unwrap();
        out.write_uleb128p1(-1).unwrap();
        assert_eq!(out.written(), &[0x80, 0x01, 0x7f, 0x00]);
    }

    #[test]
    fn test_steal_truncates_to_end() {
        let provider = HeapBufferProvider::new();
        let mut out = buffer(&provider);
        out.write_u32(0xffffffff).unwrap();
        out.move_to(0);
        let data = out.steal_buffer();
        assert_eq!(data.len(), 4);
    }
}
