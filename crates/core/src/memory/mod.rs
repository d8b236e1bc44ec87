//! Guest memory subsystem.
//!
//! This module implements the bounds-checked view of guest RAM the rest of
//! the machine goes through. It provides:
//! 1. **Typed Access:** Little-endian reads and writes of bytes, u32/u64, and
//!    width-sized guest words.
//! 2. **Block Operations:** Fill, copy, and overlapping move used by the bulk
//!    memory syscalls, plus a zero-copy range view for trusted mode.
//! 3. **Image Retention:** The raw ELF file bytes stay available for
//!    file-offset lookups (program headers during bootstrap).

/// Raw mmap-backed storage.
pub mod buffer;

use std::fmt;
use std::marker::PhantomData;

use crate::common::error::VmError;
use crate::common::width::Width;

use buffer::RamBuffer;

/// Bounds-checked guest RAM of width `W`, plus the retained ELF image.
///
/// The address space is flat: `[0, size)`. Every access validates its full
/// range first and fails with [`VmError::OutOfBounds`] on untrusted guest
/// addresses; nothing here can fault the host.
pub struct GuestMemory<W: Width> {
    ram: RamBuffer,
    size: u64,
    image: Vec<u8>,
    _width: PhantomData<W>,
}

impl<W: Width> fmt::Debug for GuestMemory<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // RAM contents are megabytes of mostly zero bytes; report sizes only.
        f.debug_struct("GuestMemory")
            .field("size", &self.size)
            .field("image_len", &self.image.len())
            .finish_non_exhaustive()
    }
}

impl<W: Width> GuestMemory<W> {
    /// Allocates zeroed guest RAM of `size` bytes, retaining `image` for
    /// file-offset lookups.
    pub fn new(size: u64, image: Vec<u8>) -> Self {
        Self {
            ram: RamBuffer::new(size as usize),
            size,
            image,
            _width: PhantomData,
        }
    }

    /// Size of guest RAM in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The raw bytes of the loaded ELF image, addressed by file offset.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    fn offset(&self, addr: u64, len: u64) -> Result<usize, VmError> {
        let addr = W::truncate(addr);
        match addr.checked_add(len) {
            Some(end) if end <= self.size => Ok(addr as usize),
            _ => Err(VmError::OutOfBounds { addr, len }),
        }
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns [`VmError::OutOfBounds`] when the address is outside RAM;
    /// likewise for every other accessor below.
    pub fn read_u8(&self, addr: u64) -> Result<u8, VmError> {
        let off = self.offset(addr, 1)?;
        Ok(self.ram.slice(off, 1)[0])
    }

    /// Writes one byte.
    pub fn write_u8(&mut self, addr: u64, value: u8) -> Result<(), VmError> {
        let off = self.offset(addr, 1)?;
        self.ram.write(off, &[value]);
        Ok(())
    }

    /// Reads a little-endian u32.
    pub fn read_u32(&self, addr: u64) -> Result<u32, VmError> {
        let off = self.offset(addr, 4)?;
        let b = self.ram.slice(off, 4);
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Writes a little-endian u32.
    pub fn write_u32(&mut self, addr: u64, value: u32) -> Result<(), VmError> {
        let off = self.offset(addr, 4)?;
        self.ram.write(off, &value.to_le_bytes());
        Ok(())
    }

    /// Reads a little-endian u64.
    pub fn read_u64(&self, addr: u64) -> Result<u64, VmError> {
        let off = self.offset(addr, 8)?;
        let b = self.ram.slice(off, 8);
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    /// Writes a little-endian u64.
    pub fn write_u64(&mut self, addr: u64, value: u64) -> Result<(), VmError> {
        let off = self.offset(addr, 8)?;
        self.ram.write(off, &value.to_le_bytes());
        Ok(())
    }

    /// Reads one guest word (4 or 8 bytes by width), zero-extended.
    pub fn read_word(&self, addr: u64) -> Result<u64, VmError> {
        if W::WORD_BYTES == 4 {
            Ok(u64::from(self.read_u32(addr)?))
        } else {
            self.read_u64(addr)
        }
    }

    /// Writes one guest word (4 or 8 bytes by width), truncating `value`.
    pub fn write_word(&mut self, addr: u64, value: u64) -> Result<(), VmError> {
        if W::WORD_BYTES == 4 {
            self.write_u32(addr, value as u32)
        } else {
            self.write_u64(addr, value)
        }
    }

    /// Copies `data` into guest RAM at `addr`.
    pub fn write_bytes(&mut self, addr: u64, data: &[u8]) -> Result<(), VmError> {
        let off = self.offset(addr, data.len() as u64)?;
        self.ram.write(off, data);
        Ok(())
    }

    /// Copies `len` bytes starting at `addr` out of guest RAM.
    pub fn read_bytes(&self, addr: u64, len: u64) -> Result<Vec<u8>, VmError> {
        let off = self.offset(addr, len)?;
        Ok(self.ram.slice(off, len as usize).to_vec())
    }

    /// Fills `len` bytes at `addr` with `value`.
    pub fn fill(&mut self, addr: u64, len: u64, value: u8) -> Result<(), VmError> {
        let off = self.offset(addr, len)?;
        self.ram.fill(off, len as usize, value);
        Ok(())
    }

    /// Moves `len` bytes from `src` to `dst`, handling overlap like `memmove`.
    pub fn copy_within(&mut self, dst: u64, src: u64, len: u64) -> Result<(), VmError> {
        let src_off = self.offset(src, len)?;
        let dst_off = self.offset(dst, len)?;
        self.ram.copy_within(dst_off, src_off, len as usize);
        Ok(())
    }

    /// Runs `f` over a zero-copy view of `len` bytes at `addr`.
    ///
    /// This is the bulk read path for trusted memory mode: no intermediate
    /// buffer is allocated.
    pub fn view<R>(&self, addr: u64, len: u64, f: impl FnOnce(&[u8]) -> R) -> Result<R, VmError> {
        let off = self.offset(addr, len)?;
        Ok(f(self.ram.slice(off, len as usize)))
    }

    /// Reads a NUL-terminated string starting at `addr`.
    ///
    /// Scans at most `max` bytes; the terminator must lie inside RAM.
    pub fn read_cstring(&self, addr: u64, max: u64) -> Result<String, VmError> {
        let mut bytes = Vec::new();
        let mut cursor = addr;
        while cursor < addr + max {
            let b = self.read_u8(cursor)?;
            if b == 0 {
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
            bytes.push(b);
            cursor += 1;
        }
        Err(VmError::OutOfBounds { addr, len: max })
    }

    /// Copies `len` bytes of the retained ELF image (from file offset
    /// `offset`) into guest RAM at `addr`. Used by the segment loader.
    pub fn load_from_image(&mut self, addr: u64, offset: u64, len: u64) -> Result<(), VmError> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.image.len() as u64)
            .ok_or(VmError::OutOfBounds { addr: offset, len })?;
        let ram_off = self.offset(addr, len)?;
        self.ram.write(ram_off, &self.image[offset as usize..end as usize]);
        Ok(())
    }
}
