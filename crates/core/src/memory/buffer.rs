//! Guest RAM buffer.
//!
//! A thin wrapper around raw memory allocation for the sandbox's flat RAM.
//! On Unix the buffer is an anonymous `mmap`, so pages are only materialized
//! by the host OS when the guest actually touches them; large configured RAM
//! sizes cost nothing up front. Other platforms fall back to a `Vec`.

use std::fmt;
use std::slice;

/// Raw backing storage for guest RAM.
///
/// All range checks happen in [`crate::memory::GuestMemory`]; the methods
/// here assert their offsets as a second line of defence, since an
/// out-of-range raw access would be host undefined behavior rather than a
/// guest fault.
pub struct RamBuffer {
    ptr: *mut u8,
    size: usize,
    is_mmap: bool,
}

impl RamBuffer {
    /// Allocates a zeroed buffer of `size` bytes.
    ///
    /// # Panics
    ///
    /// Panics if the host allocation fails.
    pub fn new(size: usize) -> Self {
        #[cfg(unix)]
        {
            use std::ptr;
            // SAFETY: anonymous private mapping with no file descriptor; the
            // result is checked against MAP_FAILED before use.
            let ptr = unsafe {
                libc::mmap(
                    ptr::null_mut(),
                    size,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };

            if ptr == libc::MAP_FAILED {
                panic!("failed to mmap guest RAM of size {size}");
            }

            Self {
                ptr: ptr.cast::<u8>(),
                size,
                is_mmap: true,
            }
        }

        #[cfg(not(unix))]
        {
            let mut vec = vec![0u8; size];
            let ptr = vec.as_mut_ptr();
            std::mem::forget(vec);
            Self {
                ptr,
                size,
                is_mmap: false,
            }
        }
    }

    /// Size of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Borrows `len` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> &[u8] {
        assert!(offset + len <= self.size, "guest RAM read out of bounds");
        // SAFETY: range asserted above; the mapping lives as long as self.
        unsafe { slice::from_raw_parts(self.ptr.add(offset), len) }
    }

    /// Mutably borrows `len` bytes starting at `offset`.
    pub fn slice_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        assert!(offset + len <= self.size, "guest RAM write out of bounds");
        // SAFETY: range asserted above; &mut self guarantees uniqueness.
        unsafe { slice::from_raw_parts_mut(self.ptr.add(offset), len) }
    }

    /// Copies `data` into the buffer at `offset`.
    pub fn write(&mut self, offset: usize, data: &[u8]) {
        self.slice_mut(offset, data.len()).copy_from_slice(data);
    }

    /// Fills `len` bytes at `offset` with `value`.
    pub fn fill(&mut self, offset: usize, len: usize, value: u8) {
        self.slice_mut(offset, len).fill(value);
    }

    /// Moves `len` bytes from `src` to `dst` within the buffer, handling
    /// overlapping ranges like `memmove`.
    pub fn copy_within(&mut self, dst: usize, src: usize, len: usize) {
        assert!(src + len <= self.size, "guest RAM move source out of bounds");
        assert!(dst + len <= self.size, "guest RAM move target out of bounds");
        // SAFETY: both ranges asserted in bounds; ptr::copy permits overlap.
        unsafe {
            std::ptr::copy(self.ptr.add(src), self.ptr.add(dst), len);
        }
    }
}

impl fmt::Debug for RamBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RamBuffer")
            .field("size", &self.size)
            .field("is_mmap", &self.is_mmap)
            .finish_non_exhaustive()
    }
}

impl Drop for RamBuffer {
    fn drop(&mut self) {
        if self.is_mmap {
            #[cfg(unix)]
            // SAFETY: ptr/size describe exactly the mapping created in new().
            unsafe {
                libc::munmap(self.ptr.cast(), self.size);
            }
        } else {
            #[cfg(not(unix))]
            // SAFETY: reconstructs the Vec forgotten in new() to free it.
            unsafe {
                drop(Vec::from_raw_parts(self.ptr, self.size, self.size));
            }
        }
    }
}
