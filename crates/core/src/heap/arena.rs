//! First-fit free-list arena.
//!
//! Allocates 16-byte-aligned ranges out of `[base, end)`. Failures are
//! guest-visible soft errors: `malloc` returns 0 and `free` returns -1, per
//! the syscall result convention. The chunk list is kept address-sorted so
//! freed neighbors coalesce.

/// Alignment of every allocation, matching the platform ABI's stack and
/// malloc alignment.
const ALIGNMENT: u64 = 16;

#[derive(Clone, Copy, Debug)]
struct Chunk {
    addr: u64,
    size: u64,
    free: bool,
}

/// An address-range allocator over one contiguous guest region.
#[derive(Debug)]
pub struct Arena {
    chunks: Vec<Chunk>,
    total: u64,
}

impl Arena {
    /// Creates an arena serving addresses in `[base, end)`.
    pub fn new(base: u64, end: u64) -> Self {
        let total = end.saturating_sub(base);
        Self {
            chunks: vec![Chunk {
                addr: base,
                size: total,
                free: true,
            }],
            total,
        }
    }

    /// Allocates `size` bytes, rounded up to the arena alignment.
    ///
    /// Returns the guest address, or 0 when no free range fits.
    pub fn malloc(&mut self, size: u64) -> u64 {
        let Some(size) = size.max(1).checked_next_multiple_of(ALIGNMENT) else {
            return 0;
        };
        let Some(index) = self
            .chunks
            .iter()
            .position(|c| c.free && c.size >= size)
        else {
            return 0;
        };
        let addr = self.chunks[index].addr;
        let remainder = self.chunks[index].size - size;
        self.chunks[index].size = size;
        self.chunks[index].free = false;
        if remainder > 0 {
            self.chunks.insert(
                index + 1,
                Chunk {
                    addr: addr + size,
                    size: remainder,
                    free: true,
                },
            );
        }
        addr
    }

    /// Frees the allocation starting exactly at `addr`.
    ///
    /// Returns 0 on success and -1 when `addr` is not a live allocation.
    pub fn free(&mut self, addr: u64) -> i32 {
        let Some(index) = self
            .chunks
            .iter()
            .position(|c| !c.free && c.addr == addr)
        else {
            return -1;
        };
        self.chunks[index].free = true;
        // Coalesce with the right neighbor first so indices stay valid.
        if index + 1 < self.chunks.len() && self.chunks[index + 1].free {
            self.chunks[index].size += self.chunks[index + 1].size;
            self.chunks.remove(index + 1);
        }
        if index > 0 && self.chunks[index - 1].free {
            self.chunks[index - 1].size += self.chunks[index].size;
            self.chunks.remove(index);
        }
        0
    }

    /// Total bytes currently free.
    pub fn bytes_free(&self) -> u64 {
        self.chunks.iter().filter(|c| c.free).map(|c| c.size).sum()
    }

    /// Total bytes currently allocated.
    pub fn bytes_used(&self) -> u64 {
        self.total - self.bytes_free()
    }

    /// Number of live allocations.
    pub fn chunks_used(&self) -> u64 {
        self.chunks.iter().filter(|c| !c.free).count() as u64
    }
}
