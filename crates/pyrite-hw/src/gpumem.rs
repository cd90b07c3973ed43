//! Contiguous GPU address space
//!
//! Resource data lives in a flat region the rasterizer addresses by byte
//! offset. Allocation is a monotonic bump: addresses are never recycled, so
//! a stale handle can never alias a newer resource's storage.

use pyrite_core::{GlError, Result};

/// Byte offset of the first allocatable address. Offset zero is reserved so
/// an address of 0 always means "not allocated".
pub const ADDRESS_BASE: u32 = 0x0010_0000;

/// Bump allocator over the GPU-visible address range.
#[derive(Debug)]
pub struct AddressSpace {
    next: u32,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self { next: ADDRESS_BASE }
    }

    /// Allocate `size` bytes aligned to `align` (a power of two).
    ///
    /// Zero-length allocations are rejected rather than given a dummy
    /// address, since an address of 0 marks unallocated storage.
    pub fn alloc(&mut self, size: usize, align: u32) -> Result<u32> {
        if size == 0 {
            return Err(GlError::ZeroAllocation);
        }
        let mask = align.max(1) - 1;
        let addr = (self.next + mask) & !mask;
        self.next = addr + size as u32;
        Ok(addr)
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_is_monotonic() {
        let mut space = AddressSpace::new();
        let a = space.alloc(100, 16).unwrap();
        let b = space.alloc(100, 16).unwrap();
        assert!(b >= a + 100);
    }

    #[test]
    fn test_alloc_alignment() {
        let mut space = AddressSpace::new();
        space.alloc(3, 1).unwrap();
        let a = space.alloc(8, 64).unwrap();
        assert_eq!(a % 64, 0);
    }

    #[test]
    fn test_zero_alloc_rejected() {
        let mut space = AddressSpace::new();
        assert_eq!(space.alloc(0, 16), Err(GlError::ZeroAllocation));
    }
}
