//! DMA address translation
//!
//! The GWCA addresses memory with 40-bit bus addresses. A [`DmaMapper`]
//! turns CPU pointers into bus addresses; platforms with an IOMMU or bounce
//! buffers plug in their own implementation.

/// Largest bus address the descriptors can carry
pub const DMA_ADDR_MASK: u64 = (1 << 40) - 1;

/// Transfer direction of a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaDirection {
    /// Device reads the memory
    ToDevice,
    /// Device writes the memory
    FromDevice,
    /// Descriptor areas: both directions
    Bidirectional,
}

/// CPU-to-bus address translation
pub trait DmaMapper {
    /// Map `len` bytes at `ptr`; `None` if the region cannot be mapped
    fn map(&mut self, ptr: *const u8, len: usize, dir: DmaDirection) -> Option<u64>;

    /// Release a mapping returned by [`DmaMapper::map`]
    fn unmap(&mut self, addr: u64, len: usize, dir: DmaDirection);
}

impl<T: DmaMapper + ?Sized> DmaMapper for &mut T {
    fn map(&mut self, ptr: *const u8, len: usize, dir: DmaDirection) -> Option<u64> {
        (**self).map(ptr, len, dir)
    }

    fn unmap(&mut self, addr: u64, len: usize, dir: DmaDirection) {
        (**self).unmap(addr, len, dir);
    }
}

/// Bus address equals CPU address (no IOMMU, coherent memory)
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl DmaMapper for IdentityMapper {
    fn map(&mut self, ptr: *const u8, _len: usize, _dir: DmaDirection) -> Option<u64> {
        let addr = ptr as usize as u64;
        (addr & !DMA_ADDR_MASK == 0).then_some(addr)
    }

    fn unmap(&mut self, _addr: u64, _len: usize, _dir: DmaDirection) {}
}
