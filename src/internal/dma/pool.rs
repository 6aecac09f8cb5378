//! Statically allocated DMA buffers.
//!
//! RX buffers are bound 1:1 to RX ring slots for the life of the ring. TX
//! frames are sent from the caller's memory; only the unaligned head of each
//! frame is copied into a small per-slot staging area so the mapped
//! remainder starts on a `TX_ALIGN` boundary.

use super::descriptor::Descriptor;
use crate::driver::error::{DmaError, DmaResult};
use crate::hal::dma_map::{DmaDirection, DmaMapper};
use crate::internal::constants::{MAX_DESC_SIZE, MIN_TX_PREFIX, TX_ALIGN, TX_STAGING_STRIDE};
use crate::internal::log::rs_warn;

// =============================================================================
// RX buffers
// =============================================================================

/// One receive buffer per RX slot
pub struct RxBufferPool<const N: usize, const BUF_SIZE: usize> {
    buffers: [[u8; BUF_SIZE]; N],
    mapped: [Option<u64>; N],
}

impl<const N: usize, const BUF_SIZE: usize> RxBufferPool<N, BUF_SIZE> {
    /// Length advertised to hardware for each buffer
    pub const DESC_LEN: usize = if BUF_SIZE < MAX_DESC_SIZE {
        BUF_SIZE
    } else {
        MAX_DESC_SIZE
    };

    /// Create an unmapped pool. Const-compatible.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffers: [[0u8; BUF_SIZE]; N],
            mapped: [None; N],
        }
    }

    /// Map every buffer; returns how many could not be mapped.
    ///
    /// Unmapped buffers are still bound, with length 0, so the slot keeps
    /// its place in the ring.
    pub fn map_all<M: DmaMapper>(&mut self, mapper: &mut M) -> usize {
        let mut failures = 0;
        for (buffer, mapped) in self.buffers.iter().zip(self.mapped.iter_mut()) {
            if mapped.is_some() {
                continue;
            }
            *mapped = mapper.map(buffer.as_ptr(), BUF_SIZE, DmaDirection::FromDevice);
            if mapped.is_none() {
                failures += 1;
            }
        }
        if failures > 0 {
            rs_warn!("{} rx buffers unmapped, posting zero-length", failures);
        }
        failures
    }

    /// Release every mapping
    pub fn unmap_all<M: DmaMapper>(&mut self, mapper: &mut M) {
        for mapped in &mut self.mapped {
            if let Some(addr) = mapped.take() {
                mapper.unmap(addr, BUF_SIZE, DmaDirection::FromDevice);
            }
        }
    }

    /// Point a descriptor at the buffer of `index`
    pub fn bind<D: Descriptor>(&self, index: usize, desc: &D) {
        let base = desc.base();
        match self.mapped[index] {
            Some(addr) => {
                base.set_addr(addr);
                base.set_size(Self::DESC_LEN);
            }
            None => {
                base.set_addr(0);
                base.set_size(0);
            }
        }
    }

    /// Whether the buffer of `index` is mapped
    #[inline(always)]
    #[must_use]
    pub fn is_mapped(&self, index: usize) -> bool {
        self.mapped[index].is_some()
    }

    /// Received bytes of slot `index`
    #[inline(always)]
    #[must_use]
    pub fn buffer(&self, index: usize) -> &[u8] {
        &self.buffers[index]
    }

    /// Hardware side: fill a buffer.
    #[cfg(test)]
    pub(crate) fn buffer_mut(&mut self, index: usize) -> &mut [u8] {
        &mut self.buffers[index]
    }
}

impl<const N: usize, const BUF_SIZE: usize> Default for RxBufferPool<N, BUF_SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TX staging
// =============================================================================

/// Bytes copied to staging for a frame starting at `addr`
///
/// The remainder then starts aligned, and the staged part is never shorter
/// than `MIN_TX_PREFIX` because a zero-length descriptor ends the TX DMA.
#[inline(always)]
#[must_use]
pub const fn tx_prefix_len(addr: usize) -> usize {
    let prefix = (TX_ALIGN - addr % TX_ALIGN) % TX_ALIGN;
    if prefix < MIN_TX_PREFIX {
        prefix + TX_ALIGN
    } else {
        prefix
    }
}

#[repr(C, align(8))]
struct StagingSlot([u8; TX_STAGING_STRIDE]);

/// Per-slot aligned staging area for frame heads
pub struct TxStaging<const N: usize> {
    slots: [StagingSlot; N],
    base: Option<u64>,
}

impl<const N: usize> TxStaging<N> {
    /// Create an unmapped staging area. Const-compatible.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [const { StagingSlot([0; TX_STAGING_STRIDE]) }; N],
            base: None,
        }
    }

    /// Map the whole staging area
    pub fn map<M: DmaMapper>(&mut self, mapper: &mut M) -> DmaResult<()> {
        if self.base.is_some() {
            return Ok(());
        }
        let ptr = self.slots.as_ptr().cast::<u8>();
        let base = mapper
            .map(ptr, N * TX_STAGING_STRIDE, DmaDirection::ToDevice)
            .ok_or(DmaError::MappingFailed)?;
        self.base = Some(base);
        Ok(())
    }

    /// Release the staging mapping
    pub fn unmap<M: DmaMapper>(&mut self, mapper: &mut M) {
        if let Some(base) = self.base.take() {
            mapper.unmap(base, N * TX_STAGING_STRIDE, DmaDirection::ToDevice);
        }
    }

    /// Copy `bytes` into slot `index`; returns the bus address of the copy
    pub fn stage(&mut self, index: usize, bytes: &[u8]) -> DmaResult<u64> {
        let base = self.base.ok_or(DmaError::MappingFailed)?;
        let slot = &mut self.slots[index].0;
        if bytes.len() > slot.len() {
            return Err(DmaError::FrameTooLarge);
        }
        slot[..bytes.len()].copy_from_slice(bytes);
        Ok(base + (index * TX_STAGING_STRIDE) as u64)
    }

    /// Staged bytes of slot `index`
    #[cfg(test)]
    pub(crate) fn staged(&self, index: usize) -> &[u8] {
        &self.slots[index].0
    }
}

impl<const N: usize> Default for TxStaging<N> {
    fn default() -> Self {
        Self::new()
    }
}
