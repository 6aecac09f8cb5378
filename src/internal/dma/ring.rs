//! Circular GWCA descriptor ring.
//!
//! `N` data slots are followed in memory by one link descriptor pointing
//! back at slot 0, so hardware walks the chain forever. `cur` and `dirty`
//! only ever increase (wrapping); the slot index is the counter modulo `N`.
//!
//! TX rings use `produce`/`publish` on the `cur` side and `reap` on the
//! `dirty` side. RX and timestamp rings consume at `cur` with `poll_rx` and
//! re-arm at `dirty` with `refill`.

use embedded_hal::delay::DelayNs;

use super::descriptor::{DescType, Descriptor};
use crate::driver::error::{ConfigError, ConfigResult, DmaError, DmaResult};
use crate::hal::dma_map::{DmaDirection, DmaMapper};
use crate::hal::learn::{PollPolicy, request_and_wait};
use crate::hal::mmio::{RegisterBus, Registers};
use crate::internal::constants::{MAX_RING_SIZE, MIN_RING_SIZE};
use crate::internal::log::{rs_debug, rs_warn};
use crate::internal::register::Reg;
use crate::internal::register::gwca::{DESC_ADDR_HI_MASK, DESC_LEARN_CHAIN_MASK, DESC_LEARN_REQ};

/// Data slots followed by the link descriptor, contiguous in memory
#[repr(C)]
struct RingStorage<D, const N: usize> {
    slots: [D; N],
    link: D,
}

/// Circular descriptor ring with a trailing link descriptor.
pub struct DescriptorRing<D: Descriptor, const N: usize> {
    storage: RingStorage<D, N>,
    /// Next slot to produce (TX) or consume (RX)
    cur: usize,
    /// Next slot to reap (TX) or refill (RX)
    dirty: usize,
    /// Bus address of slot 0, once mapped
    base: Option<u64>,
    /// Times the link descriptor had to be rewritten
    link_repairs: u32,
}

impl<D: Descriptor, const N: usize> DescriptorRing<D, N> {
    /// Size of the descriptor area in bytes, link included
    pub const AREA_SIZE: usize = core::mem::size_of::<RingStorage<D, N>>();

    /// Create an unmapped ring. Const-compatible.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            storage: RingStorage {
                slots: [const { D::ZEROED }; N],
                link: D::ZEROED,
            },
            cur: 0,
            dirty: 0,
            base: None,
            link_repairs: 0,
        }
    }

    /// Number of data slots
    #[inline(always)]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Validate the capacity and map the descriptor area.
    ///
    /// The ring must not move in memory after this call.
    pub fn init<M: DmaMapper>(&mut self, mapper: &mut M) -> DmaResult<()> {
        if !(MIN_RING_SIZE..=MAX_RING_SIZE).contains(&N) {
            return Err(DmaError::RingSize);
        }
        if self.base.is_some() {
            return Ok(());
        }
        let ptr = core::ptr::from_ref(&self.storage).cast::<u8>();
        let base = mapper
            .map(ptr, Self::AREA_SIZE, DmaDirection::Bidirectional)
            .ok_or(DmaError::MappingFailed)?;
        self.base = Some(base);
        Ok(())
    }

    /// Release the descriptor area mapping.
    pub fn teardown<M: DmaMapper>(&mut self, mapper: &mut M) {
        if let Some(base) = self.base.take() {
            mapper.unmap(base, Self::AREA_SIZE, DmaDirection::Bidirectional);
        }
    }

    /// Bus address of the descriptor area
    #[inline(always)]
    #[must_use]
    pub fn base_addr(&self) -> Option<u64> {
        self.base
    }

    /// Zero the ring and tag every data slot `empty`.
    pub fn format(&mut self, empty: DescType) -> ConfigResult<()> {
        self.format_with(empty, |_, _| {})
    }

    /// Zero the ring, let `bind` fill each slot, then tag it `empty`.
    ///
    /// Re-links the trailing descriptor and resets both counters.
    pub fn format_with(
        &mut self,
        empty: DescType,
        mut bind: impl FnMut(usize, &D),
    ) -> ConfigResult<()> {
        let base = self.base.ok_or(ConfigError::NotInitialized)?;
        for (index, slot) in self.storage.slots.iter().enumerate() {
            slot.clear();
            bind(index, slot);
            slot.base().publish(empty, empty == DescType::FEmpty);
        }
        self.storage.link.clear();
        self.storage.link.base().set_addr(base);
        self.storage.link.base().publish(DescType::Link, false);
        self.cur = 0;
        self.dirty = 0;
        Ok(())
    }

    /// Hand the ring base to the GWCA and wait for it to latch.
    ///
    /// # Errors
    /// [`ConfigError::LearnTimeout`] leaves the chain unusable.
    pub fn learn<B: RegisterBus, Dl: DelayNs>(
        &self,
        regs: &Registers<B>,
        chain: usize,
        delay: &mut Dl,
        policy: PollPolicy,
    ) -> ConfigResult<()> {
        let base = self.base.ok_or(ConfigError::NotInitialized)?;
        regs.write(Reg::GwDescLearnAddrLo, base as u32);
        regs.write(Reg::GwDescLearnAddrHi, (base >> 32) as u32 & DESC_ADDR_HI_MASK);
        let request = DESC_LEARN_REQ | (chain as u32 & DESC_LEARN_CHAIN_MASK);
        request_and_wait(regs, Reg::GwDescLearnCtrl, request, DESC_LEARN_REQ, delay, policy)
            .inspect_err(|_| rs_warn!("descriptor learn timed out on chain {}", chain))?;
        rs_debug!("chain {} learned at {:#x}", chain, base);
        Ok(())
    }

    /// Slots between `dirty` and `cur`
    #[inline(always)]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.cur.wrapping_sub(self.dirty)
    }

    /// Slots `produce` can still hand out
    #[inline(always)]
    #[must_use]
    pub fn free(&self) -> usize {
        (N - 1).saturating_sub(self.in_flight())
    }

    /// Producer counter
    #[inline(always)]
    #[must_use]
    pub fn cur(&self) -> usize {
        self.cur
    }

    /// Consumer counter
    #[inline(always)]
    #[must_use]
    pub fn dirty(&self) -> usize {
        self.dirty
    }

    /// Descriptor in a data slot
    #[inline(always)]
    pub fn slot(&self, index: usize) -> &D {
        &self.storage.slots[index % N]
    }

    /// The trailing link descriptor
    #[inline(always)]
    pub fn link(&self) -> &D {
        &self.storage.link
    }

    /// Times `check_link` rewrote the link descriptor
    #[inline(always)]
    #[must_use]
    pub fn link_repairs(&self) -> u32 {
        self.link_repairs
    }

    /// Reserve the next slot for the producer.
    ///
    /// One slot always stays free so a full ring is distinguishable from an
    /// empty one.
    pub fn produce(&mut self) -> DmaResult<usize> {
        if self.in_flight() >= N - 1 {
            return Err(DmaError::NoDescriptorsAvailable);
        }
        let index = self.cur % N;
        self.cur = self.cur.wrapping_add(1);
        Ok(index)
    }

    /// Publish a produced slot to hardware.
    #[inline(always)]
    pub fn publish(&self, index: usize, tag: DescType, irq: bool) {
        self.slot(index).base().publish(tag, irq);
    }

    /// Reclaim completed slots from `dirty`.
    ///
    /// Stops at the first slot whose tag is not a completion state; each
    /// reclaimed slot is re-tagged `reset`.
    pub fn reap(
        &mut self,
        is_complete: impl Fn(DescType) -> bool,
        reset: DescType,
        mut f: impl FnMut(usize, &D),
    ) -> usize {
        self.check_link();
        let mut reaped = 0;
        while self.dirty != self.cur {
            let index = self.dirty % N;
            let slot = &self.storage.slots[index];
            match slot.base().observe() {
                Some(tag) if is_complete(tag) => {}
                _ => break,
            }
            f(index, slot);
            slot.base().publish(reset, false);
            self.dirty = self.dirty.wrapping_add(1);
            reaped += 1;
        }
        reaped
    }

    /// Consume filled slots from `cur`, at most `quota`.
    ///
    /// Returns the number handed to `f` and whether more filled slots are
    /// waiting. Consumed slots stay unavailable to hardware until `refill`.
    pub fn poll_rx(&mut self, quota: usize, mut f: impl FnMut(usize, &D, DescType)) -> (usize, bool) {
        self.check_link();
        let mut delivered = 0;
        while delivered < quota && self.in_flight() < N {
            let index = self.cur % N;
            let slot = &self.storage.slots[index];
            let tag = match slot.base().observe() {
                Some(tag) if tag.is_frame() => tag,
                _ => break,
            };
            f(index, slot, tag);
            self.cur = self.cur.wrapping_add(1);
            delivered += 1;
        }
        (delivered, self.rx_pending())
    }

    /// Whether `poll_rx` would find work right now
    #[must_use]
    pub fn rx_pending(&self) -> bool {
        if self.in_flight() >= N {
            return true;
        }
        matches!(self.slot(self.cur).base().observe(), Some(tag) if tag.is_frame())
    }

    /// Re-arm consumed slots `dirty..cur` with `tag`.
    ///
    /// `f` restores the pointer and size of each slot before it is handed
    /// back to hardware.
    pub fn refill(&mut self, tag: DescType, mut f: impl FnMut(usize, &D)) -> usize {
        let mut refilled = 0;
        while self.dirty != self.cur {
            let index = self.dirty % N;
            let slot = &self.storage.slots[index];
            f(index, slot);
            slot.base().publish(tag, true);
            self.dirty = self.dirty.wrapping_add(1);
            refilled += 1;
        }
        refilled
    }

    /// Repair the link descriptor if it lost its tag or pointer.
    ///
    /// Returns `true` if a repair was made.
    pub fn check_link(&mut self) -> bool {
        let Some(base) = self.base else {
            return false;
        };
        let link = self.storage.link.base();
        if link.observe() == Some(DescType::Link) && link.addr() == base {
            return false;
        }
        rs_warn!("repairing link descriptor (tag {:#x})", link.raw_type());
        link.set_addr(base);
        link.publish(DescType::Link, false);
        self.link_repairs = self.link_repairs.saturating_add(1);
        true
    }
}

impl<D: Descriptor, const N: usize> Default for DescriptorRing<D, N> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
