//! Register bus and logical register access
//!
//! [`RegisterBus`] is the opaque MMIO target: byte offsets into the switch
//! register window. [`Registers`] resolves logical [`Reg`] names through the
//! [`RegisterLayout`] of the detected IP revision and applies the 32-bit
//! write policy.

use crate::driver::error::{ConfigError, ConfigResult};
use crate::internal::log::rs_warn;
use crate::internal::register::{IpRevision, Reg, RegisterLayout};

// =============================================================================
// Bus
// =============================================================================

/// Byte-addressed register window
///
/// All methods take `&self`: MMIO is interior-mutable, and several
/// subsystems hold shared references to the same register block.
pub trait RegisterBus {
    /// Read a 32-bit register
    fn read32(&self, offset: u32) -> u32;
    /// Write a 32-bit register
    fn write32(&self, offset: u32, value: u32);
    /// Read a 64-bit register pair
    fn read64(&self, offset: u32) -> u64;
    /// Write a 64-bit register pair
    fn write64(&self, offset: u32, value: u64);
}

impl<T: RegisterBus + ?Sized> RegisterBus for &T {
    #[inline(always)]
    fn read32(&self, offset: u32) -> u32 {
        (**self).read32(offset)
    }

    #[inline(always)]
    fn write32(&self, offset: u32, value: u32) {
        (**self).write32(offset, value);
    }

    #[inline(always)]
    fn read64(&self, offset: u32) -> u64 {
        (**self).read64(offset)
    }

    #[inline(always)]
    fn write64(&self, offset: u32, value: u64) {
        (**self).write64(offset, value);
    }
}

/// Volatile access to a memory-mapped register window
#[derive(Debug)]
pub struct VolatileBus {
    base: *mut u8,
}

// SAFETY: the window is device memory; every access is a single volatile
// load or store, and callers serialize configuration through `&mut Switch`.
unsafe impl Send for VolatileBus {}

impl VolatileBus {
    /// Wrap a mapped register window
    ///
    /// # Safety
    /// `base` must point to the start of the switch register window, mapped
    /// for the lifetime of the bus and 8-byte aligned.
    #[must_use]
    pub const unsafe fn new(base: *mut u8) -> Self {
        Self { base }
    }
}

impl RegisterBus for VolatileBus {
    #[inline(always)]
    fn read32(&self, offset: u32) -> u32 {
        // SAFETY: the constructor guarantees a valid mapped window
        unsafe { core::ptr::read_volatile(self.base.add(offset as usize).cast::<u32>()) }
    }

    #[inline(always)]
    fn write32(&self, offset: u32, value: u32) {
        // SAFETY: the constructor guarantees a valid mapped window
        unsafe { core::ptr::write_volatile(self.base.add(offset as usize).cast::<u32>(), value) }
    }

    #[inline(always)]
    fn read64(&self, offset: u32) -> u64 {
        // SAFETY: the constructor guarantees a valid mapped window
        unsafe { core::ptr::read_volatile(self.base.add(offset as usize).cast::<u64>()) }
    }

    #[inline(always)]
    fn write64(&self, offset: u32, value: u64) {
        // SAFETY: the constructor guarantees a valid mapped window
        unsafe { core::ptr::write_volatile(self.base.add(offset as usize).cast::<u64>(), value) }
    }
}

// =============================================================================
// Logical addressing
// =============================================================================

/// One instance of a logical register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegAddr {
    /// Logical register
    pub reg: Reg,
    /// Port block (ignored for global registers)
    pub port: usize,
    /// Bank index for banked registers
    pub bank: usize,
}

impl RegAddr {
    /// Bank of a global register
    #[inline(always)]
    #[must_use]
    pub const fn banked(reg: Reg, bank: usize) -> Self {
        Self { reg, port: 0, bank }
    }

    /// Register in a port block
    #[inline(always)]
    #[must_use]
    pub const fn port(reg: Reg, port: usize) -> Self {
        Self { reg, port, bank: 0 }
    }

    /// Bank of a register in a port block
    #[inline(always)]
    #[must_use]
    pub const fn port_banked(reg: Reg, port: usize, bank: usize) -> Self {
        Self { reg, port, bank }
    }
}

impl From<Reg> for RegAddr {
    fn from(reg: Reg) -> Self {
        Self {
            reg,
            port: 0,
            bank: 0,
        }
    }
}

/// Logical register access for one switch instance
#[derive(Debug)]
pub struct Registers<B: RegisterBus> {
    bus: B,
    layout: &'static RegisterLayout,
}

impl<B: RegisterBus> Registers<B> {
    /// Bind a bus to the layout table of an IP revision
    pub const fn new(bus: B, revision: IpRevision) -> Self {
        Self {
            bus,
            layout: RegisterLayout::for_revision(revision),
        }
    }

    /// Underlying bus
    #[inline(always)]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// IP revision the offsets are resolved for
    #[inline(always)]
    pub fn revision(&self) -> IpRevision {
        self.layout.revision()
    }

    /// Byte offset of a register instance
    #[inline(always)]
    pub fn offset(&self, at: impl Into<RegAddr>) -> u32 {
        let at = at.into();
        self.layout.offset(at.reg, at.port, at.bank)
    }

    /// Read a register
    #[inline(always)]
    pub fn read(&self, at: impl Into<RegAddr>) -> u32 {
        self.bus.read32(self.offset(at))
    }

    /// Write a register
    ///
    /// Offsets that are not 8-byte aligned are written as a read-modify-write
    /// of the containing 64-bit word so the lower half is left untouched. A
    /// write-1-to-clear lower half gets zeros instead, which leave its
    /// pending bits set.
    pub fn write(&self, at: impl Into<RegAddr>, value: u32) {
        let offset = self.offset(at);
        if offset % 8 == 0 {
            self.bus.write32(offset, value);
        } else {
            let word_offset = offset & !0x7;
            let low = if self.layout.is_write_one_to_clear(word_offset) {
                0
            } else {
                self.bus.read64(word_offset) & 0xFFFF_FFFF
            };
            self.bus.write64(word_offset, low | (u64::from(value) << 32));
        }
    }

    /// Read-modify-write a register
    pub fn modify(&self, at: impl Into<RegAddr>, f: impl FnOnce(u32) -> u32) {
        let at = at.into();
        let value = self.read(at);
        self.write(at, f(value));
    }

    /// Set bits in a register
    pub fn set_bits(&self, at: impl Into<RegAddr>, bits: u32) {
        self.modify(at, |v| v | bits);
    }

    /// Clear bits in a register
    pub fn clear_bits(&self, at: impl Into<RegAddr>, bits: u32) {
        self.modify(at, |v| v & !bits);
    }

    /// Write a register and confirm the value stuck
    pub fn write_and_verify(&self, at: impl Into<RegAddr>, value: u32) -> ConfigResult<()> {
        let at = at.into();
        self.write(at, value);
        let readback = self.read(at);
        if readback != value {
            rs_warn!(
                "verify mismatch at {:#x}: wrote {:#x} read {:#x}",
                self.offset(at),
                value,
                readback
            );
            return Err(ConfigError::VerifyMismatch);
        }
        Ok(())
    }
}
