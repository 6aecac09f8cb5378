//! Descriptor layouts.

use core::sync::atomic::{Ordering, fence};

use super::bits::{DIE, DescType, size_flags};
use super::{Descriptor, VolatileCell};
use crate::hal::ptp::PtpTime;

/// Base descriptor (8 bytes)
#[repr(C)]
pub struct Desc {
    /// Size (bits 11:0) and error flags (bits 15:12)
    size_flags: VolatileCell<u16>,
    /// Bits 39:32 of the data pointer
    control: VolatileCell<u8>,
    /// Type tag (bits 7:4) and interrupt enable (bit 3)
    type_die: VolatileCell<u8>,
    /// Bits 31:0 of the data pointer
    data_ptr: VolatileCell<u32>,
}

impl Desc {
    /// Size of the descriptor in bytes
    pub const SIZE: usize = 8;

    /// Create a new zeroed descriptor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            size_flags: VolatileCell::new(0),
            control: VolatileCell::new(0),
            type_die: VolatileCell::new(0),
            data_ptr: VolatileCell::new(0),
        }
    }

    /// Read the tag without ordering; for diagnostics only.
    #[inline(always)]
    #[must_use]
    pub fn raw_type(&self) -> u8 {
        self.type_die.get()
    }

    /// Read the tag, then order later field reads after it.
    #[inline(always)]
    pub(crate) fn observe(&self) -> Option<DescType> {
        let tag = DescType::from_bits(self.type_die.get());
        fence(Ordering::Acquire);
        tag
    }

    /// Order earlier field writes before the tag, then write it.
    #[inline(always)]
    pub(crate) fn publish(&self, tag: DescType, irq: bool) {
        fence(Ordering::Release);
        self.type_die.set(tag.bits() | if irq { DIE } else { 0 });
    }

    /// Interrupt enable flag of the last published tag
    #[inline(always)]
    #[must_use]
    pub fn irq_enabled(&self) -> bool {
        self.type_die.get() & DIE != 0
    }

    /// Buffer size or received length
    #[inline(always)]
    #[must_use]
    pub fn size(&self) -> usize {
        usize::from(self.size_flags.get() & size_flags::SIZE_MASK)
    }

    /// Set the buffer size, clearing error flags
    #[inline(always)]
    pub fn set_size(&self, len: usize) {
        self.size_flags.set(len as u16 & size_flags::SIZE_MASK);
    }

    /// Error flags written by hardware
    #[inline(always)]
    #[must_use]
    pub fn error_flags(&self) -> u16 {
        self.size_flags.get() & size_flags::ERR_MASK
    }

    /// 40-bit data pointer
    #[inline(always)]
    #[must_use]
    pub fn addr(&self) -> u64 {
        (u64::from(self.control.get()) << 32) | u64::from(self.data_ptr.get())
    }

    /// Set the 40-bit data pointer
    #[inline(always)]
    pub fn set_addr(&self, addr: u64) {
        self.data_ptr.set(addr as u32);
        self.control.set((addr >> 32) as u8);
    }

    /// Hardware side of the hand-off: write length, flags and tag.
    #[cfg(test)]
    pub(crate) fn complete(&self, tag: DescType, len: usize, errors: u16) {
        self.size_flags
            .set((len as u16 & size_flags::SIZE_MASK) | (errors & size_flags::ERR_MASK));
        fence(Ordering::Release);
        self.type_die.set(tag.bits());
    }

    fn zero(&self) {
        self.type_die.set(0);
        self.size_flags.set(0);
        self.control.set(0);
        self.data_ptr.set(0);
    }
}

impl Default for Desc {
    fn default() -> Self {
        Self::new()
    }
}

impl Descriptor for Desc {
    const ZEROED: Self = Self::new();

    fn base(&self) -> &Desc {
        self
    }

    fn clear(&self) {
        self.zero();
    }
}

/// Extended descriptor (16 bytes): RX/TX data chains
#[repr(C)]
pub struct ExtDesc {
    desc: Desc,
    info1: VolatileCell<u64>,
}

impl ExtDesc {
    /// Size of the descriptor in bytes
    pub const SIZE: usize = 16;

    /// Create a new zeroed descriptor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            desc: Desc::new(),
            info1: VolatileCell::new(0),
        }
    }
}

impl Default for ExtDesc {
    fn default() -> Self {
        Self::new()
    }
}

impl Descriptor for ExtDesc {
    const ZEROED: Self = Self::new();

    fn base(&self) -> &Desc {
        &self.desc
    }

    fn clear(&self) {
        self.desc.zero();
        self.info1.set(0);
    }

    fn info1(&self) -> u64 {
        self.info1.get()
    }

    fn set_info1(&self, value: u64) {
        self.info1.set(value);
    }
}

/// Extended descriptor with timestamp (24 bytes)
#[repr(C)]
pub struct ExtTsDesc {
    desc: Desc,
    info1: VolatileCell<u64>,
    ts_nsec: VolatileCell<u32>,
    ts_sec: VolatileCell<u32>,
}

impl ExtTsDesc {
    /// Size of the descriptor in bytes
    pub const SIZE: usize = 24;

    /// Create a new zeroed descriptor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            desc: Desc::new(),
            info1: VolatileCell::new(0),
            ts_nsec: VolatileCell::new(0),
            ts_sec: VolatileCell::new(0),
        }
    }

    /// Hardware side: store a timestamp.
    #[cfg(test)]
    pub(crate) fn set_timestamp(&self, time: PtpTime) {
        self.ts_nsec.set(time.nsec);
        self.ts_sec.set(time.sec as u32);
    }
}

impl Default for ExtTsDesc {
    fn default() -> Self {
        Self::new()
    }
}

impl Descriptor for ExtTsDesc {
    const ZEROED: Self = Self::new();

    fn base(&self) -> &Desc {
        &self.desc
    }

    fn clear(&self) {
        self.desc.zero();
        self.info1.set(0);
        self.ts_nsec.set(0);
        self.ts_sec.set(0);
    }

    fn info1(&self) -> u64 {
        self.info1.get()
    }

    fn set_info1(&self, value: u64) {
        self.info1.set(value);
    }

    fn timestamp(&self) -> Option<PtpTime> {
        Some(PtpTime::new(u64::from(self.ts_sec.get()), self.ts_nsec.get()))
    }
}
