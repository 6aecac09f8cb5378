//! GWCA DMA descriptor structures.
//!
//! Three layouts share an 8-byte base: plain [`Desc`] for links, [`ExtDesc`]
//! for RX/TX chains, and [`ExtTsDesc`] for RX chains with timestamps and for
//! the TX timestamp completion ring.

pub mod bits;
mod desc;

pub use bits::DescType;
pub use desc::{Desc, ExtDesc, ExtTsDesc};

use crate::hal::ptp::PtpTime;

/// Volatile cell wrapper for descriptor fields
///
/// Ensures all accesses are volatile to prevent compiler optimization
/// from reordering or caching descriptor field accesses.
#[repr(transparent)]
pub(crate) struct VolatileCell<T: Copy> {
    value: core::cell::UnsafeCell<T>,
}

// Safety: descriptor fields are naturally aligned and accessed with single
// volatile loads and stores; ordering against hardware uses explicit fences.
unsafe impl<T: Copy> Sync for VolatileCell<T> {}

impl<T: Copy> VolatileCell<T> {
    /// Create a new volatile cell with the given initial value
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self {
            value: core::cell::UnsafeCell::new(value),
        }
    }

    /// Read the value (volatile read)
    #[inline(always)]
    pub fn get(&self) -> T {
        unsafe { core::ptr::read_volatile(self.value.get()) }
    }

    /// Write a value (volatile write)
    #[inline(always)]
    pub fn set(&self, value: T) {
        unsafe { core::ptr::write_volatile(self.value.get(), value) }
    }

    /// Update the value using a function (read-modify-write)
    #[inline(always)]
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(T) -> T,
    {
        let old = self.get();
        self.set(f(old));
    }
}

/// Common access to the descriptor layouts used in rings
pub trait Descriptor {
    /// Zeroed descriptor, usable in const array initializers
    const ZEROED: Self;

    /// The 8-byte base shared by every layout
    fn base(&self) -> &Desc;

    /// Zero every field, including the tag
    fn clear(&self);

    /// Extended info word, zero for plain descriptors
    fn info1(&self) -> u64 {
        0
    }

    /// Set the extended info word; ignored by plain descriptors
    fn set_info1(&self, _value: u64) {}

    /// Hardware timestamp, if the layout carries one
    fn timestamp(&self) -> Option<PtpTime> {
        None
    }
}
