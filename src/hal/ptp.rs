//! PTP time and the gPTP timer
//!
//! [`PtpClock`] is the narrow interface the gate schedule engine needs:
//! sample the current time, and the usual servo hooks. [`Gptp`] implements
//! it on the switch's own gPTP timer.

use super::mmio::{RegisterBus, Registers};
use crate::internal::constants::{GPTP_DEFAULT_INCREMENT, NSEC_PER_SEC};
use crate::internal::register::Reg;
use crate::internal::register::gptp::{SEC_HI_MASK, TIMER_CAPTURE, TIMER_ENABLE, TIMER_LOAD};

// =============================================================================
// PtpTime
// =============================================================================

/// PTP time: seconds and nanoseconds
///
/// Field order makes the derived ordering chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PtpTime {
    /// Seconds (48 bits used by hardware)
    pub sec: u64,
    /// Nanoseconds, always below one second
    pub nsec: u32,
}

impl PtpTime {
    /// Time zero
    pub const ZERO: Self = Self { sec: 0, nsec: 0 };

    /// Create a time, normalizing an oversized nanosecond field
    #[must_use]
    pub const fn new(sec: u64, nsec: u32) -> Self {
        let carry = nsec as u64 / NSEC_PER_SEC;
        Self {
            sec: sec + carry,
            nsec: (nsec as u64 % NSEC_PER_SEC) as u32,
        }
    }

    /// Convert from nanoseconds
    #[must_use]
    pub const fn from_nanos(ns: u64) -> Self {
        Self {
            sec: ns / NSEC_PER_SEC,
            nsec: (ns % NSEC_PER_SEC) as u32,
        }
    }

    /// Convert to nanoseconds, saturating
    #[must_use]
    pub const fn as_nanos(&self) -> u64 {
        self.sec
            .saturating_mul(NSEC_PER_SEC)
            .saturating_add(self.nsec as u64)
    }
}

impl core::fmt::Display for PtpTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

// =============================================================================
// Clock interface
// =============================================================================

/// PTP hardware clock
pub trait PtpClock {
    /// Current time
    fn get_time(&mut self) -> PtpTime;
    /// Step the clock to an absolute time
    fn set_time(&mut self, time: PtpTime);
    /// Adjust the rate by parts per billion
    fn adjust_frequency(&mut self, ppb: i64);
    /// Step the clock by a signed offset in nanoseconds
    fn adjust_time(&mut self, delta_ns: i64) {
        let now = self.get_time().as_nanos();
        let target = if delta_ns >= 0 {
            now.saturating_add(delta_ns as u64)
        } else {
            now.saturating_sub(delta_ns.unsigned_abs())
        };
        self.set_time(PtpTime::from_nanos(target));
    }
}

impl<T: PtpClock + ?Sized> PtpClock for &mut T {
    fn get_time(&mut self) -> PtpTime {
        (**self).get_time()
    }

    fn set_time(&mut self, time: PtpTime) {
        (**self).set_time(time);
    }

    fn adjust_frequency(&mut self, ppb: i64) {
        (**self).adjust_frequency(ppb);
    }

    fn adjust_time(&mut self, delta_ns: i64) {
        (**self).adjust_time(delta_ns);
    }
}

// =============================================================================
// gPTP timer
// =============================================================================

/// Timer increment for a rate offset in parts per billion
///
/// Clamped to the 32-bit register; a zero increment would stop the clock.
#[must_use]
pub fn increment_for_ppb(ppb: i64) -> u32 {
    let base = i128::from(GPTP_DEFAULT_INCREMENT);
    let delta = base * i128::from(ppb) / i128::from(NSEC_PER_SEC);
    (base + delta).clamp(1, i128::from(u32::MAX)) as u32
}

/// The switch's gPTP timer
///
/// Owns its own register handle so it can live next to the switch; pass a
/// second handle to the same window (`&bus` also implements
/// [`RegisterBus`]).
#[derive(Debug)]
pub struct Gptp<B: RegisterBus> {
    regs: Registers<B>,
}

impl<B: RegisterBus> Gptp<B> {
    /// Bind to a register block
    pub const fn new(regs: Registers<B>) -> Self {
        Self { regs }
    }

    /// Register handle of the timer
    pub fn registers(&self) -> &Registers<B> {
        &self.regs
    }

    /// Start the timer at the nominal rate
    pub fn enable(&mut self) {
        self.regs.write(Reg::GptpIncrement, GPTP_DEFAULT_INCREMENT);
        self.regs.set_bits(Reg::GptpTimerCtrl, TIMER_ENABLE);
    }
}

impl<B: RegisterBus> PtpClock for Gptp<B> {
    fn get_time(&mut self) -> PtpTime {
        self.regs.set_bits(Reg::GptpTimerCtrl, TIMER_CAPTURE);
        let nsec = self.regs.read(Reg::GptpTimeNsec);
        let sec_lo = self.regs.read(Reg::GptpTimeSecLo);
        let sec_hi = self.regs.read(Reg::GptpTimeSecHi) & SEC_HI_MASK;
        PtpTime::new((u64::from(sec_hi) << 32) | u64::from(sec_lo), nsec)
    }

    fn set_time(&mut self, time: PtpTime) {
        self.regs.write(Reg::GptpOffsetNsec, time.nsec);
        self.regs.write(Reg::GptpOffsetSecLo, time.sec as u32);
        self.regs
            .write(Reg::GptpOffsetSecHi, (time.sec >> 32) as u32 & SEC_HI_MASK);
        self.regs.set_bits(Reg::GptpTimerCtrl, TIMER_LOAD);
    }

    fn adjust_frequency(&mut self, ppb: i64) {
        self.regs.write(Reg::GptpIncrement, increment_for_ppb(ppb));
    }
}
