//! Bounded learn/poll handshake
//!
//! The switch latches descriptor chain bases and table entries on a request
//! bit that hardware clears when done. Every such handshake goes through
//! [`wait_for_clear`] so the bound and the failure mode are the same
//! everywhere.

use embedded_hal::delay::DelayNs;

use super::mmio::{RegAddr, RegisterBus, Registers};
use crate::driver::error::{ConfigError, ConfigResult};
use crate::internal::constants::{LEARN_POLL_INTERVAL_MS, LEARN_POLL_ITERATIONS};
use crate::internal::log::rs_warn;

/// Bound of a learn/poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollPolicy {
    /// Register reads before giving up
    pub iterations: u32,
    /// Sleep after each unsuccessful read, in milliseconds
    pub interval_ms: u32,
}

impl PollPolicy {
    /// Create a policy
    #[must_use]
    pub const fn new(iterations: u32, interval_ms: u32) -> Self {
        Self {
            iterations,
            interval_ms,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(LEARN_POLL_ITERATIONS, LEARN_POLL_INTERVAL_MS)
    }
}

/// Poll until `register & mask == 0`
///
/// Reads the register exactly `policy.iterations` times at most.
///
/// # Errors
/// [`ConfigError::LearnTimeout`] if the masked bits never clear.
pub fn wait_for_clear<B: RegisterBus, D: DelayNs>(
    regs: &Registers<B>,
    at: impl Into<RegAddr>,
    mask: u32,
    delay: &mut D,
    policy: PollPolicy,
) -> ConfigResult<()> {
    let at = at.into();
    for _ in 0..policy.iterations {
        if regs.read(at) & mask == 0 {
            return Ok(());
        }
        delay.delay_ms(policy.interval_ms);
    }

    rs_warn!(
        "learn timeout at {:#x} mask {:#x} after {} polls",
        regs.offset(at),
        mask,
        policy.iterations
    );
    Err(ConfigError::LearnTimeout)
}

/// Write a request and wait for `mask` to self-clear
///
/// # Errors
/// [`ConfigError::LearnTimeout`] if the request is never acknowledged.
pub fn request_and_wait<B: RegisterBus, D: DelayNs>(
    regs: &Registers<B>,
    at: impl Into<RegAddr>,
    request: u32,
    mask: u32,
    delay: &mut D,
    policy: PollPolicy,
) -> ConfigResult<()> {
    let at = at.into();
    regs.write(at, request);
    wait_for_clear(regs, at, mask, delay, policy)
}
