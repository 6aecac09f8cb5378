//! ISR-safe switch wrapper using critical sections.

use super::primitives::CriticalSectionCell;
use crate::driver::config::SwitchConfig;
use crate::driver::interrupt::InterruptStatus;
use crate::driver::TxPacket;
use crate::driver::stats::ErrorStatus;
use crate::driver::switch::Switch;
use crate::hal::mmio::RegisterBus;
use crate::hal::ptp::PtpClock;
use crate::internal::constants::{
    DEFAULT_BUFFER_SIZE, DEFAULT_RX_RING_SIZE, DEFAULT_TX_RING_SIZE, MAX_PORTS,
};

/// ISR-safe switch wrapper.
///
/// All access goes through `critical_section::with()`, disabling interrupts
/// for the duration of the closure. The interrupt handler runs the top half
/// through [`handle_interrupt`](Self::handle_interrupt); a task runs the
/// bottom half inside [`with`](Self::with).
///
/// # Example
///
/// ```ignore
/// static SWITCH: SharedSwitchDefault<VolatileBus, Gptp<VolatileBus>, Frame> =
///     SharedSwitch::new(bus, clock, SwitchConfig::new().with_ports(4));
///
/// #[interrupt]
/// fn RSWITCH() {
///     SWITCH.handle_interrupt();
/// }
///
/// SWITCH.with(|sw| sw.poll_pending(&mut mapper, &mut sink))?;
/// ```
pub struct SharedSwitch<
    B: RegisterBus,
    C: PtpClock,
    P,
    const PORTS: usize,
    const RX_BUFS: usize,
    const TX_BUFS: usize,
    const BUF_SIZE: usize,
> {
    inner: CriticalSectionCell<Switch<B, C, P, PORTS, RX_BUFS, TX_BUFS, BUF_SIZE>>,
}

impl<
    B: RegisterBus,
    C: PtpClock,
    P: TxPacket,
    const PORTS: usize,
    const RX_BUFS: usize,
    const TX_BUFS: usize,
    const BUF_SIZE: usize,
> SharedSwitch<B, C, P, PORTS, RX_BUFS, TX_BUFS, BUF_SIZE>
{
    /// Create a new shared switch (const, suitable for static initialization).
    pub const fn new(bus: B, clock: C, config: SwitchConfig) -> Self {
        Self {
            inner: CriticalSectionCell::new(Switch::new(bus, clock, config)),
        }
    }

    /// Execute a closure with exclusive access to the switch.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut Switch<B, C, P, PORTS, RX_BUFS, TX_BUFS, BUF_SIZE>) -> R,
    {
        self.inner.with(f)
    }

    /// Try to execute a closure, returning `None` if already borrowed.
    #[inline]
    pub fn try_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Switch<B, C, P, PORTS, RX_BUFS, TX_BUFS, BUF_SIZE>) -> R,
    {
        self.inner.try_with(f)
    }

    /// Interrupt top half
    ///
    /// Returns `None` if the interrupt fired while the switch was borrowed
    /// on the same core; the causes stay latched in hardware.
    pub fn handle_interrupt(&self) -> Option<InterruptStatus> {
        self.inner.try_with(|sw| sw.handle_interrupt())
    }

    /// Copy of the error latches and counters
    pub fn errors(&self) -> ErrorStatus {
        self.inner.with(|sw| *sw.errors())
    }
}

/// Every port, default ring and buffer sizes
pub type SharedSwitchDefault<B, C, P> = SharedSwitch<
    B,
    C,
    P,
    MAX_PORTS,
    DEFAULT_RX_RING_SIZE,
    DEFAULT_TX_RING_SIZE,
    DEFAULT_BUFFER_SIZE,
>;

/// Two ports with short rings
pub type SharedSwitchSmall<B, C, P> = SharedSwitch<B, C, P, 2, 16, 16, DEFAULT_BUFFER_SIZE>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::config::State;
    use crate::internal::register::Reg;
    use crate::internal::register::gwca::DESC_LEARN_REQ;
    use crate::testing::{MockBus, MockClock, MockDelay, MockMapper};

    struct Bytes(&'static [u8]);

    // SAFETY: the bytes live in a static
    unsafe impl TxPacket for Bytes {
        fn data(&self) -> &[u8] {
            self.0
        }
    }

    type TestShared = SharedSwitch<MockBus, MockClock, Bytes, 1, 4, 4, 128>;

    #[test]
    fn with_reaches_the_switch() {
        let shared = TestShared::new(MockBus::new(), MockClock::new(0), SwitchConfig::new());
        let mut mapper = MockMapper::new();
        let mut delay = MockDelay::new();
        shared.with(|sw| {
            let regs = sw.registers();
            regs.bus()
                .self_clearing(regs.offset(Reg::GwDescLearnCtrl), DESC_LEARN_REQ);
        });

        shared
            .with(|sw| sw.init(&mut mapper, &mut delay))
            .unwrap();
        assert_eq!(shared.with(|sw| sw.state()), State::Running);
        assert!(shared.handle_interrupt().is_some_and(|s| !s.any()));
        assert!(!shared.errors().any());
    }

    #[test]
    fn interrupt_during_borrow_is_deferred() {
        let shared = TestShared::new(MockBus::new(), MockClock::new(0), SwitchConfig::new());
        let nested = shared.with(|_| shared.handle_interrupt());
        assert!(nested.is_none());
    }
}
