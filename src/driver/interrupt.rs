//! Interrupt top half and poll bookkeeping.
//!
//! The top half ([`Dispatcher::handle`]) only masks, acknowledges and marks
//! work; descriptors are touched exclusively by the bottom half, which ends
//! each pass with [`Dispatcher::poll_complete`].

use crate::driver::stats::ErrorStatus;
use crate::hal::mmio::{RegAddr, RegisterBus, Registers};
use crate::internal::constants::MAX_PORTS;
use crate::internal::log::{rs_debug, rs_error, rs_warn};
use crate::internal::register::gwca::{
    ERR_ALL, IRQ_BANKS, TS_IRQ_DONE, chain_bit, rx_chain, ts_chain, tx_chain,
};
use crate::internal::register::port::{ERR_CONFIG, ERR_GATE_MASK};
use crate::internal::register::{Reg, fwd};

// =============================================================================
// Interrupt Status
// =============================================================================

/// Snapshot of every interrupt status register the driver serves
///
/// # Example
///
/// ```ignore
/// let status = InterruptStatus::read(&regs, 4);
/// if status.rx_signalled(0) {
///     // port 0 has received frames
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptStatus {
    /// Data chain bits, one register per bank
    pub data: [u32; IRQ_BANKS],
    /// Timestamp ring status
    pub timestamps: u32,
    /// GWCA error causes
    pub gwca_errors: u32,
    /// TAS error status per port
    pub tas_errors: [u32; MAX_PORTS],
    /// Forwarding engine error causes
    pub fwd_errors: u32,
    /// PSFP gate errors
    pub psfp_errors: u32,
}

impl InterruptStatus {
    /// Read the status registers of the first `ports` ports
    pub fn read<B: RegisterBus>(regs: &Registers<B>, ports: usize) -> Self {
        let mut status = Self::default();
        for (bank, word) in status.data.iter_mut().enumerate() {
            *word = regs.read(RegAddr::banked(Reg::GwDataIrqStatus, bank));
        }
        status.timestamps = regs.read(Reg::GwTsIrqStatus);
        status.gwca_errors = regs.read(Reg::GwErrStatus) & ERR_ALL;
        for (port, word) in status.tas_errors.iter_mut().enumerate().take(ports) {
            *word = regs.read(RegAddr::port(Reg::TasErrStatus, port)) & (ERR_GATE_MASK | ERR_CONFIG);
        }
        status.fwd_errors = regs.read(Reg::FwdErrStatus) & (fwd::ERR_TABLE | fwd::ERR_METER);
        status.psfp_errors = regs.read(Reg::PsfpErrStatus) & fwd::PSFP_ERR_GATE_MASK;
        status
    }

    fn chain_set(&self, chain: usize) -> bool {
        let (bank, bit) = chain_bit(chain);
        self.data.get(bank).is_some_and(|word| word & bit != 0)
    }

    /// RX completion signalled for `port`
    #[inline]
    pub fn rx_signalled(&self, port: usize) -> bool {
        self.chain_set(rx_chain(port))
    }

    /// TX completion signalled for `port`
    #[inline]
    pub fn tx_signalled(&self, port: usize, ports: usize) -> bool {
        self.chain_set(tx_chain(port, ports))
    }

    /// Either data chain of `port` signalled
    #[inline]
    pub fn port_signalled(&self, port: usize, ports: usize) -> bool {
        self.rx_signalled(port) || self.tx_signalled(port, ports)
    }

    /// Timestamp ring signalled
    #[inline]
    pub fn timestamps_signalled(&self) -> bool {
        self.timestamps & TS_IRQ_DONE != 0
    }

    /// Any cause at all
    pub fn any(&self) -> bool {
        self.data.iter().any(|&w| w != 0) || self.timestamps_signalled() || self.has_error()
    }

    /// Any error cause
    pub fn has_error(&self) -> bool {
        self.gwca_errors != 0
            || self.tas_errors.iter().any(|&w| w != 0)
            || self.fwd_errors != 0
            || self.psfp_errors != 0
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Interrupt state of one port's data chains
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueState {
    /// Interrupts unmasked, nothing scheduled
    #[default]
    Idle,
    /// Interrupts masked, the bottom half owns the rings
    Polling,
}

/// Result of one bottom-half pass over a port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollOutcome {
    /// Frames handed to the sink
    pub rx_delivered: usize,
    /// TX slots reclaimed
    pub tx_reclaimed: usize,
    /// Timestamp descriptors consumed
    pub timestamps: usize,
    /// Work remains; the port stays in [`QueueState::Polling`]
    pub more: bool,
}

/// Per-port interrupt state machine
#[derive(Debug)]
pub struct Dispatcher {
    state: [QueueState; MAX_PORTS],
    pending: u32,
    ts_pending: bool,
}

impl Dispatcher {
    /// All ports idle. Const-compatible.
    pub const fn new() -> Self {
        Self {
            state: [QueueState::Idle; MAX_PORTS],
            pending: 0,
            ts_pending: false,
        }
    }

    /// State of `port`
    #[inline]
    pub fn state(&self, port: usize) -> QueueState {
        self.state[port]
    }

    /// Bitmask of ports waiting for the bottom half
    #[inline]
    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// `port` waits for the bottom half
    #[inline]
    pub fn is_pending(&self, port: usize) -> bool {
        self.pending & (1 << port) != 0
    }

    /// The timestamp ring waits for the bottom half
    #[inline]
    pub fn timestamps_pending(&self) -> bool {
        self.ts_pending
    }

    /// Unmask every chain and error cause of `ports` ports
    pub fn enable<B: RegisterBus>(&mut self, regs: &Registers<B>, ports: usize) {
        let mut banks = [0u32; IRQ_BANKS];
        for port in 0..ports {
            for chain in [rx_chain(port), tx_chain(port, ports)] {
                let (bank, bit) = chain_bit(chain);
                banks[bank] |= bit;
            }
        }
        for (bank, bits) in banks.iter().enumerate() {
            if *bits != 0 {
                regs.write(RegAddr::banked(Reg::GwDataIrqEnable, bank), *bits);
            }
        }
        regs.write(Reg::GwTsIrqEnable, TS_IRQ_DONE);
        regs.write(Reg::GwErrEnable, ERR_ALL);
        self.state = [QueueState::Idle; MAX_PORTS];
        self.pending = 0;
        self.ts_pending = false;
        rs_debug!("interrupts enabled for {} ports (ts chain {})", ports, ts_chain(ports));
    }

    /// Mask every chain of `ports` ports
    pub fn disable<B: RegisterBus>(&mut self, regs: &Registers<B>, ports: usize) {
        for bank in 0..IRQ_BANKS {
            regs.write(RegAddr::banked(Reg::GwDataIrqDisable, bank), u32::MAX);
        }
        regs.write(Reg::GwTsIrqDisable, TS_IRQ_DONE);
        regs.write(Reg::GwErrEnable, 0);
        for state in self.state.iter_mut().take(ports) {
            *state = QueueState::Idle;
        }
        self.pending = 0;
        self.ts_pending = false;
    }

    fn write_port_chains<B: RegisterBus>(regs: &Registers<B>, reg: Reg, port: usize, ports: usize) {
        let mut banks = [0u32; IRQ_BANKS];
        for chain in [rx_chain(port), tx_chain(port, ports)] {
            let (bank, bit) = chain_bit(chain);
            banks[bank] |= bit;
        }
        for (bank, bits) in banks.iter().enumerate() {
            if *bits != 0 {
                regs.write(RegAddr::banked(reg, bank), *bits);
            }
        }
    }

    /// Top half.
    ///
    /// Signalled ports are masked, acknowledged and moved to
    /// [`QueueState::Polling`]; the timestamp ring is masked and marked;
    /// error causes are latched into `errors` and acknowledged. The returned
    /// snapshot lets the caller act on gate errors.
    pub fn handle<B: RegisterBus>(
        &mut self,
        regs: &Registers<B>,
        ports: usize,
        errors: &mut ErrorStatus,
    ) -> InterruptStatus {
        let status = InterruptStatus::read(regs, ports);

        let mut ack = [0u32; IRQ_BANKS];
        for port in 0..ports {
            if !status.port_signalled(port, ports) {
                continue;
            }
            Self::write_port_chains(regs, Reg::GwDataIrqDisable, port, ports);
            for chain in [rx_chain(port), tx_chain(port, ports)] {
                let (bank, bit) = chain_bit(chain);
                ack[bank] |= status.data[bank] & bit;
            }
            self.state[port] = QueueState::Polling;
            self.pending |= 1 << port;
        }
        for (bank, bits) in ack.iter().enumerate() {
            if *bits != 0 {
                regs.write(RegAddr::banked(Reg::GwDataIrqStatus, bank), *bits);
            }
        }

        if status.timestamps_signalled() {
            regs.write(Reg::GwTsIrqDisable, TS_IRQ_DONE);
            regs.write(Reg::GwTsIrqStatus, TS_IRQ_DONE);
            self.ts_pending = true;
        }

        if status.has_error() {
            self.latch_errors(regs, ports, &status, errors);
        }
        status
    }

    fn latch_errors<B: RegisterBus>(
        &self,
        regs: &Registers<B>,
        ports: usize,
        status: &InterruptStatus,
        errors: &mut ErrorStatus,
    ) {
        if status.gwca_errors != 0 {
            rs_error!("gwca error causes {:#x}", status.gwca_errors);
            errors.latch_gwca(status.gwca_errors);
            regs.write(Reg::GwErrStatus, status.gwca_errors);
        }
        for (port, &word) in status.tas_errors.iter().enumerate().take(ports) {
            if word == 0 {
                continue;
            }
            rs_warn!("port {} tas error status {:#x}", port, word);
            errors.latch_tas(port, (word & ERR_GATE_MASK) as u8, word & ERR_CONFIG != 0);
            regs.write(RegAddr::port(Reg::TasErrStatus, port), word);
        }
        if status.fwd_errors != 0 {
            rs_warn!("forwarding error causes {:#x}", status.fwd_errors);
            errors.latch_fwd(status.fwd_errors);
            regs.write(Reg::FwdErrStatus, status.fwd_errors);
        }
        if status.psfp_errors != 0 {
            rs_warn!("psfp gate errors {:#x}", status.psfp_errors);
            errors.latch_psfp(status.psfp_errors);
            regs.write(Reg::PsfpErrStatus, status.psfp_errors);
        }
    }

    /// End of a bottom-half pass over `port`.
    ///
    /// With work left the port stays pending; otherwise its chains are
    /// unmasked and it returns to [`QueueState::Idle`].
    pub fn poll_complete<B: RegisterBus>(
        &mut self,
        regs: &Registers<B>,
        port: usize,
        ports: usize,
        more: bool,
    ) {
        if more {
            self.state[port] = QueueState::Polling;
            self.pending |= 1 << port;
            return;
        }
        self.pending &= !(1 << port);
        if self.state[port] == QueueState::Polling {
            self.state[port] = QueueState::Idle;
            Self::write_port_chains(regs, Reg::GwDataIrqEnable, port, ports);
        }
    }

    /// End of a bottom-half pass over the timestamp ring
    pub fn timestamps_complete<B: RegisterBus>(&mut self, regs: &Registers<B>, more: bool) {
        if more {
            self.ts_pending = true;
            return;
        }
        if self.ts_pending {
            self.ts_pending = false;
            regs.write(Reg::GwTsIrqEnable, TS_IRQ_DONE);
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
