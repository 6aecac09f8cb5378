//! R-Switch2 driver core
//!
//! [`Switch`] ties the GWCA rings of every port, the timestamp completion
//! ring, the interrupt dispatcher, the gate schedule engine and the PTP
//! clock together.

use embedded_hal::delay::DelayNs;

use super::config::{PortMode, State, SwitchConfig, TsnConfig};
use super::error::{ConfigError, IoError, Result};
use super::interrupt::{Dispatcher, InterruptStatus, PollOutcome};
use super::port::{Port, Rejected, Transmitted, TxPacket, write_port_mode, write_queue_config};
use super::stats::{ErrorStatus, PortStats, StatsReport};
use crate::hal::dma_map::DmaMapper;
use crate::hal::mmio::{RegAddr, RegisterBus, Registers};
use crate::hal::ptp::{PtpClock, PtpTime};
use crate::internal::constants::{
    DEFAULT_BUFFER_SIZE, DEFAULT_RX_RING_SIZE, DEFAULT_TS_RING_SIZE, DEFAULT_TX_RING_SIZE,
    MAX_PORTS, PSFP_GATES, QUEUES_PER_PORT,
};
use crate::internal::dma::descriptor::bits::info1;
use crate::internal::dma::{DescType, Descriptor, DescriptorRing, ExtTsDesc};
use crate::internal::log::{rs_debug, rs_info, rs_warn};
use crate::internal::register::Reg;
use crate::internal::register::gwca::{
    MODE_CONFIG, MODE_DISABLE, MODE_OPERATION, chain_bit, ts_chain, tx_chain,
};
use crate::internal::register::port::ERR_GATE_MASK;
use crate::schedule::{
    GateRuntime, PsfpTarget, TasTarget, apply_schedule, disable_gate, handle_gate_error,
    recover_gate,
};

/// Receiver of frames and completed transmissions
pub trait PacketSink<P> {
    /// A frame arrived on `port`; `frame` is only valid during the call
    fn receive(&mut self, port: usize, frame: &[u8], timestamp: Option<PtpTime>);

    /// The driver is done with `packet`; `timestamp` is its egress time if
    /// one was requested and captured
    fn transmitted(&mut self, port: usize, packet: P, timestamp: Option<PtpTime>);
}

/// R-Switch2 driver instance
///
/// # Type Parameters
/// * `B` - Register bus of the switch window
/// * `C` - PTP clock the gate schedules run on (usually [`Gptp`](crate::hal::ptp::Gptp))
/// * `P` - Packet type handed to [`transmit`](Self::transmit)
/// * `PORTS` - Port blocks provided for (at most `MAX_PORTS`)
/// * `RX_BUFS` / `TX_BUFS` - Descriptors per RX and TX ring
/// * `BUF_SIZE` - Size of each RX buffer
///
/// # Example
/// ```ignore
/// static mut SWITCH: SwitchDefault<VolatileBus, Gptp<VolatileBus>, Frame> =
///     Switch::new(bus, clock, SwitchConfig::new().with_ports(4));
///
/// let switch = unsafe { &mut *core::ptr::addr_of_mut!(SWITCH) };
/// switch.init(&mut mapper, &mut delay)?;
/// ```
pub struct Switch<
    B: RegisterBus,
    C: PtpClock,
    P,
    const PORTS: usize,
    const RX_BUFS: usize,
    const TX_BUFS: usize,
    const BUF_SIZE: usize,
> {
    regs: Registers<B>,
    clock: C,
    config: SwitchConfig,
    state: State,
    ports: [Port<P, RX_BUFS, TX_BUFS, BUF_SIZE>; PORTS],
    stats: [PortStats; PORTS],
    errors: ErrorStatus,
    ts_ring: DescriptorRing<ExtTsDesc, DEFAULT_TS_RING_SIZE>,
    dispatcher: Dispatcher,
    tsn: TsnConfig,
    psfp_gates: [GateRuntime; PSFP_GATES],
}

impl<
    B: RegisterBus,
    C: PtpClock,
    P: TxPacket,
    const PORTS: usize,
    const RX_BUFS: usize,
    const TX_BUFS: usize,
    const BUF_SIZE: usize,
> Switch<B, C, P, PORTS, RX_BUFS, TX_BUFS, BUF_SIZE>
{
    /// Create an uninitialized switch
    ///
    /// This is a const function suitable for static initialization. Nothing
    /// touches hardware until [`init`](Self::init).
    pub const fn new(bus: B, clock: C, config: SwitchConfig) -> Self {
        Self {
            regs: Registers::new(bus, config.revision),
            clock,
            config,
            state: State::Uninitialized,
            ports: [const { Port::new() }; PORTS],
            stats: [PortStats {
                rx_packets: 0,
                rx_bytes: 0,
                rx_dropped: 0,
                rx_errors: 0,
                rx_zero_length: 0,
                tx_packets: 0,
                tx_bytes: 0,
                tx_zero_length: 0,
                tx_busy: 0,
                mapping_failures: 0,
                ts_matched: 0,
                ts_evicted: 0,
                ts_unknown: 0,
                link_repairs: 0,
            }; PORTS],
            errors: ErrorStatus::new(),
            ts_ring: DescriptorRing::new(),
            dispatcher: Dispatcher::new(),
            tsn: TsnConfig::new(),
            psfp_gates: [GateRuntime::IDLE; PSFP_GATES],
        }
    }

    /// Current state
    #[inline(always)]
    pub fn state(&self) -> State {
        self.state
    }

    /// Static driver configuration
    #[inline(always)]
    pub fn switch_config(&self) -> &SwitchConfig {
        &self.config
    }

    /// Active TSN configuration
    #[inline(always)]
    pub fn config(&self) -> &TsnConfig {
        &self.tsn
    }

    /// Register handle
    #[inline(always)]
    pub fn registers(&self) -> &Registers<B> {
        &self.regs
    }

    /// The PTP clock
    #[inline(always)]
    pub fn clock(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Interrupt state of the ports
    #[inline(always)]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Runtime state of a TAS gate
    pub fn gate_runtime(&self, port: usize, gate: usize) -> Option<&GateRuntime> {
        self.ports.get(port)?.gates.get(gate)
    }

    /// Runtime state of a PSFP stream gate
    pub fn psfp_gate_runtime(&self, gate: usize) -> Option<&GateRuntime> {
        self.psfp_gates.get(gate)
    }

    fn ports_in_use(&self) -> usize {
        self.config.ports.min(PORTS)
    }

    pub(super) fn check_running(&self) -> Result<()> {
        match self.state {
            State::Running => Ok(()),
            State::Uninitialized => Err(IoError::InvalidState.into()),
        }
    }

    fn check_port(&self, port: usize) -> Result<()> {
        if port >= self.ports_in_use() {
            return Err(ConfigError::InvalidPort.into());
        }
        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Bring the switch up
    ///
    /// 1. Put the GWCA in configuration mode
    /// 2. Map and format the RX/TX rings of every port and the timestamp ring
    /// 3. Let the GWCA learn every chain
    /// 4. Unmask interrupts, enter operation mode, start the ports
    ///
    /// Any failure releases every mapping made so far and leaves the switch
    /// uninitialized.
    ///
    /// The switch must not move in memory after this call.
    pub fn init<M: DmaMapper, D: DelayNs>(&mut self, mapper: &mut M, delay: &mut D) -> Result<()> {
        if self.state != State::Uninitialized {
            return Err(ConfigError::AlreadyInitialized.into());
        }
        self.config.validate(PORTS)?;
        let ports = self.ports_in_use();

        self.regs.write(Reg::GwModeCtrl, MODE_CONFIG);
        if let Err(err) = self.setup_rings(mapper, delay) {
            rs_warn!("ring setup failed: {}", err);
            self.release_rings(mapper, |_, _| {});
            self.regs.write(Reg::GwModeCtrl, MODE_DISABLE);
            return Err(err);
        }

        self.dispatcher.enable(&self.regs, ports);
        self.regs.write(Reg::GwModeCtrl, MODE_OPERATION);
        for port in 0..ports {
            write_port_mode(&self.regs, port, PortMode::Operation);
            self.ports[port].mode = PortMode::Operation;
        }
        self.state = State::Running;
        rs_info!("switch up, {} ports", ports);
        Ok(())
    }

    fn setup_rings<M: DmaMapper, D: DelayNs>(&mut self, mapper: &mut M, delay: &mut D) -> Result<()> {
        let ports = self.ports_in_use();
        let policy = self.config.poll_policy;
        for port in 0..ports {
            self.ports[port].setup(mapper, &mut self.stats[port])?;
        }
        self.ts_ring.init(mapper)?;
        self.ts_ring.format(DescType::FEmpty)?;

        for port in 0..ports {
            self.ports[port].learn(&self.regs, port, ports, delay, policy)?;
        }
        self.ts_ring.learn(&self.regs, ts_chain(ports), delay, policy)?;
        Ok(())
    }

    fn release_rings<M: DmaMapper>(&mut self, mapper: &mut M, mut f: impl FnMut(usize, P)) {
        for (index, port) in self.ports.iter_mut().enumerate() {
            port.release(mapper, |packet| f(index, packet));
        }
        self.ts_ring.teardown(mapper);
    }

    /// Stop the switch and release every DMA mapping
    ///
    /// Packets still held by the driver are handed to `f`.
    pub fn teardown<M: DmaMapper>(&mut self, mapper: &mut M, f: impl FnMut(usize, P)) {
        let ports = self.ports_in_use();
        self.dispatcher.disable(&self.regs, ports);
        self.regs.write(Reg::GwModeCtrl, MODE_DISABLE);
        for port in 0..ports {
            write_port_mode(&self.regs, port, PortMode::Disable);
            self.ports[port].mode = PortMode::Disable;
        }
        self.release_rings(mapper, f);
        self.state = State::Uninitialized;
        rs_info!("switch down");
    }

    /// Change the mode of a port
    ///
    /// Entering [`PortMode::Config`] writes the shaper and queue setup
    /// staged in the active TSN configuration.
    pub fn set_port_mode(&mut self, port: usize, mode: PortMode) -> Result<()> {
        self.check_running()?;
        self.check_port(port)?;
        write_port_mode(&self.regs, port, mode);
        self.ports[port].mode = mode;
        if mode == PortMode::Config {
            write_queue_config(
                &self.regs,
                port,
                &self.tsn.ports[port],
                self.config.link_speed_kbps,
            );
        }
        rs_debug!("port {} mode {}", port, mode.bits());
        Ok(())
    }

    /// Mode of a port
    pub fn port_mode(&self, port: usize) -> Option<PortMode> {
        self.ports[..self.ports_in_use()].get(port).map(|p| p.mode)
    }

    // =========================================================================
    // TX
    // =========================================================================

    /// Queue a frame for transmission on `port`
    ///
    /// The packet is handed back through [`PacketSink::transmitted`] once
    /// hardware is done with it, or right away inside [`Rejected`].
    ///
    /// # Errors
    /// - `InvalidState` - switch not running
    /// - `InvalidPort` - port not in use
    /// - `InvalidLength` - empty frame
    /// - `FrameTooLarge` - frame exceeds one descriptor
    /// - `NoDescriptorsAvailable` - TX ring full
    pub fn transmit<M: DmaMapper>(
        &mut self,
        port: usize,
        packet: P,
        mapper: &mut M,
    ) -> core::result::Result<Transmitted<P>, Rejected<P>> {
        if let Err(error) = self.check_running().and_then(|()| self.check_port(port)) {
            return Err(Rejected { error, packet });
        }
        let sent = self.ports[port].transmit(port, packet, mapper, &mut self.stats[port])?;
        if sent.evicted.is_some() {
            rs_debug!("port {} timestamp queue evicted a packet", port);
        }
        let (bank, bit) = chain_bit(tx_chain(port, self.ports_in_use()));
        self.regs.write(RegAddr::banked(Reg::GwTxRequest, bank), bit);
        self.ports[port].sync_stats(&mut self.stats[port]);
        Ok(sent)
    }

    /// Free TX descriptors on `port`
    pub fn tx_free(&self, port: usize) -> usize {
        self.ports.get(port).map_or(0, |p| p.tx_ring.free())
    }

    // =========================================================================
    // Interrupts and polling
    // =========================================================================

    /// Interrupt top half
    ///
    /// Masks and marks signalled ports for [`poll`](Self::poll), latches
    /// error causes, and disables any TAS or PSFP gate that reported an
    /// error so [`recover_gates`](Self::recover_gates) can restart it.
    pub fn handle_interrupt(&mut self) -> InterruptStatus {
        let ports = self.ports_in_use();
        let status = self.dispatcher.handle(&self.regs, ports, &mut self.errors);
        if !status.has_error() {
            return status;
        }
        let policy = self.config.poll_policy;
        for port in 0..ports {
            let gates = status.tas_errors[port] & ERR_GATE_MASK;
            if gates == 0 {
                continue;
            }
            let mut target = TasTarget::new(&self.regs, port, policy);
            for gate in (0..QUEUES_PER_PORT).filter(|g| gates & (1 << g) != 0) {
                handle_gate_error(
                    &mut target,
                    &mut self.clock,
                    gate,
                    &mut self.ports[port].gates[gate],
                );
            }
        }
        if status.psfp_errors != 0 {
            let mut target = PsfpTarget::new(&self.regs, policy);
            for gate in (0..PSFP_GATES).filter(|g| status.psfp_errors & (1 << g) != 0) {
                handle_gate_error(&mut target, &mut self.clock, gate, &mut self.psfp_gates[gate]);
            }
        }
        status
    }

    /// Bottom half for one port
    ///
    /// Reclaims sent frames, delivers up to the configured quota of received
    /// frames, re-arms the RX ring and drains the timestamp ring. The port
    /// is unmasked again only when no work is left.
    pub fn poll<M: DmaMapper, S: PacketSink<P>>(
        &mut self,
        port: usize,
        mapper: &mut M,
        sink: &mut S,
    ) -> Result<PollOutcome> {
        self.check_running()?;
        self.check_port(port)?;
        let ports = self.ports_in_use();
        let quota = self.config.poll_quota;

        let stats = &mut self.stats[port];
        let dev = &mut self.ports[port];
        let tx_reclaimed = dev.reap_tx(mapper, stats, |packet, ts| sink.transmitted(port, packet, ts));
        let (rx_delivered, rx_more) =
            dev.poll_rx(quota, stats, |frame, ts| sink.receive(port, frame, ts));
        let (timestamps, ts_more) = self.drain_timestamps(quota, sink);
        let more = rx_more || ts_more;

        self.dispatcher.poll_complete(&self.regs, port, ports, rx_more);
        self.ports[port].sync_stats(&mut self.stats[port]);
        Ok(PollOutcome {
            rx_delivered,
            tx_reclaimed,
            timestamps,
            more,
        })
    }

    /// Run [`poll`](Self::poll) on every port the top half marked
    pub fn poll_pending<M: DmaMapper, S: PacketSink<P>>(
        &mut self,
        mapper: &mut M,
        sink: &mut S,
    ) -> Result<PollOutcome> {
        let mut total = PollOutcome::default();
        for port in 0..self.ports_in_use() {
            if !self.dispatcher.is_pending(port) {
                continue;
            }
            let outcome = self.poll(port, mapper, sink)?;
            total.rx_delivered += outcome.rx_delivered;
            total.tx_reclaimed += outcome.tx_reclaimed;
            total.timestamps += outcome.timestamps;
            total.more |= outcome.more;
        }
        if self.dispatcher.timestamps_pending() {
            let (timestamps, more) = self.drain_timestamps(self.config.poll_quota, sink);
            total.timestamps += timestamps;
            total.more |= more;
        }
        Ok(total)
    }

    /// Match timestamp completions to their frames by tag
    fn drain_timestamps<S: PacketSink<P>>(&mut self, quota: usize, sink: &mut S) -> (usize, bool) {
        let ports = self.ports_in_use();
        let devs = &mut self.ports[..ports];
        let stats = &mut self.stats;
        let (consumed, more) = self.ts_ring.poll_rx(quota, |_, desc, _| {
            let info = desc.info1();
            let tag = (info & info1::TS_TAG_MASK) as u8;
            let port = ((info >> info1::TS_PORT_SHIFT) & info1::TS_PORT_MASK) as usize;
            let Some(ts) = desc.timestamp() else {
                return;
            };
            let Some(dev) = devs.get_mut(port) else {
                rs_warn!("timestamp for unknown port {} (tag {})", port, tag);
                return;
            };
            if let Some((packet, ts)) = dev.complete_timestamp(tag, ts) {
                sink.transmitted(port, packet, Some(ts));
            }
            dev.sync_stats(&mut stats[port]);
        });
        self.ts_ring.refill(DescType::FEmpty, |_, _| {});
        self.dispatcher.timestamps_complete(&self.regs, more);
        // Unmasking rewrites the status word; pick up anything that raced it
        if !more && self.ts_ring.rx_pending() {
            self.dispatcher.timestamps_complete(&self.regs, true);
        }
        (consumed, more || self.dispatcher.timestamps_pending())
    }

    // =========================================================================
    // TSN configuration
    // =========================================================================

    /// Apply an administrative TSN configuration
    ///
    /// The whole configuration is validated before anything is written.
    /// Ports in [`PortMode::Config`] get their shaper and queue registers
    /// written; on the others each gate of an enabled TAS schedule is
    /// (re)programmed and gates left out are disabled. The active copy
    /// returned by [`config`](Self::config) follows every port applied.
    pub fn set_config<D: DelayNs>(&mut self, tsn: &TsnConfig, delay: &mut D) -> Result<()> {
        self.check_running()?;
        let ports = self.ports_in_use();
        tsn.validate(ports, self.config.link_speed_kbps)?;
        let timing = self.config.timing();
        let policy = self.config.poll_policy;

        for port in 0..ports {
            let cfg = &tsn.ports[port];
            if self.ports[port].mode == PortMode::Config {
                write_queue_config(&self.regs, port, cfg, self.config.link_speed_kbps);
            } else {
                let mut target = TasTarget::new(&self.regs, port, policy);
                let gates = &mut self.ports[port].gates;
                let schedule = cfg.schedule.filter(|_| cfg.tas_enabled);
                for gate in 0..QUEUES_PER_PORT {
                    let runtime = &mut gates[gate];
                    match schedule {
                        Some(admin) if cfg.gated_queues & (1 << gate) != 0 => {
                            let plan = apply_schedule(
                                &mut target,
                                &mut self.clock,
                                delay,
                                gate,
                                runtime,
                                &admin,
                                timing,
                            )?;
                            rs_debug!(
                                "port {} gate {} starts at {}",
                                port,
                                gate,
                                plan.config_change_time.as_nanos()
                            );
                        }
                        _ => {
                            if runtime.enabled {
                                disable_gate(&mut target, &mut self.clock, gate, runtime);
                            }
                            runtime.needs_recovery = false;
                        }
                    }
                }
            }
            self.tsn.ports[port] = *cfg;
        }
        Ok(())
    }

    /// Restart every gate a gate error stopped
    ///
    /// TAS gates are re-programmed from the active configuration. Returns
    /// the number of gates restarted. PSFP gates are left to the caller,
    /// who re-applies them with [`set_fwd_config`](Self::set_fwd_config).
    pub fn recover_gates<D: DelayNs>(&mut self, delay: &mut D) -> Result<usize> {
        self.check_running()?;
        let timing = self.config.timing();
        let policy = self.config.poll_policy;
        let mut recovered = 0;
        for port in 0..self.ports_in_use() {
            let cfg = self.tsn.ports[port];
            let mut target = TasTarget::new(&self.regs, port, policy);
            for gate in 0..QUEUES_PER_PORT {
                let runtime = &mut self.ports[port].gates[gate];
                if !runtime.needs_recovery {
                    continue;
                }
                let Some(admin) = cfg.schedule.filter(|_| cfg.tas_enabled) else {
                    runtime.needs_recovery = false;
                    continue;
                };
                let plan = recover_gate(
                    &mut target,
                    &mut self.clock,
                    delay,
                    gate,
                    runtime,
                    &admin,
                    timing,
                )
                .inspect_err(|_| rs_warn!("port {} gate {} recovery failed", port, gate))?;
                if plan.is_some() {
                    runtime.needs_recovery = false;
                    recovered += 1;
                }
            }
        }
        Ok(recovered)
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Counters of one port
    pub fn port_stats(&self, port: usize) -> Option<&PortStats> {
        self.stats[..self.ports_in_use()].get(port)
    }

    /// Error latches and counters
    #[inline(always)]
    pub fn errors(&self) -> &ErrorStatus {
        &self.errors
    }

    /// Clear the error latches, keeping the counters
    pub fn clear_errors(&mut self) {
        self.errors.clear_latches();
    }

    /// Textual snapshot of every counter
    pub fn stats_report(&self) -> StatsReport<'_> {
        StatsReport {
            ports: &self.stats[..self.ports_in_use()],
            errors: &self.errors,
        }
    }

    pub(super) fn fwd_parts(&mut self) -> (&Registers<B>, &mut C, &mut [GateRuntime; PSFP_GATES]) {
        (&self.regs, &mut self.clock, &mut self.psfp_gates)
    }
}

// =============================================================================
// Type Aliases
// =============================================================================

/// Every port, default ring and buffer sizes
pub type SwitchDefault<B, C, P> =
    Switch<B, C, P, MAX_PORTS, DEFAULT_RX_RING_SIZE, DEFAULT_TX_RING_SIZE, DEFAULT_BUFFER_SIZE>;

/// Two ports with short rings, for memory-constrained hosts
pub type SwitchSmall<B, C, P> = Switch<B, C, P, 2, 16, 16, DEFAULT_BUFFER_SIZE>;

// =============================================================================
// Unit Tests
// =============================================================================
