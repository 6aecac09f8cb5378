//! 802.1Qbv egress gates: one gate per TX queue of a port.

use embedded_hal::delay::DelayNs;

use super::{GateEntry, GateTarget};
use crate::driver::error::ConfigResult;
use crate::hal::learn::{PollPolicy, request_and_wait};
use crate::hal::mmio::{RegAddr, RegisterBus, Registers};
use crate::hal::ptp::PtpTime;
use crate::internal::constants::{GATES_PER_STATE_REG, QUEUES_PER_PORT, TAS_TABLE_ENTRIES};
use crate::internal::register::Reg;
use crate::internal::register::port::{
    ENTRY_IPV_MASK, ENTRY_IPV_SHIFT, ENTRY_IPV_VALID, ENTRY_OPEN, GATE_CHANGE_REQ, GATE_ENABLE,
    LIST_LEN_MASK, LIST_SKIP_FIRST, START_SEC_HI_MASK, STATE_IPV_VALID, STATE_NIBBLE_BITS,
    STATE_OPEN, TABLE_ADDR_MASK, TABLE_REQ,
};

/// Gate-table data word for an entry, shared with the PSFP table layout
pub(super) fn entry_state_bits(entry: &GateEntry) -> u32 {
    let mut bits = 0;
    if entry.open {
        bits |= ENTRY_OPEN;
    }
    if let Some(ipv) = entry.ipv {
        bits |= ENTRY_IPV_VALID | ((u32::from(ipv) & ENTRY_IPV_MASK) << ENTRY_IPV_SHIFT);
    }
    bits
}

/// Initial-state nibble of one gate
pub(super) fn initial_state_nibble(open: bool, ipv: Option<u8>) -> u32 {
    let mut nibble = 0;
    if open {
        nibble |= STATE_OPEN;
    }
    if ipv.is_some() {
        nibble |= STATE_IPV_VALID;
    }
    nibble
}

/// Split a cycle start into the (low, mid, high) register values
pub(super) fn split_cycle_start(start: PtpTime) -> (u32, u32, u32) {
    (
        start.nsec,
        start.sec as u32,
        ((start.sec >> 32) & START_SEC_HI_MASK) as u32,
    )
}

/// TAS gates of one port
#[derive(Debug)]
pub struct TasTarget<'a, B: RegisterBus> {
    regs: &'a Registers<B>,
    port: usize,
    policy: PollPolicy,
}

impl<'a, B: RegisterBus> TasTarget<'a, B> {
    /// Table entries per gate
    pub const ENTRIES_PER_GATE: usize = TAS_TABLE_ENTRIES / QUEUES_PER_PORT;

    /// Bind to the TAS block of `port`
    pub fn new(regs: &'a Registers<B>, port: usize, policy: PollPolicy) -> Self {
        Self { regs, port, policy }
    }

    fn at(&self, reg: Reg, gate: usize) -> RegAddr {
        RegAddr::port_banked(reg, self.port, gate)
    }
}

impl<B: RegisterBus> GateTarget for TasTarget<'_, B> {
    fn gate_count(&self) -> usize {
        QUEUES_PER_PORT
    }

    fn table_capacity(&self) -> usize {
        Self::ENTRIES_PER_GATE
    }

    fn write_initial_state(&mut self, gate: usize, open: bool, ipv: Option<u8>) {
        let bank = gate / GATES_PER_STATE_REG;
        let shift = (gate % GATES_PER_STATE_REG) as u32 * STATE_NIBBLE_BITS;
        let nibble = initial_state_nibble(open, ipv);
        self.regs.modify(self.at(Reg::TasInitialState, bank), |v| {
            (v & !(0xF << shift)) | (nibble << shift)
        });
    }

    fn write_cycle_time(&mut self, gate: usize, cycle_time: u32, extension: u32) {
        self.regs.write(self.at(Reg::TasCycleTime, gate), cycle_time);
        self.regs.write(self.at(Reg::TasCycleExt, gate), extension);
    }

    fn write_cycle_start(&mut self, gate: usize, start: PtpTime) {
        let (lo, mid, hi) = split_cycle_start(start);
        self.regs.write(self.at(Reg::TasCycleStartLo, gate), lo);
        self.regs.write(self.at(Reg::TasCycleStartMid, gate), mid);
        self.regs.write(self.at(Reg::TasCycleStartHi, gate), hi);
    }

    fn write_last_interval(&mut self, gate: usize, value: u32) {
        self.regs.write(self.at(Reg::TasLastInterval, gate), value);
    }

    fn write_list_control(&mut self, gate: usize, len: usize, skip_first: bool) {
        let mut value = len as u32 & LIST_LEN_MASK;
        if skip_first {
            value |= LIST_SKIP_FIRST;
        }
        self.regs.write(self.at(Reg::TasListCtrl, gate), value);
    }

    fn write_entry<D: DelayNs>(
        &mut self,
        gate: usize,
        index: usize,
        entry: &GateEntry,
        delay: &mut D,
    ) -> ConfigResult<()> {
        let addr = (gate * Self::ENTRIES_PER_GATE + index) as u32 & TABLE_ADDR_MASK;
        self.regs
            .write(RegAddr::port(Reg::TasTableData0, self.port), entry_state_bits(entry));
        self.regs
            .write(RegAddr::port(Reg::TasTableData1, self.port), entry.interval);
        request_and_wait(
            self.regs,
            RegAddr::port(Reg::TasTableCtrl, self.port),
            TABLE_REQ | addr,
            TABLE_REQ,
            delay,
            self.policy,
        )
    }

    fn trigger_config_change(&mut self, gate: usize) {
        self.regs
            .set_bits(self.at(Reg::TasGateCtrl, gate), GATE_CHANGE_REQ);
    }

    fn config_change_pending(&self, gate: usize) -> bool {
        self.regs.read(self.at(Reg::TasGateCtrl, gate)) & GATE_CHANGE_REQ != 0
    }

    fn enable_at_base_time(&mut self, gate: usize) {
        self.regs.set_bits(self.at(Reg::TasGateCtrl, gate), GATE_ENABLE);
    }

    fn disable(&mut self, gate: usize) {
        self.regs
            .clear_bits(self.at(Reg::TasGateCtrl, gate), GATE_ENABLE | GATE_CHANGE_REQ);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::register::IpRevision;
    use crate::testing::{MockBus, MockDelay};

    fn regs() -> Registers<MockBus> {
        Registers::new(MockBus::new(), IpRevision::V2)
    }

    #[test]
    fn initial_state_packs_nibbles() {
        let regs = regs();
        let mut tas = TasTarget::new(&regs, 1, PollPolicy::default());
        tas.write_initial_state(0, true, None);
        tas.write_initial_state(3, true, Some(2));
        tas.write_initial_state(7, false, Some(0));
        assert_eq!(
            regs.read(RegAddr::port(Reg::TasInitialState, 1)),
            0x1 | (0x3 << 12) | (0x2 << 28)
        );
        tas.write_initial_state(3, false, None);
        assert_eq!(
            regs.read(RegAddr::port(Reg::TasInitialState, 1)),
            0x1 | (0x2 << 28)
        );
    }

    #[test]
    fn cycle_start_split() {
        let regs = regs();
        let mut tas = TasTarget::new(&regs, 0, PollPolicy::default());
        tas.write_cycle_start(2, PtpTime::new(0x1234_5678_9ABC, 999));
        assert_eq!(regs.read(RegAddr::port_banked(Reg::TasCycleStartLo, 0, 2)), 999);
        assert_eq!(
            regs.read(RegAddr::port_banked(Reg::TasCycleStartMid, 0, 2)),
            0x5678_9ABC
        );
        assert_eq!(regs.read(RegAddr::port_banked(Reg::TasCycleStartHi, 0, 2)), 0x1234);
    }

    #[test]
    fn entry_write_uses_table_handshake() {
        let regs = regs();
        let ctrl = regs.offset(RegAddr::port(Reg::TasTableCtrl, 0));
        regs.bus().self_clearing(ctrl, TABLE_REQ);
        let mut tas = TasTarget::new(&regs, 0, PollPolicy::default());
        let mut delay = MockDelay::new();

        let entry = GateEntry {
            open: true,
            ipv: Some(5),
            interval: 1234,
        };
        tas.write_entry(1, 3, &entry, &mut delay).unwrap();

        assert_eq!(
            regs.read(RegAddr::port(Reg::TasTableData0, 0)),
            ENTRY_OPEN | ENTRY_IPV_VALID | (5 << ENTRY_IPV_SHIFT)
        );
        assert_eq!(regs.read(RegAddr::port(Reg::TasTableData1, 0)), 1234);
        let expected_addr = (TasTarget::<MockBus>::ENTRIES_PER_GATE + 3) as u32;
        assert!(regs.bus().writes_to(ctrl).contains(&(TABLE_REQ | expected_addr)));
    }

    #[test]
    fn entry_write_times_out_on_stuck_request() {
        let regs = regs();
        let ctrl = regs.offset(RegAddr::port(Reg::TasTableCtrl, 0));
        regs.bus().set_stuck(ctrl, TABLE_REQ, 0);
        let mut tas = TasTarget::new(&regs, 0, PollPolicy::new(5, 1));
        let mut delay = MockDelay::new();
        assert!(tas
            .write_entry(0, 0, &GateEntry::open(10), &mut delay)
            .is_err());
        assert_eq!(regs.bus().read_count(ctrl), 5);
    }

    #[test]
    fn trigger_enable_disable_bits() {
        let regs = regs();
        let mut tas = TasTarget::new(&regs, 2, PollPolicy::default());
        tas.enable_at_base_time(4);
        tas.trigger_config_change(4);
        assert!(tas.config_change_pending(4));
        assert_eq!(
            regs.read(RegAddr::port_banked(Reg::TasGateCtrl, 2, 4)),
            GATE_ENABLE | GATE_CHANGE_REQ
        );
        tas.disable(4);
        assert_eq!(regs.read(RegAddr::port_banked(Reg::TasGateCtrl, 2, 4)), 0);
    }

    #[test]
    fn list_control_encodes_skip_flag() {
        let regs = regs();
        let mut tas = TasTarget::new(&regs, 0, PollPolicy::default());
        tas.write_list_control(0, 5, true);
        assert_eq!(
            regs.read(RegAddr::port(Reg::TasListCtrl, 0)),
            5 | LIST_SKIP_FIRST
        );
    }
}
