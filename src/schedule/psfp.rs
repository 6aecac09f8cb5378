//! 802.1Qci ingress stream gates in the forwarding engine.

use embedded_hal::delay::DelayNs;

use super::tas::{entry_state_bits, initial_state_nibble, split_cycle_start};
use super::{GateEntry, GateTarget};
use crate::driver::error::ConfigResult;
use crate::hal::learn::{PollPolicy, request_and_wait};
use crate::hal::mmio::{RegAddr, RegisterBus, Registers};
use crate::hal::ptp::PtpTime;
use crate::internal::constants::{GATES_PER_STATE_REG, PSFP_GATES, PSFP_TABLE_ENTRIES};
use crate::internal::register::Reg;
use crate::internal::register::port::{
    GATE_CHANGE_REQ, GATE_ENABLE, LIST_LEN_MASK, LIST_SKIP_FIRST, STATE_NIBBLE_BITS,
    TABLE_ADDR_MASK, TABLE_REQ,
};

/// PSFP stream gates
#[derive(Debug)]
pub struct PsfpTarget<'a, B: RegisterBus> {
    regs: &'a Registers<B>,
    policy: PollPolicy,
}

impl<'a, B: RegisterBus> PsfpTarget<'a, B> {
    /// Table entries per gate
    pub const ENTRIES_PER_GATE: usize = PSFP_TABLE_ENTRIES / PSFP_GATES;

    /// Bind to the forwarding engine
    pub fn new(regs: &'a Registers<B>, policy: PollPolicy) -> Self {
        Self { regs, policy }
    }
}

impl<B: RegisterBus> GateTarget for PsfpTarget<'_, B> {
    fn gate_count(&self) -> usize {
        PSFP_GATES
    }

    fn table_capacity(&self) -> usize {
        Self::ENTRIES_PER_GATE
    }

    fn write_initial_state(&mut self, gate: usize, open: bool, ipv: Option<u8>) {
        let bank = gate / GATES_PER_STATE_REG;
        let shift = (gate % GATES_PER_STATE_REG) as u32 * STATE_NIBBLE_BITS;
        let nibble = initial_state_nibble(open, ipv);
        self.regs
            .modify(RegAddr::banked(Reg::PsfpInitialState, bank), |v| {
                (v & !(0xF << shift)) | (nibble << shift)
            });
    }

    fn write_cycle_time(&mut self, gate: usize, cycle_time: u32, extension: u32) {
        self.regs
            .write(RegAddr::banked(Reg::PsfpCycleTime, gate), cycle_time);
        self.regs
            .write(RegAddr::banked(Reg::PsfpCycleExt, gate), extension);
    }

    fn write_cycle_start(&mut self, gate: usize, start: PtpTime) {
        let (lo, mid, hi) = split_cycle_start(start);
        self.regs.write(RegAddr::banked(Reg::PsfpCycleStartLo, gate), lo);
        self.regs
            .write(RegAddr::banked(Reg::PsfpCycleStartMid, gate), mid);
        self.regs.write(RegAddr::banked(Reg::PsfpCycleStartHi, gate), hi);
    }

    fn write_last_interval(&mut self, gate: usize, value: u32) {
        self.regs
            .write(RegAddr::banked(Reg::PsfpLastInterval, gate), value);
    }

    fn write_list_control(&mut self, gate: usize, len: usize, skip_first: bool) {
        let mut value = len as u32 & LIST_LEN_MASK;
        if skip_first {
            value |= LIST_SKIP_FIRST;
        }
        self.regs.write(RegAddr::banked(Reg::PsfpListCtrl, gate), value);
    }

    fn write_entry<D: DelayNs>(
        &mut self,
        gate: usize,
        index: usize,
        entry: &GateEntry,
        delay: &mut D,
    ) -> ConfigResult<()> {
        let addr = (gate * Self::ENTRIES_PER_GATE + index) as u32 & TABLE_ADDR_MASK;
        self.regs.write(Reg::PsfpTableData0, entry_state_bits(entry));
        self.regs.write(Reg::PsfpTableData1, entry.interval);
        request_and_wait(
            self.regs,
            Reg::PsfpTableCtrl,
            TABLE_REQ | addr,
            TABLE_REQ,
            delay,
            self.policy,
        )
    }

    fn trigger_config_change(&mut self, gate: usize) {
        self.regs
            .set_bits(RegAddr::banked(Reg::PsfpGateCtrl, gate), GATE_CHANGE_REQ);
    }

    fn config_change_pending(&self, gate: usize) -> bool {
        self.regs.read(RegAddr::banked(Reg::PsfpGateCtrl, gate)) & GATE_CHANGE_REQ != 0
    }

    fn enable_at_base_time(&mut self, gate: usize) {
        self.regs
            .set_bits(RegAddr::banked(Reg::PsfpGateCtrl, gate), GATE_ENABLE);
    }

    fn disable(&mut self, gate: usize) {
        self.regs.clear_bits(
            RegAddr::banked(Reg::PsfpGateCtrl, gate),
            GATE_ENABLE | GATE_CHANGE_REQ,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::ptp::PtpClock;
    use crate::internal::register::IpRevision;
    use crate::schedule::{
        AdminSchedule, GateControlList, GateRuntime, ScheduleTiming, apply_schedule,
    };
    use crate::testing::{MockBus, MockClock, MockDelay};

    #[test]
    fn full_apply_on_stream_gate() {
        let regs = Registers::new(MockBus::new(), IpRevision::V2);
        regs.bus()
            .self_clearing(regs.offset(Reg::PsfpTableCtrl), TABLE_REQ);
        let mut psfp = PsfpTarget::new(&regs, PollPolicy::default());
        let mut clock = MockClock::new(0);
        let mut delay = MockDelay::new();
        let mut runtime = GateRuntime::IDLE;
        let admin = AdminSchedule {
            base_time: PtpTime::new(10, 0),
            cycle_time: 1_000_000,
            cycle_time_extension: 0,
            list: GateControlList::from_entries(&[
                GateEntry::open(400_000),
                GateEntry::closed(600_000),
            ])
            .unwrap(),
        };

        apply_schedule(
            &mut psfp,
            &mut clock,
            &mut delay,
            9,
            &mut runtime,
            &admin,
            ScheduleTiming::default(),
        )
        .unwrap();

        assert_eq!(regs.read(RegAddr::banked(Reg::PsfpCycleTime, 9)), 1_000_000);
        assert_eq!(regs.read(RegAddr::banked(Reg::PsfpCycleStartMid, 9)), 10);
        assert_eq!(regs.read(RegAddr::banked(Reg::PsfpListCtrl, 9)), 2);
        assert_eq!(
            regs.read(RegAddr::banked(Reg::PsfpGateCtrl, 9)) & GATE_ENABLE,
            GATE_ENABLE
        );
        // gate 9 sits in the second initial-state register, nibble 1
        assert_eq!(regs.read(RegAddr::banked(Reg::PsfpInitialState, 1)), 0x1 << 4);
        assert_eq!(clock.get_time(), PtpTime::ZERO);
    }

    #[test]
    fn gate_count_and_capacity() {
        let regs = Registers::new(MockBus::new(), IpRevision::V1);
        let psfp = PsfpTarget::new(&regs, PollPolicy::default());
        assert_eq!(psfp.gate_count(), 32);
        assert_eq!(psfp.table_capacity(), 16);
    }
}
