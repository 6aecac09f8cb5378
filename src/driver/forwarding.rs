//! Forwarding engine tables and PSFP stream gates
//!
//! Every table is written the same way: fill the data registers, then post
//! `TABLE_REQ | index` to the control register and wait for the request bit
//! to self-clear.

use embedded_hal::delay::DelayNs;

use super::error::{ConfigError, ConfigResult, Result};
use super::port::TxPacket;
use super::switch::Switch;
use crate::hal::learn::{PollPolicy, request_and_wait};
use crate::hal::mmio::{RegisterBus, Registers};
use crate::hal::ptp::PtpClock;
use crate::internal::constants::{
    L2_TABLE_ENTRIES, MAX_VLAN_ID, METER_ENTRIES, PSFP_GATES, STREAM_FILTER_ENTRIES,
};
use crate::internal::log::{rs_debug, rs_info};
use crate::internal::register::Reg;
use crate::internal::register::fwd::{
    FILTER_GATE_SHIFT, FILTER_GATE_VALID, FILTER_MAX_SDU_MASK, FILTER_METER_SHIFT,
    FILTER_METER_VALID, L2_DEST_MASK, L2_STATIC, L2_VALID, L2_VLAN_SHIFT, METER_DROP_YELLOW,
    TABLE_INDEX_MASK, TABLE_REQ, VLAN_MEMBER_SHIFT, VLAN_UNTAGGED_SHIFT, VLAN_VALID,
};
use crate::schedule::{AdminSchedule, PsfpTarget, apply_schedule, check_schedule};

// =============================================================================
// Table entries
// =============================================================================

/// Static L2 forwarding entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct L2Entry {
    /// Destination MAC address
    pub mac: [u8; 6],
    /// VLAN the address is learned on (0 for untagged)
    pub vlan: u16,
    /// Destination port vector
    pub dest_ports: u8,
    /// Never aged out
    pub static_entry: bool,
}

/// VLAN membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VlanEntry {
    /// VLAN id, also the table index
    pub vid: u16,
    /// Member port vector
    pub members: u8,
    /// Ports that send this VLAN untagged
    pub untagged: u8,
}

/// Ingress rate meter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MeterEntry {
    /// Committed rate
    pub cir_kbps: u32,
    /// Committed burst size
    pub cbs_bytes: u32,
    /// Drop yellow frames instead of marking them
    pub drop_yellow: bool,
}

/// 802.1Qci stream filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamFilter {
    /// Largest SDU let through, in bytes
    pub max_sdu: u16,
    /// PSFP stream gate the stream passes
    pub gate: Option<u8>,
    /// Meter the stream is charged to
    pub meter: Option<u8>,
}

/// Forwarding engine configuration
///
/// L2, meter and filter entries are written at the index of their position
/// in the slice; VLAN entries at their VLAN id. `gates` pairs a PSFP gate
/// index with its schedule.
#[derive(Debug, Clone, Copy, Default)]
pub struct FwdConfig<'a> {
    /// Static L2 entries
    pub l2: &'a [L2Entry],
    /// VLAN table entries
    pub vlans: &'a [VlanEntry],
    /// Meters
    pub meters: &'a [MeterEntry],
    /// Stream filters
    pub filters: &'a [StreamFilter],
    /// PSFP gate schedules
    pub gates: &'a [(usize, AdminSchedule)],
}

/// Port vector mask of the ports in use
const fn port_mask(ports: usize) -> u8 {
    if ports >= 8 {
        0xFF
    } else {
        ((1u16 << ports) - 1) as u8
    }
}

impl FwdConfig<'_> {
    /// Check every table and schedule before anything is written
    ///
    /// # Errors
    /// - [`ConfigError::InvalidConfig`]: a table overflows, or an entry
    ///   refers to a missing meter or gate
    /// - [`ConfigError::InvalidPort`]: a port vector names a port not in use
    /// - [`ConfigError::InvalidGate`]: a gate index is out of range or
    ///   scheduled twice
    /// - Schedule errors of [`check_schedule`]
    pub fn validate<B: RegisterBus>(
        &self,
        regs: &Registers<B>,
        ports_in_use: usize,
        policy: PollPolicy,
    ) -> ConfigResult<()> {
        let outside = !port_mask(ports_in_use);
        if self.l2.len() > L2_TABLE_ENTRIES
            || self.meters.len() > METER_ENTRIES
            || self.filters.len() > STREAM_FILTER_ENTRIES
        {
            return Err(ConfigError::InvalidConfig);
        }
        for entry in self.l2 {
            if entry.vlan > MAX_VLAN_ID {
                return Err(ConfigError::InvalidConfig);
            }
            if entry.dest_ports & outside != 0 {
                return Err(ConfigError::InvalidPort);
            }
        }
        for entry in self.vlans {
            if entry.vid > MAX_VLAN_ID || entry.untagged & !entry.members != 0 {
                return Err(ConfigError::InvalidConfig);
            }
            if entry.members & outside != 0 {
                return Err(ConfigError::InvalidPort);
            }
        }
        for filter in self.filters {
            if filter
                .meter
                .is_some_and(|m| usize::from(m) >= self.meters.len())
            {
                return Err(ConfigError::InvalidConfig);
            }
            if filter.gate.is_some_and(|g| usize::from(g) >= PSFP_GATES) {
                return Err(ConfigError::InvalidGate);
            }
        }

        let target = PsfpTarget::new(regs, policy);
        let mut seen: u32 = 0;
        for (gate, admin) in self.gates {
            check_schedule(&target, *gate, admin)?;
            if seen & (1 << gate) != 0 {
                return Err(ConfigError::InvalidGate);
            }
            seen |= 1 << gate;
        }
        Ok(())
    }

    /// Write the L2, VLAN, meter and filter tables
    ///
    /// Returns the number of entries written. Gates are not touched.
    ///
    /// # Errors
    /// [`ConfigError::LearnTimeout`] if a table write is never
    /// acknowledged; the entries before it stay written.
    pub fn write_tables<B: RegisterBus, D: DelayNs>(
        &self,
        regs: &Registers<B>,
        delay: &mut D,
        policy: PollPolicy,
    ) -> ConfigResult<usize> {
        for (index, entry) in self.l2.iter().enumerate() {
            write_l2(regs, index, entry, delay, policy)?;
        }
        for entry in self.vlans {
            write_vlan(regs, entry, delay, policy)?;
        }
        for (index, entry) in self.meters.iter().enumerate() {
            write_meter(regs, index, entry, delay, policy)?;
        }
        for (index, filter) in self.filters.iter().enumerate() {
            write_filter(regs, index, filter, delay, policy)?;
        }
        let written = self.l2.len() + self.vlans.len() + self.meters.len() + self.filters.len();
        rs_debug!("fwd tables: {} entries", written);
        Ok(written)
    }
}

fn table_request(index: usize) -> u32 {
    TABLE_REQ | (index as u32 & TABLE_INDEX_MASK)
}

fn write_l2<B: RegisterBus, D: DelayNs>(
    regs: &Registers<B>,
    index: usize,
    entry: &L2Entry,
    delay: &mut D,
    policy: PollPolicy,
) -> ConfigResult<()> {
    let [m0, m1, m2, m3, m4, m5] = entry.mac;
    let mut data2 = (u32::from(entry.dest_ports) & L2_DEST_MASK) | L2_VALID;
    if entry.static_entry {
        data2 |= L2_STATIC;
    }
    regs.write(Reg::FwdL2Data0, u32::from_be_bytes([m2, m3, m4, m5]));
    regs.write(
        Reg::FwdL2Data1,
        u32::from(u16::from_be_bytes([m0, m1])) | (u32::from(entry.vlan) << L2_VLAN_SHIFT),
    );
    regs.write(Reg::FwdL2Data2, data2);
    request_and_wait(regs, Reg::FwdL2Ctrl, table_request(index), TABLE_REQ, delay, policy)
}

fn write_vlan<B: RegisterBus, D: DelayNs>(
    regs: &Registers<B>,
    entry: &VlanEntry,
    delay: &mut D,
    policy: PollPolicy,
) -> ConfigResult<()> {
    regs.write(
        Reg::FwdVlanData,
        (u32::from(entry.members) << VLAN_MEMBER_SHIFT)
            | (u32::from(entry.untagged) << VLAN_UNTAGGED_SHIFT)
            | VLAN_VALID,
    );
    request_and_wait(
        regs,
        Reg::FwdVlanCtrl,
        table_request(usize::from(entry.vid)),
        TABLE_REQ,
        delay,
        policy,
    )
}

fn write_meter<B: RegisterBus, D: DelayNs>(
    regs: &Registers<B>,
    index: usize,
    entry: &MeterEntry,
    delay: &mut D,
    policy: PollPolicy,
) -> ConfigResult<()> {
    let mut data1 = entry.cbs_bytes & !METER_DROP_YELLOW;
    if entry.drop_yellow {
        data1 |= METER_DROP_YELLOW;
    }
    regs.write(Reg::FwdMeterData0, entry.cir_kbps);
    regs.write(Reg::FwdMeterData1, data1);
    request_and_wait(regs, Reg::FwdMeterCtrl, table_request(index), TABLE_REQ, delay, policy)
}

fn write_filter<B: RegisterBus, D: DelayNs>(
    regs: &Registers<B>,
    index: usize,
    filter: &StreamFilter,
    delay: &mut D,
    policy: PollPolicy,
) -> ConfigResult<()> {
    let mut data1 = 0;
    if let Some(gate) = filter.gate {
        data1 |= (u32::from(gate) << FILTER_GATE_SHIFT) | FILTER_GATE_VALID;
    }
    if let Some(meter) = filter.meter {
        data1 |= (u32::from(meter) << FILTER_METER_SHIFT) | FILTER_METER_VALID;
    }
    regs.write(Reg::FwdFilterData0, u32::from(filter.max_sdu) & FILTER_MAX_SDU_MASK);
    regs.write(Reg::FwdFilterData1, data1);
    request_and_wait(regs, Reg::FwdFilterCtrl, table_request(index), TABLE_REQ, delay, policy)
}

// =============================================================================
// Switch entry point
// =============================================================================

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
    /// Program the forwarding tables and the PSFP stream gates
    ///
    /// Validates everything first, then writes the tables and applies each
    /// gate schedule. PSFP gates stopped by a gate error come back through
    /// this call.
    pub fn set_fwd_config<D: DelayNs>(&mut self, fwd: &FwdConfig<'_>, delay: &mut D) -> Result<()> {
        self.check_running()?;
        let ports = self.switch_config().ports.min(PORTS);
        let policy = self.switch_config().poll_policy;
        let timing = self.switch_config().timing();
        fwd.validate(self.registers(), ports, policy)?;

        let (regs, clock, runtimes) = self.fwd_parts();
        fwd.write_tables(regs, delay, policy)?;
        let mut target = PsfpTarget::new(regs, policy);
        for (gate, admin) in fwd.gates {
            apply_schedule(&mut target, clock, delay, *gate, &mut runtimes[*gate], admin, timing)?;
        }
        rs_info!("fwd config applied, {} stream gates", fwd.gates.len());
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::ptp::PtpTime;
    use crate::internal::register::IpRevision;
    use crate::schedule::{GateControlList, GateEntry};
    use crate::testing::{MockBus, MockDelay};

    fn regs() -> Registers<MockBus> {
        let regs = Registers::new(MockBus::new(), IpRevision::V2);
        for ctrl in [Reg::FwdL2Ctrl, Reg::FwdVlanCtrl, Reg::FwdMeterCtrl, Reg::FwdFilterCtrl] {
            let offset = regs.offset(ctrl);
            regs.bus().self_clearing(offset, TABLE_REQ);
        }
        regs
    }

    fn schedule() -> AdminSchedule {
        AdminSchedule {
            base_time: PtpTime::new(1, 0),
            cycle_time: 1_000_000,
            cycle_time_extension: 0,
            list: GateControlList::from_entries(&[
                GateEntry::open(400_000),
                GateEntry::closed(600_000),
            ])
            .unwrap(),
        }
    }

    const L2: [L2Entry; 2] = [
        L2Entry {
            mac: [0x02, 0x11, 0x22, 0x33, 0x44, 0x55],
            vlan: 10,
            dest_ports: 0b10,
            static_entry: true,
        },
        L2Entry {
            mac: [0xFF; 6],
            vlan: 0,
            dest_ports: 0b11,
            static_entry: false,
        },
    ];

    #[test]
    fn l2_entry_encoding() {
        let regs = regs();
        let mut delay = MockDelay::new();
        let fwd = FwdConfig {
            l2: &L2[..1],
            ..FwdConfig::default()
        };
        assert_eq!(fwd.write_tables(&regs, &mut delay, PollPolicy::default()), Ok(1));

        assert_eq!(regs.read(Reg::FwdL2Data0), 0x2233_4455);
        assert_eq!(regs.read(Reg::FwdL2Data1), 0x0211 | (10 << L2_VLAN_SHIFT));
        assert_eq!(regs.read(Reg::FwdL2Data2), 0b10 | L2_VALID | L2_STATIC);
        let ctrl = regs.offset(Reg::FwdL2Ctrl);
        assert_eq!(regs.bus().writes_to(ctrl), [TABLE_REQ]);
    }

    #[test]
    fn every_table_is_indexed() {
        let regs = regs();
        let mut delay = MockDelay::new();
        let vlans = [VlanEntry {
            vid: 100,
            members: 0b11,
            untagged: 0b01,
        }];
        let meters = [
            MeterEntry::default(),
            MeterEntry {
                cir_kbps: 5_000,
                cbs_bytes: 1_500,
                drop_yellow: true,
            },
        ];
        let filters = [StreamFilter {
            max_sdu: 1522,
            gate: Some(3),
            meter: Some(1),
        }];
        let fwd = FwdConfig {
            l2: &L2,
            vlans: &vlans,
            meters: &meters,
            filters: &filters,
            gates: &[],
        };
        assert_eq!(fwd.write_tables(&regs, &mut delay, PollPolicy::default()), Ok(6));

        let bus = regs.bus();
        assert_eq!(bus.writes_to(regs.offset(Reg::FwdL2Ctrl)), [TABLE_REQ, TABLE_REQ | 1]);
        assert_eq!(bus.writes_to(regs.offset(Reg::FwdVlanCtrl)), [TABLE_REQ | 100]);
        assert_eq!(regs.read(Reg::FwdVlanData), 0b11 | (0b01 << 8) | VLAN_VALID);
        assert_eq!(
            bus.writes_to(regs.offset(Reg::FwdMeterCtrl)),
            [TABLE_REQ, TABLE_REQ | 1]
        );
        assert_eq!(regs.read(Reg::FwdMeterData0), 5_000);
        assert_eq!(regs.read(Reg::FwdMeterData1), 1_500 | METER_DROP_YELLOW);
        assert_eq!(regs.read(Reg::FwdFilterData0), 1522);
        assert_eq!(
            regs.read(Reg::FwdFilterData1),
            (3 << FILTER_GATE_SHIFT) | FILTER_GATE_VALID | 1 | FILTER_METER_VALID
        );
    }

    #[test]
    fn stuck_request_times_out() {
        let regs = Registers::new(MockBus::new(), IpRevision::V2);
        let mut delay = MockDelay::new();
        let fwd = FwdConfig {
            l2: &L2,
            ..FwdConfig::default()
        };
        assert_eq!(
            fwd.write_tables(&regs, &mut delay, PollPolicy::new(3, 1)),
            Err(ConfigError::LearnTimeout)
        );
        assert_eq!(regs.bus().writes_to(regs.offset(Reg::FwdL2Ctrl)).len(), 1);
    }

    #[test]
    fn validation_rejects_bad_references() {
        let regs = regs();
        let policy = PollPolicy::default();

        let ok = FwdConfig {
            l2: &L2,
            ..FwdConfig::default()
        };
        assert_eq!(ok.validate(&regs, 2, policy), Ok(()));
        assert_eq!(ok.validate(&regs, 1, policy), Err(ConfigError::InvalidPort));

        let dangling_meter = [StreamFilter {
            max_sdu: 100,
            gate: None,
            meter: Some(0),
        }];
        let fwd = FwdConfig {
            filters: &dangling_meter,
            ..FwdConfig::default()
        };
        assert_eq!(fwd.validate(&regs, 2, policy), Err(ConfigError::InvalidConfig));

        let bad_vlan = [VlanEntry {
            vid: 4096,
            members: 1,
            untagged: 0,
        }];
        let fwd = FwdConfig {
            vlans: &bad_vlan,
            ..FwdConfig::default()
        };
        assert_eq!(fwd.validate(&regs, 2, policy), Err(ConfigError::InvalidConfig));

        let twice = [(4, schedule()), (4, schedule())];
        let fwd = FwdConfig {
            gates: &twice,
            ..FwdConfig::default()
        };
        assert_eq!(fwd.validate(&regs, 2, policy), Err(ConfigError::InvalidGate));

        let out_of_range = [(PSFP_GATES, schedule())];
        let fwd = FwdConfig {
            gates: &out_of_range,
            ..FwdConfig::default()
        };
        assert_eq!(fwd.validate(&regs, 2, policy), Err(ConfigError::InvalidGate));
    }
}
