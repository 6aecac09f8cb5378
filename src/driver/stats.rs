//! Statistics and error latches
//!
//! Counters only ever increase. [`ErrorStatus`] is kept apart from the
//! per-port state so a caller can put it behind its own lock.

use core::fmt;

use crate::internal::constants::MAX_PORTS;
use crate::internal::register::{fwd, gwca};

/// Per-port traffic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortStats {
    /// Frames delivered to the host
    pub rx_packets: u64,
    /// Bytes delivered to the host
    pub rx_bytes: u64,
    /// Frames dropped (multi-descriptor frames, errored frames)
    pub rx_dropped: u64,
    /// Frames with hardware error flags
    pub rx_errors: u64,
    /// RX slots completed on a zero-length (unmapped) buffer
    pub rx_zero_length: u64,
    /// Frames reclaimed after transmission
    pub tx_packets: u64,
    /// Bytes reclaimed after transmission
    pub tx_bytes: u64,
    /// Frames sent with a zero-length remainder after a mapping failure
    pub tx_zero_length: u64,
    /// Transmits refused because the ring was full
    pub tx_busy: u64,
    /// Buffer mappings that failed
    pub mapping_failures: u64,
    /// Egress timestamps paired with their frame
    pub ts_matched: u64,
    /// Timestamp entries dropped by tag reuse or a full queue
    pub ts_evicted: u64,
    /// Timestamp completions that matched nothing
    pub ts_unknown: u64,
    /// Link descriptor repairs on this port's rings
    pub link_repairs: u64,
}

/// Counted error causes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorCounters {
    /// Uncorrectable ECC errors
    pub ecc: u32,
    /// Frame buffer overflows
    pub buffer_overflow: u32,
    /// Descriptor area overflows
    pub desc_overflow: u32,
    /// TAS gate errors, all ports
    pub tas_gate: u32,
    /// TAS configuration errors, all ports
    pub tas_config: u32,
    /// Forwarding table errors
    pub fwd_table: u32,
    /// Meter drops
    pub fwd_meter: u32,
    /// PSFP gate errors
    pub psfp_gate: u32,
}

/// Latched hardware error causes with counters
///
/// Latches stay set until [`ErrorStatus::clear_latches`]; counters never
/// reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorStatus {
    /// GWCA causes (`gwca::ERR_*`)
    pub gwca: u32,
    /// TAS gates in error, one byte of gate bits per port
    pub tas_gates: [u8; MAX_PORTS],
    /// Ports that reported a TAS configuration error
    pub tas_config: u8,
    /// Forwarding engine causes (`fwd::ERR_*`)
    pub fwd: u32,
    /// PSFP gates in error
    pub psfp_gates: u32,
    /// Occurrence counters
    pub counters: ErrorCounters,
}

impl ErrorStatus {
    /// Empty status (const-compatible)
    pub const fn new() -> Self {
        Self {
            gwca: 0,
            tas_gates: [0; MAX_PORTS],
            tas_config: 0,
            fwd: 0,
            psfp_gates: 0,
            counters: ErrorCounters {
                ecc: 0,
                buffer_overflow: 0,
                desc_overflow: 0,
                tas_gate: 0,
                tas_config: 0,
                fwd_table: 0,
                fwd_meter: 0,
                psfp_gate: 0,
            },
        }
    }

    /// Record GWCA error causes
    pub fn latch_gwca(&mut self, causes: u32) {
        self.gwca |= causes & gwca::ERR_ALL;
        let c = &mut self.counters;
        if causes & gwca::ERR_ECC != 0 {
            c.ecc = c.ecc.saturating_add(1);
        }
        if causes & gwca::ERR_BUFFER_OVERFLOW != 0 {
            c.buffer_overflow = c.buffer_overflow.saturating_add(1);
        }
        if causes & gwca::ERR_DESC_OVERFLOW != 0 {
            c.desc_overflow = c.desc_overflow.saturating_add(1);
        }
    }

    /// Record TAS causes of one port
    pub fn latch_tas(&mut self, port: usize, gates: u8, config_error: bool) {
        if gates != 0 {
            self.tas_gates[port] |= gates;
            self.counters.tas_gate = self
                .counters
                .tas_gate
                .saturating_add(gates.count_ones());
        }
        if config_error {
            self.tas_config |= 1 << port;
            self.counters.tas_config = self.counters.tas_config.saturating_add(1);
        }
    }

    /// Record forwarding engine causes
    pub fn latch_fwd(&mut self, causes: u32) {
        self.fwd |= causes & (fwd::ERR_TABLE | fwd::ERR_METER);
        if causes & fwd::ERR_TABLE != 0 {
            self.counters.fwd_table = self.counters.fwd_table.saturating_add(1);
        }
        if causes & fwd::ERR_METER != 0 {
            self.counters.fwd_meter = self.counters.fwd_meter.saturating_add(1);
        }
    }

    /// Record PSFP gate errors
    pub fn latch_psfp(&mut self, gates: u32) {
        if gates != 0 {
            self.psfp_gates |= gates;
            self.counters.psfp_gate = self.counters.psfp_gate.saturating_add(gates.count_ones());
        }
    }

    /// Any latch set
    pub fn any(&self) -> bool {
        self.gwca != 0
            || self.tas_gates.iter().any(|&g| g != 0)
            || self.tas_config != 0
            || self.fwd != 0
            || self.psfp_gates != 0
    }

    /// Clear the latches, keeping the counters
    pub fn clear_latches(&mut self) {
        *self = Self {
            counters: self.counters,
            ..Self::new()
        };
    }
}

/// Textual statistics snapshot
///
/// # Example
///
/// ```ignore
/// let report = switch.stats_report();
/// log::info!("{}", report);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StatsReport<'a> {
    /// Per-port counters of the ports in use
    pub ports: &'a [PortStats],
    /// Error latches and counters
    pub errors: &'a ErrorStatus,
}

impl fmt::Display for StatsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, s) in self.ports.iter().enumerate() {
            writeln!(
                f,
                "port{index}: rx {} pkts {} bytes, {} dropped, {} errors, {} zero-length",
                s.rx_packets, s.rx_bytes, s.rx_dropped, s.rx_errors, s.rx_zero_length
            )?;
            writeln!(
                f,
                "port{index}: tx {} pkts {} bytes, {} busy, {} zero-length, {} map failures",
                s.tx_packets, s.tx_bytes, s.tx_busy, s.tx_zero_length, s.mapping_failures
            )?;
            writeln!(
                f,
                "port{index}: ts {} matched {} evicted {} unknown, {} link repairs, tas gates {:#04x}",
                s.ts_matched,
                s.ts_evicted,
                s.ts_unknown,
                s.link_repairs,
                self.errors.tas_gates.get(index).copied().unwrap_or(0)
            )?;
        }
        let e = self.errors;
        let c = &e.counters;
        writeln!(
            f,
            "gwca: status {:#x} ecc {} buffer-overflow {} desc-overflow {}",
            e.gwca, c.ecc, c.buffer_overflow, c.desc_overflow
        )?;
        writeln!(
            f,
            "tas: gate errors {} config errors {} (ports {:#04x})",
            c.tas_gate, c.tas_config, e.tas_config
        )?;
        write!(
            f,
            "fwd: status {:#x} table {} meter {}, psfp gates {:#010x} errors {}",
            e.fwd, c.fwd_table, c.fwd_meter, e.psfp_gates, c.psfp_gate
        )
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::format;

    use super::*;

    #[test]
    fn gwca_causes_latch_and_count() {
        let mut status = ErrorStatus::new();
        status.latch_gwca(gwca::ERR_ECC | gwca::ERR_DESC_OVERFLOW);
        status.latch_gwca(gwca::ERR_ECC);
        assert_eq!(status.gwca, gwca::ERR_ECC | gwca::ERR_DESC_OVERFLOW);
        assert_eq!(status.counters.ecc, 2);
        assert_eq!(status.counters.desc_overflow, 1);
        assert_eq!(status.counters.buffer_overflow, 0);
    }

    #[test]
    fn clear_keeps_counters() {
        let mut status = ErrorStatus::new();
        status.latch_tas(1, 0b101, true);
        status.latch_psfp(1 << 9);
        assert!(status.any());
        status.clear_latches();
        assert!(!status.any());
        assert_eq!(status.counters.tas_gate, 2);
        assert_eq!(status.counters.tas_config, 1);
        assert_eq!(status.counters.psfp_gate, 1);
    }

    #[test]
    fn report_renders_every_port() {
        let ports = [
            PortStats {
                rx_packets: 3,
                rx_bytes: 180,
                ..PortStats::default()
            },
            PortStats {
                tx_packets: 7,
                ..PortStats::default()
            },
        ];
        let mut errors = ErrorStatus::new();
        errors.latch_fwd(fwd::ERR_METER);
        let text = format!(
            "{}",
            StatsReport {
                ports: &ports,
                errors: &errors
            }
        );
        assert!(text.contains("port0: rx 3 pkts 180 bytes"));
        assert!(text.contains("port1: tx 7 pkts"));
        assert!(text.contains("meter 1"));
    }
}
