//! Configuration types for the R-Switch2 driver core
//!
//! [`SwitchConfig`] holds the static driver setup and is consumed by
//! [`Switch::init`](super::switch::Switch::init). [`TsnConfig`] is the
//! administrative TSN state (TAS schedules, CBS and queue setup per port)
//! applied at runtime through
//! [`Switch::set_config`](super::switch::Switch::set_config).

use super::error::{ConfigError, ConfigResult};
use crate::hal::learn::PollPolicy;
use crate::internal::constants::{
    COLD_START_SETTLE_MS, DEFAULT_LINK_SPEED_KBPS, DEFAULT_POLL_QUOTA, DEFAULT_SCHEDULE_MARGIN_NS,
    LEARN_POLL_INTERVAL_MS, LEARN_POLL_ITERATIONS, MAX_PORTS, QUEUES_PER_PORT, TAS_TABLE_ENTRIES,
};
use crate::internal::register::IpRevision;
use crate::schedule::{AdminSchedule, ScheduleTiming, fold_skip_first};

/// Driver lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Rings not set up
    #[default]
    Uninitialized,
    /// Rings learned, GWCA in operation mode
    Running,
}

/// Operating mode of a port block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortMode {
    /// Held in reset
    #[default]
    Reset,
    /// Disabled, registers accessible
    Disable,
    /// Configuration: shaper and queue registers may be changed
    Config,
    /// Forwarding traffic
    Operation,
}

impl PortMode {
    /// Register encoding
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            PortMode::Reset => 0,
            PortMode::Disable => 1,
            PortMode::Config => 2,
            PortMode::Operation => 3,
        }
    }

    /// Decode the mode field
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0 => PortMode::Reset,
            1 => PortMode::Disable,
            2 => PortMode::Config,
            _ => PortMode::Operation,
        }
    }
}

// =============================================================================
// Switch configuration
// =============================================================================

/// Static configuration of the driver core
///
/// # Example
///
/// ```ignore
/// let config = SwitchConfig::new()
///     .with_revision(IpRevision::V1)
///     .with_ports(4)
///     .with_poll_quota(32);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SwitchConfig {
    /// Register layout revision
    pub revision: IpRevision,
    /// Ports in use (at most the switch's port count)
    pub ports: usize,
    /// RX frames handled per poll pass
    pub poll_quota: usize,
    /// Bound of every learn/poll handshake
    pub poll_policy: PollPolicy,
    /// Lead time between now and a schedule activation, in nanoseconds
    pub schedule_margin_ns: u64,
    /// Minimum time between a gate disable and its next cold start, in ms
    pub settle_ms: u32,
    /// Port link speed used for CBS scaling, in kbit/s
    pub link_speed_kbps: u32,
}

impl SwitchConfig {
    /// Default configuration (const-compatible)
    #[must_use]
    pub const fn new() -> Self {
        Self {
            revision: IpRevision::V2,
            ports: 1,
            poll_quota: DEFAULT_POLL_QUOTA,
            poll_policy: PollPolicy::new(LEARN_POLL_ITERATIONS, LEARN_POLL_INTERVAL_MS),
            schedule_margin_ns: DEFAULT_SCHEDULE_MARGIN_NS,
            settle_ms: COLD_START_SETTLE_MS,
            link_speed_kbps: DEFAULT_LINK_SPEED_KBPS,
        }
    }

    /// Set the register layout revision
    #[must_use]
    pub const fn with_revision(mut self, revision: IpRevision) -> Self {
        self.revision = revision;
        self
    }

    /// Set the number of ports in use
    #[must_use]
    pub const fn with_ports(mut self, ports: usize) -> Self {
        self.ports = ports;
        self
    }

    /// Set the RX poll quota
    #[must_use]
    pub const fn with_poll_quota(mut self, quota: usize) -> Self {
        self.poll_quota = quota;
        self
    }

    /// Set the learn/poll bound
    #[must_use]
    pub const fn with_poll_policy(mut self, iterations: u32, interval_ms: u32) -> Self {
        self.poll_policy = PollPolicy::new(iterations, interval_ms);
        self
    }

    /// Set the schedule activation margin
    #[must_use]
    pub const fn with_schedule_margin_ns(mut self, margin_ns: u64) -> Self {
        self.schedule_margin_ns = margin_ns;
        self
    }

    /// Set the cold-start settle time
    #[must_use]
    pub const fn with_settle_ms(mut self, settle_ms: u32) -> Self {
        self.settle_ms = settle_ms;
        self
    }

    /// Set the link speed used for CBS scaling
    #[must_use]
    pub const fn with_link_speed_kbps(mut self, kbps: u32) -> Self {
        self.link_speed_kbps = kbps;
        self
    }

    /// Timing knobs handed to the schedule engine
    #[must_use]
    pub const fn timing(&self) -> ScheduleTiming {
        ScheduleTiming {
            margin_ns: self.schedule_margin_ns,
            settle_ms: self.settle_ms,
        }
    }

    /// Check the configuration against a switch with `max_ports` ports
    pub fn validate(&self, max_ports: usize) -> ConfigResult<()> {
        if self.ports == 0 || self.ports > max_ports || self.ports > MAX_PORTS {
            return Err(ConfigError::InvalidPort);
        }
        if self.poll_quota == 0 || self.poll_policy.iterations == 0 || self.link_speed_kbps == 0 {
            return Err(ConfigError::InvalidConfig);
        }
        Ok(())
    }
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TSN administrative configuration
// =============================================================================

/// Credit-based shaper parameters of one queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CbsConfig {
    /// Reserved bandwidth in kbit/s
    pub idle_slope_kbps: u32,
    /// Credit upper limit in bytes
    pub hi_credit: u32,
}

impl CbsConfig {
    /// Credit increment value: idle slope as a 16.16 fraction of the link
    #[must_use]
    pub const fn civ(&self, link_speed_kbps: u32) -> u32 {
        if link_speed_kbps == 0 {
            return 0;
        }
        ((self.idle_slope_kbps as u64) << 16).div_ceil(link_speed_kbps as u64) as u32
    }

    fn validate(&self, link_speed_kbps: u32) -> ConfigResult<()> {
        if self.idle_slope_kbps == 0 || self.idle_slope_kbps > link_speed_kbps {
            return Err(ConfigError::InvalidConfig);
        }
        Ok(())
    }
}

/// Configuration of one TX queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueConfig {
    /// Frames of this queue may be preempted (802.1Qbu)
    pub preemptable: bool,
    /// Credit-based shaper, if reserved
    pub cbs: Option<CbsConfig>,
}

impl QueueConfig {
    /// Express queue, no shaper
    pub const DEFAULT: Self = Self {
        preemptable: false,
        cbs: None,
    };
}

/// TSN configuration of one port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortTsnConfig {
    /// Run the TAS schedule on this port
    pub tas_enabled: bool,
    /// Queues whose gates follow `schedule`, one bit per queue
    pub gated_queues: u8,
    /// TAS admin schedule
    pub schedule: Option<AdminSchedule>,
    /// Per-queue shaper and preemption setup
    pub queues: [QueueConfig; QUEUES_PER_PORT],
}

impl PortTsnConfig {
    /// TAS off, default queues
    pub const DISABLED: Self = Self {
        tas_enabled: false,
        gated_queues: 0,
        schedule: None,
        queues: [QueueConfig::DEFAULT; QUEUES_PER_PORT],
    };

    /// Gate indices that follow the schedule
    pub fn gates(&self) -> impl Iterator<Item = usize> + '_ {
        (0..QUEUES_PER_PORT).filter(move |q| self.gated_queues & (1 << q) != 0)
    }

    fn validate(&self, link_speed_kbps: u32) -> ConfigResult<()> {
        if self.tas_enabled {
            let schedule = self.schedule.as_ref().ok_or(ConfigError::InvalidConfig)?;
            if self.gated_queues == 0 {
                return Err(ConfigError::InvalidConfig);
            }
            schedule.validate()?;
            let (folded, _) = fold_skip_first(&schedule.list);
            if folded.len() > TAS_TABLE_ENTRIES / QUEUES_PER_PORT {
                return Err(ConfigError::ScheduleTooLong);
            }
        }
        let mut reserved: u64 = 0;
        for cbs in self.queues.iter().filter_map(|q| q.cbs.as_ref()) {
            cbs.validate(link_speed_kbps)?;
            reserved += u64::from(cbs.idle_slope_kbps);
        }
        if reserved > u64::from(link_speed_kbps) {
            return Err(ConfigError::InvalidConfig);
        }
        Ok(())
    }
}

impl Default for PortTsnConfig {
    fn default() -> Self {
        Self::DISABLED
    }
}

/// Administrative TSN configuration of the whole switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsnConfig {
    /// Per-port configuration, indexed by port
    pub ports: [PortTsnConfig; MAX_PORTS],
}

impl TsnConfig {
    /// Everything off (const-compatible)
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ports: [PortTsnConfig::DISABLED; MAX_PORTS],
        }
    }

    /// Check every port before anything is applied
    ///
    /// Ports beyond `ports_in_use` must be left disabled.
    pub fn validate(&self, ports_in_use: usize, link_speed_kbps: u32) -> ConfigResult<()> {
        for (index, port) in self.ports.iter().enumerate() {
            if index >= ports_in_use {
                if *port != PortTsnConfig::DISABLED {
                    return Err(ConfigError::InvalidPort);
                }
                continue;
            }
            port.validate(link_speed_kbps)?;
        }
        Ok(())
    }
}

impl Default for TsnConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::ptp::PtpTime;
    use crate::schedule::{GateControlList, GateEntry};

    fn schedule(entries: &[GateEntry]) -> AdminSchedule {
        AdminSchedule {
            base_time: PtpTime::new(1, 0),
            cycle_time: 1_000_000,
            cycle_time_extension: 0,
            list: GateControlList::from_entries(entries).unwrap(),
        }
    }

    #[test]
    fn builder_sets_fields() {
        let config = SwitchConfig::new()
            .with_revision(IpRevision::V1)
            .with_ports(3)
            .with_poll_quota(16)
            .with_poll_policy(10, 2)
            .with_schedule_margin_ns(5)
            .with_settle_ms(7)
            .with_link_speed_kbps(100_000);

        assert_eq!(config.revision, IpRevision::V1);
        assert_eq!(config.ports, 3);
        assert_eq!(config.poll_quota, 16);
        assert_eq!(config.poll_policy, PollPolicy::new(10, 2));
        assert_eq!(
            config.timing(),
            ScheduleTiming {
                margin_ns: 5,
                settle_ms: 7
            }
        );
        assert_eq!(config.link_speed_kbps, 100_000);
    }

    #[test]
    fn default_matches_new() {
        assert_eq!(SwitchConfig::default(), SwitchConfig::new());
        assert_eq!(SwitchConfig::new().poll_policy, PollPolicy::default());
    }

    #[test]
    fn switch_config_rejects_bad_ports_and_quota() {
        assert_eq!(
            SwitchConfig::new().with_ports(0).validate(4),
            Err(ConfigError::InvalidPort)
        );
        assert_eq!(
            SwitchConfig::new().with_ports(5).validate(4),
            Err(ConfigError::InvalidPort)
        );
        assert_eq!(
            SwitchConfig::new().with_poll_quota(0).validate(4),
            Err(ConfigError::InvalidConfig)
        );
        assert_eq!(SwitchConfig::new().with_ports(4).validate(4), Ok(()));
    }

    #[test]
    fn port_mode_round_trips_register_field() {
        for mode in [PortMode::Reset, PortMode::Disable, PortMode::Config, PortMode::Operation] {
            assert_eq!(PortMode::from_bits(mode.bits()), mode);
        }
    }

    #[test]
    fn cbs_civ_scales_to_link() {
        let cbs = CbsConfig {
            idle_slope_kbps: 250_000,
            hi_credit: 1500,
        };
        assert_eq!(cbs.civ(1_000_000), 1 << 14);
        assert_eq!(cbs.civ(0), 0);
    }

    #[test]
    fn tsn_config_requires_schedule_when_enabled() {
        let mut tsn = TsnConfig::new();
        tsn.ports[0].tas_enabled = true;
        tsn.ports[0].gated_queues = 1;
        assert_eq!(tsn.validate(1, 1_000_000), Err(ConfigError::InvalidConfig));

        tsn.ports[0].schedule = Some(schedule(&[GateEntry::open(500_000)]));
        assert_eq!(tsn.validate(1, 1_000_000), Ok(()));

        tsn.ports[0].gated_queues = 0;
        assert_eq!(tsn.validate(1, 1_000_000), Err(ConfigError::InvalidConfig));
    }

    #[test]
    fn tsn_config_rejects_ports_out_of_use() {
        let mut tsn = TsnConfig::new();
        tsn.ports[3].queues[0].preemptable = true;
        assert_eq!(tsn.validate(2, 1_000_000), Err(ConfigError::InvalidPort));
        assert_eq!(tsn.validate(4, 1_000_000), Ok(()));
    }

    #[test]
    fn tsn_config_rejects_overbooked_cbs() {
        let mut tsn = TsnConfig::new();
        let cbs = CbsConfig {
            idle_slope_kbps: 600_000,
            hi_credit: 1500,
        };
        tsn.ports[0].queues[1].cbs = Some(cbs);
        assert_eq!(tsn.validate(1, 1_000_000), Ok(()));
        tsn.ports[0].queues[2].cbs = Some(cbs);
        assert_eq!(tsn.validate(1, 1_000_000), Err(ConfigError::InvalidConfig));
    }

    #[test]
    fn tsn_config_checks_table_capacity_after_folding() {
        let mut entries = [GateEntry::closed(10); 33];
        entries[0] = GateEntry::open(10);
        entries[32] = GateEntry::open(10);
        let mut tsn = TsnConfig::new();
        tsn.ports[0].tas_enabled = true;
        tsn.ports[0].gated_queues = 0x3;
        tsn.ports[0].schedule = Some(schedule(&entries));
        // 33 entries fold to 32, which fits the per-gate table
        assert_eq!(tsn.validate(1, 1_000_000), Ok(()));
        assert_eq!(tsn.ports[0].gates().count(), 2);
    }
}
