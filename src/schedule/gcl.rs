//! Administrative gate schedules and the activation-time arithmetic.
//!
//! Everything here is pure: times are nanoseconds on the switch's PTP clock
//! and nothing touches hardware, so the boundary conventions are tested in
//! isolation.

use crate::driver::error::{ConfigError, ConfigResult};
use crate::hal::ptp::PtpTime;
use crate::internal::constants::MAX_GCL_ENTRIES;

/// Highest internal priority value
pub const MAX_IPV: u8 = 7;

// =============================================================================
// Gate control list
// =============================================================================

/// One gate-control-list entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GateEntry {
    /// Gate open for the interval
    pub open: bool,
    /// Internal priority value assigned while the entry is active
    pub ipv: Option<u8>,
    /// Duration in nanoseconds
    pub interval: u32,
}

impl GateEntry {
    /// Open gate, no IPV
    #[must_use]
    pub const fn open(interval: u32) -> Self {
        Self {
            open: true,
            ipv: None,
            interval,
        }
    }

    /// Closed gate, no IPV
    #[must_use]
    pub const fn closed(interval: u32) -> Self {
        Self {
            open: false,
            ipv: None,
            interval,
        }
    }

    /// Same gate state and IPV, ignoring the interval
    #[must_use]
    pub fn same_state(&self, other: &GateEntry) -> bool {
        self.open == other.open && self.ipv == other.ipv
    }
}

/// Fixed-capacity gate control list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateControlList {
    entries: [GateEntry; MAX_GCL_ENTRIES],
    len: usize,
}

impl GateControlList {
    /// Empty list. Const-compatible.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [GateEntry {
                open: false,
                ipv: None,
                interval: 0,
            }; MAX_GCL_ENTRIES],
            len: 0,
        }
    }

    /// Build from a slice
    pub fn from_entries(entries: &[GateEntry]) -> ConfigResult<Self> {
        let mut list = Self::new();
        for entry in entries {
            list.push(*entry)?;
        }
        Ok(list)
    }

    /// Append an entry
    pub fn push(&mut self, entry: GateEntry) -> ConfigResult<()> {
        if self.len == MAX_GCL_ENTRIES {
            return Err(ConfigError::ScheduleTooLong);
        }
        self.entries[self.len] = entry;
        self.len += 1;
        Ok(())
    }

    /// Entries in order
    #[must_use]
    pub fn as_slice(&self) -> &[GateEntry] {
        &self.entries[..self.len]
    }

    /// Number of entries
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// No entries
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sum of all intervals
    #[must_use]
    pub fn total_interval(&self) -> u64 {
        self.as_slice().iter().map(|e| u64::from(e.interval)).sum()
    }
}

impl Default for GateControlList {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold a wrapping first entry into the last one.
///
/// When the first and last entries share state and IPV, the hardware can
/// skip the first entry after the first cycle: the first entry is dropped,
/// its interval added to the last, and the skip-first flag returned.
#[must_use]
pub fn fold_skip_first(list: &GateControlList) -> (GateControlList, bool) {
    let entries = list.as_slice();
    let (Some(first), Some(last)) = (entries.first(), entries.last()) else {
        return (*list, false);
    };
    if entries.len() < 2 || !first.same_state(last) {
        return (*list, false);
    }

    let mut folded = GateControlList::new();
    for entry in &entries[1..] {
        // Cannot overflow: the folded list is shorter than the source
        folded.entries[folded.len] = *entry;
        folded.len += 1;
    }
    let tail = &mut folded.entries[folded.len - 1];
    tail.interval = tail.interval.saturating_add(first.interval);
    (folded, true)
}

// =============================================================================
// Admin schedule and runtime state
// =============================================================================

/// Schedule requested by the administrator for one gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdminSchedule {
    /// Time of the first cycle start
    pub base_time: PtpTime,
    /// Cycle length in nanoseconds
    pub cycle_time: u32,
    /// Maximum stretch of the last cycle before a change, in nanoseconds
    pub cycle_time_extension: u32,
    /// Ordered gate control list
    pub list: GateControlList,
}

impl AdminSchedule {
    /// Check the schedule without touching hardware
    ///
    /// # Errors
    /// - [`ConfigError::InvalidCycleTime`]: zero cycle, or intervals longer
    ///   than the cycle
    /// - [`ConfigError::InvalidConfig`]: empty list, zero interval or IPV
    ///   out of range
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cycle_time == 0 {
            return Err(ConfigError::InvalidCycleTime);
        }
        if self.list.is_empty() {
            return Err(ConfigError::InvalidConfig);
        }
        for entry in self.list.as_slice() {
            if entry.interval == 0 || entry.ipv.is_some_and(|ipv| ipv > MAX_IPV) {
                return Err(ConfigError::InvalidConfig);
            }
        }
        if self.list.total_interval() > u64::from(self.cycle_time) {
            return Err(ConfigError::InvalidCycleTime);
        }
        Ok(())
    }
}

/// Live state of one hardware gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GateRuntime {
    /// Gate is running a schedule
    pub enabled: bool,
    /// A seamless change was requested and has not been observed yet
    pub config_pending: bool,
    /// Time the current (or pending) list takes over
    pub config_change_time: PtpTime,
    /// Clock time of the last disable, in nanoseconds
    pub last_disabled_ns: Option<u64>,
    /// Disabled by a gate error; the stored schedule must be re-applied
    pub needs_recovery: bool,
}

impl GateRuntime {
    /// Idle gate. Const-compatible.
    pub const IDLE: Self = Self {
        enabled: false,
        config_pending: false,
        config_change_time: PtpTime::ZERO,
        last_disabled_ns: None,
        needs_recovery: false,
    };
}

// =============================================================================
// Activation arithmetic
// =============================================================================

/// When the new list takes over, and whether it waits on a live gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigChange {
    /// Config-change time in nanoseconds
    pub time_ns: u64,
    /// Gate is live, so the change must go through the change trigger
    pub pending: bool,
}

/// Config-change time for a schedule.
///
/// A base time further than `margin` ahead is used as is. Otherwise the
/// last boundary at or before `now` is used; a base time inside the margin
/// window counts as zero elapsed cycles.
#[must_use]
pub fn config_change_time(now: u64, base: u64, cycle: u64, margin: u64, enabled: bool) -> ConfigChange {
    let time_ns = if base > now.saturating_add(margin) {
        base
    } else {
        let elapsed = now.saturating_sub(base) / cycle.max(1);
        base + elapsed * cycle
    };
    ConfigChange {
        time_ns,
        pending: enabled,
    }
}

/// First boundary `base + k * cycle` strictly after `now`
///
/// `base` itself when it is still in the future.
#[must_use]
pub fn next_boundary_after(now: u64, base: u64, cycle: u64) -> u64 {
    if base > now {
        return base;
    }
    let elapsed = (now - base) / cycle.max(1);
    base + (elapsed + 1) * cycle
}

/// First boundary `base + k * cycle` at or after `time`
#[must_use]
pub fn boundary_at_or_after(time: u64, base: u64, cycle: u64) -> u64 {
    if base >= time {
        return base;
    }
    let cycles = (time - base).div_ceil(cycle.max(1));
    base + cycles * cycle
}

/// Programmed cycle start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleStart {
    /// Cycle start in nanoseconds
    pub start_ns: u64,
    /// Value for the last-interval register, if the old list is truncated
    pub last_interval: Option<u32>,
}

/// Cycle start for a schedule, from a freshly sampled `now`.
///
/// Not pending: the strict next future boundary. Pending: no earlier than
/// `now + cycle + ext + margin`, so the in-flight cycle completes; when that
/// forced time falls between boundaries the next boundary is used and the
/// last-interval register receives the low 32 bits of the time the final
/// entry before cutover begins (`start - last_entry_interval - ext`).
///
/// The final entry is taken from the list as written to hardware, so after
/// skip-first folding it carries the first entry's interval too.
#[must_use]
pub fn cycle_start(
    now: u64,
    admin: &AdminSchedule,
    margin: u64,
    pending: bool,
) -> CycleStart {
    let base = admin.base_time.as_nanos();
    let cycle = u64::from(admin.cycle_time);
    let ext = u64::from(admin.cycle_time_extension);

    if !pending {
        return CycleStart {
            start_ns: next_boundary_after(now, base, cycle),
            last_interval: None,
        };
    }

    let forced = now + cycle + ext + margin;
    let boundary = boundary_at_or_after(forced, base, cycle);
    if boundary > forced {
        let (written, _) = fold_skip_first(&admin.list);
        let last_entry = written.as_slice().last().map_or(0, |e| u64::from(e.interval));
        CycleStart {
            start_ns: boundary,
            last_interval: Some(boundary.saturating_sub(last_entry + ext) as u32),
        }
    } else {
        CycleStart {
            start_ns: forced,
            last_interval: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::constants::DEFAULT_SCHEDULE_MARGIN_NS;

    fn admin(base: u64, cycle: u32, ext: u32, list: &[GateEntry]) -> AdminSchedule {
        AdminSchedule {
            base_time: PtpTime::from_nanos(base),
            cycle_time: cycle,
            cycle_time_extension: ext,
            list: GateControlList::from_entries(list).unwrap(),
        }
    }

    #[test]
    fn future_base_is_the_change_time() {
        let change = config_change_time(1000, 5000, 1000, 0, false);
        assert_eq!(change, ConfigChange { time_ns: 5000, pending: false });
    }

    #[test]
    fn base_inside_margin_counts_as_started() {
        let change = config_change_time(1000, 5000, 1000, DEFAULT_SCHEDULE_MARGIN_NS, false);
        assert_eq!(change.time_ns, 5000);
    }

    #[test]
    fn past_base_floors_to_last_boundary() {
        let change = config_change_time(10_750, 0, 1000, 0, true);
        assert_eq!(change, ConfigChange { time_ns: 10_000, pending: true });
    }

    #[test]
    fn next_boundary_is_strictly_in_the_future() {
        assert_eq!(next_boundary_after(10_750, 0, 1000), 11_000);
        // Exactly on a boundary: that boundary has passed
        assert_eq!(next_boundary_after(11_000, 0, 1000), 12_000);
        assert_eq!(next_boundary_after(10_999, 0, 1000), 11_000);
        assert_eq!(next_boundary_after(100, 5000, 1000), 5000);
    }

    #[test]
    fn boundary_at_or_after_is_inclusive() {
        assert_eq!(boundary_at_or_after(11_000, 0, 1000), 11_000);
        assert_eq!(boundary_at_or_after(11_001, 0, 1000), 12_000);
        assert_eq!(boundary_at_or_after(300, 500, 1000), 500);
    }

    #[test]
    fn cycle_start_not_pending() {
        let a = admin(0, 1000, 0, &[GateEntry::open(1000)]);
        let start = cycle_start(10_750, &a, 0, false);
        assert_eq!(start, CycleStart { start_ns: 11_000, last_interval: None });
    }

    #[test]
    fn cycle_start_pending_aligns_to_boundary() {
        let a = admin(0, 1000, 100, &[GateEntry::open(600), GateEntry::closed(300)]);
        // forced = 10_750 + 1000 + 100 + 0 = 11_850 -> boundary 12_000
        let start = cycle_start(10_750, &a, 0, true);
        assert_eq!(start.start_ns, 12_000);
        assert_eq!(start.last_interval, Some(12_000 - 300 - 100));
    }

    #[test]
    fn cycle_start_truncates_the_folded_tail() {
        let a = admin(
            0,
            1000,
            0,
            &[GateEntry::open(100), GateEntry::closed(300), GateEntry::open(200)],
        );
        // Hardware runs [closed 300, open 300]; forced = 11_750 -> boundary 12_000
        let start = cycle_start(10_750, &a, 0, true);
        assert_eq!(start.start_ns, 12_000);
        assert_eq!(start.last_interval, Some(12_000 - 300));
    }

    #[test]
    fn cycle_start_pending_on_exact_boundary_uses_forced() {
        let a = admin(0, 1000, 0, &[GateEntry::open(1000)]);
        // forced = 10_000 + 1000 = 11_000, already a boundary
        let start = cycle_start(10_000, &a, 0, true);
        assert_eq!(start, CycleStart { start_ns: 11_000, last_interval: None });
    }

    #[test]
    fn fold_merges_matching_ends() {
        let list = GateControlList::from_entries(&[
            GateEntry::open(100),
            GateEntry::closed(50),
            GateEntry::open(100),
        ])
        .unwrap();
        let (folded, skip) = fold_skip_first(&list);
        assert!(skip);
        assert_eq!(folded.as_slice(), &[GateEntry::closed(50), GateEntry::open(200)]);
    }

    #[test]
    fn fold_keeps_differing_ends() {
        let list =
            GateControlList::from_entries(&[GateEntry::open(100), GateEntry::closed(50)]).unwrap();
        let (folded, skip) = fold_skip_first(&list);
        assert!(!skip);
        assert_eq!(folded, list);
    }

    #[test]
    fn fold_compares_ipv() {
        let list = GateControlList::from_entries(&[
            GateEntry { open: true, ipv: Some(1), interval: 10 },
            GateEntry::closed(10),
            GateEntry { open: true, ipv: Some(2), interval: 10 },
        ])
        .unwrap();
        assert!(!fold_skip_first(&list).1);
    }

    #[test]
    fn single_entry_is_not_folded() {
        let list = GateControlList::from_entries(&[GateEntry::open(100)]).unwrap();
        assert!(!fold_skip_first(&list).1);
    }

    #[test]
    fn list_capacity_is_enforced() {
        let mut list = GateControlList::new();
        for _ in 0..MAX_GCL_ENTRIES {
            list.push(GateEntry::open(1)).unwrap();
        }
        assert_eq!(list.push(GateEntry::open(1)), Err(ConfigError::ScheduleTooLong));
    }

    #[test]
    fn validation_rejects_bad_schedules() {
        assert_eq!(
            admin(0, 0, 0, &[GateEntry::open(1)]).validate(),
            Err(ConfigError::InvalidCycleTime)
        );
        assert_eq!(admin(0, 100, 0, &[]).validate(), Err(ConfigError::InvalidConfig));
        assert_eq!(
            admin(0, 100, 0, &[GateEntry::open(60), GateEntry::closed(60)]).validate(),
            Err(ConfigError::InvalidCycleTime)
        );
        assert_eq!(
            admin(0, 100, 0, &[GateEntry { open: true, ipv: Some(8), interval: 10 }]).validate(),
            Err(ConfigError::InvalidConfig)
        );
        assert_eq!(admin(0, 100, 0, &[GateEntry::open(100)]).validate(), Ok(()));
    }
}
