//! Gate Schedule Engine
//!
//! Programs cyclic gate control lists (802.1Qbv egress gates and 802.1Qci
//! ingress stream gates) with absolute activation times on the switch's PTP
//! clock. A gate that is not running is cold-started at its cycle start; a
//! running gate is switched over seamlessly at a cycle boundary through the
//! config-change trigger.
//!
//! The engine is written once against [`GateTarget`]; [`TasTarget`] and
//! [`PsfpTarget`] map it onto the two register blocks.

mod gcl;
mod psfp;
mod tas;

pub use gcl::{
    AdminSchedule, ConfigChange, CycleStart, GateControlList, GateEntry, GateRuntime, MAX_IPV,
    boundary_at_or_after, config_change_time, cycle_start, fold_skip_first, next_boundary_after,
};
pub use psfp::PsfpTarget;
pub use tas::TasTarget;

use embedded_hal::delay::DelayNs;

use crate::driver::error::{ConfigError, ConfigResult};
use crate::hal::ptp::{PtpClock, PtpTime};
use crate::internal::constants::{COLD_START_SETTLE_MS, DEFAULT_SCHEDULE_MARGIN_NS, NSEC_PER_MSEC};
use crate::internal::log::{rs_debug, rs_info, rs_warn};

// =============================================================================
// Register target
// =============================================================================

/// Register block holding a set of schedulable gates
pub trait GateTarget {
    /// Number of gates
    fn gate_count(&self) -> usize;

    /// Gate-control-list table entries available to one gate
    fn table_capacity(&self) -> usize;

    /// Gate state at cycle start
    fn write_initial_state(&mut self, gate: usize, open: bool, ipv: Option<u8>);

    /// Cycle time and extension, in nanoseconds
    fn write_cycle_time(&mut self, gate: usize, cycle_time: u32, extension: u32);

    /// Absolute admin cycle start
    fn write_cycle_start(&mut self, gate: usize, start: PtpTime);

    /// Truncation point of the old list before a pending change
    fn write_last_interval(&mut self, gate: usize, value: u32);

    /// List length and skip-first flag
    fn write_list_control(&mut self, gate: usize, len: usize, skip_first: bool);

    /// Store one list entry and wait for the table handshake
    fn write_entry<D: DelayNs>(
        &mut self,
        gate: usize,
        index: usize,
        entry: &GateEntry,
        delay: &mut D,
    ) -> ConfigResult<()>;

    /// Request a seamless switch to the new list at the cycle start
    fn trigger_config_change(&mut self, gate: usize);

    /// Whether a requested switch has not happened yet
    fn config_change_pending(&self, gate: usize) -> bool;

    /// Cold start: run the list from the cycle start
    fn enable_at_base_time(&mut self, gate: usize);

    /// Stop the gate
    fn disable(&mut self, gate: usize);
}

// =============================================================================
// Engine
// =============================================================================

/// Timing knobs of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScheduleTiming {
    /// Minimum lead time between now and an activation, in nanoseconds
    pub margin_ns: u64,
    /// Minimum time between a disable and the next cold start, in ms
    pub settle_ms: u32,
}

impl Default for ScheduleTiming {
    fn default() -> Self {
        Self {
            margin_ns: DEFAULT_SCHEDULE_MARGIN_NS,
            settle_ms: COLD_START_SETTLE_MS,
        }
    }
}

/// What [`apply_schedule`] programmed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SchedulePlan {
    /// Time the new list takes over
    pub config_change_time: PtpTime,
    /// The change waits on a running gate
    pub pending: bool,
    /// Programmed cycle start
    pub cycle_start: PtpTime,
    /// Programmed last-interval value, if any
    pub last_interval: Option<u32>,
    /// Table entries written
    pub entries: usize,
    /// First entry folded into the last
    pub skip_first: bool,
}

/// Check that `admin` fits gate `gate` of `target`, without writing
pub fn check_schedule<T: GateTarget>(
    target: &T,
    gate: usize,
    admin: &AdminSchedule,
) -> ConfigResult<()> {
    if gate >= target.gate_count() {
        return Err(ConfigError::InvalidGate);
    }
    admin.validate()?;
    let (folded, _) = fold_skip_first(&admin.list);
    if folded.len() > target.table_capacity() {
        return Err(ConfigError::ScheduleTooLong);
    }
    Ok(())
}

/// Program `admin` on one gate and activate it.
///
/// Everything is validated before the first register write. A table
/// handshake timeout aborts the remaining writes and leaves the gate
/// untriggered.
pub fn apply_schedule<T: GateTarget, C: PtpClock, D: DelayNs>(
    target: &mut T,
    clock: &mut C,
    delay: &mut D,
    gate: usize,
    runtime: &mut GateRuntime,
    admin: &AdminSchedule,
    timing: ScheduleTiming,
) -> ConfigResult<SchedulePlan> {
    check_schedule(target, gate, admin)?;

    if runtime.config_pending && !target.config_change_pending(gate) {
        runtime.config_pending = false;
    }

    let base = admin.base_time.as_nanos();
    let cycle = u64::from(admin.cycle_time);

    // Step 1: config-change time
    let now = clock.get_time().as_nanos();
    let change = config_change_time(now, base, cycle, timing.margin_ns, runtime.enabled);
    let mut change_time = change.time_ns;

    // Step 2: cycle start, on a fresh sample. A cold start programs it
    // after the settle wait, right before the enable.
    target.write_cycle_time(gate, admin.cycle_time, admin.cycle_time_extension);
    let live_start = runtime
        .enabled
        .then(|| program_cycle_start(target, clock, gate, admin, timing, change.pending));
    if let Some(start) = live_start.filter(|_| change.pending) {
        change_time = start.start_ns;
    }

    // Step 3: initial gate state
    if let Some(first) = admin.list.as_slice().first() {
        target.write_initial_state(gate, first.open, first.ipv);
    }

    // Step 4: gate control list
    let (list, skip_first) = fold_skip_first(&admin.list);
    for (index, entry) in list.as_slice().iter().enumerate() {
        target
            .write_entry(gate, index, entry, delay)
            .inspect_err(|_| rs_warn!("gate {} list write aborted at entry {}", gate, index))?;
    }
    target.write_list_control(gate, list.len(), skip_first);

    // Step 5: trigger
    let start = match live_start {
        Some(start) => {
            target.trigger_config_change(gate);
            runtime.config_pending = change.pending;
            start
        }
        None => {
            settle_before_cold_start(clock, delay, runtime, timing);
            let start = program_cycle_start(target, clock, gate, admin, timing, false);
            target.enable_at_base_time(gate);
            runtime.enabled = true;
            runtime.config_pending = false;
            start
        }
    };
    runtime.config_change_time = PtpTime::from_nanos(change_time);
    runtime.needs_recovery = false;

    rs_debug!(
        "gate {}: cct {} pending {} start {}",
        gate,
        change_time,
        change.pending,
        start.start_ns
    );

    Ok(SchedulePlan {
        config_change_time: runtime.config_change_time,
        pending: change.pending,
        cycle_start: PtpTime::from_nanos(start.start_ns),
        last_interval: start.last_interval,
        entries: list.len(),
        skip_first,
    })
}

fn program_cycle_start<T: GateTarget, C: PtpClock>(
    target: &mut T,
    clock: &mut C,
    gate: usize,
    admin: &AdminSchedule,
    timing: ScheduleTiming,
    pending: bool,
) -> CycleStart {
    let now = clock.get_time().as_nanos();
    let start = cycle_start(now, admin, timing.margin_ns, pending);
    target.write_cycle_start(gate, PtpTime::from_nanos(start.start_ns));
    if let Some(value) = start.last_interval {
        target.write_last_interval(gate, value);
    }
    start
}

fn settle_before_cold_start<C: PtpClock, D: DelayNs>(
    clock: &mut C,
    delay: &mut D,
    runtime: &GateRuntime,
    timing: ScheduleTiming,
) {
    let Some(disabled_at) = runtime.last_disabled_ns else {
        return;
    };
    let settle_ns = u64::from(timing.settle_ms) * NSEC_PER_MSEC;
    let elapsed = clock.get_time().as_nanos().saturating_sub(disabled_at);
    if elapsed < settle_ns {
        let wait_ms = (settle_ns - elapsed).div_ceil(NSEC_PER_MSEC);
        rs_debug!("waiting {} ms before cold start", wait_ms);
        delay.delay_ms(wait_ms as u32);
    }
}

/// Stop a gate and remember when, for the cold-start settle time
pub fn disable_gate<T: GateTarget, C: PtpClock>(
    target: &mut T,
    clock: &mut C,
    gate: usize,
    runtime: &mut GateRuntime,
) {
    target.disable(gate);
    runtime.enabled = false;
    runtime.config_pending = false;
    runtime.last_disabled_ns = Some(clock.get_time().as_nanos());
}

/// Gate error interrupt: stop the gate and mark it for recovery.
///
/// Clearing `config_pending` makes the next apply a cold start.
pub fn handle_gate_error<T: GateTarget, C: PtpClock>(
    target: &mut T,
    clock: &mut C,
    gate: usize,
    runtime: &mut GateRuntime,
) {
    rs_warn!("gate {} error, disabling", gate);
    disable_gate(target, clock, gate, runtime);
    runtime.needs_recovery = true;
}

/// Re-apply `admin` to a gate marked for recovery
///
/// Returns `Ok(None)` if the gate did not need recovery.
pub fn recover_gate<T: GateTarget, C: PtpClock, D: DelayNs>(
    target: &mut T,
    clock: &mut C,
    delay: &mut D,
    gate: usize,
    runtime: &mut GateRuntime,
    admin: &AdminSchedule,
    timing: ScheduleTiming,
) -> ConfigResult<Option<SchedulePlan>> {
    if !runtime.needs_recovery {
        return Ok(None);
    }
    let plan = apply_schedule(target, clock, delay, gate, runtime, admin, timing)?;
    rs_info!("gate {} recovered", gate);
    Ok(Some(plan))
}
