//! Testing utilities and mock implementations
//!
//! Mocks for running the driver core on the host without hardware: a
//! register window, a delay, a PTP clock, a DMA mapper and a gate register
//! target.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::vec;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::driver::error::{ConfigError, ConfigResult};
use crate::hal::dma_map::{DmaDirection, DmaMapper};
use crate::hal::mmio::RegisterBus;
use crate::hal::ptp::{PtpClock, PtpTime};
use crate::schedule::{GateEntry, GateTarget};

// =============================================================================
// Mock Register Bus
// =============================================================================

/// Request bit that clears on the nth read after being written
#[derive(Debug, Clone, Copy)]
struct Countdown {
    mask: u32,
    reads: usize,
    remaining: Option<usize>,
}

/// Register window backed by a map
///
/// Unwritten registers read as zero. Hardware behaviour is layered on per
/// offset: bits stuck high or low, request bits that self-clear right away
/// or after a number of polls, and write-1-to-clear status registers.
///
/// # Example
///
/// ```ignore
/// let bus = MockBus::new();
/// bus.self_clearing(0x1_001C, 1 << 31);
/// let regs = Registers::new(bus, IpRevision::V2);
/// ```
#[derive(Debug, Default)]
pub struct MockBus {
    values: RefCell<HashMap<u32, u32>>,
    reads: RefCell<HashMap<u32, usize>>,
    writes: RefCell<HashMap<u32, Vec<u32>>>,
    stuck: RefCell<HashMap<u32, (u32, u32)>>,
    self_clear: RefCell<HashMap<u32, u32>>,
    countdown: RefCell<HashMap<u32, Countdown>>,
    w1c: RefCell<HashSet<u32>>,
    write64s: Cell<usize>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value, bypassing every hook
    pub fn peek(&self, offset: u32) -> u32 {
        self.values.borrow().get(&offset).copied().unwrap_or(0)
    }

    /// Store a value, bypassing every hook (hardware writing a register)
    pub fn poke(&self, offset: u32, value: u32) {
        self.values.borrow_mut().insert(offset, value);
    }

    /// Set a status bit the way hardware raises it
    pub fn raise(&self, offset: u32, bits: u32) {
        let value = self.peek(offset) | bits;
        self.poke(offset, value);
    }

    /// Force bits high (`force_set`) or low (`force_clear`) on every access
    pub fn set_stuck(&self, offset: u32, force_set: u32, force_clear: u32) {
        self.stuck
            .borrow_mut()
            .insert(offset, (force_set, force_clear));
    }

    /// `mask` bits clear as soon as they are written
    pub fn self_clearing(&self, offset: u32, mask: u32) {
        self.self_clear.borrow_mut().insert(offset, mask);
    }

    /// After a write setting `mask`, the bits clear on the nth read
    pub fn clear_after_reads(&self, offset: u32, mask: u32, reads: usize) {
        self.countdown.borrow_mut().insert(
            offset,
            Countdown {
                mask,
                reads,
                remaining: None,
            },
        );
    }

    /// Writing a 1 clears the bit, writing a 0 leaves it
    pub fn write_one_to_clear(&self, offset: u32) {
        self.w1c.borrow_mut().insert(offset);
    }

    /// 32-bit reads of `offset` so far
    pub fn read_count(&self, offset: u32) -> usize {
        self.reads.borrow().get(&offset).copied().unwrap_or(0)
    }

    /// Values written to `offset`, as written
    pub fn writes_to(&self, offset: u32) -> Vec<u32> {
        self.writes.borrow().get(&offset).cloned().unwrap_or_default()
    }

    /// 64-bit writes so far
    pub fn write64_count(&self) -> usize {
        self.write64s.get()
    }

    fn load(&self, offset: u32) -> u32 {
        let value = self.peek(offset);
        match self.stuck.borrow().get(&offset) {
            Some(&(set, clear)) => (value | set) & !clear,
            None => value,
        }
    }

    fn store(&self, offset: u32, value: u32) {
        self.writes
            .borrow_mut()
            .entry(offset)
            .or_default()
            .push(value);

        let mut stored = if self.w1c.borrow().contains(&offset) {
            self.peek(offset) & !value
        } else {
            value
        };
        if let Some(&mask) = self.self_clear.borrow().get(&offset) {
            stored &= !mask;
        }
        if let Some(countdown) = self.countdown.borrow_mut().get_mut(&offset) {
            if value & countdown.mask != 0 {
                countdown.remaining = Some(countdown.reads);
            }
        }
        self.poke(offset, stored);
    }
}

impl RegisterBus for MockBus {
    fn read32(&self, offset: u32) -> u32 {
        *self.reads.borrow_mut().entry(offset).or_default() += 1;

        let mut clear = 0;
        if let Some(countdown) = self.countdown.borrow_mut().get_mut(&offset) {
            if let Some(remaining) = countdown.remaining.as_mut() {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    clear = countdown.mask;
                    countdown.remaining = None;
                }
            }
        }
        if clear != 0 {
            let value = self.peek(offset) & !clear;
            self.poke(offset, value);
        }
        self.load(offset)
    }

    fn write32(&self, offset: u32, value: u32) {
        self.store(offset, value);
    }

    fn read64(&self, offset: u32) -> u64 {
        u64::from(self.load(offset)) | (u64::from(self.load(offset + 4)) << 32)
    }

    fn write64(&self, offset: u32, value: u64) {
        self.write64s.set(self.write64s.get() + 1);
        self.store(offset, value as u32);
        self.store(offset + 4, (value >> 32) as u32);
    }
}

// =============================================================================
// Mock Delay
// =============================================================================

/// Delay that accumulates the requested time, and advances a
/// [`MockClock`] when created through [`MockClock::delay`]
#[derive(Debug, Default)]
pub struct MockDelay {
    total_ns: u64,
    clock: Option<Arc<AtomicU64>>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    fn advance(&mut self, ns: u64) {
        self.total_ns += ns;
        if let Some(clock) = &self.clock {
            clock.fetch_add(ns, Ordering::Relaxed);
        }
    }

    /// Total requested delay in whole milliseconds
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.advance(u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.advance(u64::from(us) * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(u64::from(ms) * 1_000_000);
    }
}

// =============================================================================
// Mock PTP Clock
// =============================================================================

/// PTP clock that returns scripted samples, then holds its last value
#[derive(Debug, Default)]
pub struct MockClock {
    now: Arc<AtomicU64>,
    script: VecDeque<u64>,
    last_ppb: Option<i64>,
}

impl MockClock {
    pub fn new(now_ns: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(now_ns)),
            ..Self::default()
        }
    }

    /// Delay whose waits move this clock forward
    pub fn delay(&self) -> MockDelay {
        MockDelay {
            total_ns: 0,
            clock: Some(Arc::clone(&self.now)),
        }
    }

    /// Queue samples returned by the next `get_time` calls
    pub fn script(&mut self, samples: &[u64]) {
        self.script.extend(samples.iter().copied());
    }

    /// Jump the clock
    pub fn set(&mut self, now_ns: u64) {
        self.now.store(now_ns, Ordering::Relaxed);
    }

    /// Last frequency adjustment requested
    pub fn last_ppb(&self) -> Option<i64> {
        self.last_ppb
    }
}

impl PtpClock for MockClock {
    fn get_time(&mut self) -> PtpTime {
        if let Some(sample) = self.script.pop_front() {
            self.now.store(sample, Ordering::Relaxed);
        }
        PtpTime::from_nanos(self.now.load(Ordering::Relaxed))
    }

    fn set_time(&mut self, time: PtpTime) {
        self.now.store(time.as_nanos(), Ordering::Relaxed);
    }

    fn adjust_frequency(&mut self, ppb: i64) {
        self.last_ppb = Some(ppb);
    }
}

// =============================================================================
// Mock DMA Mapper
// =============================================================================

/// Mapper handing out synthetic 40-bit bus addresses
///
/// Addresses have bits 39:32 set so tests see the high pointer byte used.
#[derive(Debug)]
pub struct MockMapper {
    next_addr: u64,
    calls: usize,
    fail_next: usize,
    fail_at: HashSet<usize>,
    live: HashMap<u64, usize>,
}

impl Default for MockMapper {
    fn default() -> Self {
        Self {
            next_addr: 0x10_0000_0000,
            calls: 0,
            fail_next: 0,
            fail_at: HashSet::new(),
            live: HashMap::new(),
        }
    }
}

impl MockMapper {
    const GRANULE: u64 = 0x1_0000;

    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` map calls
    pub fn fail_next(&mut self, count: usize) {
        self.fail_next = count;
    }

    /// Fail the map call `index` calls from now (0 is the next one)
    pub fn fail_nth(&mut self, index: usize) {
        self.fail_at.insert(self.calls + index);
    }

    /// Mappings not yet released
    pub fn live_mappings(&self) -> usize {
        self.live.len()
    }

    /// Whether `addr` falls inside a live mapping
    pub fn is_mapped(&self, addr: u64) -> bool {
        self.live
            .iter()
            .any(|(&base, &len)| addr >= base && addr < base + len as u64)
    }
}

impl DmaMapper for MockMapper {
    fn map(&mut self, _ptr: *const u8, len: usize, _dir: DmaDirection) -> Option<u64> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return None;
        }
        if self.fail_at.remove(&call) {
            return None;
        }
        let addr = self.next_addr;
        let span = (len as u64).max(1).div_ceil(Self::GRANULE) * Self::GRANULE;
        self.next_addr += span;
        self.live.insert(addr, len);
        Some(addr)
    }

    fn unmap(&mut self, addr: u64, _len: usize, _dir: DmaDirection) {
        self.live.remove(&addr);
    }
}

// =============================================================================
// Mock Gate Target
// =============================================================================

/// Register operation recorded by [`MockGateTarget`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOp {
    InitialState(usize, bool, Option<u8>),
    CycleTime(usize, u32, u32),
    CycleStart(usize, PtpTime),
    LastInterval(usize, u32),
    ListControl(usize, usize, bool),
    Entry(usize, usize),
    Trigger(usize),
    Enable(usize),
    Disable(usize),
}

/// Gate register block that records every operation
#[derive(Debug)]
pub struct MockGateTarget {
    gates: usize,
    capacity: usize,
    ops: Vec<TargetOp>,
    tables: Vec<Vec<GateEntry>>,
    pending: Vec<bool>,
    fail_entry: Option<usize>,
}

impl MockGateTarget {
    pub fn new(gates: usize, capacity: usize) -> Self {
        Self {
            gates,
            capacity,
            ops: Vec::new(),
            tables: vec![Vec::new(); gates],
            pending: vec![false; gates],
            fail_entry: None,
        }
    }

    pub fn ops(&self) -> &[TargetOp] {
        &self.ops
    }

    /// Table entries of the last list written to `gate`
    pub fn entries(&self, gate: usize) -> &[GateEntry] {
        &self.tables[gate]
    }

    /// Table writes at `index` time out
    pub fn fail_entry_at(&mut self, index: usize) {
        self.fail_entry = Some(index);
    }

    /// Hardware completing (or not) a requested list switch
    pub fn set_change_pending(&mut self, gate: usize, pending: bool) {
        self.pending[gate] = pending;
    }
}

impl GateTarget for MockGateTarget {
    fn gate_count(&self) -> usize {
        self.gates
    }

    fn table_capacity(&self) -> usize {
        self.capacity
    }

    fn write_initial_state(&mut self, gate: usize, open: bool, ipv: Option<u8>) {
        self.ops.push(TargetOp::InitialState(gate, open, ipv));
    }

    fn write_cycle_time(&mut self, gate: usize, cycle_time: u32, extension: u32) {
        self.ops.push(TargetOp::CycleTime(gate, cycle_time, extension));
    }

    fn write_cycle_start(&mut self, gate: usize, start: PtpTime) {
        self.ops.push(TargetOp::CycleStart(gate, start));
    }

    fn write_last_interval(&mut self, gate: usize, value: u32) {
        self.ops.push(TargetOp::LastInterval(gate, value));
    }

    fn write_list_control(&mut self, gate: usize, len: usize, skip_first: bool) {
        self.ops.push(TargetOp::ListControl(gate, len, skip_first));
    }

    fn write_entry<D: DelayNs>(
        &mut self,
        gate: usize,
        index: usize,
        entry: &GateEntry,
        _delay: &mut D,
    ) -> ConfigResult<()> {
        if self.fail_entry == Some(index) {
            return Err(ConfigError::LearnTimeout);
        }
        if index == 0 {
            self.tables[gate].clear();
        }
        self.tables[gate].push(*entry);
        self.ops.push(TargetOp::Entry(gate, index));
        Ok(())
    }

    fn trigger_config_change(&mut self, gate: usize) {
        self.pending[gate] = true;
        self.ops.push(TargetOp::Trigger(gate));
    }

    fn config_change_pending(&self, gate: usize) -> bool {
        self.pending[gate]
    }

    fn enable_at_base_time(&mut self, gate: usize) {
        self.ops.push(TargetOp::Enable(gate));
    }

    fn disable(&mut self, gate: usize) {
        self.pending[gate] = false;
        self.ops.push(TargetOp::Disable(gate));
    }
}

// =============================================================================
// Randomness
// =============================================================================

/// Deterministic xorshift64 generator for interleaving tests
#[derive(Debug, Clone)]
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}
