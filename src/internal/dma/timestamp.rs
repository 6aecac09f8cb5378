//! TX timestamp correlation.
//!
//! A frame that asks for an egress timestamp gets an 8-bit tag carried in
//! its TX descriptor. Hardware reports the timestamp on a separate ring,
//! possibly before the TX slot is reaped, so each entry waits for both
//! halves: the reclaimed packet and the timestamp. Matching is by tag,
//! never by arrival order.

use crate::driver::error::IoError;
use crate::hal::ptp::PtpTime;
use crate::internal::constants::TS_TAG_COUNT;
use crate::internal::log::{rs_debug, rs_warn};

struct TsEntry<P> {
    tag: u8,
    seq: u32,
    packet: Option<P>,
    timestamp: Option<PtpTime>,
}

/// Counters of one correlation queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TsCounters {
    /// Packet and timestamp paired
    pub matched: u32,
    /// Entries dropped by tag reuse or a full queue
    pub evicted: u32,
    /// Completions whose tag matched nothing
    pub unknown: u32,
}

/// Outcome of reserving a tag
#[derive(Debug)]
pub struct TsAlloc<P> {
    /// Tag to carry in the TX descriptor
    pub tag: u8,
    /// Packet of an evicted entry, to be completed without a timestamp
    pub evicted: Option<P>,
}

/// Per-port correlation queue of `DEPTH` outstanding entries
pub struct TsQueue<P, const DEPTH: usize> {
    entries: [Option<TsEntry<P>>; DEPTH],
    next_tag: u8,
    next_seq: u32,
    counters: TsCounters,
}

impl<P, const DEPTH: usize> TsQueue<P, DEPTH> {
    /// Create an empty queue. Const-compatible.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [const { None }; DEPTH],
            next_tag: 0,
            next_seq: 0,
            counters: TsCounters {
                matched: 0,
                evicted: 0,
                unknown: 0,
            },
        }
    }

    /// Outstanding entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// No outstanding entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(Option::is_none)
    }

    /// Counters since creation
    #[must_use]
    pub fn counters(&self) -> TsCounters {
        self.counters
    }

    /// Reserve the next tag.
    ///
    /// A tag still outstanding from a previous lap is stale and evicted; a
    /// full queue evicts its oldest entry.
    pub fn alloc(&mut self) -> TsAlloc<P> {
        let tag = self.next_tag;
        self.next_tag = (self.next_tag + 1) % TS_TAG_COUNT;

        let mut evicted = None;
        let victim = self
            .position(|e| e.tag == tag)
            .or_else(|| self.free_slot().is_none().then(|| self.oldest()).flatten());
        if let Some(index) = victim {
            if let Some(entry) = self.entries[index].take() {
                rs_warn!("evicting timestamp tag {}", entry.tag);
                self.counters.evicted = self.counters.evicted.saturating_add(1);
                evicted = entry.packet;
            }
        }

        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        if let Some(index) = self.free_slot() {
            self.entries[index] = Some(TsEntry {
                tag,
                seq,
                packet: None,
                timestamp: None,
            });
        }
        TsAlloc { tag, evicted }
    }

    /// The TX slot carrying `tag` was reclaimed.
    ///
    /// Returns the pair if the timestamp already arrived, `Ok(None)` while
    /// waiting for it, and gives the packet back if the tag is unknown.
    pub fn complete_packet(&mut self, tag: u8, packet: P) -> Result<Option<(P, PtpTime)>, P> {
        let Some(index) = self.position(|e| e.tag == tag && e.packet.is_none()) else {
            self.counters.unknown = self.counters.unknown.saturating_add(1);
            return Err(packet);
        };
        let timestamp = self.entries[index].as_ref().and_then(|e| e.timestamp);
        match timestamp {
            Some(ts) => {
                self.entries[index] = None;
                self.counters.matched = self.counters.matched.saturating_add(1);
                Ok(Some((packet, ts)))
            }
            None => {
                if let Some(entry) = self.entries[index].as_mut() {
                    entry.packet = Some(packet);
                }
                Ok(None)
            }
        }
    }

    /// Hardware reported the timestamp for `tag`.
    ///
    /// Returns the pair if the packet was already reclaimed.
    pub fn complete_timestamp(
        &mut self,
        tag: u8,
        timestamp: PtpTime,
    ) -> Result<Option<(P, PtpTime)>, IoError> {
        let Some(index) = self.position(|e| e.tag == tag && e.timestamp.is_none()) else {
            rs_debug!("timestamp for unknown tag {}", tag);
            self.counters.unknown = self.counters.unknown.saturating_add(1);
            return Err(IoError::UnknownTimestampTag);
        };
        let packet = self.entries[index].as_mut().and_then(|e| e.packet.take());
        match packet {
            Some(packet) => {
                self.entries[index] = None;
                self.counters.matched = self.counters.matched.saturating_add(1);
                Ok(Some((packet, timestamp)))
            }
            None => {
                if let Some(entry) = self.entries[index].as_mut() {
                    entry.timestamp = Some(timestamp);
                }
                Ok(None)
            }
        }
    }

    /// Drop every entry, handing back packets still held
    pub fn drain(&mut self, mut f: impl FnMut(P)) {
        for slot in &mut self.entries {
            if let Some(packet) = slot.take().and_then(|e| e.packet) {
                f(packet);
            }
        }
    }

    fn position(&self, pred: impl Fn(&TsEntry<P>) -> bool) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.as_ref().is_some_and(&pred))
    }

    fn free_slot(&self) -> Option<usize> {
        self.entries.iter().position(Option::is_none)
    }

    fn oldest(&self) -> Option<usize> {
        let now = self.next_seq;
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (i, now.wrapping_sub(e.seq))))
            .max_by_key(|&(_, age)| age)
            .map(|(i, _)| i)
    }
}

impl<P, const DEPTH: usize> Default for TsQueue<P, DEPTH> {
    fn default() -> Self {
        Self::new()
    }
}
