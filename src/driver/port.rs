//! Per-port DMA state: RX/TX rings, buffers and timestamp correlation.

use embedded_hal::delay::DelayNs;

use super::config::{PortMode, PortTsnConfig};
use super::error::{ConfigResult, DmaError, Error, Result};
use super::stats::PortStats;
use crate::hal::dma_map::{DmaDirection, DmaMapper};
use crate::hal::learn::PollPolicy;
use crate::hal::mmio::{RegAddr, RegisterBus, Registers};
use crate::hal::ptp::PtpTime;
use crate::internal::constants::{MAX_DESC_SIZE, QUEUES_PER_PORT, TS_QUEUE_DEPTH};
use crate::internal::dma::descriptor::bits::info1;
use crate::internal::dma::{
    DescType, Descriptor, DescriptorRing, ExtDesc, ExtTsDesc, RxBufferPool, TsQueue, TxStaging,
    tx_prefix_len,
};
use crate::internal::log::{rs_debug, rs_warn};
use crate::internal::register::gwca::{rx_chain, tx_chain};
use crate::internal::register::port::{
    MODE_MASK, QUEUE_CBS_ENABLE, QUEUE_PREEMPTABLE, QUEUE_TAS_GATED,
};
use crate::internal::register::Reg;
use crate::schedule::GateRuntime;

/// A frame handed to [`Switch::transmit`](super::switch::Switch::transmit)
///
/// The driver keeps the packet until hardware has sent it and gives it back
/// through [`PacketSink::transmitted`](super::switch::PacketSink::transmitted).
///
/// # Safety
///
/// The bytes returned by [`data`](TxPacket::data) are read by DMA after the
/// packet value has been moved into the driver. They must stay at the same
/// address, unchanged, until the packet is handed back: use a handle to
/// memory that lives outside the value (a pool slot, a `&'static [u8]`),
/// never an inline array.
pub unsafe trait TxPacket {
    /// Frame bytes, destination MAC first
    fn data(&self) -> &[u8];

    /// Request an egress timestamp for this frame
    fn wants_timestamp(&self) -> bool {
        false
    }
}

/// An accepted transmit
#[derive(Debug)]
pub struct Transmitted<P> {
    /// Timestamp tag carried by the frame, if one was requested
    pub tag: Option<u8>,
    /// Packet of an older timestamp request that had to be dropped
    pub evicted: Option<P>,
}

/// A refused transmit, with the packet handed back
#[derive(Debug)]
pub struct Rejected<P> {
    /// Why the frame was refused
    pub error: Error,
    /// The untouched packet
    pub packet: P,
}

/// Packet parked in the last descriptor slot of its frame
#[derive(Debug)]
pub(super) struct TxSlot<P> {
    packet: P,
    mapping: Option<(u64, usize)>,
    ts_tag: Option<u8>,
    zero_length: bool,
    len: usize,
}

/// DMA state of one port
pub(super) struct Port<P, const RX: usize, const TX: usize, const BUF: usize> {
    pub(super) rx_ring: DescriptorRing<ExtTsDesc, RX>,
    pub(super) tx_ring: DescriptorRing<ExtDesc, TX>,
    pub(super) rx_pool: RxBufferPool<RX, BUF>,
    pub(super) staging: TxStaging<TX>,
    tx_slots: [Option<TxSlot<P>>; TX],
    pub(super) ts_queue: TsQueue<P, TS_QUEUE_DEPTH>,
    pub(super) mode: PortMode,
    pub(super) gates: [GateRuntime; QUEUES_PER_PORT],
}

impl<P, const RX: usize, const TX: usize, const BUF: usize> Port<P, RX, TX, BUF> {
    pub(super) const fn new() -> Self {
        Self {
            rx_ring: DescriptorRing::new(),
            tx_ring: DescriptorRing::new(),
            rx_pool: RxBufferPool::new(),
            staging: TxStaging::new(),
            tx_slots: [const { None }; TX],
            ts_queue: TsQueue::new(),
            mode: PortMode::Reset,
            gates: [GateRuntime::IDLE; QUEUES_PER_PORT],
        }
    }

    /// Map and format both rings.
    ///
    /// On error everything mapped so far is released again.
    pub(super) fn setup<M: DmaMapper>(&mut self, mapper: &mut M, stats: &mut PortStats) -> Result<()> {
        if let Err(err) = self.map(mapper) {
            self.unmap(mapper);
            return Err(err);
        }
        let failures = self.rx_pool.map_all(mapper);
        stats.mapping_failures += failures as u64;

        let pool = &self.rx_pool;
        self.rx_ring
            .format_with(DescType::FEmpty, |index, desc| pool.bind(index, desc))?;
        self.tx_ring.format(DescType::EEmpty)?;
        self.tx_slots = [const { None }; TX];
        Ok(())
    }

    fn map<M: DmaMapper>(&mut self, mapper: &mut M) -> Result<()> {
        self.rx_ring.init(mapper)?;
        self.tx_ring.init(mapper)?;
        self.staging.map(mapper)?;
        Ok(())
    }

    fn unmap<M: DmaMapper>(&mut self, mapper: &mut M) {
        self.rx_pool.unmap_all(mapper);
        self.staging.unmap(mapper);
        self.tx_ring.teardown(mapper);
        self.rx_ring.teardown(mapper);
    }

    /// Hand both chains to the GWCA
    pub(super) fn learn<B: RegisterBus, D: DelayNs>(
        &self,
        regs: &Registers<B>,
        port: usize,
        ports: usize,
        delay: &mut D,
        policy: PollPolicy,
    ) -> ConfigResult<()> {
        self.rx_ring.learn(regs, rx_chain(port), delay, policy)?;
        self.tx_ring.learn(regs, tx_chain(port, ports), delay, policy)
    }

    /// Release every mapping and give back every packet still held
    pub(super) fn release<M: DmaMapper>(&mut self, mapper: &mut M, mut f: impl FnMut(P)) {
        for slot in &mut self.tx_slots {
            if let Some(slot) = slot.take() {
                if let Some((addr, len)) = slot.mapping {
                    mapper.unmap(addr, len, DmaDirection::ToDevice);
                }
                f(slot.packet);
            }
        }
        self.ts_queue.drain(&mut f);
        self.unmap(mapper);
    }

    /// Fold ring and timestamp counters into `stats`
    pub(super) fn sync_stats(&self, stats: &mut PortStats) {
        let ts = self.ts_queue.counters();
        stats.ts_matched = u64::from(ts.matched);
        stats.ts_evicted = u64::from(ts.evicted);
        stats.ts_unknown = u64::from(ts.unknown);
        stats.link_repairs =
            u64::from(self.rx_ring.link_repairs()) + u64::from(self.tx_ring.link_repairs());
    }

    // =========================================================================
    // TX
    // =========================================================================

    /// Queue a frame on the TX ring.
    ///
    /// Frames no longer than their staging prefix go out as one `FSingle`
    /// descriptor; longer ones as `FStart` (staged head) plus `FEnd` (mapped
    /// remainder). The packet is parked at the last slot of its frame.
    pub(super) fn transmit<M: DmaMapper>(
        &mut self,
        port: usize,
        packet: P,
        mapper: &mut M,
        stats: &mut PortStats,
    ) -> core::result::Result<Transmitted<P>, Rejected<P>>
    where
        P: TxPacket,
    {
        let data = packet.data();
        let len = data.len();
        let reject = |error: Error, packet: P| Err(Rejected { error, packet });
        if len == 0 {
            return reject(DmaError::InvalidLength.into(), packet);
        }
        if len > MAX_DESC_SIZE {
            return reject(DmaError::FrameTooLarge.into(), packet);
        }

        let prefix = tx_prefix_len(data.as_ptr() as usize);
        let single = len <= prefix;
        let needed = if single { 1 } else { 2 };
        if self.tx_ring.free() < needed {
            stats.tx_busy += 1;
            return reject(DmaError::NoDescriptorsAvailable.into(), packet);
        }

        let first = self.tx_ring.cur() % TX;
        let head = &data[..prefix.min(len)];
        let head_addr = match self.staging.stage(first, head) {
            Ok(addr) => addr,
            Err(err) => return reject(err.into(), packet),
        };
        let head_len = head.len();

        let mapping = if single {
            None
        } else {
            let rest = &data[prefix..];
            match mapper.map(rest.as_ptr(), rest.len(), DmaDirection::ToDevice) {
                Some(addr) => Some((addr, rest.len())),
                None => {
                    rs_warn!("port {} tx remainder unmapped, sending zero-length", port);
                    stats.mapping_failures += 1;
                    None
                }
            }
        };
        let zero_length = !single && mapping.is_none();

        let mut evicted = None;
        let ts_tag = if packet.wants_timestamp() {
            let alloc = self.ts_queue.alloc();
            evicted = alloc.evicted;
            Some(alloc.tag)
        } else {
            None
        };

        let mut info = 1u64 << (info1::TX_DEST_SHIFT + port as u32);
        if let Some(tag) = ts_tag {
            info |= info1::TX_TS_REQ | (u64::from(tag) << info1::TX_TS_TAG_SHIFT);
        }

        // Both slots are free, checked above
        let Ok(first) = self.tx_ring.produce() else {
            return reject(DmaError::NoDescriptorsAvailable.into(), packet);
        };
        let head_desc = self.tx_ring.slot(first);
        head_desc.base().set_addr(head_addr);
        head_desc.base().set_size(head_len);
        head_desc.set_info1(info);

        let slot = TxSlot {
            packet,
            mapping,
            ts_tag,
            zero_length,
            len,
        };
        if single {
            self.tx_slots[first] = Some(slot);
            self.tx_ring.publish(first, DescType::FSingle, true);
        } else {
            let Ok(last) = self.tx_ring.produce() else {
                return reject(DmaError::NoDescriptorsAvailable.into(), slot.packet);
            };
            let tail = self.tx_ring.slot(last);
            match mapping {
                Some((addr, rest)) => {
                    tail.base().set_addr(addr);
                    tail.base().set_size(rest);
                }
                None => {
                    tail.base().set_addr(0);
                    tail.base().set_size(0);
                }
            }
            self.tx_slots[last] = Some(slot);
            // Hardware starts at FStart, so the tail must be complete first
            self.tx_ring.publish(last, DescType::FEnd, true);
            self.tx_ring.publish(first, DescType::FStart, false);
        }
        Ok(Transmitted {
            tag: ts_tag,
            evicted,
        })
    }

    /// Reclaim sent frames; returns the number of frames.
    ///
    /// `done` gets each packet whose life in the driver ended, with its
    /// timestamp if the completion already arrived. Packets waiting for a
    /// timestamp stay in the correlation queue.
    pub(super) fn reap_tx<M: DmaMapper>(
        &mut self,
        mapper: &mut M,
        stats: &mut PortStats,
        mut done: impl FnMut(P, Option<PtpTime>),
    ) -> usize {
        let slots = &mut self.tx_slots;
        let ts_queue = &mut self.ts_queue;
        let mut frames = 0;
        self.tx_ring
            .reap(DescType::is_frame_empty, DescType::EEmpty, |index, _| {
                let Some(slot) = slots[index].take() else {
                    return;
                };
                if let Some((addr, len)) = slot.mapping {
                    mapper.unmap(addr, len, DmaDirection::ToDevice);
                }
                frames += 1;
                stats.tx_packets += 1;
                stats.tx_bytes += slot.len as u64;
                if slot.zero_length {
                    stats.tx_zero_length += 1;
                }
                match slot.ts_tag {
                    Some(tag) => match ts_queue.complete_packet(tag, slot.packet) {
                        Ok(Some((packet, ts))) => done(packet, Some(ts)),
                        Ok(None) => {}
                        Err(packet) => done(packet, None),
                    },
                    None => done(slot.packet, None),
                }
            });
        frames
    }

    /// A timestamp for `tag` arrived on the completion ring
    pub(super) fn complete_timestamp(&mut self, tag: u8, ts: PtpTime) -> Option<(P, PtpTime)> {
        self.ts_queue.complete_timestamp(tag, ts).ok().flatten()
    }

    // =========================================================================
    // RX
    // =========================================================================

    /// Deliver received frames, at most `quota` descriptors, then re-arm.
    ///
    /// Frames spanning several descriptors do not fit a buffer and are
    /// dropped. Slots whose buffer never mapped are skipped.
    pub(super) fn poll_rx(
        &mut self,
        quota: usize,
        stats: &mut PortStats,
        mut deliver: impl FnMut(&[u8], Option<PtpTime>),
    ) -> (usize, bool) {
        let pool = &self.rx_pool;
        let mut delivered = 0;
        let (_, more) = self.rx_ring.poll_rx(quota, |index, desc, tag| {
            let base = desc.base();
            match tag {
                DescType::FSingle => {
                    if !pool.is_mapped(index) {
                        stats.rx_zero_length += 1;
                        return;
                    }
                    if base.error_flags() != 0 {
                        stats.rx_errors += 1;
                        stats.rx_dropped += 1;
                        return;
                    }
                    let len = base.size().min(BUF);
                    deliver(&pool.buffer(index)[..len], desc.timestamp());
                    delivered += 1;
                    stats.rx_packets += 1;
                    stats.rx_bytes += len as u64;
                }
                DescType::FStart => {
                    rs_debug!("dropping multi-descriptor frame at slot {}", index);
                    stats.rx_dropped += 1;
                }
                _ => {}
            }
        });
        self.rx_ring
            .refill(DescType::FEmpty, |index, desc| pool.bind(index, desc));
        (delivered, more)
    }
}

// =============================================================================
// Port registers
// =============================================================================

/// Write the mode field of a port block
pub(super) fn write_port_mode<B: RegisterBus>(regs: &Registers<B>, port: usize, mode: PortMode) {
    regs.modify(RegAddr::port(Reg::PortModeCtrl, port), |v| {
        (v & !MODE_MASK) | mode.bits()
    });
}

/// Write CBS and queue control of every queue of a port.
///
/// Only takes effect while the port is in [`PortMode::Config`].
pub(super) fn write_queue_config<B: RegisterBus>(
    regs: &Registers<B>,
    port: usize,
    config: &PortTsnConfig,
    link_speed_kbps: u32,
) {
    for (queue, qc) in config.queues.iter().enumerate() {
        let mut ctrl = 0;
        if let Some(cbs) = qc.cbs {
            regs.write(
                RegAddr::port_banked(Reg::CbsCiv, port, queue),
                cbs.civ(link_speed_kbps),
            );
            regs.write(RegAddr::port_banked(Reg::CbsCul, port, queue), cbs.hi_credit);
            ctrl |= QUEUE_CBS_ENABLE;
        }
        if qc.preemptable {
            ctrl |= QUEUE_PREEMPTABLE;
        }
        if config.tas_enabled && config.gated_queues & (1 << queue) != 0 {
            ctrl |= QUEUE_TAS_GATED;
        }
        regs.write(RegAddr::port_banked(Reg::QueueCtrl, port, queue), ctrl);
    }
}
