//! Centralized Constants
//!
//! Single source of truth for the magic numbers used by the driver core.
//!
//! # Organization
//!
//! - **Topology**: ports, queues, gates
//! - **Rings and buffers**: descriptor ring limits, buffer sizes, alignment
//! - **Timing**: learn/poll policy, schedule margins, settle times
//! - **Timestamps**: tag space and correlation queue depth
//!
//! Hardware register bit definitions stay in `internal::register`.

// =============================================================================
// Topology
// =============================================================================

/// Maximum number of Ethernet ports (ETHA/RMAC instances) on one switch
pub const MAX_PORTS: usize = 8;

/// Transmit queues (and therefore TAS gates) per port
pub const QUEUES_PER_PORT: usize = 8;

/// Gates packed into one initial-gate-state register (4 bits each)
pub const GATES_PER_STATE_REG: usize = 8;

/// Maximum entries in one administrative gate control list
pub const MAX_GCL_ENTRIES: usize = 64;

/// TAS gate-control-list table entries available per port
pub const TAS_TABLE_ENTRIES: usize = 256;

/// PSFP ingress stream gates in the forwarding engine
pub const PSFP_GATES: usize = 32;

/// PSFP gate-control-list table entries shared by all stream gates
pub const PSFP_TABLE_ENTRIES: usize = 512;

// =============================================================================
// Rings and Buffers
// =============================================================================

/// Smallest usable ring: one slot in flight plus one free slot
pub const MIN_RING_SIZE: usize = 2;

/// Largest ring addressable by the 12-bit descriptor counters
pub const MAX_RING_SIZE: usize = 4096;

/// Default RX descriptors per port
pub const DEFAULT_RX_RING_SIZE: usize = 64;

/// Default TX descriptors per port
pub const DEFAULT_TX_RING_SIZE: usize = 64;

/// Default timestamp descriptors per switch
pub const DEFAULT_TS_RING_SIZE: usize = 32;

/// Default RX buffer size (1522 byte frame rounded up)
pub const DEFAULT_BUFFER_SIZE: usize = 1600;

/// Largest value representable in the 12-bit descriptor size field
pub const MAX_DESC_SIZE: usize = 0x0FFF;

/// Payload start alignment required by the TX DMA
pub const TX_ALIGN: usize = 8;

/// Minimum staged prefix; a zero-length descriptor terminates TX DMA
pub const MIN_TX_PREFIX: usize = 4;

/// Staging bytes reserved per TX slot (prefix may be bumped by one unit)
pub const TX_STAGING_STRIDE: usize = 2 * TX_ALIGN;

/// Default RX frames processed per poll pass
pub const DEFAULT_POLL_QUOTA: usize = 64;

// =============================================================================
// Timing
// =============================================================================

/// Learn/poll iterations before a handshake is declared failed
pub const LEARN_POLL_ITERATIONS: u32 = 100;

/// Sleep between learn/poll iterations in milliseconds
pub const LEARN_POLL_INTERVAL_MS: u32 = 1;

/// Default margin between "now" and an activation time, in nanoseconds
pub const DEFAULT_SCHEDULE_MARGIN_NS: u64 = 1_000_000;

/// Minimum time between a gate disable and the next cold start
pub const COLD_START_SETTLE_MS: u32 = 500;

/// Nanoseconds per second
pub const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Nanoseconds per millisecond
pub const NSEC_PER_MSEC: u64 = 1_000_000;

// =============================================================================
// Timestamps
// =============================================================================

/// Number of distinct TX timestamp tags (0..=254)
pub const TS_TAG_COUNT: u8 = 255;

/// Outstanding timestamp correlations kept per port
pub const TS_QUEUE_DEPTH: usize = 32;

/// Default gPTP timer increment: 2.5 ns per 400 MHz clock in 2^-27 ns units
pub const GPTP_DEFAULT_INCREMENT: u32 = 0x1400_0000;

// =============================================================================
// Link speed
// =============================================================================

/// Default port link speed in kbit/s used for CBS scaling (1 Gbit/s)
pub const DEFAULT_LINK_SPEED_KBPS: u32 = 1_000_000;

// =============================================================================
// Forwarding tables
// =============================================================================

/// Static L2 table entries
pub const L2_TABLE_ENTRIES: usize = 1024;

/// Largest VLAN id
pub const MAX_VLAN_ID: u16 = 4095;

/// Ingress meters
pub const METER_ENTRIES: usize = 64;

/// Ingress stream filters
pub const STREAM_FILTER_ENTRIES: usize = 256;
