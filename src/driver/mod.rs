//! Core driver components for the R-Switch2.
//!
//! - [`config`] - Static and TSN configuration types
//! - [`error`] - Error types and result aliases
//! - [`switch`] - The driver instance: rings, polling, gate schedules
//! - [`forwarding`] - L2, VLAN, meter and stream filter tables
//! - [`interrupt`] - Interrupt status decoding and per-port masking
//! - [`stats`] - Counters, error latches and the text report
//!
//! # Example
//!
//! ```ignore
//! use rswitch2_core::driver::{SwitchConfig, TsnConfig};
//!
//! let config = SwitchConfig::new()
//!     .with_ports(4)
//!     .with_link_speed_kbps(1_000_000);
//! ```

// Submodules
pub mod config;
pub mod error;
pub mod forwarding;
pub mod interrupt;
mod port;
pub mod stats;
pub mod switch;

// Re-exports for convenience
pub use config::{
    CbsConfig, PortMode, PortTsnConfig, QueueConfig, State, SwitchConfig, TsnConfig,
};
pub use error::{ConfigError, ConfigResult, DmaError, DmaResult, Error, IoError, IoResult, Result};
pub use forwarding::{FwdConfig, L2Entry, MeterEntry, StreamFilter, VlanEntry};
pub use interrupt::{Dispatcher, InterruptStatus, PollOutcome, QueueState};
pub use port::{Rejected, Transmitted, TxPacket};
pub use stats::{ErrorCounters, ErrorStatus, PortStats, StatsReport};
pub use switch::{PacketSink, Switch, SwitchDefault, SwitchSmall};
