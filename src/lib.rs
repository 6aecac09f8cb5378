//! Renesas R-Switch2 Driver Core
//!
//! A `no_std`, `no_alloc` core for the R-Switch2 TSN Ethernet switch found on
//! R-Car S4 and RZ/T2H class SoCs.
//!
//! The crate owns everything between the register window and a network
//! stack: the GWCA descriptor rings that move frames between host memory and
//! the switch, egress timestamp correlation, the interrupt top and bottom
//! halves, and the gate schedule engine that programs 802.1Qbv (TAS) and
//! 802.1Qci (PSFP) gate control lists against the switch's PTP clock.
//!
//! # Architecture
//!
//! 1. **Driver** ([`driver`]): [`Switch`] with its ports, polling, TSN and
//!    forwarding configuration
//! 2. **Schedule engine** ([`schedule`]): gate control lists and activation
//!    time arithmetic, written once against [`schedule::GateTarget`]
//! 3. **HAL** ([`hal`]): register bus, learn handshake, PTP clock, DMA
//!    address mapping
//!
//! # Features
//!
//! - `defmt`: log through defmt and derive `defmt::Format`
//! - `log`: log through the `log` facade
//! - `critical-section`: enable the ISR-safe [`sync::SharedSwitch`] wrapper
//!
//! # Example
//!
//! ```ignore
//! use rswitch2_core::{Gptp, IdentityMapper, Registers, SwitchConfig, SwitchDefault, VolatileBus};
//!
//! // SAFETY: the window is mapped for the lifetime of the program
//! let bus = unsafe { VolatileBus::new(RSWITCH_BASE as *mut u8) };
//! let clock_bus = unsafe { VolatileBus::new(RSWITCH_BASE as *mut u8) };
//! let config = SwitchConfig::new().with_ports(3);
//!
//! static mut SWITCH: Option<SwitchDefault<VolatileBus, Gptp<VolatileBus>, Frame>> = None;
//! let switch = unsafe { (*core::ptr::addr_of_mut!(SWITCH)).insert(SwitchDefault::new(
//!     bus,
//!     Gptp::new(Registers::new(clock_bus, config.revision)),
//!     config,
//! )) };
//!
//! switch.clock().enable();
//! switch.init(&mut IdentityMapper, &mut delay)?;
//! switch.transmit(0, frame, &mut mapper).ok();
//! ```

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]

// =============================================================================
// Modules
// =============================================================================

pub mod driver;
pub mod hal;
pub mod schedule;

// Internal implementation details (pub(crate) only)
mod internal;

#[cfg(feature = "critical-section")]
#[cfg_attr(docsrs, doc(cfg(feature = "critical-section")))]
pub mod sync;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::config::{
    CbsConfig, PortMode, PortTsnConfig, QueueConfig, State, SwitchConfig, TsnConfig,
};
pub use driver::error::{
    ConfigError, ConfigResult, DmaError, DmaResult, Error, IoError, IoResult, Result,
};
pub use driver::forwarding::{FwdConfig, L2Entry, MeterEntry, StreamFilter, VlanEntry};
pub use driver::interrupt::{InterruptStatus, PollOutcome};
pub use driver::stats::{ErrorStatus, PortStats, StatsReport};
pub use driver::switch::{PacketSink, Switch, SwitchDefault, SwitchSmall};
pub use driver::{Rejected, Transmitted, TxPacket};
pub use hal::{
    DmaDirection, DmaMapper, Gptp, IdentityMapper, PollPolicy, PtpClock, PtpTime, RegAddr,
    RegisterBus, Registers, VolatileBus,
};
pub use schedule::{AdminSchedule, GateControlList, GateEntry, GateRuntime};

#[cfg(feature = "critical-section")]
pub use sync::{SharedSwitch, SharedSwitchDefault, SharedSwitchSmall};

/// Logical register map for direct access.
///
/// # Safety
///
/// Writing registers behind the driver's back breaks its invariants. Use
/// only for diagnostics or for blocks the driver does not manage.
pub mod registers {
    pub use crate::internal::register::{IpRevision, Reg, fwd, gptp, gwca, port};
}

/// Hardware limits and driver defaults.
pub mod constants {
    pub use crate::internal::constants::{
        DEFAULT_BUFFER_SIZE, DEFAULT_LINK_SPEED_KBPS, DEFAULT_POLL_QUOTA, DEFAULT_RX_RING_SIZE,
        DEFAULT_TS_RING_SIZE, DEFAULT_TX_RING_SIZE, L2_TABLE_ENTRIES, MAX_DESC_SIZE, MAX_GCL_ENTRIES,
        MAX_PORTS, MAX_VLAN_ID, METER_ENTRIES, PSFP_GATES, QUEUES_PER_PORT, STREAM_FILTER_ENTRIES,
        TAS_TABLE_ENTRIES,
    };
}
