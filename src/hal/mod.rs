//! Hardware Abstraction Layer
//!
//! Thin layers between the driver core and the platform:
//!
//! - [`mmio`]: register bus trait and logical register access
//! - [`learn`]: the bounded learn/poll handshake
//! - [`ptp`]: PTP time and the gPTP timer clock
//! - [`dma_map`]: CPU-to-bus address translation
//!
//! # Delay Integration
//!
//! Everything that sleeps uses `embedded_hal::delay::DelayNs` directly.
//! Pass any delay implementation from your platform.

pub mod dma_map;
pub mod learn;
pub mod mmio;
pub mod ptp;

pub use dma_map::{DmaDirection, DmaMapper, IdentityMapper};
pub use learn::{PollPolicy, request_and_wait, wait_for_clear};
pub use mmio::{RegAddr, RegisterBus, Registers, VolatileBus};
pub use ptp::{Gptp, PtpClock, PtpTime};
