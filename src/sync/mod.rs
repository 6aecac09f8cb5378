//! Synchronization Support
//!
//! - [`CriticalSectionCell`]: ISR-safe interior mutability
//! - [`SharedSwitch`]: a [`Switch`](crate::Switch) behind a critical section,
//!   so the interrupt top half and the polling task can share it
//!
//! Requires the `critical-section` feature and a critical-section
//! implementation for the target.

mod primitives;
mod shared;

pub use primitives::CriticalSectionCell;
pub use shared::{SharedSwitch, SharedSwitchDefault, SharedSwitchSmall};
