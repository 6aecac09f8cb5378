//! GWCA DMA machinery
//!
//! All memory is statically allocated using const generics.
//!
//! # Architecture
//!
//! - [`descriptor`]: descriptor layouts and the ownership tag
//! - [`DescriptorRing`]: circular ring with a trailing link descriptor
//! - [`RxBufferPool`] / [`TxStaging`]: buffers bound to ring slots
//! - [`TsQueue`]: TX timestamp correlation by tag

pub mod descriptor;
mod pool;
mod ring;
mod timestamp;

pub use descriptor::{DescType, Descriptor, ExtDesc, ExtTsDesc};
pub use pool::{RxBufferPool, TxStaging, tx_prefix_len};
pub use ring::DescriptorRing;
pub use timestamp::TsQueue;
