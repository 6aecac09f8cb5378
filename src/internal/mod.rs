//! Internal Implementation Details
//!
//! This module contains implementation details that are not part of the public API.
//! Types in this module may change without notice between minor versions; the
//! ones applications need are re-exported from the crate root.
//!
//! # Contents
//!
//! - [`register`]: Logical register map, layouts per IP revision, bit fields
//! - [`dma`]: Descriptor rings, buffers and timestamp correlation
//! - [`constants`]: Internal constants and magic numbers
//! - [`log`]: Logging shims over `defmt` / `log`
//!
//! # Stability
//!
//! **WARNING:** This module is `pub(crate)` only. Do not depend on any types
//! or functions in this module from external code. They are subject to change
//! without notice.

pub(crate) mod constants;
pub(crate) mod dma;
pub(crate) mod log;
pub(crate) mod register;
