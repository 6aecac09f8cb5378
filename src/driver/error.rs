//! Error types for the R-Switch2 driver core
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ConfigError`]: Configuration, table programming and handshake failures
//! - [`DmaError`]: Descriptor ring and buffer issues
//! - [`IoError`]: Runtime TX/RX failures
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by most driver methods. [`Error::status_code`] folds an error into the
//! negative errno-style value reported through the configuration surface.

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration and table programming errors
///
/// These errors occur while applying an administrative configuration,
/// programming hardware tables, or waiting on a learn/poll handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Driver already initialized
    AlreadyInitialized,
    /// Driver not initialized yet
    NotInitialized,
    /// Invalid configuration parameter
    InvalidConfig,
    /// Port index out of range
    InvalidPort,
    /// Gate index out of range for the register target
    InvalidGate,
    /// Cycle time is zero or does not cover the gate control list
    InvalidCycleTime,
    /// Gate control list does not fit the hardware table
    ScheduleTooLong,
    /// Learn/poll request bit never self-cleared
    LearnTimeout,
    /// Register read-back differs from the value written
    VerifyMismatch,
    /// Configuration copy-in/copy-out failed
    CopyFault,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigError::AlreadyInitialized => "already initialized",
            ConfigError::NotInitialized => "not initialized",
            ConfigError::InvalidConfig => "invalid configuration",
            ConfigError::InvalidPort => "invalid port",
            ConfigError::InvalidGate => "invalid gate",
            ConfigError::InvalidCycleTime => "invalid cycle time",
            ConfigError::ScheduleTooLong => "gate control list exceeds table",
            ConfigError::LearnTimeout => "learn request timed out",
            ConfigError::VerifyMismatch => "register read-back mismatch",
            ConfigError::CopyFault => "configuration copy fault",
        }
    }
}

// =============================================================================
// DMA Errors
// =============================================================================

/// DMA ring and buffer errors
///
/// These errors relate to descriptor ring management and buffer mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaError {
    /// No descriptors available (ring full)
    NoDescriptorsAvailable,
    /// Frame too large for the transmit path
    FrameTooLarge,
    /// Invalid frame length (zero)
    InvalidLength,
    /// Ring capacity outside the supported range
    RingSize,
    /// Descriptor area could not be mapped for DMA
    MappingFailed,
}

impl core::fmt::Display for DmaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DmaError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DmaError::NoDescriptorsAvailable => "no descriptors available",
            DmaError::FrameTooLarge => "frame too large",
            DmaError::InvalidLength => "invalid frame length",
            DmaError::RingSize => "unsupported ring size",
            DmaError::MappingFailed => "descriptor area mapping failed",
        }
    }
}

// =============================================================================
// I/O Errors
// =============================================================================

/// Runtime TX/RX errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// Operation timed out
    Timeout,
    /// Invalid state for operation (e.g., port not running)
    InvalidState,
    /// Timestamp completion did not match any outstanding transmit
    UnknownTimestampTag,
}

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IoError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            IoError::Timeout => "operation timed out",
            IoError::InvalidState => "invalid state for operation",
            IoError::UnknownTimestampTag => "unknown timestamp tag",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// Match on the inner domain error for specific handling:
/// ```ignore
/// match result {
///     Err(Error::Config(ConfigError::LearnTimeout)) => { /* ... */ }
///     Err(Error::Dma(DmaError::NoDescriptorsAvailable)) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration error
    Config(ConfigError),
    /// DMA error
    Dma(DmaError),
    /// I/O error
    Io(IoError),
}

/// errno values used by [`Error::status_code`]
mod errno {
    pub const EIO: i32 = 5;
    pub const ENOMEM: i32 = 12;
    pub const EFAULT: i32 = 14;
    pub const EBUSY: i32 = 16;
    pub const EEXIST: i32 = 17;
    pub const ENODEV: i32 = 19;
    pub const EINVAL: i32 = 22;
    pub const ENOSPC: i32 = 28;
    pub const ETIMEDOUT: i32 = 110;
}

impl Error {
    /// Negative errno-style status for the configuration surface.
    #[must_use]
    pub const fn status_code(&self) -> i32 {
        let code = match self {
            Error::Config(ConfigError::AlreadyInitialized) => errno::EEXIST,
            Error::Config(ConfigError::NotInitialized) => errno::ENODEV,
            Error::Config(
                ConfigError::InvalidConfig
                | ConfigError::InvalidPort
                | ConfigError::InvalidGate
                | ConfigError::InvalidCycleTime,
            )
            | Error::Dma(DmaError::InvalidLength | DmaError::FrameTooLarge) => errno::EINVAL,
            Error::Config(ConfigError::ScheduleTooLong) => errno::ENOSPC,
            Error::Config(ConfigError::LearnTimeout) | Error::Io(IoError::Timeout) => {
                errno::ETIMEDOUT
            }
            Error::Config(ConfigError::VerifyMismatch)
            | Error::Io(IoError::InvalidState | IoError::UnknownTimestampTag) => errno::EIO,
            Error::Config(ConfigError::CopyFault) => errno::EFAULT,
            Error::Dma(DmaError::NoDescriptorsAvailable) => errno::EBUSY,
            Error::Dma(DmaError::RingSize | DmaError::MappingFailed) => errno::ENOMEM,
        };
        -code
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config: {}", e.as_str()),
            Error::Dma(e) => write!(f, "dma: {}", e.as_str()),
            Error::Io(e) => write!(f, "io: {}", e.as_str()),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<DmaError> for Error {
    fn from(e: DmaError) -> Self {
        Error::Dma(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

/// Result type alias for driver operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Result type alias for DMA operations
pub type DmaResult<T> = core::result::Result<T, DmaError>;

/// Result type alias for I/O operations
pub type IoResult<T> = core::result::Result<T, IoError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use std::format;

    use super::*;

    #[test]
    fn config_error_as_str_non_empty() {
        let variants = [
            ConfigError::AlreadyInitialized,
            ConfigError::NotInitialized,
            ConfigError::InvalidConfig,
            ConfigError::InvalidPort,
            ConfigError::InvalidGate,
            ConfigError::InvalidCycleTime,
            ConfigError::ScheduleTooLong,
            ConfigError::LearnTimeout,
            ConfigError::VerifyMismatch,
            ConfigError::CopyFault,
        ];

        for variant in variants {
            assert!(!variant.as_str().is_empty(), "{variant:?} has empty string");
        }
    }

    #[test]
    fn dma_error_display() {
        let display = format!("{}", DmaError::NoDescriptorsAvailable);
        assert_eq!(display, "no descriptors available");
    }

    #[test]
    fn error_from_domain_errors() {
        assert_eq!(
            Error::from(ConfigError::LearnTimeout),
            Error::Config(ConfigError::LearnTimeout)
        );
        assert_eq!(Error::from(DmaError::RingSize), Error::Dma(DmaError::RingSize));
        assert_eq!(Error::from(IoError::Timeout), Error::Io(IoError::Timeout));
    }

    #[test]
    fn error_display_includes_domain() {
        let display = format!("{}", Error::Config(ConfigError::LearnTimeout));
        assert!(display.starts_with("config:"));
        assert!(display.contains("timed out"));
    }

    #[test]
    fn status_codes_are_negative() {
        assert_eq!(Error::Config(ConfigError::LearnTimeout).status_code(), -110);
        assert_eq!(Error::Config(ConfigError::InvalidConfig).status_code(), -22);
        assert_eq!(Error::Config(ConfigError::CopyFault).status_code(), -14);
        assert_eq!(Error::Dma(DmaError::NoDescriptorsAvailable).status_code(), -16);
        assert_eq!(Error::Dma(DmaError::MappingFailed).status_code(), -12);
    }
}
