//! Logging shims.
//!
//! Forward to `defmt` when the `defmt` feature is enabled, otherwise to the
//! `log` facade when `log` is enabled, otherwise expand to nothing while
//! still type-checking the arguments. Keep format strings to `{}` and
//! `{:#x}` so both backends accept them.

macro_rules! rs_log {
    ($level:ident, $($arg:tt)+) => {{
        #[cfg(feature = "defmt")]
        {
            ::defmt::$level!($($arg)+);
        }
        #[cfg(all(feature = "log", not(feature = "defmt")))]
        {
            ::log::$level!($($arg)+);
        }
        #[cfg(not(any(feature = "defmt", feature = "log")))]
        {
            let _ = ::core::format_args!($($arg)+);
        }
    }};
}

macro_rules! rs_debug {
    ($($arg:tt)+) => { $crate::internal::log::rs_log!(debug, $($arg)+) };
}

macro_rules! rs_info {
    ($($arg:tt)+) => { $crate::internal::log::rs_log!(info, $($arg)+) };
}

macro_rules! rs_warn {
    ($($arg:tt)+) => { $crate::internal::log::rs_log!(warn, $($arg)+) };
}

macro_rules! rs_error {
    ($($arg:tt)+) => { $crate::internal::log::rs_log!(error, $($arg)+) };
}

pub(crate) use rs_debug;
pub(crate) use rs_error;
pub(crate) use rs_info;
pub(crate) use rs_log;
pub(crate) use rs_warn;
