//! gPTP timer register bits

/// Capture the running time into GptpTime* (self-clearing)
pub const TIMER_CAPTURE: u32 = 1 << 0;
/// Load GptpOffset* into the running time (self-clearing)
pub const TIMER_LOAD: u32 = 1 << 1;
/// Timer enable
pub const TIMER_ENABLE: u32 = 1 << 8;

/// Seconds bits held in GptpTimeSecHi / GptpOffsetSecHi
pub const SEC_HI_MASK: u32 = 0xFFFF;
