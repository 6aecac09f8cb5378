//! Port block register bits: mode, TAS gates, CBS and queue control

// =============================================================================
// Port Mode (PortModeCtrl / PortModeStatus)
// =============================================================================

/// Port mode field mask
pub const MODE_MASK: u32 = 0x3;

// =============================================================================
// TAS Gate Control (TasGateCtrl, banked per gate)
// =============================================================================

/// Gate runs the programmed list from the cycle start time
pub const GATE_ENABLE: u32 = 1 << 0;
/// Switch to the newly programmed list at the cycle start time (self-clearing)
pub const GATE_CHANGE_REQ: u32 = 1 << 1;

// =============================================================================
// TAS List Control (TasListCtrl, banked per gate)
// =============================================================================

/// Number of list entries, bits 15:0
pub const LIST_LEN_MASK: u32 = 0xFFFF;
/// First entry is skipped after the first cycle (folded into the last)
pub const LIST_SKIP_FIRST: u32 = 1 << 16;

// =============================================================================
// Gate Table (TasTableData0 / TasTableData1 / TasTableCtrl)
// =============================================================================

/// Gate open in this entry
pub const ENTRY_OPEN: u32 = 1 << 0;
/// Internal priority value valid
pub const ENTRY_IPV_VALID: u32 = 1 << 1;
/// Internal priority value shift
pub const ENTRY_IPV_SHIFT: u32 = 4;
/// Internal priority value mask (after shift)
pub const ENTRY_IPV_MASK: u32 = 0x7;
/// Table write request, self-clears once the entry is stored
pub const TABLE_REQ: u32 = 1 << 31;
/// Table address mask
pub const TABLE_ADDR_MASK: u32 = 0xFFF;

// =============================================================================
// Initial Gate State (TasInitialState, 8 gates per register)
// =============================================================================

/// Bits per gate nibble
pub const STATE_NIBBLE_BITS: u32 = 4;
/// Gate open at start
pub const STATE_OPEN: u32 = 1 << 0;
/// Initial IPV valid
pub const STATE_IPV_VALID: u32 = 1 << 1;

// =============================================================================
// Cycle Start Split
// =============================================================================

/// Seconds bits carried by the high cycle start register
pub const START_SEC_HI_MASK: u64 = 0xFFFF;

// =============================================================================
// TAS Error Status (TasErrStatus)
// =============================================================================

/// Gate error per gate, bits 7:0
pub const ERR_GATE_MASK: u32 = 0xFF;
/// Configuration error (list could not be activated)
pub const ERR_CONFIG: u32 = 1 << 16;

// =============================================================================
// CBS (CbsCiv / CbsCul) and Queue Control (QueueCtrl)
// =============================================================================

/// Credit-based shaper enabled for the queue
pub const QUEUE_CBS_ENABLE: u32 = 1 << 0;
/// Queue maps to a pre-emptable MAC
pub const QUEUE_PREEMPTABLE: u32 = 1 << 1;
/// Queue is gated by TAS
pub const QUEUE_TAS_GATED: u32 = 1 << 2;
