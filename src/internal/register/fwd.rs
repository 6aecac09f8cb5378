//! Forwarding engine register bits

/// Table write request, self-clears when the entry is stored
pub const TABLE_REQ: u32 = 1 << 31;
/// Table index mask in the control registers
pub const TABLE_INDEX_MASK: u32 = 0xFFF;

// =============================================================================
// L2 Table
// =============================================================================

/// Entry valid
pub const L2_VALID: u32 = 1 << 31;
/// Static entry (never aged)
pub const L2_STATIC: u32 = 1 << 30;
/// Destination port vector mask, bits 7:0 of data 2
pub const L2_DEST_MASK: u32 = 0xFF;
/// VLAN id shift in data 1
pub const L2_VLAN_SHIFT: u32 = 16;

// =============================================================================
// VLAN Table
// =============================================================================

/// Member port vector shift
pub const VLAN_MEMBER_SHIFT: u32 = 0;
/// Untagged port vector shift
pub const VLAN_UNTAGGED_SHIFT: u32 = 8;
/// Entry valid
pub const VLAN_VALID: u32 = 1 << 31;

// =============================================================================
// Meter and Stream Filter Tables
// =============================================================================

/// Meter drops (instead of marks) yellow frames
pub const METER_DROP_YELLOW: u32 = 1 << 31;
/// Stream filter gate index shift (data 1)
pub const FILTER_GATE_SHIFT: u32 = 16;
/// Stream filter has a PSFP gate attached
pub const FILTER_GATE_VALID: u32 = 1 << 31;
/// Stream filter meter index shift (data 1)
pub const FILTER_METER_SHIFT: u32 = 0;
/// Stream filter has a meter attached
pub const FILTER_METER_VALID: u32 = 1 << 15;
/// Maximum SDU field mask (data 0)
pub const FILTER_MAX_SDU_MASK: u32 = 0xFFFF;

// =============================================================================
// Error Status (FwdErrStatus / PsfpErrStatus)
// =============================================================================

/// Forwarding table lookup or learning error
pub const ERR_TABLE: u32 = 1 << 0;
/// Frame dropped by an over-limit meter
pub const ERR_METER: u32 = 1 << 1;
/// PSFP gate error per gate (all 32 bits of PsfpErrStatus)
pub const PSFP_ERR_GATE_MASK: u32 = 0xFFFF_FFFF;
