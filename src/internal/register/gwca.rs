//! GWCA (gateway CPU agent) register bits
//!
//! The GWCA owns the descriptor chains shared with the host: one RX and one
//! TX chain per port plus a single timestamp chain.

use crate::internal::constants::MAX_PORTS;

// =============================================================================
// Mode Control (GwModeCtrl / GwModeStatus)
// =============================================================================

/// Operating mode field mask
pub const MODE_MASK: u32 = 0x3;
/// Reset mode
pub const MODE_RESET: u32 = 0x0;
/// Disable mode
pub const MODE_DISABLE: u32 = 0x1;
/// Configuration mode (tables and chains may be programmed)
pub const MODE_CONFIG: u32 = 0x2;
/// Operation mode
pub const MODE_OPERATION: u32 = 0x3;

// =============================================================================
// Descriptor Learning (GwDescLearnCtrl)
// =============================================================================

/// Learn request, self-clears when the chain base has been latched
pub const DESC_LEARN_REQ: u32 = 1 << 31;
/// Chain index field mask
pub const DESC_LEARN_CHAIN_MASK: u32 = 0xFF;

/// Upper address byte mask in GwDescLearnAddrHi
pub const DESC_ADDR_HI_MASK: u32 = 0xFF;

// =============================================================================
// Chain Indices
// =============================================================================

/// Chains per banked interrupt register
pub const CHAINS_PER_IRQ_REG: usize = 32;

/// Banked data interrupt registers needed for every RX and TX chain
pub const IRQ_BANKS: usize = (2 * MAX_PORTS + 1).div_ceil(CHAINS_PER_IRQ_REG);

/// RX chain index for a port
#[inline(always)]
#[must_use]
pub const fn rx_chain(port: usize) -> usize {
    port
}

/// TX chain index for a port
#[inline(always)]
#[must_use]
pub const fn tx_chain(port: usize, ports: usize) -> usize {
    ports + port
}

/// Timestamp chain index
#[inline(always)]
#[must_use]
pub const fn ts_chain(ports: usize) -> usize {
    2 * ports
}

/// Bank and bit of a chain in the banked interrupt registers
#[inline(always)]
#[must_use]
pub const fn chain_bit(chain: usize) -> (usize, u32) {
    (chain / CHAINS_PER_IRQ_REG, 1 << (chain % CHAINS_PER_IRQ_REG))
}

// =============================================================================
// Timestamp Interrupt (GwTsIrqStatus)
// =============================================================================

/// Timestamp descriptors completed
pub const TS_IRQ_DONE: u32 = 1 << 0;

// =============================================================================
// Error Status (GwErrStatus / GwErrEnable)
// =============================================================================

/// Uncorrectable ECC error in descriptor or frame RAM
pub const ERR_ECC: u32 = 1 << 0;
/// Frame buffer overflow
pub const ERR_BUFFER_OVERFLOW: u32 = 1 << 1;
/// Descriptor area overflow (chain ran out of descriptors)
pub const ERR_DESC_OVERFLOW: u32 = 1 << 2;
/// All GWCA error causes
pub const ERR_ALL: u32 = ERR_ECC | ERR_BUFFER_OVERFLOW | ERR_DESC_OVERFLOW;
