//! GWCA descriptor field encodings.
//!
//! The ownership tag lives in the upper nibble of the `type_die` byte; the
//! low nibble carries the interrupt-enable flag.

// =============================================================================
// Descriptor Type (type_die[7:4])
// =============================================================================

/// Ownership/descriptor type tag
///
/// Hardware and software hand a descriptor back and forth by rewriting this
/// tag. Raw values outside the enumeration decode as `None` and are treated
/// as hardware-owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DescType {
    /// Fixed link (chain continues at the pointer, not learned)
    LinkFix = 0x00,
    /// Frame empty: armed for hardware (RX) or transmitted (TX)
    FEmpty = 0x40,
    /// Frame empty, first of a multi-descriptor frame
    FEmptyStart = 0x50,
    /// Frame empty, middle of a multi-descriptor frame
    FEmptyMid = 0x60,
    /// Frame empty, last of a multi-descriptor frame
    FEmptyEnd = 0x70,
    /// Whole frame in one descriptor
    FSingle = 0x80,
    /// First descriptor of a frame
    FStart = 0x90,
    /// Middle descriptor of a frame
    FMid = 0xA0,
    /// Last descriptor of a frame
    FEnd = 0xB0,
    /// Link-empty: hardware stops here
    LEmpty = 0xC0,
    /// Software-empty: owned by the driver, nothing to do
    EEmpty = 0xD0,
    /// Link to the next descriptor area
    Link = 0xE0,
    /// End of set
    Eos = 0xF0,
}

/// Mask of the type nibble
pub const TYPE_MASK: u8 = 0xF0;
/// Descriptor interrupt enable
pub const DIE: u8 = 0x08;

impl DescType {
    /// Decode the type nibble of a raw `type_die` byte
    #[must_use]
    pub const fn from_bits(raw: u8) -> Option<Self> {
        match raw & TYPE_MASK {
            0x00 => Some(Self::LinkFix),
            0x40 => Some(Self::FEmpty),
            0x50 => Some(Self::FEmptyStart),
            0x60 => Some(Self::FEmptyMid),
            0x70 => Some(Self::FEmptyEnd),
            0x80 => Some(Self::FSingle),
            0x90 => Some(Self::FStart),
            0xA0 => Some(Self::FMid),
            0xB0 => Some(Self::FEnd),
            0xC0 => Some(Self::LEmpty),
            0xD0 => Some(Self::EEmpty),
            0xE0 => Some(Self::Link),
            0xF0 => Some(Self::Eos),
            _ => None,
        }
    }

    /// Raw tag bits
    #[inline(always)]
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Descriptor carries frame data (written by software for TX, by
    /// hardware for RX)
    #[inline(always)]
    #[must_use]
    pub const fn is_frame(self) -> bool {
        matches!(self, Self::FSingle | Self::FStart | Self::FMid | Self::FEnd)
    }

    /// Descriptor was emptied by hardware
    #[inline(always)]
    #[must_use]
    pub const fn is_frame_empty(self) -> bool {
        matches!(
            self,
            Self::FEmpty | Self::FEmptyStart | Self::FEmptyMid | Self::FEmptyEnd
        )
    }
}

// =============================================================================
// size_flags
// =============================================================================

/// Descriptor size/flags word
pub mod size_flags {
    /// Buffer size or received length, bits 11:0
    pub const SIZE_MASK: u16 = 0x0FFF;
    /// Frame error reported by hardware
    pub const ERR_FRAME: u16 = 1 << 12;
    /// Frame truncated to the buffer size
    pub const ERR_TRUNCATED: u16 = 1 << 13;
    /// All error bits
    pub const ERR_MASK: u16 = 0xF000;
}

// =============================================================================
// info1 (extended descriptors)
// =============================================================================

/// Extended descriptor `info1` word
pub mod info1 {
    /// TX: request an egress timestamp
    pub const TX_TS_REQ: u64 = 1 << 0;
    /// TX: timestamp tag shift
    pub const TX_TS_TAG_SHIFT: u32 = 8;
    /// TX: destination port shift (port vector bit)
    pub const TX_DEST_SHIFT: u32 = 16;
    /// TS completion: tag in bits 7:0
    pub const TS_TAG_MASK: u64 = 0xFF;
    /// TS completion: port in bits 15:8
    pub const TS_PORT_SHIFT: u32 = 8;
    /// TS completion: port mask (after shift)
    pub const TS_PORT_MASK: u64 = 0xFF;
}
