//! Register map for the R-Switch2 blocks
//!
//! Registers are addressed logically through [`Reg`] and resolved to byte
//! offsets by a [`RegisterLayout`] indirection table, because a handful of
//! registers moved between IP revisions. Registers that belong to a port
//! block are relocated by `port_base + port * port_stride`; banked registers
//! (per chain group, per gate) add `4 * bank`.

pub mod fwd;
pub mod gptp;
pub mod gwca;
pub mod port;

use crate::internal::constants::MAX_PORTS;

/// Hardware IP revision of the switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IpRevision {
    /// First FPGA release
    V1,
    /// Second release (moved GWCA interrupt and TAS table registers)
    #[default]
    V2,
}

/// Register scope: switch-global or relocated per port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Single instance in the switch
    Global,
    /// One instance per port block
    Port,
}

macro_rules! registers {
    ($($name:ident => $scope:ident, $v1:expr, $v2:expr;)+) => {
        /// Logical register names
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[repr(u8)]
        pub enum Reg {
            $(
                #[allow(missing_docs)]
                $name,
            )+
        }

        impl Reg {
            /// Every logical register, in declaration order
            pub const ALL: &'static [Reg] = &[$(Reg::$name,)+];

            /// Number of logical registers
            pub const COUNT: usize = Self::ALL.len();

            /// Scope of the register
            #[must_use]
            pub const fn scope(self) -> Scope {
                match self {
                    $(Reg::$name => Scope::$scope,)+
                }
            }

            const fn offset_for(self, revision: IpRevision) -> u32 {
                match (self, revision) {
                    $(
                        (Reg::$name, IpRevision::V1) => $v1,
                        (Reg::$name, IpRevision::V2) => $v2,
                    )+
                }
            }
        }
    };
}

registers! {
    // GWCA: mode and descriptor learning
    GwModeCtrl          => Global, 0x1_0000, 0x1_0000;
    GwModeStatus        => Global, 0x1_0004, 0x1_0004;
    GwDescLearnAddrLo   => Global, 0x1_0010, 0x1_0010;
    GwDescLearnAddrHi   => Global, 0x1_0014, 0x1_0014;
    GwDescLearnCtrl     => Global, 0x1_0018, 0x1_001C;
    GwTxRequest         => Global, 0x1_0020, 0x1_0020;
    // GWCA: interrupts (banked, 32 chains per register)
    GwDataIrqStatus     => Global, 0x1_0100, 0x1_0200;
    GwDataIrqEnable     => Global, 0x1_0110, 0x1_0210;
    GwDataIrqDisable    => Global, 0x1_0120, 0x1_0220;
    GwTsIrqStatus       => Global, 0x1_0130, 0x1_0230;
    GwTsIrqEnable       => Global, 0x1_0134, 0x1_0234;
    GwTsIrqDisable      => Global, 0x1_0138, 0x1_0238;
    GwErrStatus         => Global, 0x1_0140, 0x1_0240;
    GwErrEnable         => Global, 0x1_0144, 0x1_0244;
    // gPTP timer
    GptpTimerCtrl       => Global, 0x1_8000, 0x1_8000;
    GptpIncrement       => Global, 0x1_8004, 0x1_8004;
    GptpTimeNsec        => Global, 0x1_8010, 0x1_8010;
    GptpTimeSecLo       => Global, 0x1_8014, 0x1_8014;
    GptpTimeSecHi       => Global, 0x1_8018, 0x1_8018;
    GptpOffsetNsec      => Global, 0x1_8020, 0x1_8020;
    GptpOffsetSecLo     => Global, 0x1_8024, 0x1_8024;
    GptpOffsetSecHi     => Global, 0x1_8028, 0x1_8028;
    // Forwarding engine tables
    FwdL2Data0          => Global, 0x0_1000, 0x0_1000;
    FwdL2Data1          => Global, 0x0_1004, 0x0_1004;
    FwdL2Data2          => Global, 0x0_1008, 0x0_1008;
    FwdL2Ctrl           => Global, 0x0_100C, 0x0_100C;
    FwdVlanData         => Global, 0x0_1010, 0x0_1010;
    FwdVlanCtrl         => Global, 0x0_1014, 0x0_1014;
    FwdMeterData0       => Global, 0x0_1020, 0x0_1020;
    FwdMeterData1       => Global, 0x0_1024, 0x0_1024;
    FwdMeterCtrl        => Global, 0x0_1028, 0x0_1028;
    FwdFilterData0      => Global, 0x0_1030, 0x0_1030;
    FwdFilterData1      => Global, 0x0_1034, 0x0_1034;
    FwdFilterCtrl       => Global, 0x0_1038, 0x0_1038;
    FwdErrStatus        => Global, 0x0_1040, 0x0_1040;
    // PSFP stream gates (banked per gate unless noted)
    PsfpGateCtrl        => Global, 0x0_2000, 0x0_2000;
    PsfpInitialState    => Global, 0x0_2100, 0x0_2100;
    PsfpCycleTime       => Global, 0x0_2200, 0x0_2200;
    PsfpCycleExt        => Global, 0x0_2280, 0x0_2280;
    PsfpCycleStartLo    => Global, 0x0_2300, 0x0_2300;
    PsfpCycleStartMid   => Global, 0x0_2380, 0x0_2380;
    PsfpCycleStartHi    => Global, 0x0_2400, 0x0_2400;
    PsfpLastInterval    => Global, 0x0_2480, 0x0_2480;
    PsfpListCtrl        => Global, 0x0_2500, 0x0_2500;
    PsfpTableData0      => Global, 0x0_2600, 0x0_2600;
    PsfpTableData1      => Global, 0x0_2604, 0x0_2604;
    PsfpTableCtrl       => Global, 0x0_2608, 0x0_2608;
    PsfpErrStatus       => Global, 0x0_2610, 0x0_2610;
    // Port block: mode
    PortModeCtrl        => Port, 0x000, 0x000;
    PortModeStatus      => Port, 0x004, 0x004;
    // Port block: TAS (banked per gate unless noted)
    TasGateCtrl         => Port, 0x100, 0x100;
    TasInitialState     => Port, 0x120, 0x120;
    TasCycleTime        => Port, 0x140, 0x140;
    TasCycleExt         => Port, 0x160, 0x160;
    TasCycleStartLo     => Port, 0x180, 0x180;
    TasCycleStartMid    => Port, 0x1A0, 0x1A0;
    TasCycleStartHi     => Port, 0x1C0, 0x1C0;
    TasLastInterval     => Port, 0x1E0, 0x1E0;
    TasListCtrl         => Port, 0x200, 0x200;
    TasTableData0       => Port, 0x220, 0x240;
    TasTableData1       => Port, 0x224, 0x244;
    TasTableCtrl        => Port, 0x228, 0x248;
    TasErrStatus        => Port, 0x230, 0x250;
    // Port block: CBS and queue control (banked per queue)
    CbsCiv              => Port, 0x300, 0x300;
    CbsCul              => Port, 0x320, 0x320;
    QueueCtrl           => Port, 0x340, 0x340;
}

/// Offset of one bank from the next for banked registers
pub const BANK_STRIDE: u32 = 4;

impl Reg {
    /// Status register whose bits are cleared by writing 1
    #[must_use]
    pub const fn is_write_one_to_clear(self) -> bool {
        matches!(
            self,
            Reg::GwDataIrqStatus
                | Reg::GwTsIrqStatus
                | Reg::GwErrStatus
                | Reg::FwdErrStatus
                | Reg::PsfpErrStatus
                | Reg::TasErrStatus
        )
    }

    /// Number of banks of a banked register, 1 otherwise
    const fn banks(self) -> u32 {
        match self {
            Reg::GwDataIrqStatus => gwca::IRQ_BANKS as u32,
            _ => 1,
        }
    }
}

/// Indirection table resolving [`Reg`] to byte offsets for one IP revision
#[derive(Debug)]
pub struct RegisterLayout {
    revision: IpRevision,
    offsets: [u32; Reg::COUNT],
    port_base: u32,
    port_stride: u32,
}

impl RegisterLayout {
    const fn build(revision: IpRevision, port_base: u32, port_stride: u32) -> Self {
        let mut offsets = [0u32; Reg::COUNT];
        let mut i = 0;
        while i < Reg::COUNT {
            offsets[i] = Reg::ALL[i].offset_for(revision);
            i += 1;
        }
        Self {
            revision,
            offsets,
            port_base,
            port_stride,
        }
    }

    /// Layout table for an IP revision
    #[must_use]
    pub const fn for_revision(revision: IpRevision) -> &'static RegisterLayout {
        match revision {
            IpRevision::V1 => &LAYOUT_V1,
            IpRevision::V2 => &LAYOUT_V2,
        }
    }

    /// IP revision this table describes
    #[must_use]
    pub const fn revision(&self) -> IpRevision {
        self.revision
    }

    /// Byte offset of a register instance
    #[must_use]
    pub const fn offset(&self, reg: Reg, port: usize, bank: usize) -> u32 {
        let mut offset = self.offsets[reg as usize] + (bank as u32) * BANK_STRIDE;
        if let Scope::Port = reg.scope() {
            offset += self.port_base + (port as u32) * self.port_stride;
        }
        offset
    }

    /// The word at `offset` belongs to a write-1-to-clear status register
    #[must_use]
    pub fn is_write_one_to_clear(&self, offset: u32) -> bool {
        Reg::ALL
            .iter()
            .filter(|reg| reg.is_write_one_to_clear())
            .any(|&reg| self.covers(reg, offset))
    }

    fn covers(&self, reg: Reg, offset: u32) -> bool {
        let base = self.offsets[reg as usize];
        match reg.scope() {
            Scope::Global => offset
                .checked_sub(base)
                .is_some_and(|rel| rel % BANK_STRIDE == 0 && rel / BANK_STRIDE < reg.banks()),
            Scope::Port => offset
                .checked_sub(self.port_base + base)
                .is_some_and(|rel| {
                    rel % self.port_stride == 0 && rel / self.port_stride < MAX_PORTS as u32
                }),
        }
    }
}

static LAYOUT_V1: RegisterLayout = RegisterLayout::build(IpRevision::V1, 0x2_0000, 0x1000);
static LAYOUT_V2: RegisterLayout = RegisterLayout::build(IpRevision::V2, 0x2_0000, 0x2000);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_enum_matches_table() {
        for (i, reg) in Reg::ALL.iter().enumerate() {
            assert_eq!(*reg as usize, i);
        }
    }

    #[test]
    fn global_offsets_ignore_port() {
        let layout = RegisterLayout::for_revision(IpRevision::V2);
        assert_eq!(
            layout.offset(Reg::GwModeCtrl, 0, 0),
            layout.offset(Reg::GwModeCtrl, 3, 0)
        );
    }

    #[test]
    fn port_offsets_relocate_by_stride() {
        let layout = RegisterLayout::for_revision(IpRevision::V1);
        let p0 = layout.offset(Reg::TasGateCtrl, 0, 0);
        let p2 = layout.offset(Reg::TasGateCtrl, 2, 0);
        assert_eq!(p2 - p0, 2 * 0x1000);
        assert_eq!(p0, 0x2_0100);
    }

    #[test]
    fn banked_offsets_step_by_four() {
        let layout = RegisterLayout::for_revision(IpRevision::V2);
        let g0 = layout.offset(Reg::TasCycleTime, 1, 0);
        let g5 = layout.offset(Reg::TasCycleTime, 1, 5);
        assert_eq!(g5 - g0, 5 * BANK_STRIDE);
    }

    #[test]
    fn revisions_differ_for_moved_registers() {
        let v1 = RegisterLayout::for_revision(IpRevision::V1);
        let v2 = RegisterLayout::for_revision(IpRevision::V2);
        assert_ne!(
            v1.offset(Reg::GwDataIrqStatus, 0, 0),
            v2.offset(Reg::GwDataIrqStatus, 0, 0)
        );
        assert_eq!(v1.offset(Reg::GptpIncrement, 0, 0), v2.offset(Reg::GptpIncrement, 0, 0));
        assert_eq!(v1.revision(), IpRevision::V1);
    }

    #[test]
    fn status_words_are_found_by_offset() {
        let layout = RegisterLayout::for_revision(IpRevision::V2);
        assert!(layout.is_write_one_to_clear(0x1_0230));
        assert!(layout.is_write_one_to_clear(0x1_0240));
        assert!(layout.is_write_one_to_clear(layout.offset(Reg::TasErrStatus, 3, 0)));
        assert!(!layout.is_write_one_to_clear(0x1_0234));
        assert!(!layout.is_write_one_to_clear(layout.offset(Reg::TasTableCtrl, 3, 0)));
        assert!(!layout.is_write_one_to_clear(0x1_0000));
    }
}
