//! Bit-field layouts of the USBD registers.
//!
//! Every register is 16 bits wide.  Each field records its position, width, and how the hardware
//! treats a write to it, since several EPxCS fields are not plain read/write bits.

use static_assertions::const_assert_eq;

/// How the hardware reacts to a value written into a field.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Access {
    /// The written value is stored.
    ReadWrite,
    /// Writes are ignored.
    ReadOnly,
    /// Writing 1 flips the bit, writing 0 leaves it unchanged.
    Toggle,
    /// Writing 0 clears the bit, writing 1 leaves it unchanged.  Only the hardware sets it.
    ClearOnWriteZero,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    pub name: &'static str,
    pub pos: u8,
    pub width: u8,
    pub access: Access,
}

impl Field {
    pub const fn new(name: &'static str, pos: u8, width: u8, access: Access) -> Self {
        assert!(width > 0 && pos as u32 + width as u32 <= 16);
        Self {
            name,
            pos,
            width,
            access,
        }
    }

    pub const fn bit(name: &'static str, pos: u8, access: Access) -> Self {
        Self::new(name, pos, 1, access)
    }

    /// The bits occupied by this field, in register position.
    pub const fn mask(self) -> u16 {
        (((1u32 << self.width) - 1) << self.pos) as u16
    }

    /// Extract this field from a raw register value, shifted down to bit 0.
    pub const fn read(self, raw: u16) -> u16 {
        (raw & self.mask()) >> self.pos
    }

    /// Shift a field value into register position.  Bits that don't fit are dropped.
    pub const fn encode(self, value: u16) -> u16 {
        ((value as u32) << self.pos) as u16 & self.mask()
    }

    pub const fn is_set(self, raw: u16) -> bool {
        raw & self.mask() != 0
    }
}

/// Union of the masks of every field in `fields` with the given access class.
pub const fn access_mask(fields: &[Field], access: Access) -> u16 {
    let mut mask = 0;
    let mut i = 0;
    while i < fields.len() {
        // Access doesn't implement const PartialEq
        if fields[i].access as u8 == access as u8 {
            mask |= fields[i].mask();
        }
        i += 1;
    }
    mask
}

const fn union(fields: &[Field]) -> u16 {
    let mut mask = 0;
    let mut i = 0;
    while i < fields.len() {
        mask |= fields[i].mask();
        i += 1;
    }
    mask
}

const fn total_width(fields: &[Field]) -> u32 {
    let mut sum = 0;
    let mut i = 0;
    while i < fields.len() {
        sum += fields[i].width as u32;
        i += 1;
    }
    sum
}

/// Control register (CTL).
pub mod ctl {
    use super::{Access::ReadWrite, Field};

    /// Successful transfer interrupt enable
    pub const STIE: Field = Field::bit("STIE", 15, ReadWrite);
    /// Packet memory overrun/underrun interrupt enable
    pub const PMOUIE: Field = Field::bit("PMOUIE", 14, ReadWrite);
    pub const ERRIE: Field = Field::bit("ERRIE", 13, ReadWrite);
    pub const WKUPIE: Field = Field::bit("WKUPIE", 12, ReadWrite);
    /// Suspend state interrupt enable
    pub const SPSIE: Field = Field::bit("SPSIE", 11, ReadWrite);
    pub const RSTIE: Field = Field::bit("RSTIE", 10, ReadWrite);
    pub const SOFIE: Field = Field::bit("SOFIE", 9, ReadWrite);
    /// Expected start of frame interrupt enable
    pub const ESOFIE: Field = Field::bit("ESOFIE", 8, ReadWrite);
    /// Resume request
    pub const RSREQ: Field = Field::bit("RSREQ", 4, ReadWrite);
    /// Set suspend state
    pub const SETSPS: Field = Field::bit("SETSPS", 3, ReadWrite);
    /// Low-power mode while suspended
    pub const LOWM: Field = Field::bit("LOWM", 2, ReadWrite);
    /// Power down the analog transceiver
    pub const CLOSE: Field = Field::bit("CLOSE", 1, ReadWrite);
    /// Force a USB reset
    pub const SETRST: Field = Field::bit("SETRST", 0, ReadWrite);

    pub const LAYOUT: &[Field] = &[
        STIE, PMOUIE, ERRIE, WKUPIE, SPSIE, RSTIE, SOFIE, ESOFIE, RSREQ, SETSPS, LOWM, CLOSE,
        SETRST,
    ];

    /// All interrupt enable bits.
    pub const INTERRUPT_ENABLES: u16 = 0xff00;
}

/// Interrupt flag register (INTF).
pub mod intf {
    use super::{
        Access::{ClearOnWriteZero, ReadOnly},
        Field,
    };

    /// Successful transfer.  Summarizes the RX_ST/TX_ST flags of all endpoints, so it can only
    /// be cleared through EPxCS.
    pub const STIF: Field = Field::bit("STIF", 15, ReadOnly);
    pub const PMOUIF: Field = Field::bit("PMOUIF", 14, ClearOnWriteZero);
    pub const ERRIF: Field = Field::bit("ERRIF", 13, ClearOnWriteZero);
    pub const WKUPIF: Field = Field::bit("WKUPIF", 12, ClearOnWriteZero);
    pub const SPSIF: Field = Field::bit("SPSIF", 11, ClearOnWriteZero);
    pub const RSTIF: Field = Field::bit("RSTIF", 10, ClearOnWriteZero);
    pub const SOFIF: Field = Field::bit("SOFIF", 9, ClearOnWriteZero);
    pub const ESOFIF: Field = Field::bit("ESOFIF", 8, ClearOnWriteZero);
    /// Direction of the last completed transaction: 0 for IN, 1 for OUT (or SETUP).
    pub const DIR: Field = Field::bit("DIR", 4, ReadOnly);
    /// Endpoint id of the last completed transaction.
    pub const EPNUM: Field = Field::new("EPNUM", 0, 4, ReadOnly);

    pub const LAYOUT: &[Field] = &[
        STIF, PMOUIF, ERRIF, WKUPIF, SPSIF, RSTIF, SOFIF, ESOFIF, DIR, EPNUM,
    ];
}

/// Status register (STAT).
pub mod stat {
    use super::{Access::ReadOnly, Field};

    /// D+ line level
    pub const RXDP: Field = Field::bit("RXDP", 15, ReadOnly);
    /// D- line level
    pub const RXDM: Field = Field::bit("RXDM", 14, ReadOnly);
    pub const LOCK: Field = Field::bit("LOCK", 13, ReadOnly);
    /// Number of consecutive SOF packets lost
    pub const SOFLN: Field = Field::new("SOFLN", 11, 2, ReadOnly);
    /// Frame number
    pub const FCNT: Field = Field::new("FCNT", 0, 11, ReadOnly);

    pub const LAYOUT: &[Field] = &[RXDP, RXDM, LOCK, SOFLN, FCNT];
}

/// Device address register (DADDR).
pub mod daddr {
    use super::{Access::ReadWrite, Field};

    pub const USBEN: Field = Field::bit("USBEN", 7, ReadWrite);
    pub const USBADDR: Field = Field::new("USBADDR", 0, 7, ReadWrite);

    pub const LAYOUT: &[Field] = &[USBEN, USBADDR];
}

/// Buffer address register (BADDR).
pub mod baddr {
    use super::{Access::ReadWrite, Field};

    /// Buffer descriptor table offset in packet memory, in units of 8 bytes.
    pub const BAR: Field = Field::new("BAR", 3, 13, ReadWrite);

    pub const LAYOUT: &[Field] = &[BAR];
}

/// LPM sub-endpoint 0 register (SEP0).
pub mod sep0 {
    use super::{
        Access::{ClearOnWriteZero, ReadOnly, Toggle},
        Field,
    };

    /// LPM token received
    pub const SUB_ST: Field = Field::bit("SUB_ST", 15, ClearOnWriteZero);
    /// Handshake for the LPM token
    pub const SUB_STA: Field = Field::new("SUB_STA", 12, 2, Toggle);
    /// bmAttributes of the received LPM token
    pub const SUBPID_ATTR: Field = Field::new("SUBPID_ATTR", 0, 11, ReadOnly);

    pub const LAYOUT: &[Field] = &[SUB_ST, SUB_STA, SUBPID_ATTR];

    /// Fields of SUBPID_ATTR (bmAttributes of the LPM token), positioned within the register.
    pub const ATTR_BREMOTEWAKE: Field = Field::bit("bRemoteWake", 8, ReadOnly);
    pub const ATTR_HIRD: Field = Field::new("HIRD", 4, 4, ReadOnly);
    pub const ATTR_BLINKSTATE: Field = Field::new("bLinkState", 0, 4, ReadOnly);
}

/// LPM control register (LPMCTL).
pub mod lpmctl {
    use super::{Access::ReadWrite, Field};

    pub const STIE: Field = Field::bit("STIE", 15, ReadWrite);

    pub const LAYOUT: &[Field] = &[STIE];
}

/// LPM interrupt flag register (LPMINTF).
pub mod lpmintf {
    use super::{Access::ClearOnWriteZero, Field};

    pub const STIF: Field = Field::bit("STIF", 15, ClearOnWriteZero);

    pub const LAYOUT: &[Field] = &[STIF];
}

/// Endpoint control and status registers (EPxCS).
pub mod epcs {
    use super::{
        Access::{ClearOnWriteZero, ReadOnly, ReadWrite, Toggle},
        Field,
    };

    /// Reception completed
    pub const RX_ST: Field = Field::bit("RX_ST", 15, ClearOnWriteZero);
    /// Reception data PID toggle
    pub const RX_DTG: Field = Field::bit("RX_DTG", 14, Toggle);
    /// Reception transfer state
    pub const RX_STA: Field = Field::new("RX_STA", 12, 2, Toggle);
    /// SETUP transaction completed
    pub const SETUP: Field = Field::bit("SETUP", 11, ReadOnly);
    /// Endpoint type
    pub const EP_TYPE: Field = Field::new("EP_TYPE", 9, 2, ReadWrite);
    /// Endpoint kind: STATUS_OUT for control endpoints, double buffering for bulk endpoints
    pub const EP_KIND: Field = Field::bit("EP_KIND", 8, ReadWrite);
    /// Transmission completed
    pub const TX_ST: Field = Field::bit("TX_ST", 7, ClearOnWriteZero);
    /// Transmission data PID toggle
    pub const TX_DTG: Field = Field::bit("TX_DTG", 6, Toggle);
    /// Transmission transfer state
    pub const TX_STA: Field = Field::new("TX_STA", 4, 2, Toggle);
    /// Endpoint address
    pub const ADDR: Field = Field::new("ADDR", 0, 4, ReadWrite);

    pub const LAYOUT: &[Field] = &[
        RX_ST, RX_DTG, RX_STA, SETUP, EP_TYPE, EP_KIND, TX_ST, TX_DTG, TX_STA, ADDR,
    ];
}

/// RX count word of a buffer descriptor table entry.
pub mod rxcnt {
    use super::{Access::ReadWrite, Field};

    /// Block size: 0 for 2-byte blocks, 1 for 32-byte blocks
    pub const BLKSIZ: Field = Field::bit("BLKSIZ", 15, ReadWrite);
    pub const BLKNUM: Field = Field::new("BLKNUM", 10, 5, ReadWrite);
    /// Bytes received, written by the hardware
    pub const CNT: Field = Field::new("CNT", 0, 10, ReadWrite);

    pub const LAYOUT: &[Field] = &[BLKSIZ, BLKNUM, CNT];
}

/// TX count word of a buffer descriptor table entry.
pub mod txcnt {
    use super::{Access::ReadWrite, Field};

    pub const CNT: Field = Field::new("CNT", 0, 10, ReadWrite);

    pub const LAYOUT: &[Field] = &[CNT];
}

// EPxCS fields tile the whole register without overlapping.
const_assert_eq!(union(epcs::LAYOUT), 0xffff);
const_assert_eq!(total_width(epcs::LAYOUT), 16);
const_assert_eq!(union(rxcnt::LAYOUT), 0xffff);
const_assert_eq!(total_width(rxcnt::LAYOUT), 16);
const_assert_eq!(union(intf::LAYOUT), 0xff1f);
const_assert_eq!(union(ctl::LAYOUT) & ctl::INTERRUPT_ENABLES, ctl::INTERRUPT_ENABLES);

const_assert_eq!(epcs::RX_STA.mask(), 0x3000);
const_assert_eq!(epcs::EP_TYPE.mask(), 0x0600);
const_assert_eq!(epcs::TX_STA.mask(), 0x0030);
