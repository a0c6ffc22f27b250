use crate::endpoint::{EndpointId, ENDPOINT_COUNT};
use crate::fields::{self, Field};
use static_assertions::const_assert_eq;
use vcell::VolatileCell;

/// Base address of the USBD register block.
pub const USBD_BASE: usize = 0x4000_5c00;
/// Base address of the USBD packet memory.
pub const USBD_RAM_BASE: usize = 0x4000_6000;

/// One of the USBD registers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Control register
    Ctl,
    /// Interrupt flag register
    Intf,
    /// Status register
    Stat,
    /// Device address register
    Daddr,
    /// Buffer descriptor table address register
    Baddr,
    /// LPM sub-endpoint 0 register
    Sep0,
    /// LPM interrupt control register
    LpmCtl,
    /// LPM interrupt flag register
    LpmIntf,
    /// Endpoint control and status register
    EpCs(EndpointId),
}

impl Register {
    /// Every register in the peripheral, in address order.
    pub const ALL: [Register; 16] = [
        Register::EpCs(EndpointId::EP0),
        Register::EpCs(EndpointId::EP1),
        Register::EpCs(EndpointId::EP2),
        Register::EpCs(EndpointId::EP3),
        Register::EpCs(EndpointId::EP4),
        Register::EpCs(EndpointId::EP5),
        Register::EpCs(EndpointId::EP6),
        Register::EpCs(EndpointId::EP7),
        Register::Ctl,
        Register::Intf,
        Register::Stat,
        Register::Daddr,
        Register::Baddr,
        Register::Sep0,
        Register::LpmCtl,
        Register::LpmIntf,
    ];

    /// Offset from the peripheral base address.
    pub const fn offset(self) -> usize {
        match self {
            Register::EpCs(ep) => 4 * ep.index() as usize,
            Register::Ctl => 0x40,
            Register::Intf => 0x44,
            Register::Stat => 0x48,
            Register::Daddr => 0x4c,
            Register::Baddr => 0x50,
            Register::Sep0 => 0x100,
            Register::LpmCtl => 0x140,
            Register::LpmIntf => 0x144,
        }
    }

    pub const fn address(self, base: usize) -> usize {
        base + self.offset()
    }

    /// Width of the register in bits.  The registers sit on a 32-bit stride, but only the low 16
    /// bits are implemented.
    pub const fn width(self) -> u8 {
        16
    }

    pub const fn name(self) -> &'static str {
        match self {
            Register::EpCs(_) => "EPxCS",
            Register::Ctl => "CTL",
            Register::Intf => "INTF",
            Register::Stat => "STAT",
            Register::Daddr => "DADDR",
            Register::Baddr => "BADDR",
            Register::Sep0 => "SEP0",
            Register::LpmCtl => "LPMCTL",
            Register::LpmIntf => "LPMINTF",
        }
    }

    /// The bit fields of this register.
    pub const fn layout(self) -> &'static [Field] {
        match self {
            Register::EpCs(_) => fields::epcs::LAYOUT,
            Register::Ctl => fields::ctl::LAYOUT,
            Register::Intf => fields::intf::LAYOUT,
            Register::Stat => fields::stat::LAYOUT,
            Register::Daddr => fields::daddr::LAYOUT,
            Register::Baddr => fields::baddr::LAYOUT,
            Register::Sep0 => fields::sep0::LAYOUT,
            Register::LpmCtl => fields::lpmctl::LAYOUT,
            Register::LpmIntf => fields::lpmintf::LAYOUT,
        }
    }
}

/// Raw 16-bit access to the USBD registers.
///
/// This is the boundary to the platform: the memory-mapped [`UsbdRegisterBlock`] implements it on
/// real hardware.  Each call must turn into exactly one bus access, since a single write is the
/// only atomic operation the peripheral offers.
pub trait RegisterAccess {
    fn read(&self, reg: Register) -> u16;
    fn write(&self, reg: Register, value: u16);
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for &T {
    fn read(&self, reg: Register) -> u16 {
        (**self).read(reg)
    }
    fn write(&self, reg: Register, value: u16) {
        (**self).write(reg, value)
    }
}

/// The memory-mapped USBD register block.
#[repr(C)]
pub struct UsbdRegisterBlock {
    epcs: [VolatileCell<u32>; ENDPOINT_COUNT], // 0x0000 to 0x0020
    _reserved0020: [u8; 0x20],
    ctl: VolatileCell<u32>,   // 0x0040
    intf: VolatileCell<u32>,  // 0x0044
    stat: VolatileCell<u32>,  // 0x0048
    daddr: VolatileCell<u32>, // 0x004c
    baddr: VolatileCell<u32>, // 0x0050
    _reserved0054: [u8; 0xac],
    sep0: VolatileCell<u32>, // 0x0100
    _reserved0104: [u8; 0x3c],
    lpmctl: VolatileCell<u32>,  // 0x0140
    lpmintf: VolatileCell<u32>, // 0x0144
}

// Sanity check our layout
const_assert_eq!(core::mem::offset_of!(UsbdRegisterBlock, ctl), 0x40);
const_assert_eq!(core::mem::offset_of!(UsbdRegisterBlock, intf), 0x44);
const_assert_eq!(core::mem::offset_of!(UsbdRegisterBlock, stat), 0x48);
const_assert_eq!(core::mem::offset_of!(UsbdRegisterBlock, daddr), 0x4c);
const_assert_eq!(core::mem::offset_of!(UsbdRegisterBlock, baddr), 0x50);
const_assert_eq!(core::mem::offset_of!(UsbdRegisterBlock, sep0), 0x100);
const_assert_eq!(core::mem::offset_of!(UsbdRegisterBlock, lpmctl), 0x140);
const_assert_eq!(core::mem::offset_of!(UsbdRegisterBlock, lpmintf), 0x144);

// Safety: every access is a single volatile load or store.  Serializing read-modify-write
// sequences across execution contexts is the caller's job (see SharedUsbd).
unsafe impl Sync for UsbdRegisterBlock {}

impl UsbdRegisterBlock {
    fn cell(&self, reg: Register) -> &VolatileCell<u32> {
        match reg {
            Register::EpCs(ep) => &self.epcs[ep.index() as usize],
            Register::Ctl => &self.ctl,
            Register::Intf => &self.intf,
            Register::Stat => &self.stat,
            Register::Daddr => &self.daddr,
            Register::Baddr => &self.baddr,
            Register::Sep0 => &self.sep0,
            Register::LpmCtl => &self.lpmctl,
            Register::LpmIntf => &self.lpmintf,
        }
    }
}

impl RegisterAccess for UsbdRegisterBlock {
    fn read(&self, reg: Register) -> u16 {
        self.cell(reg).get() as u16
    }

    fn write(&self, reg: Register, value: u16) {
        self.cell(reg).set(u32::from(value))
    }
}

/// Get the USBD register block at its fixed address.
///
/// # Safety
///
/// The caller must ensure the peripheral is clocked and that only one handle to it is used at a
/// time (or that accesses are otherwise serialized).
pub(crate) unsafe fn get_usbd_register_block() -> &'static UsbdRegisterBlock {
    register_block_at(USBD_BASE)
}

/// Get a USBD register block at an arbitrary base address.
///
/// # Safety
///
/// `base` must point at a USBD register block that stays mapped for the rest of the program.
pub(crate) unsafe fn register_block_at(base: usize) -> &'static UsbdRegisterBlock {
    &*(base as *const UsbdRegisterBlock)
}
