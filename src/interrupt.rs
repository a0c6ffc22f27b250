use crate::endpoint::EndpointId;
use crate::fields::{ctl, intf, Field};
use crate::fmt::{trace, warn};
use crate::regs::{Register, RegisterAccess};
use crate::usbd::Usbd;
use bitflags::bitflags;
use embassy_usb_driver::Direction;
use static_assertions::const_assert_eq;

/// A USBD interrupt source.
///
/// Each source has an enable bit in CTL and a flag in INTF at the same bit position.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Interrupt {
    /// An endpoint completed a transfer.  The flag mirrors the endpoints' RX_ST/TX_ST flags.
    Transfer,
    PacketMemory,
    Error,
    Wakeup,
    Suspend,
    Reset,
    StartOfFrame,
    ExpectedStartOfFrame,
}

impl Interrupt {
    pub const ALL: [Interrupt; 8] = [
        Interrupt::Transfer,
        Interrupt::PacketMemory,
        Interrupt::Error,
        Interrupt::Wakeup,
        Interrupt::Suspend,
        Interrupt::Reset,
        Interrupt::StartOfFrame,
        Interrupt::ExpectedStartOfFrame,
    ];

    /// The INTF flag for this source.
    pub const fn flag(self) -> Field {
        match self {
            Interrupt::Transfer => intf::STIF,
            Interrupt::PacketMemory => intf::PMOUIF,
            Interrupt::Error => intf::ERRIF,
            Interrupt::Wakeup => intf::WKUPIF,
            Interrupt::Suspend => intf::SPSIF,
            Interrupt::Reset => intf::RSTIF,
            Interrupt::StartOfFrame => intf::SOFIF,
            Interrupt::ExpectedStartOfFrame => intf::ESOFIF,
        }
    }

    /// The CTL enable bit for this source.
    pub const fn enable(self) -> Field {
        match self {
            Interrupt::Transfer => ctl::STIE,
            Interrupt::PacketMemory => ctl::PMOUIE,
            Interrupt::Error => ctl::ERRIE,
            Interrupt::Wakeup => ctl::WKUPIE,
            Interrupt::Suspend => ctl::SPSIE,
            Interrupt::Reset => ctl::RSTIE,
            Interrupt::StartOfFrame => ctl::SOFIE,
            Interrupt::ExpectedStartOfFrame => ctl::ESOFIE,
        }
    }
}

bitflags! {
    /// A set of interrupt sources, stored as the CTL enable bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InterruptSet: u16 {
        const TRANSFER = ctl::STIE.mask();
        const PACKET_MEMORY = ctl::PMOUIE.mask();
        const ERROR = ctl::ERRIE.mask();
        const WAKEUP = ctl::WKUPIE.mask();
        const SUSPEND = ctl::SPSIE.mask();
        const RESET = ctl::RSTIE.mask();
        const START_OF_FRAME = ctl::SOFIE.mask();
        const EXPECTED_START_OF_FRAME = ctl::ESOFIE.mask();
    }
}

const_assert_eq!(InterruptSet::all().bits(), ctl::INTERRUPT_ENABLES);

#[cfg(feature = "defmt")]
impl defmt::Format for InterruptSet {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "InterruptSet({=u16:#x})", self.bits())
    }
}

impl From<Interrupt> for InterruptSet {
    fn from(interrupt: Interrupt) -> Self {
        Self::from_bits_retain(interrupt.enable().mask())
    }
}

/// A snapshot of the INTF register.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptStatus(u16);

impl InterruptStatus {
    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn is_pending(self, interrupt: Interrupt) -> bool {
        interrupt.flag().is_set(self.0)
    }

    pub fn pending(self) -> InterruptSet {
        // INTF flags line up with the CTL enable bits.
        InterruptSet::from_bits_truncate(self.0)
    }

    /// The endpoint and direction of the completed transfer, if a transfer is pending.
    ///
    /// OUT covers SETUP transactions, and also the case where both directions of the endpoint
    /// completed; check the endpoint's RX_ST/TX_ST flags to tell them apart.
    pub fn transfer(self) -> Option<(EndpointId, Direction)> {
        if !intf::STIF.is_set(self.0) {
            return None;
        }
        let epnum = intf::EPNUM.read(self.0) as u8;
        let Ok(ep) = EndpointId::try_from(epnum) else {
            warn!("transfer flagged on nonexistent endpoint {}", epnum);
            return None;
        };
        let direction = if intf::DIR.is_set(self.0) {
            Direction::Out
        } else {
            Direction::In
        };
        Some((ep, direction))
    }
}

impl<R: RegisterAccess> Usbd<R> {
    pub fn enable_interrupts(&self, interrupts: InterruptSet) {
        let ctl = self.regs.read(Register::Ctl);
        self.regs.write(Register::Ctl, ctl | interrupts.bits());
    }

    pub fn disable_interrupts(&self, interrupts: InterruptSet) {
        let ctl = self.regs.read(Register::Ctl);
        self.regs.write(Register::Ctl, ctl & !interrupts.bits());
    }

    pub fn enabled_interrupts(&self) -> InterruptSet {
        InterruptSet::from_bits_truncate(self.regs.read(Register::Ctl))
    }

    pub fn interrupt_status(&self) -> InterruptStatus {
        InterruptStatus(self.regs.read(Register::Intf))
    }

    /// Acknowledge one interrupt flag.
    ///
    /// Panics for [`Interrupt::Transfer`]: that flag clears once every endpoint's RX_ST/TX_ST
    /// flag has been cleared.
    pub fn clear_interrupt(&self, interrupt: Interrupt) {
        self.clear_interrupts(interrupt.into());
    }

    /// Acknowledge several interrupt flags in one write.
    pub fn clear_interrupts(&self, interrupts: InterruptSet) {
        assert!(
            !interrupts.contains(InterruptSet::TRANSFER),
            "the transfer interrupt flag is cleared through EPxCS"
        );
        trace!("clear interrupts {:#x}", interrupts.bits());
        // Flags are write-0-to-clear; the other bits of INTF are read-only.
        self.regs.write(Register::Intf, !interrupts.bits());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedUsbd;

    #[test]
    fn clearing_one_flag_keeps_the_others() {
        let sim = SimulatedUsbd::new();
        let usbd = Usbd::new(&sim);
        // STIF, RSTIF, SOFIF set; last transfer was OUT on endpoint 3
        sim.hw_set(Register::Intf, 0x8000 | 0x0400 | 0x0200 | 0x0010 | 0x3);

        usbd.clear_interrupt(Interrupt::Reset);
        let status = usbd.interrupt_status();
        assert!(!status.is_pending(Interrupt::Reset));
        assert!(status.is_pending(Interrupt::StartOfFrame));
        assert!(status.is_pending(Interrupt::Transfer));
        assert_eq!(status.transfer(), Some((EndpointId::EP3, Direction::Out)));

        usbd.clear_interrupts(InterruptSet::START_OF_FRAME | InterruptSet::WAKEUP);
        assert_eq!(usbd.interrupt_status().pending(), InterruptSet::TRANSFER);
    }

    #[test]
    #[should_panic(expected = "cleared through EPxCS")]
    fn transfer_flag_cannot_be_cleared_directly() {
        let sim = SimulatedUsbd::new();
        Usbd::new(&sim).clear_interrupt(Interrupt::Transfer);
    }

    #[test]
    fn transfer_decoding() {
        assert_eq!(InterruptStatus(0x0010 | 0x1).transfer(), None);
        assert_eq!(
            InterruptStatus(0x8000 | 0x5).transfer(),
            Some((EndpointId::EP5, Direction::In))
        );
        // Endpoint numbers above 7 don't exist on this peripheral.
        assert_eq!(InterruptStatus(0x8000 | 0x9).transfer(), None);
    }

    #[test]
    fn enable_and_disable() {
        let sim = SimulatedUsbd::new();
        let usbd = Usbd::new(&sim);
        sim.hw_set(Register::Ctl, 0x0004);

        usbd.enable_interrupts(InterruptSet::TRANSFER | InterruptSet::RESET | InterruptSet::SUSPEND);
        assert_eq!(sim.peek(Register::Ctl), 0x8000 | 0x0400 | 0x0800 | 0x0004);

        usbd.disable_interrupts(InterruptSet::SUSPEND);
        let enabled = usbd.enabled_interrupts();
        assert!(enabled.contains(InterruptSet::TRANSFER));
        assert!(!enabled.contains(InterruptSet::SUSPEND));
        assert_eq!(
            enabled.iter().collect::<Vec<_>>(),
            [InterruptSet::TRANSFER, InterruptSet::RESET]
        );
        assert_eq!(sim.peek(Register::Ctl) & 0x00ff, 0x0004);
    }

    #[test]
    fn sources_map_onto_the_set() {
        for interrupt in Interrupt::ALL {
            let set = InterruptSet::from(interrupt);
            assert_eq!(set.bits().count_ones(), 1);
            assert_eq!(set.bits(), interrupt.flag().mask());
        }
        assert_eq!(InterruptSet::from(Interrupt::Suspend), InterruptSet::SUSPEND);
        assert_eq!(InterruptSet::all().bits(), 0xff00);
        // Low CTL bits are controls, not interrupt enables.
        assert_eq!(InterruptSet::from_bits_truncate(0x8005), InterruptSet::TRANSFER);
    }
}
