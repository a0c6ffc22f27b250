use crate::fields::{lpmctl, lpmintf, sep0};
use crate::fmt::trace;
use crate::regs::{Register, RegisterAccess};
use crate::usbd::Usbd;

/// Handshake the device answers an LPM token with.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LpmHandshake {
    Disabled = 0,
    Stall = 1,
    Nyet = 2,
    /// Acknowledge the request (ACK).
    Valid = 3,
}

impl LpmHandshake {
    pub const fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0 => Self::Disabled,
            1 => Self::Stall,
            2 => Self::Nyet,
            _ => Self::Valid,
        }
    }
}

/// The bmAttributes of a received LPM token.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LpmRequest {
    pub remote_wake: bool,
    /// Host initiated resume duration.
    pub hird: u8,
    pub link_state: u8,
}

impl LpmRequest {
    fn from_sep0(sep0: u16) -> Self {
        Self {
            remote_wake: sep0::ATTR_BREMOTEWAKE.is_set(sep0),
            hird: sep0::ATTR_HIRD.read(sep0) as u8,
            link_state: sep0::ATTR_BLINKSTATE.read(sep0) as u8,
        }
    }
}

impl<R: RegisterAccess> Usbd<R> {
    /// The last LPM token, if one was received and not yet cleared.
    pub fn lpm_request(&self) -> Option<LpmRequest> {
        let sep0 = self.regs.read(Register::Sep0);
        if sep0::SUB_ST.is_set(sep0) {
            Some(LpmRequest::from_sep0(sep0))
        } else {
            None
        }
    }

    pub fn lpm_handshake(&self) -> LpmHandshake {
        LpmHandshake::from_bits(sep0::SUB_STA.read(self.regs.read(Register::Sep0)))
    }

    /// Select the handshake for future LPM tokens.
    ///
    /// SUB_STA toggles on write like the endpoint transfer states, and SUB_ST is
    /// write-0-to-clear, so this follows the same protocol as the EPxCS state setters.
    pub fn set_lpm_handshake(&self, handshake: LpmHandshake) {
        let sep0 = self.regs.read(Register::Sep0);
        let toggle = (sep0 ^ sep0::SUB_STA.encode(handshake as u16)) & sep0::SUB_STA.mask();
        trace!("LPM handshake {:?}", handshake);
        self.regs
            .write(Register::Sep0, sep0::SUB_ST.mask() | toggle);
    }

    /// Acknowledge a received LPM token.
    pub fn clear_lpm_request(&self) {
        // Zeros leave SUB_STA alone, and SUBPID_ATTR is read-only.
        self.regs.write(Register::Sep0, !sep0::SUB_ST.mask() & !sep0::SUB_STA.mask());
    }

    pub fn set_lpm_interrupt_enabled(&self, enabled: bool) {
        self.regs
            .write(Register::LpmCtl, lpmctl::STIE.encode(enabled as u16));
    }

    pub fn lpm_interrupt_pending(&self) -> bool {
        lpmintf::STIF.is_set(self.regs.read(Register::LpmIntf))
    }

    pub fn clear_lpm_interrupt(&self) {
        self.regs
            .write(Register::LpmIntf, !lpmintf::STIF.mask());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedUsbd;

    #[test]
    fn decode_request() {
        let sim = SimulatedUsbd::new();
        let usbd = Usbd::new(&sim);
        assert_eq!(usbd.lpm_request(), None);

        // SUB_ST, bRemoteWake, HIRD=0xa, bLinkState=1
        sim.hw_set(Register::Sep0, 0x8000 | 0x0100 | 0x00a0 | 0x0001);
        assert_eq!(
            usbd.lpm_request(),
            Some(LpmRequest {
                remote_wake: true,
                hird: 0xa,
                link_state: 1,
            })
        );

        usbd.clear_lpm_request();
        assert_eq!(usbd.lpm_request(), None);
        assert_eq!(sim.peek(Register::Sep0), 0x01a1);
    }

    #[test]
    fn handshake_changes_keep_pending_request() {
        let sim = SimulatedUsbd::new();
        let usbd = Usbd::new(&sim);
        sim.hw_set(Register::Sep0, 0x8000 | 0x2000);

        for handshake in [
            LpmHandshake::Valid,
            LpmHandshake::Stall,
            LpmHandshake::Disabled,
            LpmHandshake::Nyet,
        ] {
            usbd.set_lpm_handshake(handshake);
            assert_eq!(usbd.lpm_handshake(), handshake);
            assert!(usbd.lpm_request().is_some());
        }
    }

    #[test]
    fn lpm_interrupt() {
        let sim = SimulatedUsbd::new();
        let usbd = Usbd::new(&sim);
        usbd.set_lpm_interrupt_enabled(true);
        assert_eq!(sim.peek(Register::LpmCtl), 0x8000);

        sim.hw_raise(Register::LpmIntf, 0x8000);
        assert!(usbd.lpm_interrupt_pending());
        usbd.clear_lpm_interrupt();
        assert!(!usbd.lpm_interrupt_pending());
    }
}
