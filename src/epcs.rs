//! The EPxCS write protocol.
//!
//! EPxCS mixes four kinds of fields in one 16-bit register:
//!
//! - RX_STA, TX_STA, RX_DTG and TX_DTG flip when written with 1 and ignore 0.
//! - RX_ST and TX_ST are set by the hardware and cleared by writing 0.  Writing 1 does nothing.
//! - SETUP is read-only.
//! - EP_TYPE, EP_KIND and ADDR are ordinary read/write fields.
//!
//! Writing back the value just read is therefore not a no-op: it would flip every toggle bit that
//! is currently 1 and clear any completed flag that was 0 at read time, even if the hardware set
//! it in between.  Every value written to EPxCS is computed here, from a single read of the
//! register, following the same rule: plain fields are copied, completed flags are written as 1
//! unless the operation is meant to clear them, and toggle bits are written as 1 only where they
//! should change.

use crate::endpoint::{EndpointType, TransferState};
use crate::fields::epcs::{
    ADDR, EP_KIND, EP_TYPE, RX_DTG, RX_ST, RX_STA, SETUP, TX_DTG, TX_ST, TX_STA,
};

/// Plain read/write fields, written back verbatim.
const PRESERVE: u16 = EP_TYPE.mask() | EP_KIND.mask() | ADDR.mask();
/// Write-0-to-clear flags, written as 1 so they stay as the hardware left them.
const KEEP_COMPLETED: u16 = RX_ST.mask() | TX_ST.mask();

/// A snapshot of one EPxCS register.
#[derive(Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Epcs(u16);

impl Epcs {
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn rx_state(self) -> TransferState {
        TransferState::from_bits(RX_STA.read(self.0))
    }

    pub const fn tx_state(self) -> TransferState {
        TransferState::from_bits(TX_STA.read(self.0))
    }

    /// RX_DTG.  On double-buffered endpoints this is the TX software buffer pointer.
    pub const fn rx_data_toggle(self) -> bool {
        RX_DTG.is_set(self.0)
    }

    /// TX_DTG.  On double-buffered endpoints this is the RX software buffer pointer.
    pub const fn tx_data_toggle(self) -> bool {
        TX_DTG.is_set(self.0)
    }

    pub const fn rx_completed(self) -> bool {
        RX_ST.is_set(self.0)
    }

    pub const fn tx_completed(self) -> bool {
        TX_ST.is_set(self.0)
    }

    /// The last completed OUT transaction was a SETUP.
    pub const fn setup(self) -> bool {
        SETUP.is_set(self.0)
    }

    pub const fn endpoint_type(self) -> EndpointType {
        EndpointType::from_bits(EP_TYPE.read(self.0))
    }

    pub const fn kind(self) -> bool {
        EP_KIND.is_set(self.0)
    }

    pub const fn address(self) -> u8 {
        ADDR.read(self.0) as u8
    }

    /// Value to write so RX_STA and/or TX_STA end up in the requested states.
    ///
    /// The XOR of the current and desired field values is exactly the set of bits that must be
    /// toggled.  A direction passed as `None` gets zeros in its field and keeps its state.
    pub const fn state_write(self, rx: Option<TransferState>, tx: Option<TransferState>) -> u16 {
        let mut value = self.base_write();
        if let Some(state) = rx {
            value |= (self.0 ^ RX_STA.encode(state.bits())) & RX_STA.mask();
        }
        if let Some(state) = tx {
            value |= (self.0 ^ TX_STA.encode(state.bits())) & TX_STA.mask();
        }
        value
    }

    /// Value to write to flip the toggle bits in `toggle` (RX_DTG and/or TX_DTG).
    pub const fn toggle_write(self, toggle: u16) -> u16 {
        self.base_write() | (toggle & (RX_DTG.mask() | TX_DTG.mask()))
    }

    /// Value to write to clear the completed flags in `clear` (RX_ST and/or TX_ST).
    pub const fn clear_completed_write(self, clear: u16) -> u16 {
        self.base_write() & !(clear & KEEP_COMPLETED)
    }

    /// Value to write to set EP_TYPE.
    pub const fn type_write(self, ep_type: EndpointType) -> u16 {
        (self.base_write() & !EP_TYPE.mask()) | EP_TYPE.encode(ep_type.bits())
    }

    /// Value to write to set or clear EP_KIND.
    pub const fn kind_write(self, kind: bool) -> u16 {
        (self.base_write() & !EP_KIND.mask()) | EP_KIND.encode(kind as u16)
    }

    /// Value to write to set ADDR.  `address` must fit in 4 bits.
    pub const fn address_write(self, address: u8) -> u16 {
        (self.base_write() & !ADDR.mask()) | ADDR.encode(address as u16)
    }

    /// Value to write to set EP_TYPE and ADDR together.
    pub const fn configure_write(self, ep_type: EndpointType, address: u8) -> u16 {
        (self.base_write() & !(EP_TYPE.mask() | ADDR.mask()))
            | EP_TYPE.encode(ep_type.bits())
            | ADDR.encode(address as u16)
    }

    /// A write that changes nothing: plain fields copied, completed flags written as 1, toggle
    /// bits written as 0.
    const fn base_write(self) -> u16 {
        (self.0 & PRESERVE) | KEEP_COMPLETED
    }
}

impl core::fmt::Debug for Epcs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Epcs")
            .field("bits", &format_args!("{:#06x}", self.0))
            .field("rx_state", &self.rx_state())
            .field("tx_state", &self.tx_state())
            .field("rx_dtg", &self.rx_data_toggle())
            .field("tx_dtg", &self.tx_data_toggle())
            .field("rx_st", &self.rx_completed())
            .field("tx_st", &self.tx_completed())
            .field("setup", &self.setup())
            .field("type", &self.endpoint_type())
            .field("kind", &self.kind())
            .field("addr", &self.address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::TransferState::*;

    const STATES: [TransferState; 4] = [Disabled, Stall, Nak, Valid];

    /// Apply a write to an EPxCS value the way the hardware does.
    fn apply(current: u16, written: u16) -> u16 {
        let toggles = RX_DTG.mask() | RX_STA.mask() | TX_DTG.mask() | TX_STA.mask();
        (current & SETUP.mask())
            | (written & PRESERVE)
            | (current & written & KEEP_COMPLETED)
            | ((current ^ written) & toggles)
    }

    #[test]
    fn decode_fields() {
        // RX_ST, RX VALID, SETUP, CONTROL, TX_DTG, TX NAK, address 2
        let r = Epcs::from_bits(0x8000 | 0x3000 | 0x0800 | 0x0200 | 0x0040 | 0x0020 | 0x2);
        assert!(r.rx_completed());
        assert!(!r.tx_completed());
        assert_eq!(r.rx_state(), Valid);
        assert_eq!(r.tx_state(), Nak);
        assert!(r.setup());
        assert_eq!(r.endpoint_type(), EndpointType::Control);
        assert!(!r.kind());
        assert!(!r.rx_data_toggle());
        assert!(r.tx_data_toggle());
        assert_eq!(r.address(), 2);
    }

    #[test]
    fn state_write_reaches_every_state() {
        for other in 0..=u16::MAX {
            let r = Epcs::from_bits(other);
            for want in STATES {
                let tx = Epcs::from_bits(apply(other, r.state_write(None, Some(want))));
                assert_eq!(tx.tx_state(), want);
                assert_eq!(tx.rx_state(), r.rx_state());
                assert_eq!(tx.bits() & !TX_STA.mask(), other & !TX_STA.mask());

                let rx = Epcs::from_bits(apply(other, r.state_write(Some(want), None)));
                assert_eq!(rx.rx_state(), want);
                assert_eq!(rx.bits() & !RX_STA.mask(), other & !RX_STA.mask());
            }
        }
    }

    #[test]
    fn writes_never_clear_completed_flags_by_accident() {
        let r = Epcs::from_bits(0);
        assert_eq!(r.state_write(Some(Valid), Some(Nak)) & KEEP_COMPLETED, KEEP_COMPLETED);
        assert_eq!(r.toggle_write(RX_DTG.mask()) & KEEP_COMPLETED, KEEP_COMPLETED);
        assert_eq!(r.type_write(EndpointType::Interrupt) & KEEP_COMPLETED, KEEP_COMPLETED);
        assert_eq!(r.kind_write(true) & KEEP_COMPLETED, KEEP_COMPLETED);
        assert_eq!(r.address_write(9) & KEEP_COMPLETED, KEEP_COMPLETED);
    }

    #[test]
    fn clear_completed_only_clears_the_requested_flag() {
        let r = Epcs::from_bits(0xc0c0);
        let after = apply(r.bits(), r.clear_completed_write(RX_ST.mask()));
        assert_eq!(after, 0x40c0);
        let after = apply(r.bits(), r.clear_completed_write(TX_ST.mask()));
        assert_eq!(after, 0xc040);
    }

    #[test]
    fn toggle_write_leaves_states_alone() {
        let r = Epcs::from_bits(0x3030);
        let after = Epcs::from_bits(apply(r.bits(), r.toggle_write(TX_DTG.mask())));
        assert!(after.tx_data_toggle());
        assert!(!after.rx_data_toggle());
        assert_eq!(after.rx_state(), Valid);
        assert_eq!(after.tx_state(), Valid);
    }

    #[test]
    fn plain_field_writes() {
        let r = Epcs::from_bits(0x7175);
        let after = Epcs::from_bits(apply(r.bits(), r.configure_write(EndpointType::Interrupt, 3)));
        assert_eq!(after.endpoint_type(), EndpointType::Interrupt);
        assert_eq!(after.address(), 3);
        assert!(after.kind());
        assert_eq!(after.bits() & 0x70f0, 0x7070);
    }
}
