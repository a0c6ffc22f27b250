use crate::Error;
use embassy_usb_driver::{Direction, EndpointAddress};

pub const ENDPOINT_COUNT: usize = 8;

/// Index of one of the eight EPxCS registers.
///
/// Constructing an id outside 0-7 is a firmware bug, so [`EndpointId::new`] panics on it (in
/// every build profile).  Use `EndpointId::try_from()` for ids that come from the wire.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndpointId(u8);

impl EndpointId {
    pub const EP0: Self = Self::new(0);
    pub const EP1: Self = Self::new(1);
    pub const EP2: Self = Self::new(2);
    pub const EP3: Self = Self::new(3);
    pub const EP4: Self = Self::new(4);
    pub const EP5: Self = Self::new(5);
    pub const EP6: Self = Self::new(6);
    pub const EP7: Self = Self::new(7);

    pub const fn new(index: u8) -> Self {
        assert!(
            (index as usize) < ENDPOINT_COUNT,
            "endpoint id out of range"
        );
        Self(index)
    }

    pub const fn index(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..ENDPOINT_COUNT as u8).map(Self)
    }

    /// The USB-facing endpoint address for this endpoint in the given direction.
    pub fn address(self, direction: Direction) -> EndpointAddress {
        EndpointAddress::from_parts(self.0 as usize, direction)
    }

    /// Split a USB endpoint address (bit 7 = IN, bits 3:0 = number) into the endpoint id and
    /// direction.
    pub fn from_address(addr: EndpointAddress) -> Result<(Self, Direction), Error> {
        let index = addr.index();
        if index >= ENDPOINT_COUNT {
            return Err(Error::InvalidEndpoint(index as u8));
        }
        Ok((Self(index as u8), addr.direction()))
    }
}

impl TryFrom<u8> for EndpointId {
    type Error = Error;

    fn try_from(index: u8) -> Result<Self, Error> {
        if (index as usize) < ENDPOINT_COUNT {
            Ok(Self(index))
        } else {
            Err(Error::InvalidEndpoint(index))
        }
    }
}

impl From<EndpointId> for usize {
    fn from(ep: EndpointId) -> usize {
        ep.0 as usize
    }
}

/// Handshake state of one direction of an endpoint, as stored in RX_STA/TX_STA.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferState {
    /// All requests are ignored.
    Disabled = 0,
    /// Requests are answered with STALL.
    Stall = 1,
    /// Requests are answered with NAK.
    Nak = 2,
    /// The endpoint is ready for a transfer.
    Valid = 3,
}

impl TransferState {
    pub const fn bits(self) -> u16 {
        self as u16
    }

    /// Decode a 2-bit field value.  Higher bits are ignored.
    pub const fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0 => Self::Disabled,
            1 => Self::Stall,
            2 => Self::Nak,
            _ => Self::Valid,
        }
    }
}

impl TryFrom<u8> for TransferState {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        if value > 3 {
            return Err(Error::InvalidTransferState(value));
        }
        Ok(Self::from_bits(value as u16))
    }
}

/// Endpoint transfer type, in the encoding of the EP_TYPE field.
///
/// Note that this differs from the encoding used in endpoint descriptors.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndpointType {
    Bulk = 0,
    Control = 1,
    Isochronous = 2,
    Interrupt = 3,
}

impl EndpointType {
    pub const fn bits(self) -> u16 {
        self as u16
    }

    pub const fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0 => Self::Bulk,
            1 => Self::Control,
            2 => Self::Isochronous,
            _ => Self::Interrupt,
        }
    }

    /// Whether EP_KIND selects double buffering for this type.
    pub const fn supports_double_buffering(self) -> bool {
        matches!(self, Self::Bulk | Self::Isochronous)
    }
}

impl TryFrom<u8> for EndpointType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        if value > 3 {
            return Err(Error::InvalidEndpointType(value));
        }
        Ok(Self::from_bits(value as u16))
    }
}

impl From<embassy_usb_driver::EndpointType> for EndpointType {
    fn from(ep_type: embassy_usb_driver::EndpointType) -> Self {
        match ep_type {
            embassy_usb_driver::EndpointType::Control => Self::Control,
            embassy_usb_driver::EndpointType::Isochronous => Self::Isochronous,
            embassy_usb_driver::EndpointType::Bulk => Self::Bulk,
            embassy_usb_driver::EndpointType::Interrupt => Self::Interrupt,
        }
    }
}

impl From<EndpointType> for embassy_usb_driver::EndpointType {
    fn from(ep_type: EndpointType) -> Self {
        match ep_type {
            EndpointType::Control => Self::Control,
            EndpointType::Isochronous => Self::Isochronous,
            EndpointType::Bulk => Self::Bulk,
            EndpointType::Interrupt => Self::Interrupt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_id_range() {
        assert_eq!(EndpointId::try_from(7), Ok(EndpointId::EP7));
        assert_eq!(EndpointId::try_from(8), Err(Error::InvalidEndpoint(8)));
        assert_eq!(EndpointId::all().count(), ENDPOINT_COUNT);
        assert_eq!(usize::from(EndpointId::EP5), 5);
    }

    #[test]
    #[should_panic(expected = "endpoint id out of range")]
    fn endpoint_id_new_rejects_out_of_range() {
        let index = 8;
        EndpointId::new(index);
    }

    #[test]
    fn endpoint_addresses() {
        assert_eq!(u8::from(EndpointId::EP1.address(Direction::In)), 0x81);
        assert_eq!(u8::from(EndpointId::EP7.address(Direction::Out)), 0x07);

        let (ep, dir) = EndpointId::from_address(EndpointAddress::from(0x83)).unwrap();
        assert_eq!(ep, EndpointId::EP3);
        assert_eq!(dir, Direction::In);

        let (ep, dir) = EndpointId::from_address(EndpointAddress::from(0x00)).unwrap();
        assert_eq!(ep, EndpointId::EP0);
        assert_eq!(dir, Direction::Out);

        assert_eq!(
            EndpointId::from_address(EndpointAddress::from(0x8a)),
            Err(Error::InvalidEndpoint(10))
        );
    }

    #[test]
    fn transfer_state_encoding() {
        assert_eq!(TransferState::Valid.bits(), 3);
        assert_eq!(TransferState::from_bits(0b110), TransferState::Nak);
        assert_eq!(TransferState::try_from(1), Ok(TransferState::Stall));
        assert_eq!(
            TransferState::try_from(4),
            Err(Error::InvalidTransferState(4))
        );
    }

    #[test]
    fn endpoint_type_conversions() {
        // Descriptor encoding is Control=0, Isochronous=1, Bulk=2, Interrupt=3
        let bulk: EndpointType = embassy_usb_driver::EndpointType::Bulk.into();
        assert_eq!(bulk.bits(), 0);
        let control: EndpointType = embassy_usb_driver::EndpointType::Control.into();
        assert_eq!(control.bits(), 1);
        assert_eq!(EndpointType::try_from(5), Err(Error::InvalidEndpointType(5)));
        assert!(EndpointType::Isochronous.supports_double_buffering());
        assert!(!EndpointType::Interrupt.supports_double_buffering());
    }
}
