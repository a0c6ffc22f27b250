use crate::endpoint::{EndpointId, EndpointType, TransferState, ENDPOINT_COUNT};
use crate::epcs::Epcs;
use crate::fields::{baddr, ctl, daddr, epcs, stat, Field};
use crate::fmt::{debug, trace};
use crate::regs::{get_usbd_register_block, Register, RegisterAccess, UsbdRegisterBlock};
use crate::Config;

/// Size in bytes of a buffer descriptor table with an entry per endpoint.
const BUFFER_TABLE_SIZE: usize = 8 * ENDPOINT_COUNT;

/// Handle to the USBD peripheral.
///
/// All register access goes through this handle.  Each method performs at most one read-modify-
/// write of a single register, issued as one bus write.  The methods are not atomic with respect
/// to other code touching the same register (for instance an interrupt handler); use
/// [`SharedUsbd`](crate::SharedUsbd) or otherwise serialize access when the handle is shared.
pub struct Usbd<R: RegisterAccess> {
    pub(crate) regs: R,
}

impl Usbd<&'static UsbdRegisterBlock> {
    /// Create a handle to the USBD peripheral at its fixed address.
    ///
    /// # Safety
    ///
    /// Only one handle may exist at a time, and the peripheral clock must be enabled.
    ///
    /// The handle does not give the register block back, so EPxCS can only be written through
    /// the methods below:
    ///
    /// ```compile_fail
    /// let usbd = unsafe { gd32_usbd::Usbd::steal() };
    /// let block = usbd.free();
    /// ```
    ///
    /// ```compile_fail
    /// let block = unsafe { gd32_usbd::regs::get_usbd_register_block() };
    /// ```
    pub unsafe fn steal() -> Self {
        Self::new(get_usbd_register_block())
    }
}

impl<R: RegisterAccess> Usbd<R> {
    pub const fn new(regs: R) -> Self {
        Self { regs }
    }

    /// Bring the peripheral out of reset and enable the configured interrupts.
    ///
    /// The transceiver must already be powered up (CTL.CLOSE cleared) and its startup time
    /// elapsed.
    pub fn init(&self, config: &Config) {
        debug!(
            "USBD init: interrupts {:#x} btable {:#x}",
            config.interrupts.bits(),
            config.buffer_table
        );
        // Pulse the reset with everything else in CTL cleared.
        self.regs.write(Register::Ctl, ctl::SETRST.mask());
        self.regs.write(Register::Ctl, 0);
        // Discard anything that was flagged while in reset.
        self.regs.write(Register::Intf, 0);
        self.set_buffer_table_address(config.buffer_table);
        self.regs.write(Register::Ctl, config.interrupts.bits());
        self.set_lpm_interrupt_enabled(config.lpm_interrupt);
    }

    fn modify_ctl(&self, field: Field, set: bool) {
        let value = self.regs.read(Register::Ctl);
        let value = if set {
            value | field.mask()
        } else {
            value & !field.mask()
        };
        self.regs.write(Register::Ctl, value);
    }

    /// Hold (or release) the peripheral in USB reset.
    pub fn force_reset(&self, reset: bool) {
        self.modify_ctl(ctl::SETRST, reset);
    }

    /// Power the analog transceiver down or back up.
    pub fn set_powered_down(&self, powered_down: bool) {
        self.modify_ctl(ctl::CLOSE, powered_down);
    }

    /// Enter suspend state, optionally also entering low-power mode.
    pub fn suspend(&self, low_power: bool) {
        let mut value = self.regs.read(Register::Ctl) | ctl::SETSPS.mask();
        if low_power {
            value |= ctl::LOWM.mask();
        }
        self.regs.write(Register::Ctl, value);
    }

    /// Leave suspend and low-power mode.
    pub fn wake(&self) {
        let value = self.regs.read(Register::Ctl) & !(ctl::SETSPS.mask() | ctl::LOWM.mask());
        self.regs.write(Register::Ctl, value);
    }

    /// Drive (or stop driving) resume signalling on the bus.
    pub fn request_resume(&self, resume: bool) {
        self.modify_ctl(ctl::RSREQ, resume);
    }

    pub fn frame_number(&self) -> u16 {
        stat::FCNT.read(self.regs.read(Register::Stat))
    }

    pub fn lost_sof_count(&self) -> u8 {
        stat::SOFLN.read(self.regs.read(Register::Stat)) as u8
    }

    pub fn is_locked(&self) -> bool {
        stat::LOCK.is_set(self.regs.read(Register::Stat))
    }

    pub fn line_state(&self) -> LineState {
        let value = self.regs.read(Register::Stat);
        LineState {
            dp: stat::RXDP.is_set(value),
            dm: stat::RXDM.is_set(value),
        }
    }

    /// Set the USB device address (0-127), keeping the enable bit.
    pub fn set_device_address(&self, address: u8) {
        assert!(address < 0x80, "device address out of range");
        let value = self.regs.read(Register::Daddr) & daddr::USBEN.mask();
        debug!("device address {}", address);
        self.regs
            .write(Register::Daddr, value | daddr::USBADDR.encode(address as u16));
    }

    pub fn device_address(&self) -> u8 {
        daddr::USBADDR.read(self.regs.read(Register::Daddr)) as u8
    }

    /// Enable or disable the USB function.
    pub fn set_enabled(&self, enabled: bool) {
        let value = self.regs.read(Register::Daddr) & daddr::USBADDR.mask();
        self.regs
            .write(Register::Daddr, value | daddr::USBEN.encode(enabled as u16));
    }

    pub fn is_enabled(&self) -> bool {
        daddr::USBEN.is_set(self.regs.read(Register::Daddr))
    }

    /// Set the packet memory offset of the buffer descriptor table.  Must be 8-byte aligned, with
    /// room for an entry per endpoint below the 64KiB offset limit.
    pub fn set_buffer_table_address(&self, offset: u16) {
        assert!(
            offset & !baddr::BAR.mask() == 0,
            "buffer table must be 8-byte aligned"
        );
        assert!(
            usize::from(offset) + BUFFER_TABLE_SIZE <= 0x1_0000,
            "buffer table must fit below offset 0x10000"
        );
        self.regs.write(Register::Baddr, offset);
    }

    pub fn buffer_table_address(&self) -> u16 {
        self.regs.read(Register::Baddr) & baddr::BAR.mask()
    }

    /// Packet memory offset of the buffer descriptor table entry for `ep`.
    ///
    /// Offsets wrap at 16 bits, as the peripheral's address decoding does, if BADDR was
    /// programmed behind this handle's back.
    pub fn buffer_descriptor_offset(&self, ep: EndpointId) -> u16 {
        self.buffer_table_address()
            .wrapping_add(8 * u16::from(ep.index()))
    }

    /// Read the endpoint's EPxCS register.
    pub fn endpoint_status(&self, ep: EndpointId) -> Epcs {
        Epcs::from_bits(self.regs.read(Register::EpCs(ep)))
    }

    fn write_epcs(&self, ep: EndpointId, current: Epcs, value: u16) {
        trace!(
            "EP{} EPxCS {:#x} write {:#x}",
            ep.index(),
            current.bits(),
            value
        );
        self.regs.write(Register::EpCs(ep), value);
    }

    pub fn get_rx_state(&self, ep: EndpointId) -> TransferState {
        self.endpoint_status(ep).rx_state()
    }

    pub fn get_tx_state(&self, ep: EndpointId) -> TransferState {
        self.endpoint_status(ep).tx_state()
    }

    /// Set the receive transfer state, leaving every other field unchanged.
    pub fn set_rx_state(&self, ep: EndpointId, state: TransferState) {
        let current = self.endpoint_status(ep);
        self.write_epcs(ep, current, current.state_write(Some(state), None));
    }

    /// Set the transmit transfer state, leaving every other field unchanged.
    pub fn set_tx_state(&self, ep: EndpointId, state: TransferState) {
        let current = self.endpoint_status(ep);
        self.write_epcs(ep, current, current.state_write(None, Some(state)));
    }

    /// Set both transfer states in a single write, so the hardware never sees one direction
    /// updated without the other.
    pub fn set_rx_tx_state(&self, ep: EndpointId, rx: TransferState, tx: TransferState) {
        let current = self.endpoint_status(ep);
        self.write_epcs(ep, current, current.state_write(Some(rx), Some(tx)));
    }

    pub fn toggle_rx_data_sequence(&self, ep: EndpointId) {
        let current = self.endpoint_status(ep);
        self.write_epcs(ep, current, current.toggle_write(epcs::RX_DTG.mask()));
    }

    pub fn toggle_tx_data_sequence(&self, ep: EndpointId) {
        let current = self.endpoint_status(ep);
        self.write_epcs(ep, current, current.toggle_write(epcs::TX_DTG.mask()));
    }

    /// Reset the receive data toggle to DATA0.
    pub fn clear_rx_data_sequence(&self, ep: EndpointId) {
        if self.endpoint_status(ep).rx_data_toggle() {
            self.toggle_rx_data_sequence(ep);
        }
    }

    /// Reset the transmit data toggle to DATA0.
    pub fn clear_tx_data_sequence(&self, ep: EndpointId) {
        if self.endpoint_status(ep).tx_data_toggle() {
            self.toggle_tx_data_sequence(ep);
        }
    }

    /// Flip the software buffer pointer of a double-buffered TX endpoint (stored in RX_DTG).
    pub fn toggle_tx_software_buffer(&self, ep: EndpointId) {
        self.toggle_rx_data_sequence(ep);
    }

    /// Flip the software buffer pointer of a double-buffered RX endpoint (stored in TX_DTG).
    pub fn toggle_rx_software_buffer(&self, ep: EndpointId) {
        self.toggle_tx_data_sequence(ep);
    }

    /// Clear RX_ST, leaving TX_ST as the hardware set it.
    pub fn clear_rx_completed(&self, ep: EndpointId) {
        let current = self.endpoint_status(ep);
        self.write_epcs(ep, current, current.clear_completed_write(epcs::RX_ST.mask()));
    }

    /// Clear TX_ST, leaving RX_ST as the hardware set it.
    pub fn clear_tx_completed(&self, ep: EndpointId) {
        let current = self.endpoint_status(ep);
        self.write_epcs(ep, current, current.clear_completed_write(epcs::TX_ST.mask()));
    }

    pub fn set_endpoint_kind(&self, ep: EndpointId) {
        let current = self.endpoint_status(ep);
        self.write_epcs(ep, current, current.kind_write(true));
    }

    pub fn clear_endpoint_kind(&self, ep: EndpointId) {
        let current = self.endpoint_status(ep);
        self.write_epcs(ep, current, current.kind_write(false));
    }

    /// Enable or disable STATUS_OUT on a control endpoint.
    ///
    /// While enabled, the endpoint answers any OUT data that is not zero-length with STALL.
    pub fn set_status_out(&self, ep: EndpointId, enabled: bool) {
        let current = self.endpoint_status(ep);
        assert!(
            current.endpoint_type() == EndpointType::Control,
            "STATUS_OUT only applies to control endpoints"
        );
        self.write_epcs(ep, current, current.kind_write(enabled));
    }

    /// Enable or disable double buffering on a bulk or isochronous endpoint.
    pub fn set_double_buffered(&self, ep: EndpointId, enabled: bool) {
        let current = self.endpoint_status(ep);
        assert!(
            current.endpoint_type().supports_double_buffering(),
            "double buffering only applies to bulk and isochronous endpoints"
        );
        self.write_epcs(ep, current, current.kind_write(enabled));
    }

    pub fn set_endpoint_type(&self, ep: EndpointId, ep_type: EndpointType) {
        let current = self.endpoint_status(ep);
        self.write_epcs(ep, current, current.type_write(ep_type));
    }

    /// Set the endpoint number (0-15) this EPxCS register answers to.
    pub fn set_endpoint_address(&self, ep: EndpointId, address: u8) {
        assert!(address < 0x10, "endpoint address out of range");
        let current = self.endpoint_status(ep);
        self.write_epcs(ep, current, current.address_write(address));
    }

    /// Set the endpoint type and number in one write.  Transfer states and data toggles are left
    /// as they are.
    pub fn configure_endpoint(&self, ep: EndpointId, ep_type: EndpointType, address: u8) {
        assert!(address < 0x10, "endpoint address out of range");
        let current = self.endpoint_status(ep);
        self.write_epcs(ep, current, current.configure_write(ep_type, address));
    }
}

/// Levels of the D+ and D- lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineState {
    pub dp: bool,
    pub dm: bool,
}
