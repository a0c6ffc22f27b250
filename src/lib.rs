//! Register access for the GD32F1x0 USB full-speed device controller (USBD).
//!
//! [`regs`] and [`fields`] describe where each register lives and how its bits are laid out.
//! [`Usbd`] is the handle firmware uses to change peripheral state.  Most of it is plain
//! read-modify-write, but the endpoint control/status registers (EPxCS) contain toggle-on-write
//! fields and write-0-to-clear flags, and [`Usbd`] is the only place that knows how to write them.
#![cfg_attr(not(test), no_std)]

pub mod btable;
mod endpoint;
mod epcs;
pub mod fields;
mod fmt;
mod interrupt;
mod lpm;
pub mod regs;
mod shared;
#[cfg(test)]
mod sim;
mod usbd;

pub use crate::endpoint::{EndpointId, EndpointType, TransferState, ENDPOINT_COUNT};
pub use crate::epcs::Epcs;
pub use crate::interrupt::{Interrupt, InterruptSet, InterruptStatus};
pub use crate::lpm::{LpmHandshake, LpmRequest};
pub use crate::shared::SharedUsbd;
pub use crate::usbd::{LineState, Usbd};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Endpoint id outside 0-7
    InvalidEndpoint(u8),
    /// Transfer state value outside 0-3
    InvalidTransferState(u8),
    /// Endpoint type value outside 0-3
    InvalidEndpointType(u8),
    /// Buffer length the descriptor table can't describe
    BufferTooLarge(usize),
}

/// Settings applied by [`Usbd::init`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Config {
    pub interrupts: InterruptSet,
    /// Packet memory offset of the buffer descriptor table
    pub buffer_table: u16,
    pub lpm_interrupt: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interrupts: InterruptSet::TRANSFER
                | InterruptSet::RESET
                | InterruptSet::SUSPEND
                | InterruptSet::WAKEUP
                | InterruptSet::ERROR,
            buffer_table: 0,
            lpm_interrupt: false,
        }
    }
}
