//! Buffer descriptor table entries.
//!
//! BADDR points at a table in packet memory with one 8-byte entry per endpoint, giving the
//! location and size of the endpoint's TX and RX buffers.

use crate::fields::{rxcnt, txcnt};
use crate::regs::USBD_RAM_BASE;
use crate::Error;
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

/// Largest RX buffer the count encoding can describe: 32 blocks of 32 bytes.
pub const MAX_RX_BUFFER: usize = 1024;
/// Largest TX length that fits in the count field.
pub const MAX_TX_LEN: usize = 1023;

/// One entry of the buffer descriptor table, as laid out in packet memory.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Pod, Zeroable)]
pub struct BufferDescriptor {
    /// Offset of the TX buffer in packet memory
    pub tx_addr: u16,
    pub tx_count: u16,
    /// Offset of the RX buffer in packet memory
    pub rx_addr: u16,
    pub rx_count: u16,
}

const_assert_eq!(core::mem::size_of::<BufferDescriptor>(), 8);

impl BufferDescriptor {
    pub fn new(tx_addr: u16, rx_addr: u16, rx_capacity: RxCount) -> Self {
        Self {
            tx_addr,
            tx_count: 0,
            rx_addr,
            rx_count: rx_capacity.bits(),
        }
    }

    /// The entry as the four 16-bit words the hardware reads.
    pub fn words(&self) -> &[u16; 4] {
        bytemuck::cast_ref(self)
    }

    pub fn from_words(words: [u16; 4]) -> Self {
        bytemuck::cast(words)
    }

    /// Set the number of bytes to send from the TX buffer.
    pub fn set_tx_len(&mut self, len: usize) -> Result<(), Error> {
        if len > MAX_TX_LEN {
            return Err(Error::BufferTooLarge(len));
        }
        self.tx_count = txcnt::CNT.encode(len as u16);
        Ok(())
    }

    pub fn tx_len(&self) -> usize {
        txcnt::CNT.read(self.tx_count) as usize
    }

    pub fn rx(&self) -> RxCount {
        RxCount(self.rx_count)
    }
}

/// The RX count word: the buffer capacity (in 2- or 32-byte blocks) and the number of bytes the
/// hardware received.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxCount(u16);

impl RxCount {
    /// Encode an RX buffer capacity, rounding up to the block size.
    ///
    /// Up to 62 bytes are described in 2-byte blocks, anything larger in 32-byte blocks.
    pub fn for_capacity(bytes: usize) -> Result<Self, Error> {
        if bytes > MAX_RX_BUFFER {
            return Err(Error::BufferTooLarge(bytes));
        }
        let bits = if bytes > 62 {
            // BLKNUM counts 32-byte blocks beyond the first
            let blocks = (bytes + 31) / 32;
            rxcnt::BLKSIZ.mask() | rxcnt::BLKNUM.encode((blocks - 1) as u16)
        } else {
            rxcnt::BLKNUM.encode(((bytes + 1) / 2) as u16)
        };
        Ok(Self(bits))
    }

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Capacity of the buffer in bytes.
    pub const fn capacity(self) -> usize {
        let blocks = rxcnt::BLKNUM.read(self.0) as usize;
        if rxcnt::BLKSIZ.is_set(self.0) {
            (blocks + 1) * 32
        } else {
            blocks * 2
        }
    }

    /// Bytes received in the last transaction.
    pub const fn received(self) -> usize {
        rxcnt::CNT.read(self.0) as usize
    }
}

/// Bus address of a packet memory offset.
///
/// Packet memory is 16 bits wide but every half-word sits on a 32-bit stride from the CPU's
/// point of view.
pub const fn packet_memory_address(offset: u16) -> usize {
    USBD_RAM_BASE + 2 * offset as usize
}
