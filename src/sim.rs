//! A register file that behaves like the USBD peripheral, for host-side tests.

use crate::fields::Access;
use crate::regs::{Register, RegisterAccess};
use core::cell::Cell;

const SLOTS: usize = 0x148 / 4;

pub(crate) struct SimulatedUsbd {
    values: [Cell<u16>; SLOTS],
    writes: [Cell<u32>; SLOTS],
    // Bits the "hardware" sets in a register right after the next time software reads it.
    raise_after_read: Cell<Option<(Register, u16)>>,
}

impl SimulatedUsbd {
    pub fn new() -> Self {
        Self {
            values: core::array::from_fn(|_| Cell::new(0)),
            writes: core::array::from_fn(|_| Cell::new(0)),
            raise_after_read: Cell::new(None),
        }
    }

    fn slot(reg: Register) -> usize {
        reg.offset() / 4
    }

    /// Current register contents, without counting as a software read.
    pub fn peek(&self, reg: Register) -> u16 {
        self.values[Self::slot(reg)].get()
    }

    /// Overwrite a register the way the hardware would, bypassing write semantics.
    pub fn hw_set(&self, reg: Register, value: u16) {
        self.values[Self::slot(reg)].set(value);
    }

    /// Set bits in a register from the hardware side.
    pub fn hw_raise(&self, reg: Register, bits: u16) {
        self.hw_set(reg, self.peek(reg) | bits);
    }

    /// Make the hardware set `bits` in `reg` between the next software read and the write that
    /// follows it.
    pub fn raise_after_next_read(&self, reg: Register, bits: u16) {
        self.raise_after_read.set(Some((reg, bits)));
    }

    /// Number of software writes to `reg` so far.
    pub fn write_count(&self, reg: Register) -> u32 {
        self.writes[Self::slot(reg)].get()
    }
}

impl RegisterAccess for SimulatedUsbd {
    fn read(&self, reg: Register) -> u16 {
        let value = self.peek(reg);
        if let Some((pending_reg, bits)) = self.raise_after_read.get() {
            if pending_reg == reg {
                self.raise_after_read.set(None);
                self.hw_raise(reg, bits);
            }
        }
        value
    }

    fn write(&self, reg: Register, value: u16) {
        let current = self.peek(reg);
        // Bits outside every field are reserved and keep their value.
        let mut next = current;
        for field in reg.layout() {
            let mask = field.mask();
            let bits = match field.access {
                Access::ReadWrite => value,
                Access::ReadOnly => current,
                Access::Toggle => current ^ value,
                Access::ClearOnWriteZero => current & value,
            };
            next = (next & !mask) | (bits & mask);
        }
        self.hw_set(reg, next);
        let count = &self.writes[Self::slot(reg)];
        count.set(count.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointId;

    #[test]
    fn applies_field_access_classes() {
        let sim = SimulatedUsbd::new();
        let ep = Register::EpCs(EndpointId::EP2);

        // RX_ST, SETUP, TX_ST set by hardware; RX_DTG set
        sim.hw_set(ep, 0x8000 | 0x4000 | 0x0800 | 0x0080);
        // Write 0 everywhere except a 1 in RX_DTG and the address field.
        sim.write(ep, 0x4000 | 0x0003);
        // Completed flags cleared, RX_DTG toggled off, SETUP kept, address stored.
        assert_eq!(sim.peek(ep), 0x0800 | 0x0003);
        assert_eq!(sim.write_count(ep), 1);

        sim.write(Register::Stat, 0xffff);
        assert_eq!(sim.peek(Register::Stat), 0);
    }

    #[test]
    fn raises_bits_after_read() {
        let sim = SimulatedUsbd::new();
        let ep = Register::EpCs(EndpointId::EP0);
        sim.raise_after_next_read(ep, 0x8000);
        assert_eq!(sim.read(ep), 0);
        assert_eq!(sim.peek(ep), 0x8000);
        // Only once
        sim.hw_set(ep, 0);
        sim.read(ep);
        assert_eq!(sim.peek(ep), 0);
    }
}
