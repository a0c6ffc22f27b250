use crate::regs::RegisterAccess;
use crate::usbd::Usbd;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

/// A [`Usbd`] handle that can be shared between thread mode and the USB interrupt handler.
///
/// The hardware may set completed flags at any time, but only software changes the other EPxCS
/// fields.  Two read-modify-write sequences on the same register from different contexts can
/// still interleave and lose one of the updates, so every access goes through `lock`.  With
/// `CriticalSectionRawMutex` the operation runs with interrupts disabled.
///
/// ```ignore
/// let usbd: SharedUsbd<CriticalSectionRawMutex, _> = SharedUsbd::new(unsafe { Usbd::steal() });
///
/// usbd.lock(|usbd| usbd.set_tx_state(EndpointId::EP1, TransferState::Valid));
/// ```
pub struct SharedUsbd<M: RawMutex, R: RegisterAccess> {
    usbd: Mutex<M, Usbd<R>>,
}

impl<M: RawMutex, R: RegisterAccess> SharedUsbd<M, R> {
    pub const fn new(usbd: Usbd<R>) -> Self {
        Self {
            usbd: Mutex::new(usbd),
        }
    }

    /// Run `f` with exclusive access to the peripheral.
    pub fn lock<U>(&self, f: impl FnOnce(&Usbd<R>) -> U) -> U {
        self.usbd.lock(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{EndpointId, TransferState};
    use crate::regs::Register;
    use crate::sim::SimulatedUsbd;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    #[test]
    fn operations_run_under_the_lock() {
        let sim = SimulatedUsbd::new();
        let shared = SharedUsbd::<CriticalSectionRawMutex, _>::new(Usbd::new(&sim));

        // Hardware flags a completed reception while the main flow changes the TX state.
        sim.hw_raise(Register::EpCs(EndpointId::EP1), 0x8000);
        shared.lock(|usbd| usbd.set_tx_state(EndpointId::EP1, TransferState::Valid));

        // Then the interrupt handler acknowledges it.
        let state = shared.lock(|usbd| {
            usbd.clear_rx_completed(EndpointId::EP1);
            usbd.get_tx_state(EndpointId::EP1)
        });
        assert_eq!(state, TransferState::Valid);
        assert_eq!(sim.peek(Register::EpCs(EndpointId::EP1)), 0x0030);
    }
}
