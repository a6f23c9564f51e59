use core::sync::atomic::{AtomicBool, Ordering};

use crate::access::RegisterAccess;
use crate::regs::{Block, CharPort, StatusRegister};

/// Outcome of one entry into an interrupt handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Status bits that were read and written back.
    Handled { acknowledged: u32 },
    /// The handler was already running; nothing was touched.
    Rejected,
}

/// Type-erased interrupt service routine.
pub trait Isr {
    fn service(&self, bus: &mut dyn RegisterAccess) -> Dispatch;
    fn is_running(&self) -> bool;
}

/// Acknowledges its source, then prints a fixed diagnostic line.
///
/// The handler only ever touches the status register of `block` and the
/// character port.
#[derive(Debug)]
pub struct InterruptHandler<M> {
    block: Block<M>,
    port: CharPort,
    message: &'static str,
    running: AtomicBool,
}

impl<M: StatusRegister> InterruptHandler<M> {
    pub const fn new(block: Block<M>, port: CharPort, message: &'static str) -> Self {
        Self {
            block,
            port,
            message,
            running: AtomicBool::new(false),
        }
    }

    pub fn handle<A: RegisterAccess + ?Sized>(&self, bus: &mut A) -> Dispatch {
        // Plain load/store: the target has no atomic read-modify-write and
        // the handler cannot be preempted by itself.
        if self.running.load(Ordering::Acquire) {
            return Dispatch::Rejected;
        }
        self.running.store(true, Ordering::Release);

        let pending = self.block.read(bus, M::STATUS);
        self.block.write(bus, M::STATUS, pending);

        for byte in self.message.bytes() {
            self.port.put(bus, byte);
        }

        self.running.store(false, Ordering::Release);
        Dispatch::Handled {
            acknowledged: pending,
        }
    }
}

impl<M: StatusRegister> Isr for InterruptHandler<M> {
    fn service(&self, bus: &mut dyn RegisterAccess) -> Dispatch {
        self.handle(bus)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
