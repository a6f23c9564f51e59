#![no_std]

use panic_halt as _;

use bringup_hal::console;
use bringup_hal::regs::CharPort;
use bringup_hal::Mmio;

pub use bringup_hal as hal;

/// Register access for code running on the board.
#[inline(always)]
pub fn board() -> Mmio {
    // SAFETY: every address the hal emits is a register of this platform
    // or a frame the program owns.
    unsafe { Mmio::new() }
}

/// BSP console hook used by the C library's stdio.
#[no_mangle]
pub extern "C" fn outbyte(c: u8) {
    console::outbyte(&mut board(), CharPort::default(), c)
}

#[no_mangle]
pub extern "C" fn inbyte() -> u8 {
    console::inbyte(&mut board(), CharPort::default())
}

/// Exports `$handler` (a `static` [`hal::InterruptHandler`]) as the BSP's
/// `interrupt_handler` entry.
#[macro_export]
macro_rules! export_interrupt_handler {
    ($handler:path) => {
        #[no_mangle]
        pub extern "C" fn interrupt_handler() {
            $handler.handle(&mut $crate::board());
        }
    };
}
