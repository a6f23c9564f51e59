#![no_std]
#![no_main]

use core::ptr::addr_of_mut;

use bringup_firmware::hal::framebuffer::{FrameBuffer, FRAME_BYTES};
use bringup_firmware::hal::isr::InterruptHandler;
use bringup_firmware::hal::regs::{CharPort, LcdBlock, LcdRegister, CHAR_PORT_ADDR, FPGA_LCD_BASE};
use bringup_firmware::hal::variants::{run, FillRectDemo, DEFAULT_TIMER_PERIOD, FRAME_TICK_MESSAGE};
use bringup_firmware::{board, export_interrupt_handler};
use rand::rngs::SmallRng;
use rand::SeedableRng;

const FPGA: LcdBlock = LcdBlock::new(FPGA_LCD_BASE);
const SEED: u64 = 0x5eed;

static HANDLER: InterruptHandler<LcdRegister> =
    InterruptHandler::new(FPGA, CharPort::new(CHAR_PORT_ADDR), FRAME_TICK_MESSAGE);

export_interrupt_handler!(HANDLER);

static mut FRAME: [u8; FRAME_BYTES] = [0; FRAME_BYTES];

#[no_mangle]
pub extern "C" fn main() -> i32 {
    // SAFETY: `main` runs once and is the only user of the frame.
    let frame = FrameBuffer::from_static(unsafe { &mut *addr_of_mut!(FRAME) });
    let mut demo = FillRectDemo::new(
        FPGA,
        DEFAULT_TIMER_PERIOD,
        frame,
        SmallRng::seed_from_u64(SEED),
    );
    run(&mut demo, &mut board())
}
