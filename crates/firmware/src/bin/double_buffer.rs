#![no_std]
#![no_main]

use core::ptr::addr_of_mut;

use bringup_firmware::hal::framebuffer::{FrameBuffer, FRAME_BYTES};
use bringup_firmware::hal::isr::InterruptHandler;
use bringup_firmware::hal::regs::{CharPort, LcdBlock, LcdRegister, CHAR_PORT_ADDR, FPGA_LCD_BASE};
use bringup_firmware::hal::variants::{
    run, DoubleBufferDemo, DEFAULT_TIMER_PERIOD, FRAME_TICK_MESSAGE,
};
use bringup_firmware::{board, export_interrupt_handler};

const FPGA: LcdBlock = LcdBlock::new(FPGA_LCD_BASE);

static HANDLER: InterruptHandler<LcdRegister> =
    InterruptHandler::new(FPGA, CharPort::new(CHAR_PORT_ADDR), FRAME_TICK_MESSAGE);

export_interrupt_handler!(HANDLER);

static mut FRAME0: [u8; FRAME_BYTES] = [0; FRAME_BYTES];
static mut FRAME1: [u8; FRAME_BYTES] = [0; FRAME_BYTES];

#[no_mangle]
pub extern "C" fn main() -> i32 {
    // SAFETY: `main` runs once and is the only user of the frames.
    let (first, second) = unsafe { (&mut *addr_of_mut!(FRAME0), &mut *addr_of_mut!(FRAME1)) };
    let mut demo = DoubleBufferDemo::new(
        FPGA,
        DEFAULT_TIMER_PERIOD,
        FrameBuffer::from_static(first),
        FrameBuffer::from_static(second),
    );
    run(&mut demo, &mut board())
}
