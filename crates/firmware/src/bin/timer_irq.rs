#![no_std]
#![no_main]

use bringup_firmware::hal::isr::InterruptHandler;
use bringup_firmware::hal::regs::{
    CharPort, DualFrameBlock, DualFrameRegister, IrqController, CHAR_PORT_ADDR,
    FPGA_DUAL_FRAME_BASE, IRQ_CONTROLLER_BASE,
};
use bringup_firmware::hal::variants::{run, TimerIrq, DEFAULT_TIMER_PERIOD, TIMER_IRQ_MESSAGE};
use bringup_firmware::{board, export_interrupt_handler};

const FPGA: DualFrameBlock = DualFrameBlock::new(FPGA_DUAL_FRAME_BASE);

static HANDLER: InterruptHandler<DualFrameRegister> =
    InterruptHandler::new(FPGA, CharPort::new(CHAR_PORT_ADDR), TIMER_IRQ_MESSAGE);

export_interrupt_handler!(HANDLER);

#[no_mangle]
pub extern "C" fn main() -> i32 {
    let controller = IrqController::new(IRQ_CONTROLLER_BASE);
    run(
        &mut TimerIrq::new(controller, FPGA, DEFAULT_TIMER_PERIOD),
        &mut board(),
    )
}
