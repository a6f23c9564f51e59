#![no_std]
#![no_main]

use bringup_firmware::hal::isr::InterruptHandler;
use bringup_firmware::hal::regs::{
    CharPort, IrqController, IrqControllerRegister, CHAR_PORT_ADDR, IRQ_CONTROLLER_BASE,
};
use bringup_firmware::hal::variants::{run, CpuIrq, CPU_IRQ_MESSAGE};
use bringup_firmware::{board, export_interrupt_handler};

static HANDLER: InterruptHandler<IrqControllerRegister> = InterruptHandler::new(
    IrqController::new(IRQ_CONTROLLER_BASE),
    CharPort::new(CHAR_PORT_ADDR),
    CPU_IRQ_MESSAGE,
);

export_interrupt_handler!(HANDLER);

#[no_mangle]
pub extern "C" fn main() -> i32 {
    let controller = IrqController::new(IRQ_CONTROLLER_BASE);
    run(&mut CpuIrq::new(controller), &mut board())
}
