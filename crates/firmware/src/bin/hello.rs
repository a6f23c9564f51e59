#![no_std]
#![no_main]

use bringup_firmware::board;
use bringup_firmware::hal::regs::CharPort;
use bringup_firmware::hal::variants::{run, Hello};

#[no_mangle]
pub extern "C" fn main() -> i32 {
    run(&mut Hello::new(CharPort::default()), &mut board())
}
