pub mod char_port;
pub mod fpga;
pub mod irq_controller;
