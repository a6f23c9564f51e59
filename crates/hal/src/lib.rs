//! Register maps, interrupt handler and main-loop programs for the FPGA
//! bring-up platform.
//!
//! Every program here talks to hardware only through a [`RegisterAccess`]
//! capability, so the same code runs on the target (through [`Mmio`]) and
//! inside the host simulator.

#![cfg_attr(not(test), no_std)]

pub mod access;
pub mod console;
pub mod framebuffer;
pub mod isr;
pub mod present;
pub mod regs;
pub mod variants;

#[cfg(test)]
pub(crate) mod testing;

pub use access::{Mmio, RegisterAccess};
pub use framebuffer::{FrameBuffer, Rect, FRAME_BYTES, FRAME_HEIGHT, FRAME_WIDTH};
pub use isr::{Dispatch, InterruptHandler};
pub use variants::{Flow, Program};
