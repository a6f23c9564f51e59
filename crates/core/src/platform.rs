//! Assembles a [`Machine`] from a platform descriptor.

use crate::bus::SystemBus;
use crate::{Machine, SimResult, SimulationError};
use bringup_config::{PlatformDescriptor, VariantKind};
use bringup_hal::framebuffer::{FrameBuffer, FRAME_BYTES};
use bringup_hal::isr::Isr;
use bringup_hal::regs::{CharPort, DualFrameBlock, IrqController, LcdBlock};
use bringup_hal::variants::{
    cpu_irq_handler, frame_tick_handler, timer_irq_handler, CpuIrq, DoubleBufferDemo, EchoInt,
    FillRectDemo, Hello, Program, TimerIrq,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn invalid(msg: impl Into<String>) -> SimulationError {
    SimulationError::InvalidPlatform(msg.into())
}

/// Framebuffer backed by host memory, published at `addr`.
fn host_frame(addr: u32) -> SimResult<FrameBuffer<Vec<u8>>> {
    FrameBuffer::new(addr, vec![0; FRAME_BYTES])
        .ok_or_else(|| invalid("framebuffer allocation has the wrong size"))
}

fn frame_addr(desc: &PlatformDescriptor, index: u32) -> SimResult<u32> {
    (FRAME_BYTES as u32)
        .checked_mul(index)
        .and_then(|off| desc.vram_base.checked_add(off))
        .ok_or_else(|| invalid(format!("vram_base {:#x} leaves no room for frame {}", desc.vram_base, index)))
}

pub fn build_machine(desc: &PlatformDescriptor, echo_stdout: bool) -> SimResult<Machine> {
    desc.validate().map_err(|e| invalid(e.to_string()))?;

    let bus = SystemBus::from_config(desc, echo_stdout)?;
    let port = CharPort::new(desc.char_port);
    let fpga_base = desc.fpga.as_ref().map(|f| f.base);
    let irq_base = desc.irq_controller;

    let program: Box<dyn Program>;
    let isr: Option<Box<dyn Isr>>;
    match desc.variant {
        VariantKind::Hello => {
            program = Box::new(Hello::new(port));
            isr = None;
        }
        VariantKind::EchoInt => {
            program = Box::new(EchoInt::new(port));
            isr = None;
        }
        VariantKind::CpuIrq => {
            let ctl = IrqController::new(irq_base.ok_or_else(|| invalid("missing irq_controller"))?);
            program = Box::new(CpuIrq::new(ctl));
            isr = Some(Box::new(cpu_irq_handler(ctl, port)));
        }
        VariantKind::TimerIrq => {
            let ctl = IrqController::new(irq_base.ok_or_else(|| invalid("missing irq_controller"))?);
            let fpga = DualFrameBlock::new(fpga_base.ok_or_else(|| invalid("missing fpga"))?);
            program = Box::new(TimerIrq::new(ctl, fpga, desc.timer_period));
            isr = Some(Box::new(timer_irq_handler(fpga, port)));
        }
        VariantKind::DoubleBuffer => {
            let fpga = LcdBlock::new(fpga_base.ok_or_else(|| invalid("missing fpga"))?);
            let first = host_frame(frame_addr(desc, 0)?)?;
            let second = host_frame(frame_addr(desc, 1)?)?;
            program = Box::new(DoubleBufferDemo::new(fpga, desc.timer_period, first, second));
            isr = Some(Box::new(frame_tick_handler(fpga, port)));
        }
        VariantKind::FillRect => {
            let fpga = LcdBlock::new(fpga_base.ok_or_else(|| invalid("missing fpga"))?);
            let frame = host_frame(frame_addr(desc, 0)?)?;
            let rng = SmallRng::seed_from_u64(desc.seed);
            program = Box::new(FillRectDemo::new(fpga, desc.timer_period, frame, rng));
            isr = Some(Box::new(frame_tick_handler(fpga, port)));
        }
    }

    tracing::info!("Platform '{}' runs '{}'", desc.name, program.name());
    Ok(Machine::new(bus, program, isr, desc.cycles_per_step))
}
