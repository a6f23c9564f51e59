//! The six bring-up programs. Each exercises one facility of the platform.

use core::fmt::Write;

use rand::Rng;

use crate::access::RegisterAccess;
use crate::console::Console;
use crate::framebuffer::FrameBuffer;
use crate::isr::InterruptHandler;
use crate::present::{bring_up_display, DisplayConfig, DoubleBuffer, Palette, SingleBuffer};
use crate::regs::{
    CharPort, DualFrameBlock, DualFrameRegister, InterruptBits, IrqController,
    IrqControllerRegister, IrqLines, LcdBlock, LcdRegister,
};

pub const CPU_IRQ_MESSAGE: &str = "CPU interrupt\n";
pub const TIMER_IRQ_MESSAGE: &str = "Timer interrupt\n";
pub const FRAME_TICK_MESSAGE: &str = "Frame tick\n";

pub const DEFAULT_TIMER_PERIOD: u32 = 50_000;

/// What the main loop does after an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit(i32),
}

/// A bare-metal main loop: `setup` once, then `step` until it exits.
pub trait Program {
    fn name(&self) -> &'static str;
    fn setup(&mut self, bus: &mut dyn RegisterAccess);
    fn step(&mut self, bus: &mut dyn RegisterAccess) -> Flow;

    /// Address and contents of framebuffer `index`, if the program owns one.
    fn frame(&self, _index: usize) -> Option<(u32, &[u8])> {
        None
    }
}

/// Runs `program` forever, or until it exits.
pub fn run<P: Program + ?Sized>(program: &mut P, bus: &mut dyn RegisterAccess) -> i32 {
    program.setup(bus);
    loop {
        if let Flow::Exit(code) = program.step(bus) {
            return code;
        }
    }
}

pub fn cpu_irq_handler(
    controller: IrqController,
    port: CharPort,
) -> InterruptHandler<IrqControllerRegister> {
    InterruptHandler::new(controller, port, CPU_IRQ_MESSAGE)
}

pub fn timer_irq_handler(
    fpga: DualFrameBlock,
    port: CharPort,
) -> InterruptHandler<DualFrameRegister> {
    InterruptHandler::new(fpga, port, TIMER_IRQ_MESSAGE)
}

pub fn frame_tick_handler(fpga: LcdBlock, port: CharPort) -> InterruptHandler<LcdRegister> {
    InterruptHandler::new(fpga, port, FRAME_TICK_MESSAGE)
}

/// Prompts for a name and greets it.
#[derive(Debug)]
pub struct Hello {
    port: CharPort,
}

impl Hello {
    pub fn new(port: CharPort) -> Self {
        Self { port }
    }
}

impl Program for Hello {
    fn name(&self) -> &'static str {
        "hello"
    }

    fn setup(&mut self, _bus: &mut dyn RegisterAccess) {}

    fn step(&mut self, bus: &mut dyn RegisterAccess) -> Flow {
        let mut con = Console::new(bus, self.port);
        con.put_str("You name: ");
        let name = con.scan_word();
        con.put_str("Hello ");
        con.put_bytes(name.as_bytes());
        con.put_str("!\n");
        Flow::Exit(0)
    }
}

/// Reads one integer and prints it back.
#[derive(Debug)]
pub struct EchoInt {
    port: CharPort,
}

impl EchoInt {
    pub fn new(port: CharPort) -> Self {
        Self { port }
    }
}

impl Program for EchoInt {
    fn name(&self) -> &'static str {
        "echo-int"
    }

    fn setup(&mut self, _bus: &mut dyn RegisterAccess) {}

    fn step(&mut self, bus: &mut dyn RegisterAccess) -> Flow {
        let mut con = Console::new(bus, self.port);
        con.put_str("Number: ");
        let n = con.scan_int();
        let _ = write!(con, "You entered {}\n", n);
        Flow::Exit(0)
    }
}

/// Unmasks the CPU interrupt lines and idles.
#[derive(Debug)]
pub struct CpuIrq {
    controller: IrqController,
}

impl CpuIrq {
    pub fn new(controller: IrqController) -> Self {
        Self { controller }
    }
}

impl Program for CpuIrq {
    fn name(&self) -> &'static str {
        "cpu-irq"
    }

    fn setup(&mut self, bus: &mut dyn RegisterAccess) {
        let lines = IrqLines::SOFTWARE | IrqLines::EXTERNAL;
        self.controller
            .write(bus, IrqControllerRegister::Enable, lines.bits());
    }

    fn step(&mut self, _bus: &mut dyn RegisterAccess) -> Flow {
        Flow::Continue
    }
}

/// Starts the FPGA timer with its interrupt routed to the CPU, then idles.
#[derive(Debug)]
pub struct TimerIrq {
    controller: IrqController,
    fpga: DualFrameBlock,
    period: u32,
}

impl TimerIrq {
    pub fn new(controller: IrqController, fpga: DualFrameBlock, period: u32) -> Self {
        Self {
            controller,
            fpga,
            period,
        }
    }
}

impl Program for TimerIrq {
    fn name(&self) -> &'static str {
        "timer-irq"
    }

    fn setup(&mut self, bus: &mut dyn RegisterAccess) {
        self.controller
            .write(bus, IrqControllerRegister::Enable, IrqLines::EXTERNAL.bits());
        self.fpga
            .configure_timer(bus, InterruptBits::TIMER, self.period);
    }

    fn step(&mut self, _bus: &mut dyn RegisterAccess) -> Flow {
        Flow::Continue
    }
}

/// Alternates between two frames, publishing the freshly drawn one.
#[derive(Debug)]
pub struct DoubleBufferDemo<S> {
    fpga: LcdBlock,
    display: DisplayConfig,
    frames: DoubleBuffer<S>,
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> DoubleBufferDemo<S> {
    pub fn new(fpga: LcdBlock, period: u32, first: FrameBuffer<S>, second: FrameBuffer<S>) -> Self {
        Self {
            fpga,
            display: DisplayConfig {
                sources: InterruptBits::TIMER,
                timer_period: period,
                palette: Palette::MONO,
            },
            frames: DoubleBuffer::new(first, second),
        }
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> Program for DoubleBufferDemo<S> {
    fn name(&self) -> &'static str {
        "double-buffer"
    }

    fn setup(&mut self, bus: &mut dyn RegisterAccess) {
        bring_up_display(&self.fpga, bus, &self.display);
    }

    fn step(&mut self, bus: &mut dyn RegisterAccess) -> Flow {
        self.frames.present(&self.fpga, bus);
        Flow::Continue
    }

    fn frame(&self, index: usize) -> Option<(u32, &[u8])> {
        self.frames.frame(index).map(|f| (f.addr(), f.pixels()))
    }
}

/// Fills random rectangles into the frame that is on screen.
#[derive(Debug)]
pub struct FillRectDemo<S, R> {
    fpga: LcdBlock,
    display: DisplayConfig,
    frame: SingleBuffer<S, R>,
}

impl<S: AsRef<[u8]> + AsMut<[u8]>, R: Rng> FillRectDemo<S, R> {
    pub fn new(fpga: LcdBlock, period: u32, frame: FrameBuffer<S>, rng: R) -> Self {
        Self {
            fpga,
            display: DisplayConfig {
                sources: InterruptBits::TIMER,
                timer_period: period,
                palette: Palette::SPECTRUM,
            },
            frame: SingleBuffer::new(frame, rng),
        }
    }
}

impl<S: AsRef<[u8]> + AsMut<[u8]>, R: Rng> Program for FillRectDemo<S, R> {
    fn name(&self) -> &'static str {
        "fill-rect"
    }

    fn setup(&mut self, bus: &mut dyn RegisterAccess) {
        bring_up_display(&self.fpga, bus, &self.display);
    }

    fn step(&mut self, bus: &mut dyn RegisterAccess) -> Flow {
        self.frame.present(&self.fpga, bus);
        Flow::Continue
    }

    fn frame(&self, index: usize) -> Option<(u32, &[u8])> {
        let f = self.frame.frame();
        (index == 0).then(|| (f.addr(), f.pixels()))
    }
}
