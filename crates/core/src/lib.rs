pub mod bus;
pub mod metrics;
pub mod peripherals;
pub mod platform;
pub mod snapshot;

use bringup_config::StopReason;
use bringup_hal::isr::{Dispatch, Isr};
use bringup_hal::regs::IrqLines;
use bringup_hal::variants::{Flow, Program};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod tests;

pub use platform::build_machine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Width {
    Byte,
    Word,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("Unmapped access at {0:#x}")]
    Unmapped(u32),
    #[error("Unsupported {width:?} access at register offset {offset:#x}")]
    BadAccess { offset: u32, width: Width },
    #[error("Invalid platform: {0}")]
    InvalidPlatform(String),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait for observing simulation events in a modular way.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_simulation_start(&self) {}
    fn on_simulation_stop(&self) {}
    fn on_step_start(&self, _step: u64) {}
    fn on_step_end(&self, _step: u64, _accesses: u64) {}
    fn on_interrupt(&self, _dispatch: Dispatch) {}
}

/// A memory-mapped device in the simulated address space.
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&mut self, offset: u32, width: Width) -> SimResult<u32>;
    fn write(&mut self, offset: u32, width: Width, value: u32) -> SimResult<()>;
    /// Advance one cycle; returns whether the device's interrupt is asserted.
    fn tick(&mut self) -> bool {
        self.irq_level()
    }
    fn irq_level(&self) -> bool {
        false
    }
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continued { interrupted: bool },
    Exited(i32),
}

/// A bring-up program running against the simulated board.
///
/// Interrupts are taken between main-loop iterations: after each iteration
/// the devices are clocked for `cycles_per_step` cycles and, if an enabled
/// line is pending, the handler runs once to completion.
pub struct Machine {
    pub bus: bus::SystemBus,
    program: Box<dyn Program>,
    isr: Option<Box<dyn Isr>>,
    pub observers: Vec<Arc<dyn SimulationObserver>>,
    cycles_per_step: u32,
    booted: bool,
    steps: u64,
    interrupts: u64,
    rejected: u64,
    exit_code: Option<i32>,
}

impl Machine {
    pub fn new(
        bus: bus::SystemBus,
        program: Box<dyn Program>,
        isr: Option<Box<dyn Isr>>,
        cycles_per_step: u32,
    ) -> Self {
        Self {
            bus,
            program,
            isr,
            observers: Vec::new(),
            cycles_per_step,
            booted: false,
            steps: 0,
            interrupts: 0,
            rejected: 0,
            exit_code: None,
        }
    }

    pub fn program_name(&self) -> &'static str {
        self.program.name()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn interrupts(&self) -> u64 {
        self.interrupts
    }

    pub fn rejected_interrupts(&self) -> u64 {
        self.rejected
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Address and contents of the program's framebuffer `index`.
    pub fn frame(&self, index: usize) -> Option<(u32, &[u8])> {
        self.program.frame(index)
    }

    pub fn char_output(&self) -> String {
        self.bus
            .peripheral::<peripherals::char_port::CharPort>(bus::CHAR_PORT)
            .map(|p| p.output_lossy())
            .unwrap_or_default()
    }

    pub fn fpga(&self) -> Option<&peripherals::fpga::FpgaBlock> {
        self.bus.peripheral(bus::FPGA)
    }

    /// Runs the program's one-time setup.
    pub fn boot(&mut self) {
        if self.booted {
            return;
        }
        for observer in &self.observers {
            observer.on_simulation_start();
        }
        tracing::info!("Booting '{}'", self.program.name());
        self.bus.set_context(bus::Context::Main);
        self.program.setup(&mut self.bus);
        self.booted = true;
    }

    pub fn step(&mut self) -> StepOutcome {
        if !self.booted {
            self.boot();
        }
        if let Some(code) = self.exit_code {
            return StepOutcome::Exited(code);
        }

        for observer in &self.observers {
            observer.on_step_start(self.steps);
        }
        let before = self.bus.access_count();

        let flow = self.program.step(&mut self.bus);
        self.steps += 1;

        let interrupted = match flow {
            Flow::Continue => self.advance_time(),
            Flow::Exit(_) => false,
        };

        let accesses = self.bus.access_count() - before;
        for observer in &self.observers {
            observer.on_step_end(self.steps, accesses);
        }

        match flow {
            Flow::Continue => StepOutcome::Continued { interrupted },
            Flow::Exit(code) => {
                tracing::info!("Program exited with code {}", code);
                self.exit_code = Some(code);
                for observer in &self.observers {
                    observer.on_simulation_stop();
                }
                StepOutcome::Exited(code)
            }
        }
    }

    /// Steps until the program exits or a limit is hit.
    pub fn run(&mut self, max_steps: u64, wall_time: Option<Duration>) -> StopReason {
        let start = Instant::now();
        for _ in 0..max_steps {
            if let Some(limit) = wall_time {
                if start.elapsed() >= limit {
                    return StopReason::WallTime;
                }
            }
            if let StepOutcome::Exited(_) = self.step() {
                return StopReason::Exit;
            }
        }
        StopReason::MaxSteps
    }

    /// Latches the software line of the CPU interrupt controller and takes
    /// the interrupt if it is enabled. Returns whether the handler ran.
    pub fn raise_software_irq(&mut self) -> bool {
        let Some(state) = self.bus.irq_controller.clone() else {
            tracing::warn!("No interrupt controller to raise a software interrupt on");
            return false;
        };
        state.raise(IrqLines::SOFTWARE);
        let level = self.bus.irq_level();
        self.service_pending(level)
    }

    fn advance_time(&mut self) -> bool {
        let mut level = IrqLines::empty();
        for _ in 0..self.cycles_per_step {
            level = self.bus.tick_peripherals();
        }
        self.service_pending(level)
    }

    fn interrupt_requested(&self, level: IrqLines) -> bool {
        match &self.bus.irq_controller {
            Some(state) => {
                state.set_level(level);
                state.requested()
            }
            // Without a controller, device lines reach the CPU unmasked.
            None => !level.is_empty(),
        }
    }

    fn service_pending(&mut self, level: IrqLines) -> bool {
        if !self.interrupt_requested(level) {
            return false;
        }
        let Some(isr) = &self.isr else {
            tracing::debug!("Interrupt pending but no handler installed");
            return false;
        };

        self.bus.set_context(bus::Context::Interrupt);
        let dispatch = isr.service(&mut self.bus);
        self.bus.set_context(bus::Context::Main);

        match dispatch {
            Dispatch::Handled { acknowledged } => {
                self.interrupts += 1;
                tracing::debug!("Interrupt handled, acknowledged {:#x}", acknowledged);
            }
            Dispatch::Rejected => {
                self.rejected += 1;
                tracing::warn!("Interrupt handler re-entered");
            }
        }
        for observer in &self.observers {
            observer.on_interrupt(dispatch);
        }

        if let Some(state) = &self.bus.irq_controller {
            state.set_level(self.bus.irq_level());
        }
        true
    }

    pub fn snapshot(&self) -> snapshot::MachineSnapshot {
        snapshot::MachineSnapshot::capture(self)
    }
}
