use crate::peripherals::char_port::CharPort;
use crate::peripherals::fpga::FpgaBlock;
use crate::peripherals::irq_controller::{IrqController, IrqControllerState};
use crate::{Peripheral, SimResult, SimulationError, Width};
use bringup_config::PlatformDescriptor;
use bringup_hal::regs::{IrqLines, Layout};
use bringup_hal::RegisterAccess;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

pub const CHAR_PORT: &str = "char_port";
pub const FPGA: &str = "fpga";
pub const IRQ_CONTROLLER: &str = "irq_controller";

/// Most recent accesses kept in the trace.
pub const TRACE_CAPACITY: usize = 65_536;
/// Faults kept for reporting; later ones are only counted.
pub const FAULT_CAPACITY: usize = 1_024;

/// Which thread of control issued an access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Context {
    Main,
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Access {
    pub context: Context,
    pub kind: AccessKind,
    pub width: Width,
    pub addr: u32,
    pub value: u32,
}

/// An access the bus could not deliver.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub addr: u32,
    pub context: Context,
    pub error: SimulationError,
}

#[derive(Debug)]
pub struct PeripheralEntry {
    pub name: String,
    pub base: u32,
    pub size: u32,
    /// Controller line this device drives, if any.
    pub irq: Option<IrqLines>,
    pub dev: Box<dyn Peripheral>,
}

impl PeripheralEntry {
    fn contains(&self, addr: u32) -> bool {
        let addr = addr as u64;
        let base = self.base as u64;
        addr >= base && addr < base + self.size as u64
    }

    fn overlaps(&self, base: u32, size: u32) -> bool {
        let (a0, a1) = (self.base as u64, self.base as u64 + self.size as u64);
        let (b0, b1) = (base as u64, base as u64 + size as u64);
        a0 < b1 && b0 < a1
    }
}

/// Simulated address space. Accesses are routed to peripherals by address
/// and recorded in order, tagged with the issuing context. Only the last
/// [`TRACE_CAPACITY`] accesses are retained.
///
/// Hardware access is infallible from the program's point of view: an
/// access that hits no device (or a device that rejects it) is logged as a
/// fault, writes are dropped and reads return zero.
#[derive(Debug, Default)]
pub struct SystemBus {
    pub peripherals: Vec<PeripheralEntry>,
    pub irq_controller: Option<Arc<IrqControllerState>>,
    context: Context,
    trace: VecDeque<Access>,
    accesses: u64,
    faults: Vec<Fault>,
    fault_count: u64,
}

impl Default for Context {
    fn default() -> Self {
        Context::Main
    }
}

impl SystemBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(desc: &PlatformDescriptor, echo_stdout: bool) -> SimResult<Self> {
        let mut bus = Self::new();

        let mut port = CharPort::new(echo_stdout);
        port.push_input(desc.input.as_bytes());
        bus.add_peripheral(CHAR_PORT, desc.char_port, 1, None, Box::new(port))?;

        if let Some(fpga) = &desc.fpga {
            let dev = FpgaBlock::new(Layout::from(fpga.layout));
            let size = dev.size();
            bus.add_peripheral(FPGA, fpga.base, size, Some(IrqLines::EXTERNAL), Box::new(dev))?;
        }

        if let Some(base) = desc.irq_controller {
            let state = Arc::new(IrqControllerState::default());
            let dev = IrqController::new(state.clone());
            let size = dev.size();
            bus.add_peripheral(IRQ_CONTROLLER, base, size, None, Box::new(dev))?;
            bus.irq_controller = Some(state);
        }

        tracing::info!(
            "Bus for '{}': {} peripherals",
            desc.name,
            bus.peripherals.len()
        );
        Ok(bus)
    }

    pub fn add_peripheral(
        &mut self,
        name: &str,
        base: u32,
        size: u32,
        irq: Option<IrqLines>,
        dev: Box<dyn Peripheral>,
    ) -> SimResult<()> {
        if base as u64 + size as u64 > 1u64 << 32 {
            return Err(SimulationError::InvalidPlatform(format!(
                "'{}' at {:#x} runs past the end of the address space",
                name, base
            )));
        }
        if let Some(other) = self.peripherals.iter().find(|p| p.overlaps(base, size)) {
            return Err(SimulationError::InvalidPlatform(format!(
                "'{}' at {:#x} overlaps '{}' at {:#x}",
                name, base, other.name, other.base
            )));
        }
        tracing::debug!("Mapped '{}' at {:#x} (+{:#x})", name, base, size);
        self.peripherals.push(PeripheralEntry {
            name: name.to_string(),
            base,
            size,
            irq,
            dev,
        });
        Ok(())
    }

    pub fn peripheral<T: 'static>(&self, name: &str) -> Option<&T> {
        self.peripherals
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any())
            .and_then(|a| a.downcast_ref::<T>())
    }

    pub fn set_context(&mut self, context: Context) {
        self.context = context;
    }

    /// The most recent accesses, oldest first.
    pub fn trace(&self) -> &VecDeque<Access> {
        &self.trace
    }

    /// Accesses since the bus was created, including ones dropped from the
    /// trace.
    pub fn access_count(&self) -> u64 {
        self.accesses
    }

    /// The first [`FAULT_CAPACITY`] faults.
    pub fn faults(&self) -> &[Fault] {
        &self.faults
    }

    pub fn fault_count(&self) -> u64 {
        self.fault_count
    }

    /// Values written to `addr`, in order.
    pub fn writes_to(&self, addr: u32) -> impl Iterator<Item = u32> + '_ {
        self.trace
            .iter()
            .filter(move |a| a.kind == AccessKind::Write && a.addr == addr)
            .map(|a| a.value)
    }

    /// Clocks every device once; returns the lines now asserted.
    pub fn tick_peripherals(&mut self) -> IrqLines {
        let mut lines = IrqLines::empty();
        for p in &mut self.peripherals {
            if p.dev.tick() {
                if let Some(irq) = p.irq {
                    lines |= irq;
                }
            }
        }
        lines
    }

    /// Lines currently asserted, without advancing time.
    pub fn irq_level(&self) -> IrqLines {
        self.peripherals
            .iter()
            .filter(|p| p.dev.irq_level())
            .filter_map(|p| p.irq)
            .fold(IrqLines::empty(), |acc, l| acc | l)
    }

    fn fault(&mut self, addr: u32, error: SimulationError) {
        tracing::warn!("Bus fault at {:#x}: {}", addr, error);
        self.fault_count += 1;
        if self.faults.len() < FAULT_CAPACITY {
            self.faults.push(Fault {
                addr,
                context: self.context,
                error,
            });
        }
    }

    fn record(&mut self, access: Access) {
        tracing::debug!(?access, "bus");
        if self.trace.len() == TRACE_CAPACITY {
            self.trace.pop_front();
        }
        self.trace.push_back(access);
        self.accesses += 1;
    }

    fn read(&mut self, addr: u32, width: Width) -> u32 {
        let result = match self.peripherals.iter_mut().find(|p| p.contains(addr)) {
            Some(p) => p.dev.read(addr - p.base, width),
            None => Err(SimulationError::Unmapped(addr)),
        };
        let value = result.unwrap_or_else(|e| {
            self.fault(addr, e);
            0
        });
        self.record(Access {
            context: self.context,
            kind: AccessKind::Read,
            width,
            addr,
            value,
        });
        value
    }

    fn write(&mut self, addr: u32, width: Width, value: u32) {
        let result = match self.peripherals.iter_mut().find(|p| p.contains(addr)) {
            Some(p) => p.dev.write(addr - p.base, width, value),
            None => Err(SimulationError::Unmapped(addr)),
        };
        if let Err(e) = result {
            self.fault(addr, e);
        }
        self.record(Access {
            context: self.context,
            kind: AccessKind::Write,
            width,
            addr,
            value,
        });
    }
}

impl RegisterAccess for SystemBus {
    fn read_u8(&mut self, addr: u32) -> u8 {
        self.read(addr, Width::Byte) as u8
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        self.write(addr, Width::Byte, value as u32)
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        self.read(addr, Width::Word)
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        self.write(addr, Width::Word, value)
    }
}
