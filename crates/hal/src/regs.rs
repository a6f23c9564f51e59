//! Symbolic register maps.
//!
//! Each register block is described by a tagged enumeration that maps a
//! register name to its word offset. Addresses are always derived as
//! `base + offset * WORD_SIZE`; no caller does the arithmetic by hand.

use core::fmt;
use core::marker::PhantomData;

use bitflags::bitflags;

use crate::access::RegisterAccess;

pub const WORD_SIZE: u32 = 4;

/// UART-like character port, one byte wide.
pub const CHAR_PORT_ADDR: u32 = 0xffff_fffc;
/// Standalone CPU interrupt controller.
pub const IRQ_CONTROLLER_BASE: u32 = 0xffff_fff0;
/// FPGA block carrying the LCD (enable, LUT, frame pointer).
pub const FPGA_LCD_BASE: u32 = 0xffff_0000;
/// FPGA block carrying two frame buffer pointers.
pub const FPGA_DUAL_FRAME_BASE: u32 = 0xffff_ff00;

pub const LUT_ENTRIES: usize = 256;
const LUT_OFFSET: u32 = 5;

bitflags! {
    /// Bits of `InterruptControl` / `InterruptStatus` in the FPGA block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InterruptBits: u32 {
        const TIMER = 1 << 0;
    }
}

bitflags! {
    /// Lines of the CPU interrupt controller (`Enable` / `Pending`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqLines: u32 {
        /// Level line driven by the FPGA block.
        const EXTERNAL = 1 << 0;
        /// Edge-latched line raised by a debugger or test harness.
        const SOFTWARE = 1 << 1;
    }
}

/// A register enumeration with a fixed word offset per variant.
pub trait RegisterMap: Copy + fmt::Debug {
    fn offset(self) -> u32;
    fn from_offset(offset: u32) -> Option<Self>;
}

/// Maps that carry a write-1-to-clear status register.
pub trait StatusRegister: RegisterMap {
    const STATUS: Self;
}

/// Maps that carry the FPGA timer and interrupt enable.
pub trait TimerRegisters: StatusRegister {
    const CONTROL: Self;
    const COUNTER: Self;
    const PERIOD: Self;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Lcd,
    DualFrame,
}

impl Layout {
    /// Size of the register window in bytes, up to and including the last
    /// frame pointer.
    pub fn window_size(self) -> u32 {
        let words = match self {
            Layout::Lcd => LcdRegister::LcdFrameBuffer.offset() + 1,
            Layout::DualFrame => DualFrameRegister::FrameBuffer1.offset() + 1,
        };
        words * WORD_SIZE
    }
}

/// FPGA block with LCD enable, lookup table and a single frame pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcdRegister {
    InterruptControl,
    InterruptStatus,
    TimerCounter,
    TimerSet,
    LcdEnable,
    LcdLookupTable(u8),
    LcdFrameBuffer,
}

impl LcdRegister {
    /// Bounds-checked LUT slot; `None` past the last entry.
    pub fn lookup_table(index: usize) -> Option<Self> {
        u8::try_from(index).ok().map(Self::LcdLookupTable)
    }
}

impl RegisterMap for LcdRegister {
    fn offset(self) -> u32 {
        match self {
            Self::InterruptControl => 0,
            Self::InterruptStatus => 1,
            Self::TimerCounter => 2,
            Self::TimerSet => 3,
            Self::LcdEnable => 4,
            Self::LcdLookupTable(index) => LUT_OFFSET + index as u32,
            Self::LcdFrameBuffer => LUT_OFFSET + LUT_ENTRIES as u32,
        }
    }

    fn from_offset(offset: u32) -> Option<Self> {
        let reg = match offset {
            0 => Self::InterruptControl,
            1 => Self::InterruptStatus,
            2 => Self::TimerCounter,
            3 => Self::TimerSet,
            4 => Self::LcdEnable,
            o if o >= LUT_OFFSET && o < LUT_OFFSET + LUT_ENTRIES as u32 => {
                Self::LcdLookupTable((o - LUT_OFFSET) as u8)
            }
            o if o == LUT_OFFSET + LUT_ENTRIES as u32 => Self::LcdFrameBuffer,
            _ => return None,
        };
        Some(reg)
    }
}

impl StatusRegister for LcdRegister {
    const STATUS: Self = Self::InterruptStatus;
}

impl TimerRegisters for LcdRegister {
    const CONTROL: Self = Self::InterruptControl;
    const COUNTER: Self = Self::TimerCounter;
    const PERIOD: Self = Self::TimerSet;
}

/// FPGA block with two frame buffer pointers and no LCD controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualFrameRegister {
    InterruptControl,
    InterruptStatus,
    TimerCounter,
    TimerSet,
    FrameBuffer0,
    FrameBuffer1,
}

impl RegisterMap for DualFrameRegister {
    fn offset(self) -> u32 {
        match self {
            Self::InterruptControl => 0,
            Self::InterruptStatus => 1,
            Self::TimerCounter => 2,
            Self::TimerSet => 3,
            Self::FrameBuffer0 => 4,
            Self::FrameBuffer1 => 5,
        }
    }

    fn from_offset(offset: u32) -> Option<Self> {
        let reg = match offset {
            0 => Self::InterruptControl,
            1 => Self::InterruptStatus,
            2 => Self::TimerCounter,
            3 => Self::TimerSet,
            4 => Self::FrameBuffer0,
            5 => Self::FrameBuffer1,
            _ => return None,
        };
        Some(reg)
    }
}

impl StatusRegister for DualFrameRegister {
    const STATUS: Self = Self::InterruptStatus;
}

impl TimerRegisters for DualFrameRegister {
    const CONTROL: Self = Self::InterruptControl;
    const COUNTER: Self = Self::TimerCounter;
    const PERIOD: Self = Self::TimerSet;
}

/// Standalone CPU interrupt controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqControllerRegister {
    Enable,
    Pending,
}

impl RegisterMap for IrqControllerRegister {
    fn offset(self) -> u32 {
        match self {
            Self::Enable => 0,
            Self::Pending => 1,
        }
    }

    fn from_offset(offset: u32) -> Option<Self> {
        match offset {
            0 => Some(Self::Enable),
            1 => Some(Self::Pending),
            _ => None,
        }
    }
}

impl StatusRegister for IrqControllerRegister {
    const STATUS: Self = Self::Pending;
}

/// A register block of map `M` placed at `base`.
pub struct Block<M> {
    base: u32,
    _map: PhantomData<M>,
}

pub type LcdBlock = Block<LcdRegister>;
pub type DualFrameBlock = Block<DualFrameRegister>;
pub type IrqController = Block<IrqControllerRegister>;

impl<M> Clone for Block<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Block<M> {}

impl<M> fmt::Debug for Block<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({:#010x})", self.base)
    }
}

impl<M: RegisterMap> Block<M> {
    pub const fn new(base: u32) -> Self {
        Self {
            base,
            _map: PhantomData,
        }
    }

    pub fn address(&self, reg: M) -> u32 {
        self.base.wrapping_add(reg.offset() * WORD_SIZE)
    }

    pub fn read<A: RegisterAccess + ?Sized>(&self, bus: &mut A, reg: M) -> u32 {
        bus.read_u32(self.address(reg))
    }

    pub fn write<A: RegisterAccess + ?Sized>(&self, bus: &mut A, reg: M, value: u32) {
        bus.write_u32(self.address(reg), value)
    }
}

impl<M: TimerRegisters> Block<M> {
    /// Enable the given interrupt sources and program the timer period.
    pub fn configure_timer<A: RegisterAccess + ?Sized>(
        &self,
        bus: &mut A,
        sources: InterruptBits,
        period: u32,
    ) {
        self.write(bus, M::CONTROL, sources.bits());
        self.write(bus, M::PERIOD, period);
    }
}

/// Byte-wide character port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharPort {
    addr: u32,
}

impl CharPort {
    pub const fn new(addr: u32) -> Self {
        Self { addr }
    }

    pub fn put<A: RegisterAccess + ?Sized>(&self, bus: &mut A, byte: u8) {
        bus.write_u8(self.addr, byte)
    }

    pub fn get<A: RegisterAccess + ?Sized>(&self, bus: &mut A) -> u8 {
        bus.read_u8(self.addr)
    }
}

impl Default for CharPort {
    fn default() -> Self {
        Self::new(CHAR_PORT_ADDR)
    }
}
