use crate::{SimResult, SimulationError, Width};
use bringup_hal::regs::{
    DualFrameRegister, InterruptBits, LcdRegister, Layout, RegisterMap, LUT_ENTRIES, WORD_SIZE,
};
use std::any::Any;

/// Layout-independent view of one FPGA register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    InterruptControl,
    InterruptStatus,
    TimerCounter,
    TimerSet,
    LcdEnable,
    Lut(u8),
    FramePointer(usize),
}

impl From<LcdRegister> for Slot {
    fn from(reg: LcdRegister) -> Self {
        match reg {
            LcdRegister::InterruptControl => Slot::InterruptControl,
            LcdRegister::InterruptStatus => Slot::InterruptStatus,
            LcdRegister::TimerCounter => Slot::TimerCounter,
            LcdRegister::TimerSet => Slot::TimerSet,
            LcdRegister::LcdEnable => Slot::LcdEnable,
            LcdRegister::LcdLookupTable(i) => Slot::Lut(i),
            LcdRegister::LcdFrameBuffer => Slot::FramePointer(0),
        }
    }
}

impl From<DualFrameRegister> for Slot {
    fn from(reg: DualFrameRegister) -> Self {
        match reg {
            DualFrameRegister::InterruptControl => Slot::InterruptControl,
            DualFrameRegister::InterruptStatus => Slot::InterruptStatus,
            DualFrameRegister::TimerCounter => Slot::TimerCounter,
            DualFrameRegister::TimerSet => Slot::TimerSet,
            DualFrameRegister::FrameBuffer0 => Slot::FramePointer(0),
            DualFrameRegister::FrameBuffer1 => Slot::FramePointer(1),
        }
    }
}

/// Running summary of frame-pointer stores: count, the last two values and
/// whether every store so far alternated between two distinct addresses.
#[derive(Debug, Clone, Copy)]
struct PublishHistory {
    count: u64,
    last: Option<u32>,
    before_last: Option<u32>,
    alternating: bool,
}

impl Default for PublishHistory {
    fn default() -> Self {
        Self {
            count: 0,
            last: None,
            before_last: None,
            alternating: true,
        }
    }
}

impl PublishHistory {
    fn push(&mut self, addr: u32) {
        if self.last == Some(addr) {
            self.alternating = false;
        }
        if self.before_last.is_some_and(|a| a != addr) {
            self.alternating = false;
        }
        self.before_last = self.last;
        self.last = Some(addr);
        self.count += 1;
    }
}

/// FPGA register block: interrupt enable/status, a free-running timer and,
/// depending on the layout, the LCD controls.
///
/// The timer counts up once per tick while `TimerSet` is non-zero. When the
/// counter reaches the period it wraps to zero and latches
/// `InterruptStatus.TIMER`. Status bits are write-1-to-clear.
#[derive(Debug)]
pub struct FpgaBlock {
    layout: Layout,
    control: InterruptBits,
    status: InterruptBits,
    counter: u32,
    period: u32,
    lcd_enabled: bool,
    lut: Vec<u32>,
    lut_writes: Vec<u32>,
    lut_writes_after_enable: u64,
    frame_pointers: [u32; 2],
    publish: PublishHistory,
    expirations: u64,
}

impl FpgaBlock {
    pub fn new(layout: Layout) -> Self {
        let lut_len = match layout {
            Layout::Lcd => LUT_ENTRIES,
            Layout::DualFrame => 0,
        };
        Self {
            layout,
            control: InterruptBits::empty(),
            status: InterruptBits::empty(),
            counter: 0,
            period: 0,
            lcd_enabled: false,
            lut: vec![0; lut_len],
            lut_writes: vec![0; lut_len],
            lut_writes_after_enable: 0,
            frame_pointers: [0; 2],
            publish: PublishHistory::default(),
            expirations: 0,
        }
    }

    /// Window size in bytes.
    pub fn size(&self) -> u32 {
        self.layout.window_size()
    }

    fn decode(&self, offset: u32) -> Option<Slot> {
        if offset % WORD_SIZE != 0 {
            return None;
        }
        let word = offset / WORD_SIZE;
        match self.layout {
            Layout::Lcd => LcdRegister::from_offset(word).map(Slot::from),
            Layout::DualFrame => DualFrameRegister::from_offset(word).map(Slot::from),
        }
    }

    pub fn irq_asserted(&self) -> bool {
        self.status.intersects(self.control)
    }

    pub fn status(&self) -> InterruptBits {
        self.status
    }

    pub fn lcd_enabled(&self) -> bool {
        self.lcd_enabled
    }

    /// Number of stores to a frame pointer register.
    pub fn publish_count(&self) -> u64 {
        self.publish.count
    }

    pub fn last_published(&self) -> Option<u32> {
        self.publish.last
    }

    /// True when at least two frames were published and the stores
    /// strictly alternated between two distinct addresses.
    pub fn frame_pointer_alternates(&self) -> bool {
        self.publish.count >= 2 && self.publish.alternating
    }

    pub fn timer_expirations(&self) -> u64 {
        self.expirations
    }

    /// True when every LUT entry was written exactly once and all of those
    /// writes happened before the LCD was enabled.
    pub fn lut_loaded_once_before_enable(&self) -> bool {
        !self.lut.is_empty()
            && self.lcd_enabled
            && self.lut_writes_after_enable == 0
            && self.lut_writes.iter().all(|&n| n <= 1)
            && self.lut_writes.iter().any(|&n| n == 1)
    }
}

impl crate::Peripheral for FpgaBlock {
    fn read(&mut self, offset: u32, width: Width) -> SimResult<u32> {
        let slot = match (width, self.decode(offset)) {
            (Width::Word, Some(slot)) => slot,
            _ => return Err(SimulationError::BadAccess { offset, width }),
        };
        let value = match slot {
            Slot::InterruptControl => self.control.bits(),
            Slot::InterruptStatus => self.status.bits(),
            Slot::TimerCounter => self.counter,
            Slot::TimerSet => self.period,
            Slot::LcdEnable => self.lcd_enabled as u32,
            Slot::Lut(i) => self.lut[i as usize],
            Slot::FramePointer(i) => self.frame_pointers[i],
        };
        Ok(value)
    }

    fn write(&mut self, offset: u32, width: Width, value: u32) -> SimResult<()> {
        let slot = match (width, self.decode(offset)) {
            (Width::Word, Some(slot)) => slot,
            _ => return Err(SimulationError::BadAccess { offset, width }),
        };
        match slot {
            Slot::InterruptControl => self.control = InterruptBits::from_bits_truncate(value),
            Slot::InterruptStatus => {
                self.status.remove(InterruptBits::from_bits_truncate(value));
            }
            Slot::TimerCounter => {
                // Read-only.
            }
            Slot::TimerSet => {
                self.period = value;
                self.counter = 0;
            }
            Slot::LcdEnable => {
                self.lcd_enabled = value & 1 != 0;
                tracing::info!("FPGA: LCD {}", if self.lcd_enabled { "enabled" } else { "disabled" });
            }
            Slot::Lut(i) => {
                self.lut[i as usize] = value;
                self.lut_writes[i as usize] += 1;
                if self.lcd_enabled {
                    self.lut_writes_after_enable += 1;
                }
            }
            Slot::FramePointer(i) => {
                self.frame_pointers[i] = value;
                self.publish.push(value);
                tracing::debug!("FPGA: frame pointer {} -> {:#x}", i, value);
            }
        }
        Ok(())
    }

    fn tick(&mut self) -> bool {
        if self.period != 0 {
            self.counter += 1;
            if self.counter >= self.period {
                self.counter = 0;
                self.status.insert(InterruptBits::TIMER);
                self.expirations += 1;
            }
        }
        self.irq_asserted()
    }

    fn irq_level(&self) -> bool {
        self.irq_asserted()
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "layout": format!("{:?}", self.layout),
            "interrupt_control": self.control.bits(),
            "interrupt_status": self.status.bits(),
            "timer_counter": self.counter,
            "timer_set": self.period,
            "lcd_enabled": self.lcd_enabled,
            "frame_pointers": self.frame_pointers,
            "lut": self.lut,
            "publish_count": self.publish.count,
            "frame_pointer_alternates": self.frame_pointer_alternates(),
            "timer_expirations": self.expirations,
        })
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}
