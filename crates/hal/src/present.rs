//! LCD bring-up and the two frame presenters.

use rand::Rng;

use crate::access::RegisterAccess;
use crate::framebuffer::{FrameBuffer, Rect};
use crate::regs::{InterruptBits, LcdBlock, LcdRegister, LUT_ENTRIES};

/// Palette loaded into the LCD lookup table.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    entries: usize,
    color: fn(u8) -> u32,
}

fn grayscale(i: u8) -> u32 {
    0xff00_0000 | (i as u32) * 0x0001_0101
}

fn spectrum(i: u8) -> u32 {
    let i = i as u32;
    0xff00_0000 | (i << 16) | ((255 - i) << 8) | ((i * 7) & 0xff)
}

impl Palette {
    /// Index 0 black, 1 white.
    pub const MONO: Palette = Palette {
        entries: 2,
        color: |i| if i == 0 { 0xff00_0000 } else { 0xffff_ffff },
    };
    pub const GRAYSCALE: Palette = Palette {
        entries: LUT_ENTRIES,
        color: grayscale,
    };
    pub const SPECTRUM: Palette = Palette {
        entries: LUT_ENTRIES,
        color: spectrum,
    };

    pub fn color(&self, index: u8) -> u32 {
        (self.color)(index)
    }

    /// Writes every entry once, in index order.
    pub fn load<A: RegisterAccess + ?Sized>(&self, block: &LcdBlock, bus: &mut A) {
        for reg in (0..self.entries).map_while(LcdRegister::lookup_table) {
            if let LcdRegister::LcdLookupTable(index) = reg {
                block.write(bus, reg, self.color(index));
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DisplayConfig {
    pub sources: InterruptBits,
    pub timer_period: u32,
    pub palette: Palette,
}

/// Interrupt enables, timer period, lookup table, then display enable.
/// The LUT is never touched again after this returns.
pub fn bring_up_display<A: RegisterAccess + ?Sized>(
    block: &LcdBlock,
    bus: &mut A,
    config: &DisplayConfig,
) {
    block.configure_timer(bus, config.sources, config.timer_period);
    config.palette.load(block, bus);
    block.write(bus, LcdRegister::LcdEnable, 1);
}

/// Two frames; the back one is redrawn and published every iteration.
#[derive(Debug)]
pub struct DoubleBuffer<S> {
    frames: [FrameBuffer<S>; 2],
    back: usize,
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> DoubleBuffer<S> {
    pub fn new(first: FrameBuffer<S>, second: FrameBuffer<S>) -> Self {
        Self {
            frames: [first, second],
            back: 0,
        }
    }

    pub fn back_index(&self) -> usize {
        self.back
    }

    pub fn frame(&self, index: usize) -> Option<&FrameBuffer<S>> {
        self.frames.get(index)
    }

    /// Redraws the back frame, publishes it, and swaps roles. Returns the
    /// published address.
    pub fn present<A: RegisterAccess + ?Sized>(&mut self, block: &LcdBlock, bus: &mut A) -> u32 {
        let index = self.back;
        let value = if index == 0 { 1 } else { 0 };
        self.frames[index].fill(value);

        let addr = self.frames[index].addr();
        block.write(bus, LcdRegister::LcdFrameBuffer, addr);
        self.back ^= 1;
        addr
    }
}

/// One frame, drawn into while it is on screen. Tearing is expected.
#[derive(Debug)]
pub struct SingleBuffer<S, R> {
    frame: FrameBuffer<S>,
    rng: R,
}

impl<S: AsRef<[u8]> + AsMut<[u8]>, R: Rng> SingleBuffer<S, R> {
    pub fn new(frame: FrameBuffer<S>, rng: R) -> Self {
        Self { frame, rng }
    }

    pub fn frame(&self) -> &FrameBuffer<S> {
        &self.frame
    }

    /// Draws one random rectangle and republishes the frame.
    pub fn present<A: RegisterAccess + ?Sized>(
        &mut self,
        block: &LcdBlock,
        bus: &mut A,
    ) -> (Rect, u8) {
        let rect = Rect::random(&mut self.rng);
        let color: u8 = self.rng.gen();
        self.frame.fill_rect(rect, color);
        block.write(bus, LcdRegister::LcdFrameBuffer, self.frame.addr());
        (rect, color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::FRAME_BYTES;
    use crate::regs::FPGA_LCD_BASE;
    use crate::testing::{Op, Recorder};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn block() -> LcdBlock {
        LcdBlock::new(FPGA_LCD_BASE)
    }

    fn frames() -> DoubleBuffer<Vec<u8>> {
        DoubleBuffer::new(
            FrameBuffer::new(0x0010_0000, vec![0; FRAME_BYTES]).unwrap(),
            FrameBuffer::new(0x0011_2c00, vec![0; FRAME_BYTES]).unwrap(),
        )
    }

    #[test]
    fn test_lut_loaded_before_enable() {
        let mut bus = Recorder::new();
        let config = DisplayConfig {
            sources: InterruptBits::TIMER,
            timer_period: 1000,
            palette: Palette::GRAYSCALE,
        };
        bring_up_display(&block(), &mut bus, &config);

        let enable = block().address(LcdRegister::LcdEnable);
        let lut_start = block().address(LcdRegister::LcdLookupTable(0));
        let lut_end = block().address(LcdRegister::LcdLookupTable(255));

        let enable_at = bus
            .ops
            .iter()
            .position(|op| *op == Op::Write32(enable, 1))
            .unwrap();
        let lut_writes: Vec<usize> = bus
            .ops
            .iter()
            .enumerate()
            .filter(|(_, op)| matches!(op, Op::Write32(a, _) if (lut_start..=lut_end).contains(a)))
            .map(|(i, _)| i)
            .collect();

        assert_eq!(lut_writes.len(), 256);
        assert!(lut_writes.iter().all(|&i| i < enable_at));
        assert_eq!(bus.words[&lut_start], 0xff00_0000);
        assert_eq!(bus.words[&lut_end], 0xffff_ffff);
    }

    #[test]
    fn test_mono_palette_is_short() {
        let mut bus = Recorder::new();
        Palette::MONO.load(&block(), &mut bus);
        assert_eq!(bus.ops.len(), 2);
        assert_eq!(Palette::MONO.len(), 2);
    }

    #[test]
    fn test_first_iteration_fills_front_with_one() {
        let mut bus = Recorder::new();
        let mut db = frames();
        db.present(&block(), &mut bus);

        assert!(db.frame(0).unwrap().pixels().iter().all(|&p| p == 1));
        assert!(db.frame(1).unwrap().pixels().iter().all(|&p| p == 0));
        assert_eq!(db.back_index(), 1);
    }

    #[test]
    fn test_published_pointer_alternates() {
        let mut bus = Recorder::new();
        let mut db = frames();
        for _ in 0..9 {
            db.present(&block(), &mut bus);
        }

        let published = bus.writes_to(block().address(LcdRegister::LcdFrameBuffer));
        assert_eq!(published.len(), 9);
        assert_eq!(published[0], 0x0010_0000);
        for pair in published.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn test_single_buffer_republishes_same_frame() {
        let mut bus = Recorder::new();
        let fb = FrameBuffer::new(0x0020_0000, vec![0; FRAME_BYTES]).unwrap();
        let mut sb = SingleBuffer::new(fb, SmallRng::seed_from_u64(1));
        for _ in 0..5 {
            sb.present(&block(), &mut bus);
        }
        let published = bus.writes_to(block().address(LcdRegister::LcdFrameBuffer));
        assert_eq!(published, vec![0x0020_0000; 5]);
    }
}
