use rand::Rng;

pub const FRAME_WIDTH: usize = 320;
pub const FRAME_HEIGHT: usize = 240;
pub const FRAME_BYTES: usize = FRAME_WIDTH * FRAME_HEIGHT;

/// 8-bit palette-indexed frame of `FRAME_WIDTH` x `FRAME_HEIGHT` pixels.
///
/// `addr` is the bus address the display controller fetches the frame
/// from; it is what gets published to the frame pointer register.
#[derive(Debug)]
pub struct FrameBuffer<S> {
    addr: u32,
    pixels: S,
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> FrameBuffer<S> {
    /// Returns `None` if `pixels` is not exactly one frame long.
    pub fn new(addr: u32, pixels: S) -> Option<Self> {
        if pixels.as_ref().len() != FRAME_BYTES {
            return None;
        }
        Some(Self { addr, pixels })
    }

    pub fn addr(&self) -> u32 {
        self.addr
    }

    pub fn pixels(&self) -> &[u8] {
        self.pixels.as_ref()
    }

    pub fn fill(&mut self, value: u8) {
        self.pixels.as_mut().fill(value);
    }

    /// Row memset: `len` pixels starting at (`x`, `y`).
    fn fill_row(&mut self, x: usize, y: usize, len: usize, value: u8) {
        debug_assert!(x + len <= FRAME_WIDTH && y < FRAME_HEIGHT);
        let start = y * FRAME_WIDTH + x;
        self.pixels.as_mut()[start..start + len].fill(value);
    }

    /// Never clips: a [`Rect`] is inside the frame by construction.
    pub fn fill_rect(&mut self, rect: Rect, value: u8) {
        for row in rect.y..rect.y + rect.h {
            self.fill_row(rect.x, row, rect.w, value);
        }
    }
}

impl FrameBuffer<&'static mut [u8; FRAME_BYTES]> {
    /// Wraps a statically allocated frame, addressed by its own location.
    pub fn from_static(pixels: &'static mut [u8; FRAME_BYTES]) -> Self {
        let addr = pixels.as_ptr() as usize as u32;
        Self { addr, pixels }
    }
}

/// Axis-aligned, non-empty rectangle, always fully inside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    x: usize,
    y: usize,
    w: usize,
    h: usize,
}

impl Rect {
    /// Returns `None` for an empty rectangle or one reaching past the frame.
    pub fn new(x: usize, y: usize, w: usize, h: usize) -> Option<Self> {
        let fits = |origin: usize, len: usize, limit: usize| {
            len > 0 && origin.checked_add(len).is_some_and(|end| end <= limit)
        };
        (fits(x, w, FRAME_WIDTH) && fits(y, h, FRAME_HEIGHT)).then_some(Self { x, y, w, h })
    }

    pub fn x(&self) -> usize {
        self.x
    }

    pub fn y(&self) -> usize {
        self.y
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn height(&self) -> usize {
        self.h
    }

    /// A random non-empty rectangle that fits the frame without clipping.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let w = rng.gen_range(1..=FRAME_WIDTH);
        let h = rng.gen_range(1..=FRAME_HEIGHT);
        let x = rng.gen_range(0..=FRAME_WIDTH - w);
        let y = rng.gen_range(0..=FRAME_HEIGHT - h);
        Self { x, y, w, h }
    }
}
