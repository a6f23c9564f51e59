//! Character console over the byte-wide port: `outbyte`/`inbyte` plus the
//! small amount of formatted I/O the smoke tests need.

use core::fmt;

use crate::access::RegisterAccess;
use crate::regs::CharPort;

/// Capacity of a scanned word, terminator excluded.
pub const WORD_CAPACITY: usize = 19;

pub fn outbyte<A: RegisterAccess + ?Sized>(bus: &mut A, port: CharPort, c: u8) {
    port.put(bus, c)
}

pub fn inbyte<A: RegisterAccess + ?Sized>(bus: &mut A, port: CharPort) -> u8 {
    port.get(bus)
}

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// A word read from the console, at most [`WORD_CAPACITY`] bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Word {
    buf: [u8; WORD_CAPACITY],
    len: usize,
}

impl Word {
    pub const fn empty() -> Self {
        Self {
            buf: [0; WORD_CAPACITY],
            len: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({:?})", self.as_bytes())
    }
}

/// Formatted output and scanning bound to one port.
pub struct Console<'a, A: RegisterAccess + ?Sized> {
    bus: &'a mut A,
    port: CharPort,
    lookahead: Option<u8>,
}

impl<'a, A: RegisterAccess + ?Sized> Console<'a, A> {
    pub fn new(bus: &'a mut A, port: CharPort) -> Self {
        Self {
            bus,
            port,
            lookahead: None,
        }
    }

    pub fn put_str(&mut self, s: &str) {
        self.put_bytes(s.as_bytes());
    }

    /// Raw bytes, sent unchanged (scanned words need not be UTF-8).
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            outbyte(self.bus, self.port, b);
        }
    }

    fn next_byte(&mut self) -> u8 {
        match self.lookahead.take() {
            Some(b) => b,
            None => inbyte(self.bus, self.port),
        }
    }

    /// Skips whitespace; returns the first other byte (NUL = end of input).
    fn skip_space(&mut self) -> u8 {
        loop {
            let c = self.next_byte();
            if !is_space(c) {
                return c;
            }
        }
    }

    /// `%s`: one whitespace-delimited word. Bytes past the capacity are
    /// consumed and dropped.
    pub fn scan_word(&mut self) -> Word {
        let mut word = Word::empty();
        let mut c = self.skip_space();
        while c != 0 && !is_space(c) {
            if word.len < WORD_CAPACITY {
                word.buf[word.len] = c;
                word.len += 1;
            }
            c = self.next_byte();
        }
        word
    }

    /// `%d`: optional sign then decimal digits. Parse failures are not
    /// reported; the result is whatever was accumulated (0 for none).
    pub fn scan_int(&mut self) -> i32 {
        let mut c = self.skip_space();
        let negative = c == b'-';
        if c == b'-' || c == b'+' {
            c = self.next_byte();
        }

        let mut value: i32 = 0;
        while c.is_ascii_digit() {
            value = value.wrapping_mul(10).wrapping_add((c - b'0') as i32);
            c = self.next_byte();
        }
        // The terminating byte belongs to whatever is scanned next.
        if c != 0 {
            self.lookahead = Some(c);
        }

        if negative {
            value.wrapping_neg()
        } else {
            value
        }
    }
}

impl<A: RegisterAccess + ?Sized> fmt::Write for Console<'_, A> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.put_str(s);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Recorder;
    use core::fmt::Write;

    #[test]
    fn test_scan_word_skips_leading_space() {
        let mut bus = Recorder::with_input("  \n Ada Lovelace");
        let mut con = Console::new(&mut bus, CharPort::default());
        assert_eq!(con.scan_word().as_bytes(), b"Ada");
        assert_eq!(con.scan_word().as_bytes(), b"Lovelace");
        assert!(con.scan_word().is_empty());
    }

    #[test]
    fn test_scan_word_truncates_long_input() {
        let mut bus = Recorder::with_input("abcdefghijklmnopqrstuvwxyz next");
        let mut con = Console::new(&mut bus, CharPort::default());
        let word = con.scan_word();
        assert_eq!(word.as_bytes(), b"abcdefghijklmnopqrs");
        assert_eq!(con.scan_word().as_bytes(), b"next");
    }

    #[test]
    fn test_scan_word_capacity_boundaries() {
        let mut bus = Recorder::with_input("abcdefghijklmnopqrs abcdefghijklmnopqrst end");
        let mut con = Console::new(&mut bus, CharPort::default());
        // Exactly the capacity is kept whole.
        assert_eq!(con.scan_word().as_bytes(), b"abcdefghijklmnopqrs");
        // One byte over: the twentieth byte is consumed and dropped.
        assert_eq!(con.scan_word().as_bytes(), b"abcdefghijklmnopqrs");
        assert_eq!(con.scan_word().as_bytes(), b"end");
        assert!(con.scan_word().is_empty());
    }

    #[test]
    fn test_put_bytes_passes_non_ascii_through() {
        let mut bus = Recorder::with_input("Zo\u{eb}\n");
        let mut con = Console::new(&mut bus, CharPort::default());
        let word = con.scan_word();
        assert_eq!(word.as_bytes(), "Zo\u{eb}".as_bytes());
        con.put_bytes(word.as_bytes());
        assert_eq!(bus.written_bytes(), vec![b'Z', b'o', 0xc3, 0xab]);
    }

    #[test]
    fn test_scan_int() {
        let mut bus = Recorder::with_input(" -42\n17 x");
        let mut con = Console::new(&mut bus, CharPort::default());
        assert_eq!(con.scan_int(), -42);
        assert_eq!(con.scan_int(), 17);
        assert_eq!(con.scan_int(), 0);
    }

    #[test]
    fn test_formatted_output_goes_through_port() {
        let mut bus = Recorder::new();
        let mut con = Console::new(&mut bus, CharPort::default());
        write!(con, "Hello {}!\n", "Bob").unwrap();
        assert_eq!(bus.written_bytes(), b"Hello Bob!\n");
    }
}
