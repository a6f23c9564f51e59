use crate::{SimResult, SimulationError, Width};
use std::any::Any;
use std::collections::VecDeque;
use std::io::{self, Write};

/// Bytes of output captured before further output is only counted.
pub const OUTPUT_CAPACITY: usize = 1 << 20;

/// Byte-wide character port.
///
/// Stores append to the captured output (and optionally stdout). Loads pop
/// the next preloaded input byte; an empty queue reads as NUL.
#[derive(Debug, Default)]
pub struct CharPort {
    input: VecDeque<u8>,
    output: Vec<u8>,
    dropped: u64,
    echo_stdout: bool,
}

impl CharPort {
    pub fn new(echo_stdout: bool) -> Self {
        Self {
            echo_stdout,
            ..Default::default()
        }
    }

    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Output bytes past [`OUTPUT_CAPACITY`] that were not captured.
    pub fn dropped_output(&self) -> u64 {
        self.dropped
    }
}

impl crate::Peripheral for CharPort {
    fn read(&mut self, offset: u32, width: Width) -> SimResult<u32> {
        if offset != 0 || width != Width::Byte {
            return Err(SimulationError::BadAccess { offset, width });
        }
        Ok(self.input.pop_front().unwrap_or(0) as u32)
    }

    fn write(&mut self, offset: u32, width: Width, value: u32) -> SimResult<()> {
        if offset != 0 || width != Width::Byte {
            return Err(SimulationError::BadAccess { offset, width });
        }
        let byte = value as u8;
        if self.output.len() < OUTPUT_CAPACITY {
            self.output.push(byte);
        } else {
            self.dropped += 1;
        }
        if self.echo_stdout {
            let mut out = io::stdout();
            let _ = out.write_all(&[byte]);
            let _ = out.flush();
        }
        Ok(())
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "output": self.output_lossy(),
            "pending_input": self.input.len(),
            "dropped_output": self.dropped,
        })
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Peripheral;

    #[test]
    fn test_input_then_nul() {
        let mut port = CharPort::new(false);
        port.push_input(b"ok");
        assert_eq!(port.read(0, Width::Byte).unwrap(), b'o' as u32);
        assert_eq!(port.read(0, Width::Byte).unwrap(), b'k' as u32);
        assert_eq!(port.read(0, Width::Byte).unwrap(), 0);
    }

    #[test]
    fn test_output_capture_is_capped() {
        let mut port = CharPort::new(false);
        for _ in 0..OUTPUT_CAPACITY + 5 {
            port.write(0, Width::Byte, b'.' as u32).unwrap();
        }
        assert_eq!(port.output().len(), OUTPUT_CAPACITY);
        assert_eq!(port.dropped_output(), 5);
        assert_eq!(port.snapshot()["dropped_output"], 5);
    }

    #[test]
    fn test_word_access_rejected() {
        let mut port = CharPort::new(false);
        assert!(port.write(0, Width::Word, 0x41).is_err());
        assert!(port.output().is_empty());
    }
}
