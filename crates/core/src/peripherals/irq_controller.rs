use crate::{Peripheral, SimResult, SimulationError, Width};
use bringup_hal::regs::{IrqControllerRegister, IrqLines, RegisterMap, WORD_SIZE};
use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// State shared between the controller's register window and the machine.
#[derive(Debug, Default)]
pub struct IrqControllerState {
    pub enable: AtomicU32,
    /// Edge-latched lines (software).
    pub latched: AtomicU32,
    /// Level lines as last sampled from devices.
    pub level: AtomicU32,
}

impl IrqControllerState {
    pub fn enabled(&self) -> IrqLines {
        IrqLines::from_bits_truncate(self.enable.load(Ordering::SeqCst))
    }

    pub fn pending(&self) -> IrqLines {
        IrqLines::from_bits_truncate(
            self.latched.load(Ordering::SeqCst) | self.level.load(Ordering::SeqCst),
        )
    }

    pub fn set_level(&self, lines: IrqLines) {
        self.level.store(lines.bits(), Ordering::SeqCst);
    }

    pub fn raise(&self, lines: IrqLines) {
        self.latched.fetch_or(lines.bits(), Ordering::SeqCst);
    }

    /// An enabled line is pending.
    pub fn requested(&self) -> bool {
        self.pending().intersects(self.enabled())
    }
}

/// Standalone CPU interrupt controller: `Enable` masks lines, `Pending`
/// reports latched and level lines and clears latched ones on write-1.
#[derive(Debug, Clone)]
pub struct IrqController {
    pub state: Arc<IrqControllerState>,
}

impl IrqController {
    pub fn new(state: Arc<IrqControllerState>) -> Self {
        Self { state }
    }

    pub fn size(&self) -> u32 {
        2 * WORD_SIZE
    }

    fn decode(offset: u32, width: Width) -> SimResult<IrqControllerRegister> {
        if width != Width::Word || offset % WORD_SIZE != 0 {
            return Err(SimulationError::BadAccess { offset, width });
        }
        IrqControllerRegister::from_offset(offset / WORD_SIZE)
            .ok_or(SimulationError::BadAccess { offset, width })
    }
}

impl Peripheral for IrqController {
    fn read(&mut self, offset: u32, width: Width) -> SimResult<u32> {
        let value = match Self::decode(offset, width)? {
            IrqControllerRegister::Enable => self.state.enabled().bits(),
            IrqControllerRegister::Pending => self.state.pending().bits(),
        };
        Ok(value)
    }

    fn write(&mut self, offset: u32, width: Width, value: u32) -> SimResult<()> {
        match Self::decode(offset, width)? {
            IrqControllerRegister::Enable => {
                self.state.enable.store(value, Ordering::SeqCst);
                tracing::info!("IRQ: enable set to {:#x}", value);
            }
            IrqControllerRegister::Pending => {
                self.state.latched.fetch_and(!value, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "enable": self.state.enabled().bits(),
            "pending": self.state.pending().bits(),
        })
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_software_line_latches_until_cleared() {
        let state = Arc::new(IrqControllerState::default());
        let mut ctl = IrqController::new(state.clone());

        state.raise(IrqLines::SOFTWARE);
        assert!(!state.requested());

        ctl.write(0, Width::Word, IrqLines::SOFTWARE.bits()).unwrap();
        assert!(state.requested());
        assert_eq!(ctl.read(4, Width::Word).unwrap(), IrqLines::SOFTWARE.bits());

        ctl.write(4, Width::Word, IrqLines::SOFTWARE.bits()).unwrap();
        assert!(!state.requested());
    }

    #[test]
    fn test_level_line_ignores_clear() {
        let state = Arc::new(IrqControllerState::default());
        let mut ctl = IrqController::new(state.clone());
        ctl.write(0, Width::Word, IrqLines::EXTERNAL.bits()).unwrap();

        state.set_level(IrqLines::EXTERNAL);
        ctl.write(4, Width::Word, IrqLines::EXTERNAL.bits()).unwrap();
        assert!(state.requested());

        state.set_level(IrqLines::empty());
        assert!(!state.requested());
    }
}
