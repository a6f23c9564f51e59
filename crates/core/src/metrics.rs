use crate::SimulationObserver;
use bringup_hal::isr::Dispatch;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct PerformanceMetrics {
    step_count: AtomicU64,
    interrupt_count: AtomicU64,
    rejected_count: AtomicU64,
    access_count: AtomicU64,
    start_time: Instant,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            step_count: AtomicU64::new(0),
            interrupt_count: AtomicU64::new(0),
            rejected_count: AtomicU64::new(0),
            access_count: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn get_steps(&self) -> u64 {
        self.step_count.load(Ordering::SeqCst)
    }

    pub fn get_interrupts(&self) -> u64 {
        self.interrupt_count.load(Ordering::SeqCst)
    }

    pub fn get_rejected(&self) -> u64 {
        self.rejected_count.load(Ordering::SeqCst)
    }

    pub fn get_accesses(&self) -> u64 {
        self.access_count.load(Ordering::SeqCst)
    }

    /// Main-loop iterations per second of wall time.
    pub fn get_sps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.get_steps() as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl SimulationObserver for PerformanceMetrics {
    fn on_step_start(&self, _step: u64) {
        self.step_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_step_end(&self, _step: u64, accesses: u64) {
        self.access_count.fetch_add(accesses, Ordering::SeqCst);
    }

    fn on_interrupt(&self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Handled { .. } => self.interrupt_count.fetch_add(1, Ordering::SeqCst),
            Dispatch::Rejected => self.rejected_count.fetch_add(1, Ordering::SeqCst),
        };
    }
}
