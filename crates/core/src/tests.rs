#[cfg(test)]
mod tests {
    use crate::bus::{AccessKind, Context, SystemBus, FAULT_CAPACITY, TRACE_CAPACITY};
    use crate::metrics::PerformanceMetrics;
    use crate::peripherals::char_port::CharPort;
    use crate::{build_machine, Machine, StepOutcome, Width};
    use bringup_config::{PlatformDescriptor, StopReason, VariantKind};
    use bringup_hal::framebuffer::FRAME_BYTES;
    use bringup_hal::regs::{LcdBlock, LcdRegister, FPGA_DUAL_FRAME_BASE, FPGA_LCD_BASE};
    use bringup_hal::RegisterAccess;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn machine(variant: VariantKind) -> Machine {
        build_machine(&PlatformDescriptor::builtin(variant), false).unwrap()
    }

    fn machine_with(variant: VariantKind, f: impl FnOnce(&mut PlatformDescriptor)) -> Machine {
        let mut desc = PlatformDescriptor::builtin(variant);
        f(&mut desc);
        build_machine(&desc, false).unwrap()
    }

    #[test]
    fn test_double_buffer_first_iteration() {
        let mut m = machine(VariantKind::DoubleBuffer);
        assert_eq!(m.step(), StepOutcome::Continued { interrupted: false });

        let (_, front) = m.frame(0).unwrap();
        let (_, back) = m.frame(1).unwrap();
        assert_eq!(front.len(), FRAME_BYTES);
        assert!(front.iter().all(|&p| p == 1));
        assert!(back.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_double_buffer_pointer_alternates() {
        let mut m = machine(VariantKind::DoubleBuffer);
        for _ in 0..25 {
            m.step();
        }
        let (a0, _) = m.frame(0).unwrap();
        let (a1, _) = m.frame(1).unwrap();
        assert_ne!(a0, a1);

        let fpga = m.fpga().unwrap();
        assert_eq!(fpga.publish_count(), 25);
        assert!(fpga.frame_pointer_alternates());
        // Iteration 25 published buffer 0.
        assert_eq!(fpga.last_published(), Some(a0));
    }

    #[test]
    fn test_lut_written_once_before_enable() {
        for variant in [VariantKind::DoubleBuffer, VariantKind::FillRect] {
            let mut m = machine(variant);
            m.run(10, None);
            let fpga = m.fpga().unwrap();
            assert!(fpga.lcd_enabled());
            assert!(fpga.lut_loaded_once_before_enable(), "{}", variant);
        }
    }

    #[test]
    fn test_fill_rect_republishes_single_frame() {
        let mut m = machine_with(VariantKind::FillRect, |d| d.seed = 42);
        m.run(30, None);
        let (addr, pixels) = m.frame(0).unwrap();
        assert!(m.frame(1).is_none());
        assert!(pixels.iter().any(|&p| p != 0));
        let fpga = m.fpga().unwrap();
        assert_eq!(fpga.publish_count(), 30);
        assert_eq!(fpga.last_published(), Some(addr));
        assert!(!fpga.frame_pointer_alternates());
    }

    #[test]
    fn test_timer_irq_fires_and_acknowledges() {
        let mut m = machine_with(VariantKind::TimerIrq, |d| {
            d.timer_period = 100;
            d.cycles_per_step = 250;
        });
        for _ in 0..4 {
            assert_eq!(m.step(), StepOutcome::Continued { interrupted: true });
        }
        assert_eq!(m.interrupts(), 4);
        assert_eq!(m.rejected_interrupts(), 0);
        assert_eq!(m.char_output(), "Timer interrupt\n".repeat(4));
        assert!(m.fpga().unwrap().status().is_empty());
    }

    #[test]
    fn test_timer_irq_rate_follows_period() {
        let mut m = machine_with(VariantKind::TimerIrq, |d| {
            d.timer_period = 1000;
            d.cycles_per_step = 250;
        });
        m.run(40, None);
        assert_eq!(m.interrupts(), 10);
    }

    #[test]
    fn test_isr_acknowledges_before_printing() {
        let mut m = machine_with(VariantKind::TimerIrq, |d| {
            d.timer_period = 10;
            d.cycles_per_step = 10;
        });
        m.step();

        let isr: Vec<_> = m
            .bus
            .trace()
            .iter()
            .filter(|a| a.context == Context::Interrupt)
            .collect();
        let status = FPGA_DUAL_FRAME_BASE + 4;
        assert_eq!(isr[0].kind, AccessKind::Read);
        assert_eq!(isr[0].addr, status);
        assert_eq!(isr[1].kind, AccessKind::Write);
        assert_eq!(isr[1].addr, status);
        assert!(isr[2..].iter().all(|a| a.width == Width::Byte));
    }

    #[test]
    fn test_handler_and_main_loop_are_disjoint() {
        let mut m = machine_with(VariantKind::DoubleBuffer, |d| {
            d.timer_period = 5_000;
            d.cycles_per_step = 10_000;
        });
        m.run(20, None);
        assert_eq!(m.interrupts(), 20);

        let touched = |ctx: Context| -> HashSet<u32> {
            m.bus
                .trace()
                .iter()
                .filter(|a| a.context == ctx && a.kind == AccessKind::Write)
                .map(|a| a.addr)
                .collect()
        };
        let main = touched(Context::Main);
        let isr = touched(Context::Interrupt);
        assert!(!main.is_empty() && !isr.is_empty());
        assert!(main.is_disjoint(&isr));

        let fb_reg = LcdBlock::new(FPGA_LCD_BASE).address(LcdRegister::LcdFrameBuffer);
        assert!(main.contains(&fb_reg));
        assert!(!isr.contains(&fb_reg));
    }

    #[test]
    fn test_cpu_irq_software_line() {
        let mut m = machine(VariantKind::CpuIrq);
        // Lines are still masked before setup runs.
        assert!(!m.raise_software_irq());

        m.boot();
        assert!(m.raise_software_irq());
        assert_eq!(m.interrupts(), 1);
        assert_eq!(m.char_output(), "CPU interrupt\n");

        // The latched line was cleared by the handler.
        assert_eq!(m.step(), StepOutcome::Continued { interrupted: false });
    }

    #[test]
    fn test_software_irq_without_controller() {
        let mut m = machine(VariantKind::DoubleBuffer);
        m.boot();
        assert!(!m.raise_software_irq());
    }

    #[test]
    fn test_hello_exits_with_greeting() {
        let mut m = machine_with(VariantKind::Hello, |d| d.input = "Linus\n".into());
        assert_eq!(m.run(100, None), StopReason::Exit);
        assert_eq!(m.exit_code(), Some(0));
        assert_eq!(m.steps(), 1);
        assert_eq!(m.char_output(), "You name: Hello Linus!\n");
        assert_eq!(m.step(), StepOutcome::Exited(0));
    }

    #[test]
    fn test_hello_without_input() {
        let mut m = machine(VariantKind::Hello);
        m.run(1, None);
        assert_eq!(m.char_output(), "You name: Hello !\n");
    }

    #[test]
    fn test_hello_echoes_non_ascii_name() {
        let mut m = machine_with(VariantKind::Hello, |d| d.input = "Zo\u{eb}\n".into());
        m.run(1, None);
        let port = m.bus.peripheral::<CharPort>(crate::bus::CHAR_PORT).unwrap();
        assert_eq!(port.output(), "You name: Hello Zo\u{eb}!\n".as_bytes());
    }

    #[test]
    fn test_long_run_keeps_bounded_history() {
        let mut m = machine_with(VariantKind::TimerIrq, |d| {
            d.timer_period = 1;
            d.cycles_per_step = 1;
        });
        m.run(100_000, None);
        assert_eq!(m.interrupts(), 100_000);
        assert_eq!(m.bus.trace().len(), TRACE_CAPACITY);
        assert!(m.bus.access_count() > TRACE_CAPACITY as u64);

        // The retained window is the tail of the run.
        let last = m.bus.trace().back().unwrap();
        assert_eq!(last.context, Context::Interrupt);
        assert_eq!(last.width, Width::Byte);
    }

    #[test]
    fn test_faults_are_counted_past_capacity() {
        let mut bus = SystemBus::new();
        for i in 0..(FAULT_CAPACITY as u32 + 10) {
            bus.write_u32(0x1000 + i * 4, 0);
        }
        assert_eq!(bus.faults().len(), FAULT_CAPACITY);
        assert_eq!(bus.fault_count(), FAULT_CAPACITY as u64 + 10);
    }

    #[test]
    fn test_echo_int() {
        let mut m = machine_with(VariantKind::EchoInt, |d| d.input = "2026\n".into());
        m.run(5, None);
        assert_eq!(m.char_output(), "Number: You entered 2026\n");
    }

    #[test]
    fn test_max_steps_and_wall_time() {
        let mut m = machine(VariantKind::CpuIrq);
        assert_eq!(m.run(3, None), StopReason::MaxSteps);
        assert_eq!(m.steps(), 3);
        assert_eq!(
            m.run(3, Some(std::time::Duration::from_millis(0))),
            StopReason::WallTime
        );
    }

    #[test]
    fn test_unmapped_access_is_a_fault() {
        let mut bus = SystemBus::new();
        bus.write_u32(0x1234, 7);
        assert_eq!(bus.read_u32(0x1234), 0);
        assert_eq!(bus.faults().len(), 2);
        assert_eq!(bus.trace().len(), 2);
    }

    #[test]
    fn test_overlapping_peripherals_rejected() {
        let mut bus = SystemBus::new();
        bus.add_peripheral("a", 0x100, 0x10, None, Box::new(CharPort::new(false)))
            .unwrap();
        assert!(bus
            .add_peripheral("b", 0x108, 0x10, None, Box::new(CharPort::new(false)))
            .is_err());
        assert!(bus
            .add_peripheral("c", 0xffff_fffc, 8, None, Box::new(CharPort::new(false)))
            .is_err());
    }

    #[test]
    fn test_metrics_observer() {
        let mut m = machine_with(VariantKind::TimerIrq, |d| {
            d.timer_period = 10;
            d.cycles_per_step = 10;
        });
        let metrics = Arc::new(PerformanceMetrics::new());
        m.observers.push(metrics.clone());
        m.run(7, None);
        assert_eq!(metrics.get_steps(), 7);
        assert_eq!(metrics.get_interrupts(), 7);
        assert_eq!(metrics.get_rejected(), 0);
        assert!(metrics.get_accesses() > 0);
        assert!(metrics.get_accesses() <= m.bus.access_count());
        assert!(metrics.get_sps() > 0.0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut m = machine(VariantKind::DoubleBuffer);
        m.run(2, None);
        let snap = m.snapshot();
        assert_eq!(snap.program, "double-buffer");
        assert_eq!(snap.frame_addresses.len(), 2);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["peripherals"]["fpga"]["lcd_enabled"], true);
        assert_eq!(json["peripherals"]["fpga"]["publish_count"], 2);
    }
}
