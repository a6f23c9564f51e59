use crate::Machine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Debug)]
pub struct MachineSnapshot {
    pub program: String,
    pub steps: u64,
    pub interrupts: u64,
    pub rejected_interrupts: u64,
    pub exit_code: Option<i32>,
    pub uart: String,
    pub frame_addresses: Vec<u32>,
    pub faults: Vec<String>,
    pub fault_count: u64,
    pub peripherals: HashMap<String, serde_json::Value>,
}

impl MachineSnapshot {
    pub fn capture(machine: &Machine) -> Self {
        let frame_addresses = (0..)
            .map_while(|i| machine.frame(i).map(|(addr, _)| addr))
            .collect();
        let peripherals = machine
            .bus
            .peripherals
            .iter()
            .map(|p| (p.name.clone(), p.dev.snapshot()))
            .collect();
        let faults = machine
            .bus
            .faults()
            .iter()
            .map(|f| format!("{:#x}: {}", f.addr, f.error))
            .collect();

        Self {
            program: machine.program_name().to_string(),
            steps: machine.steps(),
            interrupts: machine.interrupts(),
            rejected_interrupts: machine.rejected_interrupts(),
            exit_code: machine.exit_code(),
            uart: machine.char_output(),
            frame_addresses,
            faults,
            fault_count: machine.bus.fault_count(),
            peripherals,
        }
    }
}
