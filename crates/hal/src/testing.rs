use std::collections::{HashMap, VecDeque};

use crate::access::RegisterAccess;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Read8(u32),
    Write8(u32, u8),
    Read32(u32),
    Write32(u32, u32),
}

/// Flat register file that logs every access in order.
#[derive(Debug, Default)]
pub struct Recorder {
    pub ops: Vec<Op>,
    pub words: HashMap<u32, u32>,
    pub input: VecDeque<u8>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: &str) -> Self {
        Self {
            input: input.bytes().collect(),
            ..Self::default()
        }
    }

    pub fn written_bytes(&self) -> Vec<u8> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write8(_, b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write32(a, v) if *a == addr => Some(*v),
                _ => None,
            })
            .collect()
    }
}

impl RegisterAccess for Recorder {
    fn read_u8(&mut self, addr: u32) -> u8 {
        self.ops.push(Op::Read8(addr));
        self.input.pop_front().unwrap_or(0)
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        self.ops.push(Op::Write8(addr, value));
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        self.ops.push(Op::Read32(addr));
        self.words.get(&addr).copied().unwrap_or(0)
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        self.ops.push(Op::Write32(addr, value));
        self.words.insert(addr, value);
    }
}
