use serde::{Deserialize, Serialize};

use crate::instructions::{REG_P01M, REG_RP};

/// Read-only view of the 64 KiB program address space.
pub trait MemoryView {
    /// `None` for unmapped addresses.
    fn read_u8(&self, addr: u16) -> Option<u8>;

    fn read_u16(&self, addr: u16) -> Option<u16> {
        let hi = self.read_u8(addr)?;
        let lo = self.read_u8(addr.wrapping_add(1))?;
        Some(u16::from_be_bytes([hi, lo]))
    }
}

/// Live register file of a stopped CPU.
pub trait RegisterFile {
    fn reg(&self, num: u8) -> u8;

    fn rp(&self) -> u8 {
        self.reg(REG_RP)
    }

    /// Absolute number of working register `n` under the current RP.
    fn working(&self, n: u8) -> u8 {
        (self.rp() & 0xF0) | (n & 0x0F)
    }

    /// Stack lives in the register file when P01M bit 2 is set.
    fn internal_stack(&self) -> bool {
        self.reg(REG_P01M) & 0x04 != 0
    }
}

/// Contiguous block of program memory starting at `base`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearMemory {
    pub mem: Vec<u8>,
    pub base: u16,
}

impl LinearMemory {
    pub fn new(base: u16, bytes: &[u8]) -> Self {
        let len = bytes.len().min(0x10000 - base as usize);
        Self {
            mem: bytes[..len].to_vec(),
            base,
        }
    }
}

impl MemoryView for LinearMemory {
    fn read_u8(&self, addr: u16) -> Option<u8> {
        let off = addr.checked_sub(self.base)? as usize;
        self.mem.get(off).copied()
    }
}

/// Full 256-byte register image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterSnapshot {
    pub regs: [u8; 256],
}

impl RegisterSnapshot {
    pub fn new() -> Self {
        Self { regs: [0; 256] }
    }

    pub fn with(mut self, num: u8, value: u8) -> Self {
        self.regs[num as usize] = value;
        self
    }
}

impl Default for RegisterSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile for RegisterSnapshot {
    fn reg(&self, num: u8) -> u8 {
        self.regs[num as usize]
    }
}
