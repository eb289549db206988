use serde::{Deserialize, Serialize};

use crate::instructions::{Mnemonic, Operand};
use crate::memory::MemoryView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Insn(Mnemonic),
    /// Interrupt vector word in the table at %0000..%000B
    Vector,
    /// Byte that starts no known (or no complete) instruction
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded {
    pub addr: u16,
    /// Bytes consumed; empty only when the address itself is unmapped.
    pub bytes: Vec<u8>,
    pub op: Op,
    pub operands: Vec<Operand>,
}

impl Decoded {
    pub fn unknown(addr: u16, byte: Option<u8>) -> Self {
        Self {
            addr,
            bytes: byte.into_iter().collect(),
            op: Op::Unknown,
            operands: byte.map(Operand::Byte).into_iter().collect(),
        }
    }

    pub fn len(&self) -> u16 {
        self.bytes.len().max(1) as u16
    }

    pub fn next_addr(&self) -> u16 {
        self.addr.wrapping_add(self.len())
    }

    pub fn mnemonic(&self) -> Option<Mnemonic> {
        match self.op {
            Op::Insn(m) => Some(m),
            _ => None,
        }
    }

    /// Jump/call destination, if this is a direct control transfer.
    pub fn target(&self) -> Option<u16> {
        match self.mnemonic()? {
            Mnemonic::Jp | Mnemonic::Jr | Mnemonic::Call | Mnemonic::Djnz => {
                self.operands.iter().rev().find_map(|o| match *o {
                    Operand::Addr(a) => Some(a),
                    _ => None,
                })
            }
            _ => None,
        }
    }
}

pub trait Decoder {
    /// Never fails: anything undecodable comes back as `Op::Unknown`.
    fn decode<M: MemoryView + ?Sized>(&self, mem: &M, addr: u16) -> Decoded;
}
