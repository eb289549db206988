pub mod access;
pub mod asm;
pub mod cpu;
pub mod decoder;
pub mod diagnostic;
pub mod disasm;
pub mod encoder;
pub mod error;
pub mod instructions;
pub mod memory;
pub mod scanner;

pub mod isa {
    pub mod z8; // Z8 / U88x opcode map
}

pub use access::{classify_access, RegAccess};
pub use asm::{assemble, AsmOptions, AssembleResult, EmbedRules, LineInfo};
pub use cpu::CpuVariant;
pub use decoder::{Decoded, Decoder, Op};
pub use diagnostic::{Diagnostic, Severity};
pub use disasm::Reassembler;
pub use error::{Error, Result};
pub use instructions::{Access, Cond, Mnemonic, Operand};
pub use memory::{LinearMemory, MemoryView, RegisterFile, RegisterSnapshot};
