use std::collections::BTreeSet;

use serde::Serialize;
use tracing::trace;

use crate::decoder::{Decoded, Decoder, Op};
use crate::instructions::{Access, Mnemonic, Operand, REG_FLAGS, REG_IMR, REG_RP, REG_SPH, REG_SPL};
use crate::isa::z8::Z8Decoder;
use crate::memory::{MemoryView, RegisterFile};

/// Registers touched by one instruction, as absolute register numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegAccess {
    pub reads: BTreeSet<u8>,
    pub writes: BTreeSet<u8>,
}

impl RegAccess {
    /// Breakpoint test: does the instruction touch `reg` in any of the
    /// requested ways?
    pub fn matches(&self, reg: u8, access: Access) -> bool {
        (access.contains(Access::READ) && self.reads.contains(&reg))
            || (access.contains(Access::WRITE) && self.writes.contains(&reg))
    }
}

/// Classify the instruction at `pc` against a register snapshot.
pub fn classify_access<M, R>(mem: &M, regs: &R, pc: u16) -> RegAccess
where
    M: MemoryView + ?Sized,
    R: RegisterFile + ?Sized,
{
    let d = Z8Decoder::plain().decode(mem, pc);
    let mut c = Classifier { regs, out: RegAccess::default() };
    c.instruction(&d);
    trace!(pc, reads = ?c.out.reads, writes = ?c.out.writes, "register access");
    c.out
}

struct Classifier<'a, R: RegisterFile + ?Sized> {
    regs: &'a R,
    out: RegAccess,
}

impl<R: RegisterFile + ?Sized> Classifier<'_, R> {
    fn touch(&mut self, reg: u8, access: Access) {
        if access.contains(Access::READ) {
            self.out.reads.insert(reg);
        }
        if access.contains(Access::WRITE) {
            self.out.writes.insert(reg);
        }
    }

    /// Resolve a register byte; %E0..%EF go through RP.
    fn resolve(&mut self, byte: u8) -> u8 {
        if byte & 0xF0 == 0xE0 {
            self.working(byte & 0x0F)
        } else {
            byte
        }
    }

    fn working(&mut self, n: u8) -> u8 {
        self.out.reads.insert(REG_RP);
        self.regs.working(n)
    }

    /// Register a pointer operand names, after reading the pointer itself.
    fn deref(&mut self, ptr: u8) -> u8 {
        self.out.reads.insert(ptr);
        self.regs.reg(ptr)
    }

    fn indirect(&mut self, ptr: u8, access: Access) {
        let target = self.deref(ptr);
        let target = self.resolve(target);
        self.touch(target, access);
    }

    fn pair(&mut self, base: u8, access: Access) {
        let base = base & 0xFE;
        self.touch(base, access);
        self.touch(base | 1, access);
    }

    fn operand(&mut self, o: &Operand, access: Access) {
        match *o {
            Operand::R(n) => {
                let r = self.working(n);
                self.touch(r, access);
            }
            Operand::Reg(b) => {
                let r = self.resolve(b);
                self.touch(r, access);
            }
            Operand::IndR(n) => {
                let ptr = self.working(n);
                self.indirect(ptr, access);
            }
            Operand::IndReg(b) => {
                let ptr = self.resolve(b);
                self.indirect(ptr, access);
            }
            Operand::RR(n) => {
                let r = self.working(n);
                self.pair(r, access);
            }
            Operand::RegPair(b) => {
                let r = self.resolve(b);
                self.pair(r, access);
            }
            // memory pointers (LDC/LDE, JP/CALL @): only the pair is read
            Operand::IndRR(n) => {
                let r = self.working(n);
                self.pair(r, Access::READ);
            }
            Operand::IndRegPair(b) => {
                let r = self.resolve(b);
                self.pair(r, Access::READ);
            }
            Operand::Indexed { offset, r } => {
                let base = self.working(r);
                let target = self.deref(base).wrapping_add(offset);
                let target = self.resolve(target);
                self.touch(target, access);
            }
            Operand::Imm(_) | Operand::Cond(_) | Operand::Addr(_) | Operand::Byte(_) => {}
        }
    }

    /// Stack traffic: `pushes` bytes pushed, or popped if negative.
    fn stack(&mut self, pushes: i8) {
        let rw = Access::READ | Access::WRITE;
        self.touch(REG_SPL, rw);
        let internal = self.regs.internal_stack();
        if !internal {
            self.touch(REG_SPH, rw);
            return;
        }
        let sp = self.regs.reg(REG_SPL);
        if pushes > 0 {
            for i in 1..=pushes as u8 {
                self.touch(sp.wrapping_sub(i), Access::WRITE);
            }
        } else {
            for i in 0..pushes.unsigned_abs() {
                self.touch(sp.wrapping_add(i), Access::READ);
            }
        }
    }

    fn instruction(&mut self, d: &Decoded) {
        let Op::Insn(m) = d.op else { return };
        use Mnemonic::*;

        match m {
            Ldci | Ldei => self.auto_increment(&d.operands),
            Decw | Incw => self.word_operand(&d.operands, m.role(0)),
            _ => {
                for (i, o) in d.operands.iter().enumerate() {
                    self.operand(o, m.role(i));
                }
            }
        }

        let rw = Access::READ | Access::WRITE;
        match m {
            Add | Sub | Or | And | Xor | Cp | Tcm | Tm | Dec | Inc | Com | Rl | Rr | Sra | Swap
            | Decw | Incw | Rcf | Scf => self.touch(REG_FLAGS, Access::WRITE),
            Adc | Sbc | Rlc | Rrc | Da | Ccf => self.touch(REG_FLAGS, rw),
            Jr | Jp if matches!(d.operands.first(), Some(Operand::Cond(_))) => {
                self.touch(REG_FLAGS, Access::READ)
            }
            Srp => self.touch(REG_RP, Access::WRITE),
            Di | Ei => self.touch(REG_IMR, Access::WRITE),
            _ => {}
        }
        match m {
            Push => self.stack(1),
            Pop => self.stack(-1),
            Call => self.stack(2),
            Ret => self.stack(-2),
            Iret => {
                self.stack(-3);
                self.touch(REG_FLAGS, Access::WRITE);
                self.touch(REG_IMR, Access::WRITE);
            }
            _ => {}
        }
    }

    /// DECW/INCW: an indirect operand names a whole pair.
    fn word_operand(&mut self, ops: &[Operand], access: Access) {
        let ptr = match ops.first() {
            Some(&Operand::IndR(n)) => self.working(n),
            Some(&Operand::IndReg(b)) => self.resolve(b),
            Some(o) => {
                self.operand(o, access);
                return;
            }
            None => return,
        };
        let target = self.deref(ptr);
        let target = self.resolve(target);
        self.pair(target, access);
    }

    /// LDCI/LDEI: `@r` is accessed and both pointers are post-incremented.
    fn auto_increment(&mut self, ops: &[Operand]) {
        let rw = Access::READ | Access::WRITE;
        for (i, o) in ops.iter().enumerate() {
            match *o {
                Operand::IndR(n) => {
                    let ptr = self.working(n);
                    self.indirect(ptr, if i == 0 { Access::WRITE } else { Access::READ });
                    self.touch(ptr, rw);
                }
                Operand::IndRR(n) => {
                    let r = self.working(n);
                    self.pair(r, rw);
                }
                _ => {}
            }
        }
    }
}
