use crate::decoder::{Decoded, Decoder, Op};
use crate::instructions::{self as isa, Mnemonic, Operand, ALWAYS};
use crate::memory::MemoryView;

use Operand::*;

/// Z8 / U88x decoder covering the full opcode map.
pub struct Z8Decoder {
    /// Show %0000..%000B as interrupt vector words
    pub vectors: bool,
}

impl Z8Decoder {
    pub fn new() -> Self {
        Self { vectors: true }
    }

    /// Decoder for code that is known to run, vector table or not.
    pub fn plain() -> Self {
        Self { vectors: false }
    }
}

impl Default for Z8Decoder {
    fn default() -> Self {
        Self::new()
    }
}

// Register bytes %E0..%EF are working registers.
fn reg(b: u8) -> Operand {
    if b & 0xF0 == 0xE0 { R(b & 0x0F) } else { Reg(b) }
}

fn ind(b: u8) -> Operand {
    if b & 0xF0 == 0xE0 { IndR(b & 0x0F) } else { IndReg(b) }
}

fn pair(b: u8) -> Operand {
    if b & 0xF0 == 0xE0 { RR(b & 0x0F) } else { RegPair(b) }
}

fn ind_pair(b: u8) -> Operand {
    if b & 0xF0 == 0xE0 { IndRR(b & 0x0F) } else { IndRegPair(b) }
}

fn hi(b: u8) -> u8 {
    b >> 4
}

fn lo(b: u8) -> u8 {
    b & 0x0F
}

fn cond_prefix(c: u8) -> Vec<Operand> {
    if c == ALWAYS { Vec::new() } else { vec![Operand::Cond(isa::Cond(c))] }
}

const UNARY: [Option<Mnemonic>; 16] = {
    use Mnemonic::*;
    [
        Some(Dec), Some(Rlc), Some(Inc), None, Some(Da), Some(Pop), Some(Com), Some(Push),
        Some(Decw), Some(Rl), Some(Incw), Some(Clr), Some(Rrc), Some(Sra), Some(Rr), Some(Swap),
    ]
};

const ALU: [Option<Mnemonic>; 16] = {
    use Mnemonic::*;
    [
        Some(Add), Some(Adc), Some(Sub), Some(Sbc), Some(Or), Some(And), Some(Tcm), Some(Tm),
        None, None, Some(Cp), Some(Xor), None, None, None, None,
    ]
};

const IMPLIED: [Option<Mnemonic>; 16] = {
    use Mnemonic::*;
    [
        None, None, None, None, Some(Wdh), Some(Wdt), Some(Stop), Some(Halt),
        Some(Di), Some(Ei), Some(Ret), Some(Iret), Some(Rcf), Some(Scf), Some(Ccf), Some(Nop),
    ]
};

/// Lazily fetched operand bytes; `None` once memory runs out.
struct Fetch<'a, M: MemoryView + ?Sized> {
    mem: &'a M,
    addr: u16,
}

impl<M: MemoryView + ?Sized> Fetch<'_, M> {
    fn byte(&self, n: u16) -> Option<u8> {
        self.mem.read_u8(self.addr.wrapping_add(n))
    }

    fn rel(&self, b: u8) -> u16 {
        self.addr.wrapping_add(2).wrapping_add(b as i8 as u16)
    }
}

fn decode_insn<M: MemoryView + ?Sized>(f: &Fetch<'_, M>, b0: u8) -> Option<(Mnemonic, Vec<Operand>, u16)> {
    use Mnemonic::*;
    let (h, l) = (hi(b0), lo(b0));
    let b1 = || f.byte(1);
    let b2 = || f.byte(2);
    let r = match l {
        0x8 => (Ld, vec![R(h), reg(b1()?)], 2),
        0x9 => (Ld, vec![Reg(b1()?), R(h)], 2),
        0xA => (Djnz, vec![R(h), Addr(f.rel(b1()?))], 2),
        0xB => {
            let mut ops = cond_prefix(h);
            ops.push(Addr(f.rel(b1()?)));
            (Jr, ops, 2)
        }
        0xC => (Ld, vec![R(h), Imm(b1()?)], 2),
        0xD => {
            let mut ops = cond_prefix(h);
            ops.push(Addr(u16::from_be_bytes([b1()?, b2()?])));
            (Jp, ops, 3)
        }
        0xE => (Inc, vec![R(h)], 1),
        0xF => (IMPLIED[h as usize]?, Vec::new(), 1),
        0x0 | 0x1 => match b0 {
            0x30 => (Jp, vec![ind_pair(b1()?)], 2),
            0x31 => (Srp, vec![Imm(b1()?)], 2),
            _ => {
                let m = UNARY[h as usize]?;
                let o = match (m, l) {
                    (Decw | Incw, 0) => pair(b1()?),
                    (_, 0) => reg(b1()?),
                    _ => ind(b1()?),
                };
                (m, vec![o], 2)
            }
        },
        _ => match ALU[h as usize] {
            Some(m) => match l {
                0x2 => { let b = b1()?; (m, vec![R(hi(b)), R(lo(b))], 2) }
                0x3 => { let b = b1()?; (m, vec![R(hi(b)), IndR(lo(b))], 2) }
                0x4 => (m, vec![reg(b2()?), reg(b1()?)], 3),
                0x5 => (m, vec![reg(b2()?), ind(b1()?)], 3),
                0x6 => (m, vec![reg(b1()?), Imm(b2()?)], 3),
                _ => (m, vec![ind(b1()?), Imm(b2()?)], 3),
            },
            None => decode_irregular(f, b0)?,
        },
    };
    Some(r)
}

/// Opcodes in the rows without an ALU family (8x, 9x, Cx..Fx, columns 2..7).
fn decode_irregular<M: MemoryView + ?Sized>(f: &Fetch<'_, M>, b0: u8) -> Option<(Mnemonic, Vec<Operand>, u16)> {
    use Mnemonic::*;
    let b1 = f.byte(1)?;
    let (h, l) = (hi(b1), lo(b1));
    let r = match b0 {
        0x82 => (Lde, vec![R(h), IndRR(l)], 2),
        0x83 => (Ldei, vec![IndR(h), IndRR(l)], 2),
        0x92 => (Lde, vec![IndRR(l), R(h)], 2),
        0x93 => (Ldei, vec![IndRR(l), IndR(h)], 2),
        0xC2 => (Ldc, vec![R(h), IndRR(l)], 2),
        0xC3 => (Ldci, vec![IndR(h), IndRR(l)], 2),
        0xD2 => (Ldc, vec![IndRR(l), R(h)], 2),
        0xD3 => (Ldci, vec![IndRR(l), IndR(h)], 2),
        0xC7 => (Ld, vec![R(h), Indexed { offset: f.byte(2)?, r: l }], 3),
        0xD7 => (Ld, vec![Indexed { offset: f.byte(2)?, r: l }, R(h)], 3),
        0xD4 => (Call, vec![ind_pair(b1)], 2),
        0xD6 => (Call, vec![Addr(u16::from_be_bytes([b1, f.byte(2)?]))], 3),
        0xE3 => (Ld, vec![R(h), IndR(l)], 2),
        0xF3 => (Ld, vec![IndR(h), R(l)], 2),
        0xE4 => (Ld, vec![reg(f.byte(2)?), reg(b1)], 3),
        0xE5 => (Ld, vec![reg(f.byte(2)?), ind(b1)], 3),
        0xE6 => (Ld, vec![reg(b1), Imm(f.byte(2)?)], 3),
        0xE7 => (Ld, vec![ind(b1), Imm(f.byte(2)?)], 3),
        0xF5 => (Ld, vec![ind(f.byte(2)?), reg(b1)], 3),
        _ => return None,
    };
    Some(r)
}

impl Decoder for Z8Decoder {
    fn decode<M: MemoryView + ?Sized>(&self, mem: &M, addr: u16) -> Decoded {
        let Some(b0) = mem.read_u8(addr) else {
            return Decoded::unknown(addr, None);
        };
        if self.vectors && addr < 0x000C && addr % 2 == 0 {
            if let Some(w) = mem.read_u16(addr) {
                return Decoded {
                    addr,
                    bytes: w.to_be_bytes().to_vec(),
                    op: Op::Vector,
                    operands: vec![Addr(w)],
                };
            }
        }
        let f = Fetch { mem, addr };
        match decode_insn(&f, b0) {
            Some((m, operands, len)) => Decoded {
                addr,
                bytes: (0..len).filter_map(|i| f.byte(i)).collect(),
                op: Op::Insn(m),
                operands,
            },
            None => Decoded::unknown(addr, Some(b0)),
        }
    }
}
