use crate::error::{Error, Result};
use crate::instructions::{Class, Mnemonic, Operand, ALWAYS};

use Operand::*;

/// Encode one instruction placed at `addr`. Pure: range checks on values
/// were done by whoever built the operands, only shape and relative
/// distance are checked here.
pub fn encode(addr: u16, op: Mnemonic, ops: &[Operand]) -> Result<Vec<u8>> {
    match (op.desc().class, ops) {
        (Class::Implied(opc), []) => Ok(vec![opc]),
        (Class::Alu(base), [dst, src]) => alu(base, dst, src),
        (Class::Unary(base), [o]) => unary(base, o),
        (Class::Word(base), [o]) => word(base, o),
        (Class::External(base), [dst, src]) => external(base, dst, src),
        (Class::ExternalInc(base), [dst, src]) => external_inc(base, dst, src),
        (Class::Special, _) => special(addr, op, ops),
        _ => Err(Error::InvalidOperands),
    }
}

/// Single register, direct: `Rn` or absolute.
fn direct(o: &Operand) -> Option<u8> {
    match *o {
        R(n) => Some(0xE0 | n),
        Reg(r) => Some(r),
        _ => None,
    }
}

/// Single register, indirect: `@Rn` or `@reg`.
fn indirect(o: &Operand) -> Option<u8> {
    match *o {
        IndR(n) => Some(0xE0 | n),
        IndReg(r) => Some(r),
        _ => None,
    }
}

/// Pair in a word operation; a single register names the pair it starts.
fn pair(o: &Operand) -> Option<u8> {
    match *o {
        RR(n) | R(n) => Some(0xE0 | n),
        RegPair(r) | Reg(r) => Some(r),
        _ => None,
    }
}

fn indirect_pair(o: &Operand) -> Option<u8> {
    match *o {
        IndRR(n) | IndR(n) => Some(0xE0 | n),
        IndRegPair(r) | IndReg(r) => Some(r),
        _ => None,
    }
}

fn nibbles(hi: u8, lo: u8) -> u8 {
    ((hi & 0x0F) << 4) | (lo & 0x0F)
}

fn alu(base: u8, dst: &Operand, src: &Operand) -> Result<Vec<u8>> {
    if let Imm(v) = *src {
        if let Some(d) = direct(dst) {
            return Ok(vec![base | 0x06, d, v]);
        }
        if let Some(d) = indirect(dst) {
            return Ok(vec![base | 0x07, d, v]);
        }
        return Err(Error::InvalidOperands);
    }
    match (*dst, *src) {
        (R(d), R(s)) => return Ok(vec![base | 0x02, nibbles(d, s)]),
        (R(d), IndR(s)) => return Ok(vec![base | 0x03, nibbles(d, s)]),
        _ => {}
    }
    let d = direct(dst).ok_or(Error::InvalidOperands)?;
    if let Some(s) = direct(src) {
        Ok(vec![base | 0x04, s, d])
    } else if let Some(s) = indirect(src) {
        Ok(vec![base | 0x05, s, d])
    } else {
        Err(Error::InvalidOperands)
    }
}

fn unary(base: u8, o: &Operand) -> Result<Vec<u8>> {
    if let Some(r) = direct(o) {
        Ok(vec![base, r])
    } else if let Some(r) = indirect(o) {
        Ok(vec![base | 0x01, r])
    } else {
        Err(Error::InvalidOperands)
    }
}

fn word(base: u8, o: &Operand) -> Result<Vec<u8>> {
    if let Some(r) = pair(o) {
        Ok(vec![base, r])
    } else if let Some(r) = indirect(o) {
        Ok(vec![base | 0x01, r])
    } else {
        Err(Error::InvalidOperands)
    }
}

fn external(base: u8, dst: &Operand, src: &Operand) -> Result<Vec<u8>> {
    match (*dst, *src) {
        (R(d), IndRR(s) | IndR(s)) => Ok(vec![base | 0x02, nibbles(d, s)]),
        (IndRR(d) | IndR(d), R(s)) => Ok(vec![base | 0x12, nibbles(s, d)]),
        _ => Err(Error::InvalidOperands),
    }
}

fn external_inc(base: u8, dst: &Operand, src: &Operand) -> Result<Vec<u8>> {
    match (*dst, *src) {
        (IndR(d), IndRR(s)) => Ok(vec![base | 0x03, nibbles(d, s)]),
        (IndRR(d), IndR(s)) => Ok(vec![base | 0x13, nibbles(s, d)]),
        (IndR(_), IndR(_)) => Err(Error::IndirectPairExpected),
        _ => Err(Error::InvalidOperands),
    }
}

/// Displacement from the byte after a two-byte instruction at `addr`.
fn relative(addr: u16, target: u16) -> Result<u8> {
    let dist = target as i32 - (addr as i32 + 2);
    i8::try_from(dist).map(|d| d as u8).map_err(|_| Error::RelativeTooFar)
}

fn special(addr: u16, op: Mnemonic, ops: &[Operand]) -> Result<Vec<u8>> {
    match (op, ops) {
        (Mnemonic::Ld, [dst, src]) => ld(dst, src),
        (Mnemonic::Inc, [R(n)]) => Ok(vec![nibbles(*n, 0x0E)]),
        (Mnemonic::Inc, [o]) => unary(0x20, o),
        (Mnemonic::Jp, [Cond(c), Addr(a)]) => Ok(jump(c.0, 0x0D, *a)),
        (Mnemonic::Jp, [Addr(a)]) => Ok(jump(ALWAYS, 0x0D, *a)),
        (Mnemonic::Jp, [o]) => indirect_pair(o).map(|r| vec![0x30, r]).ok_or(Error::InvalidOperands),
        (Mnemonic::Jr, [Cond(c), Addr(a)]) => Ok(vec![nibbles(c.0, 0x0B), relative(addr, *a)?]),
        (Mnemonic::Jr, [Addr(a)]) => Ok(vec![nibbles(ALWAYS, 0x0B), relative(addr, *a)?]),
        (Mnemonic::Call, [Addr(a)]) => Ok(vec![0xD6, (a >> 8) as u8, *a as u8]),
        (Mnemonic::Call, [o]) => indirect_pair(o).map(|r| vec![0xD4, r]).ok_or(Error::InvalidOperands),
        (Mnemonic::Djnz, [R(n), Addr(a)]) => Ok(vec![nibbles(*n, 0x0A), relative(addr, *a)?]),
        (Mnemonic::Djnz, [_, Addr(_)]) => Err(Error::WorkingRegExpected),
        (Mnemonic::Srp, [Imm(v)]) => Ok(vec![0x31, *v]),
        _ => Err(Error::InvalidOperands),
    }
}

fn jump(cond: u8, low: u8, target: u16) -> Vec<u8> {
    vec![nibbles(cond, low), (target >> 8) as u8, target as u8]
}

fn ld(dst: &Operand, src: &Operand) -> Result<Vec<u8>> {
    if let Imm(v) = *src {
        return match *dst {
            R(n) => Ok(vec![nibbles(n, 0x0C), v]),
            Reg(r) => Ok(vec![0xE6, r, v]),
            _ => indirect(dst).map(|r| vec![0xE7, r, v]).ok_or(Error::InvalidOperands),
        };
    }
    match (*dst, *src) {
        (R(d), IndR(s)) => return Ok(vec![0xE3, nibbles(d, s)]),
        (R(d), Indexed { offset, r }) => return Ok(vec![0xC7, nibbles(d, r), offset]),
        (R(d), R(s)) => return Ok(vec![nibbles(d, 0x08), 0xE0 | s]),
        (R(d), Reg(s)) => return Ok(vec![nibbles(d, 0x08), s]),
        (IndR(d), R(s)) => return Ok(vec![0xF3, nibbles(d, s)]),
        (Indexed { offset, r }, R(s)) => return Ok(vec![0xD7, nibbles(s, r), offset]),
        (Reg(d), R(s)) => return Ok(vec![nibbles(s, 0x09), d]),
        _ => {}
    }
    if let Some(d) = direct(dst) {
        if let Some(s) = direct(src) {
            return Ok(vec![0xE4, s, d]);
        }
        if let Some(s) = indirect(src) {
            return Ok(vec![0xE5, s, d]);
        }
    }
    if let (Some(d), Some(s)) = (indirect(dst), direct(src)) {
        return Ok(vec![0xF5, s, d]);
    }
    Err(Error::InvalidOperands)
}
