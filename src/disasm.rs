use std::collections::HashMap;
use std::fmt::Write as _;

use bitvec::prelude::*;
use tracing::debug;

use crate::decoder::{Decoded, Decoder, Op};
use crate::error::{Error, Result};
use crate::instructions::{is_reserved_word, Operand, CONTROL_REGS};
use crate::isa::z8::Z8Decoder;
use crate::memory::MemoryView;

const MNEMONIC_COL: usize = 20;

/// Register byte as written in source: control register name or `%hh`.
pub fn fmt_reg(r: u8) -> String {
    if r >= 0xF0 {
        CONTROL_REGS[(r - 0xF0) as usize].to_string()
    } else {
        fmt_byte(r)
    }
}

fn fmt_byte(v: u8) -> String {
    if v <= 9 { format!("%{v}") } else { format!("%{v:02X}") }
}

pub fn fmt_operand(o: &Operand) -> String {
    match *o {
        Operand::R(n) => format!("R{n}"),
        Operand::IndR(n) => format!("@R{n}"),
        Operand::RR(n) => format!("RR{n}"),
        Operand::IndRR(n) => format!("@RR{n}"),
        Operand::Reg(r) | Operand::RegPair(r) => fmt_reg(r),
        Operand::IndReg(r) | Operand::IndRegPair(r) => format!("@{}", fmt_reg(r)),
        Operand::Indexed { offset, r } => format!("{}(R{r})", offset as i8),
        Operand::Imm(v) => if v <= 9 { format!("#{v}") } else { format!("#%{v:02X}") },
        Operand::Cond(c) => c.name().to_string(),
        Operand::Addr(a) => format!("%{a:04X}"),
        Operand::Byte(b) => format!("%{b:02X}"),
    }
}

fn mnemonic_text(d: &Decoded) -> &'static str {
    match d.op {
        Op::Insn(m) => m.name(),
        Op::Vector => ".DW",
        Op::Unknown => ".DB",
    }
}

/// `MNEMONIC operands` with operands aligned 8 columns after the mnemonic.
pub fn fmt_decoded(d: &Decoded) -> String {
    fmt_with(d, |o| fmt_operand(o))
}

fn fmt_with(d: &Decoded, mut operand: impl FnMut(&Operand) -> String) -> String {
    let mut s = mnemonic_text(d).to_string();
    if !d.operands.is_empty() {
        pad_to(&mut s, 8);
        let args: Vec<String> = d.operands.iter().map(&mut operand).collect();
        s.push_str(&args.join(", "));
    }
    if d.op == Op::Unknown {
        s.push_str("\t;???");
    }
    s
}

fn pad_to(s: &mut String, col: usize) {
    let len = s.chars().count();
    if len < col {
        s.extend(std::iter::repeat(' ').take(col - len));
    } else {
        s.push(' ');
    }
}

/// Line-oriented disassembler over a memory view.
pub struct Reassembler<'a, M: MemoryView + ?Sized> {
    mem: &'a M,
    dec: Z8Decoder,
}

impl<'a, M: MemoryView + ?Sized> Reassembler<'a, M> {
    pub fn new(mem: &'a M) -> Self {
        Self { mem, dec: Z8Decoder::new() }
    }

    pub fn with_decoder(mem: &'a M, dec: Z8Decoder) -> Self {
        Self { mem, dec }
    }

    pub fn decode(&self, addr: u16) -> Decoded {
        self.dec.decode(self.mem, addr)
    }

    /// One listing line and the address of the next instruction.
    pub fn reassemble_one(&self, addr: u16) -> (String, u16) {
        let d = self.decode(addr);
        let mut line = format!("%{addr:04X}   ");
        let bytes: Vec<String> = d.bytes.iter().map(|b| format!("{b:02X}")).collect();
        line.push_str(&bytes.join(" "));
        pad_to(&mut line, MNEMONIC_COL);
        line.push_str(&fmt_decoded(&d));
        (line, d.next_addr())
    }

    /// Listing of every instruction starting in `beg..=end`.
    pub fn reassemble(&self, beg: u16, end: u16) -> String {
        let mut out = String::new();
        let mut addr = beg as u32;
        while addr <= end as u32 {
            let (line, next) = self.reassemble_one(addr as u16);
            out.push_str(&line);
            out.push('\n');
            addr += next.wrapping_sub(addr as u16) as u32;
        }
        out
    }

    /// Assembler source for `beg..=end` with synthesised labels at jump
    /// targets. The label prefix must make valid, non-reserved labels.
    pub fn reassemble_to_source(&self, beg: u16, end: u16, prefix: &str) -> Result<String> {
        check_label_prefix(prefix)?;

        let mut insns = Vec::new();
        let mut starts = bitarr![0; 0x10000];
        let mut targets = bitarr![0; 0x10000];
        let mut addr = beg as u32;
        while addr <= end as u32 {
            let d = self.decode(addr as u16);
            starts.set(addr as usize, true);
            if let Some(t) = d.target() {
                targets.set(t as usize, true);
            }
            addr += d.len() as u32;
            insns.push(d);
        }

        let mut labels: HashMap<u16, String> = HashMap::new();
        for t in targets.iter_ones() {
            if t >= beg as usize && t <= end as usize && starts[t] {
                labels.insert(t as u16, format!("{prefix}{}", labels.len() + 1));
            }
        }
        debug!(insns = insns.len(), labels = labels.len(), "reassembled to source");

        let mut out = String::new();
        let _ = writeln!(out, "\t.ORG\t%{beg:04X}\n");
        for d in &insns {
            if let Some(label) = labels.get(&d.addr) {
                out.push_str(label);
                out.push(':');
                if label.len() > 6 {
                    out.push('\n');
                }
            }
            let text = fmt_with(d, |o| match *o {
                Operand::Addr(a) if d.target().is_some() => {
                    labels.get(&a).cloned().unwrap_or_else(|| fmt_operand(o))
                }
                _ => fmt_operand(o),
            });
            out.push('\t');
            out.push_str(&text);
            if let Some(t) = d.target() {
                if t >= beg && t <= end && !starts[t as usize] {
                    out.push_str("\t;!!!");
                }
            }
            out.push('\n');
        }
        Ok(out)
    }
}

fn check_label_prefix(prefix: &str) -> Result<()> {
    let mut chars = prefix.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::InvalidLabel(prefix.to_string()));
    }
    // "R1" or "RR2" would read as a register
    for n in 1..=2 {
        let sample = format!("{prefix}{n}");
        if is_reserved_word(&sample) {
            return Err(Error::ReservedWord(sample));
        }
    }
    Ok(())
}
