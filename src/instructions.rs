use bitflags::bitflags;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mnemonic {
    Adc, Add, And, Call, Ccf, Clr, Com, Cp, Da, Dec, Decw, Di, Djnz, Ei, Halt, Inc,
    Incw, Iret, Jp, Jr, Ld, Ldc, Ldci, Lde, Ldei, Nop, Or, Pop, Push, Rcf, Ret, Rl,
    Rlc, Rr, Rrc, Sbc, Scf, Sra, Srp, Stop, Sub, Swap, Tcm, Tm, Wdh, Wdt, Xor,
}

/// Encoding family of a mnemonic; the byte is the opcode (or base opcode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    /// Two-operand ALU op, opcode = base | 2..7
    Alu(u8),
    /// One register operand, opcode = base (R) or base+1 (@R)
    Unary(u8),
    /// Register pair operand, opcode = base (RR) or base+1 (@R)
    Word(u8),
    /// No operand
    Implied(u8),
    /// LDC/LDE, base is %C0 or %80
    External(u8),
    /// LDCI/LDEI
    ExternalInc(u8),
    /// Irregular encodings handled one by one
    Special,
}

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Access: u8 {
const READ = 1 << 0;
const WRITE = 1 << 1;
}
}

#[derive(Debug, Clone, Copy)]
pub struct InstrDesc {
    pub op: Mnemonic,
    pub mnemonic: &'static str,
    pub class: Class,
    /// Access role of each explicit operand, destination first.
    pub roles: &'static [Access],
}

const R: Access = Access::READ;
const W: Access = Access::WRITE;
const RW: Access = Access::READ.union(Access::WRITE);
const NONE: Access = Access::empty();

const fn d(op: Mnemonic, mnemonic: &'static str, class: Class, roles: &'static [Access]) -> InstrDesc {
    InstrDesc { op, mnemonic, class, roles }
}

pub const TABLE: &[InstrDesc] = &[
    d(Mnemonic::Adc, "ADC", Class::Alu(0x10), &[RW, R]),
    d(Mnemonic::Add, "ADD", Class::Alu(0x00), &[RW, R]),
    d(Mnemonic::And, "AND", Class::Alu(0x50), &[RW, R]),
    d(Mnemonic::Call, "CALL", Class::Special, &[R]),
    d(Mnemonic::Ccf, "CCF", Class::Implied(0xEF), &[]),
    d(Mnemonic::Clr, "CLR", Class::Unary(0xB0), &[W]),
    d(Mnemonic::Com, "COM", Class::Unary(0x60), &[RW]),
    d(Mnemonic::Cp, "CP", Class::Alu(0xA0), &[R, R]),
    d(Mnemonic::Da, "DA", Class::Unary(0x40), &[RW]),
    d(Mnemonic::Dec, "DEC", Class::Unary(0x00), &[RW]),
    d(Mnemonic::Decw, "DECW", Class::Word(0x80), &[RW]),
    d(Mnemonic::Di, "DI", Class::Implied(0x8F), &[]),
    d(Mnemonic::Djnz, "DJNZ", Class::Special, &[RW, NONE]),
    d(Mnemonic::Ei, "EI", Class::Implied(0x9F), &[]),
    d(Mnemonic::Halt, "HALT", Class::Implied(0x7F), &[]),
    d(Mnemonic::Inc, "INC", Class::Special, &[RW]),
    d(Mnemonic::Incw, "INCW", Class::Word(0xA0), &[RW]),
    d(Mnemonic::Iret, "IRET", Class::Implied(0xBF), &[]),
    d(Mnemonic::Jp, "JP", Class::Special, &[R, NONE]),
    d(Mnemonic::Jr, "JR", Class::Special, &[NONE, NONE]),
    d(Mnemonic::Ld, "LD", Class::Special, &[W, R]),
    d(Mnemonic::Ldc, "LDC", Class::External(0xC0), &[W, R]),
    d(Mnemonic::Ldci, "LDCI", Class::ExternalInc(0xC0), &[W, R]),
    d(Mnemonic::Lde, "LDE", Class::External(0x80), &[W, R]),
    d(Mnemonic::Ldei, "LDEI", Class::ExternalInc(0x80), &[W, R]),
    d(Mnemonic::Nop, "NOP", Class::Implied(0xFF), &[]),
    d(Mnemonic::Or, "OR", Class::Alu(0x40), &[RW, R]),
    d(Mnemonic::Pop, "POP", Class::Unary(0x50), &[W]),
    d(Mnemonic::Push, "PUSH", Class::Unary(0x70), &[R]),
    d(Mnemonic::Rcf, "RCF", Class::Implied(0xCF), &[]),
    d(Mnemonic::Ret, "RET", Class::Implied(0xAF), &[]),
    d(Mnemonic::Rl, "RL", Class::Unary(0x90), &[RW]),
    d(Mnemonic::Rlc, "RLC", Class::Unary(0x10), &[RW]),
    d(Mnemonic::Rr, "RR", Class::Unary(0xE0), &[RW]),
    d(Mnemonic::Rrc, "RRC", Class::Unary(0xC0), &[RW]),
    d(Mnemonic::Sbc, "SBC", Class::Alu(0x30), &[RW, R]),
    d(Mnemonic::Scf, "SCF", Class::Implied(0xDF), &[]),
    d(Mnemonic::Sra, "SRA", Class::Unary(0xD0), &[RW]),
    d(Mnemonic::Srp, "SRP", Class::Special, &[NONE]),
    d(Mnemonic::Stop, "STOP", Class::Implied(0x6F), &[]),
    d(Mnemonic::Sub, "SUB", Class::Alu(0x20), &[RW, R]),
    d(Mnemonic::Swap, "SWAP", Class::Unary(0xF0), &[RW]),
    d(Mnemonic::Tcm, "TCM", Class::Alu(0x60), &[R, R]),
    d(Mnemonic::Tm, "TM", Class::Alu(0x70), &[R, R]),
    d(Mnemonic::Wdh, "WDH", Class::Implied(0x4F), &[]),
    d(Mnemonic::Wdt, "WDT", Class::Implied(0x5F), &[]),
    d(Mnemonic::Xor, "XOR", Class::Alu(0xB0), &[RW, R]),
];

impl Mnemonic {
    pub fn desc(self) -> &'static InstrDesc {
        // TABLE is in declaration order of the enum
        &TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.desc().mnemonic
    }

    pub fn from_name(name: &str) -> Option<Mnemonic> {
        TABLE
            .iter()
            .find(|d| d.mnemonic.eq_ignore_ascii_case(name))
            .map(|d| d.op)
    }

    pub fn role(self, index: usize) -> Access {
        self.desc().roles.get(index).copied().unwrap_or(Access::empty())
    }
}

/// Condition code as stored in the high nibble of JR/JP. 8 means "always".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cond(pub u8);

pub const ALWAYS: u8 = 0x8;

const COND_ALIASES: &[(&str, u8)] = &[
    ("C", 0x7), ("EQ", 0x6), ("F", 0x0), ("GE", 0x9), ("GT", 0xA), ("LE", 0x2),
    ("LT", 0x1), ("MI", 0x5), ("NC", 0xF), ("NE", 0xE), ("NOV", 0xC), ("NZ", 0xE),
    ("OV", 0x4), ("PL", 0xD), ("UGE", 0xF), ("UGT", 0xB), ("ULE", 0x3), ("ULT", 0x7),
    ("Z", 0x6),
];

const COND_NAMES: [&str; 16] = [
    "F", "LT", "LE", "ULE", "OV", "MI", "Z", "C", "", "GE", "GT", "UGT", "NOV", "PL", "NZ", "NC",
];

impl Cond {
    pub fn from_name(name: &str) -> Option<Cond> {
        COND_ALIASES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, c)| Cond(c))
    }

    /// Canonical spelling; every alias of a code decodes to this one.
    pub fn name(self) -> &'static str {
        COND_NAMES[(self.0 & 0xF) as usize]
    }

    pub fn aliases() -> impl Iterator<Item = &'static str> {
        COND_ALIASES.iter().map(|&(n, _)| n)
    }
}

/// Names of the control registers %F0..%FF.
pub const CONTROL_REGS: [&str; 16] = [
    "SIO", "TMR", "T1", "PRE1", "T0", "PRE0", "P2M", "P3M", "P01M", "IPR", "IRQ", "IMR",
    "FLAGS", "RP", "SPH", "SPL",
];

pub const REG_P01M: u8 = 0xF8;
pub const REG_IMR: u8 = 0xFB;
pub const REG_FLAGS: u8 = 0xFC;
pub const REG_RP: u8 = 0xFD;
pub const REG_SPH: u8 = 0xFE;
pub const REG_SPL: u8 = 0xFF;

/// Registers that read back garbage: PRE1, PRE0, P2M, P3M, P01M, IPR.
pub fn is_write_only(reg: u8) -> bool {
    reg == 0xF3 || (0xF5..=0xF9).contains(&reg)
}

/// Absolute register number for a register name (`FLAGS`, `P2`, ...).
pub fn control_reg(name: &str) -> Option<u8> {
    if let Some(i) = CONTROL_REGS.iter().position(|n| n.eq_ignore_ascii_case(name)) {
        return Some(0xF0 + i as u8);
    }
    match name.to_ascii_uppercase().as_str() {
        "P0" => Some(0),
        "P1" => Some(1),
        "P2" => Some(2),
        "P3" => Some(3),
        _ => None,
    }
}

/// Anything the assembler treats as a register in operand position.
pub fn is_register_name(name: &str) -> bool {
    if control_reg(name).is_some() || name.eq_ignore_ascii_case("SP") {
        return true;
    }
    let upper = name.to_ascii_uppercase();
    let num = |s: &str| s.parse::<u8>().ok().filter(|_| !s.starts_with('0') || s == "0");
    if let Some(n) = upper.strip_prefix("RR").and_then(num) {
        return n < 16 && n % 2 == 0;
    }
    matches!(upper.strip_prefix('R').and_then(num), Some(n) if n < 16)
}

/// Operand of a decoded (or to-be-encoded) instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    /// Working register `Rn`
    R(u8),
    /// `@Rn`
    IndR(u8),
    /// Working register pair `RRn`
    RR(u8),
    /// `@RRn`
    IndRR(u8),
    /// Absolute register
    Reg(u8),
    /// `@reg`
    IndReg(u8),
    /// Absolute register pair
    RegPair(u8),
    /// `@reg` naming a pair (JP/CALL)
    IndRegPair(u8),
    /// `offset(Rn)`
    Indexed { offset: u8, r: u8 },
    Imm(u8),
    Cond(Cond),
    Addr(u16),
    /// Raw data byte of an undecodable opcode
    Byte(u8),
}

/// Words a label may not be named after.
pub fn is_reserved_word(name: &str) -> bool {
    const WORDS: &[&str] = &[
        "HIGH", "HI", "LOW", "LO", "AND", "OR", "XOR", "NOT", "MOD", "SHL", "SHR", "LAND",
        "LOR", "LXOR", "LNOT",
    ];
    Cond::from_name(name).is_some()
        || WORDS.iter().any(|w| w.eq_ignore_ascii_case(name))
        || is_register_name(name)
}
