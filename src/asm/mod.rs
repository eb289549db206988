//! Two-pass Z8 assembler.
//!
//! Pass 1 lays the program out: labels get their addresses and every line
//! records how far it moves the location counter. Forward references are
//! tolerated there and evaluate to placeholders. Pass 2 runs only on a
//! clean pass 1, evaluates everything strictly and emits the bytes.

pub mod expr;
pub mod operand;
pub mod options;
pub mod symbols;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cpu::{default_register_check, CpuVariant, WATCHDOG_NOT_PORTABLE};
use crate::diagnostic::Diagnostic;
use crate::encoder::encode;
use crate::error::{Error, Result};
use crate::instructions::{is_write_only, Access, Class, Mnemonic, Operand, REG_SPH};
use crate::scanner::Cursor;

use self::operand::{parse_args, Arg};
use self::symbols::{Scope, SymbolTable, SymbolValue};

pub use self::options::{AsmOptions, EmbedRules};

/// Assembly stops once this many errors have been reported.
pub const MAX_ERRORS: usize = 100;

/// Where a source line landed in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineInfo {
    pub line: usize,
    pub addr: u16,
    pub len: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssembleResult {
    /// Only present if no error was reported
    pub bytes: Option<Vec<u8>>,
    pub begin_addr: Option<u16>,
    pub entry_addr: Option<u16>,
    pub title: Option<String>,
    pub symbols: BTreeMap<String, u16>,
    pub lines: Vec<LineInfo>,
    pub diagnostics: Vec<Diagnostic>,
    pub aborted: bool,
}

impl AssembleResult {
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| !d.is_error()).count()
    }
}

/// Assemble `source`. `cpu_name` takes precedence over `options.cpu`.
///
/// Problems in the source end up in `diagnostics`; `Err` is reserved for
/// the assembler contradicting itself between the passes.
pub fn assemble(source: &str, cpu_name: Option<&str>, options: &AsmOptions) -> Result<AssembleResult> {
    let mut asm = Assembler::new(options);
    if let Some(name) = cpu_name.or(options.cpu.as_deref()) {
        match CpuVariant::resolve(name) {
            Ok(cpu) => asm.preset_cpu = Some(cpu),
            Err(e) => asm.error(e),
        }
    }
    asm.run(source)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Align,
    Cpu,
    Db,
    /// Reserve space, element size in bytes
    Ds(u32),
    Dw,
    End,
    Ent,
    Equ,
    ErrorMsg,
    Even,
    Ignored,
    Org,
    Title,
    WarningMsg,
    WarnOn,
    WarnOff,
    If(bool),
    IfDef(bool),
    ElseIf,
    Else,
    EndIf,
}

impl Directive {
    fn from_name(word: &str) -> Option<Directive> {
        use Directive::*;
        let dollar = word.starts_with('$');
        let name = word.strip_prefix(['.', '$']).unwrap_or(word).to_ascii_uppercase();
        Some(match name.as_str() {
            "IF" | "IFTRUE" => If(true),
            "IFFALSE" => If(false),
            "IFDEF" => IfDef(true),
            "IFNDEF" => IfDef(false),
            "ELSEIF" => ElseIf,
            "ELSE" => Else,
            "ENDIF" | "FI" => EndIf,
            "ASSUME" | "GLOBALS" | "LISTING" | "LISTOFF" | "LISTON" | "NEWPAGE" | "PAGE" => Ignored,
            "EVEN" => Even,
            _ if dollar => return None,
            "ALIGN" => Align,
            "CPU" => Cpu,
            "DB" | "DB.B" | "DEFB" | "BYTE" => Db,
            "DS" | "DS.B" | "DEFS" => Ds(1),
            "DS.W" => Ds(2),
            "DW" | "DB.W" | "DEFW" | "WORD" => Dw,
            "END" => End,
            "ENT" | "ENTRY" => Ent,
            "EQU" | "EQUAL" => Equ,
            "ERROR" => ErrorMsg,
            "ORG" | "ORIGIN" => Org,
            "TITLE" => Title,
            "WARNING" => WarningMsg,
            "WARNON" => WarnOn,
            "WARNOFF" => WarnOff,
            _ => return None,
        })
    }

    fn is_conditional(self) -> bool {
        use Directive::*;
        matches!(self, If(_) | IfDef(_) | ElseIf | Else | EndIf)
    }
}

#[derive(Debug, Clone, Copy)]
struct CondFrame {
    parent_active: bool,
    active: bool,
    /// Some branch of this IF was already assembled
    taken: bool,
    pos: Option<(usize, usize)>,
}

struct Assembler<'o> {
    options: &'o AsmOptions,
    preset_cpu: Option<CpuVariant>,
    cpu: Option<CpuVariant>,
    symbols: SymbolTable,
    pass: u8,
    /// Location counter; may run one past %FFFF
    addr: u32,
    /// Location counter at the start of the current statement (`$`)
    origin: u16,
    overflowed: bool,
    ended: bool,
    emitted: bool,
    conds: Vec<CondFrame>,
    warn_enabled: bool,
    title: Option<String>,
    entry: Option<u16>,
    code: Vec<u8>,
    begin: Option<u16>,
    /// Pass-1 advance of every line
    layout: Vec<u32>,
    lines: Vec<LineInfo>,
    diagnostics: Vec<Diagnostic>,
    errors: usize,
    /// Line number and byte offset of the current line
    pos: Option<(usize, usize)>,
}

impl<'o> Assembler<'o> {
    fn new(options: &'o AsmOptions) -> Self {
        let mut asm = Self {
            options,
            preset_cpu: None,
            cpu: None,
            symbols: SymbolTable::new(options.labels_ignore_case),
            pass: 0,
            addr: 0,
            origin: 0,
            overflowed: false,
            ended: false,
            emitted: false,
            conds: Vec::new(),
            warn_enabled: true,
            title: None,
            entry: None,
            code: Vec::new(),
            begin: None,
            layout: Vec::new(),
            lines: Vec::new(),
            diagnostics: Vec::new(),
            errors: 0,
            pos: None,
        };
        for (name, &value) in &options.predefined_labels {
            if let Err(e) = asm.symbols.define(name, SymbolValue::Known(value)) {
                asm.error(e);
            }
        }
        asm
    }

    fn run(mut self, source: &str) -> Result<AssembleResult> {
        let lines = split_lines(source);
        let mut aborted = false;
        for pass in 1..=2 {
            if pass == 2 && self.errors > 0 {
                break;
            }
            self.start_pass(pass);
            aborted = self.run_pass(&lines)?;
            if aborted {
                break;
            }
            if pass == 1 {
                let open = self.symbols.resolve_pending();
                debug!(open, "forward EQU resolution");
            }
            debug!(pass, errors = self.errors, symbols = self.symbols.len(), end = self.addr, "pass finished");
        }

        if !aborted && self.pass == 2 && self.errors == 0 {
            if let Some(rules) = self.options.embed {
                self.check_embed(rules);
            }
        }

        let ok = !aborted && self.pass == 2 && self.errors == 0;
        Ok(AssembleResult {
            bytes: ok.then_some(self.code),
            begin_addr: self.begin,
            entry_addr: self.entry,
            title: self.title,
            symbols: self.symbols.known(),
            lines: self.lines,
            diagnostics: self.diagnostics,
            aborted,
        })
    }

    fn start_pass(&mut self, pass: u8) {
        self.pass = pass;
        self.addr = 0;
        self.overflowed = false;
        self.ended = false;
        self.conds.clear();
        self.warn_enabled = true;
        self.cpu = self.preset_cpu;
        self.symbols.start_pass();
        for name in self.options.predefined_labels.keys() {
            self.symbols.mark_seen(name);
        }
    }

    /// Returns `true` if the pass was aborted for too many errors.
    fn run_pass(&mut self, lines: &[(usize, &str)]) -> Result<bool> {
        for (idx, &(offset, text)) in lines.iter().enumerate() {
            if self.ended {
                break;
            }
            let line = idx + 1;
            self.pos = Some((line, offset));
            let start = self.addr;
            self.origin = start as u16;
            self.emitted = false;
            let errors_before = self.errors;

            if let Err(e) = self.statement(text) {
                self.error(e);
            }

            let advance = self.addr - start;
            if self.pass == 1 {
                self.layout.push(advance);
            } else {
                let planned = self.layout.get(idx).copied().unwrap_or(0);
                if self.errors > errors_before {
                    self.addr = start + planned;
                } else if advance != planned {
                    warn!(line, pass1 = planned, pass2 = advance, "pass mismatch");
                    return Err(Error::PassMismatch { line, pass1: planned, pass2: advance });
                } else if self.emitted {
                    self.lines.push(LineInfo { line, addr: start as u16, len: advance as u16 });
                }
            }

            if self.errors >= MAX_ERRORS {
                warn!(line, "too many errors, aborting");
                self.diagnostics.push(Diagnostic::error(Error::TooManyErrors.to_string()));
                return Ok(true);
            }
        }
        for frame in std::mem::take(&mut self.conds) {
            self.pos = frame.pos;
            self.error(Error::Directive("IF without ENDIF".into()));
        }
        self.pos = None;
        Ok(false)
    }

    fn report(&mut self, mut d: Diagnostic) {
        if let Some((line, offset)) = self.pos {
            d = d.at(line, offset);
        }
        if d.is_error() {
            if self.errors >= MAX_ERRORS {
                return;
            }
            self.errors += 1;
        }
        self.diagnostics.push(d);
    }

    fn error(&mut self, e: Error) {
        self.report(Diagnostic::error(e.to_string()));
    }

    /// Warnings are only collected in pass 2 so each is reported once.
    fn warning(&mut self, msg: impl Into<String>) {
        if self.pass == 2 && self.warn_enabled {
            self.report(Diagnostic::warning(msg));
        }
    }

    fn active(&self) -> bool {
        self.conds.last().map_or(true, |f| f.active)
    }

    fn scope(&self, strict: bool) -> Scope<'_> {
        Scope { table: &self.symbols, here: self.origin, strict }
    }

    /// Expression that may still be unknown in pass 1.
    fn value(&self, cur: &mut Cursor<'_>) -> Result<Option<u16>> {
        expr::parse(cur)?.eval(&self.scope(self.pass == 2))
    }

    /// Expression that must be known in both passes (ORG, DS, IF ...).
    fn known(&self, cur: &mut Cursor<'_>) -> Result<u16> {
        expr::parse(cur)?
            .eval(&self.scope(true))?
            .ok_or_else(|| Error::Directive("value must be known at this point".into()))
    }

    fn statement(&mut self, text: &str) -> Result<()> {
        let mut cur = Cursor::new(text);
        let mut word = cur.try_word_symbol();
        let mut label = None;
        if word.is_some() && cur.peek() == Some(':') {
            cur.bump();
            label = word;
            word = cur.try_word_symbol();
        }
        let directive = word.and_then(Directive::from_name);

        if let Some(d) = directive.filter(|d| d.is_conditional()) {
            return self.conditional(d, &mut cur);
        }
        if !self.active() {
            return Ok(());
        }

        // `name EQU expr` without a colon
        if let (None, None, Some(name)) = (label, directive, word) {
            if Mnemonic::from_name(name).is_none() {
                let save = cur;
                if cur.try_word_symbol().and_then(Directive::from_name) == Some(Directive::Equ) {
                    self.equ(name, &mut cur)?;
                    return cur.expect_end();
                }
                cur = save;
            }
        }
        if directive == Some(Directive::Equ) {
            let name = label.ok_or_else(|| Error::Directive("EQU without label".into()))?;
            self.equ(name, &mut cur)?;
            return cur.expect_end();
        }

        if let Some(name) = label {
            self.define_label(name)?;
        }
        let Some(word) = word else {
            return cur.expect_end();
        };
        if let Some(d) = directive {
            return self.directive(d, &mut cur);
        }
        let m = Some(word)
            .filter(|w| !w.starts_with(['.', '$']))
            .and_then(Mnemonic::from_name)
            .ok_or_else(|| Error::UnknownMnemonic(word.to_string()))?;
        self.instruction(m, &mut cur)
    }

    fn define_label(&mut self, name: &str) -> Result<()> {
        if self.pass == 1 {
            self.symbols.define(name, SymbolValue::Known(self.origin))
        } else {
            self.symbols.mark_seen(name);
            Ok(())
        }
    }

    fn equ(&mut self, name: &str, cur: &mut Cursor<'_>) -> Result<()> {
        let e = expr::parse(cur)?;
        if self.pass == 1 {
            let value = match e.eval(&self.scope(false))? {
                Some(v) => SymbolValue::Known(v),
                None => SymbolValue::Pending { expr: e, here: self.origin },
            };
            return self.symbols.define(name, value);
        }
        self.symbols.mark_seen(name);
        if let Some(SymbolValue::Pending { .. }) = self.symbols.get(name) {
            // strict evaluation names the symbol that is missing
            e.eval(&self.scope(true))?;
            return Err(Error::UndefinedLabel(name.to_string()));
        }
        Ok(())
    }

    fn conditional(&mut self, d: Directive, cur: &mut Cursor<'_>) -> Result<()> {
        let parent = self.active();
        let check_end = match d {
            Directive::If(sense) => {
                let r = if parent { self.condition(cur) } else { Ok(false) };
                let state = matches!(r, Ok(v) if v == sense);
                self.push_frame(parent, state);
                r?;
                parent
            }
            Directive::IfDef(sense) => {
                let r = match cur.try_identifier() {
                    Some(name) => Ok(self.symbols.seen(name)),
                    None => Err(Error::Directive("label expected".into())),
                };
                let state = matches!(r, Ok(v) if v == sense);
                self.push_frame(parent, state);
                r?;
                then(cur);
                parent
            }
            Directive::ElseIf => {
                let frame = *self.conds.last().ok_or_else(|| Error::Directive("ELSEIF without IF".into()))?;
                let r = if frame.parent_active && !frame.taken { self.condition(cur) } else { Ok(false) };
                let state = matches!(r, Ok(true));
                if let Some(f) = self.conds.last_mut() {
                    f.active = state;
                    f.taken |= state;
                }
                r?;
                frame.parent_active
            }
            Directive::Else => {
                let f = self.conds.last_mut().ok_or_else(|| Error::Directive("ELSE without IF".into()))?;
                f.active = f.parent_active && !f.taken;
                f.taken = true;
                f.parent_active
            }
            _ => {
                let f = self.conds.pop().ok_or_else(|| Error::Directive("ENDIF without IF".into()))?;
                cur.try_word_symbol();
                f.parent_active
            }
        };
        if check_end {
            cur.expect_end()?;
        }
        Ok(())
    }

    fn push_frame(&mut self, parent: bool, state: bool) {
        self.conds.push(CondFrame { parent_active: parent, active: parent && state, taken: state, pos: self.pos });
    }

    /// IF argument: a lone label is true when defined (so far) and non-zero,
    /// anything else is an expression without forward references.
    fn condition(&self, cur: &mut Cursor<'_>) -> Result<bool> {
        let save = *cur;
        if let Some(name) = cur.try_identifier() {
            let lone = {
                then(cur);
                cur.at_end()
            };
            if lone && !crate::instructions::is_reserved_word(name) {
                return match self.symbols.get(name) {
                    Some(SymbolValue::Known(v)) if self.symbols.seen(name) => Ok(*v != 0),
                    Some(SymbolValue::Pending { .. }) => Err(Error::Directive(format!(
                        "value of '{name}' is not known here (no forward references)"
                    ))),
                    _ => Ok(false),
                };
            }
            *cur = save;
        }
        let v = self.known(cur)?;
        then(cur);
        Ok(v != 0)
    }

    fn directive(&mut self, d: Directive, cur: &mut Cursor<'_>) -> Result<()> {
        match d {
            Directive::Ignored => return Ok(()),
            Directive::Org => {
                let target = self.known(cur)? as u32;
                if target < self.addr {
                    return Err(Error::Directive(format!(
                        "location counter cannot move back from %{:04X} to %{target:04X}",
                        self.addr
                    )));
                }
                self.addr = target;
            }
            Directive::Ent => {
                if self.pass == 1 {
                    if self.entry.is_some() {
                        return Err(Error::Directive("more than one ENT".into()));
                    }
                    self.entry = Some(self.origin);
                }
            }
            Directive::Db => loop {
                let save = *cur;
                match cur.try_string()? {
                    Some(s) if s.chars().count() != 1 => self.put_string(s)?,
                    _ => {
                        *cur = save;
                        let v = self.value(cur)?.unwrap_or(0);
                        self.put(check8(v)?)?;
                    }
                }
                if !cur.check_char(',') {
                    break;
                }
            },
            Directive::Dw => loop {
                let [hi, lo] = self.value(cur)?.unwrap_or(0).to_be_bytes();
                self.put(hi)?;
                self.put(lo)?;
                if !cur.check_char(',') {
                    break;
                }
            },
            Directive::Ds(size) => loop {
                let n = self.known(cur)? as u32;
                self.addr += n * size;
                self.check_overflow()?;
                if !cur.check_char(',') {
                    break;
                }
            },
            Directive::Align => {
                let n = self.known(cur)?;
                if !n.is_power_of_two() {
                    return Err(Error::Directive("power of two expected (1, 2, 4, 8, %10, ...)".into()));
                }
                let fill = if cur.check_char(',') { check8(self.value(cur)?.unwrap_or(0xFF))? } else { 0xFF };
                while self.addr & (n as u32 - 1) != 0 {
                    self.put(fill)?;
                }
            }
            Directive::Even => {
                if self.addr & 1 != 0 {
                    self.put(0xFF)?;
                }
            }
            Directive::Title => {
                let text = word_or_string(cur)?;
                if self.pass == 1 {
                    if self.title.is_some() {
                        return Err(Error::Directive("TITLE already given".into()));
                    }
                    self.title = Some(text.to_string());
                }
            }
            Directive::Cpu => {
                cur.check_char('=');
                let name = word_or_string(cur)?;
                if self.pass == 2 {
                    if self.cpu.is_some() {
                        return Err(Error::Directive("CPU already specified".into()));
                    }
                    self.cpu = Some(CpuVariant::resolve(name)?);
                }
            }
            Directive::End => {
                self.ended = true;
                cur.try_word_symbol();
            }
            Directive::ErrorMsg => {
                let msg = cur.try_string()?.ok_or_else(|| Error::Directive("string expected".into()))?;
                return Err(Error::User(msg.to_string()));
            }
            Directive::WarningMsg => {
                let msg = cur.try_string()?.ok_or_else(|| Error::Directive("string expected".into()))?;
                self.warning(msg);
            }
            Directive::WarnOn => self.warn_enabled = true,
            Directive::WarnOff => self.warn_enabled = false,
            // handled before dispatch
            Directive::Equ | Directive::If(_) | Directive::IfDef(_) | Directive::ElseIf | Directive::Else
            | Directive::EndIf => {}
        }
        cur.expect_end()
    }

    fn put_string(&mut self, s: &str) -> Result<()> {
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            let b = if c == '%' {
                match chars.next() {
                    Some('%') => b'%',
                    Some('L' | 'l') => 0x0A,
                    Some('P' | 'p') => 0x0C,
                    Some('Q' | 'q') => b'\'',
                    Some('R' | 'r') => 0x0D,
                    Some('T' | 't') => 0x09,
                    Some(h) => match (h.to_digit(16), chars.next().and_then(|l| l.to_digit(16))) {
                        (Some(hi), Some(lo)) => (hi << 4 | lo) as u8,
                        (Some(_), None) => return Err(Error::Directive("hex digit expected after '%'".into())),
                        (None, _) => return Err(Error::Directive(format!("invalid escape sequence '%{h}'"))),
                    },
                    None => return Err(Error::Directive("escape sequence cut short".into())),
                }
            } else {
                self.char_byte(c)?
            };
            self.put(b)?;
        }
        Ok(())
    }

    fn char_byte(&mut self, c: char) -> Result<u8> {
        let b = u8::try_from(c as u32).map_err(|_| Error::CharNotByte(c))?;
        if self.options.warn_non_ascii && !(0x20..=0x7E).contains(&b) {
            if c.is_control() || c.is_whitespace() {
                self.warning(format!("character code %{b:02X} is not ASCII"));
            } else {
                self.warning(format!("'{c}' is not an ASCII character"));
            }
        }
        Ok(b)
    }

    fn instruction(&mut self, m: Mnemonic, cur: &mut Cursor<'_>) -> Result<()> {
        use Mnemonic::*;

        let mut ops = Vec::new();
        if matches!(m, Jp | Jr) {
            if let Some(c) = cur.try_cond() {
                cur.expect_char(',')?;
                ops.push(Operand::Cond(c));
            }
        }
        let args = parse_args(cur, &self.scope(self.pass == 2))?;
        cur.expect_end()?;

        let has_target = matches!(m, Jp | Jr | Call | Djnz);
        for (i, &arg) in args.iter().enumerate() {
            let target = has_target && i + 1 == args.len();
            let op = self.lower(m, arg, target)?;
            ops.push(op);
        }
        if matches!(m, Wdh | Wdt) && self.pass == 2 {
            match self.cpu {
                Some(cpu) => cpu.check_watchdog()?,
                None => self.warning(WATCHDOG_NOT_PORTABLE),
            }
        }

        let bytes = encode(self.origin, m, &ops)?;
        if self.pass == 2 {
            self.check_operands(m, &ops);
        }
        for b in bytes {
            self.put(b)?;
        }
        Ok(())
    }

    /// Source operand to encoder operand. In pass 1 unknown values become
    /// placeholders that encode to the same size.
    fn lower(&mut self, m: Mnemonic, arg: Arg, target: bool) -> Result<Operand> {
        use Mnemonic::*;

        Ok(match arg {
            Arg::Working { n, pair: false, indirect: false } => Operand::R(n),
            Arg::Working { n, pair: true, indirect: false } => Operand::RR(n),
            Arg::Working { n, pair: false, indirect: true } => Operand::IndR(n),
            Arg::Working { n, pair: true, indirect: true } => Operand::IndRR(n),
            Arg::StackPointer { indirect: false } => Operand::RegPair(REG_SPH),
            Arg::StackPointer { indirect: true } => Operand::IndRegPair(REG_SPH),
            Arg::Value { value, indirect: false } if target => Operand::Addr(value.unwrap_or(self.origin)),
            Arg::Value { value, indirect } => {
                let r = self.register(value)?;
                let word = matches!(m.desc().class, Class::Word(_));
                match (indirect, m) {
                    (false, _) if word => Operand::RegPair(r),
                    (false, _) => Operand::Reg(r),
                    (true, Jp | Call) => Operand::IndRegPair(r),
                    (true, _) => Operand::IndReg(r),
                }
            }
            Arg::Indexed { offset, r } => Operand::Indexed { offset: check8(offset.unwrap_or(0))?, r },
            Arg::Imm(v) => Operand::Imm(check8(v.unwrap_or(0))?),
        })
    }

    fn register(&mut self, value: Option<u16>) -> Result<u8> {
        let v = value.unwrap_or(0);
        let r = u8::try_from(v).map_err(|_| Error::RegisterOutOfRange(v as u32))?;
        if self.pass == 2 {
            let note = if r & 0xF0 == 0xE0 {
                Some(format!("%{r:02X} is working register R{}", r & 0x0F))
            } else {
                match &self.cpu {
                    Some(cpu) => cpu.check_register(r),
                    None => default_register_check(r, self.options.regs_80_to_ef),
                }
            };
            if let Some(msg) = note {
                self.warning(msg);
            }
        }
        Ok(r)
    }

    fn check_operands(&mut self, m: Mnemonic, ops: &[Operand]) {
        for (i, o) in ops.iter().enumerate() {
            match *o {
                Operand::RR(n) | Operand::IndRR(n) if n % 2 == 1 => {
                    self.warning(format!("RR{n} is not a register pair (odd number)"));
                }
                Operand::RegPair(r) | Operand::IndRegPair(r) if r % 2 == 1 => {
                    self.warning(format!("register pair %{r:02X} starts at an odd register"));
                }
                _ => {}
            }
            let reads = m.role(i).contains(Access::READ);
            match *o {
                Operand::Reg(r) if reads => self.check_readable(r),
                Operand::RegPair(r) if reads => {
                    self.check_readable(r & 0xFE);
                    self.check_readable(r | 1);
                }
                // the pointer itself is always read
                Operand::IndReg(r) | Operand::IndRegPair(r) => self.check_readable(r),
                _ => {}
            }
        }
    }

    fn check_readable(&mut self, reg: u8) {
        if is_write_only(reg) {
            self.warning(format!("register {} is write-only", crate::disasm::fmt_reg(reg)));
        }
    }

    fn put(&mut self, b: u8) -> Result<()> {
        if self.pass == 2 && self.addr <= 0xFFFF {
            let begin = *self.begin.get_or_insert(self.addr as u16);
            let off = (self.addr - begin as u32) as usize;
            // gaps left by ORG/DS
            self.code.resize(off, 0xFF);
            self.code.push(b);
        }
        self.emitted = true;
        self.addr += 1;
        self.check_overflow()
    }

    fn check_overflow(&mut self) -> Result<()> {
        if self.addr > 0x10000 && !self.overflowed {
            self.overflowed = true;
            return Err(Error::Directive("location counter overflow past %FFFF".into()));
        }
        Ok(())
    }

    fn check_embed(&mut self, rules: EmbedRules) {
        let base = self.begin.unwrap_or(0);
        let mut found = Vec::new();
        for (i, &b) in self.code.iter().enumerate() {
            let addr = base.wrapping_add(i as u16);
            let next = self.code.get(i + 1).copied();
            if b == 0x3B {
                found.push(format!("byte %3B at %{addr:04X} would end the BASIC statement"));
            } else if (b == 0x00 || b == 0x0D) && !rules.allow_nul_cr {
                found.push(format!("byte %{b:02X} at %{addr:04X} not allowed in embedded code"));
            } else if b == 0x0D && next.is_some_and(|n| n & 0x80 != 0) {
                found.push(format!("byte %0D at %{addr:04X} followed by a byte with bit 7 set"));
            }
        }
        for msg in found {
            self.report(Diagnostic::error(msg));
        }
    }
}

/// Accept `v` as a byte: %00..%FF or a negative number down to -128.
fn check8(v: u16) -> Result<u8> {
    if v <= 0xFF || v >= 0xFF80 {
        Ok(v as u8)
    } else {
        Err(Error::ValueOutOfRange(v))
    }
}

/// Optional `THEN` after a condition, in any directive spelling.
fn then(cur: &mut Cursor<'_>) -> bool {
    let save = *cur;
    match cur.try_word_symbol() {
        Some(w) if w.strip_prefix(['.', '$']).unwrap_or(w).eq_ignore_ascii_case("THEN") => true,
        _ => {
            *cur = save;
            false
        }
    }
}

fn word_or_string<'a>(cur: &mut Cursor<'a>) -> Result<&'a str> {
    if let Some(w) = cur.try_word_symbol() {
        return Ok(w);
    }
    match cur.try_string()? {
        Some(s) => Ok(s),
        None => Err(cur.unexpected()),
    }
}

/// Lines with the byte offset of their first character.
fn split_lines(source: &str) -> Vec<(usize, &str)> {
    let mut offset = 0;
    source
        .split('\n')
        .map(|l| {
            let start = offset;
            offset += l.len() + 1;
            (start, l.strip_suffix('\r').unwrap_or(l))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bytes(src: &str) -> Vec<u8> {
        let r = assemble(src, None, &AsmOptions::default()).unwrap();
        assert_eq!(r.error_count(), 0, "{:?}", r.diagnostics);
        r.bytes.unwrap()
    }

    #[test]
    fn directive_names() {
        assert_eq!(Directive::from_name(".org"), Some(Directive::Org));
        assert_eq!(Directive::from_name("$IF"), Some(Directive::If(true)));
        assert_eq!(Directive::from_name("$ORG"), None);
        assert_eq!(Directive::from_name("ds.w"), Some(Directive::Ds(2)));
        assert_eq!(Directive::from_name("LD"), None);
    }

    #[test]
    fn byte_range() {
        assert_eq!(check8(0xFF), Ok(0xFF));
        assert_eq!(check8(0xFF80), Ok(0x80));
        assert_eq!(check8(0x100), Err(Error::ValueOutOfRange(0x100)));
        assert_eq!(check8(0xFF7F), Err(Error::ValueOutOfRange(0xFF7F)));
    }

    #[test]
    fn data_directives() {
        assert_eq!(bytes("DB 'AB',%0D,'C'+1"), vec![0x41, 0x42, 0x0D, 0x44]);
        assert_eq!(bytes("DB 'x%L%Q%%%7F'"), vec![b'x', 0x0A, b'\'', b'%', 0x7F]);
        assert_eq!(bytes("DW %1234,-1"), vec![0x12, 0x34, 0xFF, 0xFF]);
        assert_eq!(bytes(" DB 1\n DS 2\n DB 2"), vec![1, 0xFF, 0xFF, 2]);
        assert_eq!(bytes(" DB 1\n ALIGN 4,0\n DB 2\n EVEN\n DB 3"), vec![1, 0, 0, 0, 2, 0xFF, 3]);
    }

    #[test]
    fn conditionals() {
        let src = "
FLAG    EQU     1
        IF FLAG THEN
        DB      1
        ELSEIF 1
        DB      2
        ELSE
        DB      3
        ENDIF
        IFNDEF  FLAG
        DB      4
        FI
        $IFFALSE 0
        IF 0
        DB      5
        ELSE
        DB      6
        ENDIF
        ENDIF
";
        assert_eq!(bytes(src), vec![1, 6]);
    }

    #[test]
    fn forward_equ() {
        let r = assemble("  LD R1,#VAL\nVAL EQU NEXT+1\nNEXT: NOP", None, &AsmOptions::default()).unwrap();
        assert_eq!(r.bytes, Some(vec![0x1C, 0x03, 0xFF]));
        assert_eq!(r.symbols.get("VAL"), Some(&3));
    }

    #[test]
    fn org_cannot_go_back() {
        let r = assemble(" ORG %100\n NOP\n ORG %80", None, &AsmOptions::default()).unwrap();
        assert_eq!(r.error_count(), 1);
        assert_eq!(r.diagnostics[0].line, Some(3));
        assert_eq!(r.bytes, None);
    }
}
