use crate::asm::expr::{self, EvalContext};
use crate::error::{Error, Result};
use crate::instructions::control_reg;
use crate::scanner::Cursor;

/// Operand as written in source, before the mnemonic decides what it means.
/// Values are `None` while a forward reference is unresolved (pass 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    Working { n: u8, pair: bool, indirect: bool },
    /// Register number, jump target or register named by symbol
    Value { value: Option<u16>, indirect: bool },
    StackPointer { indirect: bool },
    Indexed { offset: Option<u16>, r: u8 },
    Imm(Option<u16>),
}

/// `Rn` / `RRn` spelled as an identifier. Numbers past 15 are an error,
/// anything else that is not of that shape is `Ok(None)`.
pub fn working_register(name: &str) -> Result<Option<(u8, bool)>> {
    let upper = name.to_ascii_uppercase();
    let (digits, pair) = match upper.strip_prefix("RR") {
        Some(d) => (d, true),
        None => match upper.strip_prefix('R') {
            Some(d) => (d, false),
            None => return Ok(None),
        },
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }
    match digits.parse::<u32>() {
        Ok(n) if n < 16 => Ok(Some((n as u8, pair))),
        Ok(n) => Err(Error::WorkingRegRange(n)),
        Err(_) => Err(Error::WorkingRegRange(u32::MAX)),
    }
}

pub fn parse_arg(cur: &mut Cursor<'_>, ctx: &dyn EvalContext) -> Result<Arg> {
    if cur.check_char('#') {
        let e = expr::parse(cur)?;
        return Ok(Arg::Imm(e.eval(ctx)?));
    }
    let indirect = cur.check_char('@');

    let save = *cur;
    if let Some(name) = cur.try_identifier() {
        if let Some((n, pair)) = working_register(name)? {
            return Ok(Arg::Working { n, pair, indirect });
        }
        if name.eq_ignore_ascii_case("SP") {
            return Ok(Arg::StackPointer { indirect });
        }
        if let Some(reg) = control_reg(name) {
            return Ok(Arg::Value { value: Some(reg as u16), indirect });
        }
        *cur = save;
    }

    let value = expr::parse(cur)?.eval(ctx)?;
    if !indirect && cur.check_char('(') {
        let name = cur.try_identifier().ok_or(Error::WorkingRegExpected)?;
        let r = match working_register(name)? {
            Some((n, false)) => n,
            _ => return Err(Error::WorkingRegExpected),
        };
        cur.expect_char(')')?;
        return Ok(Arg::Indexed { offset: value, r });
    }
    Ok(Arg::Value { value, indirect })
}

/// Comma-separated operand list up to the end of the statement.
pub fn parse_args(cur: &mut Cursor<'_>, ctx: &dyn EvalContext) -> Result<Vec<Arg>> {
    let mut args = Vec::new();
    if cur.at_end() {
        return Ok(args);
    }
    loop {
        args.push(parse_arg(cur, ctx)?);
        if !cur.check_char(',') {
            return Ok(args);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoSymbols;

    impl EvalContext for NoSymbols {
        fn symbol(&self, _: &str) -> Result<Option<u16>> {
            Ok(None)
        }
        fn here(&self) -> u16 {
            0
        }
    }

    fn args(src: &str) -> Result<Vec<Arg>> {
        parse_args(&mut Cursor::new(src), &NoSymbols)
    }

    #[test]
    fn register_forms() {
        assert_eq!(
            args("@rr4, r15").unwrap(),
            vec![
                Arg::Working { n: 4, pair: true, indirect: true },
                Arg::Working { n: 15, pair: false, indirect: false },
            ]
        );
        assert_eq!(args("FLAGS").unwrap(), vec![Arg::Value { value: Some(0xFC), indirect: false }]);
        assert_eq!(args("@SP").unwrap(), vec![Arg::StackPointer { indirect: true }]);
        assert_eq!(args("R16"), Err(Error::WorkingRegRange(16)));
    }

    #[test]
    fn values_and_indexed() {
        assert_eq!(args("#HIGH 1234H").unwrap(), vec![Arg::Imm(Some(0x12))]);
        assert_eq!(args("-5(R3)").unwrap(), vec![Arg::Indexed { offset: Some(0xFFFB), r: 3 }]);
        assert_eq!(args("TABLE(r2)").unwrap(), vec![Arg::Indexed { offset: None, r: 2 }]);
        assert_eq!(args("5(RR2)"), Err(Error::WorkingRegExpected));
        assert_eq!(args("@%20").unwrap(), vec![Arg::Value { value: Some(0x20), indirect: true }]);
        assert_eq!(args("RESULT").unwrap(), vec![Arg::Value { value: None, indirect: false }]);
    }
}
