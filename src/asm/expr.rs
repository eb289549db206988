use crate::error::{Error, Result};
use crate::instructions::{is_register_name, is_reserved_word};
use crate::scanner::{is_ident_part, Cursor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq, Ne, Lt, Le, Gt, Ge,
    Add, Sub, Or, Xor,
    Mul, Div, Mod, And, Shl, Shr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Num(u16),
    Label(String),
    /// `$`, address of the current statement
    Here,
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

/// Where an expression finds its symbols.
pub trait EvalContext {
    /// `Ok(None)` means "not known yet"; a context that has to be exact
    /// reports missing symbols as errors instead.
    fn symbol(&self, name: &str) -> Result<Option<u16>>;
    fn here(&self) -> u16;
}

pub fn parse(cur: &mut Cursor<'_>) -> Result<Expr> {
    parse_cmp(cur)
}

fn parse_cmp(cur: &mut Cursor<'_>) -> Result<Expr> {
    let mut lhs = parse_add(cur)?;
    loop {
        // two-character operators first
        let op = if cur.check_token("<>") {
            BinOp::Ne
        } else if cur.check_token("<=") {
            BinOp::Le
        } else if cur.check_token(">=") {
            BinOp::Ge
        } else if cur.check_char('<') {
            BinOp::Lt
        } else if cur.check_char('>') {
            BinOp::Gt
        } else if cur.check_char('=') {
            BinOp::Eq
        } else {
            return Ok(lhs);
        };
        let rhs = parse_add(cur)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
}

fn parse_add(cur: &mut Cursor<'_>) -> Result<Expr> {
    let mut lhs = parse_mul(cur)?;
    loop {
        let op = if cur.check_char('+') {
            BinOp::Add
        } else if cur.check_char('-') {
            BinOp::Sub
        } else if cur.check_token("OR") || cur.check_token("LOR") {
            BinOp::Or
        } else if cur.check_token("XOR") || cur.check_token("LXOR") {
            BinOp::Xor
        } else {
            return Ok(lhs);
        };
        let rhs = parse_mul(cur)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
}

fn parse_mul(cur: &mut Cursor<'_>) -> Result<Expr> {
    let mut lhs = parse_unary(cur)?;
    loop {
        let op = if cur.check_char('*') {
            BinOp::Mul
        } else if cur.check_char('/') {
            BinOp::Div
        } else if cur.check_token("MOD") {
            BinOp::Mod
        } else if cur.check_token("AND") || cur.check_token("LAND") {
            BinOp::And
        } else if cur.check_token("SHL") {
            BinOp::Shl
        } else if cur.check_token("SHR") {
            BinOp::Shr
        } else {
            return Ok(lhs);
        };
        let rhs = parse_unary(cur)?;
        lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
    }
}

fn parse_unary(cur: &mut Cursor<'_>) -> Result<Expr> {
    let op = if cur.check_char('+') {
        return parse_unary(cur);
    } else if cur.check_char('-') {
        UnOp::Neg
    } else if cur.check_token("NOT") || cur.check_token("LNOT") {
        UnOp::Not
    } else if cur.check_token("HIGH") || cur.check_token("HI") {
        UnOp::High
    } else if cur.check_token("LOW") || cur.check_token("LO") {
        UnOp::Low
    } else {
        return parse_primary(cur);
    };
    Ok(Expr::Unary(op, Box::new(parse_unary(cur)?)))
}

fn parse_primary(cur: &mut Cursor<'_>) -> Result<Expr> {
    if cur.check_char('(') {
        let e = parse(cur)?;
        cur.expect_char(')')?;
        return Ok(e);
    }
    if cur.skip_blanks() == Some('$') && !cur.peek_nth(1).is_some_and(is_ident_part) {
        cur.bump();
        return Ok(Expr::Here);
    }
    if let Some(n) = cur.try_number()? {
        return Ok(Expr::Num(n));
    }
    let save = *cur;
    if let Some(s) = cur.try_string()? {
        let mut chars = s.chars();
        return match (chars.next(), chars.next()) {
            (Some(c), None) => u8::try_from(c as u32)
                .map(|b| Expr::Num(b as u16))
                .map_err(|_| Error::CharNotByte(c)),
            _ => {
                *cur = save;
                Err(Error::UnexpectedChar('"'))
            }
        };
    }
    if let Some(name) = cur.try_identifier() {
        if is_register_name(name) {
            return Err(Error::RegisterInExpr(name.to_string()));
        }
        if is_reserved_word(name) {
            return Err(Error::ReservedWord(name.to_string()));
        }
        return Ok(Expr::Label(name.to_string()));
    }
    Err(cur.unexpected())
}

fn truth(b: bool) -> u16 {
    if b { 0xFFFF } else { 0 }
}

impl Expr {
    /// Value masked to 16 bits, or `None` while a symbol is unresolved.
    pub fn eval(&self, ctx: &dyn EvalContext) -> Result<Option<u16>> {
        Ok(match self {
            Expr::Num(n) => Some(*n),
            Expr::Label(name) => ctx.symbol(name)?,
            Expr::Here => Some(ctx.here()),
            Expr::Unary(op, e) => e.eval(ctx)?.map(|v| match op {
                UnOp::Neg => v.wrapping_neg(),
                UnOp::Not => !v,
                UnOp::High => v >> 8,
                UnOp::Low => v & 0xFF,
            }),
            Expr::Binary(op, a, b) => {
                let (a, b) = (a.eval(ctx)?, b.eval(ctx)?);
                match (a, b) {
                    (Some(a), Some(b)) => Some(apply(*op, a, b)?),
                    _ => None,
                }
            }
        })
    }
}

fn apply(op: BinOp, a: u16, b: u16) -> Result<u16> {
    Ok(match op {
        BinOp::Eq => truth(a == b),
        BinOp::Ne => truth(a != b),
        BinOp::Lt => truth(a < b),
        BinOp::Le => truth(a <= b),
        BinOp::Gt => truth(a > b),
        BinOp::Ge => truth(a >= b),
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Or => a | b,
        BinOp::Xor => a ^ b,
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => a.checked_div(b).ok_or(Error::DivisionByZero)?,
        BinOp::Mod => a.checked_rem(b).ok_or(Error::DivisionByZero)?,
        BinOp::And => a & b,
        BinOp::Shl => a.checked_shl(b as u32).unwrap_or(0),
        BinOp::Shr => a.checked_shr(b as u32).unwrap_or(0),
    })
}
