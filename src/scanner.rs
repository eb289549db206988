use crate::error::{Error, Result};
use crate::instructions::Cond;

/// Position in one source line. The cursor is `Copy`: backtracking is
/// done by keeping an old value and assigning it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

pub fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\u{A0}' || c.is_whitespace()
}

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_ident_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skip blanks and return the next character without consuming it.
    pub fn skip_blanks(&mut self) -> Option<char> {
        while let Some(c) = self.peek() {
            if !is_blank(c) {
                return Some(c);
            }
            self.bump();
        }
        None
    }

    pub fn at_comment(&self) -> bool {
        let r = self.rest();
        r.starts_with('!') || r.starts_with(';') || r.starts_with("//")
    }

    /// Nothing but blanks and an optional comment left.
    pub fn at_end(&mut self) -> bool {
        self.skip_blanks().is_none() || self.at_comment()
    }

    pub fn expect_end(&mut self) -> Result<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    /// Error for the next non-blank character.
    pub fn unexpected(&self) -> Error {
        let mut next = *self;
        match next.skip_blanks() {
            Some(c) => Error::UnexpectedChar(c),
            None => Error::UnexpectedEol,
        }
    }

    fn take_while(&mut self, f: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if f(c)) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    /// `[A-Za-z_][A-Za-z0-9_]*`
    pub fn try_identifier(&mut self) -> Option<&'a str> {
        let save = *self;
        match self.skip_blanks() {
            Some(c) if is_ident_start(c) => Some(self.take_while(is_ident_part)),
            _ => {
                *self = save;
                None
            }
        }
    }

    /// Identifier that may also start with `.` or `$` and contain dots
    /// (`.ORG`, `$IF`, `DS.W`).
    pub fn try_word_symbol(&mut self) -> Option<&'a str> {
        let save = *self;
        let start = match self.skip_blanks() {
            Some(c) => c,
            None => return None,
        };
        let begin = self.pos;
        if start == '.' || start == '$' {
            self.bump();
        }
        match self.peek() {
            Some(c) if is_ident_start(c) => {
                self.take_while(|c| is_ident_part(c) || c == '.');
                Some(&self.src[begin..self.pos])
            }
            _ => {
                *self = save;
                None
            }
        }
    }

    /// Case-insensitive keyword sequence, e.g. `check_token("ELSE")`. Fails
    /// if the word continues with an identifier character.
    pub fn check_token(&mut self, word: &str) -> bool {
        let save = *self;
        self.skip_blanks();
        let r = self.rest();
        if r.len() >= word.len() && r.is_char_boundary(word.len()) && r[..word.len()].eq_ignore_ascii_case(word) {
            let after = r[word.len()..].chars().next();
            let word_like = word.chars().last().is_some_and(is_ident_part);
            if !(word_like && after.is_some_and(is_ident_part)) {
                self.pos += word.len();
                return true;
            }
        }
        *self = save;
        false
    }

    pub fn check_char(&mut self, c: char) -> bool {
        let save = *self;
        if self.skip_blanks() == Some(c) {
            self.bump();
            true
        } else {
            *self = save;
            false
        }
    }

    pub fn expect_char(&mut self, c: char) -> Result<()> {
        if self.check_char(c) {
            Ok(())
        } else {
            Err(Error::CharExpected(c))
        }
    }

    /// Quoted string, `'...'` or `"..."`, returned without its quotes.
    pub fn try_string(&mut self) -> Result<Option<&'a str>> {
        let save = *self;
        let quote = match self.skip_blanks() {
            Some(q @ ('\'' | '"')) => q,
            _ => {
                *self = save;
                return Ok(None);
            }
        };
        self.bump();
        let text = self.take_while(|c| c != quote);
        if self.bump().is_none() {
            return Err(Error::UnterminatedString);
        }
        Ok(Some(text))
    }

    /// Condition code followed by a comma; the comma is not consumed.
    pub fn try_cond(&mut self) -> Option<Cond> {
        let save = *self;
        if let Some(word) = self.try_identifier() {
            if let Some(c) = Cond::from_name(word) {
                if self.skip_blanks() == Some(',') {
                    return Some(c);
                }
            }
        }
        *self = save;
        None
    }

    /// Numeric literal: `%1F`, `%(2)1010`, `%(8)17`, `0FFH`, `1010B`, `42`.
    pub fn try_number(&mut self) -> Result<Option<u16>> {
        let save = *self;
        match self.skip_blanks() {
            Some('%') => {
                self.bump();
                let radix = if self.check_token("(2)") {
                    2
                } else if self.check_token("(8)") {
                    8
                } else {
                    self.check_token("(16)");
                    16
                };
                let digits = self.take_while(|c| c.is_ascii_alphanumeric());
                if digits.is_empty() {
                    return Err(Error::InvalidDigit);
                }
                parse_digits(digits, radix).map(Some)
            }
            Some(c) if c.is_ascii_digit() => {
                let digits = self.take_while(|c| c.is_ascii_hexdigit());
                if matches!(self.peek(), Some('h' | 'H')) {
                    self.bump();
                    let v = parse_digits(digits, 16)?;
                    self.no_ident_follows()?;
                    return Ok(Some(v));
                }
                self.no_ident_follows()?;
                let (body, radix) = match digits.strip_suffix(['b', 'B']) {
                    Some(bin) if !bin.is_empty() && bin.chars().all(|c| c == '0' || c == '1') => (bin, 2),
                    _ => (digits, 10),
                };
                parse_digits(body, radix).map(Some)
            }
            _ => {
                *self = save;
                Ok(None)
            }
        }
    }

    fn no_ident_follows(&self) -> Result<()> {
        match self.peek() {
            Some(c) if is_ident_part(c) => Err(Error::InvalidDigit),
            _ => Ok(()),
        }
    }
}

fn parse_digits(digits: &str, radix: u32) -> Result<u16> {
    let mut v: u32 = 0;
    for c in digits.chars() {
        let d = c.to_digit(radix).ok_or(Error::InvalidDigit)?;
        v = v * radix + d;
        if v > 0xFFFF {
            return Err(Error::NumberTooLarge);
        }
    }
    Ok(v as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        let n = |s: &str| Cursor::new(s).try_number();
        assert_eq!(n("%1f"), Ok(Some(0x1F)));
        assert_eq!(n("0FFH"), Ok(Some(0xFF)));
        assert_eq!(n("1010B"), Ok(Some(10)));
        assert_eq!(n("%(2)1010"), Ok(Some(10)));
        assert_eq!(n("%(8)17"), Ok(Some(15)));
        assert_eq!(n("65535"), Ok(Some(0xFFFF)));
        assert_eq!(n("65536"), Err(Error::NumberTooLarge));
        assert_eq!(n("12AB"), Err(Error::InvalidDigit));
        assert_eq!(n("LABEL"), Ok(None));
    }

    #[test]
    fn backtracking_leaves_cursor_unchanged() {
        let mut c = Cursor::new("  ELSEIF x");
        let before = c;
        assert!(!c.check_token("ELSE"));
        assert_eq!(c, before);
        assert!(c.check_token("elseif"));
        assert_eq!(c.rest(), " x");
    }

    #[test]
    fn word_symbols_and_comments() {
        let mut c = Cursor::new("\u{A0}.org %100 ; start");
        assert_eq!(c.try_word_symbol(), Some(".org"));
        assert_eq!(c.try_number(), Ok(Some(0x100)));
        assert!(c.at_end());
        assert!(Cursor::new("  // note").at_end());
        assert!(Cursor::new("! note").at_end());
    }

    #[test]
    fn strings() {
        let mut c = Cursor::new(" \"AB'C\" ");
        assert_eq!(c.try_string(), Ok(Some("AB'C")));
        assert_eq!(Cursor::new("'open").try_string(), Err(Error::UnterminatedString));
    }

    #[test]
    fn condition_needs_comma() {
        let mut c = Cursor::new("NZ, LOOP");
        assert_eq!(c.try_cond(), Some(Cond(0xE)));
        let mut c = Cursor::new("CARRY, LOOP");
        assert_eq!(c.try_cond(), None);
        assert_eq!(c.pos(), 0);
    }

    #[test]
    fn failed_tries_keep_leading_blanks() {
        let mut c = Cursor::new("  ,x");
        assert_eq!(c.try_identifier(), None);
        assert_eq!(c.try_number(), Ok(None));
        assert_eq!(c.try_string(), Ok(None));
        assert!(!c.check_char(')'));
        assert_eq!(c.pos(), 0);
        assert_eq!(c.unexpected(), Error::UnexpectedChar(','));
        assert!(c.check_char(','));
        assert_eq!(c.try_identifier(), Some("x"));
    }
}
