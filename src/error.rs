/// Everything the codec can complain about. The `Display` text doubles as the
/// diagnostic message shown to the user.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("CPU '{0}' not supported")]
    UnknownCpu(String),
    #[error("CPU {0} does not support watchdog instructions")]
    WatchdogUnsupported(&'static str),

    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unexpected end of line")]
    UnexpectedEol,
    #[error("'{0}' expected")]
    CharExpected(char),
    #[error("string literal not terminated")]
    UnterminatedString,
    #[error("number too large")]
    NumberTooLarge,
    #[error("invalid digit in number")]
    InvalidDigit,
    #[error("division by zero")]
    DivisionByZero,
    #[error("character '{0}' cannot be represented as a byte")]
    CharNotByte(char),

    #[error("invalid label name '{0}'")]
    InvalidLabel(String),
    #[error("'{0}' is a reserved word and cannot be used as label")]
    ReservedWord(String),
    #[error("label '{0}' already defined")]
    DuplicateLabel(String),
    #[error("label '{0}' not defined")]
    UndefinedLabel(String),
    #[error("register '{0}' not allowed in expression")]
    RegisterInExpr(String),

    #[error("unknown instruction '{0}'")]
    UnknownMnemonic(String),
    #[error("instruction does not exist with these operands")]
    InvalidOperands,
    #[error("working register expected")]
    WorkingRegExpected,
    #[error("working register R{0} does not exist (R0..R15)")]
    WorkingRegRange(u32),
    #[error("one operand must be an indirect register pair")]
    IndirectPairExpected,
    #[error("value %{0:04X} out of 8-bit range")]
    ValueOutOfRange(u16),
    #[error("register number %{0:X} out of range (%00..%FF)")]
    RegisterOutOfRange(u32),
    #[error("relative jump distance too large")]
    RelativeTooFar,

    #[error("{0}")]
    Directive(String),
    #[error("{0}")]
    User(String),

    #[error("too many errors, assembly aborted")]
    TooManyErrors,
    #[error("internal error: line {line} is {pass1} bytes in pass 1 but {pass2} bytes in pass 2")]
    PassMismatch { line: usize, pass1: u32, pass2: u32 },

    #[error("invalid options: {0}")]
    Options(String),
}

pub type Result<T> = std::result::Result<T, Error>;
