use std::fmt;

/// Every fatal assemble-time error, each carrying the 1-based source line
/// that caused it where one is known.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AssembleError {
    Syntax { line: u32, message: String },
    DuplicateLabel { line: u32, label: String },
    UndefinedLabel { label: String },
    ReservedName { line: u32, name: String },
    StartNotFirst { line: u32 },
    EndNotLast { line: u32 },
    MissingEnd,
    MalformedDc { line: u32, message: String },
    UnknownMnemonic { line: u32, mnemonic: String },
    WrongArity {
        line: u32,
        mnemonic: String,
        expected: usize,
        found: usize,
    },
    BadRegister { line: u32, name: String },
    ProgramTooLarge { len: usize },
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AssembleError::Syntax { line, message } => {
                write!(f, "line {}: syntax error: {}", line, message)
            }
            AssembleError::DuplicateLabel { line, label } => {
                write!(f, "line {}: duplicate label '{}'", line, label)
            }
            AssembleError::UndefinedLabel { label } => {
                write!(f, "undefined label '{}'", label)
            }
            AssembleError::ReservedName { line, name } => write!(
                f,
                "line {}: '{}' is a reserved register name and cannot be used as a label",
                line, name
            ),
            AssembleError::StartNotFirst { line } => {
                write!(f, "line {}: START must be the first statement", line)
            }
            AssembleError::EndNotLast { line } => {
                write!(f, "line {}: statement follows END", line)
            }
            AssembleError::MissingEnd => write!(f, "program is missing an END statement"),
            AssembleError::MalformedDc { line, message } => {
                write!(f, "line {}: malformed DC operand: {}", line, message)
            }
            AssembleError::UnknownMnemonic { line, mnemonic } => {
                write!(f, "line {}: unknown mnemonic '{}'", line, mnemonic)
            }
            AssembleError::WrongArity {
                line,
                mnemonic,
                expected,
                found,
            } => write!(
                f,
                "line {}: '{}' expects {} operand(s), found {}",
                line, mnemonic, expected, found
            ),
            AssembleError::BadRegister { line, name } => {
                write!(f, "line {}: '{}' is not a valid register name", line, name)
            }
            AssembleError::ProgramTooLarge { len } => {
                write!(f, "assembled program of {} words exceeds memory size", len)
            }
        }
    }
}

impl std::error::Error for AssembleError {}

pub type Result<T> = std::result::Result<T, AssembleError>;
