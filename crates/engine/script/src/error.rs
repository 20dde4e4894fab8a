use thiserror::Error;

use crate::expr::ExprError;

/// Script compilation errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("line {line}: {kind}")]
    Compile { line: usize, kind: CompileErrorKind },

    #[error("Script declares no atoms")]
    NoAtoms,

    #[error("Failed to read script: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Line number of a positioned compile error
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Compile { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// What went wrong on a script line
#[derive(Debug, Error)]
pub enum CompileErrorKind {
    #[error("expected {expected}, found `{found}`")]
    Syntax {
        expected: &'static str,
        found: String,
    },

    #[error("unexpected `{trailing}` after {expected}")]
    Trailing {
        expected: &'static str,
        trailing: String,
    },

    #[error("{0}")]
    Expression(#[from] ExprError),

    #[error("`{0}` is not allowed here")]
    Misplaced(String),

    #[error("unknown section `{0}`")]
    UnknownSection(String),

    #[error("unmatched `}}`")]
    UnmatchedBrace,

    #[error("unterminated block comment")]
    UnterminatedComment,

    #[error("atom `{0}` is already declared")]
    DuplicateAtom(String),

    #[error("invalid rule box: anchor ({ox}, {oy}) in {width}x{height}")]
    InvalidBox { ox: u8, oy: u8, width: u8, height: u8 },

    #[error("unknown symmetry `{0}` (expected x, y or xy)")]
    InvalidSymmetry(String),

    #[error("probability {0} is outside [0, 1]")]
    InvalidProbability(f64),

    #[error("pattern row has {found} symbols, expected {expected}")]
    PatternRowWidth { expected: usize, found: usize },

    #[error("pattern has {found} rows, expected {expected}")]
    PatternRows { expected: usize, found: usize },

    #[error("pattern declared twice in one block")]
    DuplicatePattern,

    #[error("effect maps a pattern but declares none")]
    MissingEffectPattern,

    #[error("effect symbol `{0}` is not bound by `def` and names no atom or alias")]
    UnknownEffectSymbol(String),

    #[error("bind coordinate ({x}, {y}) lies outside the {width}x{height} rule box")]
    BindOutsideBox { x: u8, y: u8, width: u8, height: u8 },

    #[error("previous rule is still open")]
    RuleOpen,

    #[error("no previous rule to repeat")]
    NothingToRepeat,

    #[error("unknown extension `{0}` (expected fall, sandLike or randomMove)")]
    UnknownExtension(String),

    #[error("extension `{name}` is missing parameter `{param}`")]
    MissingParameter { name: String, param: &'static str },

    #[error("invalid value `{value}` for `{name}`")]
    InvalidValue { name: String, value: String },

    #[error("unknown flag `-{0}`")]
    UnknownFlag(String),

    #[error("unexpected end of script inside {0}")]
    UnexpectedEof(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
