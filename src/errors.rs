/// glint error types
///
/// Front-end errors (lexical, parse) carry a `Span` and get rendered through
/// `diagnostics::DiagnosticEngine`. Runtime type/bounds errors are NOT
/// modeled here as `Result` failures — per the language's design the VM logs
/// a diagnostic and degrades to `None`, it never unwinds (see `vm.rs`). The
/// only exceptions are the small set of genuinely fatal front-end failures
/// collected in `FrontendError`.
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

// ---------------------------------------------------------------------------
// Lexical errors
// ---------------------------------------------------------------------------
#[derive(Debug, Clone)]
pub enum LexError {
    UnexpectedCharacter { ch: char, span: Span },
    InvalidNumber { text: String, span: Span },
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnexpectedCharacter { ch, .. } => {
                write!(f, "unexpected character '{}'", ch)
            }
            LexError::InvalidNumber { text, .. } => {
                write!(f, "invalid numeric literal '{}'", text)
            }
        }
    }
}

impl std::error::Error for LexError {}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedCharacter { span, .. } => *span,
            LexError::InvalidNumber { span, .. } => *span,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------
#[derive(Debug, Clone)]
pub enum ParseError {
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    UnexpectedEof {
        context: String,
        span: Span,
    },
    InvalidSyntax {
        context: String,
        span: Span,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken { expected, found, .. } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            ParseError::UnexpectedEof { context, .. } => {
                write!(f, "unexpected end of file while parsing {}", context)
            }
            ParseError::InvalidSyntax { context, .. } => {
                write!(f, "invalid syntax in {}", context)
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. } => *span,
            ParseError::UnexpectedEof { span, .. } => *span,
            ParseError::InvalidSyntax { span, .. } => *span,
        }
    }
}

// ---------------------------------------------------------------------------
// Compile-time errors (name resolution, loop-control placement)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone)]
pub enum CompileError {
    UndefinedVariable { name: String, span: Span },
    BreakOutsideLoop { span: Span },
    ContinueOutsideLoop { span: Span },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UndefinedVariable { name, .. } => write!(f, "undefined variable or function '{}'", name),
            CompileError::BreakOutsideLoop { .. } => write!(f, "'break' outside of a loop"),
            CompileError::ContinueOutsideLoop { .. } => write!(f, "'continue' outside of a loop"),
        }
    }
}

impl std::error::Error for CompileError {}

impl CompileError {
    pub fn span(&self) -> Span {
        match self {
            CompileError::UndefinedVariable { span, .. } => *span,
            CompileError::BreakOutsideLoop { span } => *span,
            CompileError::ContinueOutsideLoop { span } => *span,
        }
    }
}

// ---------------------------------------------------------------------------
// Front-end failure — the only errors that make the CLI exit non-zero
// ---------------------------------------------------------------------------
#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("no function named 'main' with zero parameters")]
    NoMain,
}
