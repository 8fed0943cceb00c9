/// Rich, source-highlighted diagnostics for front-end failures.
///
/// Only lex/parse/no-main failures go through here (spec: runtime type and
/// bounds errors log and degrade to `None` instead of aborting — see
/// `vm.rs`). Modeled on `axiom::diagnostics`'s `ErrorCode` + `AxiomDiagnostic`
/// pair, trimmed to the error surface this language actually has.
use crate::errors::{CompileError, FrontendError, LexError, ParseError, Span};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UnexpectedCharacter,
    InvalidNumber,
    UnexpectedToken,
    UnexpectedEof,
    InvalidSyntax,
    UndefinedVariable,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    NoMain,
    Io,
}

impl ErrorCode {
    pub fn prefix(&self) -> &'static str {
        match self {
            ErrorCode::UnexpectedCharacter => "GLT_101",
            ErrorCode::InvalidNumber => "GLT_102",
            ErrorCode::UnexpectedToken => "GLT_201",
            ErrorCode::UnexpectedEof => "GLT_202",
            ErrorCode::InvalidSyntax => "GLT_203",
            ErrorCode::UndefinedVariable => "GLT_301",
            ErrorCode::BreakOutsideLoop => "GLT_303",
            ErrorCode::ContinueOutsideLoop => "GLT_304",
            ErrorCode::NoMain => "GLT_401",
            ErrorCode::Io => "GLT_001",
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ErrorCode::UnexpectedCharacter => Some("remove or replace the offending character"),
            ErrorCode::InvalidNumber => Some("check the digits and exponent of this literal"),
            ErrorCode::UnexpectedToken => Some("check for a missing token just before this point"),
            ErrorCode::UnexpectedEof => Some("the file ends before this construct is closed"),
            ErrorCode::InvalidSyntax => None,
            ErrorCode::UndefinedVariable => Some("declare the variable or function before using it"),
            ErrorCode::BreakOutsideLoop => Some("move this `break` inside a `while` or `for` loop"),
            ErrorCode::ContinueOutsideLoop => Some("move this `continue` inside a `while` or `for` loop"),
            ErrorCode::NoMain => Some("define `int main() { ... }` (or a matching return type) with no parameters"),
            ErrorCode::Io => None,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("{code_str}: {message}")]
pub struct GlintDiagnostic {
    message: String,
    code_str: &'static str,
    #[help]
    help: Option<&'static str>,
    #[source_code]
    src: Option<NamedSource<String>>,
    #[label("here")]
    span: Option<SourceSpan>,
}

impl GlintDiagnostic {
    fn new(code: ErrorCode, message: String, src_name: &str, source: &str, span: Option<Span>) -> Self {
        GlintDiagnostic {
            message,
            code_str: code.prefix(),
            help: code.hint(),
            src: Some(NamedSource::new(src_name.to_string(), source.to_string())),
            span: span.map(|s| SourceSpan::from((s.start, s.end.saturating_sub(s.start).max(1)))),
        }
    }

    fn no_source(code: ErrorCode, message: String) -> Self {
        GlintDiagnostic {
            message,
            code_str: code.prefix(),
            help: code.hint(),
            src: None,
            span: None,
        }
    }
}

pub struct DiagnosticEngine {
    src_name: String,
    source: String,
}

impl DiagnosticEngine {
    pub fn new(src_name: String, source: &str) -> Self {
        DiagnosticEngine {
            src_name,
            source: source.to_string(),
        }
    }

    pub fn from_lex(&self, err: &LexError) -> GlintDiagnostic {
        let code = match err {
            LexError::UnexpectedCharacter { .. } => ErrorCode::UnexpectedCharacter,
            LexError::InvalidNumber { .. } => ErrorCode::InvalidNumber,
        };
        GlintDiagnostic::new(code, err.to_string(), &self.src_name, &self.source, Some(err.span()))
    }

    pub fn from_parse(&self, err: &ParseError) -> GlintDiagnostic {
        let code = match err {
            ParseError::UnexpectedToken { .. } => ErrorCode::UnexpectedToken,
            ParseError::UnexpectedEof { .. } => ErrorCode::UnexpectedEof,
            ParseError::InvalidSyntax { .. } => ErrorCode::InvalidSyntax,
        };
        GlintDiagnostic::new(code, err.to_string(), &self.src_name, &self.source, Some(err.span()))
    }

    pub fn from_compile(&self, err: &CompileError) -> GlintDiagnostic {
        let code = match err {
            CompileError::UndefinedVariable { .. } => ErrorCode::UndefinedVariable,
            CompileError::BreakOutsideLoop { .. } => ErrorCode::BreakOutsideLoop,
            CompileError::ContinueOutsideLoop { .. } => ErrorCode::ContinueOutsideLoop,
        };
        GlintDiagnostic::new(code, err.to_string(), &self.src_name, &self.source, Some(err.span()))
    }

    pub fn from_frontend(&self, err: &FrontendError) -> GlintDiagnostic {
        match err {
            FrontendError::Io { .. } => GlintDiagnostic::no_source(ErrorCode::Io, err.to_string()),
            FrontendError::Lex(e) => self.from_lex(e),
            FrontendError::Parse(e) => self.from_parse(e),
            FrontendError::Compile(e) => self.from_compile(e),
            FrontendError::NoMain => GlintDiagnostic::no_source(ErrorCode::NoMain, err.to_string()),
        }
    }

    pub fn emit(&self, diag: GlintDiagnostic) {
        eprintln!("{:?}", miette::Report::new(diag));
    }
}
