//! Error types for minitype

use thiserror::Error;

/// Result type alias for minitype operations
pub type Result<T> = std::result::Result<T, CheckError>;

/// Fatal errors that abort a check.
///
/// Type inconsistencies are not errors: they are reported as
/// [`Diagnostic`](crate::typechecker::Diagnostic) values and checking continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Parser error at line {line}: {message}")]
    ParserError { line: usize, message: String },

    /// A construct outside the supported statement/expression grammar
    #[error("Unsupported construct at line {line}: {construct}")]
    Unsupported { construct: String, line: usize },

    #[error("Semantic analyzer is not done yet; run analyze() before creating a type checker")]
    AnalyzerNotDone,

    #[error("Semantic analyzer has already analyzed a module")]
    AnalyzerAlreadyDone,

    #[error("Arity mismatch at line {line}: \"{function}\" expects {expected} arguments, got {got}")]
    ArityMismatch {
        function: String,
        expected: usize,
        got: usize,
        line: usize,
    },

    #[error("Undeclared variable '{name}' at line {line}")]
    UndeclaredVariable { name: String, line: usize },
}

impl CheckError {
    pub(crate) fn unsupported(construct: impl Into<String>, line: usize) -> Self {
        CheckError::Unsupported {
            construct: construct.into(),
            line,
        }
    }

    /// Source line the error points at, if any
    pub fn line(&self) -> Option<usize> {
        match self {
            CheckError::LexerError { line, .. }
            | CheckError::ParserError { line, .. }
            | CheckError::Unsupported { line, .. }
            | CheckError::ArityMismatch { line, .. }
            | CheckError::UndeclaredVariable { line, .. } => Some(*line),
            CheckError::AnalyzerNotDone | CheckError::AnalyzerAlreadyDone => None,
        }
    }
}
