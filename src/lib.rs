//! minitype
//!
//! A two-pass static type checker for a small subset of Python. The semantic
//! analyzer collects generic parameters, function signatures and annotated
//! variables; the type checker then reports inconsistencies as mypy-style
//! diagnostics.

pub mod analyzer;
pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod symbols;
pub mod typechecker;
pub mod types;

pub use analyzer::{AnalyzerOptions, SemanticAnalyzer};
pub use error::{CheckError, Result};
pub use typechecker::{Diagnostic, DiagnosticKind, TypeChecker};

/// Parse, analyze and type check `source` with the default options
pub fn check_source(source: &str) -> Result<Vec<Diagnostic>> {
    check_source_with_options(source, &AnalyzerOptions::default())
}

pub fn check_source_with_options(
    source: &str,
    options: &AnalyzerOptions,
) -> Result<Vec<Diagnostic>> {
    let module = parser::parse_source(source)?;

    let mut analyzer = SemanticAnalyzer::with_options(options.clone());
    analyzer.analyze(&module)?;

    TypeChecker::new(&analyzer)?.check(&module)
}
