//! Static type checker
//!
//! Second pass over a module. Reads the tables built by the
//! [`SemanticAnalyzer`] and reports type inconsistencies as diagnostics
//! worded the way mypy words them. Uses gradual typing: untyped code resolves
//! to `Any`, which is compatible with everything.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use tracing::trace;

use crate::analyzer::SemanticAnalyzer;
use crate::ast::*;
use crate::error::{CheckError, Result};
use crate::symbols::{FunctionSignature, SymbolTables};
use crate::types::Type;

/// What a diagnostic reports
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    /// A call argument does not match the declared parameter type
    ArgType {
        position: usize,
        function: String,
        actual: Type,
        expected: Type,
    },
    /// An assigned value does not match the variable's declared type
    Assignment { actual: Type, declared: Type },
    /// A returned value does not match the function's declared return type
    ReturnValue { actual: Type, expected: Type },
    /// Operand types of a binary operation differ
    Operator { op: BinaryOp, left: Type, right: Type },
}

/// A diagnostic produced by the type checker
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Line of the statement that produced the diagnostic
    pub line: usize,
}

impl Diagnostic {
    /// mypy error code
    pub fn code(&self) -> &'static str {
        match self.kind {
            DiagnosticKind::ArgType { .. } => "arg-type",
            DiagnosticKind::Assignment { .. } => "assignment",
            DiagnosticKind::ReturnValue { .. } => "return-value",
            DiagnosticKind::Operator { .. } => "operator",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DiagnosticKind::ArgType {
                position,
                function,
                actual,
                expected,
            } => write!(
                f,
                "Argument {} to \"{}\" has incompatible type \"{}\"; expected \"{}\"  [arg-type]",
                position, function, actual, expected
            ),
            DiagnosticKind::Assignment { actual, declared } => write!(
                f,
                "Incompatible types in assignment (expression has type \"{}\", variable has type \"{}\") [assignment]",
                actual, declared
            ),
            DiagnosticKind::ReturnValue { actual, expected } => write!(
                f,
                "Incompatible return value type (got \"{}\", expected \"{}\")  [return-value]",
                actual, expected
            ),
            DiagnosticKind::Operator { op, left, right } => write!(
                f,
                "Unsupported operand types for {} (\"{}\" and \"{}\")  [operator]",
                op, left, right
            ),
        }
    }
}

impl Serialize for Diagnostic {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Diagnostic", 3)?;
        state.serialize_field("line", &self.line)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Type checker over a finished analysis
pub struct TypeChecker<'a> {
    tables: &'a SymbolTables,
}

impl<'a> TypeChecker<'a> {
    /// Fails with [`CheckError::AnalyzerNotDone`] unless `analyzer` has
    /// completed its pass.
    pub fn new(analyzer: &'a SemanticAnalyzer) -> Result<Self> {
        if !analyzer.is_done() {
            return Err(CheckError::AnalyzerNotDone);
        }
        Ok(TypeChecker {
            tables: analyzer.tables(),
        })
    }

    /// Check `module` and return its diagnostics in source order.
    ///
    /// The checker keeps no state between calls, so checking the same module
    /// again yields the same diagnostics.
    pub fn check(&self, module: &Module) -> Result<Vec<Diagnostic>> {
        let _span = tracing::info_span!("check", statements = module.body.len()).entered();

        let mut ctx = CheckContext {
            tables: self.tables,
            diagnostics: Vec::new(),
        };
        ctx.check_block(&module.body, false)?;

        trace!(diagnostics = ctx.diagnostics.len(), "check complete");
        Ok(ctx.diagnostics)
    }
}

/// Where a call's result flows
#[derive(Clone, Copy)]
enum CallContext<'s> {
    /// Bare expression statement; the result is discarded
    Statement,
    /// Right-hand side of `target: T = call(...)`
    Assignment { target: &'s str },
    /// `return call(...)` in a function declared to return `declared`
    Return { declared: &'s Type },
}

/// State of a single `check` run
struct CheckContext<'a> {
    tables: &'a SymbolTables,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> CheckContext<'a> {
    fn emit(&mut self, kind: DiagnosticKind, line: usize) {
        let diagnostic = Diagnostic { kind, line };
        trace!(line, code = diagnostic.code(), "diagnostic");
        self.diagnostics.push(diagnostic);
    }

    // ── Statements ────────────────────────────────────────────────────

    fn check_block(&mut self, body: &[Statement], in_function: bool) -> Result<()> {
        for stmt in body {
            self.check_statement(stmt, in_function)?;
        }
        Ok(())
    }

    fn check_statement(&mut self, stmt: &Statement, in_function: bool) -> Result<()> {
        match &stmt.kind {
            StatementKind::AnnAssign { target, value, .. } => {
                self.check_annotated_assignment(target, value.as_ref(), stmt.line)?
            }
            StatementKind::Expr(Expression::Call { func, args }) => {
                self.check_call(func, args, CallContext::Statement, stmt.line)?
            }
            StatementKind::FunctionDef { name, body, .. } if !in_function => {
                self.check_function_def(name, body)?
            }
            StatementKind::FunctionDef { .. } => {
                return Err(CheckError::unsupported(
                    "nested function definition",
                    stmt.line,
                ))
            }
            // Returns are validated with their enclosing function
            StatementKind::Assign { .. }
            | StatementKind::Return(_)
            | StatementKind::Expr(_)
            | StatementKind::Import { .. }
            | StatementKind::ImportFrom { .. } => {}
            StatementKind::ClassDef { .. }
            | StatementKind::If { .. }
            | StatementKind::While { .. }
            | StatementKind::For { .. }
            | StatementKind::AugAssign { .. }
            | StatementKind::Pass => {
                return Err(CheckError::unsupported(stmt.kind.name(), stmt.line))
            }
        }
        Ok(())
    }

    fn declared_variable(&self, name: &str, line: usize) -> Result<&'a Type> {
        let tables = self.tables;
        tables
            .variable(name)
            .ok_or_else(|| CheckError::UndeclaredVariable {
                name: name.to_string(),
                line,
            })
    }

    /// `name: T = value` where the value is an int literal, a str literal or a
    /// call. String literals are checked against `str` as mypy checks them, so
    /// `s: int = 'a'` is reported here while a checker that only looks at int
    /// literals stays silent on it.
    fn check_annotated_assignment(
        &mut self,
        target: &str,
        value: Option<&Expression>,
        line: usize,
    ) -> Result<()> {
        match value {
            Some(Expression::Integer(_)) => self.check_literal_assignment(target, Type::Int, line),
            Some(Expression::Str(_)) => self.check_literal_assignment(target, Type::Str, line),
            Some(Expression::Call { func, args }) => {
                self.check_call(func, args, CallContext::Assignment { target }, line)
            }
            _ => Ok(()),
        }
    }

    fn check_literal_assignment(&mut self, target: &str, actual: Type, line: usize) -> Result<()> {
        let declared = self.declared_variable(target, line)?;
        if !actual.compatible_with(declared) {
            self.emit(
                DiagnosticKind::Assignment {
                    actual,
                    declared: declared.clone(),
                },
                line,
            );
        }
        Ok(())
    }

    fn check_function_def(&mut self, name: &str, body: &[Statement]) -> Result<()> {
        self.check_block(body, true)?;

        let tables = self.tables;
        let Some(signature) = tables.function(name) else {
            return Ok(());
        };
        let declared = &signature.return_type;

        // Only the first return statement is validated
        let returned = body.iter().find_map(|s| match &s.kind {
            StatementKind::Return(value) => Some((value.as_ref(), s.line)),
            _ => None,
        });

        match returned {
            Some((Some(Expression::Call { func, args }), line)) => {
                self.check_call(func, args, CallContext::Return { declared }, line)
            }
            Some((Some(value), line)) => {
                let actual = self.resolve_expression(value, line);
                if !actual.compatible_with(declared) {
                    self.emit(
                        DiagnosticKind::ReturnValue {
                            actual,
                            expected: declared.clone(),
                        },
                        line,
                    );
                }
                Ok(())
            }
            // a bare `return` or no return at all resolves to Any
            Some((None, _)) | None => Ok(()),
        }
    }

    // ── Calls ─────────────────────────────────────────────────────────

    /// Look up the signature of a call target. Only plain names resolve.
    fn signature_of<'f>(&self, func: &'f Expression) -> Option<(&'f str, &'a FunctionSignature)> {
        let tables = self.tables;
        match func {
            Expression::Name(name) => tables.function(name).map(|sig| (name.as_str(), sig)),
            _ => None,
        }
    }

    fn check_call(
        &mut self,
        func: &Expression,
        args: &[Expression],
        context: CallContext<'_>,
        line: usize,
    ) -> Result<()> {
        // Unknown callees are Any
        let Some((name, signature)) = self.signature_of(func) else {
            return Ok(());
        };

        if args.len() != signature.arity() {
            return Err(CheckError::ArityMismatch {
                function: name.to_string(),
                expected: signature.arity(),
                got: args.len(),
                line,
            });
        }

        self.check_arguments(name, signature, args, line)?;
        self.check_call_result(signature, args, context, line)
    }

    fn check_arguments(
        &mut self,
        name: &str,
        signature: &FunctionSignature,
        args: &[Expression],
        line: usize,
    ) -> Result<()> {
        for (index, (arg, (_, expected))) in args.iter().zip(&signature.params).enumerate() {
            // Generic parameters are checked through the call's result
            if expected.is_any() || expected.is_generic() {
                continue;
            }

            let actual = match arg {
                Expression::Integer(_) => Type::Int,
                Expression::Str(_) => Type::Str,
                other => {
                    return Err(CheckError::unsupported(
                        format!("{} as a call argument", other.kind_name()),
                        line,
                    ))
                }
            };

            if &actual != expected {
                self.emit(
                    DiagnosticKind::ArgType {
                        position: index + 1,
                        function: name.to_string(),
                        actual,
                        expected: expected.clone(),
                    },
                    line,
                );
            }
        }
        Ok(())
    }

    fn check_call_result(
        &mut self,
        signature: &FunctionSignature,
        args: &[Expression],
        context: CallContext<'_>,
        line: usize,
    ) -> Result<()> {
        let actual = match &signature.return_type {
            Type::Any => return Ok(()),
            Type::Generic(_) => Self::resolve_generic_return(signature, args),
            concrete => concrete.clone(),
        };

        match context {
            CallContext::Statement => {}
            CallContext::Assignment { target } => {
                let declared = self.declared_variable(target, line)?;
                if !actual.compatible_with(declared) {
                    self.emit(
                        DiagnosticKind::Assignment {
                            actual,
                            declared: declared.clone(),
                        },
                        line,
                    );
                }
            }
            CallContext::Return { declared } => {
                if !actual.compatible_with(declared) {
                    self.emit(
                        DiagnosticKind::ReturnValue {
                            actual,
                            expected: declared.clone(),
                        },
                        line,
                    );
                }
            }
        }
        Ok(())
    }

    /// A generic return type is `int` when a parameter declared with the same
    /// generic received an integer literal, and `Any` otherwise.
    fn resolve_generic_return(signature: &FunctionSignature, args: &[Expression]) -> Type {
        let generic = &signature.return_type;
        let bound_to_int = signature
            .params
            .iter()
            .zip(args)
            .any(|((_, ty), arg)| ty == generic && matches!(arg, Expression::Integer(_)));

        if bound_to_int {
            Type::Int
        } else {
            Type::Any
        }
    }

    // ── Expressions ───────────────────────────────────────────────────

    /// Resolve the type of an expression. Names are never inferred.
    fn resolve_expression(&mut self, expr: &Expression, line: usize) -> Type {
        match expr {
            Expression::Integer(_) => Type::Int,
            Expression::Str(_) => Type::Str,
            Expression::Call { func, .. } => self
                .signature_of(func)
                .map(|(_, sig)| sig.return_type.clone())
                .unwrap_or(Type::Any),
            Expression::Name(_) => Type::Any,
            Expression::BinaryOp { left, op, right } => {
                self.resolve_binary_operation(left, *op, right, line)
            }
            _ => Type::Any,
        }
    }

    /// Both operands must agree unless one is `Any`. The result is the left
    /// operand's type either way.
    fn resolve_binary_operation(
        &mut self,
        left: &Expression,
        op: BinaryOp,
        right: &Expression,
        line: usize,
    ) -> Type {
        let left = self.resolve_expression(left, line);
        let right = self.resolve_expression(right, line);

        if left.is_any() || right.is_any() {
            return Type::Any;
        }
        if left != right {
            self.emit(
                DiagnosticKind::Operator {
                    op,
                    left: left.clone(),
                    right,
                },
                line,
            );
        }
        left
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> Result<Vec<Diagnostic>> {
        let module = parse_source(source).unwrap();
        let mut analyzer = SemanticAnalyzer::new();
        analyzer.analyze(&module)?;
        TypeChecker::new(&analyzer)?.check(&module)
    }

    fn check(source: &str) -> Vec<String> {
        run(source)
            .unwrap()
            .iter()
            .map(|d| d.to_string())
            .collect()
    }

    const GENERICS_CASE: &str = r#"from typing import TypeVar
from copy import deepcopy

T = TypeVar("T")

def f(x: T) -> T:
    return deepcopy(x)

x: int = 1
copy_x: str = f(1)
"#;

    // ── End-to-end scenarios ────────────────────────────────────

    #[test]
    fn test_generic_call_assigned_to_wrong_type() {
        assert_eq!(
            check(GENERICS_CASE),
            vec![
                "Incompatible types in assignment (expression has type \"int\", variable has type \"str\") [assignment]"
            ]
        );
    }

    #[test]
    fn test_generic_diagnostic_line() {
        let diags = run(GENERICS_CASE).unwrap();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 10);
        assert_eq!(diags[0].code(), "assignment");
    }

    #[test]
    fn test_bare_call_with_wrong_argument() {
        let source = "def g(x: int) -> int:\n    return x\n\ng(\"a\")\n";
        assert_eq!(
            check(source),
            vec!["Argument 1 to \"g\" has incompatible type \"str\"; expected \"int\"  [arg-type]"]
        );
    }

    // ── Annotated assignments ───────────────────────────────────

    #[test]
    fn test_int_literal_assignment() {
        assert!(check("v: int = 1").is_empty());
        assert_eq!(
            check("v: str = 1"),
            vec!["Incompatible types in assignment (expression has type \"int\", variable has type \"str\") [assignment]"]
        );
        assert_eq!(
            check("v: float = 1"),
            vec!["Incompatible types in assignment (expression has type \"int\", variable has type \"float\") [assignment]"]
        );
        assert!(check("from typing import Any\nv: Any = 1").is_empty());
    }

    #[test]
    fn test_str_literal_assignment() {
        assert!(check("s: str = 'a'").is_empty());
        assert_eq!(
            check("s: int = 'a'"),
            vec!["Incompatible types in assignment (expression has type \"str\", variable has type \"int\") [assignment]"]
        );
    }

    #[test]
    fn test_other_values_are_not_checked() {
        assert!(check("v: int = [1, 2]\nw: str = 1.5\nu: int = other\n").is_empty());
        assert!(check("declared_only: int").is_empty());
    }

    #[test]
    fn test_call_result_assignment() {
        let source = "def g() -> int:\n    return 1\ny: str = g()\nz: int = g()\n";
        assert_eq!(
            check(source),
            vec!["Incompatible types in assignment (expression has type \"int\", variable has type \"str\") [assignment]"]
        );
    }

    #[test]
    fn test_argument_and_result_both_reported() {
        let source = "def g(x: int) -> int:\n    return x\ny: str = g('a')\n";
        assert_eq!(
            check(source),
            vec![
                "Argument 1 to \"g\" has incompatible type \"str\"; expected \"int\"  [arg-type]",
                "Incompatible types in assignment (expression has type \"int\", variable has type \"str\") [assignment]",
            ]
        );
    }

    #[test]
    fn test_unknown_callee_is_any() {
        assert!(check("y: str = unknown(1)\nprint('x')\n").is_empty());
    }

    // ── Arguments ───────────────────────────────────────────────

    #[test]
    fn test_argument_positions() {
        let source = "def h(a: int, b: str, c: int) -> int:\n    return a\nh(1, 2, 'x')\n";
        assert_eq!(
            check(source),
            vec![
                "Argument 2 to \"h\" has incompatible type \"int\"; expected \"str\"  [arg-type]",
                "Argument 3 to \"h\" has incompatible type \"str\"; expected \"int\"  [arg-type]",
            ]
        );
    }

    #[test]
    fn test_any_and_generic_parameters_skip_argument_check() {
        let source = "T = TypeVar('T')\ndef h(a, b: T, c: Any) -> int:\n    return 1\nh(some_name, 'x', 3)\n";
        assert!(check(source).is_empty());
    }

    #[test]
    fn test_arity_mismatch_is_fatal() {
        let err = run("def g(x: int) -> int:\n    return x\ng()\n").unwrap_err();
        assert_eq!(
            err,
            CheckError::ArityMismatch {
                function: "g".into(),
                expected: 1,
                got: 0,
                line: 3,
            }
        );
        assert!(run("def g() -> int:\n    return 1\ng(1)\n").is_err());
    }

    #[test]
    fn test_unresolvable_argument_is_unsupported() {
        let err = run("def g(x: int) -> int:\n    return x\ng(1.5)\n").unwrap_err();
        assert_eq!(
            err,
            CheckError::Unsupported {
                construct: "float literal as a call argument".into(),
                line: 3,
            }
        );
    }

    // ── Generics ────────────────────────────────────────────────

    #[test]
    fn test_generic_with_non_int_argument_resolves_to_any() {
        let source = "T = TypeVar('T')\ndef f(x: T) -> T:\n    return x\nv: str = f('a')\nw: int = f(y)\n";
        assert!(check(source).is_empty());
    }

    #[test]
    fn test_generic_call_as_statement_is_silent() {
        let source = "T = TypeVar('T')\ndef f(x: T) -> T:\n    return x\nf(1)\n";
        assert!(check(source).is_empty());
    }

    #[test]
    fn test_generic_matching_int_assignment() {
        let source = "T = TypeVar('T')\ndef f(x: T) -> T:\n    return x\nv: int = f(1)\n";
        assert!(check(source).is_empty());
    }

    // ── Return values ───────────────────────────────────────────

    #[test]
    fn test_return_literal_mismatch() {
        assert_eq!(
            check("def f() -> str:\n    return 1\n"),
            vec!["Incompatible return value type (got \"int\", expected \"str\")  [return-value]"]
        );
    }

    #[test]
    fn test_return_any_is_never_reported() {
        assert!(check("def f():\n    return 1\n").is_empty());
        assert!(check("def f(x) -> int:\n    return x\n").is_empty());
        assert!(check("def f() -> int:\n    return\n").is_empty());
        assert!(check("def f() -> int:\n    x: int = 1\n").is_empty());
    }

    #[test]
    fn test_only_first_return_is_checked() {
        assert_eq!(
            check("def f() -> int:\n    return 'a'\n    return 1\n"),
            vec!["Incompatible return value type (got \"str\", expected \"int\")  [return-value]"]
        );
    }

    #[test]
    fn test_return_call_compares_declared_types() {
        let source = "def g() -> int:\n    return 1\ndef f() -> str:\n    return g()\n";
        let diags = run(source).unwrap();
        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags[0].to_string(),
            "Incompatible return value type (got \"int\", expected \"str\")  [return-value]"
        );
        assert_eq!(diags[0].line, 4);
    }

    #[test]
    fn test_return_generic_call() {
        let source = "T = TypeVar('T')\ndef ident(x: T) -> T:\n    return x\ndef f() -> str:\n    return ident(1)\n";
        assert_eq!(
            check(source),
            vec!["Incompatible return value type (got \"int\", expected \"str\")  [return-value]"]
        );
    }

    #[test]
    fn test_function_body_statements_are_checked() {
        let diags = run("def f() -> int:\n    v: str = 1\n    return 1\n").unwrap();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code(), "assignment");
        assert_eq!(diags[0].line, 2);
    }

    // ── Binary operations ───────────────────────────────────────

    #[test]
    fn test_operand_mismatch() {
        assert_eq!(
            check("def f() -> int:\n    return 1 + 'a'\n"),
            vec!["Unsupported operand types for + (\"int\" and \"str\")  [operator]"]
        );
    }

    #[test]
    fn test_operand_mismatch_resolves_to_left_type() {
        assert_eq!(
            check("def f() -> str:\n    return 1 - 'a'\n"),
            vec![
                "Unsupported operand types for - (\"int\" and \"str\")  [operator]",
                "Incompatible return value type (got \"int\", expected \"str\")  [return-value]",
            ]
        );
    }

    #[test]
    fn test_matching_operands_resolve_to_common_type() {
        assert!(check("def f() -> int:\n    return 1 * 2\n").is_empty());
        assert_eq!(
            check("def f() -> str:\n    return 1 + 2\n"),
            vec!["Incompatible return value type (got \"int\", expected \"str\")  [return-value]"]
        );
    }

    #[test]
    fn test_any_operand_absorbs() {
        assert!(check("def f(x) -> str:\n    return x + 1\n").is_empty());
        assert!(check("def f() -> str:\n    return unknown() + 1\n").is_empty());
    }

    #[test]
    fn test_operand_call_uses_declared_return() {
        let source = "def g() -> str:\n    return 'a'\ndef f() -> int:\n    return 1 + g()\n";
        assert_eq!(
            check(source),
            vec!["Unsupported operand types for + (\"int\" and \"str\")  [operator]"]
        );
    }

    // ── Checker lifecycle ───────────────────────────────────────

    #[test]
    fn test_checker_requires_finished_analysis() {
        let analyzer = SemanticAnalyzer::new();
        assert_eq!(
            TypeChecker::new(&analyzer).err(),
            Some(CheckError::AnalyzerNotDone)
        );
    }

    #[test]
    fn test_check_is_idempotent() {
        let module = parse_source(GENERICS_CASE).unwrap();
        let mut analyzer = SemanticAnalyzer::new();
        analyzer.analyze(&module).unwrap();
        let checker = TypeChecker::new(&analyzer).unwrap();

        let first = checker.check(&module).unwrap();
        let second = checker.check(&module).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unsupported_statement_in_checked_module() {
        let analyzed = parse_source("x: int = 1\n").unwrap();
        let mut analyzer = SemanticAnalyzer::new();
        analyzer.analyze(&analyzed).unwrap();

        let other = parse_source("while x:\n    pass\n").unwrap();
        let err = TypeChecker::new(&analyzer).unwrap().check(&other).unwrap_err();
        assert_eq!(err, CheckError::unsupported("while loop", 1));
    }

    #[test]
    fn test_undeclared_assignment_target() {
        let analyzed = parse_source("x: int = 1\n").unwrap();
        let mut analyzer = SemanticAnalyzer::new();
        analyzer.analyze(&analyzed).unwrap();

        let other = parse_source("y: int = 1\n").unwrap();
        let err = TypeChecker::new(&analyzer).unwrap().check(&other).unwrap_err();
        assert_eq!(
            err,
            CheckError::UndeclaredVariable {
                name: "y".into(),
                line: 1,
            }
        );
    }

    #[test]
    fn test_json_serialization() {
        let diags = run("v: str = 1\n").unwrap();
        let json = serde_json::to_value(&diags).unwrap();
        assert_eq!(json[0]["line"], 1);
        assert_eq!(json[0]["code"], "assignment");
        assert!(json[0]["message"]
            .as_str()
            .unwrap()
            .starts_with("Incompatible types in assignment"));
    }
}
