//! Semantic analyzer
//!
//! First pass over a parsed module. Collects the typing facts the checker
//! needs into [`SymbolTables`]: generic parameters declared through a
//! constructor call (`T = TypeVar("T")`), function signatures, and the
//! declared types of annotated variables.
//!
//! Only a fixed statement grammar is understood. Anything else aborts the
//! analysis with [`CheckError::Unsupported`] instead of being guessed at.

use tracing::{debug, warn};

use crate::ast::*;
use crate::error::{CheckError, Result};
use crate::symbols::{FunctionSignature, SymbolTables};
use crate::types::Type;

/// Names of the callables that declare a generic parameter
pub const DEFAULT_GENERIC_CONSTRUCTORS: &[&str] = &["TypeVar"];

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerOptions {
    /// Callables recognised as generic-parameter constructors. Matched against
    /// the called name, or the attribute name for `typing.TypeVar(...)`.
    pub generic_constructors: Vec<String>,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        AnalyzerOptions {
            generic_constructors: DEFAULT_GENERIC_CONSTRUCTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerState {
    Scanning,
    Done,
}

pub struct SemanticAnalyzer {
    options: AnalyzerOptions,
    tables: SymbolTables,
    state: AnalyzerState,
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self::with_options(AnalyzerOptions::default())
    }

    pub fn with_options(options: AnalyzerOptions) -> Self {
        SemanticAnalyzer {
            options,
            tables: SymbolTables::default(),
            state: AnalyzerState::Scanning,
        }
    }

    pub fn state(&self) -> AnalyzerState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == AnalyzerState::Done
    }

    pub fn tables(&self) -> &SymbolTables {
        &self.tables
    }

    /// Populate the symbol tables from `module`.
    ///
    /// On success the analyzer moves to [`AnalyzerState::Done`]; this happens
    /// once per analyzer and a second call fails. A failed analysis leaves the
    /// analyzer in [`AnalyzerState::Scanning`].
    pub fn analyze(&mut self, module: &Module) -> Result<()> {
        if self.is_done() {
            return Err(CheckError::AnalyzerAlreadyDone);
        }

        let _span = tracing::info_span!("analyze", statements = module.body.len()).entered();

        for stmt in &module.body {
            match &stmt.kind {
                StatementKind::FunctionDef {
                    name,
                    params,
                    returns,
                    body,
                } => self.analyze_function_def(name, params, returns.as_ref(), body)?,
                _ => self.analyze_simple_statement(stmt)?,
            }
        }

        self.tables.resolve_generics();
        self.state = AnalyzerState::Done;
        debug!(
            generics = self.tables.generics().len(),
            functions = self.tables.functions().count(),
            variables = self.tables.variables().count(),
            "analysis complete"
        );
        Ok(())
    }

    fn analyze_function_def(
        &mut self,
        name: &str,
        params: &[Parameter],
        returns: Option<&TypeExpr>,
        body: &[Statement],
    ) -> Result<()> {
        for stmt in body {
            self.analyze_simple_statement(stmt)?;
        }

        let generics = self.tables.generics();
        let signature = FunctionSignature {
            params: params
                .iter()
                .map(|p| {
                    (
                        p.name.clone(),
                        Type::from_optional(p.annotation.as_ref(), generics),
                    )
                })
                .collect(),
            return_type: Type::from_optional(returns, generics),
        };

        debug!(function = name, signature = %signature, "registered function");
        if self.tables.declare_function(name, signature).is_some() {
            debug!(function = name, "function redefined, previous signature replaced");
        }
        Ok(())
    }

    fn analyze_simple_statement(&mut self, stmt: &Statement) -> Result<()> {
        match &stmt.kind {
            StatementKind::Assign { targets, value } => {
                // Unannotated assignments are only interesting as generic declarations
                if let Some((binding, declared)) =
                    self.generic_declaration(targets, value, stmt.line)?
                {
                    if self.tables.generics_mut().register(binding, declared) {
                        debug!(binding, declared, "registered generic parameter");
                    } else {
                        warn!(
                            binding,
                            line = stmt.line,
                            "generic parameter declared twice, keeping the first declaration"
                        );
                    }
                }
            }
            StatementKind::AnnAssign {
                target, annotation, ..
            } => {
                let ty = Type::from_annotation(annotation, self.tables.generics());
                debug!(variable = %target, ty = %ty, "registered variable");
                self.tables.declare_variable(target, ty);
            }
            // Left for the type checker
            StatementKind::Return(_) | StatementKind::Expr(_) => {}
            StatementKind::Import { .. } | StatementKind::ImportFrom { .. } => {}
            StatementKind::FunctionDef { .. } => {
                return Err(CheckError::unsupported(
                    "nested function definition",
                    stmt.line,
                ))
            }
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

    /// Recognise `Name = TypeVar("Name")`, returning the binding and declared names
    fn generic_declaration<'s>(
        &self,
        targets: &'s [Expression],
        value: &'s Expression,
        line: usize,
    ) -> Result<Option<(&'s str, &'s str)>> {
        let Expression::Call { func, args } = value else {
            return Ok(None);
        };
        if !self.is_generic_constructor(func) {
            return Ok(None);
        }

        let binding = match targets.first() {
            Some(Expression::Name(name)) => name,
            _ => {
                return Err(CheckError::unsupported(
                    "generic parameter declaration with a non-name target",
                    line,
                ))
            }
        };
        let declared = match args.first() {
            Some(Expression::Str(name)) => name,
            _ => {
                return Err(CheckError::unsupported(
                    "generic parameter declaration without a string-literal name",
                    line,
                ))
            }
        };

        Ok(Some((binding.as_str(), declared.as_str())))
    }

    fn is_generic_constructor(&self, func: &Expression) -> bool {
        let name = match func {
            Expression::Name(name) => name,
            Expression::Attribute { attr, .. } => attr,
            _ => return false,
        };
        self.options.generic_constructors.iter().any(|c| c == name)
    }
}
