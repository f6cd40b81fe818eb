//! Abstract Syntax Tree definitions
//!
//! Defines the nodes of the supported Python subset. Every statement carries
//! the line it starts on so diagnostics can point back at the source.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A complete source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub body: Vec<Statement>,
}

/// A statement and the 1-based line it starts on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub line: usize,
    pub kind: StatementKind,
}

impl Statement {
    pub fn new(kind: StatementKind, line: usize) -> Self {
        Statement { line, kind }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StatementKind {
    /// Function definition: `def name(params) -> returns: body`
    FunctionDef {
        name: String,
        params: Vec<Parameter>,
        returns: Option<TypeExpr>,
        body: Vec<Statement>,
    },

    /// Class definition: `class Name(bases): body`
    ClassDef {
        name: String,
        bases: Vec<Expression>,
        body: Vec<Statement>,
    },

    /// `if` statement; `elif` chains nest inside `orelse`
    If {
        condition: Expression,
        body: Vec<Statement>,
        orelse: Vec<Statement>,
    },

    While {
        condition: Expression,
        body: Vec<Statement>,
    },

    For {
        target: Expression,
        iter: Expression,
        body: Vec<Statement>,
    },

    /// Plain assignment: `a = b = value`
    Assign {
        targets: Vec<Expression>,
        value: Expression,
    },

    /// Annotated assignment: `name: annotation = value`
    AnnAssign {
        target: String,
        annotation: TypeExpr,
        value: Option<Expression>,
    },

    /// Augmented assignment: `target += value`
    AugAssign {
        target: Expression,
        op: BinaryOp,
        value: Expression,
    },

    Return(Option<Expression>),

    /// Expression statement
    Expr(Expression),

    /// `import a.b as c, d`
    Import { names: Vec<ImportAlias> },

    /// `from module import a as b, c`
    ImportFrom {
        module: String,
        names: Vec<ImportAlias>,
    },

    Pass,
}

impl StatementKind {
    /// Name of the statement kind, used when reporting unsupported constructs
    pub fn name(&self) -> &'static str {
        match self {
            StatementKind::FunctionDef { .. } => "function definition",
            StatementKind::ClassDef { .. } => "class definition",
            StatementKind::If { .. } => "if statement",
            StatementKind::While { .. } => "while loop",
            StatementKind::For { .. } => "for loop",
            StatementKind::Assign { .. } => "assignment",
            StatementKind::AnnAssign { .. } => "annotated assignment",
            StatementKind::AugAssign { .. } => "augmented assignment",
            StatementKind::Return(_) => "return statement",
            StatementKind::Expr(_) => "expression statement",
            StatementKind::Import { .. } => "import statement",
            StatementKind::ImportFrom { .. } => "from-import statement",
            StatementKind::Pass => "pass statement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportAlias {
    pub name: String,
    pub alias: Option<String>,
}

/// Function parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub annotation: Option<TypeExpr>,
}

/// A type annotation as written in source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExpr {
    /// Simple or dotted name: `int`, `typing.Any`, `None`
    Name(String),
    /// Subscripted annotation: `list[int]`, `dict[str, int]`
    Subscript { base: String, args: Vec<TypeExpr> },
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Name(name) => write!(f, "{}", name),
            TypeExpr::Subscript { base, args } => {
                write!(f, "{}[", base)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Integer(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    NoneLiteral,

    /// Variable reference
    Name(String),

    /// Attribute access: `value.attr`
    Attribute {
        value: Box<Expression>,
        attr: String,
    },

    /// Subscript: `value[index]`
    Subscript {
        value: Box<Expression>,
        index: Box<Expression>,
    },

    /// Call with positional arguments
    Call {
        func: Box<Expression>,
        args: Vec<Expression>,
    },

    BinaryOp {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },

    UnaryOp {
        op: UnaryOp,
        operand: Box<Expression>,
    },

    List(Vec<Expression>),
}

impl Expression {
    /// Name of the expression kind, used when reporting unsupported constructs
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expression::Integer(_) => "integer literal",
            Expression::Float(_) => "float literal",
            Expression::Str(_) => "string literal",
            Expression::Bool(_) => "boolean literal",
            Expression::NoneLiteral => "None literal",
            Expression::Name(_) => "name",
            Expression::Attribute { .. } => "attribute access",
            Expression::Subscript { .. } => "subscript",
            Expression::Call { .. } => "call",
            Expression::BinaryOp { .. } => "binary operation",
            Expression::UnaryOp { .. } => "unary operation",
            Expression::List(_) => "list display",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    And,
    Or,
}

impl BinaryOp {
    /// Source symbol of the operator
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtE => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtE => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}
