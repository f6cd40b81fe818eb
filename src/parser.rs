//! Parser for the minitype source subset
//!
//! Transforms a stream of tokens into a [`Module`]. The grammar is a small
//! slice of Python: enough to express annotated functions, assignments,
//! calls and the compound statements the checker reports as unsupported.

use crate::ast::*;
use crate::error::{CheckError, Result};
use crate::lexer::{tokenize, Token, TokenKind};

/// Tokenize and parse a complete source file
pub fn parse_source(source: &str) -> Result<Module> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).parse()
}

/// Recursive descent parser
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0 }
    }

    /// Parse a complete module
    pub fn parse(&mut self) -> Result<Module> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            if self.match_token(&[TokenKind::Newline]) {
                continue;
            }
            body.extend(self.statement()?);
        }

        Ok(Module { body })
    }

    // Helper methods

    fn is_at_end(&self) -> bool {
        match self.peek() {
            Some(token) => token.kind == TokenKind::Eof,
            None => true,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.current + 1)
    }

    fn advance(&mut self) {
        if self.current < self.tokens.len() {
            self.current += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        if let Some(token) = self.peek() {
            std::mem::discriminant(&token.kind) == std::mem::discriminant(kind)
        } else {
            false
        }
    }

    fn check_identifier(&self) -> bool {
        matches!(
            self.peek().map(|t| &t.kind),
            Some(TokenKind::Identifier(_))
        )
    }

    fn match_token(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: &TokenKind, message: &str) -> Result<Token> {
        match self.peek() {
            Some(token)
                if std::mem::discriminant(&token.kind) == std::mem::discriminant(kind) =>
            {
                let token = token.clone();
                self.advance();
                Ok(token)
            }
            _ => Err(self.error(message)),
        }
    }

    fn consume_identifier(&mut self, message: &str) -> Result<String> {
        if let Some(Token {
            kind: TokenKind::Identifier(name),
            ..
        }) = self.peek()
        {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error(message))
        }
    }

    fn current_line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(0)
    }

    fn error(&self, message: &str) -> CheckError {
        let found = match self.peek().map(|t| &t.kind) {
            None | Some(TokenKind::Eof) => "end of file".to_string(),
            Some(TokenKind::Newline) => "end of line".to_string(),
            Some(TokenKind::Indent) => "indent".to_string(),
            Some(TokenKind::Dedent) => "dedent".to_string(),
            Some(_) => format!(
                "'{}'",
                self.peek().map(|t| t.lexeme.as_str()).unwrap_or_default()
            ),
        };
        CheckError::ParserError {
            line: self.current_line(),
            message: format!("{}, found {}", message, found),
        }
    }

    // Statements

    fn statement(&mut self) -> Result<Vec<Statement>> {
        let line = self.current_line();

        if self.match_token(&[TokenKind::Def]) {
            Ok(vec![self.function_definition(line)?])
        } else if self.match_token(&[TokenKind::Class]) {
            Ok(vec![self.class_definition(line)?])
        } else if self.match_token(&[TokenKind::If]) {
            Ok(vec![self.if_statement(line)?])
        } else if self.match_token(&[TokenKind::While]) {
            Ok(vec![self.while_statement(line)?])
        } else if self.match_token(&[TokenKind::For]) {
            Ok(vec![self.for_statement(line)?])
        } else if self.check(&TokenKind::At) {
            Err(self.error("Decorators are not supported"))
        } else if self.check(&TokenKind::Indent) {
            Err(self.error("Unexpected indent"))
        } else {
            self.simple_statement_line()
        }
    }

    /// One physical line of `;`-separated simple statements
    fn simple_statement_line(&mut self) -> Result<Vec<Statement>> {
        let mut statements = vec![self.simple_statement()?];

        while self.match_token(&[TokenKind::Semicolon]) {
            if self.check(&TokenKind::Newline) || self.is_at_end() {
                break;
            }
            statements.push(self.simple_statement()?);
        }

        if !self.match_token(&[TokenKind::Newline]) && !self.is_at_end() {
            return Err(self.error("Expected end of statement"));
        }

        Ok(statements)
    }

    fn simple_statement(&mut self) -> Result<Statement> {
        let line = self.current_line();

        let kind = if self.match_token(&[TokenKind::Return]) {
            if self.check(&TokenKind::Newline)
                || self.check(&TokenKind::Semicolon)
                || self.is_at_end()
            {
                StatementKind::Return(None)
            } else {
                StatementKind::Return(Some(self.expression()?))
            }
        } else if self.match_token(&[TokenKind::Pass]) {
            StatementKind::Pass
        } else if self.match_token(&[TokenKind::Import]) {
            self.import_statement()?
        } else if self.match_token(&[TokenKind::From]) {
            self.from_import_statement()?
        } else {
            self.expression_statement()?
        };

        Ok(Statement::new(kind, line))
    }

    fn expression_statement(&mut self) -> Result<StatementKind> {
        let expr = self.expression()?;

        if self.match_token(&[TokenKind::Colon]) {
            let target = match expr {
                Expression::Name(name) => name,
                other => {
                    return Err(self.error(&format!(
                        "Annotated assignment to a {} is not supported",
                        other.kind_name()
                    )))
                }
            };
            let annotation = self.parse_type()?;
            let value = if self.match_token(&[TokenKind::Assign]) {
                Some(self.expression()?)
            } else {
                None
            };
            return Ok(StatementKind::AnnAssign {
                target,
                annotation,
                value,
            });
        }

        let mut targets = Vec::new();
        let mut value = expr;
        while self.match_token(&[TokenKind::Assign]) {
            targets.push(value);
            value = self.expression()?;
        }
        if !targets.is_empty() {
            return Ok(StatementKind::Assign { targets, value });
        }

        let augmented = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::PlusAssign) => Some(BinaryOp::Add),
            Some(TokenKind::MinusAssign) => Some(BinaryOp::Sub),
            Some(TokenKind::StarAssign) => Some(BinaryOp::Mul),
            Some(TokenKind::SlashAssign) => Some(BinaryOp::Div),
            _ => None,
        };
        if let Some(op) = augmented {
            self.advance();
            let rhs = self.expression()?;
            return Ok(StatementKind::AugAssign {
                target: value,
                op,
                value: rhs,
            });
        }

        Ok(StatementKind::Expr(value))
    }

    fn dotted_name(&mut self, message: &str) -> Result<String> {
        let mut name = self.consume_identifier(message)?;
        while self.match_token(&[TokenKind::Dot]) {
            name.push('.');
            name.push_str(&self.consume_identifier("Expected name after '.'")?);
        }
        Ok(name)
    }

    fn import_alias(&mut self, name: String) -> Result<ImportAlias> {
        let alias = if self.match_token(&[TokenKind::As]) {
            Some(self.consume_identifier("Expected name after 'as'")?)
        } else {
            None
        };
        Ok(ImportAlias { name, alias })
    }

    fn import_statement(&mut self) -> Result<StatementKind> {
        let mut names = Vec::new();
        loop {
            let name = self.dotted_name("Expected module name")?;
            names.push(self.import_alias(name)?);
            if !self.match_token(&[TokenKind::Comma]) {
                break;
            }
        }
        Ok(StatementKind::Import { names })
    }

    fn from_import_statement(&mut self) -> Result<StatementKind> {
        // Relative imports: `from . import x`, `from ..pkg import y`
        let mut module = String::new();
        while self.match_token(&[TokenKind::Dot]) {
            module.push('.');
        }
        if self.check_identifier() || module.is_empty() {
            module.push_str(&self.dotted_name("Expected module name")?);
        }

        self.consume(&TokenKind::Import, "Expected 'import'")?;

        let mut names = Vec::new();
        if self.match_token(&[TokenKind::Star]) {
            names.push(ImportAlias {
                name: "*".to_string(),
                alias: None,
            });
            return Ok(StatementKind::ImportFrom { module, names });
        }

        let parenthesized = self.match_token(&[TokenKind::LeftParen]);
        loop {
            let name = self.consume_identifier("Expected imported name")?;
            names.push(self.import_alias(name)?);
            if !self.match_token(&[TokenKind::Comma]) {
                break;
            }
            if parenthesized && self.check(&TokenKind::RightParen) {
                break;
            }
        }
        if parenthesized {
            self.consume(&TokenKind::RightParen, "Expected ')' after imported names")?;
        }

        Ok(StatementKind::ImportFrom { module, names })
    }

    /// `:` followed by either an indented block or a single-line suite
    fn block(&mut self) -> Result<Vec<Statement>> {
        self.consume(&TokenKind::Colon, "Expected ':'")?;

        if !self.match_token(&[TokenKind::Newline]) {
            return self.simple_statement_line();
        }

        self.consume(&TokenKind::Indent, "Expected an indented block")?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::Dedent) && !self.is_at_end() {
            body.extend(self.statement()?);
        }
        self.consume(&TokenKind::Dedent, "Expected end of block")?;

        Ok(body)
    }

    fn function_definition(&mut self, line: usize) -> Result<Statement> {
        let name = self.consume_identifier("Expected function name")?;

        self.consume(&TokenKind::LeftParen, "Expected '(' after function name")?;
        let params = self.parse_parameters()?;
        self.consume(&TokenKind::RightParen, "Expected ')' after parameters")?;

        let returns = if self.match_token(&[TokenKind::Arrow]) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.block()?;

        Ok(Statement::new(
            StatementKind::FunctionDef {
                name,
                params,
                returns,
                body,
            },
            line,
        ))
    }

    fn parse_parameters(&mut self) -> Result<Vec<Parameter>> {
        let mut params = Vec::new();

        if self.check(&TokenKind::RightParen) {
            return Ok(params);
        }

        loop {
            let name = self.consume_identifier("Expected parameter name")?;
            let annotation = if self.match_token(&[TokenKind::Colon]) {
                Some(self.parse_type()?)
            } else {
                None
            };
            if self.check(&TokenKind::Assign) {
                return Err(self.error("Default parameter values are not supported"));
            }

            params.push(Parameter { name, annotation });

            if !self.match_token(&[TokenKind::Comma]) || self.check(&TokenKind::RightParen) {
                break;
            }
        }

        Ok(params)
    }

    fn class_definition(&mut self, line: usize) -> Result<Statement> {
        let name = self.consume_identifier("Expected class name")?;

        let bases = if self.match_token(&[TokenKind::LeftParen]) {
            let bases = self.arguments()?;
            self.consume(&TokenKind::RightParen, "Expected ')' after base classes")?;
            bases
        } else {
            Vec::new()
        };

        let body = self.block()?;

        Ok(Statement::new(
            StatementKind::ClassDef { name, bases, body },
            line,
        ))
    }

    fn if_statement(&mut self, line: usize) -> Result<Statement> {
        let condition = self.expression()?;
        let body = self.block()?;

        let orelse = if self.check(&TokenKind::Elif) {
            let elif_line = self.current_line();
            self.advance();
            vec![self.if_statement(elif_line)?]
        } else if self.match_token(&[TokenKind::Else]) {
            self.block()?
        } else {
            Vec::new()
        };

        Ok(Statement::new(
            StatementKind::If {
                condition,
                body,
                orelse,
            },
            line,
        ))
    }

    fn while_statement(&mut self, line: usize) -> Result<Statement> {
        let condition = self.expression()?;
        let body = self.block()?;
        Ok(Statement::new(StatementKind::While { condition, body }, line))
    }

    fn for_statement(&mut self, line: usize) -> Result<Statement> {
        let target = self.expression()?;
        self.consume(&TokenKind::In, "Expected 'in' after loop target")?;
        let iter = self.expression()?;
        let body = self.block()?;
        Ok(Statement::new(
            StatementKind::For { target, iter, body },
            line,
        ))
    }

    // Expressions

    fn expression(&mut self) -> Result<Expression> {
        self.or()
    }

    fn binary(left: Expression, op: BinaryOp, right: Expression) -> Expression {
        Expression::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    fn or(&mut self) -> Result<Expression> {
        let mut expr = self.and()?;
        while self.match_token(&[TokenKind::Or]) {
            let right = self.and()?;
            expr = Self::binary(expr, BinaryOp::Or, right);
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expression> {
        let mut expr = self.not()?;
        while self.match_token(&[TokenKind::And]) {
            let right = self.not()?;
            expr = Self::binary(expr, BinaryOp::And, right);
        }
        Ok(expr)
    }

    fn not(&mut self) -> Result<Expression> {
        if self.match_token(&[TokenKind::Not]) {
            let operand = self.not()?;
            return Ok(Expression::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expression> {
        let mut expr = self.term()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Equal) => BinaryOp::Eq,
                Some(TokenKind::NotEqual) => BinaryOp::NotEq,
                Some(TokenKind::Less) => BinaryOp::Lt,
                Some(TokenKind::LessEqual) => BinaryOp::LtE,
                Some(TokenKind::Greater) => BinaryOp::Gt,
                Some(TokenKind::GreaterEqual) => BinaryOp::GtE,
                _ => break,
            };
            self.advance();
            let right = self.term()?;
            expr = Self::binary(expr, op, right);
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expression> {
        let mut expr = self.factor()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.factor()?;
            expr = Self::binary(expr, op, right);
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expression> {
        let mut expr = self.unary()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::DoubleSlash) => BinaryOp::FloorDiv,
                Some(TokenKind::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.unary()?;
            expr = Self::binary(expr, op, right);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expression> {
        let op = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Minus) => UnaryOp::Neg,
            Some(TokenKind::Plus) => UnaryOp::Pos,
            _ => return self.power(),
        };
        self.advance();
        let operand = self.unary()?;
        Ok(Expression::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    fn power(&mut self) -> Result<Expression> {
        let base = self.call()?;
        if self.match_token(&[TokenKind::DoubleStar]) {
            // right associative, binds tighter than a unary minus on its left
            let exponent = self.unary()?;
            return Ok(Self::binary(base, BinaryOp::Pow, exponent));
        }
        Ok(base)
    }

    fn call(&mut self) -> Result<Expression> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(&[TokenKind::LeftParen]) {
                let args = self.arguments()?;
                self.consume(&TokenKind::RightParen, "Expected ')' after arguments")?;
                expr = Expression::Call {
                    func: Box::new(expr),
                    args,
                };
            } else if self.match_token(&[TokenKind::Dot]) {
                let attr = self.consume_identifier("Expected attribute name after '.'")?;
                expr = Expression::Attribute {
                    value: Box::new(expr),
                    attr,
                };
            } else if self.match_token(&[TokenKind::LeftBracket]) {
                let index = self.expression()?;
                self.consume(&TokenKind::RightBracket, "Expected ']' after subscript")?;
                expr = Expression::Subscript {
                    value: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn arguments(&mut self) -> Result<Vec<Expression>> {
        let mut args = Vec::new();

        if self.check(&TokenKind::RightParen) {
            return Ok(args);
        }

        loop {
            if self.check_identifier()
                && matches!(self.peek_next().map(|t| &t.kind), Some(TokenKind::Assign))
            {
                return Err(self.error("Keyword arguments are not supported"));
            }
            if self.check(&TokenKind::Star) || self.check(&TokenKind::DoubleStar) {
                return Err(self.error("Argument unpacking is not supported"));
            }

            args.push(self.expression()?);

            if !self.match_token(&[TokenKind::Comma]) || self.check(&TokenKind::RightParen) {
                break;
            }
        }

        Ok(args)
    }

    fn primary(&mut self) -> Result<Expression> {
        let kind = match self.peek() {
            Some(token) => token.kind.clone(),
            None => return Err(self.error("Expected expression")),
        };

        let expr = match kind {
            TokenKind::Integer(value) => {
                self.advance();
                Expression::Integer(value)
            }
            TokenKind::Float(value) => {
                self.advance();
                Expression::Float(value)
            }
            TokenKind::String(value) => {
                self.advance();
                // adjacent literals concatenate: "a" "b"
                let mut value = value;
                while let Some(Token {
                    kind: TokenKind::String(next),
                    ..
                }) = self.peek()
                {
                    value.push_str(next);
                    self.advance();
                }
                Expression::Str(value)
            }
            TokenKind::True => {
                self.advance();
                Expression::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                Expression::Bool(false)
            }
            TokenKind::None => {
                self.advance();
                Expression::NoneLiteral
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Expression::Name(name)
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                if self.check(&TokenKind::Comma) {
                    return Err(self.error("Tuples are not supported"));
                }
                self.consume(&TokenKind::RightParen, "Expected ')' after expression")?;
                expr
            }
            TokenKind::LeftBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(&TokenKind::RightBracket) {
                    items.push(self.expression()?);
                    if !self.match_token(&[TokenKind::Comma]) {
                        break;
                    }
                }
                self.consume(&TokenKind::RightBracket, "Expected ']' after list items")?;
                Expression::List(items)
            }
            _ => return Err(self.error("Expected expression")),
        };

        Ok(expr)
    }

    // Annotations

    fn parse_type(&mut self) -> Result<TypeExpr> {
        let kind = match self.peek() {
            Some(token) => token.kind.clone(),
            None => return Err(self.error("Expected type annotation")),
        };

        let base = match kind {
            TokenKind::None => {
                self.advance();
                return Ok(TypeExpr::Name("None".to_string()));
            }
            // forward reference: x: "int"
            TokenKind::String(text) => {
                self.advance();
                return Ok(TypeExpr::Name(text.trim().to_string()));
            }
            TokenKind::Identifier(_) => self.dotted_name("Expected type annotation")?,
            _ => return Err(self.error("Expected type annotation")),
        };

        if self.match_token(&[TokenKind::LeftBracket]) {
            let mut args = Vec::new();
            loop {
                args.push(self.parse_type()?);
                if !self.match_token(&[TokenKind::Comma]) || self.check(&TokenKind::RightBracket) {
                    break;
                }
            }
            self.consume(&TokenKind::RightBracket, "Expected ']' after type arguments")?;
            return Ok(TypeExpr::Subscript { base, args });
        }

        Ok(TypeExpr::Name(base))
    }
}
