//! Lexer for the minitype source subset
//!
//! Transforms Python-style source code into a stream of tokens. Block
//! structure is carried by `Newline`, `Indent` and `Dedent` tokens, the
//! same way Python's own tokenizer does it.

use std::collections::VecDeque;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{CheckError, Result};

const TAB_SIZE: usize = 8;

/// Token types for the supported subset
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Integer(i64),
    Float(f64),
    String(String),

    // Identifiers
    Identifier(String),

    // Keywords
    Def,
    Return,
    Import,
    From,
    As,
    Class,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Pass,
    True,
    False,
    None,
    And,
    Or,
    Not,

    // Operators
    Plus,         // +
    Minus,        // -
    Star,         // *
    DoubleStar,   // **
    Slash,        // /
    DoubleSlash,  // //
    Percent,      // %

    // Comparison
    Equal,        // ==
    NotEqual,     // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=

    // Assignment
    Assign,      // =
    PlusAssign,  // +=
    MinusAssign, // -=
    StarAssign,  // *=
    SlashAssign, // /=

    // Delimiters
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    LeftBrace,    // {
    RightBrace,   // }

    // Punctuation
    Comma,     // ,
    Dot,       // .
    Colon,     // :
    Semicolon, // ;
    Arrow,     // ->
    At,        // @

    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

/// A token with position information
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
    pub lexeme: String,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize, lexeme: String) -> Self {
        Token {
            kind,
            line,
            column,
            lexeme,
        }
    }
}

/// Tokenize a whole source file. The returned vector always ends with `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

/// Lexer for tokenizing source code
pub struct Lexer<'a> {
    source: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    current_lexeme: String,
    /// Indentation of the open blocks, outermost first, as
    /// (width with 8-column tabs, width with 1-column tabs)
    indents: Vec<(usize, usize)>,
    /// Layout tokens waiting to be handed out
    pending: VecDeque<Token>,
    at_line_start: bool,
    /// True once a token other than `Newline` was produced on the current logical line
    line_open: bool,
    /// Bracket depth; newlines inside brackets are not significant
    nesting: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.chars().peekable(),
            line: 1,
            column: 1,
            current_lexeme: String::new(),
            indents: vec![(0, 0)],
            pending: VecDeque::new(),
            at_line_start: true,
            line_open: false,
            nesting: 0,
            finished: false,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.next()?;
        self.current_lexeme.push(ch);
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn peek(&mut self) -> Option<&char> {
        self.source.peek()
    }

    fn peek_is(&mut self, expected: char) -> bool {
        self.peek() == Some(&expected)
    }

    fn peek_second(&self) -> Option<char> {
        let mut lookahead = self.source.clone();
        lookahead.next();
        lookahead.next()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek_is(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> CheckError {
        CheckError::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Produce the next token, or `None` once `Eof` has been handed out.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(Some(token));
            }
            if self.finished {
                return Ok(None);
            }
            if self.at_line_start && self.nesting == 0 {
                self.scan_indentation()?;
                continue;
            }

            self.skip_whitespace()?;
            self.current_lexeme.clear();

            let start_line = self.line;
            let start_column = self.column;

            let Some(ch) = self.advance() else {
                self.finish();
                continue;
            };

            let token = match ch {
                '\n' => {
                    self.at_line_start = true;
                    self.line_open = false;
                    return Ok(Some(Token::new(
                        TokenKind::Newline,
                        start_line,
                        start_column,
                        "\n".into(),
                    )));
                }

                // String literals
                '"' | '\'' => self.scan_string(ch, start_line, start_column)?,

                // Numbers
                '0'..='9' => self.scan_number(ch, start_line, start_column)?,

                // Identifiers and keywords
                c if c.is_alphabetic() || c == '_' => {
                    self.scan_identifier(c, start_line, start_column)
                }

                // Operators
                '+' => {
                    if self.match_char('=') {
                        Token::new(TokenKind::PlusAssign, start_line, start_column, "+=".into())
                    } else {
                        Token::new(TokenKind::Plus, start_line, start_column, "+".into())
                    }
                }
                '-' => {
                    if self.match_char('>') {
                        Token::new(TokenKind::Arrow, start_line, start_column, "->".into())
                    } else if self.match_char('=') {
                        Token::new(TokenKind::MinusAssign, start_line, start_column, "-=".into())
                    } else {
                        Token::new(TokenKind::Minus, start_line, start_column, "-".into())
                    }
                }
                '*' => {
                    if self.match_char('*') {
                        Token::new(TokenKind::DoubleStar, start_line, start_column, "**".into())
                    } else if self.match_char('=') {
                        Token::new(TokenKind::StarAssign, start_line, start_column, "*=".into())
                    } else {
                        Token::new(TokenKind::Star, start_line, start_column, "*".into())
                    }
                }
                '/' => {
                    if self.match_char('/') {
                        Token::new(TokenKind::DoubleSlash, start_line, start_column, "//".into())
                    } else if self.match_char('=') {
                        Token::new(TokenKind::SlashAssign, start_line, start_column, "/=".into())
                    } else {
                        Token::new(TokenKind::Slash, start_line, start_column, "/".into())
                    }
                }
                '%' => Token::new(TokenKind::Percent, start_line, start_column, "%".into()),

                '=' => {
                    if self.match_char('=') {
                        Token::new(TokenKind::Equal, start_line, start_column, "==".into())
                    } else {
                        Token::new(TokenKind::Assign, start_line, start_column, "=".into())
                    }
                }
                '!' => {
                    if self.match_char('=') {
                        Token::new(TokenKind::NotEqual, start_line, start_column, "!=".into())
                    } else {
                        return Err(self.error(start_line, start_column, "unexpected character '!'"));
                    }
                }
                '<' => {
                    if self.match_char('=') {
                        Token::new(TokenKind::LessEqual, start_line, start_column, "<=".into())
                    } else {
                        Token::new(TokenKind::Less, start_line, start_column, "<".into())
                    }
                }
                '>' => {
                    if self.match_char('=') {
                        Token::new(TokenKind::GreaterEqual, start_line, start_column, ">=".into())
                    } else {
                        Token::new(TokenKind::Greater, start_line, start_column, ">".into())
                    }
                }

                // Delimiters
                '(' => {
                    self.nesting += 1;
                    Token::new(TokenKind::LeftParen, start_line, start_column, "(".into())
                }
                ')' => {
                    self.nesting = self.nesting.saturating_sub(1);
                    Token::new(TokenKind::RightParen, start_line, start_column, ")".into())
                }
                '[' => {
                    self.nesting += 1;
                    Token::new(TokenKind::LeftBracket, start_line, start_column, "[".into())
                }
                ']' => {
                    self.nesting = self.nesting.saturating_sub(1);
                    Token::new(TokenKind::RightBracket, start_line, start_column, "]".into())
                }
                '{' => {
                    self.nesting += 1;
                    Token::new(TokenKind::LeftBrace, start_line, start_column, "{".into())
                }
                '}' => {
                    self.nesting = self.nesting.saturating_sub(1);
                    Token::new(TokenKind::RightBrace, start_line, start_column, "}".into())
                }

                // Punctuation
                ',' => Token::new(TokenKind::Comma, start_line, start_column, ",".into()),
                '.' => Token::new(TokenKind::Dot, start_line, start_column, ".".into()),
                ':' => Token::new(TokenKind::Colon, start_line, start_column, ":".into()),
                ';' => Token::new(TokenKind::Semicolon, start_line, start_column, ";".into()),
                '@' => Token::new(TokenKind::At, start_line, start_column, "@".into()),

                other => {
                    return Err(self.error(
                        start_line,
                        start_column,
                        format!("unexpected character '{}'", other),
                    ))
                }
            };

            self.line_open = true;
            return Ok(Some(token));
        }
    }

    /// Close the logical line and every open block, then emit `Eof`.
    fn finish(&mut self) {
        let (line, column) = (self.line, self.column);
        if self.line_open {
            self.pending
                .push_back(Token::new(TokenKind::Newline, line, column, String::new()));
            self.line_open = false;
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.pending
                .push_back(Token::new(TokenKind::Dedent, line, column, String::new()));
        }
        self.pending
            .push_back(Token::new(TokenKind::Eof, line, column, String::new()));
        self.finished = true;
    }

    /// Measure the indentation of a new physical line and queue layout tokens.
    /// Blank and comment-only lines are consumed without producing anything.
    fn scan_indentation(&mut self) -> Result<()> {
        // Width with tabs to the next multiple of 8, and with tabs counted as
        // one column. Both must order indentation levels the same way.
        let mut width = 0;
        let mut tab_width = 0;
        while let Some(&ch) = self.peek() {
            match ch {
                ' ' => {
                    width += 1;
                    tab_width += 1;
                }
                '\t' => {
                    width = (width / TAB_SIZE + 1) * TAB_SIZE;
                    tab_width += 1;
                }
                '\x0c' => {
                    width = 0;
                    tab_width = 0;
                }
                _ => break,
            }
            self.advance();
        }

        match self.peek() {
            None => {
                self.at_line_start = false;
                return Ok(());
            }
            Some('#') => self.skip_comment(),
            Some('\n') | Some('\r') => {}
            Some(_) => {
                self.at_line_start = false;
                return self.push_indentation(width, tab_width);
            }
        }

        // blank line
        while let Some(ch) = self.advance() {
            if ch == '\n' {
                break;
            }
        }
        Ok(())
    }

    fn push_indentation(&mut self, width: usize, tab_width: usize) -> Result<()> {
        let line = self.line;
        let (current, current_tab) = self.indents.last().copied().unwrap_or((0, 0));
        let inconsistent = |lexer: &Self| {
            lexer.error(
                line,
                width + 1,
                "inconsistent use of tabs and spaces in indentation",
            )
        };

        if width > current {
            if tab_width <= current_tab {
                return Err(inconsistent(self));
            }
            self.indents.push((width, tab_width));
            self.pending
                .push_back(Token::new(TokenKind::Indent, line, 1, String::new()));
        } else if width < current {
            while let Some(&(top, _)) = self.indents.last() {
                if top <= width {
                    break;
                }
                self.indents.pop();
                self.pending
                    .push_back(Token::new(TokenKind::Dedent, line, 1, String::new()));
            }
            let (top, top_tab) = self.indents.last().copied().unwrap_or((0, 0));
            if top != width {
                return Err(self.error(
                    line,
                    width + 1,
                    "unindent does not match any outer indentation level",
                ));
            }
            if top_tab != tab_width {
                return Err(inconsistent(self));
            }
        } else if tab_width != current_tab {
            return Err(inconsistent(self));
        }
        Ok(())
    }

    fn skip_comment(&mut self) {
        while let Some(&ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(&ch) = self.peek() {
            match ch {
                ' ' | '\t' | '\r' | '\x0c' => {
                    self.advance();
                }
                '\n' if self.nesting > 0 => {
                    self.advance();
                }
                '#' => self.skip_comment(),
                '\\' => {
                    // explicit line continuation
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    self.match_char('\r');
                    if !self.match_char('\n') {
                        return Err(self.error(
                            line,
                            column,
                            "unexpected character after line continuation character",
                        ));
                    }
                }
                _ => return Ok(()),
            }
        }
        Ok(())
    }

    fn scan_string(&mut self, quote: char, start_line: usize, start_column: usize) -> Result<Token> {
        let triple = self.peek_is(quote) && self.peek_second() == Some(quote);
        if triple {
            self.advance();
            self.advance();
        }

        let mut value = String::new();
        loop {
            let Some(ch) = self.advance() else {
                return Err(self.error(start_line, start_column, "unterminated string literal"));
            };

            if ch == quote {
                if !triple {
                    break;
                }
                if self.peek_is(quote) && self.peek_second() == Some(quote) {
                    self.advance();
                    self.advance();
                    break;
                }
                value.push(ch);
                continue;
            }

            match ch {
                '\\' => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('0') => value.push('\0'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some('\'') => value.push('\''),
                    Some('\n') => {}
                    Some(c) => {
                        value.push('\\');
                        value.push(c);
                    }
                    None => {
                        return Err(self.error(
                            start_line,
                            start_column,
                            "unterminated string literal",
                        ))
                    }
                },
                '\n' if !triple => {
                    return Err(self.error(start_line, start_column, "unterminated string literal"))
                }
                c => value.push(c),
            }
        }

        Ok(Token::new(
            TokenKind::String(value),
            start_line,
            start_column,
            self.current_lexeme.clone(),
        ))
    }

    /// Consume digits of `radix`. An underscore must sit between two digits.
    fn consume_digits(&mut self, digits: &mut String, radix: u32) -> Result<()> {
        while let Some(&ch) = self.peek() {
            if ch.is_digit(radix) {
                digits.push(ch);
                self.advance();
            } else if ch == '_' {
                let after_digit = digits.chars().last().map_or(radix != 10, |c| c.is_digit(radix));
                let before_digit = self.peek_second().map_or(false, |c| c.is_digit(radix));
                if !after_digit || !before_digit {
                    return Err(self.error(
                        self.line,
                        self.column,
                        format!("invalid underscore in number literal '{}_'", self.current_lexeme),
                    ));
                }
                self.advance();
            } else {
                break;
            }
        }
        Ok(())
    }

    fn scan_number(&mut self, first: char, start_line: usize, start_column: usize) -> Result<Token> {
        // Hex, octal and binary integers
        if first == '0' {
            let radix = match self.peek() {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                let mut digits = String::new();
                self.consume_digits(&mut digits, radix)?;
                let value = i64::from_str_radix(&digits, radix).map_err(|_| {
                    self.error(
                        start_line,
                        start_column,
                        format!("invalid integer literal '{}'", self.current_lexeme),
                    )
                })?;
                return Ok(Token::new(
                    TokenKind::Integer(value),
                    start_line,
                    start_column,
                    self.current_lexeme.clone(),
                ));
            }
        }

        let mut number = String::from(first);
        self.consume_digits(&mut number, 10)?;
        let mut is_float = false;

        // Fractional part; `1.real` style attribute access is not a float
        if self.peek_is('.') && self.peek_second().map_or(false, |c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            number.push('.');
            self.consume_digits(&mut number, 10)?;
        }

        // Exponent
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut lookahead = self.source.clone();
            lookahead.next();
            let has_exponent = match lookahead.next() {
                Some(c) if c.is_ascii_digit() => true,
                Some('+') | Some('-') => lookahead.next().map_or(false, |c| c.is_ascii_digit()),
                _ => false,
            };
            if has_exponent {
                is_float = true;
                self.advance();
                number.push('e');
                if let Some(&sign) = self.peek() {
                    if sign == '+' || sign == '-' {
                        number.push(sign);
                        self.advance();
                    }
                }
                self.consume_digits(&mut number, 10)?;
            }
        }

        let kind = if is_float {
            let value: f64 = number.parse().map_err(|_| {
                self.error(
                    start_line,
                    start_column,
                    format!("invalid float literal '{}'", self.current_lexeme),
                )
            })?;
            TokenKind::Float(value)
        } else {
            let value: i64 = number.parse().map_err(|_| {
                self.error(
                    start_line,
                    start_column,
                    format!("integer literal '{}' is too large", self.current_lexeme),
                )
            })?;
            TokenKind::Integer(value)
        };

        Ok(Token::new(
            kind,
            start_line,
            start_column,
            self.current_lexeme.clone(),
        ))
    }

    fn scan_identifier(&mut self, first: char, start_line: usize, start_column: usize) -> Token {
        let mut ident = String::from(first);

        while let Some(&ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let kind = match ident.as_str() {
            "def" => TokenKind::Def,
            "return" => TokenKind::Return,
            "import" => TokenKind::Import,
            "from" => TokenKind::From,
            "as" => TokenKind::As,
            "class" => TokenKind::Class,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "pass" => TokenKind::Pass,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::None,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            _ => TokenKind::Identifier(ident.clone()),
        };

        Token::new(kind, start_line, start_column, ident)
    }
}
