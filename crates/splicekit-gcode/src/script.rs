//! Transition templating language
//!
//! A script is G-code text with embedded `{expression}` segments. Each
//! expression is evaluated against a set of named numeric locals and
//! replaced by its formatted value:
//!
//! ```text
//! G1 X{currentX + 10} Y{max(currentY, 5)} F3000
//! G1 E{transitionLength / 2} F300
//! ```
//!
//! Expressions support numbers, identifiers, `+ - * /`, parentheses, unary
//! minus and the functions `min`, `max`, `round` and `abs`. Parsing checks
//! syntax and function arity; unknown variables and division by zero are
//! reported when the script is evaluated.

use std::collections::BTreeMap;

use splicekit_core::ScriptError;

/// Named numeric values visible to a script
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptLocals {
    values: BTreeMap<String, f64>,
}

impl ScriptLocals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a local, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<f64>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

/// A parsed script, ready to be evaluated any number of times
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Location {
    line: usize,
    column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Function {
    Min,
    Max,
    Round,
    Abs,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Variable(String, Location),
    Negate(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>, Location),
    Call(Function, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    at: Location,
}

impl Script {
    /// Parse script text, reporting the first syntax error
    pub fn parse(source: &str) -> Result<Self, ScriptError> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = source.chars().peekable();
        let mut at = Location { line: 1, column: 1 };

        while let Some(ch) = chars.next() {
            match ch {
                '{' => {
                    let open = at;
                    advance(&mut at, ch);
                    let expr_start = at;
                    let mut body = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            advance(&mut at, inner);
                            closed = true;
                            break;
                        }
                        if inner == '{' {
                            return Err(ScriptError::syntax(
                                "nested '{' inside expression",
                                at.line,
                                at.column,
                            ));
                        }
                        body.push(inner);
                        advance(&mut at, inner);
                    }
                    if !closed {
                        return Err(ScriptError::syntax("unclosed '{'", open.line, open.column));
                    }
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    let tokens = tokenize(&body, expr_start)?;
                    let expr = ExprParser::new(tokens, open).parse()?;
                    segments.push(Segment::Expr(expr));
                }
                '}' => {
                    return Err(ScriptError::syntax("unexpected '}'", at.line, at.column));
                }
                _ => {
                    text.push(ch);
                    advance(&mut at, ch);
                }
            }
        }

        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        Ok(Self { segments })
    }

    /// Render the script against a set of locals
    pub fn evaluate(&self, locals: &ScriptLocals) -> Result<String, ScriptError> {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Expr(expr) => output.push_str(&format_number(expr.eval(locals)?)),
            }
        }
        Ok(output)
    }
}

/// Format a value the way it is written into G-code: at most five decimals,
/// no trailing zeros, never "-0"
pub fn format_number(value: f64) -> String {
    let formatted = format!("{:.5}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

fn advance(at: &mut Location, ch: char) {
    if ch == '\n' {
        at.line += 1;
        at.column = 1;
    } else {
        at.column += 1;
    }
}

fn tokenize(body: &str, start: Location) -> Result<Vec<Token>, ScriptError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = body.chars().collect();
    let mut at = start;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let token_at = at;

        if ch.is_whitespace() {
            advance(&mut at, ch);
            i += 1;
            continue;
        }

        if ch.is_ascii_digit() || ch == '.' {
            let begin = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                advance(&mut at, chars[i]);
                i += 1;
            }
            let literal: String = chars[begin..i].iter().collect();
            let value = literal.parse::<f64>().map_err(|_| {
                ScriptError::syntax(
                    format!("invalid number '{}'", literal),
                    token_at.line,
                    token_at.column,
                )
            })?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                at: token_at,
            });
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let begin = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                advance(&mut at, chars[i]);
                i += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Ident(chars[begin..i].iter().collect()),
                at: token_at,
            });
            continue;
        }

        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            other => {
                return Err(ScriptError::syntax(
                    format!("unexpected character '{}'", other),
                    token_at.line,
                    token_at.column,
                ))
            }
        };
        tokens.push(Token { kind, at: token_at });
        advance(&mut at, ch);
        i += 1;
    }

    Ok(tokens)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
    /// Location of the opening brace, used for errors at end of input
    open: Location,
}

impl ExprParser {
    fn new(tokens: Vec<Token>, open: Location) -> Self {
        Self {
            tokens,
            pos: 0,
            open,
        }
    }

    fn parse(mut self) -> Result<Expr, ScriptError> {
        if self.tokens.is_empty() {
            return Err(self.error_at(self.open, "empty expression"));
        }
        let expr = self.parse_sum()?;
        if let Some(token) = self.tokens.get(self.pos) {
            return Err(self.error_at(token.at, "unexpected token after expression"));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, at: Location, message: &str) -> ScriptError {
        ScriptError::syntax(message, at.line, at.column)
    }

    fn end_location(&self) -> Location {
        self.tokens.last().map(|t| t.at).unwrap_or(self.open)
    }

    fn parse_sum(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_product()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            let at = self.tokens[self.pos].at;
            self.pos += 1;
            let rhs = self.parse_product()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), at);
        }
    }

    fn parse_product(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            let at = self.tokens[self.pos].at;
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), at);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ScriptError> {
        if self.peek() == Some(&TokenKind::Minus) {
            self.pos += 1;
            return Ok(Expr::Negate(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ScriptError> {
        let Some(token) = self.next() else {
            return Err(self.error_at(self.end_location(), "unexpected end of expression"));
        };

        match token.kind {
            TokenKind::Number(value) => Ok(Expr::Number(value)),
            TokenKind::Ident(name) => {
                if self.peek() == Some(&TokenKind::LParen) {
                    self.pos += 1;
                    self.parse_call(&name, token.at)
                } else {
                    Ok(Expr::Variable(name, token.at))
                }
            }
            TokenKind::LParen => {
                let inner = self.parse_sum()?;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    _ => Err(self.error_at(token.at, "unclosed '('")),
                }
            }
            _ => Err(self.error_at(token.at, "expected a number, name or '('")),
        }
    }

    fn parse_call(&mut self, name: &str, at: Location) -> Result<Expr, ScriptError> {
        let function = match name {
            "min" => Function::Min,
            "max" => Function::Max,
            "round" => Function::Round,
            "abs" => Function::Abs,
            other => {
                return Err(self.error_at(at, &format!("unknown function '{}'", other)));
            }
        };

        let mut args = Vec::new();
        if self.peek() == Some(&TokenKind::RParen) {
            self.pos += 1;
        } else {
            loop {
                args.push(self.parse_sum()?);
                match self.next() {
                    Some(Token {
                        kind: TokenKind::Comma,
                        ..
                    }) => continue,
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => break,
                    _ => return Err(self.error_at(at, "unclosed function call")),
                }
            }
        }

        let arity_ok = match function {
            Function::Min | Function::Max => !args.is_empty(),
            Function::Round | Function::Abs => args.len() == 1,
        };
        if !arity_ok {
            return Err(self.error_at(
                at,
                &format!("wrong number of arguments to '{}'", name),
            ));
        }

        Ok(Expr::Call(function, args))
    }
}

impl Expr {
    fn eval(&self, locals: &ScriptLocals) -> Result<f64, ScriptError> {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::Variable(name, at) => locals.get(name).ok_or_else(|| {
                ScriptError::runtime(format!("unknown variable '{}'", name), at.line, at.column)
            }),
            Expr::Negate(inner) => Ok(-inner.eval(locals)?),
            Expr::Binary(op, lhs, rhs, at) => {
                let lhs = lhs.eval(locals)?;
                let rhs = rhs.eval(locals)?;
                match op {
                    BinaryOp::Add => Ok(lhs + rhs),
                    BinaryOp::Sub => Ok(lhs - rhs),
                    BinaryOp::Mul => Ok(lhs * rhs),
                    BinaryOp::Div if rhs == 0.0 => Err(ScriptError::runtime(
                        "division by zero",
                        at.line,
                        at.column,
                    )),
                    BinaryOp::Div => Ok(lhs / rhs),
                }
            }
            Expr::Call(function, args) => {
                let values = args
                    .iter()
                    .map(|arg| arg.eval(locals))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(match function {
                    Function::Min => values.into_iter().fold(f64::INFINITY, f64::min),
                    Function::Max => values.into_iter().fold(f64::NEG_INFINITY, f64::max),
                    Function::Round => values[0].round(),
                    Function::Abs => values[0].abs(),
                })
            }
        }
    }
}
