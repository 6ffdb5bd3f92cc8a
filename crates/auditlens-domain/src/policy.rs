//! Compliance query compilation and evaluation.
//!
//! Rules are authored as small boolean expressions over report fields:
//!
//! ```text
//! hardening_index >= `70` && contains(automation_tool_running, 'ansible')
//! !(firewall_installed) || days_since_audit <= `30`
//! ```
//!
//! Literals use JMESPath-style backticks for JSON values (`` `70` ``,
//! `` `"text"` ``), plus single/double-quoted raw strings and bare integers.
//! An expression compiles once to a [`CompiledQuery`]; evaluation is a pure
//! read against a parsed report. Compile and evaluation failures are
//! explicit error values — callers must never conflate "query failed" with
//! "condition is false".

use auditlens_types::{ParsedReport, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("empty query expression")]
    Empty,

    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unterminated backtick literal")]
    UnterminatedBacktick,

    #[error("invalid literal `{literal}`: {message}")]
    InvalidLiteral { literal: String, message: String },

    #[error("unsupported literal `{literal}` (expected an integer, string, boolean, or null)")]
    UnsupportedLiteral { literal: String },

    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: &'static str, found: String },

    #[error("unexpected end of expression (expected {expected})")]
    UnexpectedEnd { expected: &'static str },

    #[error("unexpected trailing input: '{found}'")]
    TrailingInput { found: String },
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("operand '{operand}' is not numeric (required by '{op}')")]
    NotNumeric { operand: String, op: &'static str },

    #[error("contains() requires a string or list field, '{field}' is not")]
    NotContainable { field: String },
}

/// A compiled query expression, ready for repeated evaluation.
///
/// Compile once — at rule creation or update — and evaluate the compiled
/// form against each report; recompiling per evaluation is the anti-pattern
/// this type exists to prevent.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    expr: Expr,
    source: String,
}

impl CompiledQuery {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, report: &ParsedReport) -> Result<bool, EvalError> {
        evaluate_query(self, report)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Lit {
    Int(i64),
    Str(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Field(String),
    Literal(Lit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Cmp {
        op: CmpOp,
        lhs: Operand,
        rhs: Operand,
    },
    Contains {
        field: String,
        needle: Lit,
    },
    Operand(Operand),
}

// ── Lexer ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Lit),
    AndAnd,
    OrOr,
    Bang,
    Cmp(CmpOp),
    LParen,
    RParen,
    Comma,
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("identifier '{name}'"),
        Token::Literal(Lit::Int(n)) => format!("literal {n}"),
        Token::Literal(Lit::Str(s)) => format!("literal '{s}'"),
        Token::Literal(Lit::Bool(b)) => format!("literal {b}"),
        Token::Literal(Lit::Null) => "literal null".to_string(),
        Token::AndAnd => "'&&'".to_string(),
        Token::OrOr => "'||'".to_string(),
        Token::Bang => "'!'".to_string(),
        Token::Cmp(op) => format!("'{}'", op.as_str()),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
        Token::Comma => "','".to_string(),
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_digit() {
                        digits.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = digits
                    .parse()
                    .map_err(|e: std::num::ParseIntError| CompileError::InvalidLiteral {
                        literal: digits.clone(),
                        message: e.to_string(),
                    })?;
                tokens.push(Token::Literal(Lit::Int(n)));
            }
            '"' | '\'' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == ch {
                        closed = true;
                        break;
                    }
                    text.push(c);
                }
                if !closed {
                    return Err(CompileError::UnterminatedString);
                }
                tokens.push(Token::Literal(Lit::Str(text)));
            }
            '`' => {
                chars.next();
                let mut raw = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '`' {
                        closed = true;
                        break;
                    }
                    raw.push(c);
                }
                if !closed {
                    return Err(CompileError::UnterminatedBacktick);
                }
                tokens.push(Token::Literal(parse_backtick_literal(&raw)?));
            }
            '&' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '&')) => {
                        chars.next();
                        tokens.push(Token::AndAnd);
                    }
                    _ => return Err(CompileError::UnexpectedChar { ch: '&', offset }),
                }
            }
            '|' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '|')) => {
                        chars.next();
                        tokens.push(Token::OrOr);
                    }
                    _ => return Err(CompileError::UnexpectedChar { ch: '|', offset }),
                }
            }
            '!' => {
                chars.next();
                if let Some(&(_, '=')) = chars.peek() {
                    chars.next();
                    tokens.push(Token::Cmp(CmpOp::Ne));
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '=' => {
                chars.next();
                // `=` alone is accepted as a compatibility alias for `==`.
                if let Some(&(_, '=')) = chars.peek() {
                    chars.next();
                }
                tokens.push(Token::Cmp(CmpOp::Eq));
            }
            '>' => {
                chars.next();
                if let Some(&(_, '=')) = chars.peek() {
                    chars.next();
                    tokens.push(Token::Cmp(CmpOp::Ge));
                } else {
                    tokens.push(Token::Cmp(CmpOp::Gt));
                }
            }
            '<' => {
                chars.next();
                if let Some(&(_, '=')) = chars.peek() {
                    chars.next();
                    tokens.push(Token::Cmp(CmpOp::Le));
                } else {
                    tokens.push(Token::Cmp(CmpOp::Lt));
                }
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            other => return Err(CompileError::UnexpectedChar { ch: other, offset }),
        }
    }

    Ok(tokens)
}

fn parse_backtick_literal(raw: &str) -> Result<Lit, CompileError> {
    let json: serde_json::Value =
        serde_json::from_str(raw.trim()).map_err(|e| CompileError::InvalidLiteral {
            literal: raw.to_string(),
            message: e.to_string(),
        })?;

    match json {
        serde_json::Value::Number(n) => n.as_i64().map(Lit::Int).ok_or_else(|| {
            CompileError::UnsupportedLiteral {
                literal: raw.to_string(),
            }
        }),
        serde_json::Value::String(s) => Ok(Lit::Str(s)),
        serde_json::Value::Bool(b) => Ok(Lit::Bool(b)),
        serde_json::Value::Null => Ok(Lit::Null),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            Err(CompileError::UnsupportedLiteral {
                literal: raw.to_string(),
            })
        }
    }
}

// ── Parser ─────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, want: &Token, expected: &'static str) -> Result<(), CompileError> {
        match self.next() {
            Some(token) if &token == want => Ok(()),
            Some(token) => Err(CompileError::UnexpectedToken {
                expected,
                found: describe(&token),
            }),
            None => Err(CompileError::UnexpectedEnd { expected }),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.next();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_unary()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.next();
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        if self.peek() == Some(&Token::Bang) {
            self.next();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        match self.peek() {
            Some(Token::LParen) => {
                self.next();
                let inner = self.parse_or()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) if name == "contains" && self.lookahead_is_lparen() => {
                self.next();
                self.parse_contains()
            }
            Some(Token::Ident(_) | Token::Literal(_)) => {
                let lhs = self.parse_operand()?;
                if let Some(Token::Cmp(op)) = self.peek().cloned() {
                    self.next();
                    let rhs = self.parse_operand()?;
                    Ok(Expr::Cmp { op, lhs, rhs })
                } else {
                    Ok(Expr::Operand(lhs))
                }
            }
            Some(token) => Err(CompileError::UnexpectedToken {
                expected: "a field, literal, '!', or '('",
                found: describe(token),
            }),
            None => Err(CompileError::UnexpectedEnd {
                expected: "a field, literal, '!', or '('",
            }),
        }
    }

    fn lookahead_is_lparen(&self) -> bool {
        self.tokens.get(self.pos + 1) == Some(&Token::LParen)
    }

    fn parse_contains(&mut self) -> Result<Expr, CompileError> {
        self.expect(&Token::LParen, "'('")?;
        let field = match self.next() {
            Some(Token::Ident(name)) => name,
            Some(token) => {
                return Err(CompileError::UnexpectedToken {
                    expected: "a field name",
                    found: describe(&token),
                })
            }
            None => return Err(CompileError::UnexpectedEnd { expected: "a field name" }),
        };
        self.expect(&Token::Comma, "','")?;
        let needle = match self.next() {
            Some(Token::Literal(lit @ (Lit::Int(_) | Lit::Str(_)))) => lit,
            Some(token) => {
                return Err(CompileError::UnexpectedToken {
                    expected: "a string or integer literal",
                    found: describe(&token),
                })
            }
            None => {
                return Err(CompileError::UnexpectedEnd {
                    expected: "a string or integer literal",
                })
            }
        };
        self.expect(&Token::RParen, "')'")?;
        Ok(Expr::Contains { field, needle })
    }

    fn parse_operand(&mut self) -> Result<Operand, CompileError> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Operand::Field(name)),
            Some(Token::Literal(lit)) => Ok(Operand::Literal(lit)),
            Some(token) => Err(CompileError::UnexpectedToken {
                expected: "a field or literal",
                found: describe(&token),
            }),
            None => Err(CompileError::UnexpectedEnd {
                expected: "a field or literal",
            }),
        }
    }
}

/// Compile a query expression. Fail fast at rule-save time; the compiled
/// form is cached on the rule and reused for every evaluation.
pub fn compile_query(source: &str) -> Result<CompiledQuery, CompileError> {
    if source.trim().is_empty() {
        return Err(CompileError::Empty);
    }

    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;

    if let Some(extra) = parser.peek() {
        return Err(CompileError::TrailingInput {
            found: describe(extra),
        });
    }

    Ok(CompiledQuery {
        expr,
        source: source.to_string(),
    })
}

// ── Evaluation ─────────────────────────────────────────────────

/// Evaluate a compiled query against a parsed report.
///
/// Comparisons referencing an absent field evaluate to `false` (distinct
/// from an error). Non-boolean results — a bare field or literal at a
/// boolean position — coerce by standard truthiness: absent, `null`, empty
/// string, zero, and empty list are all false.
pub fn evaluate_query(query: &CompiledQuery, report: &ParsedReport) -> Result<bool, EvalError> {
    eval_expr(&query.expr, report)
}

fn eval_expr(expr: &Expr, report: &ParsedReport) -> Result<bool, EvalError> {
    match expr {
        Expr::Or(lhs, rhs) => Ok(eval_expr(lhs, report)? || eval_expr(rhs, report)?),
        Expr::And(lhs, rhs) => Ok(eval_expr(lhs, report)? && eval_expr(rhs, report)?),
        Expr::Not(inner) => Ok(!eval_expr(inner, report)?),
        Expr::Cmp { op, lhs, rhs } => eval_cmp(*op, lhs, rhs, report),
        Expr::Contains { field, needle } => eval_contains(field, needle, report),
        Expr::Operand(operand) => Ok(operand_truthy(operand, report)),
    }
}

/// One side of a comparison, after field resolution.
enum Side<'a> {
    Absent,
    Num(i64),
    Text(&'a str),
    List(&'a [Value]),
    Bool(bool),
    Null,
}

impl Side<'_> {
    fn display(&self) -> String {
        match self {
            Side::Absent => "<absent>".to_string(),
            Side::Num(n) => n.to_string(),
            Side::Text(s) => (*s).to_string(),
            Side::List(_) => "<list>".to_string(),
            Side::Bool(b) => b.to_string(),
            Side::Null => "null".to_string(),
        }
    }
}

fn resolve<'a>(operand: &'a Operand, report: &'a ParsedReport) -> Side<'a> {
    match operand {
        Operand::Field(name) => match report.get(name) {
            None => Side::Absent,
            Some(Value::Number(n)) => Side::Num(*n),
            Some(Value::Text(s)) => Side::Text(s),
            Some(Value::List(items)) => Side::List(items),
        },
        Operand::Literal(Lit::Int(n)) => Side::Num(*n),
        Operand::Literal(Lit::Str(s)) => Side::Text(s),
        Operand::Literal(Lit::Bool(b)) => Side::Bool(*b),
        Operand::Literal(Lit::Null) => Side::Null,
    }
}

fn eval_cmp(
    op: CmpOp,
    lhs: &Operand,
    rhs: &Operand,
    report: &ParsedReport,
) -> Result<bool, EvalError> {
    let left = resolve(lhs, report);
    let right = resolve(rhs, report);

    // An absent field makes the whole comparison false, never an error.
    if matches!(left, Side::Absent) || matches!(right, Side::Absent) {
        return Ok(false);
    }

    match op {
        CmpOp::Eq => Ok(sides_equal(&left, &right)),
        CmpOp::Ne => Ok(!sides_equal(&left, &right)),
        CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le => {
            let a = numeric(&left).ok_or_else(|| EvalError::NotNumeric {
                operand: left.display(),
                op: op.as_str(),
            })?;
            let b = numeric(&right).ok_or_else(|| EvalError::NotNumeric {
                operand: right.display(),
                op: op.as_str(),
            })?;
            Ok(match op {
                CmpOp::Gt => a > b,
                CmpOp::Ge => a >= b,
                CmpOp::Lt => a < b,
                CmpOp::Le => a <= b,
                CmpOp::Eq | CmpOp::Ne => unreachable!(),
            })
        }
    }
}

fn sides_equal(left: &Side<'_>, right: &Side<'_>) -> bool {
    match (left, right) {
        (Side::Num(a), Side::Num(b)) => a == b,
        (Side::Text(a), Side::Text(b)) => a == b,
        // Numeric text compares numerically against numbers.
        (Side::Num(a), Side::Text(t)) | (Side::Text(t), Side::Num(a)) => {
            Value::Text((*t).to_string()).coerce_i64() == Some(*a)
        }
        (Side::List(a), Side::List(b)) => a == b,
        (Side::Bool(b), other) | (other, Side::Bool(b)) => *b == side_truthy(other),
        // Fields are never null in this model.
        (Side::Null, _) | (_, Side::Null) => false,
        _ => false,
    }
}

fn side_truthy(side: &Side<'_>) -> bool {
    match side {
        Side::Absent | Side::Null => false,
        Side::Num(n) => *n != 0,
        Side::Text(s) => !s.is_empty(),
        Side::List(items) => !items.is_empty(),
        Side::Bool(b) => *b,
    }
}

fn numeric(side: &Side<'_>) -> Option<i64> {
    match side {
        Side::Num(n) => Some(*n),
        Side::Text(s) => Value::Text((*s).to_string()).coerce_i64(),
        _ => None,
    }
}

fn eval_contains(field: &str, needle: &Lit, report: &ParsedReport) -> Result<bool, EvalError> {
    let needle_text = match needle {
        Lit::Str(s) => s.clone(),
        Lit::Int(n) => n.to_string(),
        Lit::Bool(_) | Lit::Null => unreachable!("rejected at compile time"),
    };

    match report.get(field) {
        None => Ok(false),
        Some(Value::Text(haystack)) => Ok(haystack.contains(&needle_text)),
        Some(list @ Value::List(_)) => Ok(list
            .scalar_texts()
            .iter()
            .any(|item| item == &needle_text)),
        Some(Value::Number(_)) => Err(EvalError::NotContainable {
            field: field.to_string(),
        }),
    }
}

fn operand_truthy(operand: &Operand, report: &ParsedReport) -> bool {
    match operand {
        Operand::Field(name) => report.get(name).is_some_and(Value::is_truthy),
        Operand::Literal(Lit::Int(n)) => *n != 0,
        Operand::Literal(Lit::Str(s)) => !s.is_empty(),
        Operand::Literal(Lit::Bool(b)) => *b,
        Operand::Literal(Lit::Null) => false,
    }
}
