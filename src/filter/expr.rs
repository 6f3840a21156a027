//! Filter expression text parsing.
//!
//! An expression is either a single `table.column` reference or a constant:
//! a literal (`'active'`, `42`, `null`, `true`) or arithmetic over number
//! literals (`-1.5`, `60 * 60 * 24`), which is folded to a single number.

use super::Literal;

/// A parsed filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Reference { table: String, column: String },
}

/// Why an expression was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// More than one variable; bare identifiers count as one each
    MultipleReferences,
    /// Tuple or object values
    Unsupported,
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Number(String),
    Ident(Vec<String>),
    Symbol(char),
}

/// Parse expression text into a constant literal or a single reference
pub fn parse(text: &str) -> Result<Expression, ExprError> {
    let tokens = tokenize(text)?;

    if tokens
        .iter()
        .any(|t| matches!(t, Token::Symbol('[') | Token::Symbol('{')))
    {
        return Err(ExprError::Unsupported);
    }

    let references = tokens.iter().filter(|t| is_variable(t)).count();
    if references > 1 {
        return Err(ExprError::MultipleReferences);
    }
    if references == 1 {
        return match tokens.as_slice() {
            [Token::Ident(parts)] => reference(parts),
            _ => Err(ExprError::Invalid(
                "a table.column reference must stand alone".to_string(),
            )),
        };
    }

    let mut folder = ConstantFolder {
        tokens: &tokens,
        pos: 0,
    };
    let value = folder.expression()?;
    if let Some(token) = folder.peek() {
        return Err(ExprError::Invalid(format!(
            "unexpected {} after expression",
            describe(token)
        )));
    }
    Ok(Expression::Literal(value))
}

fn keyword(word: &str) -> Option<Literal> {
    match word.to_ascii_lowercase().as_str() {
        "null" => Some(Literal::Null),
        "true" => Some(Literal::Bool(true)),
        "false" => Some(Literal::Bool(false)),
        _ => None,
    }
}

fn is_variable(token: &Token) -> bool {
    match token {
        Token::Ident(parts) => parts.len() > 1 || keyword(&parts[0]).is_none(),
        _ => false,
    }
}

fn reference(parts: &[String]) -> Result<Expression, ExprError> {
    match parts {
        [table, column] => Ok(Expression::Reference {
            table: table.clone(),
            column: column.clone(),
        }),
        [word] => Err(ExprError::Invalid(format!(
            "'{}' is neither a literal nor a table.column reference",
            word
        ))),
        _ => Err(ExprError::Invalid(format!(
            "reference '{}' has more than two parts",
            parts.join(".")
        ))),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Str(s) => format!("string '{}'", s),
        Token::Number(n) => format!("number {}", n),
        Token::Ident(parts) => format!("'{}'", parts.join(".")),
        Token::Symbol(c) => format!("'{}'", c),
    }
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// A number while folding: exact integers stay exact
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i128),
    Float(f64),
}

impl Num {
    fn parse(text: &str) -> Result<Self, ExprError> {
        if let Ok(n) = text.parse::<i128>() {
            return Ok(Num::Int(n));
        }
        text.parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Num::Float)
            .ok_or_else(|| ExprError::Invalid(format!("malformed number '{}'", text)))
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(n) => n,
        }
    }
}

/// Recursive-descent evaluation of constant expressions.
///
/// Precedence: unary `-`/`+`, then `*` `/` `%`, then `+` `-`, all left
/// associative. Parentheses group.
struct ConstantFolder<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> ConstantFolder<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expression(&mut self) -> Result<Literal, ExprError> {
        let mut value = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol('+')) => BinOp::Add,
                Some(Token::Symbol('-')) => BinOp::Sub,
                _ => return Ok(value),
            };
            self.pos += 1;
            let rhs = self.term()?;
            value = apply(op, value, rhs)?;
        }
    }

    fn term(&mut self) -> Result<Literal, ExprError> {
        let mut value = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol('*')) => BinOp::Mul,
                Some(Token::Symbol('/')) => BinOp::Div,
                Some(Token::Symbol('%')) => BinOp::Rem,
                _ => return Ok(value),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            value = apply(op, value, rhs)?;
        }
    }

    fn unary(&mut self) -> Result<Literal, ExprError> {
        match self.peek() {
            Some(Token::Symbol('-')) => {
                self.pos += 1;
                match self.unary()? {
                    Literal::Number(n) => Ok(Literal::Number(match n.strip_prefix('-') {
                        Some(positive) => positive.to_string(),
                        None => format!("-{}", n),
                    })),
                    _ => Err(ExprError::Invalid(
                        "unary '-' needs a numeric operand".to_string(),
                    )),
                }
            }
            Some(Token::Symbol('+')) => {
                self.pos += 1;
                match self.unary()? {
                    Literal::Number(n) => Ok(Literal::Number(n)),
                    _ => Err(ExprError::Invalid(
                        "unary '+' needs a numeric operand".to_string(),
                    )),
                }
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Literal, ExprError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Literal::String(s.clone())),
            Some(Token::Number(n)) => {
                Num::parse(n)?;
                Ok(Literal::Number(n.clone()))
            }
            Some(Token::Ident(parts)) => keyword(&parts[0])
                .ok_or_else(|| ExprError::Invalid(format!("unexpected '{}'", parts.join(".")))),
            Some(Token::Symbol('(')) => {
                let value = self.expression()?;
                match self.next() {
                    Some(Token::Symbol(')')) => Ok(value),
                    Some(other) => Err(ExprError::Invalid(format!(
                        "expected ')', found {}",
                        describe(other)
                    ))),
                    None => Err(ExprError::Invalid("unclosed '('".to_string())),
                }
            }
            Some(other) => Err(ExprError::Invalid(format!("unexpected {}", describe(other)))),
            None => Err(ExprError::Invalid("expression ends early".to_string())),
        }
    }
}

fn apply(op: BinOp, lhs: Literal, rhs: Literal) -> Result<Literal, ExprError> {
    let (Literal::Number(l), Literal::Number(r)) = (&lhs, &rhs) else {
        return Err(ExprError::Invalid(
            "arithmetic needs numeric operands".to_string(),
        ));
    };
    let (l, r) = (Num::parse(l)?, Num::parse(r)?);

    if let (Num::Int(a), Num::Int(b)) = (l, r) {
        let exact = match op {
            BinOp::Add => a.checked_add(b),
            BinOp::Sub => a.checked_sub(b),
            BinOp::Mul => a.checked_mul(b),
            BinOp::Div if a.checked_rem(b) == Some(0) => a.checked_div(b),
            BinOp::Div => None,
            BinOp::Rem => a.checked_rem(b),
        };
        if let Some(n) = exact {
            return Ok(Literal::Number(n.to_string()));
        }
    }

    let (a, b) = (l.as_f64(), r.as_f64());
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Rem => a % b,
    };
    if !value.is_finite() {
        return Err(ExprError::Invalid(
            "expression does not evaluate to a finite number".to_string(),
        ));
    }
    Ok(Literal::Number(value.to_string()))
}

fn tokenize(text: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    if chars.iter().all(|c| c.is_whitespace()) {
        return Err(ExprError::Invalid("empty expression".to_string()));
    }

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
        } else if c == '\'' || c == '"' {
            let (value, next) = read_quoted(&chars, i)?;
            tokens.push(Token::Str(value));
            i = next;
        } else if c.is_ascii_digit() {
            let (value, next) = read_number(&chars, i);
            tokens.push(Token::Number(value));
            i = next;
        } else if is_ident_start(c) || c == '`' {
            let (parts, next) = read_identifier(&chars, i)?;
            tokens.push(Token::Ident(parts));
            i = next;
        } else {
            tokens.push(Token::Symbol(c));
            i += 1;
        }
    }

    Ok(tokens)
}

fn read_quoted(chars: &[char], start: usize) -> Result<(String, usize), ExprError> {
    let quote = chars[start];
    let mut value = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            match chars.get(i + 1) {
                Some('n') => value.push('\n'),
                Some('r') => value.push('\r'),
                Some('t') => value.push('\t'),
                Some('0') => value.push('\0'),
                Some(&other) => value.push(other),
                None => break,
            }
            i += 2;
        } else if c == quote {
            // Doubled quote
            if chars.get(i + 1) == Some(&quote) {
                value.push(quote);
                i += 2;
            } else {
                return Ok((value, i + 1));
            }
        } else {
            value.push(c);
            i += 1;
        }
    }

    Err(ExprError::Invalid("unterminated string literal".to_string()))
}

fn read_number(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() || c == '.' {
            i += 1;
        } else if (c == 'e' || c == 'E') && i + 1 < chars.len() {
            i += 1;
            if chars[i] == '+' || chars[i] == '-' {
                i += 1;
            }
        } else {
            break;
        }
    }
    (chars[start..i].iter().collect(), i)
}

fn read_identifier(chars: &[char], start: usize) -> Result<(Vec<String>, usize), ExprError> {
    let mut parts = Vec::new();
    let mut i = start;

    loop {
        let mut part = String::new();
        if chars.get(i) == Some(&'`') {
            i += 1;
            loop {
                match chars.get(i) {
                    Some('`') if chars.get(i + 1) == Some(&'`') => {
                        part.push('`');
                        i += 2;
                    }
                    Some('`') => {
                        i += 1;
                        break;
                    }
                    Some(&c) => {
                        part.push(c);
                        i += 1;
                    }
                    None => {
                        return Err(ExprError::Invalid(
                            "unterminated quoted identifier".to_string(),
                        ))
                    }
                }
            }
        } else {
            while let Some(&c) = chars.get(i) {
                if is_ident_char(c) {
                    part.push(c);
                    i += 1;
                } else {
                    break;
                }
            }
        }

        if part.is_empty() {
            return Err(ExprError::Invalid("empty identifier".to_string()));
        }
        parts.push(part);

        if chars.get(i) == Some(&'.') {
            i += 1;
        } else {
            return Ok((parts, i));
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
