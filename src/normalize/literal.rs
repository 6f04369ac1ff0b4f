//! Safe structural parser for list literals stored as text.
//!
//! Recipe corpora often store an ingredient list as the printed form of a list,
//! e.g. `['pork belly', "chef's knife", 'salt']`. This parser accepts exactly
//! the literal subset such strings are made of: lists, tuples, quoted strings,
//! integers, floats, `True`, `False` and `None`. Nothing is evaluated; any other
//! construct is a parse error.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

/// A parsed literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    /// Integer outside the `i64` range, kept as its digit text
    BigInt(String),
    Float(f64),
    Bool(bool),
    None,
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
}

/// Errors produced while parsing a literal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LiteralError {
    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unsupported name '{0}'")]
    UnknownName(String),

    #[error("trailing input after literal")]
    TrailingInput,
}

/// Parse `input` as a single literal, rejecting trailing input.
pub fn parse_literal(input: &str) -> Result<Literal, LiteralError> {
    let mut parser = Parser {
        chars: input.chars().peekable(),
    };
    let value = parser.value()?;
    parser.skip_whitespace();
    match parser.chars.peek() {
        None => Ok(value),
        Some(_) => Err(LiteralError::TrailingInput),
    }
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn value(&mut self) -> Result<Literal, LiteralError> {
        self.skip_whitespace();
        match self.chars.peek().copied() {
            None => Err(LiteralError::UnexpectedEnd),
            Some('[') => {
                self.chars.next();
                let (items, _) = self.sequence(']')?;
                Ok(Literal::List(items))
            }
            Some('(') => {
                self.chars.next();
                let (mut items, saw_comma) = self.sequence(')')?;
                // `(x)` is a parenthesised value, `(x,)` is a tuple
                if items.len() == 1 && !saw_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Literal::Tuple(items))
                }
            }
            Some(quote @ ('\'' | '"')) => {
                self.chars.next();
                self.string(quote).map(Literal::Str)
            }
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.name(),
            Some(c) => Err(LiteralError::UnexpectedChar(c)),
        }
    }

    fn sequence(&mut self, close: char) -> Result<(Vec<Literal>, bool), LiteralError> {
        let mut items = Vec::new();
        let mut saw_comma = false;

        loop {
            self.skip_whitespace();
            match self.chars.peek().copied() {
                None => return Err(LiteralError::UnexpectedEnd),
                Some(c) if c == close => {
                    self.chars.next();
                    return Ok((items, saw_comma));
                }
                Some(_) => {}
            }

            items.push(self.value()?);

            self.skip_whitespace();
            match self.chars.next() {
                Some(',') => saw_comma = true,
                Some(c) if c == close => return Ok((items, saw_comma)),
                Some(c) => return Err(LiteralError::UnexpectedChar(c)),
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<String, LiteralError> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None | Some('\n') => return Err(LiteralError::UnterminatedString),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    let escaped = self.chars.next().ok_or(LiteralError::UnterminatedString)?;
                    match escaped {
                        '\\' => out.push('\\'),
                        '\'' => out.push('\''),
                        '"' => out.push('"'),
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '\n' => {}
                        // unknown escapes are kept verbatim
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<Literal, LiteralError> {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+' | '_') {
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }

        let cleaned = text.replace('_', "");
        let well_formed = cleaned.chars().any(|c| c.is_ascii_digit())
            && cleaned
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
        if !well_formed {
            return Err(LiteralError::InvalidNumber(text));
        }

        if let Ok(int) = cleaned.parse::<i64>() {
            return Ok(Literal::Int(int));
        }
        if let Some(digits) = big_int_digits(&cleaned) {
            return Ok(Literal::BigInt(digits));
        }
        cleaned
            .parse::<f64>()
            .map(Literal::Float)
            .map_err(|_| LiteralError::InvalidNumber(text))
    }

    fn name(&mut self) -> Result<Literal, LiteralError> {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.chars.next();
            } else {
                break;
            }
        }

        match word.as_str() {
            "True" => Ok(Literal::Bool(true)),
            "False" => Ok(Literal::Bool(false)),
            "None" => Ok(Literal::None),
            _ => Err(LiteralError::UnknownName(word)),
        }
    }
}

/// Canonical text of an integer literal too large for `i64`: sign kept only
/// when negative, leading zeros dropped.
fn big_int_digits(text: &str) -> Option<String> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Some("0".to_string());
    }
    Some(if negative {
        format!("-{}", digits)
    } else {
        digits.to_string()
    })
}

/// Shortest round-trip text of a float, laid out the way list literals print
/// it: positional for exponents in `-4..16`, otherwise `d.ddde+XX`.
fn float_text(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{:e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exponent) => (mantissa, exponent),
            Err(_) => return scientific,
        },
        None => return scientific,
    };
    let sign = if mantissa.starts_with('-') { "-" } else { "" };
    let digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();

    if (-4..16).contains(&exponent) {
        if exponent < 0 {
            let zeros = "0".repeat((-exponent - 1) as usize);
            return format!("{}0.{}{}", sign, zeros, digits);
        }
        let int_len = exponent as usize + 1;
        if digits.len() > int_len {
            format!("{}{}.{}", sign, &digits[..int_len], &digits[int_len..])
        } else {
            format!("{}{}{}.0", sign, digits, "0".repeat(int_len - digits.len()))
        }
    } else {
        let (lead, rest) = digits.split_at(1);
        let fraction = if rest.is_empty() {
            String::new()
        } else {
            format!(".{}", rest)
        };
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        format!("{}{}{}e{}{:02}", sign, lead, fraction, exp_sign, exponent.abs())
    }
}

impl Literal {
    /// Quoted form, used for strings nested inside containers.
    fn repr(&self) -> String {
        match self {
            Literal::Str(s) => {
                if s.contains('\'') && !s.contains('"') {
                    format!("\"{}\"", s.replace('\\', "\\\\"))
                } else {
                    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
                }
            }
            other => other.to_string(),
        }
    }
}

/// Plain text form: strings are unquoted, containers print their items quoted.
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => f.write_str(s),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::BigInt(digits) => f.write_str(digits),
            Literal::Float(x) => f.write_str(&float_text(*x)),
            Literal::Bool(true) => f.write_str("True"),
            Literal::Bool(false) => f.write_str("False"),
            Literal::None => f.write_str("None"),
            Literal::List(items) => {
                let inner: Vec<String> = items.iter().map(Literal::repr).collect();
                write!(f, "[{}]", inner.join(", "))
            }
            Literal::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0].repr()),
            Literal::Tuple(items) => {
                let inner: Vec<String> = items.iter().map(Literal::repr).collect();
                write!(f, "({})", inner.join(", "))
            }
        }
    }
}
