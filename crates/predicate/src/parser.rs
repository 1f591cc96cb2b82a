//! Recursive descent parser for the predicate grammar.
//!
//! ```text
//! expr     := or_expr
//! or_expr  := and_expr ( "OR" and_expr )*
//! and_expr := cmp_expr ( "AND" cmp_expr )*
//! cmp_expr := atom cmp_op atom | "(" expr ")"
//! atom     := "price" | "time" | number | time_literal
//! cmp_op   := "<" | "<=" | ">" | ">=" | "=="
//! ```
//!
//! Errors carry the character offset of the offending token so startup
//! diagnostics can point at the exact spot in the condition string.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::ast::{CmpOp, Operand, Predicate};

/// A malformed predicate, with the character offset where parsing stopped.
#[derive(Debug, Clone, Error)]
#[error("parse error at position {position}: {reason}")]
pub struct ParseError {
    pub position: usize,
    pub reason: String,
}

impl ParseError {
    /// Render the error with the source line and a caret under the
    /// offending position.
    pub fn display_with_context(&self, input: &str) -> String {
        format!(
            "{}\n  {}\n  {}^ position {}",
            self.reason,
            input,
            " ".repeat(self.position),
            self.position
        )
    }
}

/// Parse a predicate source string.
pub fn parse(input: &str) -> Result<Predicate, ParseError> {
    let mut parser = Parser::new(input);
    let expr = parser.parse_or()?;
    parser.skip_whitespace();
    if parser.pos < parser.input.len() {
        return Err(ParseError {
            position: parser.pos,
            reason: format!("unexpected input after expression: '{}'", parser.remaining()),
        });
    }
    Ok(expr)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn peek_word(&self) -> String {
        let mut word = String::new();
        for ch in self.remaining().chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
            } else {
                break;
            }
        }
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && !remaining[keyword.len()..]
                .chars()
                .next()
                .map(|c| c.is_alphanumeric() || c == '_')
                .unwrap_or(false)
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(ParseError {
                position: self.pos,
                reason: format!("expected '{}', found '{}'", expected, ch),
            }),
            None => Err(ParseError {
                position: self.pos,
                reason: format!("expected '{}', found end of input", expected),
            }),
        }
    }

    fn parse_or(&mut self) -> Result<Predicate, ParseError> {
        let mut node = self.parse_and()?;
        loop {
            self.skip_whitespace();
            if self.consume_keyword("OR") {
                let rhs = self.parse_and()?;
                node = Predicate::Or(Box::new(node), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(node)
    }

    fn parse_and(&mut self) -> Result<Predicate, ParseError> {
        let mut node = self.parse_cmp()?;
        loop {
            self.skip_whitespace();
            if self.consume_keyword("AND") {
                let rhs = self.parse_cmp()?;
                node = Predicate::And(Box::new(node), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(node)
    }

    fn parse_cmp(&mut self) -> Result<Predicate, ParseError> {
        self.skip_whitespace();

        if self.peek() == Some('(') {
            self.advance();
            let inner = self.parse_or()?;
            self.expect_char(')')?;
            return Ok(inner);
        }

        let lhs = self.parse_atom()?;
        self.skip_whitespace();
        let op_pos = self.pos;
        let op = self.parse_cmp_op()?;
        let rhs = self.parse_atom()?;

        if lhs.kind() != rhs.kind() {
            return Err(ParseError {
                position: op_pos,
                reason: format!("cannot compare {} with {}", lhs.kind(), rhs.kind()),
            });
        }

        Ok(Predicate::Compare { lhs, op, rhs })
    }

    fn parse_cmp_op(&mut self) -> Result<CmpOp, ParseError> {
        self.skip_whitespace();
        let rest = self.remaining();
        let (op, len) = if rest.starts_with("<=") {
            (CmpOp::Le, 2)
        } else if rest.starts_with(">=") {
            (CmpOp::Ge, 2)
        } else if rest.starts_with("==") {
            (CmpOp::Eq, 2)
        } else if rest.starts_with('<') {
            (CmpOp::Lt, 1)
        } else if rest.starts_with('>') {
            (CmpOp::Gt, 1)
        } else {
            return Err(ParseError {
                position: self.pos,
                reason: format!(
                    "expected comparison operator, found '{}'",
                    self.peek_word()
                ),
            });
        };
        self.pos += len;
        Ok(op)
    }

    fn parse_atom(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        match self.peek() {
            Some(ch) if ch.is_ascii_digit() || ch == '-' || ch == '.' => self.parse_literal(),
            Some(_) => {
                let word = self.peek_word();
                match word.as_str() {
                    "price" => {
                        self.pos += word.len();
                        Ok(Operand::Price)
                    }
                    "time" => {
                        self.pos += word.len();
                        Ok(Operand::Time)
                    }
                    _ => Err(ParseError {
                        position: self.pos,
                        reason: format!("unknown identifier '{}'", word),
                    }),
                }
            }
            None => Err(ParseError {
                position: self.pos,
                reason: "expected operand, found end of input".to_string(),
            }),
        }
    }

    /// A numeric literal, or an `HH:MM` time-of-day literal.
    fn parse_literal(&mut self) -> Result<Operand, ParseError> {
        let start = self.pos;
        let mut digits = 0;
        let mut has_dot = false;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                position: start,
                reason: "expected number".to_string(),
            });
        }

        // A ':' after a plain integer turns it into a time-of-day literal.
        if self.peek() == Some(':') && !has_dot {
            return self.finish_time_literal(start, digits);
        }

        let text = &self.input[start..self.pos];
        let value = text.parse::<Decimal>().map_err(|_| ParseError {
            position: start,
            reason: format!("invalid number: {}", text),
        })?;
        Ok(Operand::Number(value))
    }

    fn finish_time_literal(&mut self, start: usize, hour_digits: usize) -> Result<Operand, ParseError> {
        let input = self.input;
        let invalid = move |position: usize| ParseError {
            position,
            reason: format!(
                "invalid time literal '{}', expected HH:MM",
                input[start..].split_whitespace().next().unwrap_or_default()
            ),
        };

        let hour_text = &input[start..self.pos];
        if hour_digits > 2 || hour_text.starts_with('-') {
            return Err(invalid(start));
        }
        let hours: u32 = hour_text.parse().map_err(|_| invalid(start))?;

        self.advance(); // ':'
        let minute_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        let minute_text = &input[minute_start..self.pos];
        if minute_text.len() != 2 {
            return Err(invalid(start));
        }
        let minutes: u32 = minute_text.parse().map_err(|_| invalid(start))?;

        if hours > 23 || minutes > 59 {
            return Err(invalid(start));
        }

        Ok(Operand::TimeOfDay(hours * 60 + minutes))
    }
}
