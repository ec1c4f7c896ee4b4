//! Integer expression evaluation for `#if` and `#elif`.
//!
//! The input has already had `defined` operators resolved and macros expanded.
//! Any identifier that is still left evaluates to 0.

use crate::engine::macros::{ident_len, is_ident_start, number_len};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Not,
    BitNot,
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

impl Op {
    fn binary_precedence(self) -> Option<u8> {
        let prec = match self {
            Op::Or => 1,
            Op::And => 2,
            Op::BitOr => 3,
            Op::BitXor => 4,
            Op::BitAnd => 5,
            Op::Eq | Op::Ne => 6,
            Op::Lt | Op::Le | Op::Gt | Op::Ge => 7,
            Op::Shl | Op::Shr => 8,
            Op::Add | Op::Sub => 9,
            Op::Mul | Op::Div | Op::Rem => 10,
            Op::Not | Op::BitNot => return None,
        };
        Some(prec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(i64),
    Op(Op),
    LParen,
    RParen,
}

/// Evaluate a preprocessor constant expression.
pub(crate) fn evaluate(expr: &str) -> Result<i64, String> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }

    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let value = parser.parse_binary(1)?;
    if parser.pos != tokens.len() {
        return Err(format!("unexpected token {:?}", tokens[parser.pos]));
    }
    Ok(value)
}

fn parse_number(literal: &str) -> Result<i64, String> {
    let digits = literal.trim_end_matches(['u', 'U', 'l', 'L']);
    let parsed = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse()
    };
    parsed.map_err(|_| format!("invalid integer literal '{literal}'"))
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let bytes = expr.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if b.is_ascii_digit() {
            let len = number_len(bytes, i);
            tokens.push(Token::Num(parse_number(&expr[i..i + len])?));
            i += len;
            continue;
        }
        if is_ident_start(b) {
            i += ident_len(bytes, i);
            tokens.push(Token::Num(0));
            continue;
        }

        let (token, len) = match (b, next) {
            (b'(', _) => (Token::LParen, 1),
            (b')', _) => (Token::RParen, 1),
            (b'&', Some(b'&')) => (Token::Op(Op::And), 2),
            (b'|', Some(b'|')) => (Token::Op(Op::Or), 2),
            (b'<', Some(b'<')) => (Token::Op(Op::Shl), 2),
            (b'>', Some(b'>')) => (Token::Op(Op::Shr), 2),
            (b'<', Some(b'=')) => (Token::Op(Op::Le), 2),
            (b'>', Some(b'=')) => (Token::Op(Op::Ge), 2),
            (b'=', Some(b'=')) => (Token::Op(Op::Eq), 2),
            (b'!', Some(b'=')) => (Token::Op(Op::Ne), 2),
            (b'&', _) => (Token::Op(Op::BitAnd), 1),
            (b'|', _) => (Token::Op(Op::BitOr), 1),
            (b'^', _) => (Token::Op(Op::BitXor), 1),
            (b'<', _) => (Token::Op(Op::Lt), 1),
            (b'>', _) => (Token::Op(Op::Gt), 1),
            (b'!', _) => (Token::Op(Op::Not), 1),
            (b'~', _) => (Token::Op(Op::BitNot), 1),
            (b'*', _) => (Token::Op(Op::Mul), 1),
            (b'/', _) => (Token::Op(Op::Div), 1),
            (b'%', _) => (Token::Op(Op::Rem), 1),
            (b'+', _) => (Token::Op(Op::Add), 1),
            (b'-', _) => (Token::Op(Op::Sub), 1),
            _ => {
                let ch = expr[i..].chars().next().unwrap_or('?');
                return Err(format!("unexpected character '{ch}'"));
            }
        };
        tokens.push(token);
        i += len;
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).copied();
        self.pos += 1;
        token
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<i64, String> {
        let mut lhs = self.parse_unary()?;

        while let Some(Token::Op(op)) = self.tokens.get(self.pos).copied() {
            let Some(prec) = op.binary_precedence() else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let rhs = self.parse_binary(prec + 1)?;
            lhs = apply(op, lhs, rhs)?;
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<i64, String> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Op(Op::Not)) => Ok(i64::from(self.parse_unary()? == 0)),
            Some(Token::Op(Op::BitNot)) => Ok(!self.parse_unary()?),
            Some(Token::Op(Op::Sub)) => Ok(self.parse_unary()?.wrapping_neg()),
            Some(Token::Op(Op::Add)) => self.parse_unary(),
            Some(Token::LParen) => {
                let value = self.parse_binary(1)?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err("missing ')'".to_string()),
                }
            }
            Some(token) => Err(format!("unexpected token {token:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

fn apply(op: Op, lhs: i64, rhs: i64) -> Result<i64, String> {
    let value = match op {
        Op::Mul => lhs.wrapping_mul(rhs),
        Op::Div | Op::Rem if rhs == 0 => return Err("division by zero".to_string()),
        Op::Div => lhs.wrapping_div(rhs),
        Op::Rem => lhs.wrapping_rem(rhs),
        Op::Add => lhs.wrapping_add(rhs),
        Op::Sub => lhs.wrapping_sub(rhs),
        Op::Shl => u32::try_from(rhs)
            .ok()
            .and_then(|s| lhs.checked_shl(s))
            .unwrap_or(0),
        Op::Shr => u32::try_from(rhs)
            .ok()
            .and_then(|s| lhs.checked_shr(s))
            .unwrap_or(0),
        Op::Lt => i64::from(lhs < rhs),
        Op::Le => i64::from(lhs <= rhs),
        Op::Gt => i64::from(lhs > rhs),
        Op::Ge => i64::from(lhs >= rhs),
        Op::Eq => i64::from(lhs == rhs),
        Op::Ne => i64::from(lhs != rhs),
        Op::BitAnd => lhs & rhs,
        Op::BitXor => lhs ^ rhs,
        Op::BitOr => lhs | rhs,
        Op::And => i64::from(lhs != 0 && rhs != 0),
        Op::Or => i64::from(lhs != 0 || rhs != 0),
        Op::Not | Op::BitNot => return Err(format!("{op:?} is not a binary operator")),
    };
    Ok(value)
}
