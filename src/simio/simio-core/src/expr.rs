//! Numeric expressions for command arguments
//!
//! Accepts C-style integer expressions such as `0x6E`, `6Eh`, `1 << 5`
//! or `(0x60 + 0x0E) | 1`. Arithmetic wraps at 32 bits.

use heapless::Vec;

use crate::constants::expr::STACK_DEPTH;
use crate::error::ExprError;
use crate::Address;

#[derive(Clone, Copy, Debug, PartialEq)]
enum BinOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    And,
    Xor,
    Or,
}

impl BinOp {
    fn precedence(self) -> u8 {
        match self {
            BinOp::Mul | BinOp::Div | BinOp::Rem => 5,
            BinOp::Add | BinOp::Sub => 4,
            BinOp::Shl | BinOp::Shr => 3,
            BinOp::And => 2,
            BinOp::Xor => 1,
            BinOp::Or => 0,
        }
    }

    fn apply(self, lhs: Address, rhs: Address) -> Result<Address, ExprError> {
        Ok(match self {
            BinOp::Mul => lhs.wrapping_mul(rhs),
            BinOp::Div => lhs.checked_div(rhs).ok_or(ExprError::DivideByZero)?,
            BinOp::Rem => lhs.checked_rem(rhs).ok_or(ExprError::DivideByZero)?,
            BinOp::Add => lhs.wrapping_add(rhs),
            BinOp::Sub => lhs.wrapping_sub(rhs),
            BinOp::Shl => lhs.checked_shl(rhs).unwrap_or(0),
            BinOp::Shr => lhs.checked_shr(rhs).unwrap_or(0),
            BinOp::And => lhs & rhs,
            BinOp::Xor => lhs ^ rhs,
            BinOp::Or => lhs | rhs,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token {
    Number(Address),
    Op(BinOp),
    Tilde,
    Open,
    Close,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum StackOp {
    Binary(BinOp),
    Negate,
    Invert,
    Open,
}

const UNARY_PRECEDENCE: u8 = 6;

impl StackOp {
    fn precedence(self) -> Option<u8> {
        match self {
            StackOp::Binary(op) => Some(op.precedence()),
            StackOp::Negate | StackOp::Invert => Some(UNARY_PRECEDENCE),
            StackOp::Open => None,
        }
    }
}

struct Evaluator {
    values: Vec<Address, STACK_DEPTH>,
    ops: Vec<StackOp, STACK_DEPTH>,
}

impl Evaluator {
    fn new() -> Self {
        Self {
            values: Vec::new(),
            ops: Vec::new(),
        }
    }

    fn push_value(&mut self, value: Address) -> Result<(), ExprError> {
        self.values.push(value).map_err(|_| ExprError::TooComplex)
    }

    fn push_op(&mut self, op: StackOp) -> Result<(), ExprError> {
        self.ops.push(op).map_err(|_| ExprError::TooComplex)
    }

    fn pop_value(&mut self) -> Result<Address, ExprError> {
        self.values
            .pop()
            .ok_or_else(|| ExprError::UnexpectedToken("operator".to_string()))
    }

    /// Apply one stacked operator to the value stack
    fn reduce(&mut self, op: StackOp) -> Result<(), ExprError> {
        let result = match op {
            StackOp::Binary(bin) => {
                let rhs = self.pop_value()?;
                let lhs = self.pop_value()?;
                bin.apply(lhs, rhs)?
            }
            StackOp::Negate => self.pop_value()?.wrapping_neg(),
            StackOp::Invert => !self.pop_value()?,
            StackOp::Open => return Err(ExprError::Unbalanced),
        };
        self.push_value(result)
    }

    /// Reduce while the stacked operator binds at least as tightly
    fn reduce_while(&mut self, precedence: u8) -> Result<(), ExprError> {
        while let Some(&top) = self.ops.last() {
            match top.precedence() {
                Some(p) if p >= precedence => {
                    self.ops.pop();
                    self.reduce(top)?;
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn close_group(&mut self) -> Result<(), ExprError> {
        loop {
            match self.ops.pop() {
                Some(StackOp::Open) => return Ok(()),
                Some(op) => self.reduce(op)?,
                None => return Err(ExprError::Unbalanced),
            }
        }
    }

    fn finish(mut self) -> Result<Address, ExprError> {
        while let Some(op) = self.ops.pop() {
            self.reduce(op)?;
        }
        match (self.values.pop(), self.values.is_empty()) {
            (Some(value), true) => Ok(value),
            (None, _) => Err(ExprError::Empty),
            (Some(_), false) => Err(ExprError::UnexpectedToken("value".to_string())),
        }
    }
}

/// Parse a numeric literal: decimal, `0x`/`0b`/`0o` prefixed or `h` suffixed hex
fn parse_number(text: &str) -> Result<Address, ExprError> {
    let lower = text.to_ascii_lowercase();
    let (digits, radix) = if let Some(hex) = lower.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(hex) = lower.strip_suffix('h') {
        (hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (bin, 2)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        (oct, 8)
    } else {
        (lower.as_str(), 10)
    };

    let digits = digits.replace('_', "");
    Address::from_str_radix(&digits, radix).map_err(|_| ExprError::BadNumber(text.to_string()))
}

fn tokenize(text: &str) -> Result<std::vec::Vec<Token>, ExprError> {
    let bytes = text.as_bytes();
    let mut tokens = std::vec::Vec::new();
    let mut idx = 0;

    while idx < bytes.len() {
        let c = bytes[idx];
        if c.is_ascii_whitespace() {
            idx += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let start = idx;
            while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
                idx += 1;
            }
            tokens.push(Token::Number(parse_number(&text[start..idx])?));
            continue;
        }

        let two = bytes.get(idx..idx + 2);
        let (token, len) = match (c, two) {
            (_, Some(b"<<")) => (Token::Op(BinOp::Shl), 2),
            (_, Some(b">>")) => (Token::Op(BinOp::Shr), 2),
            (b'*', _) => (Token::Op(BinOp::Mul), 1),
            (b'/', _) => (Token::Op(BinOp::Div), 1),
            (b'%', _) => (Token::Op(BinOp::Rem), 1),
            (b'+', _) => (Token::Op(BinOp::Add), 1),
            (b'-', _) => (Token::Op(BinOp::Sub), 1),
            (b'&', _) => (Token::Op(BinOp::And), 1),
            (b'^', _) => (Token::Op(BinOp::Xor), 1),
            (b'|', _) => (Token::Op(BinOp::Or), 1),
            (b'~', _) => (Token::Tilde, 1),
            (b'(', _) => (Token::Open, 1),
            (b')', _) => (Token::Close, 1),
            _ => {
                let rest = &text[idx..];
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                return Err(ExprError::UnexpectedToken(rest[..end].to_string()));
            }
        };
        tokens.push(token);
        idx += len;
    }

    Ok(tokens)
}

/// Evaluate `text` to an address-sized value
pub fn eval(text: &str) -> Result<Address, ExprError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }

    let mut eval = Evaluator::new();
    let mut expect_operand = true;

    for token in tokens {
        if expect_operand {
            match token {
                Token::Number(value) => {
                    eval.push_value(value)?;
                    expect_operand = false;
                }
                Token::Open => eval.push_op(StackOp::Open)?,
                Token::Op(BinOp::Sub) => eval.push_op(StackOp::Negate)?,
                Token::Op(BinOp::Add) => {} // unary plus
                Token::Tilde => eval.push_op(StackOp::Invert)?,
                other => return Err(ExprError::UnexpectedToken(format!("{:?}", other))),
            }
        } else {
            match token {
                Token::Op(op) => {
                    eval.reduce_while(op.precedence())?;
                    eval.push_op(StackOp::Binary(op))?;
                    expect_operand = true;
                }
                Token::Close => eval.close_group()?,
                other => return Err(ExprError::UnexpectedToken(format!("{:?}", other))),
            }
        }
    }

    if expect_operand {
        return Err(ExprError::UnexpectedToken("end of expression".to_string()));
    }
    eval.finish()
}

#[cfg(test)]
mod expr_tests {
    use super::*;

    #[test]
    fn test_literals() {
        assert_eq!(eval("110"), Ok(110));
        assert_eq!(eval("0x006E"), Ok(0x6E));
        assert_eq!(eval("0X6f"), Ok(0x6F));
        assert_eq!(eval("6Eh"), Ok(0x6E));
        assert_eq!(eval("0b101"), Ok(5));
        assert_eq!(eval("0o17"), Ok(15));
        assert_eq!(eval("1_000"), Ok(1000));
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("2 + 3 * 4"), Ok(14));
        assert_eq!(eval("(2 + 3) * 4"), Ok(20));
        assert_eq!(eval("1 << 2 + 1"), Ok(8));
        assert_eq!(eval("0x60 | 0x0E & 0x0F"), Ok(0x6E));
        assert_eq!(eval("10 - 4 - 3"), Ok(3));
        assert_eq!(eval("-1"), Ok(0xFFFF_FFFF));
        assert_eq!(eval("~0 & 0xFF"), Ok(0xFF));
        assert_eq!(eval("-(2 * 3) + 7"), Ok(1));
    }

    #[test]
    fn test_errors() {
        assert_eq!(eval(""), Err(ExprError::Empty));
        assert_eq!(eval("   "), Err(ExprError::Empty));
        assert_eq!(eval("0xZZ"), Err(ExprError::BadNumber("0xZZ".to_string())));
        assert_eq!(eval("99999999999"), Err(ExprError::BadNumber("99999999999".to_string())));
        assert_eq!(eval("(1 + 2"), Err(ExprError::Unbalanced));
        assert_eq!(eval("1 + 2)"), Err(ExprError::Unbalanced));
        assert_eq!(eval("4 / 0"), Err(ExprError::DivideByZero));
        assert!(matches!(eval("1 +"), Err(ExprError::UnexpectedToken(_))));
        assert!(matches!(eval("rxbuf"), Err(ExprError::UnexpectedToken(_))));
        assert!(matches!(eval("1 2"), Err(ExprError::UnexpectedToken(_))));
    }

    #[test]
    fn test_stack_limit() {
        let deep = format!("{}1{}", "(".repeat(STACK_DEPTH + 1), ")".repeat(STACK_DEPTH + 1));
        assert_eq!(eval(&deep), Err(ExprError::TooComplex));
    }
}
