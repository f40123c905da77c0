//! Integer constant expressions, as found in enumerator initializers,
//! `#define` bodies and `#if` conditions.

use crate::header::lexer::{Token, TokenKind};

/// Evaluate `tokens` as a C integer constant expression.
///
/// Identifiers are looked up through `lookup`; `None` from the lookup makes
/// the whole expression unevaluable. Returns `None` for anything outside the
/// supported grammar or when tokens remain after a complete expression.
pub(crate) fn evaluate(tokens: &[Token], lookup: &dyn Fn(&str) -> Option<i64>) -> Option<i64> {
    let mut eval = Evaluator {
        tokens,
        pos: 0,
        lookup,
    };
    let value = eval.binary(0)?;
    (eval.pos == tokens.len()).then_some(value)
}

struct Evaluator<'a> {
    tokens: &'a [Token],
    pos: usize,
    lookup: &'a dyn Fn(&str) -> Option<i64>,
}

/// Binding power of a binary operator; higher binds tighter.
fn precedence(token: &Token) -> Option<(u8, &'static str)> {
    let op = match &token.kind {
        TokenKind::Op(op) => *op,
        TokenKind::Punct('*') => "*",
        TokenKind::Punct('/') => "/",
        TokenKind::Punct('%') => "%",
        TokenKind::Punct('+') => "+",
        TokenKind::Punct('-') => "-",
        TokenKind::Punct('<') => "<",
        TokenKind::Punct('>') => ">",
        TokenKind::Punct('&') => "&",
        TokenKind::Punct('^') => "^",
        TokenKind::Punct('|') => "|",
        _ => return None,
    };
    let level = match op {
        "||" => 1,
        "&&" => 2,
        "|" => 3,
        "^" => 4,
        "&" => 5,
        "==" | "!=" => 6,
        "<" | ">" | "<=" | ">=" => 7,
        "<<" | ">>" => 8,
        "+" | "-" => 9,
        "*" | "/" | "%" => 10,
        _ => return None,
    };
    Some((level, op))
}

impl Evaluator<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn binary(&mut self, min_level: u8) -> Option<i64> {
        let mut lhs = self.unary()?;
        while let Some((level, op)) = self.peek().and_then(precedence) {
            if level <= min_level {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(level)?;
            lhs = apply(op, lhs, rhs)?;
        }
        Some(lhs)
    }

    fn unary(&mut self) -> Option<i64> {
        let token = self.peek()?.clone();
        self.pos += 1;
        match token.kind {
            TokenKind::Punct('-') => self.unary().map(i64::wrapping_neg),
            TokenKind::Punct('+') => self.unary(),
            TokenKind::Punct('~') => self.unary().map(|v| !v),
            TokenKind::Punct('!') => self.unary().map(|v| i64::from(v == 0)),
            TokenKind::Punct('(') => {
                // a parenthesized type name is a cast; the ABI header only casts to integer types
                if self.is_cast() {
                    while !self.peek()?.is_punct(')') {
                        self.pos += 1;
                    }
                    self.pos += 1;
                    return self.unary();
                }
                let value = self.binary(0)?;
                if !self.peek()?.is_punct(')') {
                    return None;
                }
                self.pos += 1;
                Some(value)
            }
            TokenKind::Number { value, .. } => value,
            TokenKind::Char(value) => Some(value),
            TokenKind::Ident(name) => (self.lookup)(&name),
            _ => None,
        }
    }

    fn is_cast(&self) -> bool {
        const TYPE_WORDS: &[&str] = &[
            "int", "unsigned", "signed", "long", "short", "char", "int8_t", "int16_t", "int32_t",
            "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t", "size_t",
        ];
        let mut i = self.pos;
        let mut saw_type = false;
        while let Some(token) = self.tokens.get(i) {
            match token.ident() {
                Some(word) if TYPE_WORDS.contains(&word) => saw_type = true,
                _ => return saw_type && token.is_punct(')'),
            }
            i += 1;
        }
        false
    }
}

fn apply(op: &str, lhs: i64, rhs: i64) -> Option<i64> {
    Some(match op {
        "||" => i64::from(lhs != 0 || rhs != 0),
        "&&" => i64::from(lhs != 0 && rhs != 0),
        "|" => lhs | rhs,
        "^" => lhs ^ rhs,
        "&" => lhs & rhs,
        "==" => i64::from(lhs == rhs),
        "!=" => i64::from(lhs != rhs),
        "<" => i64::from(lhs < rhs),
        ">" => i64::from(lhs > rhs),
        "<=" => i64::from(lhs <= rhs),
        ">=" => i64::from(lhs >= rhs),
        "<<" => lhs.checked_shl(u32::try_from(rhs).ok()?)?,
        ">>" => lhs.checked_shr(u32::try_from(rhs).ok()?)?,
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "*" => lhs.wrapping_mul(rhs),
        "/" => lhs.checked_div(rhs)?,
        "%" => lhs.checked_rem(rhs)?,
        _ => return None,
    })
}
