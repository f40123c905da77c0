//! Tokenizer for the C declaration subset used by the ABI header.
//!
//! Comments are dropped and backslash-newline continuations are joined.
//! Preprocessor directives are not interpreted here; each one is bracketed by
//! [`TokenKind::DirectiveStart`] / [`TokenKind::DirectiveEnd`] so the
//! preprocessor can pick them out of the stream.

use crate::error::ParseError;
use crate::header::ast::MacroConstant;

/// Multi-character operators, longest first.
const OPERATORS: &[&str] = &[
    "...", "<<", ">>", "&&", "||", "==", "!=", "<=", ">=", "->", "::",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident(String),
    /// Numeric literal; `value` is `None` for literals that are not integers.
    Number { text: String, value: Option<i64> },
    Str(String),
    Char(i64),
    Op(&'static str),
    Punct(char),
    DirectiveStart,
    DirectiveEnd,
    /// Emitted by the preprocessor for `#define NAME <int>`.
    Macro(MacroConstant),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
    /// Whether whitespace separated this token from the previous one.
    pub space_before: bool,
}

impl Token {
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_ident(&self, name: &str) -> bool {
        self.ident() == Some(name)
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub fn is_op(&self, op: &str) -> bool {
        matches!(self.kind, TokenKind::Op(o) if o == op)
    }

    /// Short rendering for error messages.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Ident(s) => format!("`{s}`"),
            TokenKind::Number { text, .. } => format!("`{text}`"),
            TokenKind::Str(s) => format!("\"{s}\""),
            TokenKind::Char(v) => format!("character literal {v}"),
            TokenKind::Op(o) => format!("`{o}`"),
            TokenKind::Punct(c) => format!("`{c}`"),
            TokenKind::DirectiveStart => "preprocessor directive".to_string(),
            TokenKind::DirectiveEnd => "end of directive".to_string(),
            TokenKind::Macro(m) => format!("macro `{}`", m.name),
        }
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    at_line_start: bool,
    in_directive: bool,
    space_before: bool,
    tokens: Vec<Token>,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        at_line_start: true,
        in_directive: false,
        space_before: false,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, line: usize) {
        self.tokens.push(Token {
            kind,
            line,
            space_before: self.space_before,
        });
        self.space_before = false;
        self.at_line_start = false;
    }

    fn end_directive(&mut self) {
        if self.in_directive {
            let line = self.line;
            self.push(TokenKind::DirectiveEnd, line);
            self.in_directive = false;
        }
    }

    fn run(&mut self) -> Result<(), ParseError> {
        while let Some(c) = self.peek() {
            match c {
                '\n' => {
                    self.end_directive();
                    self.bump();
                    self.at_line_start = true;
                    self.space_before = true;
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                    self.space_before = true;
                }
                '\\' if self.peek_at(1) == Some('\r') && self.peek_at(2) == Some('\n') => {
                    self.bump();
                    self.bump();
                    self.bump();
                    self.space_before = true;
                }
                c if c.is_whitespace() => {
                    self.bump();
                    self.space_before = true;
                }
                '/' if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    self.space_before = true;
                }
                '/' if self.peek_at(1) == Some('*') => self.block_comment()?,
                '#' if self.at_line_start && !self.in_directive => {
                    let line = self.line;
                    self.bump();
                    self.push(TokenKind::DirectiveStart, line);
                    self.in_directive = true;
                }
                c if c.is_ascii_alphabetic() || c == '_' => self.identifier(),
                c if c.is_ascii_digit() => self.number(),
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => self.number(),
                '"' => self.string()?,
                '\'' => self.char_literal()?,
                _ => self.operator(),
            }
        }
        self.end_directive();
        Ok(())
    }

    fn block_comment(&mut self) -> Result<(), ParseError> {
        let start = self.line;
        self.bump();
        self.bump();
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    break;
                }
                Some(_) => {}
                None => return Err(ParseError::new(start, "unterminated block comment")),
            }
        }
        self.space_before = true;
        Ok(())
    }

    fn identifier(&mut self) {
        let line = self.line;
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        self.push(TokenKind::Ident(ident), line);
    }

    fn number(&mut self) {
        let line = self.line;
        let mut text = String::new();
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '+' || c == '-')
                && text.ends_with(['e', 'E'])
                && !text.starts_with("0x")
                && !text.starts_with("0X");
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let value = parse_int_literal(&text);
        self.push(TokenKind::Number { text, value }, line);
    }

    fn string(&mut self) -> Result<(), ParseError> {
        let line = self.line;
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => {
                    if let Some(escaped) = self.bump() {
                        value.push('\\');
                        value.push(escaped);
                    }
                }
                Some('\n') | None => return Err(ParseError::new(line, "unterminated string literal")),
                Some(c) => value.push(c),
            }
        }
        self.push(TokenKind::Str(value), line);
        Ok(())
    }

    fn char_literal(&mut self) -> Result<(), ParseError> {
        let line = self.line;
        self.bump();
        let value = match self.bump() {
            Some('\\') => match self.bump() {
                Some('n') => '\n' as i64,
                Some('t') => '\t' as i64,
                Some('r') => '\r' as i64,
                Some('0') => 0,
                Some(c) => c as i64,
                None => return Err(ParseError::new(line, "unterminated character literal")),
            },
            Some(c) => c as i64,
            None => return Err(ParseError::new(line, "unterminated character literal")),
        };
        if self.bump() != Some('\'') {
            return Err(ParseError::new(line, "unterminated character literal"));
        }
        self.push(TokenKind::Char(value), line);
        Ok(())
    }

    fn operator(&mut self) {
        let line = self.line;
        for op in OPERATORS {
            let matches = op
                .chars()
                .enumerate()
                .all(|(i, c)| self.peek_at(i) == Some(c));
            if matches {
                for _ in 0..op.len() {
                    self.bump();
                }
                self.push(TokenKind::Op(op), line);
                return;
            }
        }
        if let Some(c) = self.bump() {
            self.push(TokenKind::Punct(c), line);
        }
    }
}

/// Parse a C integer literal: decimal, `0x` hex, leading-zero octal, `0b`
/// binary, with any combination of `u`/`l` suffixes.
pub(crate) fn parse_int_literal(text: &str) -> Option<i64> {
    let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);
    if digits.is_empty() {
        return None;
    }
    let (radix, body) = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        (16, hex)
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        (2, bin)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    // hex values above i64::MAX are kept as their two's complement bit pattern
    u64::from_str_radix(body, radix).ok().map(|v| v as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_comments_are_dropped() {
        let tokens = kinds("int /* block\n comment */ x; // trailing\n");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("int".to_string()),
                TokenKind::Ident("x".to_string()),
                TokenKind::Punct(';'),
            ]
        );
    }

    #[test]
    fn test_line_numbers_survive_comments() {
        let tokens = tokenize("/*\n\n*/\nfoo").unwrap();
        assert_eq!(tokens[0].line, 4);
    }

    #[test]
    fn test_directive_brackets_and_continuation() {
        let tokens = kinds("#define A \\\n 3\nint");
        assert_eq!(
            tokens,
            vec![
                TokenKind::DirectiveStart,
                TokenKind::Ident("define".to_string()),
                TokenKind::Ident("A".to_string()),
                TokenKind::Number {
                    text: "3".to_string(),
                    value: Some(3)
                },
                TokenKind::DirectiveEnd,
                TokenKind::Ident("int".to_string()),
            ]
        );
    }

    #[test]
    fn test_hash_mid_line_is_not_a_directive() {
        let tokens = kinds("a # b");
        assert_eq!(tokens[1], TokenKind::Punct('#'));
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("1 << 2 ... ->");
        assert_eq!(tokens[1], TokenKind::Op("<<"));
        assert_eq!(tokens[3], TokenKind::Op("..."));
        assert_eq!(tokens[4], TokenKind::Op("->"));
    }

    #[test]
    fn test_int_literals() {
        assert_eq!(parse_int_literal("42"), Some(42));
        assert_eq!(parse_int_literal("0x1F"), Some(31));
        assert_eq!(parse_int_literal("010"), Some(8));
        assert_eq!(parse_int_literal("7ULL"), Some(7));
        assert_eq!(parse_int_literal("0"), Some(0));
        assert_eq!(parse_int_literal("1.5f"), None);
    }

    #[test]
    fn test_unterminated_comment_is_an_error() {
        let err = tokenize("int a; /* never closed").unwrap_err();
        assert_eq!(err.line, 1);
    }
}
