//! Conditional compilation and macro constants.
//!
//! The header is parsed as C, never C++: only names `#define`d earlier in the
//! file count as defined, so `__cplusplus` guards drop their bodies.

use std::collections::HashMap;

use tracing::trace;

use crate::error::ParseError;
use crate::header::ast::MacroConstant;
use crate::header::expr::evaluate;
use crate::header::lexer::{Token, TokenKind};

#[derive(Debug)]
struct Conditional {
    /// Whether the enclosing region is active.
    parent_active: bool,
    /// Whether the current branch is taken.
    taking: bool,
    /// Whether any branch of this conditional has been taken.
    any_taken: bool,
    seen_else: bool,
    line: usize,
}

#[derive(Debug, Default)]
struct Preprocessor {
    /// Defined names; `Some` for integer-valued macros.
    defines: HashMap<String, Option<i64>>,
    stack: Vec<Conditional>,
    output: Vec<Token>,
}

/// Strip directives and inactive regions from `tokens`, replacing integer
/// `#define`s with [`TokenKind::Macro`] tokens at their position.
pub(crate) fn preprocess(tokens: Vec<Token>) -> Result<Vec<Token>, ParseError> {
    let mut pp = Preprocessor::default();
    let mut iter = tokens.into_iter();

    while let Some(token) = iter.next() {
        if token.kind == TokenKind::DirectiveStart {
            let line = token.line;
            let mut body = Vec::new();
            for t in iter.by_ref() {
                if t.kind == TokenKind::DirectiveEnd {
                    break;
                }
                body.push(t);
            }
            pp.directive(line, &body)?;
        } else if pp.active() {
            pp.output.push(token);
        }
    }

    if let Some(open) = pp.stack.last() {
        return Err(ParseError::new(open.line, "unterminated conditional directive"));
    }
    Ok(pp.output)
}

impl Preprocessor {
    fn active(&self) -> bool {
        self.stack.last().is_none_or(|c| c.parent_active && c.taking)
    }

    fn directive(&mut self, line: usize, body: &[Token]) -> Result<(), ParseError> {
        let Some(name) = body.first().and_then(Token::ident) else {
            // null directive (`#` alone) or `#123` line markers
            return Ok(());
        };
        let args = &body[1..];

        match name {
            "ifdef" | "ifndef" => {
                let macro_name = args
                    .first()
                    .and_then(Token::ident)
                    .ok_or_else(|| ParseError::new(line, format!("#{name} requires a macro name")))?;
                let defined = self.defines.contains_key(macro_name);
                let taking = if name == "ifdef" { defined } else { !defined };
                self.open(line, taking);
            }
            "if" => {
                let taking = self.active() && self.condition(args);
                self.open(line, taking);
            }
            "elif" => {
                let condition = {
                    let current = self.current(line, "#elif")?;
                    current.parent_active && !current.any_taken && !current.seen_else
                };
                let taking = condition && self.condition(args);
                let current = self.current(line, "#elif")?;
                if current.seen_else {
                    return Err(ParseError::new(line, "#elif after #else"));
                }
                current.taking = taking;
                current.any_taken |= taking;
            }
            "else" => {
                let current = self.current(line, "#else")?;
                if current.seen_else {
                    return Err(ParseError::new(line, "duplicate #else"));
                }
                current.seen_else = true;
                current.taking = !current.any_taken;
                current.any_taken = true;
            }
            "endif" => {
                if self.stack.pop().is_none() {
                    return Err(ParseError::new(line, "#endif without matching #if"));
                }
            }
            _ if !self.active() => {}
            "define" => self.define(line, args)?,
            "undef" => {
                if let Some(macro_name) = args.first().and_then(Token::ident) {
                    self.defines.remove(macro_name);
                }
            }
            other => trace!(directive = other, line, "skipping preprocessor directive"),
        }
        Ok(())
    }

    fn open(&mut self, line: usize, taking: bool) {
        let parent_active = self.active();
        self.stack.push(Conditional {
            parent_active,
            taking,
            any_taken: taking,
            seen_else: false,
            line,
        });
    }

    fn current(&mut self, line: usize, directive: &str) -> Result<&mut Conditional, ParseError> {
        self.stack
            .last_mut()
            .ok_or_else(|| ParseError::new(line, format!("{directive} without matching #if")))
    }

    fn define(&mut self, line: usize, args: &[Token]) -> Result<(), ParseError> {
        let Some(first) = args.first() else {
            return Err(ParseError::new(line, "#define requires a macro name"));
        };
        let name = first
            .ident()
            .ok_or_else(|| ParseError::new(line, format!("invalid macro name {}", first.describe())))?
            .to_string();
        let body = &args[1..];

        // function-like macros have `(` glued to the name
        let function_like = body.first().is_some_and(|t| t.is_punct('(') && !t.space_before);
        let value = if body.is_empty() || function_like {
            None
        } else {
            evaluate(body, &|ident| self.defines.get(ident).copied().flatten())
        };

        if let Some(value) = value {
            self.output.push(Token {
                kind: TokenKind::Macro(MacroConstant {
                    name: name.clone(),
                    value,
                    line,
                }),
                line,
                space_before: true,
            });
        }
        self.defines.insert(name, value);
        Ok(())
    }

    /// Evaluate an `#if`/`#elif` condition. `defined X` and `defined(X)` are
    /// replaced first; remaining unknown identifiers are 0 as in C. An
    /// expression outside the supported grammar is false.
    fn condition(&self, args: &[Token]) -> bool {
        let mut expanded = Vec::with_capacity(args.len());
        let mut i = 0;
        while let Some(token) = args.get(i) {
            if token.is_ident("defined") {
                let (name, consumed) = match (args.get(i + 1), args.get(i + 2), args.get(i + 3)) {
                    (Some(open), Some(name), Some(close)) if open.is_punct('(') && close.is_punct(')') => {
                        (name.ident(), 4)
                    }
                    (Some(name), _, _) => (name.ident(), 2),
                    _ => (None, 1),
                };
                let defined = name.is_some_and(|n| self.defines.contains_key(n));
                expanded.push(Token {
                    kind: TokenKind::Number {
                        text: String::from(if defined { "1" } else { "0" }),
                        value: Some(i64::from(defined)),
                    },
                    line: token.line,
                    space_before: true,
                });
                i += consumed;
            } else {
                expanded.push(token.clone());
                i += 1;
            }
        }
        evaluate(&expanded, &|ident| Some(self.defines.get(ident).copied().flatten().unwrap_or(0)))
            .is_some_and(|v| v != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::lexer::tokenize;

    fn idents(source: &str) -> Vec<String> {
        preprocess(tokenize(source).unwrap())
            .unwrap()
            .into_iter()
            .filter_map(|t| t.ident().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_include_guard_keeps_body() {
        let src = "#ifndef GUARD_H\n#define GUARD_H\nkept\n#endif\n";
        assert_eq!(idents(src), vec!["kept"]);
    }

    #[test]
    fn test_cplusplus_regions_dropped() {
        let src = "#ifdef __cplusplus\nextern\n#endif\nbody\n#ifdef __cplusplus\n}\n#endif\n";
        assert_eq!(idents(src), vec!["body"]);
    }

    #[test]
    fn test_ifndef_cplusplus_taken() {
        let src = "#ifndef __cplusplus\ntypedef_here\n#endif\n";
        assert_eq!(idents(src), vec!["typedef_here"]);
    }

    #[test]
    fn test_else_and_elif() {
        let src = "#define V 2\n#if V == 1\na\n#elif V == 2\nb\n#else\nc\n#endif\n";
        assert_eq!(idents(src), vec!["b"]);
    }

    #[test]
    fn test_nested_inactive_region() {
        let src = "#if 0\n#ifdef X\na\n#else\nb\n#endif\n#endif\nc\n";
        assert_eq!(idents(src), vec!["c"]);
    }

    #[test]
    fn test_integer_define_becomes_macro_token() {
        let tokens = preprocess(tokenize("#define LIMIT (1 << 3)\n").unwrap()).unwrap();
        assert!(matches!(
            &tokens[0].kind,
            TokenKind::Macro(MacroConstant { name, value: 8, .. }) if name == "LIMIT"
        ));
    }

    #[test]
    fn test_function_like_define_is_not_a_constant() {
        let tokens = preprocess(tokenize("#define SQUARE(x) ((x) * (x))\n").unwrap()).unwrap();
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_unbalanced_endif() {
        let err = preprocess(tokenize("#endif\n").unwrap()).unwrap_err();
        assert!(err.message.contains("#endif"));
    }

    #[test]
    fn test_unterminated_if() {
        let err = preprocess(tokenize("\n#ifdef A\nx\n").unwrap()).unwrap_err();
        assert_eq!(err.line, 2);
    }
}
