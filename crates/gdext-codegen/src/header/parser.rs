//! Declaration parser over the preprocessed token stream.

use std::collections::HashMap;

use tracing::warn;

use crate::error::ParseError;
use crate::header::ast::{
    CType, EnumDecl, EnumVariant, Field, FieldKind, FunctionPointerTypedef, HeaderDecl, Param,
    RecordKind, StructDecl, TypeAlias,
};
use crate::header::expr::evaluate;
use crate::header::lexer::{Token, TokenKind};

/// Words that combine into one primitive type name (`unsigned long long`).
const PRIMITIVE_WORDS: &[&str] = &[
    "unsigned", "signed", "short", "long", "int", "char", "float", "double", "void",
];

/// Qualifiers and storage classes that carry no meaning for bindings.
const IGNORED_SPECIFIERS: &[&str] = &["volatile", "restrict", "__restrict", "extern", "static", "inline"];

pub(crate) fn parse(tokens: Vec<Token>) -> Result<Vec<HeaderDecl>, ParseError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        constants: HashMap::new(),
        decls: Vec::new(),
    };
    parser.run()?;
    Ok(parser.decls)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Enumerators and macro constants seen so far, for constant expressions.
    constants: HashMap<String, i64>,
    decls: Vec<HeaderDecl>,
}

impl Parser {
    fn run(&mut self) -> Result<(), ParseError> {
        while let Some(token) = self.peek() {
            let line = token.line;
            match &token.kind {
                TokenKind::Macro(constant) => {
                    let constant = constant.clone();
                    self.pos += 1;
                    self.constants.insert(constant.name.clone(), constant.value);
                    self.decls.push(HeaderDecl::Macro(constant));
                }
                TokenKind::Punct(';') => self.pos += 1,
                TokenKind::Ident(word) if word == "typedef" => {
                    self.pos += 1;
                    let name = self.typedef_name_ahead();
                    let decl = self.typedef(line).map_err(|e| match &name {
                        Some(name) => e.in_declaration(name),
                        None => e,
                    })?;
                    self.decls.push(decl);
                }
                _ if self.record_body_ahead() => self.tagged_definition(line)?,
                _ => self.skip_construct(),
            }
        }
        Ok(())
    }

    // ── token helpers ────────────────────────────────────────────────────

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn current_line(&self) -> usize {
        self.peek().or_else(|| self.tokens.last()).map_or(1, |t| t.line)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::new(
                token.line,
                format!("expected {expected}, found {}", token.describe()),
            ),
            None => ParseError::new(
                self.current_line(),
                format!("expected {expected}, found end of input"),
            ),
        }
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.peek().is_some_and(|t| t.is_punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<(), ParseError> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{c}`")))
        }
    }

    fn eat_any_ident(&mut self) -> Option<String> {
        let ident = self.peek().and_then(Token::ident).map(str::to_string)?;
        self.pos += 1;
        Some(ident)
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        self.eat_any_ident().ok_or_else(|| self.unexpected(what))
    }

    /// Tokens up to (not including) one of `terminators` at nesting depth 0.
    fn expression_tokens(&mut self, terminators: &[char]) -> Vec<Token> {
        let mut depth = 0usize;
        let mut tokens = Vec::new();
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Punct(c) if depth == 0 && terminators.contains(&c) => break,
                TokenKind::Punct('(' | '[') => depth += 1,
                TokenKind::Punct(')' | ']') => depth = depth.saturating_sub(1),
                _ => {}
            }
            tokens.push(token.clone());
            self.pos += 1;
        }
        tokens
    }

    fn evaluate(&self, tokens: &[Token]) -> Option<i64> {
        evaluate(tokens, &|name| self.constants.get(name).copied())
    }

    // ── lookahead ────────────────────────────────────────────────────────

    /// Whether a `struct`/`union`/`enum` definition with a body starts here.
    fn record_body_ahead(&self) -> bool {
        let Some(keyword) = self.peek().and_then(Token::ident) else {
            return false;
        };
        if !matches!(keyword, "struct" | "union" | "enum") {
            return false;
        }
        match self.peek_at(1) {
            Some(t) if t.is_punct('{') => true,
            Some(t) if t.ident().is_some() => self.peek_at(2).is_some_and(|t| t.is_punct('{')),
            _ => false,
        }
    }

    /// The name a typedef starting here will declare, found by scanning to its
    /// terminating `;`. Used to label errors raised before the name is reached.
    fn typedef_name_ahead(&self) -> Option<String> {
        let mut depth = 0usize;
        let mut last_ident = None;
        for (offset, token) in self.tokens[self.pos..].iter().enumerate() {
            match &token.kind {
                TokenKind::Punct('(') if depth == 0 => {
                    let at = self.pos + offset;
                    let star = self.tokens.get(at + 1).is_some_and(|t| t.is_punct('*'));
                    let close = self.tokens.get(at + 3).is_some_and(|t| t.is_punct(')'));
                    if let Some(name) = self.tokens.get(at + 2).and_then(Token::ident) {
                        if star && close {
                            return Some(name.to_string());
                        }
                    }
                    depth += 1;
                }
                TokenKind::Punct('{' | '(' | '[') => depth += 1,
                TokenKind::Punct('}' | ')' | ']') => depth = depth.saturating_sub(1),
                TokenKind::Punct(';') if depth == 0 => break,
                TokenKind::Ident(name) if depth == 0 => last_ident = Some(name.clone()),
                _ => {}
            }
        }
        last_ident
    }

    // ── declarations ─────────────────────────────────────────────────────

    fn typedef(&mut self, line: usize) -> Result<HeaderDecl, ParseError> {
        if self.record_body_ahead() {
            let keyword = self.expect_ident("`struct`, `union` or `enum`")?;
            let tag = self.tag();
            let decl = if keyword == "enum" {
                let variants = self.enum_body()?;
                let name = self.expect_ident("typedef name")?;
                HeaderDecl::Enum(EnumDecl {
                    name,
                    tag,
                    variants,
                    line,
                })
            } else {
                let fields = self.record_body()?;
                let name = self.expect_ident("typedef name")?;
                HeaderDecl::Struct(StructDecl {
                    name,
                    tag,
                    kind: record_kind(&keyword),
                    fields,
                    line,
                })
            };
            self.expect_punct(';')?;
            return Ok(decl);
        }

        let ty = self.parse_type()?;
        if self.peek().is_some_and(|t| t.is_punct('(')) {
            let (name, params, is_variadic) = self.function_pointer_declarator()?;
            self.expect_punct(';')?;
            return Ok(HeaderDecl::FunctionPointer(FunctionPointerTypedef {
                name,
                return_type: ty,
                params,
                is_variadic,
                line,
            }));
        }

        let name = self.expect_ident("typedef name")?;
        if self.peek().is_some_and(|t| t.is_punct('[')) {
            return Err(self.unexpected("`;`"));
        }
        self.expect_punct(';')?;
        Ok(HeaderDecl::Alias(TypeAlias {
            name,
            target: ty,
            line,
        }))
    }

    /// `struct Tag { ... };` and friends outside a typedef.
    fn tagged_definition(&mut self, line: usize) -> Result<(), ParseError> {
        let keyword = self.expect_ident("`struct`, `union` or `enum`")?;
        let tag = self.tag();
        let label = |e: ParseError| match &tag {
            Some(tag) => e.in_declaration(tag),
            None => e,
        };

        if keyword == "enum" {
            let variants = self.enum_body().map_err(label)?;
            if let Some(tag) = &tag {
                self.decls.push(HeaderDecl::Enum(EnumDecl {
                    name: tag.clone(),
                    tag: Some(tag.clone()),
                    variants,
                    line,
                }));
            }
        } else {
            let fields = self.record_body().map_err(label)?;
            if let Some(tag) = &tag {
                self.decls.push(HeaderDecl::Struct(StructDecl {
                    name: tag.clone(),
                    tag: Some(tag.clone()),
                    kind: record_kind(&keyword),
                    fields,
                    line,
                }));
            }
        }

        // `struct Tag { ... } instance;` declares a variable too
        if !self.eat_punct(';') {
            self.skip_construct();
        }
        Ok(())
    }

    fn tag(&mut self) -> Option<String> {
        if self.peek().is_some_and(|t| t.is_punct('{')) {
            None
        } else {
            self.eat_any_ident()
        }
    }

    fn skip_construct(&mut self) {
        let Some(start) = self.peek() else {
            return;
        };
        let line = start.line;
        let first = start.describe();
        let mut depth = 0usize;
        while let Some(token) = self.bump() {
            match token.kind {
                TokenKind::Punct('{') => depth += 1,
                TokenKind::Punct('}') => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.eat_punct(';');
                        break;
                    }
                }
                TokenKind::Punct(';') if depth == 0 => break,
                _ => {}
            }
        }
        warn!(line, start = %first, "skipping unsupported top-level construct");
    }

    // ── types ────────────────────────────────────────────────────────────

    fn parse_type(&mut self) -> Result<CType, ParseError> {
        let mut is_const = false;
        let mut keyword = None;
        let mut words: Vec<String> = Vec::new();

        while let Some(word) = self.peek().and_then(Token::ident).map(str::to_string) {
            match word.as_str() {
                "const" => is_const = true,
                w if IGNORED_SPECIFIERS.contains(&w) => {}
                "struct" | "union" | "enum" if words.is_empty() => {
                    keyword = Some(tag_keyword(&word));
                    self.pos += 1;
                    words.push(self.expect_ident("type tag")?);
                    continue;
                }
                w if PRIMITIVE_WORDS.contains(&w)
                    && words.iter().all(|p| PRIMITIVE_WORDS.contains(&p.as_str())) =>
                {
                    words.push(word.clone());
                }
                _ if words.is_empty() => words.push(word.clone()),
                _ => break,
            }
            self.pos += 1;
        }

        if words.is_empty() {
            return Err(self.unexpected("type name"));
        }
        Ok(CType {
            base: words.join(" "),
            is_const,
            pointers: self.pointer_suffix(),
            keyword,
        })
    }

    /// `*`, `* const`, `**` ... following a base type.
    fn pointer_suffix(&mut self) -> Vec<bool> {
        let mut pointers = Vec::new();
        while self.eat_punct('*') {
            let mut is_const = false;
            while let Some(word) = self.peek().and_then(Token::ident) {
                match word {
                    "const" => is_const = true,
                    w if IGNORED_SPECIFIERS.contains(&w) => {}
                    _ => break,
                }
                self.pos += 1;
            }
            pointers.push(is_const);
        }
        pointers
    }

    /// `(*Name)(params)`
    fn function_pointer_declarator(&mut self) -> Result<(String, Vec<Param>, bool), ParseError> {
        self.expect_punct('(')?;
        self.expect_punct('*')?;
        let name = self.expect_ident("function pointer name")?;
        self.expect_punct(')')?;
        let (params, is_variadic) = self.params()?;
        Ok((name, params, is_variadic))
    }

    fn params(&mut self) -> Result<(Vec<Param>, bool), ParseError> {
        self.expect_punct('(')?;
        let mut params = Vec::new();

        // `()` and `(void)` both mean no parameters
        if self.eat_punct(')') {
            return Ok((params, false));
        }
        if self.peek().is_some_and(|t| t.is_ident("void"))
            && self.peek_at(1).is_some_and(|t| t.is_punct(')'))
        {
            self.pos += 2;
            return Ok((params, false));
        }

        loop {
            if self.peek().is_some_and(|t| t.is_op("...")) {
                self.pos += 1;
                self.expect_punct(')')?;
                return Ok((params, true));
            }
            let ty = self.parse_type()?;
            let name = self.eat_any_ident();
            params.push(Param { name, ty });
            if !self.eat_punct(',') {
                self.expect_punct(')')?;
                return Ok((params, false));
            }
        }
    }

    // ── bodies ───────────────────────────────────────────────────────────

    fn record_body(&mut self) -> Result<Vec<Field>, ParseError> {
        self.expect_punct('{')?;
        let mut fields = Vec::new();
        while !self.eat_punct('}') {
            if self.peek().is_none() {
                return Err(self.unexpected("`}`"));
            }
            self.field(&mut fields)?;
        }
        Ok(fields)
    }

    fn field(&mut self, fields: &mut Vec<Field>) -> Result<(), ParseError> {
        let line = self.current_line();

        if self.record_body_ahead() {
            let keyword = self.expect_ident("`struct`, `union` or `enum`")?;
            let tag = self.tag();
            if keyword == "enum" {
                self.enum_body()?;
                // inline enum bodies are kept as their underlying type
                let ty = CType::named("int");
                return self.declarators(ty, fields);
            }
            let nested = self.record_body()?;
            let name = self.eat_any_ident();
            self.expect_punct(';')?;
            fields.push(Field {
                name: name.clone(),
                kind: FieldKind::Nested(StructDecl {
                    name: name.unwrap_or_default(),
                    tag,
                    kind: record_kind(&keyword),
                    fields: nested,
                    line,
                }),
            });
            return Ok(());
        }

        let ty = self.parse_type()?;
        self.declarators(ty, fields)
    }

    /// `a, *b, c[N], (*f)(params);` after a field's type.
    fn declarators(&mut self, first: CType, fields: &mut Vec<Field>) -> Result<(), ParseError> {
        let base = CType {
            pointers: Vec::new(),
            ..first.clone()
        };
        let mut ty = first;
        loop {
            if self.peek().is_some_and(|t| t.is_punct('(')) {
                let (name, params, _) = self.function_pointer_declarator()?;
                fields.push(Field {
                    name: Some(name),
                    kind: FieldKind::FunctionPointer {
                        return_type: ty,
                        params,
                    },
                });
            } else {
                let name = self.expect_ident("field name")?;
                let array_len = if self.eat_punct('[') {
                    Some(self.array_len()?)
                } else {
                    None
                };
                if self.eat_punct(':') {
                    // bitfield width
                    self.expression_tokens(&[',', ';']);
                }
                fields.push(Field {
                    name: Some(name),
                    kind: FieldKind::Plain { ty, array_len },
                });
            }

            if self.eat_punct(',') {
                ty = CType {
                    pointers: self.pointer_suffix(),
                    ..base.clone()
                };
                continue;
            }
            return self.expect_punct(';');
        }
    }

    fn array_len(&mut self) -> Result<usize, ParseError> {
        let line = self.current_line();
        let expr = self.expression_tokens(&[']']);
        self.expect_punct(']')?;
        let value = self
            .evaluate(&expr)
            .ok_or_else(|| ParseError::new(line, "array length is not an integer constant"))?;
        usize::try_from(value)
            .map_err(|_| ParseError::new(line, format!("negative array length {value}")))
    }

    fn enum_body(&mut self) -> Result<Vec<EnumVariant>, ParseError> {
        self.expect_punct('{')?;
        let mut variants: Vec<EnumVariant> = Vec::new();
        let mut next = 0i64;

        while !self.eat_punct('}') {
            let line = self.current_line();
            let name = self.expect_ident("enumerator")?;
            if variants.iter().any(|v| v.name == name) {
                return Err(ParseError::new(line, format!("duplicate enumerator `{name}`")));
            }

            let value = if self.eat_punct('=') {
                let expr = self.expression_tokens(&[',', '}']);
                self.evaluate(&expr).ok_or_else(|| {
                    ParseError::new(line, format!("cannot evaluate value of enumerator `{name}`"))
                })?
            } else {
                next
            };
            next = value.wrapping_add(1);
            self.constants.insert(name.clone(), value);
            variants.push(EnumVariant { name, value });

            if !self.eat_punct(',') {
                self.expect_punct('}')?;
                break;
            }
        }
        Ok(variants)
    }
}

fn tag_keyword(word: &str) -> &'static str {
    match word {
        "union" => "union",
        "enum" => "enum",
        _ => "struct",
    }
}

fn record_kind(keyword: &str) -> RecordKind {
    if keyword == "union" {
        RecordKind::Union
    } else {
        RecordKind::Struct
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::lexer::tokenize;
    use crate::header::preprocess::preprocess;

    fn parse_src(source: &str) -> Result<Vec<HeaderDecl>, ParseError> {
        parse(preprocess(tokenize(source)?)?)
    }

    // ── typedefs ──

    #[test]
    fn test_function_pointer_typedef() {
        let decls = parse_src(
            "typedef GDExtensionInterfaceFunctionPtr (*GDExtensionInterfaceGetProcAddress)(const char *p_function_name);",
        )
        .unwrap();
        let HeaderDecl::FunctionPointer(f) = &decls[0] else {
            panic!("expected function pointer, got {:?}", decls[0]);
        };
        assert_eq!(f.name, "GDExtensionInterfaceGetProcAddress");
        assert_eq!(f.return_type, CType::named("GDExtensionInterfaceFunctionPtr"));
        assert_eq!(f.params.len(), 1);
        assert!(f.params[0].ty.is_c_string());
        assert_eq!(f.params[0].name.as_deref(), Some("p_function_name"));
    }

    #[test]
    fn test_empty_and_void_parameter_lists() {
        let decls = parse_src("typedef void (*A)();\ntypedef void (*B)(void);").unwrap();
        for decl in decls {
            let HeaderDecl::FunctionPointer(f) = decl else {
                panic!("expected function pointer");
            };
            assert!(f.params.is_empty());
        }
    }

    #[test]
    fn test_variadic_and_unnamed_params() {
        let decls = parse_src("typedef int (*Printf)(const char *, ...);").unwrap();
        let HeaderDecl::FunctionPointer(f) = &decls[0] else {
            panic!("expected function pointer");
        };
        assert!(f.is_variadic);
        assert_eq!(f.param_name(0), "arg0");
    }

    #[test]
    fn test_aliases() {
        let decls = parse_src(
            "typedef void *GDExtensionVariantPtr;\ntypedef struct __Opaque *GDExtensionObjectPtr;\ntypedef unsigned long long Big;",
        )
        .unwrap();
        let names: Vec<_> = decls.iter().map(HeaderDecl::name).collect();
        assert_eq!(names, vec!["GDExtensionVariantPtr", "GDExtensionObjectPtr", "Big"]);
        let HeaderDecl::Alias(object) = &decls[1] else {
            panic!("expected alias");
        };
        assert_eq!(object.target.keyword, Some("struct"));
        assert_eq!(object.target.to_string(), "struct __Opaque *");
        let HeaderDecl::Alias(big) = &decls[2] else {
            panic!("expected alias");
        };
        assert_eq!(big.target.base, "unsigned long long");
    }

    // ── records ──

    #[test]
    fn test_struct_with_fields_and_function_pointer_member() {
        let src = "typedef struct {\n  uint32_t major, minor;\n  const char *string;\n  void (*callback)(void *p_userdata, int32_t p_count);\n  float values[4];\n} Info;";
        let decls = parse_src(src).unwrap();
        let HeaderDecl::Struct(s) = &decls[0] else {
            panic!("expected struct");
        };
        assert_eq!(s.name, "Info");
        assert_eq!(s.fields.len(), 5);
        assert_eq!(s.fields[1].name.as_deref(), Some("minor"));
        assert!(matches!(
            &s.fields[3].kind,
            FieldKind::FunctionPointer { params, .. } if params.len() == 2
        ));
        assert!(matches!(
            &s.fields[4].kind,
            FieldKind::Plain { array_len: Some(4), .. }
        ));
    }

    #[test]
    fn test_pointer_declarators_do_not_leak() {
        let decls = parse_src("struct P { int *a, b; };").unwrap();
        let HeaderDecl::Struct(s) = &decls[0] else {
            panic!("expected struct");
        };
        let FieldKind::Plain { ty, .. } = &s.fields[1].kind else {
            panic!("expected plain field");
        };
        assert!(!ty.is_pointer());
    }

    #[test]
    fn test_anonymous_nested_union() {
        let src = "typedef struct { int kind; union { float f; int32_t i; }; } Value;";
        let decls = parse_src(src).unwrap();
        let HeaderDecl::Struct(s) = &decls[0] else {
            panic!("expected struct");
        };
        let FieldKind::Nested(inner) = &s.fields[1].kind else {
            panic!("expected nested record");
        };
        assert_eq!(inner.kind, RecordKind::Union);
        assert!(s.fields[1].name.is_none());
        assert_eq!(inner.fields.len(), 2);
    }

    // ── enums and macros ──

    #[test]
    fn test_enum_values() {
        let src = "#define BASE 10\ntypedef enum { A, B = BASE, C, D = (1 << 2) | A, E = -1 } Kind;";
        let decls = parse_src(src).unwrap();
        let HeaderDecl::Enum(e) = &decls[1] else {
            panic!("expected enum");
        };
        let values: Vec<_> = e.variants.iter().map(|v| v.value).collect();
        assert_eq!(values, vec![0, 10, 11, 4, -1]);
    }

    #[test]
    fn test_duplicate_enumerator_is_an_error() {
        let err = parse_src("typedef enum {\n A,\n A\n} Dup;").unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.declaration.as_deref(), Some("Dup"));
    }

    #[test]
    fn test_unevaluable_enumerator() {
        let err = parse_src("typedef enum { A = UNKNOWN } Broken;").unwrap_err();
        assert!(err.message.contains("`A`"));
        assert_eq!(err.declaration.as_deref(), Some("Broken"));
    }

    // ── recovery ──

    #[test]
    fn test_irrelevant_constructs_skipped() {
        let src = "int global_counter;\nstatic inline int f(void) { return 1; }\ntypedef int Kept;";
        let decls = parse_src(src).unwrap();
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name(), "Kept");
    }

    #[test]
    fn test_malformed_function_pointer_names_declaration() {
        let err = parse_src("\ntypedef void (*Broken)(int a b);").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.declaration.as_deref(), Some("Broken"));
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse_src("typedef struct { int a } S;").unwrap_err();
        assert!(err.message.contains("`;`"));
        assert_eq!(err.declaration.as_deref(), Some("S"));
    }
}
