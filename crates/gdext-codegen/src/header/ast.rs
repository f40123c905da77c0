//! Declaration AST recovered from the ABI header.

use std::collections::HashMap;
use std::fmt;

use crate::resolve::naming::to_snake_case;

/// A C type reference as written in a declaration: a base name plus
/// qualifiers and pointer levels.
///
/// `const char *const *` is `{ base: "char", is_const: true, pointers: [true, false] }`
/// where each pointer entry records whether that pointer level is itself const.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CType {
    pub base: String,
    pub is_const: bool,
    pub pointers: Vec<bool>,
    /// `struct`, `union` or `enum` when the type is spelled with one; `base`
    /// is then a tag.
    pub keyword: Option<&'static str>,
}

impl CType {
    pub fn named(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            is_const: false,
            pointers: Vec::new(),
            keyword: None,
        }
    }

    pub fn pointer_depth(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_pointer(&self) -> bool {
        !self.pointers.is_empty()
    }

    pub fn is_tagged(&self) -> bool {
        self.keyword.is_some()
    }

    pub fn is_void(&self) -> bool {
        self.base == "void" && self.pointers.is_empty()
    }

    /// `const char *`: a NUL-terminated string argument.
    pub fn is_c_string(&self) -> bool {
        self.base == "char" && self.is_const && self.pointers.len() == 1
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_const {
            f.write_str("const ")?;
        }
        if let Some(keyword) = self.keyword {
            write!(f, "{keyword} ")?;
        }
        f.write_str(&self.base)?;
        if !self.pointers.is_empty() {
            f.write_str(" ")?;
        }
        for is_const in &self.pointers {
            f.write_str("*")?;
            if *is_const {
                f.write_str("const ")?;
            }
        }
        Ok(())
    }
}

/// A parameter of a function-pointer typedef.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: CType,
}

/// `typedef ret (*Name)(params);`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionPointerTypedef {
    pub name: String,
    pub return_type: CType,
    pub params: Vec<Param>,
    pub is_variadic: bool,
    pub line: usize,
}

impl FunctionPointerTypedef {
    /// Parameter name for position `index`, synthesizing `arg{index}` for
    /// unnamed prototype parameters.
    pub fn param_name(&self, index: usize) -> String {
        self.params
            .get(index)
            .and_then(|p| p.name.clone())
            .unwrap_or_else(|| format!("arg{index}"))
    }

    /// Name under which the engine's `get_proc_address` resolves an interface
    /// function: the typedef name without [`INTERFACE_PREFIX`], snake-cased.
    /// `None` for typedefs outside the interface table.
    pub fn proc_address_name(&self) -> Option<String> {
        if self.name == INTERFACE_FUNCTION_PTR {
            return None;
        }
        self.name
            .strip_prefix(INTERFACE_PREFIX)
            .filter(|rest| !rest.is_empty())
            .map(to_snake_case)
    }
}

/// Whether a record is a `struct` or a `union`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Struct,
    Union,
}

impl RecordKind {
    pub fn keyword(self) -> &'static str {
        match self {
            RecordKind::Struct => "struct",
            RecordKind::Union => "union",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Plain { ty: CType, array_len: Option<usize> },
    FunctionPointer { return_type: CType, params: Vec<Param> },
    Nested(StructDecl),
}

/// A struct or union member. Anonymous nested records have no name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: Option<String>,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDecl {
    /// The typedef name, or the tag for a bare `struct Tag { ... };`.
    /// Empty for anonymous nested records.
    pub name: String,
    pub tag: Option<String>,
    pub kind: RecordKind,
    pub fields: Vec<Field>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumVariant {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDecl {
    pub name: String,
    pub tag: Option<String>,
    pub variants: Vec<EnumVariant>,
    pub line: usize,
}

/// `#define NAME <integer expression>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroConstant {
    pub name: String,
    pub value: i64,
    pub line: usize,
}

/// `typedef <type> Name;`, including opaque `typedef struct Tag Name;`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAlias {
    pub name: String,
    pub target: CType,
    pub line: usize,
}

/// One top-level declaration the generator cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderDecl {
    FunctionPointer(FunctionPointerTypedef),
    Struct(StructDecl),
    Enum(EnumDecl),
    Macro(MacroConstant),
    Alias(TypeAlias),
}

impl HeaderDecl {
    pub fn name(&self) -> &str {
        match self {
            HeaderDecl::FunctionPointer(d) => &d.name,
            HeaderDecl::Struct(d) => &d.name,
            HeaderDecl::Enum(d) => &d.name,
            HeaderDecl::Macro(d) => &d.name,
            HeaderDecl::Alias(d) => &d.name,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            HeaderDecl::FunctionPointer(d) => d.line,
            HeaderDecl::Struct(d) => d.line,
            HeaderDecl::Enum(d) => d.line,
            HeaderDecl::Macro(d) => d.line,
            HeaderDecl::Alias(d) => d.line,
        }
    }

    /// Whether the declaration introduces a type name usable in other declarations.
    pub fn declares_type(&self) -> bool {
        !matches!(self, HeaderDecl::Macro(_))
    }
}

/// Prefix of the function-pointer typedefs that make up the engine interface
/// table loaded through `get_proc_address`.
pub const INTERFACE_PREFIX: &str = "GDExtensionInterface";

/// The untyped function pointer returned by `get_proc_address`; shares the
/// interface prefix but is not itself loadable.
pub const INTERFACE_FUNCTION_PTR: &str = "GDExtensionInterfaceFunctionPtr";

/// The ordered declaration list of one header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderAst {
    decls: Vec<HeaderDecl>,
    index: HashMap<String, usize>,
}

impl HeaderAst {
    pub(crate) fn from_decls(decls: Vec<HeaderDecl>) -> Self {
        let mut index = HashMap::new();
        for (i, decl) in decls.iter().enumerate() {
            // first declaration wins, later redefinitions are still kept in order
            index.entry(decl.name().to_string()).or_insert(i);
        }
        Self { decls, index }
    }

    pub fn decls(&self) -> &[HeaderDecl] {
        &self.decls
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&HeaderDecl> {
        self.index.get(name).and_then(|&i| self.decls.get(i))
    }

    /// Whether `name` is a type introduced by a typedef, struct, union or enum.
    pub fn declares_type(&self, name: &str) -> bool {
        self.get(name).is_some_and(HeaderDecl::declares_type)
    }

    /// Whether a top-level struct, union or enum carries the tag `name`.
    pub fn declares_tag(&self, name: &str) -> bool {
        self.decls.iter().any(|d| match d {
            HeaderDecl::Struct(s) => s.tag.as_deref() == Some(name),
            HeaderDecl::Enum(e) => e.tag.as_deref() == Some(name),
            _ => false,
        })
    }

    pub fn function_pointers(&self) -> impl Iterator<Item = &FunctionPointerTypedef> {
        self.decls.iter().filter_map(|d| match d {
            HeaderDecl::FunctionPointer(f) => Some(f),
            _ => None,
        })
    }

    /// Function-pointer typedefs belonging to the interface table.
    pub fn interface_functions(&self) -> impl Iterator<Item = &FunctionPointerTypedef> {
        self.function_pointers()
            .filter(|f| f.proc_address_name().is_some())
    }

    pub fn structs(&self) -> impl Iterator<Item = &StructDecl> {
        self.decls.iter().filter_map(|d| match d {
            HeaderDecl::Struct(s) => Some(s),
            _ => None,
        })
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumDecl> {
        self.decls.iter().filter_map(|d| match d {
            HeaderDecl::Enum(e) => Some(e),
            _ => None,
        })
    }

    pub fn aliases(&self) -> impl Iterator<Item = &TypeAlias> {
        self.decls.iter().filter_map(|d| match d {
            HeaderDecl::Alias(a) => Some(a),
            _ => None,
        })
    }

    pub fn macros(&self) -> impl Iterator<Item = &MacroConstant> {
        self.decls.iter().filter_map(|d| match d {
            HeaderDecl::Macro(m) => Some(m),
            _ => None,
        })
    }
}
