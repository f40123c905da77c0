//! Header Parser: recovers declarations from the extension ABI header.
//!
//! Only the C subset the header uses is understood: function-pointer
//! typedefs, `struct`/`union`/`enum` definitions, plain and opaque aliases,
//! and integer `#define`s. Other top-level constructs are skipped.
//!
//! ```
//! use gdext_codegen::header::{parse_header, HeaderDecl};
//!
//! let ast = parse_header(
//!     "typedef void (*GDExtensionInterfaceFunctionPtr)();\n\
//!      typedef GDExtensionInterfaceFunctionPtr (*GDExtensionInterfaceGetProcAddress)(const char *p_function_name);",
//! )
//! .unwrap();
//!
//! assert_eq!(ast.len(), 2);
//! assert!(matches!(
//!     ast.get("GDExtensionInterfaceGetProcAddress"),
//!     Some(HeaderDecl::FunctionPointer(_))
//! ));
//! ```

mod ast;
mod expr;
mod lexer;
mod parser;
mod preprocess;

pub use ast::{
    CType, EnumDecl, EnumVariant, Field, FieldKind, FunctionPointerTypedef, HeaderAst, HeaderDecl,
    INTERFACE_FUNCTION_PTR, INTERFACE_PREFIX, MacroConstant, Param, RecordKind, StructDecl, TypeAlias,
};

use tracing::debug;

use crate::error::ParseError;

/// Parse header source text into an ordered declaration list.
///
/// Identical input always yields an identical AST.
pub fn parse_header(source: &str) -> Result<HeaderAst, ParseError> {
    let tokens = lexer::tokenize(source)?;
    let tokens = preprocess::preprocess(tokens)?;
    let decls = parser::parse(tokens)?;
    let ast = HeaderAst::from_decls(decls);
    debug!(
        declarations = ast.len(),
        interface_functions = ast.interface_functions().count(),
        "parsed header"
    );
    Ok(ast)
}
