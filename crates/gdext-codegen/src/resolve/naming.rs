//! Identifier derivation for generated Go code.
//!
//! Every generated name goes through one of the casing functions here, so a
//! given descriptor name always maps to the same target identifier.

/// Go keywords and predeclared identifiers that cannot be used as parameter
/// names without shadowing or failing to compile.
const GO_RESERVED: &[&str] = &[
    // keywords
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough", "for",
    "func", "go", "goto", "if", "import", "interface", "map", "package", "range", "return",
    "select", "struct", "switch", "type", "var",
    // predeclared
    "any", "append", "bool", "byte", "cap", "clear", "close", "complex", "copy", "delete", "error",
    "false", "float32", "float64", "imag", "int", "int8", "int16", "int32", "int64", "iota", "len",
    "make", "max", "min", "new", "nil", "panic", "print", "println", "real", "recover", "rune",
    "string", "true", "uint", "uint8", "uint16", "uint32", "uint64", "uintptr",
];

/// Prefix marking generated virtual-method hooks (`_ready` → `V_Ready`).
pub const VIRTUAL_PREFIX: &str = "V_";

/// `GetGodotVersion` → `get_godot_version`, `PackedFloat32Array` →
/// `packed_float32_array`, `GDExtension` → `gd_extension`.
///
/// Acronyms split before their last capital when a lowercase letter follows;
/// a digit run ends a word only when a capital follows it.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() && c != '_' {
            push_separator(&mut out);
            continue;
        }
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).and_then(|p| chars.get(p)).copied();
            let next = chars.get(i + 1).copied();
            let starts_word = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if starts_word {
                push_separator(&mut out);
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn push_separator(out: &mut String) {
    if !out.is_empty() && !out.ends_with('_') {
        out.push('_');
    }
}

/// `get_godot_version` → `GetGodotVersion`.
///
/// Leading underscores are dropped; characters after the first of each word
/// keep their case, so `get_AABB` becomes `GetAABB`.
pub fn to_pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for word in name.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    out
}

/// `p_function_name` → `pFunctionName`.
pub fn to_camel_case(name: &str) -> String {
    let pascal = to_pascal_case(name);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => pascal,
    }
}

/// `ProcessMode` → `PROCESS_MODE`.
pub fn to_screaming_snake_case(name: &str) -> String {
    to_snake_case(name).to_ascii_uppercase()
}

pub fn is_reserved(name: &str) -> bool {
    GO_RESERVED.contains(&name)
}

/// Suffix `_` onto Go keywords and predeclared identifiers.
pub fn escape_identifier(name: &str) -> String {
    if is_reserved(name) {
        format!("{name}_")
    } else {
        name.to_string()
    }
}

/// Exported Go method name. Virtual methods (`_ready`) get [`VIRTUAL_PREFIX`].
pub fn method_name(name: &str, is_virtual: bool) -> String {
    let pascal = to_pascal_case(name);
    if is_virtual {
        format!("{VIRTUAL_PREFIX}{pascal}")
    } else {
        pascal
    }
}

/// Go parameter name for a descriptor argument.
pub fn argument_name(name: &str) -> String {
    let camel = to_camel_case(name);
    if camel.is_empty() || camel.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("arg{camel}");
    }
    escape_identifier(&camel)
}

/// Go type name for an enum, namespaced by its owner.
///
/// Descriptor enum names may already carry the owner (`Variant.Type`).
pub fn enum_type_name(owner: Option<&str>, name: &str) -> String {
    let local: String = name.split('.').map(to_pascal_case).collect();
    match owner {
        Some(owner) => format!("{}{local}", to_pascal_case(owner)),
        None => local,
    }
}

/// Go constant name for one enum member: `<EnumType>_<MEMBER>`.
pub fn enum_member_name(enum_type: &str, member: &str) -> String {
    format!("{enum_type}_{member}")
}

/// Go constant name for a class or global constant: `Node_NOTIFICATION_READY`.
pub fn constant_name(owner: Option<&str>, name: &str) -> String {
    match owner {
        Some(owner) => format!("{}_{name}", to_pascal_case(owner)),
        None => name.to_string(),
    }
}

/// Whether `name` is a valid Go identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
