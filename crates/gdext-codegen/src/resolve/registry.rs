//! Static type table for primitive and runtime-provided types.
//!
//! The registry is the data-driven part of type resolution: primitive
//! descriptor types, their `meta` narrowings and `Variant` are registered by
//! default, and callers may add or override entries before resolution.
//! Descriptor-defined types (builtins, classes, enums) are layered on top by
//! the resolver.

use std::collections::HashMap;

use crate::api::BuildConfiguration;
use crate::resolve::types::{GoPackage, PassStrategy, TypeKind, TypeMapping};

/// C spellings used by native structure formats and pointer arguments, with
/// their Go type and runtime encoder.
const C_PRIMITIVES: &[(&str, &str, &str)] = &[
    ("bool", "bool", "BoolEncoder"),
    ("char", "int8", "Int8Encoder"),
    ("int8_t", "int8", "Int8Encoder"),
    ("int16_t", "int16", "Int16Encoder"),
    ("int32_t", "int32", "Int32Encoder"),
    ("int64_t", "int64", "Int64Encoder"),
    ("uint8_t", "uint8", "Uint8Encoder"),
    ("uint16_t", "uint16", "Uint16Encoder"),
    ("uint32_t", "uint32", "Uint32Encoder"),
    ("uint64_t", "uint64", "Uint64Encoder"),
    ("int", "int32", "Int32Encoder"),
    ("unsigned int", "uint32", "Uint32Encoder"),
    ("size_t", "uint64", "Uint64Encoder"),
    ("float", "float32", "Float32Encoder"),
    ("double", "float64", "Float64Encoder"),
    ("char16_t", "uint16", "Uint16Encoder"),
    ("char32_t", "rune", "RuneEncoder"),
    ("wchar_t", "rune", "RuneEncoder"),
    ("ObjectID", "uint64", "Uint64Encoder"),
];

/// Argument `meta` values narrowing `int` and `float`.
const META_NARROWINGS: &[(&str, &str, &str, &str)] = &[
    ("int", "int8", "int8", "Int8Encoder"),
    ("int", "int16", "int16", "Int16Encoder"),
    ("int", "int32", "int32", "Int32Encoder"),
    ("int", "int64", "int64", "Int64Encoder"),
    ("int", "uint8", "uint8", "Uint8Encoder"),
    ("int", "uint16", "uint16", "Uint16Encoder"),
    ("int", "uint32", "uint32", "Uint32Encoder"),
    ("int", "uint64", "uint64", "Uint64Encoder"),
    ("int", "char16", "uint16", "Uint16Encoder"),
    ("int", "char32", "rune", "RuneEncoder"),
    ("float", "float", "float32", "Float32Encoder"),
    ("float", "double", "float64", "Float64Encoder"),
];

/// The C primitive named `name`, as a Go value type.
///
/// `real_t` follows the build configuration.
pub fn c_primitive(name: &str, build: BuildConfiguration) -> Option<TypeMapping> {
    if name == "real_t" {
        let (target, encoder) = if build.is_double() {
            ("float64", "Float64Encoder")
        } else {
            ("float32", "Float32Encoder")
        };
        return Some(TypeMapping::primitive(name, target, encoder));
    }
    C_PRIMITIVES
        .iter()
        .find(|(c, _, _)| *c == name)
        .map(|&(c, target, encoder)| TypeMapping::primitive(c, target, encoder))
}

/// Registry key for a type with an optional `meta` narrowing.
pub fn type_key(name: &str, meta: Option<&str>) -> String {
    match meta {
        Some(meta) => format!("{name}:{meta}"),
        None => name.to_string(),
    }
}

/// A table of native type name -> [`TypeMapping`].
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    mappings: HashMap<String, TypeMapping>,
}

impl TypeRegistry {
    /// Create an empty registry with no mappings.
    pub fn new() -> Self {
        Self {
            mappings: HashMap::new(),
        }
    }

    /// Create a registry pre-populated with the primitive descriptor types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtins();
        registry
    }

    /// Register the primitive descriptor types, `meta` narrowings and `Variant`.
    pub fn register_builtins(&mut self) {
        self.register("int", TypeMapping::primitive("int", "int64", "Int64Encoder"));
        self.register("float", TypeMapping::primitive("float", "float64", "Float64Encoder"));
        self.register("bool", TypeMapping::primitive("bool", "bool", "BoolEncoder"));
        self.register("Nil", TypeMapping::void("Nil"));
        self.register("void", TypeMapping::void("void"));

        for &(base, meta, target, encoder) in META_NARROWINGS {
            self.register(
                type_key(base, Some(meta)),
                TypeMapping::primitive(base, target, encoder),
            );
        }

        // Variant owns engine-side storage, so it always travels by pointer
        self.register(
            "Variant",
            TypeMapping::new(
                "Variant",
                "Variant",
                GoPackage::Builtin,
                PassStrategy::ByPointer,
                TypeKind::Variant,
                "VariantEncoder",
            ),
        );
    }

    /// Register a mapping for a native type name, replacing any existing one.
    pub fn register(&mut self, name: impl Into<String>, mapping: TypeMapping) {
        self.mappings.insert(name.into(), mapping);
    }

    /// Look up the mapping for a native type name.
    pub fn get(&self, name: &str) -> Option<&TypeMapping> {
        self.mappings.get(name)
    }

    /// Look up `name` narrowed by `meta`, falling back to the plain name.
    pub fn get_with_meta(&self, name: &str, meta: Option<&str>) -> Option<&TypeMapping> {
        meta.and_then(|meta| self.mappings.get(&type_key(name, Some(meta))))
            .or_else(|| self.mappings.get(name))
    }

    /// Check if a native type name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.mappings.contains_key(name)
    }

    /// Remove a type mapping.
    pub fn unregister(&mut self, name: &str) -> Option<TypeMapping> {
        self.mappings.remove(name)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_with_builtins() {
        let registry = TypeRegistry::with_builtins();
        assert!(registry.contains("int"));
        assert!(registry.contains("float"));
        assert!(registry.contains("bool"));
        assert!(registry.contains("Variant"));
        assert!(registry.get("Nil").unwrap().is_void());
        assert!(!registry.contains("Vector2"));
    }

    #[test]
    fn test_meta_narrowing() {
        let registry = TypeRegistry::with_builtins();
        let narrowed = registry.get_with_meta("int", Some("int32")).unwrap();
        assert_eq!(narrowed.target, "int32");
        let unknown_meta = registry.get_with_meta("int", Some("bogus")).unwrap();
        assert_eq!(unknown_meta.target, "int64");
        assert_eq!(
            registry.get_with_meta("float", Some("float")).unwrap().target,
            "float32"
        );
    }

    #[test]
    fn test_registry_override_builtin() {
        let mut registry = TypeRegistry::with_builtins();
        registry.register("int", TypeMapping::primitive("int", "int", "IntEncoder"));
        assert_eq!(registry.get("int").unwrap().target, "int");
    }

    #[test]
    fn test_registry_unregister() {
        let mut registry = TypeRegistry::with_builtins();
        assert!(registry.unregister("Variant").is_some());
        assert!(!registry.contains("Variant"));
    }

    #[test]
    fn test_c_primitives() {
        assert_eq!(c_primitive("float", BuildConfiguration::Float64).unwrap().target, "float32");
        assert_eq!(c_primitive("real_t", BuildConfiguration::Double64).unwrap().target, "float64");
        assert_eq!(c_primitive("real_t", BuildConfiguration::Float32).unwrap().target, "float32");
        assert!(c_primitive("Vector2", BuildConfiguration::Float64).is_none());
    }
}
