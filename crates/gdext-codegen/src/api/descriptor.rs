//! Entity descriptors of the API descriptor (`extension_api.json`).
//!
//! These are deserialized directly with serde and then validated, sorted and
//! frozen by the loader. Fields the loader derives are `#[serde(skip)]`.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;

/// Which precision/pointer-width build of the engine the bindings target.
/// Selects the builtin size table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
pub enum BuildConfiguration {
    #[serde(rename = "float_32")]
    Float32,
    #[default]
    #[serde(rename = "float_64")]
    Float64,
    #[serde(rename = "double_32")]
    Double32,
    #[serde(rename = "double_64")]
    Double64,
}

impl BuildConfiguration {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildConfiguration::Float32 => "float_32",
            BuildConfiguration::Float64 => "float_64",
            BuildConfiguration::Double32 => "double_32",
            BuildConfiguration::Double64 => "double_64",
        }
    }

    /// Whether `real_t` is a 64-bit float in this configuration.
    pub fn is_double(self) -> bool {
        matches!(self, BuildConfiguration::Double32 | BuildConfiguration::Double64)
    }
}

impl fmt::Display for BuildConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildConfiguration {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float_32" => Ok(BuildConfiguration::Float32),
            "float_64" => Ok(BuildConfiguration::Float64),
            "double_32" => Ok(BuildConfiguration::Double32),
            "double_64" => Ok(BuildConfiguration::Double64),
            other => Err(ConfigError::BuildConfiguration(other.to_string())),
        }
    }
}

/// Top level of the descriptor file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiDescriptor {
    pub header: EngineHeader,
    pub builtin_class_sizes: Vec<SizeTable>,
    pub global_constants: Vec<ConstantDescriptor>,
    pub global_enums: Vec<EnumDescriptor>,
    pub utility_functions: Vec<UtilityFunctionDescriptor>,
    pub builtin_classes: Vec<BuiltinClassDescriptor>,
    pub classes: Vec<ClassDescriptor>,
    pub singletons: Vec<SingletonDescriptor>,
    pub native_structures: Vec<NativeStructureDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineHeader {
    pub version_major: u32,
    pub version_minor: u32,
    pub version_patch: u32,
    pub version_status: String,
    pub version_build: String,
    pub version_full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SizeTable {
    pub build_configuration: String,
    pub sizes: Vec<TypeSize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeSize {
    pub name: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConstantDescriptor {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnumDescriptor {
    pub name: String,
    #[serde(default)]
    pub is_bitfield: bool,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
}

/// A named, typed argument. A missing `default_value` means the argument is
/// required.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Argument {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub meta: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
}

impl Argument {
    pub fn is_required(&self) -> bool {
        self.default_value.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReturnValue {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub meta: Option<String>,
}

/// A class or builtin method. Builtin methods spell their return type as a
/// bare `return_type` string; the loader folds it into `return_value`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_vararg: bool,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub hash: Option<u64>,
    #[serde(default)]
    pub return_value: Option<ReturnValue>,
    #[serde(default)]
    pub(crate) return_type: Option<String>,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

impl MethodDescriptor {
    /// The declared return type, `None` for `void`.
    pub fn return_type(&self) -> Option<&ReturnValue> {
        self.return_value.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MemberDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuiltinConstantDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Engine-side constructor expression, e.g. `Vector2(0, 0)`.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OperatorDescriptor {
    pub name: String,
    #[serde(default)]
    pub right_type: Option<String>,
    pub return_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConstructorDescriptor {
    pub index: u32,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

/// A value-semantics type provided by the engine (`Vector2`, `String`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuiltinClassDescriptor {
    pub name: String,
    #[serde(default)]
    pub indexing_return_type: Option<String>,
    #[serde(default)]
    pub is_keyed: bool,
    #[serde(default)]
    pub members: Vec<MemberDescriptor>,
    #[serde(default)]
    pub constants: Vec<BuiltinConstantDescriptor>,
    #[serde(default)]
    pub enums: Vec<EnumDescriptor>,
    #[serde(default)]
    pub operators: Vec<OperatorDescriptor>,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    #[serde(default)]
    pub constructors: Vec<ConstructorDescriptor>,
    #[serde(default)]
    pub has_destructor: bool,
    /// Size in bytes under the selected build configuration.
    #[serde(skip)]
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignalDescriptor {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub setter: Option<String>,
    #[serde(default)]
    pub getter: Option<String>,
    #[serde(default)]
    pub index: Option<i64>,
}

/// Index of a class in the model's class arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(pub(crate) usize);

impl ClassId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// An engine object class (single inheritance rooted at `Object`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClassDescriptor {
    pub name: String,
    #[serde(default)]
    pub inherits: Option<String>,
    #[serde(default)]
    pub is_refcounted: bool,
    #[serde(default)]
    pub is_instantiable: bool,
    #[serde(default)]
    pub api_type: String,
    #[serde(default)]
    pub constants: Vec<ConstantDescriptor>,
    #[serde(default)]
    pub enums: Vec<EnumDescriptor>,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    #[serde(default)]
    pub signals: Vec<SignalDescriptor>,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
    #[serde(skip)]
    pub id: ClassId,
    #[serde(skip)]
    pub parent: Option<ClassId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UtilityFunctionDescriptor {
    pub name: String,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub is_vararg: bool,
    #[serde(default)]
    pub hash: Option<u64>,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SingletonDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NativeStructureDescriptor {
    pub name: String,
    /// Raw C-like field list: `float left;float right`.
    pub format: String,
    #[serde(skip)]
    pub fields: Vec<NativeStructureField>,
}

/// One field of a native structure's parsed `format`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeStructureField {
    pub name: String,
    pub type_name: String,
    pub pointer_depth: usize,
    pub array_len: Option<usize>,
    pub default_value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_configuration_parse() {
        assert_eq!("double_64".parse::<BuildConfiguration>().unwrap(), BuildConfiguration::Double64);
        assert!("float_128".parse::<BuildConfiguration>().is_err());
        assert_eq!(BuildConfiguration::default().to_string(), "float_64");
    }

    #[test]
    fn test_method_deserialize_with_defaults() {
        let method: MethodDescriptor = serde_json::from_str(
            r#"{"name": "add_child", "arguments": [{"name": "node", "type": "Node"},
                {"name": "force_readable_name", "type": "bool", "default_value": "false"}]}"#,
        )
        .unwrap();
        assert!(!method.is_virtual);
        assert!(method.return_type().is_none());
        assert!(method.arguments[0].is_required());
        assert!(!method.arguments[1].is_required());
    }
}
