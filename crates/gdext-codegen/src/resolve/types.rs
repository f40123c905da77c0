//! Target representations of native types.

/// How a value crosses the ABI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassStrategy {
    /// Copied in and out; plain-old-data.
    ByValue,
    /// Passed by address; the value owns engine-side storage and needs
    /// scoped construct/destroy.
    ByPointer,
    /// An engine object handle. Reference-counted handles increment on wrap
    /// and decrement on release.
    ByHandle { refcounted: bool },
}

/// What a mapped type is, independent of its Go spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Primitive,
    Builtin,
    Variant,
    Class,
    Enum { bitfield: bool },
    /// `typedarray::X`, carried as an untyped array of `element`.
    TypedArray { element: String },
    Pointer,
    NativeStructure,
}

/// Go package a generated type is declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GoPackage {
    /// Predeclared Go types and `unsafe`; never qualified.
    Universe,
    Builtin,
    Constant,
    NativeStructure,
    ClassImpl,
    ClassInit,
    UtilityFunctions,
    Ffi,
}

impl GoPackage {
    pub fn name(self) -> &'static str {
        match self {
            GoPackage::Universe => "",
            GoPackage::Builtin => "builtin",
            GoPackage::Constant => "constant",
            GoPackage::NativeStructure => "nativestructure",
            GoPackage::ClassImpl => "gdclassimpl",
            GoPackage::ClassInit => "gdclassinit",
            GoPackage::UtilityFunctions => "gdutilfunc",
            GoPackage::Ffi => "ffi",
        }
    }

    /// `ident` as referenced from code in package `from`.
    pub fn qualify(self, ident: &str, from: GoPackage) -> String {
        if self == GoPackage::Universe || self == from {
            ident.to_string()
        } else {
            format!("{}.{ident}", self.name())
        }
    }
}

/// Placeholder for the mapped Go type inside an encoder template.
const TYPE_PLACEHOLDER: &str = "{T}";

/// The target representation of one native type reference.
///
/// Encoders belong to the runtime bridge in the `builtin` package. An encoder
/// template may contain `{T}`, replaced by the qualified Go type, for generic
/// encoders such as `EnumEncoder[{T}]{}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapping {
    /// The type name as written in the descriptor.
    pub native: String,
    /// Unqualified Go type name, without pointer prefix.
    pub target: String,
    pub package: GoPackage,
    pub pointer_depth: usize,
    pub strategy: PassStrategy,
    pub kind: TypeKind,
    encoder: String,
}

impl TypeMapping {
    pub fn new(
        native: impl Into<String>,
        target: impl Into<String>,
        package: GoPackage,
        strategy: PassStrategy,
        kind: TypeKind,
        encoder: impl Into<String>,
    ) -> Self {
        Self {
            native: native.into(),
            target: target.into(),
            package,
            pointer_depth: 0,
            strategy,
            kind,
            encoder: encoder.into(),
        }
    }

    /// A value type in the universe scope (`int64`, `bool`, ...).
    pub fn primitive(native: impl Into<String>, target: impl Into<String>, encoder: impl Into<String>) -> Self {
        Self::new(
            native,
            target,
            GoPackage::Universe,
            PassStrategy::ByValue,
            TypeKind::Primitive,
            encoder,
        )
    }

    pub fn void(native: impl Into<String>) -> Self {
        Self::new(native, "", GoPackage::Universe, PassStrategy::ByValue, TypeKind::Void, "")
    }

    pub fn with_pointer_depth(mut self, depth: usize) -> Self {
        self.pointer_depth = depth;
        self
    }

    pub fn with_native(mut self, native: impl Into<String>) -> Self {
        self.native = native.into();
        self
    }

    pub fn with_kind(mut self, kind: TypeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_void(&self) -> bool {
        self.kind == TypeKind::Void
    }

    pub fn is_refcounted(&self) -> bool {
        self.strategy == PassStrategy::ByHandle { refcounted: true }
    }

    /// The Go type as spelled inside package `from`.
    pub fn go_type(&self, from: GoPackage) -> String {
        let mut out = "*".repeat(self.pointer_depth);
        out.push_str(&self.package.qualify(&self.target, from));
        out
    }

    /// The runtime encoder identifier as spelled inside package `from`.
    pub fn encoder(&self, from: GoPackage) -> String {
        let encoder = self.encoder.replace(TYPE_PLACEHOLDER, &self.go_type(from));
        GoPackage::Builtin.qualify(&encoder, from)
    }

    /// Expression producing the ptrcall argument pointer for `expr`.
    pub fn encode_arg(&self, expr: &str, from: GoPackage) -> String {
        match self.strategy {
            PassStrategy::ByPointer => format!("{}.EncodeArg(&{expr})", self.encoder(from)),
            _ => format!("{}.EncodeArg({expr})", self.encoder(from)),
        }
    }

    /// Expression allocating storage for a ptrcall return value.
    pub fn new_return_slot(&self, from: GoPackage) -> String {
        format!("{}.NewReturnSlot()", self.encoder(from))
    }

    /// Expression reading the value out of a return slot.
    pub fn decode(&self, slot: &str, from: GoPackage) -> String {
        format!("{}.DecodeTypePtr({slot})", self.encoder(from))
    }

    /// Statement storing `expr` into the return slot `slot`.
    pub fn encode_into(&self, expr: &str, slot: &str, from: GoPackage) -> String {
        format!("{}.EncodeTypePtr({expr}, {slot})", self.encoder(from))
    }

    /// Expression boxing `expr` into a Variant for varcalls.
    pub fn to_variant(&self, expr: &str, from: GoPackage) -> String {
        format!("{}.ToVariant({expr})", self.encoder(from))
    }

    /// Expression unboxing a Variant `expr`.
    pub fn from_variant(&self, expr: &str, from: GoPackage) -> String {
        format!("{}.FromVariant({expr})", self.encoder(from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_rendering() {
        let float = TypeMapping::primitive("float", "float64", "Float64Encoder");
        assert_eq!(float.go_type(GoPackage::Builtin), "float64");
        assert_eq!(float.go_type(GoPackage::ClassImpl), "float64");
        assert_eq!(
            float.decode("ret", GoPackage::Builtin),
            "Float64Encoder.DecodeTypePtr(ret)"
        );
        assert_eq!(
            float.encode_arg("x", GoPackage::ClassImpl),
            "builtin.Float64Encoder.EncodeArg(x)"
        );
    }

    #[test]
    fn test_by_pointer_takes_address() {
        let string = TypeMapping::new(
            "String",
            "String",
            GoPackage::Builtin,
            PassStrategy::ByPointer,
            TypeKind::Builtin,
            "StringEncoder",
        );
        assert_eq!(
            string.encode_arg("name", GoPackage::Builtin),
            "StringEncoder.EncodeArg(&name)"
        );
    }

    #[test]
    fn test_generic_encoder_qualifies_type() {
        let mode = TypeMapping::new(
            "enum::Node.ProcessMode",
            "NodeProcessMode",
            GoPackage::Constant,
            PassStrategy::ByValue,
            TypeKind::Enum { bitfield: false },
            "EnumEncoder[{T}]{}",
        );
        assert_eq!(mode.go_type(GoPackage::Builtin), "constant.NodeProcessMode");
        assert_eq!(
            mode.encoder(GoPackage::ClassImpl),
            "builtin.EnumEncoder[constant.NodeProcessMode]{}"
        );
        assert_eq!(
            mode.encode_into("r", "ret", GoPackage::Builtin),
            "EnumEncoder[constant.NodeProcessMode]{}.EncodeTypePtr(r, ret)"
        );
    }

    #[test]
    fn test_pointer_depth() {
        let frame = TypeMapping::new(
            "AudioFrame*",
            "AudioFrame",
            GoPackage::NativeStructure,
            PassStrategy::ByValue,
            TypeKind::Pointer,
            "PointerEncoder[{T}]{}",
        )
        .with_pointer_depth(1);
        assert_eq!(frame.go_type(GoPackage::Builtin), "*nativestructure.AudioFrame");
    }
}
