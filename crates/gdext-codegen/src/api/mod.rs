//! API Schema Loader: turns `extension_api.json` into an [`ApiModel`].
//!
//! Loading validates the descriptor (unique names, a single `Object`-rooted
//! class tree, unique enum members, typed and named arguments, parseable
//! native structure formats, sizes for the selected build configuration) and
//! sorts every list canonically, so generated output never depends on the
//! order of the input file.
//!
//! # Example
//!
//! ```
//! use gdext_codegen::api::{load_api, BuildConfiguration};
//!
//! let model = load_api(
//!     r#"{"classes": [{"name": "Object"}, {"name": "Node", "inherits": "Object"}]}"#,
//!     BuildConfiguration::Float64,
//! )
//! .unwrap();
//!
//! let node = model.class("Node").unwrap();
//! assert_eq!(model.parent(node).unwrap().name, "Object");
//! ```

mod descriptor;
mod loader;
mod model;
mod native_structure;

pub use descriptor::{
    ApiDescriptor, Argument, BuildConfiguration, BuiltinClassDescriptor, BuiltinConstantDescriptor,
    ClassDescriptor, ClassId, ConstantDescriptor, ConstructorDescriptor, EngineHeader,
    EnumDescriptor, EnumValue, MemberDescriptor, MethodDescriptor, NativeStructureDescriptor,
    NativeStructureField, OperatorDescriptor, PropertyDescriptor, ReturnValue, SignalDescriptor,
    SingletonDescriptor, SizeTable, TypeSize, UtilityFunctionDescriptor,
};
pub use loader::{ROOT_CLASS, load_api};
pub use model::{ApiModel, Capability};
