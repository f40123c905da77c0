//! Type & Name Resolver: maps every native type reference to its Go
//! representation and derives the identifiers the generator emits.
//!
//! Resolution is a single pass over the [`ApiModel`] and the [`HeaderAst`].
//! Failures are collected rather than reported one at a time, so a run that
//! hits an unknown type lists every unknown type together with each place
//! that referenced it.
//!
//! # Example
//!
//! ```
//! use gdext_codegen::api::{load_api, BuildConfiguration};
//! use gdext_codegen::header::parse_header;
//! use gdext_codegen::resolve::{GoPackage, Resolver};
//!
//! let api = load_api(
//!     r#"{
//!         "builtin_class_sizes": [{"build_configuration": "float_64", "sizes": [{"name": "Vector2", "size": 8}]}],
//!         "builtin_classes": [{"name": "Vector2", "members": [{"name": "x", "type": "float"}]}],
//!         "classes": [{"name": "Object"}]
//!     }"#,
//!     BuildConfiguration::Float64,
//! )
//! .unwrap();
//! let header = parse_header("typedef void *GDExtensionObjectPtr;").unwrap();
//!
//! let model = Resolver::new().resolve(api, header).unwrap();
//! let vector = model.mapping("Vector2", None).unwrap();
//! assert_eq!(vector.go_type(GoPackage::ClassImpl), "builtin.Vector2");
//! ```

pub mod naming;
mod registry;
mod types;

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info, warn};

use crate::api::{
    ApiModel, Argument, BuildConfiguration, EnumDescriptor, NativeStructureField, ReturnValue,
};
use crate::error::{ResolveError, UnresolvedType};
use crate::header::{CType, FieldKind, FunctionPointerTypedef, HeaderAst, StructDecl};

pub use registry::{TypeRegistry, c_primitive, type_key};
pub use types::{GoPackage, PassStrategy, TypeKind, TypeMapping};

use naming::{argument_name, constant_name, enum_member_name, enum_type_name, to_pascal_case};

const TYPED_ARRAY_PREFIX: &str = "typedarray::";
const ENUM_PREFIX: &str = "enum::";
const BITFIELD_PREFIX: &str = "bitfield::";

/// C base types accepted in header declarations without a typedef.
const C_HEADER_PRIMITIVES: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "bool",
    "_Bool", "size_t", "wchar_t", "char16_t", "char32_t", "int8_t", "int16_t", "int32_t",
    "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t", "intptr_t", "uintptr_t",
];

/// Resolves an [`ApiModel`] and [`HeaderAst`] into a [`ResolvedModel`].
///
/// Registered mappings take precedence over the descriptor's own builtin
/// and class definitions.
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: TypeRegistry,
    opaque_pointer_fallback: bool,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            registry: TypeRegistry::with_builtins(),
            opaque_pointer_fallback: true,
        }
    }

    /// Register a mapping for a native type name, replacing any existing one.
    pub fn register_type(&mut self, name: impl Into<String>, mapping: TypeMapping) -> &mut Self {
        self.registry.register(name, mapping);
        self
    }

    pub fn unregister_type(&mut self, name: &str) -> &mut Self {
        self.registry.unregister(name);
        self
    }

    /// Whether pointers to unrecognized pointees resolve to `unsafe.Pointer`
    /// (with a warning) instead of failing. Enabled by default.
    pub fn set_opaque_pointer_fallback(&mut self, enabled: bool) -> &mut Self {
        self.opaque_pointer_fallback = enabled;
        self
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn resolve(&self, api: ApiModel, header: HeaderAst) -> Result<ResolvedModel, ResolveError> {
        check_type_names(&api)?;
        let enums = resolve_enums(&api)?;

        let mut pass = Pass {
            api: &api,
            header: &header,
            registry: self.registry.clone(),
            opaque_pointer_fallback: self.opaque_pointer_fallback,
            types: BTreeMap::new(),
            unresolved: BTreeMap::new(),
            opaque_fallbacks: BTreeSet::new(),
        };
        pass.register_descriptor_types(&enums);
        pass.walk_builtins();
        pass.walk_classes();
        pass.walk_utility_functions();
        pass.walk_singletons();
        let native_fields = pass.walk_native_structures();
        let shims = pass.walk_header();

        if !pass.unresolved.is_empty() {
            let unresolved = pass
                .unresolved
                .into_iter()
                .map(|(type_name, sites)| UnresolvedType {
                    type_name,
                    sites: sites.into_iter().collect(),
                })
                .collect();
            return Err(ResolveError::UnresolvedTypes(unresolved));
        }

        let types = pass.types;
        let opaque_fallbacks = pass.opaque_fallbacks;
        info!(
            types = types.len(),
            enums = enums.len(),
            shims = shims.len(),
            opaque = opaque_fallbacks.len(),
            "resolved type references"
        );

        Ok(ResolvedModel {
            api,
            header,
            types,
            enums,
            native_fields,
            shims,
            opaque_fallbacks,
        })
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

/// One enum with its namespaced Go identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnum {
    /// `Owner.Name` for scoped enums, the descriptor name for global ones.
    pub key: String,
    pub owner: Option<String>,
    pub name: String,
    /// Go type name in the `constant` package.
    pub target: String,
    pub is_bitfield: bool,
    pub members: Vec<ResolvedEnumMember>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnumMember {
    pub native: String,
    pub ident: String,
    pub value: i64,
}

/// A header type with its C and cgo spellings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderType {
    /// As written in C, e.g. `const char *`.
    pub c: String,
    /// As spelled in cgo Go code, e.g. `*C.char`. Empty for `void`.
    pub go: String,
}

impl HeaderType {
    pub fn is_void(&self) -> bool {
        self.go.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimParam {
    /// C parameter name, synthesized as `argN` when the prototype omits it.
    pub name: String,
    pub go_name: String,
    pub ty: HeaderType,
}

/// A call-through shim for one function-pointer typedef.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimFunction {
    pub typedef: String,
    /// `get_proc_address` name for interface functions.
    pub proc_name: Option<String>,
    /// Go method name on the loaded interface table.
    pub go_name: String,
    pub return_type: HeaderType,
    pub params: Vec<ShimParam>,
}

/// The fully resolved model handed to the generator.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    api: ApiModel,
    header: HeaderAst,
    types: BTreeMap<String, TypeMapping>,
    enums: Vec<ResolvedEnum>,
    native_fields: BTreeMap<String, Vec<TypeMapping>>,
    shims: Vec<ShimFunction>,
    opaque_fallbacks: BTreeSet<String>,
}

impl ResolvedModel {
    pub fn api(&self) -> &ApiModel {
        &self.api
    }

    pub fn header(&self) -> &HeaderAst {
        &self.header
    }

    /// Mapping for a type reference seen during resolution.
    pub fn mapping(&self, name: &str, meta: Option<&str>) -> Option<&TypeMapping> {
        self.types
            .get(&type_key(name, meta))
            .or_else(|| self.types.get(name))
    }

    pub fn argument_mapping(&self, argument: &Argument) -> Option<&TypeMapping> {
        self.mapping(&argument.type_name, argument.meta.as_deref())
    }

    pub fn return_mapping(&self, ret: &ReturnValue) -> Option<&TypeMapping> {
        self.mapping(&ret.type_name, ret.meta.as_deref())
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Global enums, then builtin enums, then class enums, each by key.
    pub fn enums(&self) -> &[ResolvedEnum] {
        &self.enums
    }

    pub fn enum_by_key(&self, key: &str) -> Option<&ResolvedEnum> {
        self.enums.iter().find(|e| e.key == key)
    }

    /// Field mappings of a native structure, parallel to its field list.
    pub fn native_fields(&self, structure: &str) -> Option<&[TypeMapping]> {
        self.native_fields.get(structure).map(Vec::as_slice)
    }

    /// Shims for every non-variadic function-pointer typedef, in header order.
    pub fn shims(&self) -> &[ShimFunction] {
        &self.shims
    }

    pub fn interface_shims(&self) -> impl Iterator<Item = &ShimFunction> {
        self.shims.iter().filter(|s| s.proc_name.is_some())
    }

    /// Pointer types that fell back to `unsafe.Pointer`.
    pub fn opaque_fallbacks(&self) -> &BTreeSet<String> {
        &self.opaque_fallbacks
    }
}

/// Builtins, class interfaces and `Ref` wrappers share the `builtin` package.
fn check_type_names(api: &ApiModel) -> Result<(), ResolveError> {
    let mut seen: HashMap<String, String> = HashMap::new();
    let builtins = api
        .builtin_classes()
        .iter()
        .map(|b| (b.name.clone(), format!("builtin_classes.{}", b.name)));
    let classes = api.classes().iter().flat_map(|c| {
        let site = format!("classes.{}", c.name);
        let mut names = vec![(c.name.clone(), site.clone())];
        if c.is_refcounted {
            names.push((format!("Ref{}", c.name), site));
        }
        names
    });
    for (name, site) in builtins.chain(classes) {
        claim(&mut seen, name, site)?;
    }
    Ok(())
}

fn claim(seen: &mut HashMap<String, String>, name: String, site: String) -> Result<(), ResolveError> {
    match seen.entry(name) {
        Entry::Occupied(entry) => Err(ResolveError::NameCollision {
            name: entry.key().clone(),
            first: entry.get().clone(),
            second: site,
        }),
        Entry::Vacant(entry) => {
            entry.insert(site);
            Ok(())
        }
    }
}

/// Namespace every enum by its owner and reject identifier clashes in the
/// `constant` package.
fn resolve_enums(api: &ApiModel) -> Result<Vec<ResolvedEnum>, ResolveError> {
    let mut enums = Vec::new();
    for e in api.global_enums() {
        enums.push(resolve_enum(None, e));
    }
    for builtin in api.builtin_classes() {
        for e in &builtin.enums {
            enums.push(resolve_enum(Some(&builtin.name), e));
        }
    }
    for class in api.classes() {
        for e in &class.enums {
            enums.push(resolve_enum(Some(&class.name), e));
        }
    }

    let mut seen = HashMap::new();
    for e in &enums {
        let site = format!("enum {}", e.key);
        claim(&mut seen, e.target.clone(), site.clone())?;
        for member in &e.members {
            claim(&mut seen, member.ident.clone(), format!("{site} member {}", member.native))?;
        }
    }
    for class in api.classes() {
        for c in &class.constants {
            claim(
                &mut seen,
                constant_name(Some(&class.name), &c.name),
                format!("classes.{}.constants.{}", class.name, c.name),
            )?;
        }
    }
    for c in api.global_constants() {
        claim(&mut seen, constant_name(None, &c.name), format!("global_constants.{}", c.name))?;
    }

    debug!(count = enums.len(), "namespaced enums");
    Ok(enums)
}

fn resolve_enum(owner: Option<&str>, e: &EnumDescriptor) -> ResolvedEnum {
    let target = enum_type_name(owner, &e.name);
    let members = e
        .values
        .iter()
        .map(|v| ResolvedEnumMember {
            native: v.name.clone(),
            ident: enum_member_name(&target, &v.name),
            value: v.value,
        })
        .collect();
    ResolvedEnum {
        key: match owner {
            Some(owner) => format!("{owner}.{}", e.name),
            None => e.name.clone(),
        },
        owner: owner.map(str::to_string),
        name: e.name.clone(),
        target,
        is_bitfield: e.is_bitfield,
        members,
    }
}

struct Pass<'a> {
    api: &'a ApiModel,
    header: &'a HeaderAst,
    registry: TypeRegistry,
    opaque_pointer_fallback: bool,
    types: BTreeMap<String, TypeMapping>,
    /// Unresolved type name -> every site that referenced it.
    unresolved: BTreeMap<String, BTreeSet<String>>,
    opaque_fallbacks: BTreeSet<String>,
}

impl Pass<'_> {
    fn build(&self) -> BuildConfiguration {
        self.api.build_configuration()
    }

    /// Layer builtins, classes and enums from the descriptor under any
    /// mappings already registered.
    fn register_descriptor_types(&mut self, enums: &[ResolvedEnum]) {
        for builtin in self.api.builtin_classes() {
            if self.registry.contains(&builtin.name) {
                continue;
            }
            let strategy = if builtin.has_destructor {
                PassStrategy::ByPointer
            } else {
                PassStrategy::ByValue
            };
            self.registry.register(
                builtin.name.clone(),
                TypeMapping::new(
                    builtin.name.clone(),
                    builtin.name.clone(),
                    GoPackage::Builtin,
                    strategy,
                    TypeKind::Builtin,
                    format!("{}Encoder", builtin.name),
                ),
            );
        }

        for class in self.api.classes() {
            if self.registry.contains(&class.name) {
                continue;
            }
            let target = if class.is_refcounted {
                format!("Ref{}", class.name)
            } else {
                class.name.clone()
            };
            let encoder = format!("{target}Encoder");
            self.registry.register(
                class.name.clone(),
                TypeMapping::new(
                    class.name.clone(),
                    target,
                    GoPackage::Builtin,
                    PassStrategy::ByHandle {
                        refcounted: class.is_refcounted,
                    },
                    TypeKind::Class,
                    encoder,
                ),
            );
        }

        // every descriptor-defined type is queryable, referenced or not
        let api = self.api;
        let defined = api
            .builtin_classes()
            .iter()
            .map(|b| &b.name)
            .chain(api.classes().iter().map(|c| &c.name));
        for name in defined {
            if let Some(mapping) = self.registry.get(name) {
                self.types.insert(name.clone(), mapping.clone());
            }
        }

        for e in enums {
            for prefix in [ENUM_PREFIX, BITFIELD_PREFIX] {
                let native = format!("{prefix}{}", e.key);
                if let Some(registered) = self.registry.get(&native) {
                    self.types.insert(native, registered.clone());
                    continue;
                }
                let mapping = TypeMapping::new(
                    native.clone(),
                    e.target.clone(),
                    GoPackage::Constant,
                    PassStrategy::ByValue,
                    TypeKind::Enum {
                        bitfield: e.is_bitfield,
                    },
                    "EnumEncoder[{T}]{}",
                );
                self.types.insert(native.clone(), mapping.clone());
                self.registry.register(native, mapping);
            }
        }
    }

    /// Resolve one reference, recording `site` against the missing type on failure.
    fn reference(
        &mut self,
        name: &str,
        meta: Option<&str>,
        site: impl FnOnce() -> String,
    ) -> Option<TypeMapping> {
        match self.lookup(name.trim(), meta) {
            Ok(mapping) => {
                self.types.insert(type_key(name, meta), mapping.clone());
                Some(mapping)
            }
            Err(missing) => {
                self.unresolved.entry(missing).or_default().insert(site());
                None
            }
        }
    }

    /// `Err` carries the innermost type name that could not be mapped.
    fn lookup(&mut self, name: &str, meta: Option<&str>) -> Result<TypeMapping, String> {
        if let Some(mapping) = self.registry.get_with_meta(name, meta) {
            return Ok(mapping.clone());
        }
        if let Some(element) = name.strip_prefix(TYPED_ARRAY_PREFIX) {
            self.lookup(element, None)?;
            let array = self
                .registry
                .get("Array")
                .ok_or_else(|| "Array".to_string())?;
            return Ok(array
                .clone()
                .with_native(name)
                .with_kind(TypeKind::TypedArray {
                    element: element.to_string(),
                }));
        }
        if name.ends_with('*') {
            return self.pointer(name);
        }
        Err(name.to_string())
    }

    fn pointer(&mut self, name: &str) -> Result<TypeMapping, String> {
        let depth = name.matches('*').count();
        let pointee = name.trim_end_matches(|c: char| c == '*' || c.is_whitespace());
        let pointee = pointee.strip_prefix("const ").unwrap_or(pointee).trim();

        let pointer = |target: &str, package: GoPackage, depth: usize| {
            TypeMapping::new(
                name,
                target,
                package,
                PassStrategy::ByValue,
                TypeKind::Pointer,
                "PointerEncoder[{T}]{}",
            )
            .with_pointer_depth(depth)
        };
        let opaque = || {
            TypeMapping::new(
                name,
                "unsafe.Pointer",
                GoPackage::Universe,
                PassStrategy::ByValue,
                TypeKind::Pointer,
                "UnsafePointerEncoder",
            )
        };

        if pointee == "void" {
            return Ok(opaque().with_pointer_depth(depth - 1));
        }
        if let Some(primitive) = c_primitive(pointee, self.build()) {
            return Ok(pointer(&primitive.target, GoPackage::Universe, depth));
        }
        if self.api.native_structure(pointee).is_some() {
            return Ok(pointer(pointee, GoPackage::NativeStructure, depth));
        }
        if self.api.builtin_class(pointee).is_some() {
            return Ok(pointer(pointee, GoPackage::Builtin, depth));
        }
        // object pointers are handles already
        if self.api.class(pointee).is_some() {
            return Ok(opaque().with_pointer_depth(depth - 1));
        }
        if self.opaque_pointer_fallback {
            if self.opaque_fallbacks.insert(name.to_string()) {
                warn!(type_name = name, "unknown pointee, falling back to unsafe.Pointer");
            }
            return Ok(opaque());
        }
        Err(pointee.to_string())
    }

    fn arguments(&mut self, arguments: &[Argument], site: &str) {
        for (i, arg) in arguments.iter().enumerate() {
            self.reference(&arg.type_name, arg.meta.as_deref(), || {
                format!("{site}.arguments[{i}]")
            });
        }
    }

    fn return_value(&mut self, ret: Option<&ReturnValue>, site: &str) {
        if let Some(ret) = ret {
            self.reference(&ret.type_name, ret.meta.as_deref(), || {
                format!("{site}.return_value")
            });
        }
    }

    fn walk_builtins(&mut self) {
        let api = self.api;
        for builtin in api.builtin_classes() {
            let owner = format!("builtin_classes.{}", builtin.name);
            for member in &builtin.members {
                self.reference(&member.type_name, None, || {
                    format!("{owner}.members.{}", member.name)
                });
            }
            for constant in &builtin.constants {
                self.reference(&constant.type_name, None, || {
                    format!("{owner}.constants.{}", constant.name)
                });
            }
            if let Some(indexed) = &builtin.indexing_return_type {
                self.reference(indexed, None, || format!("{owner}.indexing_return_type"));
            }
            for (i, op) in builtin.operators.iter().enumerate() {
                if let Some(right) = &op.right_type {
                    self.reference(right, None, || format!("{owner}.operators[{i}].right_type"));
                }
                self.reference(&op.return_type, None, || {
                    format!("{owner}.operators[{i}].return_type")
                });
            }
            for ctor in &builtin.constructors {
                self.arguments(&ctor.arguments, &format!("{owner}.constructors[{}]", ctor.index));
            }
            for method in &builtin.methods {
                let site = format!("{owner}.methods.{}", method.name);
                self.arguments(&method.arguments, &site);
                self.return_value(method.return_type(), &site);
            }
        }
    }

    fn walk_classes(&mut self) {
        let api = self.api;
        for class in api.classes() {
            let owner = format!("classes.{}", class.name);
            for method in &class.methods {
                let site = format!("{owner}.methods.{}", method.name);
                self.arguments(&method.arguments, &site);
                self.return_value(method.return_type(), &site);
            }
            for signal in &class.signals {
                self.arguments(&signal.arguments, &format!("{owner}.signals.{}", signal.name));
            }
        }
    }

    fn walk_utility_functions(&mut self) {
        let api = self.api;
        for function in api.utility_functions() {
            let site = format!("utility_functions.{}", function.name);
            self.arguments(&function.arguments, &site);
            if let Some(ret) = &function.return_type {
                self.reference(ret, None, || format!("{site}.return_value"));
            }
        }
    }

    fn walk_singletons(&mut self) {
        let api = self.api;
        for singleton in api.singletons() {
            self.reference(&singleton.type_name, None, || {
                format!("singletons.{}", singleton.name)
            });
        }
    }

    fn walk_native_structures(&mut self) -> BTreeMap<String, Vec<TypeMapping>> {
        let api = self.api;
        let mut resolved = BTreeMap::new();
        for structure in api.native_structures() {
            let fields: Vec<_> = structure
                .fields
                .iter()
                .map(|field| {
                    self.native_field(field, || {
                        format!("native_structures.{}.{}", structure.name, field.name)
                    })
                })
                .collect();
            if let Some(fields) = fields.into_iter().collect::<Option<Vec<_>>>() {
                resolved.insert(structure.name.clone(), fields);
            }
        }
        resolved
    }

    /// Native structure fields are C declarations: C spellings win over
    /// descriptor names, and `Owner::Enum` names a scoped enum.
    fn native_field(
        &mut self,
        field: &NativeStructureField,
        site: impl FnOnce() -> String,
    ) -> Option<TypeMapping> {
        let base = field.type_name.strip_prefix("const ").unwrap_or(&field.type_name);
        if field.pointer_depth > 0 {
            let spelled = format!("{base}{}", "*".repeat(field.pointer_depth));
            return self.reference(&spelled, None, site);
        }
        if let Some(primitive) = c_primitive(base, self.build()) {
            return Some(primitive);
        }
        match base.split_once("::") {
            Some((owner, name)) => {
                self.reference(&format!("{ENUM_PREFIX}{owner}.{name}"), None, site)
            }
            None => self.reference(base, None, site),
        }
    }

    /// Check every type a header declaration references and build a shim
    /// for each non-variadic function-pointer typedef.
    fn walk_header(&mut self) -> Vec<ShimFunction> {
        let header = self.header;
        for alias in header.aliases() {
            self.header_type(&alias.target, || format!("header.{}.target", alias.name));
        }
        for record in header.structs() {
            self.walk_record(&format!("header.{}", record.name), record);
        }

        let mut shims = Vec::new();
        for function in header.function_pointers() {
            let return_type = self.header_type(&function.return_type, || {
                format!("header.{}.return_type", function.name)
            });
            let params: Vec<_> = function
                .params
                .iter()
                .enumerate()
                .map(|(i, param)| {
                    let ty = self.header_type(&param.ty, || {
                        format!("header.{}.params[{i}]", function.name)
                    })?;
                    let name = function.param_name(i);
                    Some(ShimParam {
                        go_name: argument_name(&name),
                        name,
                        ty,
                    })
                })
                .collect();

            if function.is_variadic {
                warn!(typedef = %function.name, "skipping shim for variadic function pointer");
                continue;
            }
            let (Some(return_type), Some(params)) =
                (return_type, params.into_iter().collect::<Option<Vec<_>>>())
            else {
                continue;
            };
            shims.push(shim(function, return_type, params));
        }
        shims
    }

    fn walk_record(&mut self, path: &str, record: &StructDecl) {
        for (i, field) in record.fields.iter().enumerate() {
            let site = match &field.name {
                Some(name) => format!("{path}.fields.{name}"),
                None => format!("{path}.fields[{i}]"),
            };
            match &field.kind {
                FieldKind::Plain { ty, .. } => {
                    self.header_type(ty, || site);
                }
                FieldKind::FunctionPointer { return_type, params } => {
                    self.header_type(return_type, || format!("{site}.return_type"));
                    for (j, param) in params.iter().enumerate() {
                        self.header_type(&param.ty, || format!("{site}.params[{j}]"));
                    }
                }
                FieldKind::Nested(nested) => self.walk_record(&site, nested),
            }
        }
    }

    /// A header type is known when it is a C primitive, a declared typedef
    /// or record, or a tag. Tags only need a definition when used by value.
    fn header_type(&mut self, ty: &CType, site: impl FnOnce() -> String) -> Option<HeaderType> {
        let known = ty.base.split_whitespace().all(|w| C_HEADER_PRIMITIVES.contains(&w))
            || self.header.declares_type(&ty.base)
            || (ty.is_tagged() && (ty.is_pointer() || self.header.declares_tag(&ty.base)));
        if !known {
            self.unresolved.entry(ty.base.clone()).or_default().insert(site());
            return None;
        }
        Some(HeaderType {
            c: ty.to_string().trim_end().to_string(),
            go: cgo_type(ty),
        })
    }
}

fn shim(function: &FunctionPointerTypedef, return_type: HeaderType, params: Vec<ShimParam>) -> ShimFunction {
    let proc_name = function.proc_address_name();
    let go_name = match &proc_name {
        Some(proc) => to_pascal_case(proc),
        None => function.name.clone(),
    };
    ShimFunction {
        typedef: function.name.clone(),
        proc_name,
        go_name,
        return_type,
        params,
    }
}

/// cgo spelling of a header type. `void` is empty; `void *` is `unsafe.Pointer`.
fn cgo_type(ty: &CType) -> String {
    if ty.is_void() {
        return String::new();
    }
    let depth = ty.pointer_depth();
    if ty.base == "void" {
        return format!("{}unsafe.Pointer", "*".repeat(depth - 1));
    }
    if let Some(keyword) = ty.keyword {
        return format!("{}C.{keyword}_{}", "*".repeat(depth), ty.base);
    }
    let base = ty
        .base
        .replace("unsigned ", "u")
        .replace("signed char", "schar")
        .replace(' ', "");
    format!("{}C.{base}", "*".repeat(depth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::load_api;
    use crate::header::parse_header;

    const HEADER: &str = r#"
        #include <stdint.h>
        typedef void *GDExtensionObjectPtr;
        typedef const void *GDExtensionConstStringNamePtr;
        typedef void (*GDExtensionInterfaceFunctionPtr)();
        typedef GDExtensionInterfaceFunctionPtr (*GDExtensionInterfaceGetProcAddress)(const char *p_function_name);
        typedef uint32_t (*GDExtensionInterfaceGetNativeStructSize)(GDExtensionConstStringNamePtr p_name);
    "#;

    fn api(json: &str) -> ApiModel {
        load_api(json, BuildConfiguration::Float64).unwrap()
    }

    fn base_api(extra_classes: &str) -> String {
        format!(
            r#"{{
                "builtin_class_sizes": [{{"build_configuration": "float_64", "sizes": [
                    {{"name": "Vector2", "size": 8}},
                    {{"name": "String", "size": 8}},
                    {{"name": "Array", "size": 8}}
                ]}}],
                "builtin_classes": [
                    {{"name": "float"}},
                    {{"name": "Vector2", "members": [{{"name": "x", "type": "float"}}, {{"name": "y", "type": "float"}}],
                      "methods": [{{"name": "length", "is_const": true, "return_type": "float"}}]}},
                    {{"name": "String", "has_destructor": true}},
                    {{"name": "Array", "has_destructor": true}}
                ],
                "classes": [
                    {{"name": "Object"}},
                    {{"name": "RefCounted", "inherits": "Object", "is_refcounted": true}}
                    {extra_classes}
                ]
            }}"#
        )
    }

    fn resolve(json: &str) -> Result<ResolvedModel, ResolveError> {
        Resolver::new().resolve(api(json), parse_header(HEADER).unwrap())
    }

    // ── Type mapping ──────────────────────────────────────────────

    #[test]
    fn test_builtin_and_class_mappings() {
        let model = resolve(&base_api("")).unwrap();

        let vector = model.mapping("Vector2", None).unwrap();
        assert_eq!(vector.strategy, PassStrategy::ByValue);
        assert_eq!(vector.kind, TypeKind::Builtin);

        let length = &model.api().builtin_class("Vector2").unwrap().methods[0];
        let ret = model.return_mapping(length.return_type().unwrap()).unwrap();
        assert_eq!(ret.target, "float64");

        assert_eq!(
            model.mapping("String", None).unwrap().strategy,
            PassStrategy::ByPointer
        );
    }

    #[test]
    fn test_refcounted_classes_use_ref_wrappers() {
        let model = resolve(&base_api(
            r#", {"name": "Resource", "inherits": "RefCounted", "is_refcounted": true,
                  "methods": [{"name": "duplicate", "return_value": {"type": "Resource"}}]}"#,
        ))
        .unwrap();
        let resource = model.mapping("Resource", None).unwrap();
        assert!(resource.is_refcounted());
        assert_eq!(resource.go_type(GoPackage::ClassImpl), "builtin.RefResource");
        assert_eq!(
            resource.encoder(GoPackage::Builtin),
            "RefResourceEncoder"
        );
    }

    #[test]
    fn test_typed_arrays_and_meta() {
        let model = resolve(&base_api(
            r#", {"name": "Node", "inherits": "Object", "methods": [
                {"name": "get_children", "return_value": {"type": "typedarray::Node"}},
                {"name": "set_id", "arguments": [{"name": "id", "type": "int", "meta": "uint32"}]}
            ]}"#,
        ))
        .unwrap();

        let children = model.mapping("typedarray::Node", None).unwrap();
        assert_eq!(
            children.kind,
            TypeKind::TypedArray {
                element: "Node".to_string()
            }
        );
        assert_eq!(children.target, "Array");
        assert_eq!(model.mapping("int", Some("uint32")).unwrap().target, "uint32");
    }

    #[test]
    fn test_pointer_types() {
        let model = resolve(&base_api(
            r#", {"name": "Node", "inherits": "Object", "methods": [
                {"name": "raw", "arguments": [
                    {"name": "data", "type": "const uint8_t*"},
                    {"name": "user", "type": "void*"},
                    {"name": "owner", "type": "Object*"}
                ]}
            ]}"#,
        ))
        .unwrap();
        assert_eq!(
            model.mapping("const uint8_t*", None).unwrap().go_type(GoPackage::Builtin),
            "*uint8"
        );
        assert_eq!(model.mapping("void*", None).unwrap().target, "unsafe.Pointer");
        assert_eq!(model.mapping("Object*", None).unwrap().target, "unsafe.Pointer");
        assert!(model.opaque_fallbacks().is_empty());
    }

    #[test]
    fn test_opaque_pointer_fallback() {
        let json = base_api(
            r#", {"name": "Node", "inherits": "Object", "methods": [
                {"name": "raw", "arguments": [{"name": "glyph", "type": "const Glyph*"}]}
            ]}"#,
        );
        let model = resolve(&json).unwrap();
        assert!(model.opaque_fallbacks().contains("const Glyph*"));

        let err = Resolver::new()
            .set_opaque_pointer_fallback(false)
            .resolve(api(&json), parse_header(HEADER).unwrap())
            .unwrap_err();
        assert_eq!(err.unresolved_names(), vec!["Glyph"]);
    }

    #[test]
    fn test_registered_mapping_overrides_descriptor() {
        let mut resolver = Resolver::new();
        resolver.register_type(
            "Vector2",
            TypeMapping::new(
                "Vector2",
                "Vec2",
                GoPackage::Builtin,
                PassStrategy::ByValue,
                TypeKind::Builtin,
                "Vec2Encoder",
            ),
        );
        let model = resolver
            .resolve(api(&base_api("")), parse_header(HEADER).unwrap())
            .unwrap();
        assert_eq!(model.mapping("Vector2", None).unwrap().target, "Vec2");
    }

    // ── Unresolved types ──────────────────────────────────────────

    #[test]
    fn test_unknown_argument_type_names_type_and_method() {
        let err = resolve(&base_api(
            r#", {"name": "Node", "inherits": "Object", "methods": [
                {"name": "frobnicate", "arguments": [{"name": "thing", "type": "Frobnicator"}]}
            ]}"#,
        ))
        .unwrap_err();

        let ResolveError::UnresolvedTypes(types) = &err else {
            panic!("expected unresolved types, got {err:?}");
        };
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].type_name, "Frobnicator");
        assert_eq!(
            types[0].sites,
            vec!["classes.Node.methods.frobnicate.arguments[0]".to_string()]
        );
        let message = err.to_string();
        assert!(message.contains("Frobnicator"));
        assert!(message.contains("frobnicate"));
    }

    #[test]
    fn test_all_unresolved_types_are_reported() {
        let err = resolve(&base_api(
            r#", {"name": "Node", "inherits": "Object", "methods": [
                {"name": "a", "arguments": [{"name": "x", "type": "Missing"}]},
                {"name": "b", "return_value": {"type": "typedarray::Ghost"}},
                {"name": "c", "arguments": [{"name": "y", "type": "Missing"}]}
            ]}"#,
        ))
        .unwrap_err();
        assert_eq!(err.unresolved_names(), vec!["Ghost", "Missing"]);
        let ResolveError::UnresolvedTypes(types) = err else {
            unreachable!()
        };
        assert_eq!(types[1].sites.len(), 2);
    }

    #[test]
    fn test_undeclared_header_type_is_unresolved() {
        let header = parse_header(
            "typedef void (*GDExtensionInterfaceMemFree)(GDExtensionMystery p_ptr);",
        )
        .unwrap();
        let err = Resolver::new()
            .resolve(api(&base_api("")), header)
            .unwrap_err();
        let ResolveError::UnresolvedTypes(types) = err else {
            panic!("expected unresolved types");
        };
        assert_eq!(types[0].type_name, "GDExtensionMystery");
        assert_eq!(types[0].sites, vec!["header.GDExtensionInterfaceMemFree.params[0]"]);
    }

    #[test]
    fn test_alias_and_field_types_must_be_declared() {
        let header = parse_header(
            "typedef GDExtensionMystery GDExtensionAlias;\n\
             typedef struct {\n\
               GDExtensionPhantom field;\n\
               struct { GDExtensionMystery inner; } nested;\n\
               void (*callback)(GDExtensionGhost p_value);\n\
             } GDExtensionHolder;",
        )
        .unwrap();
        let err = Resolver::new()
            .resolve(api(&base_api("")), header)
            .unwrap_err();
        assert_eq!(
            err.unresolved_names(),
            vec!["GDExtensionGhost", "GDExtensionMystery", "GDExtensionPhantom"]
        );
        let ResolveError::UnresolvedTypes(types) = err else {
            unreachable!()
        };
        assert_eq!(types[0].sites, vec!["header.GDExtensionHolder.fields.callback.params[0]"]);
        assert_eq!(
            types[1].sites,
            vec![
                "header.GDExtensionAlias.target",
                "header.GDExtensionHolder.fields.nested.fields.inner",
            ]
        );
        assert_eq!(types[2].sites, vec!["header.GDExtensionHolder.fields.field"]);
    }

    #[test]
    fn test_opaque_struct_pointers_need_no_definition() {
        let header = parse_header(
            "typedef struct __Opaque *GDExtensionOpaquePtr;\n\
             struct Pair { int a; };\n\
             typedef struct { struct Pair pair; GDExtensionOpaquePtr ptr; } GDExtensionUser;",
        )
        .unwrap();
        assert!(Resolver::new().resolve(api(&base_api("")), header).is_ok());

        let header = parse_header("typedef struct { struct Missing value; } GDExtensionByValue;").unwrap();
        let err = Resolver::new()
            .resolve(api(&base_api("")), header)
            .unwrap_err();
        assert_eq!(err.unresolved_names(), vec!["Missing"]);
    }

    // ── Enums ─────────────────────────────────────────────────────

    #[test]
    fn test_enum_members_are_namespaced() {
        let model = resolve(&base_api(
            r#", {"name": "Node", "inherits": "Object",
                  "enums": [{"name": "ProcessMode", "values": [{"name": "NONE", "value": 0}]}],
                  "methods": [{"name": "set_process_mode", "arguments": [{"name": "mode", "type": "enum::Node.ProcessMode"}]}]},
                {"name": "Control", "inherits": "Object",
                  "enums": [{"name": "FocusMode", "values": [{"name": "NONE", "value": 0}]}]}"#,
        ))
        .unwrap();

        let idents: Vec<_> = model
            .enums()
            .iter()
            .flat_map(|e| e.members.iter().map(|m| m.ident.as_str()))
            .collect();
        assert!(idents.contains(&"NodeProcessMode_NONE"));
        assert!(idents.contains(&"ControlFocusMode_NONE"));

        let mode = model.mapping("enum::Node.ProcessMode", None).unwrap();
        assert_eq!(mode.go_type(GoPackage::Builtin), "constant.NodeProcessMode");
    }

    #[test]
    fn test_enum_name_collision_is_an_error() {
        let err = resolve(&base_api(
            r#", {"name": "Node", "inherits": "Object",
                  "enums": [{"name": "ModeA", "values": [{"name": "X", "value": 0}]}]},
                {"name": "NodeMode", "inherits": "Object",
                  "enums": [{"name": "A", "values": [{"name": "Y", "value": 0}]}]}"#,
        ))
        .unwrap_err();
        let ResolveError::NameCollision { name, first, second } = err else {
            panic!("expected a name collision");
        };
        assert_eq!(name, "NodeModeA");
        assert_eq!(first, "enum Node.ModeA");
        assert_eq!(second, "enum NodeMode.A");
    }

    #[test]
    fn test_global_and_bitfield_enums() {
        let model = resolve(
            &base_api("").replacen(
                "\"builtin_classes\"",
                r#""global_enums": [
                    {"name": "Variant.Type", "values": [{"name": "TYPE_NIL", "value": 0}]},
                    {"name": "MethodFlags", "is_bitfield": true, "values": [{"name": "METHOD_FLAG_NORMAL", "value": 1}]}
                ], "builtin_classes""#,
                1,
            ),
        )
        .unwrap();
        let variant_type = model.enum_by_key("Variant.Type").unwrap();
        assert_eq!(variant_type.target, "VariantType");
        assert_eq!(variant_type.members[0].ident, "VariantType_TYPE_NIL");
        assert!(model.enum_by_key("MethodFlags").unwrap().is_bitfield);
    }

    // ── Header shims ──────────────────────────────────────────────

    #[test]
    fn test_get_proc_address_shim() {
        let model = resolve(&base_api("")).unwrap();
        let shim = model
            .interface_shims()
            .find(|s| s.typedef == "GDExtensionInterfaceGetProcAddress")
            .unwrap();
        assert_eq!(shim.proc_name.as_deref(), Some("get_proc_address"));
        assert_eq!(shim.go_name, "GetProcAddress");
        assert_eq!(shim.return_type.go, "C.GDExtensionInterfaceFunctionPtr");
        assert_eq!(shim.params[0].ty.c, "const char *");
        assert_eq!(shim.params[0].ty.go, "*C.char");
        assert_eq!(shim.params[0].go_name, "pFunctionName");

        // non-interface function pointers still get call-through shims
        assert!(model.shims().iter().any(|s| s.typedef == "GDExtensionInterfaceFunctionPtr"));
    }

    #[test]
    fn test_cgo_spellings() {
        let mut ty = CType::named("unsigned int");
        assert_eq!(cgo_type(&ty), "C.uint");
        ty.pointers.push(false);
        assert_eq!(cgo_type(&ty), "*C.uint");
        assert_eq!(cgo_type(&CType::named("void")), "");
        let mut void_ptr = CType::named("void");
        void_ptr.pointers = vec![false, false];
        assert_eq!(cgo_type(&void_ptr), "*unsafe.Pointer");
        let mut opaque = CType::named("__Opaque");
        opaque.keyword = Some("struct");
        opaque.pointers.push(false);
        assert_eq!(cgo_type(&opaque), "*C.struct___Opaque");
    }
}
