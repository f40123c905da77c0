use std::collections::{BTreeMap, HashMap};

use crate::api::descriptor::{
    BuildConfiguration, BuiltinClassDescriptor, ClassDescriptor, ClassId, ConstantDescriptor,
    EngineHeader, EnumDescriptor, MethodDescriptor, NativeStructureDescriptor, SingletonDescriptor,
    UtilityFunctionDescriptor,
};

/// Read-only, validated snapshot of the API descriptor.
///
/// All lists are in canonical order: sorted by name, with classes ordered so
/// that a parent always precedes its children. Classes live in an arena
/// indexed by [`ClassId`]; inheritance is a parent index, not a pointer.
#[derive(Debug, Clone, Default)]
pub struct ApiModel {
    pub(crate) header: EngineHeader,
    pub(crate) build_configuration: BuildConfiguration,
    pub(crate) global_constants: Vec<ConstantDescriptor>,
    pub(crate) global_enums: Vec<EnumDescriptor>,
    pub(crate) utility_functions: Vec<UtilityFunctionDescriptor>,
    pub(crate) builtin_classes: Vec<BuiltinClassDescriptor>,
    pub(crate) classes: Vec<ClassDescriptor>,
    pub(crate) children: Vec<Vec<ClassId>>,
    pub(crate) class_index: HashMap<String, ClassId>,
    pub(crate) singletons: Vec<SingletonDescriptor>,
    pub(crate) native_structures: Vec<NativeStructureDescriptor>,
}

/// A method reachable on a class, either declared there or inherited.
#[derive(Debug, Clone, Copy)]
pub struct Capability<'a> {
    /// The nearest class declaring the method.
    pub owner: ClassId,
    pub method: &'a MethodDescriptor,
}

impl ApiModel {
    pub fn header(&self) -> &EngineHeader {
        &self.header
    }

    pub fn build_configuration(&self) -> BuildConfiguration {
        self.build_configuration
    }

    pub fn global_constants(&self) -> &[ConstantDescriptor] {
        &self.global_constants
    }

    pub fn global_enums(&self) -> &[EnumDescriptor] {
        &self.global_enums
    }

    pub fn utility_functions(&self) -> &[UtilityFunctionDescriptor] {
        &self.utility_functions
    }

    pub fn builtin_classes(&self) -> &[BuiltinClassDescriptor] {
        &self.builtin_classes
    }

    /// Classes in canonical order; `classes()[id.index()]` is the class with `id`.
    pub fn classes(&self) -> &[ClassDescriptor] {
        &self.classes
    }

    pub fn singletons(&self) -> &[SingletonDescriptor] {
        &self.singletons
    }

    pub fn native_structures(&self) -> &[NativeStructureDescriptor] {
        &self.native_structures
    }

    pub fn builtin_class(&self, name: &str) -> Option<&BuiltinClassDescriptor> {
        self.builtin_classes
            .binary_search_by(|b| b.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.builtin_classes[i])
    }

    pub fn class(&self, name: &str) -> Option<&ClassDescriptor> {
        self.class_index.get(name).map(|&id| self.class_by_id(id))
    }

    pub fn class_by_id(&self, id: ClassId) -> &ClassDescriptor {
        &self.classes[id.index()]
    }

    pub fn global_enum(&self, name: &str) -> Option<&EnumDescriptor> {
        self.global_enums.iter().find(|e| e.name == name)
    }

    pub fn native_structure(&self, name: &str) -> Option<&NativeStructureDescriptor> {
        self.native_structures.iter().find(|s| s.name == name)
    }

    pub fn parent(&self, class: &ClassDescriptor) -> Option<&ClassDescriptor> {
        class.parent.map(|id| self.class_by_id(id))
    }

    pub fn children(&self, id: ClassId) -> impl Iterator<Item = &ClassDescriptor> {
        self.children
            .get(id.index())
            .into_iter()
            .flatten()
            .map(|&child| self.class_by_id(child))
    }

    /// The class itself followed by each ancestor up to the root.
    pub fn ancestry(&self, id: ClassId) -> impl Iterator<Item = &ClassDescriptor> {
        std::iter::successors(Some(self.class_by_id(id)), |class| self.parent(class))
    }

    pub fn is_subclass_of(&self, id: ClassId, ancestor: &str) -> bool {
        self.ancestry(id).any(|class| class.name == ancestor)
    }

    /// Every method callable on the class: its own plus all inherited ones,
    /// the nearest definition winning, sorted by method name.
    pub fn capabilities(&self, id: ClassId) -> Vec<Capability<'_>> {
        let mut by_name: BTreeMap<&str, Capability<'_>> = BTreeMap::new();
        for class in self.ancestry(id) {
            for method in &class.methods {
                by_name.entry(method.name.as_str()).or_insert(Capability {
                    owner: class.id,
                    method,
                });
            }
        }
        by_name.into_values().collect()
    }

    /// Enum declared on a class or builtin, looked up as `Owner.Enum`.
    pub fn scoped_enum(&self, owner: &str, name: &str) -> Option<&EnumDescriptor> {
        let enums = match self.class(owner) {
            Some(class) => &class.enums,
            None => &self.builtin_class(owner)?.enums,
        };
        enums.iter().find(|e| e.name == name)
    }
}
