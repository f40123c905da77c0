//! Validation and canonical ordering of a deserialized descriptor.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::api::descriptor::{
    ApiDescriptor, Argument, BuildConfiguration, ClassDescriptor, ClassId, EnumDescriptor,
    MethodDescriptor, ReturnValue, SizeTable,
};
use crate::api::model::ApiModel;
use crate::api::native_structure::parse_format;
use crate::error::SchemaError;

/// Name of the single root of the class tree.
pub const ROOT_CLASS: &str = "Object";

/// Builtins the engine reports without a storage size of their own.
const PRIMITIVE_BUILTINS: &[&str] = &["Nil", "bool", "int", "float"];

/// Deserialize descriptor text and validate it into an [`ApiModel`].
pub fn load_api(source: &str, build: BuildConfiguration) -> Result<ApiModel, SchemaError> {
    let descriptor: ApiDescriptor = serde_json::from_str(source)?;
    build_model(descriptor, build)
}

fn build_model(
    mut api: ApiDescriptor,
    build: BuildConfiguration,
) -> Result<ApiModel, SchemaError> {
    unique_names("global_constants", api.global_constants.iter().map(|c| &c.name))?;
    unique_names("global_enums", api.global_enums.iter().map(|e| &e.name))?;
    unique_names("utility_functions", api.utility_functions.iter().map(|f| &f.name))?;
    unique_names("builtin_classes", api.builtin_classes.iter().map(|b| &b.name))?;
    unique_names("classes", api.classes.iter().map(|c| &c.name))?;
    unique_names("singletons", api.singletons.iter().map(|s| &s.name))?;
    unique_names("native_structures", api.native_structures.iter().map(|s| &s.name))?;

    for e in &api.global_enums {
        check_enum(&format!("global_enums.{}", e.name), e)?;
    }

    for f in &api.utility_functions {
        check_arguments(&format!("utility_functions.{}", f.name), &f.arguments)?;
    }

    let sizes = size_table(
        &api.builtin_class_sizes,
        !api.builtin_classes.is_empty(),
        build,
    )?;
    for builtin in &mut api.builtin_classes {
        let path = format!("builtin_classes.{}", builtin.name);
        builtin.size = match sizes.get(builtin.name.as_str()) {
            Some(&size) => size,
            None if PRIMITIVE_BUILTINS.contains(&builtin.name.as_str()) => 0,
            None => {
                return Err(SchemaError::invalid(
                    path,
                    format!("missing from the {build} size table"),
                ));
            }
        };
        for e in &builtin.enums {
            check_enum(&format!("{path}.enums.{}", e.name), e)?;
        }
        unique_names(&format!("{path}.methods"), builtin.methods.iter().map(|m| &m.name))?;
        for method in &mut builtin.methods {
            normalize_method(&format!("{path}.methods.{}", method.name), method)?;
        }
        for ctor in &builtin.constructors {
            check_arguments(&format!("{path}.constructors[{}]", ctor.index), &ctor.arguments)?;
        }
        builtin.constants.sort_by(|a, b| a.name.cmp(&b.name));
        builtin.enums.sort_by(|a, b| a.name.cmp(&b.name));
        builtin.methods.sort_by(|a, b| a.name.cmp(&b.name));
        builtin.constructors.sort_by_key(|c| c.index);
    }

    for class in &mut api.classes {
        let path = format!("classes.{}", class.name);
        for e in &class.enums {
            check_enum(&format!("{path}.enums.{}", e.name), e)?;
        }
        unique_names(&format!("{path}.methods"), class.methods.iter().map(|m| &m.name))?;
        for method in &mut class.methods {
            normalize_method(&format!("{path}.methods.{}", method.name), method)?;
        }
        for signal in &class.signals {
            check_arguments(&format!("{path}.signals.{}", signal.name), &signal.arguments)?;
        }
        class.constants.sort_by(|a, b| a.name.cmp(&b.name));
        class.enums.sort_by(|a, b| a.name.cmp(&b.name));
        class.methods.sort_by(|a, b| a.name.cmp(&b.name));
        class.signals.sort_by(|a, b| a.name.cmp(&b.name));
        class.properties.sort_by(|a, b| a.name.cmp(&b.name));
    }

    for structure in &mut api.native_structures {
        structure.fields = parse_format(&structure.format).map_err(|message| {
            SchemaError::invalid(format!("native_structures.{}.format", structure.name), message)
        })?;
    }

    let (classes, children, class_index) = arrange_classes(std::mem::take(&mut api.classes))?;

    api.global_constants.sort_by(|a, b| a.name.cmp(&b.name));
    api.global_enums.sort_by(|a, b| a.name.cmp(&b.name));
    api.utility_functions.sort_by(|a, b| a.name.cmp(&b.name));
    api.builtin_classes.sort_by(|a, b| a.name.cmp(&b.name));
    api.singletons.sort_by(|a, b| a.name.cmp(&b.name));
    api.native_structures.sort_by(|a, b| a.name.cmp(&b.name));

    debug!(
        builtin_classes = api.builtin_classes.len(),
        classes = classes.len(),
        global_enums = api.global_enums.len(),
        utility_functions = api.utility_functions.len(),
        native_structures = api.native_structures.len(),
        "validated API descriptor"
    );

    Ok(ApiModel {
        header: api.header,
        build_configuration: build,
        global_constants: api.global_constants,
        global_enums: api.global_enums,
        utility_functions: api.utility_functions,
        builtin_classes: api.builtin_classes,
        classes,
        children,
        class_index,
        singletons: api.singletons,
        native_structures: api.native_structures,
    })
}

fn unique_names<'a>(
    path: &str,
    names: impl Iterator<Item = &'a String>,
) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(SchemaError::invalid(path, "entry with an empty name"));
        }
        if !seen.insert(name) {
            return Err(SchemaError::invalid(format!("{path}.{name}"), "duplicate name"));
        }
    }
    Ok(())
}

fn check_enum(path: &str, e: &EnumDescriptor) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for value in &e.values {
        if !seen.insert(&value.name) {
            return Err(SchemaError::invalid(
                format!("{path}.values.{}", value.name),
                "duplicate enum member name",
            ));
        }
    }
    Ok(())
}

fn check_arguments(path: &str, arguments: &[Argument]) -> Result<(), SchemaError> {
    for (i, arg) in arguments.iter().enumerate() {
        let arg_path = || format!("{path}.arguments[{i}]");
        if arg.name.trim().is_empty() {
            return Err(SchemaError::invalid(arg_path(), "argument has no name"));
        }
        if arg.type_name.trim().is_empty() {
            return Err(SchemaError::invalid(
                arg_path(),
                format!("argument `{}` has no type", arg.name),
            ));
        }
    }
    Ok(())
}

/// Fold a builtin method's bare `return_type` into `return_value`, treating
/// `void`/`Nil` as no return value.
fn normalize_method(path: &str, method: &mut MethodDescriptor) -> Result<(), SchemaError> {
    check_arguments(path, &method.arguments)?;
    if let Some(type_name) = method.return_type.take() {
        if method.return_value.is_some() {
            return Err(SchemaError::invalid(
                path,
                "both `return_type` and `return_value` are present",
            ));
        }
        method.return_value = Some(ReturnValue {
            type_name,
            meta: None,
        });
    }
    if let Some(ret) = &method.return_value {
        if ret.type_name.trim().is_empty() {
            return Err(SchemaError::invalid(format!("{path}.return_value"), "empty return type"));
        }
        if ret.type_name == "void" || ret.type_name == "Nil" {
            method.return_value = None;
        }
    }
    Ok(())
}

fn size_table(
    tables: &[SizeTable],
    required: bool,
    build: BuildConfiguration,
) -> Result<HashMap<&str, usize>, SchemaError> {
    if !required {
        return Ok(HashMap::new());
    }
    let table = tables
        .iter()
        .find(|t| t.build_configuration == build.as_str())
        .ok_or_else(|| {
            SchemaError::invalid(
                "builtin_class_sizes",
                format!("no size table for build configuration {build}"),
            )
        })?;
    Ok(table.sizes.iter().map(|s| (s.name.as_str(), s.size)).collect())
}

type Arranged = (Vec<ClassDescriptor>, Vec<Vec<ClassId>>, HashMap<String, ClassId>);

/// Check the inheritance tree and put classes into the arena, parents before
/// children and siblings by name.
fn arrange_classes(classes: Vec<ClassDescriptor>) -> Result<Arranged, SchemaError> {
    let mut by_name: BTreeMap<String, ClassDescriptor> =
        classes.into_iter().map(|c| (c.name.clone(), c)).collect();

    let mut roots = Vec::new();
    let mut children_of: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for class in by_name.values() {
        match class.inherits.as_deref() {
            None | Some("") => roots.push(class.name.as_str()),
            Some(parent) if by_name.contains_key(parent) => {
                children_of.entry(parent).or_default().push(&class.name);
            }
            Some(parent) => {
                return Err(SchemaError::invalid(
                    format!("classes.{}.inherits", class.name),
                    format!("unknown parent class `{parent}`"),
                ));
            }
        }
    }

    match roots.as_slice() {
        [] if by_name.is_empty() => {}
        [] => {
            let first = by_name.keys().next().map(String::as_str).unwrap_or_default();
            return Err(SchemaError::invalid(
                format!("classes.{first}"),
                "inheritance cycle: no root class",
            ));
        }
        [root] if *root == ROOT_CLASS => {}
        [root] => {
            return Err(SchemaError::invalid(
                format!("classes.{root}"),
                format!("root class must be `{ROOT_CLASS}`"),
            ));
        }
        [_, second, ..] => {
            let extra = if *second == ROOT_CLASS { roots[0] } else { *second };
            return Err(SchemaError::invalid(
                format!("classes.{extra}"),
                format!("class has no parent but `{ROOT_CLASS}` is the only root"),
            ));
        }
    }

    // names sort before their children in `ready`, so this is the smallest
    // topological order
    let mut order: Vec<String> = Vec::with_capacity(by_name.len());
    let mut ready: BTreeSet<&str> = roots.iter().copied().collect();
    while let Some(name) = ready.pop_first() {
        order.push(name.to_string());
        if let Some(children) = children_of.get(name) {
            ready.extend(children.iter().copied());
        }
    }

    if order.len() != by_name.len() {
        let placed: HashSet<&str> = order.iter().map(String::as_str).collect();
        let stuck = by_name
            .keys()
            .find(|name| !placed.contains(name.as_str()))
            .map(String::as_str)
            .unwrap_or_default();
        return Err(SchemaError::invalid(
            format!("classes.{stuck}.inherits"),
            "inheritance cycle",
        ));
    }

    let class_index: HashMap<String, ClassId> = order
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), ClassId(i)))
        .collect();

    let mut arena = Vec::with_capacity(order.len());
    let mut children = vec![Vec::new(); order.len()];
    for (i, name) in order.iter().enumerate() {
        let Some(mut class) = by_name.remove(name) else {
            continue;
        };
        class.id = ClassId(i);
        class.parent = class
            .inherits
            .as_deref()
            .and_then(|parent| class_index.get(parent))
            .copied();
        if let Some(parent) = class.parent {
            children[parent.index()].push(class.id);
        }
        arena.push(class);
    }

    Ok((arena, children, class_index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(json: &str) -> Result<ApiModel, SchemaError> {
        load_api(json, BuildConfiguration::Float64)
    }

    // ── class tree ──

    #[test]
    fn test_classes_parent_before_child() {
        let model = load(
            r#"{"classes": [
                {"name": "Sprite2D", "inherits": "Node2D"},
                {"name": "Node2D", "inherits": "Node"},
                {"name": "Node", "inherits": "Object"},
                {"name": "Object"},
                {"name": "Area2D", "inherits": "Node2D"}
            ]}"#,
        )
        .unwrap();
        let names: Vec<_> = model.classes().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Object", "Node", "Node2D", "Area2D", "Sprite2D"]);

        let sprite = model.class("Sprite2D").unwrap();
        let ancestry: Vec<_> = model.ancestry(sprite.id).map(|c| c.name.as_str()).collect();
        assert_eq!(ancestry, vec!["Sprite2D", "Node2D", "Node", "Object"]);
        assert!(model.is_subclass_of(sprite.id, "Node"));

        let node2d = model.class("Node2D").unwrap();
        let children: Vec<_> = model.children(node2d.id).map(|c| c.name.as_str()).collect();
        assert_eq!(children, vec!["Area2D", "Sprite2D"]);
    }

    #[test]
    fn test_unknown_parent() {
        let err = load(r#"{"classes": [{"name": "Object"}, {"name": "Node", "inherits": "Nod"}]}"#)
            .unwrap_err();
        assert_eq!(err.path(), Some("classes.Node.inherits"));
        assert!(err.to_string().contains("`Nod`"));
    }

    #[test]
    fn test_inheritance_cycle() {
        let err = load(
            r#"{"classes": [{"name": "Object"},
                {"name": "A", "inherits": "B"}, {"name": "B", "inherits": "A"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("inheritance cycle"));
    }

    #[test]
    fn test_single_root_named_object() {
        let err = load(r#"{"classes": [{"name": "Thing"}]}"#).unwrap_err();
        assert_eq!(err.path(), Some("classes.Thing"));

        let err = load(r#"{"classes": [{"name": "Object"}, {"name": "Other"}]}"#).unwrap_err();
        assert_eq!(err.path(), Some("classes.Other"));
    }

    #[test]
    fn test_capabilities_nearest_definition_wins() {
        let model = load(
            r#"{"classes": [
                {"name": "Object", "methods": [{"name": "free"}, {"name": "to_string"}]},
                {"name": "Node", "inherits": "Object", "methods": [{"name": "to_string"}, {"name": "add_child"}]}
            ]}"#,
        )
        .unwrap();
        let node = model.class("Node").unwrap();
        let caps: Vec<_> = model
            .capabilities(node.id)
            .into_iter()
            .map(|c| (c.method.name.as_str(), model.class_by_id(c.owner).name.as_str()))
            .collect();
        assert_eq!(
            caps,
            vec![("add_child", "Node"), ("free", "Object"), ("to_string", "Node")]
        );
    }

    // ── entity validation ──

    #[test]
    fn test_duplicate_enum_member() {
        let err = load(
            r#"{"global_enums": [{"name": "Side", "values": [
                {"name": "SIDE_LEFT", "value": 0}, {"name": "SIDE_LEFT", "value": 1}]}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.path(), Some("global_enums.Side.values.SIDE_LEFT"));
    }

    #[test]
    fn test_enum_value_aliases_allowed() {
        let model = load(
            r#"{"global_enums": [{"name": "Flags", "values": [
                {"name": "A", "value": 1}, {"name": "B", "value": 1}]}]}"#,
        )
        .unwrap();
        assert_eq!(model.global_enums()[0].values.len(), 2);
    }

    #[test]
    fn test_argument_without_type_names_path() {
        let err = load(
            r#"{"classes": [{"name": "Object", "methods": [
                {"name": "call", "arguments": [{"name": "method", "type": "StringName"}, {"name": "arg", "type": ""}]}]}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.path(), Some("classes.Object.methods.call.arguments[1]"));
    }

    #[test]
    fn test_missing_field_is_a_json_error() {
        let err = load(r#"{"global_enums": [{"values": []}]}"#).unwrap_err();
        assert!(matches!(err, SchemaError::Json(_)));
    }

    #[test]
    fn test_builtin_sizes_and_return_type() {
        let model = load(
            r#"{
              "builtin_class_sizes": [
                {"build_configuration": "float_32", "sizes": [{"name": "Vector2", "size": 8}]},
                {"build_configuration": "float_64", "sizes": [{"name": "Vector2", "size": 8}, {"name": "String", "size": 8}]}
              ],
              "builtin_classes": [
                {"name": "Vector2", "methods": [{"name": "length", "return_type": "float"}, {"name": "normalize", "return_type": "void"}]},
                {"name": "int"}
              ]
            }"#,
        )
        .unwrap();
        let vector2 = model.builtin_class("Vector2").unwrap();
        assert_eq!(vector2.size, 8);
        assert_eq!(vector2.methods[0].return_type().unwrap().type_name, "float");
        assert!(vector2.methods[1].return_type().is_none());
        assert_eq!(model.builtin_class("int").unwrap().size, 0);
    }

    #[test]
    fn test_builtin_missing_from_size_table() {
        let err = load(
            r#"{"builtin_class_sizes": [{"build_configuration": "float_64", "sizes": []}],
                "builtin_classes": [{"name": "Vector2"}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.path(), Some("builtin_classes.Vector2"));
    }

    #[test]
    fn test_native_structure_format_error() {
        let err = load(r#"{"native_structures": [{"name": "Broken", "format": "float"}]}"#)
            .unwrap_err();
        assert_eq!(err.path(), Some("native_structures.Broken.format"));
    }
}
