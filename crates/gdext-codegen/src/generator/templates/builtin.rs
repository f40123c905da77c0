//! Builtin value types: opaque sized structs with their members,
//! constructors, destructor, operators and methods.

use crate::api::{BuiltinClassDescriptor, OperatorDescriptor};
use crate::error::TemplateError;
use crate::generator::templates::{Call, NameSet, Param, default_docs, param_list, params, result_suffix, return_mapping};
use crate::generator::{Context, GeneratedArtifact, GoFile, OutputUnit};
use crate::resolve::naming::{method_name, to_camel_case, to_pascal_case};
use crate::resolve::{GoPackage, TypeKind, TypeMapping};

pub(crate) const TEMPLATE: &str = "builtin_classes";
const PATH: &str = "pkg/builtin/builtinclasses.gen.go";

/// Builtins generated as Go structs, with their mapping. Primitive builtins
/// (`int`, `bool`, ...) map to Go types and are skipped.
pub(super) fn struct_builtins<'a>(
    cx: &Context<'a>,
) -> impl Iterator<Item = (&'a BuiltinClassDescriptor, &'a TypeMapping)> + use<'a> {
    let model = cx.model;
    cx.api().builtin_classes().iter().filter_map(move |builtin| {
        let mapping = model.mapping(&builtin.name, None)?;
        (mapping.kind == TypeKind::Builtin).then_some((builtin, mapping))
    })
}

/// Name of the package-level method-binding table for a builtin.
pub(super) fn bindings_var(target: &str) -> String {
    format!("global{target}MethodBindings")
}

pub(super) fn constructor_field(index: u32) -> String {
    format!("constructor{index}")
}

pub(super) fn method_field(method: &str) -> String {
    format!("method{}", to_pascal_case(method))
}

pub(super) fn getter_field(member: &str) -> String {
    format!("member{}Getter", to_pascal_case(member))
}

pub(super) fn setter_field(member: &str) -> String {
    format!("member{}Setter", to_pascal_case(member))
}

/// `operatorAddVector2`, `operatorNegate`.
pub(super) fn operator_field(op: &OperatorDescriptor) -> Result<String, String> {
    Ok(to_camel_case(&operator_method(op)?))
}

/// Go method name for an operator: `OperatorAddVector2`.
pub(super) fn operator_method(op: &OperatorDescriptor) -> Result<String, String> {
    let word = operator_word(&op.name).ok_or_else(|| format!("unknown operator `{}`", op.name))?;
    let right = op.right_type.as_deref().map(to_pascal_case).unwrap_or_default();
    Ok(format!("Operator{word}{right}"))
}

fn operator_word(symbol: &str) -> Option<&'static str> {
    Some(match symbol {
        "==" => "Equal",
        "!=" => "NotEqual",
        "<" => "Less",
        "<=" => "LessEqual",
        ">" => "Greater",
        ">=" => "GreaterEqual",
        "+" => "Add",
        "-" => "Subtract",
        "*" => "Multiply",
        "/" => "Divide",
        "unary-" => "Negate",
        "unary+" => "Positive",
        "%" => "Module",
        "**" => "Power",
        "<<" => "ShiftLeft",
        ">>" => "ShiftRight",
        "&" => "BitAnd",
        "|" => "BitOr",
        "^" => "BitXor",
        "~" => "BitNegate",
        "and" => "And",
        "or" => "Or",
        "xor" => "Xor",
        "not" => "Not",
        "in" => "In",
        _ => return None,
    })
}

/// `NewVector2`, `NewVector2WithFloatFloat`.
pub(super) fn constructor_name(target: &str, argument_types: &[&str]) -> String {
    if argument_types.is_empty() {
        return format!("New{target}");
    }
    let types: String = argument_types.iter().map(|t| to_pascal_case(t)).collect();
    format!("New{target}With{types}")
}

pub(in crate::generator) fn render(cx: &Context<'_>) -> Result<Vec<GeneratedArtifact>, TemplateError> {
    let mut file = cx.go_file(GoPackage::Builtin);
    let mut functions = NameSet::new(TEMPLATE);

    for (builtin, mapping) in struct_builtins(cx) {
        write_builtin(cx, &mut file, &mut functions, builtin, mapping)?;
    }

    let content = file.finish(cx);
    Ok(vec![cx.artifact(OutputUnit::BuiltinClasses, TEMPLATE, PATH, content)])
}

fn write_builtin(
    cx: &Context<'_>,
    file: &mut GoFile,
    functions: &mut NameSet,
    builtin: &BuiltinClassDescriptor,
    mapping: &TypeMapping,
) -> Result<(), TemplateError> {
    let owner = format!("builtin_classes.{}", builtin.name);
    let target = mapping.target.as_str();
    let table = bindings_var(target);
    let mut methods = NameSet::new(TEMPLATE);

    let type_ptr = file.ffi("GDExtensionTypePtr");
    let const_type_ptr = file.ffi("GDExtensionConstTypePtr");
    file.import_std("unsafe");

    file.w.line(format!(
        "// {target} is the engine's {} value, {} bytes wide.",
        builtin.name, builtin.size
    ));
    file.w.block(format!("type {target} struct"), |w| {
        w.line(format!("opaque [{}]uint8", builtin.size));
    });
    file.w.blank_line();
    file.w.block(format!("func (cx *{target}) nativePtr() {type_ptr}"), |w| {
        w.line(format!("return ({type_ptr})(unsafe.Pointer(&cx.opaque))"));
    });
    file.w.blank_line();
    file.w.block(format!("func (cx *{target}) nativeConstPtr() {const_type_ptr}"), |w| {
        w.line(format!("return ({const_type_ptr})(unsafe.Pointer(&cx.opaque))"));
    });
    file.w.blank_line();

    // constructors
    let mut has_default_constructor = false;
    for ctor in &builtin.constructors {
        let entity = format!("{owner}.constructors[{}]", ctor.index);
        let ctor_params = params(cx, TEMPLATE, &entity, &ctor.arguments)?;
        let types: Vec<&str> = ctor.arguments.iter().map(|a| a.type_name.as_str()).collect();
        let name = constructor_name(target, &types);
        functions.claim(&name, &entity)?;
        has_default_constructor |= ctor.arguments.is_empty();

        let list = param_list(file, &ctor_params, false);
        let construct = file.runtime("CallBuiltinConstructor");
        let call = Call {
            params: &ctor_params,
            ret: None,
            vararg: false,
        };
        file.block(format!("func {name}({list}) {target}"), |file| {
            file.w.line(format!("var cx {target}"));
            let args = call.write_args(file);
            file.w.line(format!(
                "{construct}({table}.{}, cx.nativePtr(), {args})",
                constructor_field(ctor.index)
            ));
            file.w.line("return cx");
        });
        file.w.blank_line();
    }

    if builtin.has_destructor {
        let destroy = file.runtime("CallBuiltinDestructor");
        methods.claim("Destroy", &format!("{owner}.destructor"))?;
        file.w.line("// Destroy releases the engine-side storage of the value.");
        file.w.block(format!("func (cx *{target}) Destroy()"), |w| {
            w.line(format!("{destroy}({table}.destructor, cx.nativePtr())"));
        });
        file.w.blank_line();

        if has_default_constructor {
            let with = format!("With{target}");
            functions.claim(&with, &format!("{owner}.destructor"))?;
            file.w.line(format!(
                "// {with} runs fn with a default {target} destroyed when fn returns."
            ));
            file.w.block(format!("func {with}(fn func(*{target}))"), |w| {
                w.line(format!("cx := {}()", constructor_name(target, &[])));
                w.line("defer cx.Destroy()");
                w.line("fn(&cx)");
            });
            file.w.blank_line();
        }
    }

    for member in &builtin.members {
        let entity = format!("{owner}.members.{}", member.name);
        let member_type = cx.mapping(TEMPLATE, &entity, &member.type_name, None)?;
        let getter = format!("Get{}", to_pascal_case(&member.name));
        let setter = format!("Set{}", to_pascal_case(&member.name));
        methods.claim(&getter, &entity)?;
        methods.claim(&setter, &entity)?;

        let go_type = file.ty(member_type);
        let slot = file.new_return_slot(member_type);
        let decoded = file.decode(member_type, "ret");
        let encoded = file.encode_arg(member_type, "value");
        let get = file.runtime("CallBuiltinGetter");
        let set = file.runtime("CallBuiltinSetter");

        file.w.block(format!("func (cx *{target}) {getter}() {go_type}"), |w| {
            w.line(format!("ret := {slot}"));
            w.line(format!(
                "{get}({table}.{}, cx.nativeConstPtr(), ret)",
                getter_field(&member.name)
            ));
            w.line(format!("return {decoded}"));
        });
        file.w.blank_line();
        file.w.block(format!("func (cx *{target}) {setter}(value {go_type})"), |w| {
            w.line(format!(
                "{set}({table}.{}, cx.nativePtr(), {encoded})",
                setter_field(&member.name)
            ));
        });
        file.w.blank_line();
    }

    if let (Some(indexed), false) = (&builtin.indexing_return_type, builtin.is_keyed) {
        let entity = format!("{owner}.indexing_return_type");
        let element = cx.mapping(TEMPLATE, &entity, indexed, None)?;
        methods.claim("Index", &entity)?;
        let go_type = file.ty(element);
        let slot = file.new_return_slot(element);
        let decoded = file.decode(element, "ret");
        let get = file.runtime("CallBuiltinIndexedGetter");
        file.w.block(format!("func (cx *{target}) Index(index int64) {go_type}"), |w| {
            w.line(format!("ret := {slot}"));
            w.line(format!("{get}({table}.indexedGetter, cx.nativeConstPtr(), index, ret)"));
            w.line(format!("return {decoded}"));
        });
        file.w.blank_line();
    }

    for op in &builtin.operators {
        let entity = format!("{owner}.operators.{}", op.name);
        write_operator(cx, file, &mut methods, target, &table, op, &entity)?;
    }

    for method in &builtin.methods {
        let entity = format!("{owner}.methods.{}", method.name);
        let method_params = params(cx, TEMPLATE, &entity, &method.arguments)?;
        let ret = return_mapping(cx, TEMPLATE, &entity, method.return_type())?;
        let field = method_field(&method.name);

        let list = param_list(file, &method_params, method.is_vararg);
        let result = result_suffix(file, ret);
        let (signature, base) = if method.is_static {
            let name = format!("{target}{}", method_name(&method.name, false));
            functions.claim(&name, &entity)?;
            (format!("func {name}({list}){result}"), "nil")
        } else {
            let name = method_name(&method.name, false);
            methods.claim(&name, &entity)?;
            (format!("func (cx *{target}) {name}({list}){result}"), "cx.nativePtr()")
        };

        default_docs(file, &method_params);
        let call = Call {
            params: &method_params,
            ret,
            vararg: method.is_vararg,
        };
        file.block(signature, |file| {
            file.w.line(format!("mb := {table}.{field}"));
            call.write(
                file,
                |file, args, ret| format!("{}(mb, {base}, {args}, {ret})", file.runtime("CallBuiltinMethodPtr")),
                |file, args| format!("{}(mb, {base}, {args})", file.runtime("CallBuiltinMethodVar")),
            );
        });
        file.w.blank_line();
    }
    Ok(())
}

fn write_operator(
    cx: &Context<'_>,
    file: &mut GoFile,
    methods: &mut NameSet,
    target: &str,
    table: &str,
    op: &OperatorDescriptor,
    entity: &str,
) -> Result<(), TemplateError> {
    let name = operator_method(op).map_err(|message| TemplateError::new(TEMPLATE, entity, message))?;
    let field = operator_field(op).map_err(|message| TemplateError::new(TEMPLATE, entity, message))?;
    methods.claim(&name, entity)?;

    let ret = cx.mapping(TEMPLATE, entity, &op.return_type, None)?;
    let result = file.ty(ret);
    let slot = file.new_return_slot(ret);
    let decoded = file.decode(ret, "ret");
    let evaluate = file.runtime("CallBuiltinOperatorPtr");

    let (list, right) = match &op.right_type {
        Some(right_type) => {
            let right = cx.mapping(TEMPLATE, entity, right_type, None)?;
            let param = Param {
                native: "right",
                ident: "right".to_string(),
                mapping: right,
                default_value: None,
            };
            let list = param_list(file, std::slice::from_ref(&param), false);
            (list, file.encode_arg(right, "right"))
        }
        None => (String::new(), "nil".to_string()),
    };

    file.w.block(format!("func (cx *{target}) {name}({list}) {result}"), |w| {
        w.line(format!("ret := {slot}"));
        w.line(format!("{evaluate}({table}.{field}, cx.nativeConstPtr(), {right}, ret)"));
        w.line(format!("return {decoded}"));
    });
    file.w.blank_line();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(name: &str, right: Option<&str>) -> OperatorDescriptor {
        OperatorDescriptor {
            name: name.to_string(),
            right_type: right.map(str::to_string),
            return_type: "bool".to_string(),
        }
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(operator_method(&op("+", Some("Vector2"))).unwrap(), "OperatorAddVector2");
        assert_eq!(operator_method(&op("unary-", None)).unwrap(), "OperatorNegate");
        assert_eq!(operator_field(&op("==", Some("Variant"))).unwrap(), "operatorEqualVariant");
        assert!(operator_method(&op("<=>", None)).is_err());
    }

    #[test]
    fn test_constructor_names() {
        assert_eq!(constructor_name("Vector2", &[]), "NewVector2");
        assert_eq!(
            constructor_name("Vector2", &["float", "float"]),
            "NewVector2WithFloatFloat"
        );
        assert_eq!(constructor_name("Vector2", &["Vector2i"]), "NewVector2WithVector2i");
    }
}
