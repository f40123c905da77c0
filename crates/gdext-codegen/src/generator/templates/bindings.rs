//! Method-binding tables for builtin value types, filled once at startup.

use crate::api::BuiltinClassDescriptor;
use crate::error::TemplateError;
use crate::generator::templates::builtin::{
    bindings_var, constructor_field, getter_field, method_field, operator_field, setter_field,
    struct_builtins,
};
use crate::generator::templates::go_string;
use crate::generator::templates::variant::VariantTypes;
use crate::generator::{Context, GeneratedArtifact, GoFile, OutputUnit};
use crate::resolve::{GoPackage, TypeMapping};

pub(crate) const TEMPLATE: &str = "builtin_bindings";
const PATH: &str = "pkg/builtin/builtinclasses.bindings.gen.go";

pub(in crate::generator) fn render(cx: &Context<'_>) -> Result<Vec<GeneratedArtifact>, TemplateError> {
    let variant_types = VariantTypes::new(cx);
    let mut file = cx.go_file(GoPackage::Builtin);
    let mut inits = Vec::new();

    for (builtin, mapping) in struct_builtins(cx) {
        inits.push(write_table(cx, &mut file, &variant_types, builtin, mapping)?);
    }

    file.w.comment(
        "InitBuiltinMethodBindings looks up every builtin constructor, accessor,\n\
         operator and method. Call it once after the interface is loaded.",
    );
    file.w.block("func InitBuiltinMethodBindings()", |w| {
        for init in &inits {
            w.line(format!("{init}()"));
        }
    });

    let content = file.finish(cx);
    Ok(vec![cx.artifact(OutputUnit::BuiltinBindings, TEMPLATE, PATH, content)])
}

/// Write the table type, its global and its init function; returns the
/// init function's name.
fn write_table(
    cx: &Context<'_>,
    file: &mut GoFile,
    variant_types: &VariantTypes<'_>,
    builtin: &BuiltinClassDescriptor,
    mapping: &TypeMapping,
) -> Result<String, TemplateError> {
    let owner = format!("builtin_classes.{}", builtin.name);
    let target = mapping.target.as_str();
    let table = bindings_var(target);
    let table_type = format!("{}MethodBindings", lower_first(target));
    let init = format!("init{target}MethodBindings");
    let vt_constant = variant_types.constant(cx, TEMPLATE, &owner, &builtin.name)?;

    // (field, ffi type, lookup expression)
    let mut fields: Vec<(String, &str, String)> = Vec::new();

    for ctor in &builtin.constructors {
        fields.push((
            constructor_field(ctor.index),
            "GDExtensionPtrConstructor",
            format!("{}(vt, {})", file.runtime("LookupBuiltinConstructor"), ctor.index),
        ));
    }
    if builtin.has_destructor {
        fields.push((
            "destructor".to_string(),
            "GDExtensionPtrDestructor",
            format!("{}(vt)", file.runtime("LookupBuiltinDestructor")),
        ));
    }
    for member in &builtin.members {
        let name = go_string(&member.name);
        fields.push((
            getter_field(&member.name),
            "GDExtensionPtrGetter",
            format!("{}(vt, {name})", file.runtime("LookupBuiltinGetter")),
        ));
        fields.push((
            setter_field(&member.name),
            "GDExtensionPtrSetter",
            format!("{}(vt, {name})", file.runtime("LookupBuiltinSetter")),
        ));
    }
    if builtin.indexing_return_type.is_some() && !builtin.is_keyed {
        fields.push((
            "indexedGetter".to_string(),
            "GDExtensionPtrIndexedGetter",
            format!("{}(vt)", file.runtime("LookupBuiltinIndexedGetter")),
        ));
    }
    for op in &builtin.operators {
        let entity = format!("{owner}.operators.{}", op.name);
        let field = operator_field(op).map_err(|message| TemplateError::new(TEMPLATE, &entity, message))?;
        // unary operators take no right operand, which the engine spells NIL
        let right = op.right_type.as_deref().unwrap_or("Variant");
        let right_vt = file.ffi(variant_types.constant(cx, TEMPLATE, &entity, right)?);
        fields.push((
            field,
            "GDExtensionPtrOperatorEvaluator",
            format!(
                "{}({}, vt, {right_vt})",
                file.runtime("LookupBuiltinOperator"),
                go_string(&op.name)
            ),
        ));
    }
    for method in &builtin.methods {
        let entity = format!("{owner}.methods.{}", method.name);
        let hash = method
            .hash
            .ok_or_else(|| TemplateError::new(TEMPLATE, &entity, "builtin method has no hash"))?;
        fields.push((
            method_field(&method.name),
            "GDExtensionPtrBuiltInMethod",
            format!(
                "{}(vt, {}, {hash})",
                file.runtime("LookupBuiltinMethod"),
                go_string(&method.name)
            ),
        ));
    }

    let fields: Vec<(String, String, String)> = fields
        .into_iter()
        .map(|(field, ty, lookup)| (field, file.ffi(ty), lookup))
        .collect();
    let vt = (!fields.is_empty()).then(|| file.ffi(vt_constant));

    file.w.block(format!("type {table_type} struct"), |w| {
        for (field, ty, _) in &fields {
            w.cells(&[field.as_str(), ty.as_str()]);
        }
    });
    file.w.blank_line();
    file.w.line(format!("var {table} {table_type}"));
    file.w.blank_line();
    file.w.block(format!("func {init}()"), |w| {
        let Some(vt) = &vt else {
            return;
        };
        w.line(format!("vt := {vt}"));
        for (field, _, lookup) in &fields {
            w.line(format!("{table}.{field} = {lookup}"));
        }
    });
    file.w.blank_line();
    Ok(init)
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
