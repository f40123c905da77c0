//! Global utility functions (`sin`, `print`, ...), bound by name and hash.

use crate::api::{ReturnValue, UtilityFunctionDescriptor};
use crate::error::TemplateError;
use crate::generator::templates::{
    Call, NameSet, default_docs, go_string, param_list, params, result_suffix, return_mapping,
};
use crate::generator::{Context, GeneratedArtifact, GoFile, OutputUnit};
use crate::resolve::GoPackage;
use crate::resolve::naming::to_pascal_case;

pub(crate) const TEMPLATE: &str = "utility_functions";
const PATH: &str = "pkg/gdutilfunc/utilityfunctions.gen.go";

const BINDINGS_VAR: &str = "globalUtilityFunctionBindings";

fn field_name(function: &str) -> String {
    format!("function{}", to_pascal_case(function))
}

pub(in crate::generator) fn render(cx: &Context<'_>) -> Result<Vec<GeneratedArtifact>, TemplateError> {
    let mut file = cx.go_file(GoPackage::UtilityFunctions);
    let functions = cx.api().utility_functions();
    let mut names = NameSet::new(TEMPLATE);
    names.claim("InitUtilityFunctions", "utility function bindings")?;

    let mut bindings = Vec::with_capacity(functions.len());
    for function in functions {
        let entity = format!("utility_functions.{}", function.name);
        let hash = function
            .hash
            .ok_or_else(|| TemplateError::new(TEMPLATE, &entity, "utility function has no hash"))?;
        bindings.push((field_name(&function.name), &function.name, hash));
    }

    let (ptr_type, lookup) = if bindings.is_empty() {
        (String::new(), String::new())
    } else {
        (file.ffi("GDExtensionPtrUtilityFunction"), file.runtime("LookupUtilityFunction"))
    };
    file.w.block(format!("var {BINDINGS_VAR} struct"), |w| {
        for (field, _, _) in &bindings {
            w.cells(&[field.as_str(), ptr_type.as_str()]);
        }
    });
    file.w.blank_line();
    file.w.comment("InitUtilityFunctions looks up every utility function. Call it once\nafter the interface is loaded.");
    file.w.block("func InitUtilityFunctions()", |w| {
        for (field, name, hash) in &bindings {
            w.line(format!("{BINDINGS_VAR}.{field} = {lookup}({}, {hash})", go_string(name)));
        }
    });
    file.w.blank_line();

    for function in functions {
        write_function(cx, &mut file, &mut names, function)?;
    }

    let content = file.finish(cx);
    Ok(vec![cx.artifact(OutputUnit::UtilityFunctions, TEMPLATE, PATH, content)])
}

fn write_function(
    cx: &Context<'_>,
    file: &mut GoFile,
    names: &mut NameSet,
    function: &UtilityFunctionDescriptor,
) -> Result<(), TemplateError> {
    let entity = format!("utility_functions.{}", function.name);
    let name = to_pascal_case(&function.name);
    names.claim(&name, &entity)?;

    let function_params = params(cx, TEMPLATE, &entity, &function.arguments)?;
    let ret = function.return_type.as_ref().map(|type_name| ReturnValue {
        type_name: type_name.clone(),
        meta: None,
    });
    let ret = return_mapping(cx, TEMPLATE, &entity, ret.as_ref())?;
    let list = param_list(file, &function_params, function.is_vararg);
    let result = result_suffix(file, ret);

    file.w.line(format!("// {name} calls the engine's `{}` ({}).", function.name, function.category));
    default_docs(file, &function_params);
    let field = field_name(&function.name);
    let call = Call {
        params: &function_params,
        ret,
        vararg: function.is_vararg,
    };
    file.block(format!("func {name}({list}){result}"), |file| {
        file.w.line(format!("fn := {BINDINGS_VAR}.{field}"));
        call.write(
            file,
            |file, args, ret| format!("{}(fn, {args}, {ret})", file.runtime("CallUtilityFunctionPtr")),
            |file, args| format!("{}(fn, {args})", file.runtime("CallUtilityFunctionVar")),
        );
    });
    file.w.blank_line();
    Ok(())
}
