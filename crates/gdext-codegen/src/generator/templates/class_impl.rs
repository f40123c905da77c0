//! Class implementations: impl structs embedding their parent's impl, method
//! bindings resolved at startup, ptrcall/varcall method bodies, default
//! virtual stubs, static functions, singleton accessors and `Ref` wrappers.

use crate::api::{ClassDescriptor, MethodDescriptor};
use crate::error::TemplateError;
use crate::generator::templates::{
    Call, NameSet, default_docs, go_string, param_list, params, result_suffix, return_mapping,
};
use crate::generator::{Context, GeneratedArtifact, GoFile, OutputUnit};
use crate::resolve::GoPackage;
use crate::resolve::naming::{method_name, to_camel_case, to_pascal_case};

pub(crate) const TEMPLATE: &str = "class_impl";
pub(crate) const REFS_TEMPLATE: &str = "class_refs";
const PATH: &str = "pkg/gdclassimpl/classes.gen.go";
const REFS_PATH: &str = "pkg/gdclassimpl/classes.refs.gen.go";

pub(super) fn impl_type(class: &str) -> String {
    format!("{class}Impl")
}

/// `NewNodeImplWithOwner`
pub(super) fn impl_constructor(class: &str) -> String {
    format!("New{class}ImplWithOwner")
}

fn bindings_var(class: &str) -> String {
    format!("global{class}MethodBindings")
}

fn bindings_type(class: &str) -> String {
    format!("{}MethodBindings", to_camel_case(class))
}

fn bindings_init(class: &str) -> String {
    format!("init{class}MethodBindings")
}

fn method_field(method: &str) -> String {
    format!("method{}", to_pascal_case(method))
}

/// Non-virtual methods are looked up by name and hash; virtual ones are
/// implemented on the Go side and never bound.
fn bound_methods(class: &ClassDescriptor) -> impl Iterator<Item = &MethodDescriptor> {
    class.methods.iter().filter(|m| !m.is_virtual)
}

pub(in crate::generator) fn render(cx: &Context<'_>) -> Result<Vec<GeneratedArtifact>, TemplateError> {
    let mut file = cx.go_file(GoPackage::ClassImpl);
    let mut functions = NameSet::new(TEMPLATE);

    for class in cx.api().classes() {
        write_class(cx, &mut file, &mut functions, class)?;
    }

    for singleton in cx.api().singletons() {
        let entity = format!("singletons.{}", singleton.name);
        let name = format!("Get{}", to_pascal_case(&singleton.name));
        functions.claim(&name, &entity)?;
        let lookup = file.runtime("GetSingleton");
        file.w.line(format!("// {name} returns the engine's {} singleton.", singleton.name));
        file.w.block(
            format!("func {name}() *{}", impl_type(&singleton.type_name)),
            |w| {
                w.line(format!(
                    "return {}({lookup}({}))",
                    impl_constructor(&singleton.type_name),
                    go_string(&singleton.name)
                ));
            },
        );
        file.w.blank_line();
    }

    functions.claim("InitMethodBindings", "class method bindings")?;
    file.w.comment(
        "InitMethodBindings looks up the method bind of every class method.\n\
         Call it once after the interface is loaded.",
    );
    file.w.block("func InitMethodBindings()", |w| {
        for class in cx.api().classes() {
            w.line(format!("{}()", bindings_init(&class.name)));
        }
    });

    let content = file.finish(cx);
    Ok(vec![cx.artifact(OutputUnit::ClassImpl, TEMPLATE, PATH, content)])
}

fn write_class(
    cx: &Context<'_>,
    file: &mut GoFile,
    functions: &mut NameSet,
    class: &ClassDescriptor,
) -> Result<(), TemplateError> {
    let owner = format!("classes.{}", class.name);
    let impl_name = impl_type(&class.name);
    let table = bindings_var(&class.name);
    let owner_ptr = file.ffi("GDExtensionObjectPtr");

    file.w.line(format!("// {impl_name} implements the {} interface.", class.name));
    match &class.inherits {
        Some(parent) => file.w.block(format!("type {impl_name} struct"), |w| w.line(impl_type(parent))),
        None => {
            file.w.block(format!("type {impl_name} struct"), |w| w.line(format!("owner {owner_ptr}")));
            file.w.blank_line();
            file.w.block(format!("func (cx *{impl_name}) Owner() {owner_ptr}"), |w| {
                w.line("return cx.owner");
            });
            file.w.blank_line();
            file.w.block(format!("func (cx *{impl_name}) SetOwner(owner {owner_ptr})"), |w| {
                w.line("cx.owner = owner");
            });
        }
    }
    file.w.blank_line();

    let constructor = impl_constructor(&class.name);
    functions.claim(&constructor, &owner)?;
    file.w.block(format!("func {constructor}(owner {owner_ptr}) *{impl_name}"), |w| {
        w.line(format!("cx := &{impl_name}{{}}"));
        w.line("cx.SetOwner(owner)");
        w.line("return cx");
    });
    file.w.blank_line();

    // method bind table
    let mut bindings = Vec::new();
    for method in bound_methods(class) {
        let entity = format!("{owner}.methods.{}", method.name);
        let hash = method
            .hash
            .ok_or_else(|| TemplateError::new(TEMPLATE, &entity, "method has no hash"))?;
        bindings.push((method_field(&method.name), &method.name, hash));
    }
    let bindings_type = bindings_type(&class.name);
    let (bind_type, lookup) = if bindings.is_empty() {
        (String::new(), String::new())
    } else {
        (file.ffi("GDExtensionMethodBindPtr"), file.runtime("LookupMethodBind"))
    };
    file.w.block(format!("type {bindings_type} struct"), |w| {
        for (field, _, _) in &bindings {
            w.cells(&[field.as_str(), bind_type.as_str()]);
        }
    });
    file.w.blank_line();
    file.w.line(format!("var {table} {bindings_type}"));
    file.w.blank_line();
    let class_name = go_string(&class.name);
    file.w.block(format!("func {}()", bindings_init(&class.name)), |w| {
        for (field, method, hash) in &bindings {
            w.line(format!(
                "{table}.{field} = {lookup}({class_name}, {}, {hash})",
                go_string(method)
            ));
        }
    });
    file.w.blank_line();

    for method in &class.methods {
        let entity = format!("{owner}.methods.{}", method.name);
        if method.is_virtual {
            write_virtual_stub(cx, file, &impl_name, method, &entity)?;
        } else {
            write_method(cx, file, functions, class, &table, method, &entity)?;
        }
    }
    Ok(())
}

fn write_method(
    cx: &Context<'_>,
    file: &mut GoFile,
    functions: &mut NameSet,
    class: &ClassDescriptor,
    table: &str,
    method: &MethodDescriptor,
    entity: &str,
) -> Result<(), TemplateError> {
    let method_params = params(cx, TEMPLATE, entity, &method.arguments)?;
    let ret = return_mapping(cx, TEMPLATE, entity, method.return_type())?;
    let list = param_list(file, &method_params, method.is_vararg);
    let result = result_suffix(file, ret);
    let name = method_name(&method.name, false);

    let (signature, base) = if method.is_static {
        let function = format!("{}{name}", class.name);
        functions.claim(&function, entity)?;
        (format!("func {function}({list}){result}"), "nil")
    } else {
        (
            format!("func (cx *{}) {name}({list}){result}", impl_type(&class.name)),
            "cx.Owner()",
        )
    };

    default_docs(file, &method_params);
    let field = method_field(&method.name);
    let call = Call {
        params: &method_params,
        ret,
        vararg: method.is_vararg,
    };
    file.block(signature, |file| {
        file.w.line(format!("mb := {table}.{field}"));
        call.write(
            file,
            |file, args, ret| format!("{}(mb, {base}, {args}, {ret})", file.runtime("CallMethodBindPtr")),
            |file, args| format!("{}(mb, {base}, {args})", file.runtime("CallMethodBindVar")),
        );
    });
    file.w.blank_line();
    Ok(())
}

/// A do-nothing override returning the zero value; user classes replace it.
fn write_virtual_stub(
    cx: &Context<'_>,
    file: &mut GoFile,
    impl_name: &str,
    method: &MethodDescriptor,
    entity: &str,
) -> Result<(), TemplateError> {
    let method_params = params(cx, TEMPLATE, entity, &method.arguments)?;
    let ret = return_mapping(cx, TEMPLATE, entity, method.return_type())?;
    let list = param_list(file, &method_params, method.is_vararg);
    let name = method_name(&method.name, true);

    match ret {
        Some(ret) => {
            let go_type = file.ty(ret);
            file.w.block(format!("func (cx *{impl_name}) {name}({list}) (ret {go_type})"), |w| {
                w.line("return");
            });
        }
        None => file.w.line(format!("func (cx *{impl_name}) {name}({list}) {{}}")),
    }
    file.w.blank_line();
    Ok(())
}

/// Counted-reference wrappers: construction takes a reference, `Unref`
/// releases it.
pub(in crate::generator) fn render_refs(cx: &Context<'_>) -> Result<Vec<GeneratedArtifact>, TemplateError> {
    let mut file = cx.go_file(GoPackage::ClassImpl);
    let mut functions = NameSet::new(REFS_TEMPLATE);

    for class in cx.api().classes().iter().filter(|c| c.is_refcounted) {
        let entity = format!("classes.{}", class.name);
        let wrapper = format!("Ref{}Impl", class.name);
        let constructor = format!("NewRef{}", class.name);
        functions.claim(&constructor, &entity)?;

        let class_type = file.qualify(GoPackage::Builtin, &class.name);
        let reference = file.runtime("ReferenceObject");
        let unreference = file.runtime("UnreferenceObject");

        file.w.line(format!(
            "// {wrapper} holds one counted reference to a {}; the zero value holds none.",
            class.name
        ));
        file.w.block(format!("type {wrapper} struct"), |w| w.line(format!("ptr {class_type}")));
        file.w.blank_line();
        file.w.block(format!("func {constructor}(ptr {class_type}) *{wrapper}"), |w| {
            w.block("if ptr != nil", |w| w.line(format!("{reference}(ptr.Owner())")));
            w.line(format!("return &{wrapper}{{ptr: ptr}}"));
        });
        file.w.blank_line();
        file.w.block(format!("func (cx *{wrapper}) IsValid() bool"), |w| {
            w.line("return cx != nil && cx.ptr != nil");
        });
        file.w.blank_line();
        file.w.block(format!("func (cx *{wrapper}) TypedPtr() {class_type}"), |w| {
            w.line("return cx.ptr");
        });
        file.w.blank_line();
        file.w.comment("Unref releases the reference. Further calls do nothing.");
        file.w.block(format!("func (cx *{wrapper}) Unref()"), |w| {
            w.block("if !cx.IsValid()", |w| w.line("return"));
            w.line(format!("{unreference}(cx.ptr.Owner())"));
            w.line("cx.ptr = nil");
        });
        file.w.blank_line();
    }

    let content = file.finish(cx);
    Ok(vec![cx.artifact(OutputUnit::ClassRefs, REFS_TEMPLATE, REFS_PATH, content)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names() {
        assert_eq!(impl_type("Node"), "NodeImpl");
        assert_eq!(impl_constructor("Node"), "NewNodeImplWithOwner");
        assert_eq!(bindings_type("RefCounted"), "refCountedMethodBindings");
        assert_eq!(bindings_var("RefCounted"), "globalRefCountedMethodBindings");
        assert_eq!(method_field("add_child"), "methodAddChild");
    }
}
