//! Go interfaces for engine classes and their reference-counted wrappers.
//!
//! Each class interface embeds its parent's interface and lists the methods
//! the class itself declares, so the full method set of `Node` is `Node`'s
//! own methods plus everything `Object` declares. Static methods are not part
//! of the interface; they become package functions in `gdclassimpl`.

use crate::api::ClassDescriptor;
use crate::error::TemplateError;
use crate::generator::templates::{NameSet, param_list, params, result_suffix, return_mapping};
use crate::generator::{Context, GeneratedArtifact, GoFile, OutputUnit};
use crate::resolve::GoPackage;
use crate::resolve::naming::method_name;

pub(crate) const TEMPLATE: &str = "class_interfaces";
pub(crate) const REFS_TEMPLATE: &str = "class_ref_interfaces";
const PATH: &str = "pkg/builtin/classes.interfaces.gen.go";
const REFS_PATH: &str = "pkg/builtin/classes.ref.interfaces.gen.go";

/// Methods every object exposes for its engine-side handle.
pub(super) const OWNER_METHODS: [&str; 2] = ["Owner", "SetOwner"];

pub(in crate::generator) fn render(cx: &Context<'_>) -> Result<Vec<GeneratedArtifact>, TemplateError> {
    let mut file = cx.go_file(GoPackage::Builtin);

    for class in cx.api().classes() {
        write_interface(cx, &mut file, class)?;
    }

    let encoders: Vec<&ClassDescriptor> = cx.api().classes().iter().filter(|c| !c.is_refcounted).collect();
    if !encoders.is_empty() {
        file.w.group("var", |w| {
            for class in &encoders {
                w.cells(&[format!("{}Encoder", class.name), format!("= ClassEncoder[{}]{{}}", class.name)]);
            }
        });
    }

    let content = file.finish(cx);
    Ok(vec![cx.artifact(OutputUnit::ClassInterfaces, TEMPLATE, PATH, content)])
}

fn write_interface(cx: &Context<'_>, file: &mut GoFile, class: &ClassDescriptor) -> Result<(), TemplateError> {
    let owner = format!("classes.{}", class.name);
    let mut names = NameSet::new(TEMPLATE);
    for name in OWNER_METHODS {
        names.claim(name, &format!("{owner} handle"))?;
    }

    let mut lines = Vec::new();
    for method in class.methods.iter().filter(|m| !m.is_static) {
        let entity = format!("{owner}.methods.{}", method.name);
        let name = method_name(&method.name, method.is_virtual);
        names.claim(&name, &entity)?;
        let method_params = params(cx, TEMPLATE, &entity, &method.arguments)?;
        let ret = return_mapping(cx, TEMPLATE, &entity, method.return_type())?;
        let list = param_list(file, &method_params, method.is_vararg);
        let result = result_suffix(file, ret);
        lines.push(format!("{name}({list}){result}"));
    }

    let owner_ptr = file.ffi("GDExtensionObjectPtr");
    file.w.line(format!("// {} is the engine class {}.", class.name, class.name));
    file.w.block(format!("type {} interface", class.name), |w| {
        match &class.inherits {
            Some(parent) => w.line(parent),
            None => {
                w.line(format!("Owner() {owner_ptr}"));
                w.line(format!("SetOwner(owner {owner_ptr})"));
            }
        }
        for line in &lines {
            w.line(line);
        }
    });
    file.w.blank_line();
    Ok(())
}

/// `Ref<Class>` interfaces and their encoders for every refcounted class.
pub(in crate::generator) fn render_refs(cx: &Context<'_>) -> Result<Vec<GeneratedArtifact>, TemplateError> {
    let mut file = cx.go_file(GoPackage::Builtin);
    let refcounted: Vec<&ClassDescriptor> = cx.api().classes().iter().filter(|c| c.is_refcounted).collect();

    for class in &refcounted {
        file.w.line(format!(
            "// Ref{0} holds one counted reference to a {0}.",
            class.name
        ));
        file.w.block(format!("type Ref{} interface", class.name), |w| {
            w.line("Ref");
            w.line(format!("TypedPtr() {}", class.name));
        });
        file.w.blank_line();
    }

    if !refcounted.is_empty() {
        file.w.group("var", |w| {
            for class in &refcounted {
                w.cells(&[format!("Ref{}Encoder", class.name), format!("= RefEncoder[Ref{}]{{}}", class.name)]);
            }
        });
    }

    let content = file.finish(cx);
    Ok(vec![cx.artifact(OutputUnit::ClassRefInterfaces, REFS_TEMPLATE, REFS_PATH, content)])
}
