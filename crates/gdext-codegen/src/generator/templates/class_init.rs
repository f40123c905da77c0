//! Class tags, instance construction by tag and the virtual-call boundary.
//!
//! Every class gets a `ClassTag` in canonical order. The engine reaches a
//! Go virtual override through a per-class C trampoline that forwards to
//! `goCallVirtualWithData`; dispatch below it never unwinds, it reports a
//! `GDExtensionCallErrorType` code instead.

use crate::api::{Capability, ClassDescriptor};
use crate::error::TemplateError;
use crate::generator::templates::class_impl::impl_constructor;
use crate::generator::templates::{go_string, params, return_mapping};
use crate::generator::{Context, GeneratedArtifact, GoFile, OutputUnit};
use crate::resolve::GoPackage;
use crate::resolve::naming::method_name;

pub(crate) const TEMPLATE: &str = "class_init";
const GO_PATH: &str = "pkg/gdclassinit/classes.init.gen.go";
const HEADER_NAME: &str = "classes.callbacks.gen.h";
const HEADER_PATH: &str = "pkg/gdclassinit/classes.callbacks.gen.h";
const SOURCE_PATH: &str = "pkg/gdclassinit/classes.callbacks.gen.c";

const CALL_OK: &str = "GDEXTENSION_CALL_OK";
const CALL_INVALID_METHOD: &str = "GDEXTENSION_CALL_ERROR_INVALID_METHOD";
const CALL_INSTANCE_IS_NULL: &str = "GDEXTENSION_CALL_ERROR_INSTANCE_IS_NULL";
const CALL_TOO_FEW_ARGUMENTS: &str = "GDEXTENSION_CALL_ERROR_TOO_FEW_ARGUMENTS";

/// Parameter list shared by every trampoline; matches
/// `GDExtensionClassCallVirtualWithData`.
const TRAMPOLINE_PARAMS: &str = "GDExtensionClassInstancePtr p_instance, GDExtensionConstStringNamePtr p_name, \
     void *p_virtual_call_userdata, const GDExtensionConstTypePtr *p_args, GDExtensionTypePtr r_ret";

pub(super) fn tag_name(class: &str) -> String {
    format!("ClassTag{class}")
}

pub(super) fn trampoline_name(class: &str) -> String {
    format!("cgo_classcallback_call_virtual_{class}")
}

fn dispatch_name(class: &str) -> String {
    format!("call{class}Virtual")
}

pub(in crate::generator) fn render(cx: &Context<'_>) -> Result<Vec<GeneratedArtifact>, TemplateError> {
    let classes = cx.api().classes();

    let mut file = cx.go_file(GoPackage::ClassInit);
    file.cgo_include(HEADER_NAME);
    file.import_std("unsafe");
    write_tags(&mut file, classes);
    write_factory(&mut file, classes);
    write_boundary(cx, &mut file, classes)?;
    let go = file.finish(cx);

    Ok(vec![
        cx.artifact(OutputUnit::ClassInit, TEMPLATE, GO_PATH, go),
        cx.artifact(OutputUnit::ClassInit, TEMPLATE, HEADER_PATH, render_header(cx, classes)),
        cx.artifact(OutputUnit::ClassInit, TEMPLATE, SOURCE_PATH, render_source(cx, classes)),
    ])
}

fn write_tags(file: &mut GoFile, classes: &[ClassDescriptor]) {
    let w = &mut file.w;
    w.comment("ClassTag identifies an engine class. Tags follow the canonical class\norder, so a parent's tag is always lower than its children's.");
    w.line("type ClassTag uint32");
    w.blank_line();
    w.group("const", |w| {
        for (index, class) in classes.iter().enumerate() {
            w.cells(&[tag_name(&class.name), "ClassTag".to_string(), format!("= {index}")]);
        }
    });
    w.blank_line();
    w.literal("var classTagNames = [...]string", |w| {
        for class in classes {
            w.cells(&[format!("{}:", tag_name(&class.name)), format!("{},", go_string(&class.name))]);
        }
    });
    w.blank_line();
    w.literal("var classTagsByName = map[string]ClassTag", |w| {
        for class in classes {
            w.cells(&[format!("{}:", go_string(&class.name)), format!("{},", tag_name(&class.name))]);
        }
    });
    w.blank_line();
    w.comment("classTagParents holds each tag's parent; the root maps to itself.");
    w.literal("var classTagParents = [...]ClassTag", |w| {
        for class in classes {
            let parent = class.inherits.as_deref().unwrap_or(&class.name);
            w.cells(&[format!("{}:", tag_name(&class.name)), format!("{},", tag_name(parent))]);
        }
    });
    w.blank_line();
    w.block("func (t ClassTag) String() string", |w| {
        w.block("if int(t) < len(classTagNames)", |w| w.line("return classTagNames[t]"));
        w.line("return \"ClassTag(?)\"");
    });
    w.blank_line();
    w.comment("ClassTagByName returns the tag of the named class.");
    w.block("func ClassTagByName(name string) (ClassTag, bool)", |w| {
        w.line("t, ok := classTagsByName[name]");
        w.line("return t, ok");
    });
    w.blank_line();
    w.comment("Parent returns the tag of the class t inherits from; false for the root.");
    w.block("func (t ClassTag) Parent() (ClassTag, bool)", |w| {
        w.block("if int(t) >= len(classTagParents) || classTagParents[t] == t", |w| {
            w.line("return t, false");
        });
        w.line("return classTagParents[t], true");
    });
    w.blank_line();
    w.block("func (t ClassTag) IsSubclassOf(ancestor ClassTag) bool", |w| {
        w.block("for", |w| {
            w.block("if t == ancestor", |w| w.line("return true"));
            w.line("parent, ok := t.Parent()");
            w.block("if !ok", |w| w.line("return false"));
            w.line("t = parent");
        });
    });
    w.blank_line();
}

fn write_factory(file: &mut GoFile, classes: &[ClassDescriptor]) {
    let object = file.runtime(crate::api::ROOT_CLASS);
    let owner_ptr = file.ffi("GDExtensionObjectPtr");
    let constructors: Vec<(String, String)> = classes
        .iter()
        .map(|class| {
            (
                tag_name(&class.name),
                file.qualify(GoPackage::ClassImpl, &impl_constructor(&class.name)),
            )
        })
        .collect();

    file.w.comment("NewByTag wraps owner in the generated implementation of tag's class.");
    file.w.block(format!("func NewByTag(tag ClassTag, owner {owner_ptr}) {object}"), |w| {
        w.switch("switch tag", |w| {
            for (tag, constructor) in &constructors {
                w.line(format!("case {tag}:"));
                w.indented(|w| w.line(format!("return {constructor}(owner)")));
            }
        });
        w.line("return nil");
    });
    file.w.blank_line();
}

fn write_boundary(cx: &Context<'_>, file: &mut GoFile, classes: &[ClassDescriptor]) -> Result<(), TemplateError> {
    let error_type = file.ffi("GDExtensionCallErrorType");
    let ok = file.ffi(CALL_OK);
    let invalid_method = file.ffi(CALL_INVALID_METHOD);
    let instance_is_null = file.ffi(CALL_INSTANCE_IS_NULL);
    let instance_from_ptr = file.runtime("InstanceFromPtr");
    let string_name = file.runtime("StringNameToString");
    let report = file.runtime("ReportVirtualCallError");

    let mut cases = Vec::new();
    for class in classes {
        let interface = file.runtime(&class.name);
        cases.push((tag_name(&class.name), interface, dispatch_name(&class.name)));
    }

    file.w.comment(
        "CallVirtual invokes the Go override of a virtual method on the instance\n\
         behind instance. It returns a call error code rather than panicking.",
    );
    file.w.block(
        format!("func CallVirtual(tag ClassTag, instance unsafe.Pointer, name unsafe.Pointer, args unsafe.Pointer, ret unsafe.Pointer) {error_type}"),
        |w| {
            w.block("if instance == nil", |w| w.line(format!("return {instance_is_null}")));
            w.line(format!("obj := {instance_from_ptr}(instance)"));
            w.line(format!("method := {string_name}(name)"));
            w.switch("switch tag", |w| {
                for (tag, interface, dispatch) in &cases {
                    w.line(format!("case {tag}:"));
                    w.indented(|w| {
                        w.block(format!("if inst, ok := obj.({interface}); ok"), |w| {
                            w.line(format!("return {dispatch}(inst, method, args, ret)"));
                        });
                    });
                }
            });
            w.line(format!("return {invalid_method}"));
        },
    );
    file.w.blank_line();

    file.w.line("//export goCallVirtualWithData");
    file.w.block(
        "func goCallVirtualWithData(tag C.uint32_t, instance unsafe.Pointer, name unsafe.Pointer, args unsafe.Pointer, ret unsafe.Pointer)",
        |w| {
            w.line("code := CallVirtual(ClassTag(tag), instance, name, args, ret)");
            w.block(format!("if code != {ok}"), |w| {
                w.line(format!("{report}(ClassTag(tag).String(), {string_name}(name), code)"));
            });
        },
    );
    file.w.blank_line();

    let trampolines: Vec<(String, String)> = classes
        .iter()
        .map(|class| (tag_name(&class.name), trampoline_name(&class.name)))
        .collect();
    file.w.comment("VirtualCallTrampoline returns the C callback that routes virtual calls\nfor tag's class into CallVirtual.");
    file.w.block("func VirtualCallTrampoline(tag ClassTag) unsafe.Pointer", |w| {
        w.switch("switch tag", |w| {
            for (tag, trampoline) in &trampolines {
                w.line(format!("case {tag}:"));
                w.indented(|w| {
                    w.line(format!(
                        "return unsafe.Pointer(C.GDExtensionClassCallVirtualWithData(C.{trampoline}))"
                    ));
                });
            }
        });
        w.line("return nil");
    });
    file.w.blank_line();

    for class in classes {
        write_dispatch(cx, file, class)?;
    }
    Ok(())
}

/// Switch over every virtual method callable on `class`, inherited ones
/// included.
fn write_dispatch(cx: &Context<'_>, file: &mut GoFile, class: &ClassDescriptor) -> Result<(), TemplateError> {
    let error_type = file.ffi("GDExtensionCallErrorType");
    let interface = file.runtime(&class.name);
    let ok = file.ffi(CALL_OK);
    let invalid_method = file.ffi(CALL_INVALID_METHOD);
    let too_few = file.ffi(CALL_TOO_FEW_ARGUMENTS);

    let capabilities: Vec<Capability<'_>> = cx
        .api()
        .capabilities(class.id)
        .into_iter()
        .filter(|c| c.method.is_virtual)
        .collect();

    file.block(
        format!(
            "func {}(inst {interface}, method string, args unsafe.Pointer, ret unsafe.Pointer) {error_type}",
            dispatch_name(&class.name)
        ),
        |file| -> Result<(), TemplateError> {
            if !capabilities.is_empty() {
                let const_ptr = file.ffi("GDExtensionConstTypePtr");
                let type_ptr = file.ffi("GDExtensionTypePtr");
                file.w.line("switch method {");
                for capability in &capabilities {
                    let method = capability.method;
                    let declaring = &cx.api().class_by_id(capability.owner).name;
                    let entity = format!("classes.{declaring}.methods.{}", method.name);
                    let method_params = params(cx, TEMPLATE, &entity, &method.arguments)?;
                    let ret = return_mapping(cx, TEMPLATE, &entity, method.return_type())?;

                    file.w.line(format!("case {}:", go_string(&method.name)));
                    let mut body = Vec::new();
                    if !method_params.is_empty() {
                        body.push(format!(
                            "if args == nil {{\n\treturn {too_few}\n}}"
                        ));
                        body.push(format!(
                            "in := unsafe.Slice((*{const_ptr})(args), {})",
                            method_params.len()
                        ));
                    }
                    let mut call_args = Vec::new();
                    for (index, param) in method_params.iter().enumerate() {
                        let decoded = file.decode(param.mapping, &format!("{type_ptr}(in[{index}])"));
                        body.push(format!("arg{index} := {decoded}"));
                        call_args.push(format!("arg{index}"));
                    }
                    let call = format!("inst.{}({})", method_name(&method.name, true), call_args.join(", "));
                    match ret {
                        Some(ret) => {
                            body.push(format!("result := {call}"));
                            body.push(format!("if ret != nil {{\n\t{}\n}}", file.encode_into(ret, "result", &format!("{type_ptr}(ret)"))));
                        }
                        None => body.push(call),
                    }
                    body.push(format!("return {ok}"));
                    file.w.indented(|w| {
                        for line in &body {
                            w.lines(line);
                        }
                    });
                }
                file.w.line("}");
            }
            file.w.line(format!("return {invalid_method}"));
            Ok(())
        },
    )?;
    file.w.blank_line();
    Ok(())
}

fn render_header(cx: &Context<'_>, classes: &[ClassDescriptor]) -> String {
    let guard = format!("{}_", HEADER_NAME.replace('.', "_").to_ascii_uppercase());
    let mut w = cx.c_file();
    w.line(format!("#ifndef {guard}"));
    w.line(format!("#define {guard}"));
    w.blank_line();
    w.line("#include <stdint.h>");
    w.line("#include \"gdextension_interface.h\"");
    w.blank_line();
    for class in classes {
        w.line(format!("void {}({TRAMPOLINE_PARAMS});", trampoline_name(&class.name)));
    }
    w.blank_line();
    w.line(format!("#endif // {guard}"));
    w.finish()
}

fn render_source(cx: &Context<'_>, classes: &[ClassDescriptor]) -> String {
    let mut w = cx.c_file();
    w.line(format!("#include \"{HEADER_NAME}\""));
    w.line("#include \"_cgo_export.h\"");
    for (index, class) in classes.iter().enumerate() {
        w.blank_line();
        w.block(format!("void {}({TRAMPOLINE_PARAMS})", trampoline_name(&class.name)), |w| {
            w.line(format!(
                "goCallVirtualWithData({index}, (void *)p_instance, (void *)p_name, (void *)p_args, (void *)r_ret);"
            ));
        });
    }
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names() {
        assert_eq!(tag_name("Node"), "ClassTagNode");
        assert_eq!(trampoline_name("Node"), "cgo_classcallback_call_virtual_Node");
        assert_eq!(dispatch_name("RefCounted"), "callRefCountedVirtual");
    }
}
