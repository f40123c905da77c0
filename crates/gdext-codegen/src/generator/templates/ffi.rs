//! The ABI shim: C call-through wrappers for every function-pointer typedef,
//! Go aliases for every header type, and the interface table loaded through
//! `get_proc_address`.

use std::collections::BTreeSet;

use crate::error::TemplateError;
use crate::generator::templates::{NameSet, go_string};
use crate::generator::{CodeWriter, Context, GeneratedArtifact, GoFile, OutputUnit};
use crate::header::HeaderDecl;
use crate::resolve::naming::to_camel_case;
use crate::resolve::{GoPackage, ShimFunction};

pub(crate) const TEMPLATE: &str = "ffi";
const WRAPPER_HEADER_NAME: &str = "ffi_wrapper.gen.h";
const WRAPPER_HEADER_PATH: &str = "pkg/ffi/ffi_wrapper.gen.h";
const WRAPPER_SOURCE_PATH: &str = "pkg/ffi/ffi_wrapper.gen.c";
const WRAPPER_GO_PATH: &str = "pkg/ffi/ffi_wrapper.gen.go";
const INTERFACE_GO_PATH: &str = "pkg/ffi/ffi.gen.go";

/// The loader entry point handed to the extension at initialization.
const GET_PROC_ADDRESS: &str = "GDExtensionInterfaceGetProcAddress";
const INTERFACE_TYPE: &str = "GDExtensionInterface";

/// `callFunc_GDExtensionInterfaceGetProcAddress`
pub(super) fn c_wrapper_name(typedef: &str) -> String {
    format!("callFunc_{typedef}")
}

/// `CallFunc_GDExtensionInterfaceGetProcAddress`
pub(super) fn go_wrapper_name(typedef: &str) -> String {
    format!("CallFunc_{typedef}")
}

/// Shim argument name in C and Go; `fn` is taken by the function pointer.
fn param_name(shim_param: &str) -> String {
    if shim_param == "fn" {
        "fn_".to_string()
    } else {
        shim_param.to_string()
    }
}

pub(in crate::generator) fn render(cx: &Context<'_>) -> Result<Vec<GeneratedArtifact>, TemplateError> {
    let shims = cx.model.shims();
    Ok(vec![
        cx.artifact(OutputUnit::Ffi, TEMPLATE, WRAPPER_HEADER_PATH, render_c_header(cx, shims)),
        cx.artifact(OutputUnit::Ffi, TEMPLATE, WRAPPER_SOURCE_PATH, render_c_source(cx, shims)),
        cx.artifact(OutputUnit::Ffi, TEMPLATE, WRAPPER_GO_PATH, render_wrapper_go(cx, shims)?),
        cx.artifact(OutputUnit::Ffi, TEMPLATE, INTERFACE_GO_PATH, render_interface_go(cx)?),
    ])
}

fn c_prototype(shim: &ShimFunction) -> String {
    let mut params = vec![format!("{} fn", shim.typedef)];
    params.extend(shim.params.iter().map(|p| c_declaration(&p.ty.c, &param_name(&p.name))));
    let ret = if shim.return_type.is_void() {
        "void"
    } else {
        shim.return_type.c.as_str()
    };
    format!("{ret} {}({})", c_wrapper_name(&shim.typedef), params.join(", "))
}

/// `const char *p_name`, `uint32_t p_index`
fn c_declaration(ty: &str, name: &str) -> String {
    if ty.ends_with('*') {
        format!("{ty}{name}")
    } else {
        format!("{ty} {name}")
    }
}

fn render_c_header(cx: &Context<'_>, shims: &[ShimFunction]) -> String {
    let guard = format!("{}_", WRAPPER_HEADER_NAME.replace('.', "_").to_ascii_uppercase());
    let mut w = cx.c_file();
    w.line(format!("#ifndef {guard}"));
    w.line(format!("#define {guard}"));
    w.blank_line();
    w.line("#include <stddef.h>");
    w.line("#include <stdint.h>");
    w.line("#include <stdlib.h>");
    w.line("#include \"gdextension_interface.h\"");
    w.blank_line();
    for shim in shims {
        w.line(format!("{};", c_prototype(shim)));
    }
    w.blank_line();
    w.line(format!("#endif // {guard}"));
    w.finish()
}

fn render_c_source(cx: &Context<'_>, shims: &[ShimFunction]) -> String {
    let mut w = cx.c_file();
    w.line(format!("#include \"{WRAPPER_HEADER_NAME}\""));
    for shim in shims {
        w.blank_line();
        let args: Vec<String> = shim.params.iter().map(|p| param_name(&p.name)).collect();
        let call = format!("fn({})", args.join(", "));
        w.block(c_prototype(shim), |w| {
            if shim.return_type.is_void() {
                w.line(format!("{call};"));
            } else {
                w.line(format!("return {call};"));
            }
        });
    }
    w.finish()
}

/// Names the header declares as types, first declaration first.
fn header_type_names<'a>(cx: &Context<'a>) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    cx.model
        .header()
        .decls()
        .iter()
        .filter(|d| d.declares_type())
        .map(HeaderDecl::name)
        .filter(|name| !name.is_empty() && seen.insert(*name))
        .collect()
}

fn cgo_file(cx: &Context<'_>) -> GoFile {
    let mut file = cx.go_file(GoPackage::Ffi);
    file.cgo_include(WRAPPER_HEADER_NAME);
    file
}

fn use_unsafe(file: &mut GoFile, go_type: &str) {
    if go_type.contains("unsafe.") {
        file.import_std("unsafe");
    }
}

fn render_wrapper_go(cx: &Context<'_>, shims: &[ShimFunction]) -> Result<String, TemplateError> {
    let mut file = cgo_file(cx);
    let types = header_type_names(cx);

    if !types.is_empty() {
        file.w.group("type", |w| {
            for name in &types {
                w.cells(&[name.to_string(), format!("= C.{name}")]);
            }
        });
        file.w.blank_line();
    }

    let mut names = NameSet::new(TEMPLATE);
    for shim in shims {
        let entity = format!("header.{}", shim.typedef);
        let function = go_wrapper_name(&shim.typedef);
        names.claim(&function, &entity)?;

        let mut params = vec![format!("fn {}", shim.typedef)];
        let mut args = vec!["fn".to_string()];
        for param in &shim.params {
            let ident = param_name(&param.go_name);
            use_unsafe(&mut file, &param.ty.go);
            params.push(format!("{ident} {}", param.ty.go));
            args.push(ident);
        }
        use_unsafe(&mut file, &shim.return_type.go);
        let result = if shim.return_type.is_void() {
            String::new()
        } else {
            format!(" {}", shim.return_type.go)
        };
        let call = format!("C.{}({})", c_wrapper_name(&shim.typedef), args.join(", "));
        file.w.block(format!("func {function}({}){result}", params.join(", ")), |w| {
            if shim.return_type.is_void() {
                w.line(call);
            } else {
                w.line(format!("return {call}"));
            }
        });
        file.w.blank_line();
    }
    Ok(file.finish(cx))
}

fn render_interface_go(cx: &Context<'_>) -> Result<String, TemplateError> {
    let mut file = cgo_file(cx);
    write_header_constants(cx, &mut file.w);

    let loader = cx.model.shims().iter().find(|s| s.typedef == GET_PROC_ADDRESS);
    let functions: Vec<&ShimFunction> = cx
        .model
        .interface_shims()
        .filter(|s| s.typedef != GET_PROC_ADDRESS)
        .collect();

    let mut fields = NameSet::new(TEMPLATE);
    let mut methods = NameSet::new(TEMPLATE);
    let mut entries = Vec::with_capacity(functions.len());
    for shim in &functions {
        let entity = format!("header.{}", shim.typedef);
        let field = to_camel_case(&shim.go_name);
        fields.claim(&field, &entity)?;
        methods.claim(&shim.go_name, &entity)?;
        entries.push((field, *shim));
    }

    file.w.comment(&format!(
        "{INTERFACE_TYPE} holds the engine interface functions resolved by\nLoad{INTERFACE_TYPE}."
    ));
    file.w.block(format!("type {INTERFACE_TYPE} struct"), |w| {
        for (field, shim) in &entries {
            w.cells(&[field.as_str(), shim.typedef.as_str()]);
        }
    });
    file.w.blank_line();

    let Some(loader) = loader else {
        return Ok(file.finish(cx));
    };

    file.import_std("unsafe");
    let load_fn = go_wrapper_name(&loader.typedef);
    file.w.block(
        format!("func loadProcAddress(getProcAddress {}, name string) {}", loader.typedef, loader.return_type.go),
        |w| {
            w.line("cname := C.CString(name)");
            w.line("defer C.free(unsafe.Pointer(cname))");
            w.line(format!("return {load_fn}(getProcAddress, cname)"));
        },
    );
    file.w.blank_line();

    file.w.comment(&format!(
        "Load{INTERFACE_TYPE} resolves every interface function through getProcAddress."
    ));
    file.w.block(
        format!("func Load{INTERFACE_TYPE}(getProcAddress {}) *{INTERFACE_TYPE}", loader.typedef),
        |w| {
            w.line(format!("cx := &{INTERFACE_TYPE}{{}}"));
            for (field, shim) in &entries {
                let proc_name = shim.proc_name.as_deref().unwrap_or_default();
                w.line(format!(
                    "cx.{field} = ({})(loadProcAddress(getProcAddress, {}))",
                    shim.typedef,
                    go_string(proc_name)
                ));
            }
            w.line("return cx");
        },
    );
    file.w.blank_line();

    for (field, shim) in &entries {
        let mut params = Vec::new();
        let mut args = vec![format!("cx.{field}")];
        for param in &shim.params {
            let ident = param_name(&param.go_name);
            use_unsafe(&mut file, &param.ty.go);
            params.push(format!("{ident} {}", param.ty.go));
            args.push(ident);
        }
        use_unsafe(&mut file, &shim.return_type.go);
        let result = if shim.return_type.is_void() {
            String::new()
        } else {
            format!(" {}", shim.return_type.go)
        };
        let call = format!("{}({})", go_wrapper_name(&shim.typedef), args.join(", "));
        file.w.block(
            format!("func (cx *{INTERFACE_TYPE}) {}({}){result}", shim.go_name, params.join(", ")),
            |w| {
                if shim.return_type.is_void() {
                    w.line(call);
                } else {
                    w.line(format!("return {call}"));
                }
            },
        );
        file.w.blank_line();
    }
    Ok(file.finish(cx))
}

/// Header enumerators as typed Go constants and `#define`s as untyped ones.
fn write_header_constants(cx: &Context<'_>, w: &mut CodeWriter) {
    let header = cx.model.header();
    for e in header.enums().filter(|e| !e.variants.is_empty()) {
        let typed = (!e.name.is_empty()).then_some(e.name.as_str());
        w.group("const", |w| {
            for variant in &e.variants {
                match typed {
                    Some(ty) => w.cells(&[variant.name.clone(), ty.to_string(), format!("= {}", variant.value)]),
                    None => w.cells(&[variant.name.clone(), format!("= {}", variant.value)]),
                }
            }
        });
        w.blank_line();
    }

    let macros: Vec<_> = header.macros().collect();
    if !macros.is_empty() {
        w.group("const", |w| {
            for m in &macros {
                w.cells(&[m.name.clone(), format!("= {}", m.value)]);
            }
        });
        w.blank_line();
    }
}
