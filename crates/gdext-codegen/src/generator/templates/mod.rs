//! One module per output unit, plus the call-rendering helpers they share.

pub(super) mod bindings;
pub(super) mod builtin;
pub(super) mod class_impl;
pub(super) mod class_init;
pub(super) mod class_interfaces;
pub(super) mod constants;
pub(super) mod enums;
pub(super) mod ffi;
pub(super) mod native_structures;
pub(super) mod utility_functions;
pub(super) mod variant;

use std::collections::HashMap;

use crate::api::{Argument, ReturnValue};
use crate::error::TemplateError;
use crate::generator::{Context, GoFile};
use crate::resolve::TypeMapping;
use crate::resolve::naming::argument_name;

/// Locals used inside generated call bodies; parameters never shadow them.
const CALL_LOCALS: &[&str] = &["cx", "mb", "fn", "args", "ret", "varargs"];

/// A generated Go parameter.
pub(super) struct Param<'a> {
    pub native: &'a str,
    pub ident: String,
    pub mapping: &'a TypeMapping,
    pub default_value: Option<&'a str>,
}

/// Map descriptor arguments to Go parameters, rejecting names that collide
/// after casing.
pub(super) fn params<'a>(
    cx: &Context<'a>,
    template: &'static str,
    entity: &str,
    arguments: &'a [Argument],
) -> Result<Vec<Param<'a>>, TemplateError> {
    let mut names = NameSet::new(template);
    arguments
        .iter()
        .map(|arg| {
            let mut ident = argument_name(&arg.name);
            if CALL_LOCALS.contains(&ident.as_str()) {
                ident.push('_');
            }
            names.claim(&ident, entity)?;
            Ok(Param {
                native: &arg.name,
                ident,
                mapping: cx.mapping(template, entity, &arg.type_name, arg.meta.as_deref())?,
                default_value: arg.default_value.as_deref(),
            })
        })
        .collect()
}

/// The mapping of a return value, `None` for void.
pub(super) fn return_mapping<'a>(
    cx: &Context<'a>,
    template: &'static str,
    entity: &str,
    ret: Option<&ReturnValue>,
) -> Result<Option<&'a TypeMapping>, TemplateError> {
    match ret {
        Some(ret) => {
            let mapping = cx.mapping(template, entity, &ret.type_name, ret.meta.as_deref())?;
            Ok((!mapping.is_void()).then_some(mapping))
        }
        None => Ok(None),
    }
}

/// `a float64, b builtin.Vector2` with a trailing `varargs ...Variant` for varcalls.
pub(super) fn param_list(file: &mut GoFile, params: &[Param<'_>], vararg: bool) -> String {
    let mut list: Vec<String> = params
        .iter()
        .map(|p| format!("{} {}", p.ident, file.ty(p.mapping)))
        .collect();
    if vararg {
        list.push(format!("varargs ...{}", file.runtime("Variant")));
    }
    list.join(", ")
}

/// ` T` for a result type, empty for void.
pub(super) fn result_suffix(file: &mut GoFile, ret: Option<&TypeMapping>) -> String {
    ret.map(|m| format!(" {}", file.ty(m))).unwrap_or_default()
}

/// Doc lines for default argument values.
pub(super) fn default_docs(file: &mut GoFile, params: &[Param<'_>]) {
    for param in params {
        if let Some(default) = param.default_value {
            file.w.line(format!("// `{}` defaults to `{default}`.", param.native));
        }
    }
}

/// A call site to render: Go parameters and the result mapping.
pub(super) struct Call<'p, 'a> {
    pub params: &'p [Param<'a>],
    pub ret: Option<&'a TypeMapping>,
    pub vararg: bool,
}

impl Call<'_, '_> {
    /// Write a call body. `ptrcall` receives the args and return-slot
    /// expressions and yields the call statement; `varcall` receives the
    /// Variant slice expression and yields an expression of type Variant.
    pub fn write(
        &self,
        file: &mut GoFile,
        ptrcall: impl FnOnce(&mut GoFile, &str, &str) -> String,
        varcall: impl FnOnce(&mut GoFile, &str) -> String,
    ) {
        if self.vararg {
            self.write_varcall(file, varcall);
        } else {
            self.write_ptrcall(file, ptrcall);
        }
    }

    /// Declare the encoded ptrcall argument array; returns the slice
    /// expression to pass on, `nil` when there are no arguments.
    pub fn write_args(&self, file: &mut GoFile) -> &'static str {
        if self.params.is_empty() {
            return "nil";
        }
        let arg_type = file.ffi("GDExtensionConstTypePtr");
        let encoded: Vec<String> = self
            .params
            .iter()
            .map(|p| file.encode_arg(p.mapping, &p.ident))
            .collect();
        file.w.literal(format!("args := [{}]{arg_type}", encoded.len()), |w| {
            for arg in &encoded {
                w.line(format!("{arg},"));
            }
        });
        "args[:]"
    }

    fn write_ptrcall(&self, file: &mut GoFile, ptrcall: impl FnOnce(&mut GoFile, &str, &str) -> String) {
        let args = self.write_args(file);
        match self.ret {
            Some(ret) => {
                let slot = file.new_return_slot(ret);
                file.w.line(format!("ret := {slot}"));
                let call = ptrcall(file, args, "ret");
                file.w.line(call);
                let decoded = file.decode(ret, "ret");
                file.w.line(format!("return {decoded}"));
            }
            None => {
                let call = ptrcall(file, args, "nil");
                file.w.line(call);
            }
        }
    }

    fn write_varcall(&self, file: &mut GoFile, varcall: impl FnOnce(&mut GoFile, &str) -> String) {
        let variant = file.runtime("Variant");
        file.w.line(format!(
            "args := make([]{variant}, 0, {}+len(varargs))",
            self.params.len()
        ));
        for param in self.params {
            let boxed = file.to_variant(param.mapping, &param.ident);
            file.w.line(format!("args = append(args, {boxed})"));
        }
        file.w.line("args = append(args, varargs...)");
        let call = varcall(file, "args");
        match self.ret {
            Some(ret) => {
                file.w.line(format!("ret := {call}"));
                let unboxed = file.from_variant(ret, "ret");
                file.w.line(format!("return {unboxed}"));
            }
            None => file.w.line(call),
        }
    }
}

/// Tracks generated identifiers within one scope.
pub(super) struct NameSet {
    template: &'static str,
    seen: HashMap<String, String>,
}

impl NameSet {
    pub fn new(template: &'static str) -> Self {
        Self {
            template,
            seen: HashMap::new(),
        }
    }

    /// Record `ident` for `entity`; a second entity deriving it is an error.
    pub fn claim(&mut self, ident: &str, entity: &str) -> Result<(), TemplateError> {
        match self.seen.get(ident) {
            Some(first) if first != entity => Err(TemplateError::new(
                self.template,
                entity,
                format!("generated name `{ident}` already used by {first}"),
            )),
            Some(_) => Err(TemplateError::new(
                self.template,
                entity,
                format!("generated name `{ident}` is derived twice"),
            )),
            None => {
                self.seen.insert(ident.to_string(), entity.to_string());
                Ok(())
            }
        }
    }
}

/// Go string literal for `s`.
pub(super) fn go_string(s: &str) -> String {
    format!("{s:?}")
}
