//! Variant type table, built from the header's variant-type enum.

use std::collections::HashMap;

use crate::error::TemplateError;
use crate::generator::templates::builtin::struct_builtins;
use crate::generator::templates::go_string;
use crate::generator::{Context, GeneratedArtifact, OutputUnit};
use crate::header::EnumVariant;
use crate::resolve::GoPackage;
use crate::resolve::naming::to_screaming_snake_case;

pub(crate) const TEMPLATE: &str = "variant";
const PATH: &str = "pkg/builtin/variant.gen.go";

/// Header enum listing the engine's variant types.
pub(super) const VARIANT_TYPE_ENUM: &str = "GDExtensionVariantType";
const VARIANT_TYPE_PREFIX: &str = "GDEXTENSION_VARIANT_TYPE_";

/// Header variant-type enumerators keyed by normalized type name.
pub(super) struct VariantTypes<'a> {
    by_key: HashMap<String, &'a EnumVariant>,
}

impl<'a> VariantTypes<'a> {
    pub fn new(cx: &Context<'a>) -> Self {
        let by_key = cx
            .model
            .header()
            .enums()
            .filter(|e| e.name == VARIANT_TYPE_ENUM)
            .flat_map(|e| &e.variants)
            .filter_map(|v| {
                let suffix = v.name.strip_prefix(VARIANT_TYPE_PREFIX)?;
                Some((normalize(suffix), v))
            })
            .collect();
        Self { by_key }
    }

    /// The enumerator for a descriptor type name. `Variant` operands use
    /// `NIL`; every class uses `OBJECT`.
    pub fn lookup(&self, cx: &Context<'_>, type_name: &str) -> Option<&'a EnumVariant> {
        let key = if type_name == "Variant" {
            "NIL".to_string()
        } else if cx.api().class(type_name).is_some() {
            "OBJECT".to_string()
        } else {
            normalize(&to_screaming_snake_case(type_name))
        };
        self.by_key.get(&key).copied()
    }

    /// `ffi.GDEXTENSION_VARIANT_TYPE_VECTOR2` for `Vector2`, or a
    /// [`TemplateError`] when the header has no such enumerator.
    pub fn constant(
        &self,
        cx: &Context<'_>,
        template: &'static str,
        entity: &str,
        type_name: &str,
    ) -> Result<&'a str, TemplateError> {
        self.lookup(cx, type_name)
            .map(|v| v.name.as_str())
            .ok_or_else(|| {
                TemplateError::new(
                    template,
                    entity,
                    format!("`{type_name}` has no {VARIANT_TYPE_ENUM} enumerator"),
                )
            })
    }
}

/// Underscore placement differs between the header (`TRANSFORM2D`) and the
/// casing function (`TRANSFORM2_D`), so keys drop underscores.
fn normalize(name: &str) -> String {
    name.replace('_', "")
}

pub(in crate::generator) fn render(cx: &Context<'_>) -> Result<Vec<GeneratedArtifact>, TemplateError> {
    let variant_types = VariantTypes::new(cx);
    let mut file = cx.go_file(GoPackage::Builtin);
    let variant_type = file.ffi(VARIANT_TYPE_ENUM);

    let mut entries = Vec::new();
    for builtin in cx.api().builtin_classes() {
        if let Some(v) = variant_types.lookup(cx, &builtin.name) {
            entries.push((v.name.as_str(), builtin.name.as_str()));
        }
    }
    if let Some(v) = variant_types.lookup(cx, crate::api::ROOT_CLASS) {
        entries.push((v.name.as_str(), crate::api::ROOT_CLASS));
    }
    let entries: Vec<(String, &str)> = entries
        .into_iter()
        .map(|(constant, name)| (file.ffi(constant), name))
        .collect();

    file.w.comment(&format!("variantTypeNames maps each {VARIANT_TYPE_ENUM} to its type name."));
    file.w.literal(format!("var variantTypeNames = map[{variant_type}]string"), |w| {
        for (constant, name) in &entries {
            w.cells(&[format!("{constant}:"), format!("{},", go_string(name))]);
        }
    });
    file.w.blank_line();
    file.w.block(format!("func VariantTypeName(t {variant_type}) string"), |w| {
        w.block("if name, ok := variantTypeNames[t]; ok", |w| w.line("return name"));
        w.line("return \"Unknown\"");
    });

    for (builtin, mapping) in struct_builtins(cx) {
        let Some(v) = variant_types.lookup(cx, &builtin.name) else {
            continue;
        };
        let constant = file.ffi(&v.name);
        file.w.blank_line();
        file.w.block(
            format!("func (cx *{}) VariantType() {variant_type}", mapping.target),
            |w| w.line(format!("return {constant}")),
        );
    }

    let content = file.finish(cx);
    Ok(vec![cx.artifact(OutputUnit::Variant, TEMPLATE, PATH, content)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_keys_ignore_underscores() {
        assert_eq!(normalize("TRANSFORM2D"), normalize(&to_screaming_snake_case("Transform2D")));
        assert_eq!(
            normalize("PACKED_VECTOR2_ARRAY"),
            normalize(&to_screaming_snake_case("PackedVector2Array"))
        );
        assert_eq!(normalize("STRING_NAME"), normalize(&to_screaming_snake_case("StringName")));
    }
}
