//! Enum and bitfield types in the `constant` package.

use crate::error::TemplateError;
use crate::generator::templates::{NameSet, go_string};
use crate::generator::{Context, GeneratedArtifact, GoFile, OutputUnit};
use crate::resolve::{GoPackage, ResolvedEnum};

pub(crate) const TEMPLATE: &str = "enums";
const CLASS_PATH: &str = "pkg/constant/classes.enums.gen.go";
const GLOBAL_PATH: &str = "pkg/constant/globalenums.gen.go";

pub(in crate::generator) fn render(cx: &Context<'_>) -> Result<Vec<GeneratedArtifact>, TemplateError> {
    let (global, scoped): (Vec<&ResolvedEnum>, Vec<&ResolvedEnum>) =
        cx.model.enums().iter().partition(|e| e.owner.is_none());

    let mut artifacts = vec![cx.artifact(OutputUnit::Enums, TEMPLATE, CLASS_PATH, render_file(cx, &scoped)?)];
    if !global.is_empty() {
        artifacts.push(cx.artifact(OutputUnit::Enums, TEMPLATE, GLOBAL_PATH, render_file(cx, &global)?));
    }
    Ok(artifacts)
}

fn render_file(cx: &Context<'_>, enums: &[&ResolvedEnum]) -> Result<String, TemplateError> {
    let mut file = cx.go_file(GoPackage::Constant);
    let mut names = NameSet::new(TEMPLATE);
    for e in enums {
        write_enum(&mut file, &mut names, e)?;
    }
    Ok(file.finish(cx))
}

fn write_enum(file: &mut GoFile, names: &mut NameSet, e: &ResolvedEnum) -> Result<(), TemplateError> {
    let entity = format!("enum {}", e.key);
    names.claim(&e.target, &entity)?;
    for member in &e.members {
        names.claim(&member.ident, &entity)?;
    }
    file.import_std("fmt");

    let target = &e.target;
    let kind = if e.is_bitfield { "bitfield" } else { "enum" };
    file.w.line(format!("// {target} is the {} {kind}.", e.key));
    file.w.line(format!("type {target} int64"));
    file.w.blank_line();
    file.w.group("const", |w| {
        for member in &e.members {
            w.cells(&[member.ident.clone(), target.clone(), format!("= {}", member.value)]);
        }
    });
    file.w.blank_line();

    // several members may share a value; the first one names it
    let mut seen = Vec::new();
    file.w.block(format!("func (e {target}) String() string"), |w| {
        w.switch("switch e", |w| {
            for member in &e.members {
                if seen.contains(&member.value) {
                    continue;
                }
                seen.push(member.value);
                w.line(format!("case {}:", member.ident));
                w.indented(|w| w.line(format!("return {}", go_string(&member.native))));
            }
        });
        w.line(format!("return fmt.Sprintf(\"{target}(%d)\", int64(e))"));
    });
    file.w.blank_line();

    if e.is_bitfield {
        file.w.comment("Has reports whether every bit of flag is set in e.");
        file.w.block(format!("func (e {target}) Has(flag {target}) bool"), |w| {
            w.line("return e&flag == flag");
        });
        file.w.blank_line();
    }
    Ok(())
}
