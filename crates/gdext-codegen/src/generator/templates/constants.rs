//! Integer constants declared on classes and at global scope.

use crate::api::ConstantDescriptor;
use crate::error::TemplateError;
use crate::generator::templates::NameSet;
use crate::generator::{Context, GeneratedArtifact, OutputUnit};
use crate::resolve::GoPackage;
use crate::resolve::naming::constant_name;

pub(crate) const TEMPLATE: &str = "constants";
const CLASS_PATH: &str = "pkg/constant/classes.constants.gen.go";
const GLOBAL_PATH: &str = "pkg/constant/globalconstants.gen.go";

pub(in crate::generator) fn render(cx: &Context<'_>) -> Result<Vec<GeneratedArtifact>, TemplateError> {
    let mut names = NameSet::new(TEMPLATE);

    let mut file = cx.go_file(GoPackage::Constant);
    for class in cx.api().classes().iter().filter(|c| !c.constants.is_empty()) {
        let owner = format!("classes.{}", class.name);
        let lines = constant_lines(&mut names, &owner, Some(&class.name), &class.constants)?;
        file.w.line(format!("// {} constants.", class.name));
        file.w.group("const", |w| {
            for line in &lines {
                w.cells(line);
            }
        });
        file.w.blank_line();
    }
    let mut artifacts = vec![cx.artifact(OutputUnit::Constants, TEMPLATE, CLASS_PATH, file.finish(cx))];

    let globals = cx.api().global_constants();
    if !globals.is_empty() {
        let lines = constant_lines(&mut names, "global_constants", None, globals)?;
        let mut file = cx.go_file(GoPackage::Constant);
        file.w.group("const", |w| {
            for line in &lines {
                w.cells(line);
            }
        });
        artifacts.push(cx.artifact(OutputUnit::Constants, TEMPLATE, GLOBAL_PATH, file.finish(cx)));
    }
    Ok(artifacts)
}

fn constant_lines(
    names: &mut NameSet,
    owner: &str,
    class: Option<&str>,
    constants: &[ConstantDescriptor],
) -> Result<Vec<[String; 2]>, TemplateError> {
    constants
        .iter()
        .map(|c| {
            let ident = constant_name(class, &c.name);
            names.claim(&ident, &format!("{owner}.{}", c.name))?;
            Ok([ident, format!("= {}", c.value)])
        })
        .collect()
}
