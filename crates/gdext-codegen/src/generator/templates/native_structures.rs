//! Go mirrors of the engine's native structures.

use crate::error::TemplateError;
use crate::generator::templates::NameSet;
use crate::generator::{Context, GeneratedArtifact, OutputUnit};
use crate::resolve::GoPackage;
use crate::resolve::naming::to_pascal_case;

pub(crate) const TEMPLATE: &str = "native_structures";
const PATH: &str = "pkg/nativestructure/nativestructures.gen.go";

pub(in crate::generator) fn render(cx: &Context<'_>) -> Result<Vec<GeneratedArtifact>, TemplateError> {
    let mut file = cx.go_file(GoPackage::NativeStructure);

    for structure in cx.api().native_structures() {
        let entity = format!("native_structures.{}", structure.name);
        let mappings = cx
            .model
            .native_fields(&structure.name)
            .ok_or_else(|| TemplateError::new(TEMPLATE, &entity, "structure fields were not resolved"))?;

        let mut names = NameSet::new(TEMPLATE);
        let mut fields = Vec::with_capacity(structure.fields.len());
        for (field, mapping) in structure.fields.iter().zip(mappings) {
            let ident = to_pascal_case(&field.name);
            names.claim(&ident, &format!("{entity}.{}", field.name))?;
            let mut go_type = file.ty(mapping);
            if let Some(len) = field.array_len {
                go_type = format!("[{len}]{go_type}");
            }
            let mut cells = vec![ident, go_type];
            if let Some(default) = &field.default_value {
                cells.push(format!("// defaults to {default}"));
            }
            fields.push(cells);
        }

        file.w.line(format!(
            "// {} mirrors the engine's native {} structure.",
            structure.name, structure.name
        ));
        file.w.line("//");
        file.w.line(format!("// Format: `{}`", structure.format));
        file.w.block(format!("type {} struct", structure.name), |w| {
            for field in &fields {
                w.cells(field);
            }
        });
        file.w.blank_line();
    }

    let content = file.finish(cx);
    Ok(vec![cx.artifact(OutputUnit::NativeStructures, TEMPLATE, PATH, content)])
}
