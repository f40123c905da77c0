//! Template Codegen Engine: renders the resolved model into Go and C source.
//!
//! Output is a fixed list of [`OutputUnit`]s. Each unit runs one template
//! module against the [`ResolvedModel`] and yields one or more
//! [`GeneratedArtifact`]s. Templates iterate the model in its canonical
//! order, so the same model always renders byte-identical text.

mod code_writer;
mod templates;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::api::ApiModel;
use crate::error::TemplateError;
use crate::resolve::{GoPackage, ResolvedModel, TypeMapping};

pub use code_writer::CodeWriter;

/// Banner placed at the top of every generated file.
pub const DEFAULT_BANNER: &str = "Code generated by gdext-codegen. DO NOT EDIT.";

/// Go module the generated packages live in.
pub const DEFAULT_MODULE_PATH: &str = "github.com/godot-go/godot-go";

/// A logical group of generated files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutputUnit {
    BuiltinClasses,
    BuiltinBindings,
    Variant,
    ClassInterfaces,
    ClassRefInterfaces,
    ClassImpl,
    ClassRefs,
    ClassInit,
    Enums,
    Constants,
    NativeStructures,
    UtilityFunctions,
    Ffi,
}

impl OutputUnit {
    /// Every unit, in generation order.
    pub const ALL: [OutputUnit; 13] = [
        OutputUnit::BuiltinClasses,
        OutputUnit::BuiltinBindings,
        OutputUnit::Variant,
        OutputUnit::ClassInterfaces,
        OutputUnit::ClassRefInterfaces,
        OutputUnit::ClassImpl,
        OutputUnit::ClassRefs,
        OutputUnit::ClassInit,
        OutputUnit::Enums,
        OutputUnit::Constants,
        OutputUnit::NativeStructures,
        OutputUnit::UtilityFunctions,
        OutputUnit::Ffi,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OutputUnit::BuiltinClasses => "builtin_classes",
            OutputUnit::BuiltinBindings => "builtin_bindings",
            OutputUnit::Variant => "variant",
            OutputUnit::ClassInterfaces => "class_interfaces",
            OutputUnit::ClassRefInterfaces => "class_ref_interfaces",
            OutputUnit::ClassImpl => "class_impl",
            OutputUnit::ClassRefs => "class_refs",
            OutputUnit::ClassInit => "class_init",
            OutputUnit::Enums => "enums",
            OutputUnit::Constants => "constants",
            OutputUnit::NativeStructures => "native_structures",
            OutputUnit::UtilityFunctions => "utility_functions",
            OutputUnit::Ffi => "ffi",
        }
    }
}

impl fmt::Display for OutputUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One generated file, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub unit: OutputUnit,
    pub path: PathBuf,
    /// Id of the template that produced the content.
    pub template: &'static str,
    pub content: String,
}

/// Renders [`GeneratedArtifact`]s from a [`ResolvedModel`].
#[derive(Debug)]
pub struct CodeGenerator<'a> {
    model: &'a ResolvedModel,

    /// Custom banner comment
    banner: Option<String>,

    module_path: String,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(model: &'a ResolvedModel) -> Self {
        Self {
            model,
            banner: None,
            module_path: DEFAULT_MODULE_PATH.to_string(),
        }
    }

    /// Set a custom banner comment for the generated files.
    pub fn set_banner(&mut self, banner: impl Into<String>) -> &mut Self {
        self.banner = Some(banner.into());
        self
    }

    /// Set the Go module path used in generated imports.
    pub fn set_module_path(&mut self, module_path: impl Into<String>) -> &mut Self {
        self.module_path = module_path.into();
        self
    }

    pub fn banner(&self) -> &str {
        self.banner.as_deref().unwrap_or(DEFAULT_BANNER)
    }

    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    /// Render a single unit.
    pub fn generate(&self, unit: OutputUnit) -> Result<Vec<GeneratedArtifact>, TemplateError> {
        let cx = Context {
            model: self.model,
            banner: self.banner(),
            module_path: &self.module_path,
        };
        let artifacts = match unit {
            OutputUnit::BuiltinClasses => templates::builtin::render(&cx)?,
            OutputUnit::BuiltinBindings => templates::bindings::render(&cx)?,
            OutputUnit::Variant => templates::variant::render(&cx)?,
            OutputUnit::ClassInterfaces => templates::class_interfaces::render(&cx)?,
            OutputUnit::ClassRefInterfaces => templates::class_interfaces::render_refs(&cx)?,
            OutputUnit::ClassImpl => templates::class_impl::render(&cx)?,
            OutputUnit::ClassRefs => templates::class_impl::render_refs(&cx)?,
            OutputUnit::ClassInit => templates::class_init::render(&cx)?,
            OutputUnit::Enums => templates::enums::render(&cx)?,
            OutputUnit::Constants => templates::constants::render(&cx)?,
            OutputUnit::NativeStructures => templates::native_structures::render(&cx)?,
            OutputUnit::UtilityFunctions => templates::utility_functions::render(&cx)?,
            OutputUnit::Ffi => templates::ffi::render(&cx)?,
        };
        for artifact in &artifacts {
            debug!(
                unit = %unit,
                template = artifact.template,
                path = %artifact.path.display(),
                bytes = artifact.content.len(),
                "rendered artifact"
            );
        }
        Ok(artifacts)
    }

    /// Render every unit in [`OutputUnit::ALL`] order.
    ///
    /// Stops at the first template failure; nothing is returned for a
    /// partially rendered run.
    pub fn generate_all(&self) -> Result<Vec<GeneratedArtifact>, TemplateError> {
        let mut artifacts = Vec::new();
        for unit in OutputUnit::ALL {
            artifacts.extend(self.generate(unit)?);
        }
        info!(artifacts = artifacts.len(), "generated bindings");
        Ok(artifacts)
    }
}

/// What every template sees: the model plus output settings.
pub(crate) struct Context<'a> {
    pub model: &'a ResolvedModel,
    banner: &'a str,
    module_path: &'a str,
}

impl<'a> Context<'a> {
    pub fn api(&self) -> &'a ApiModel {
        self.model.api()
    }

    pub fn go_file(&self, package: GoPackage) -> GoFile {
        GoFile {
            package,
            packages: BTreeSet::new(),
            std: BTreeSet::new(),
            cgo_preamble: None,
            w: CodeWriter::new(),
        }
    }

    /// A C source or header file body, starting with the banner.
    pub fn c_file(&self) -> CodeWriter {
        let mut w = CodeWriter::new();
        for line in self.banner.lines() {
            w.line(format!("// {line}"));
        }
        w.blank_line();
        w
    }

    pub fn artifact(
        &self,
        unit: OutputUnit,
        template: &'static str,
        path: &str,
        content: String,
    ) -> GeneratedArtifact {
        GeneratedArtifact {
            unit,
            path: PathBuf::from(path),
            template,
            content,
        }
    }

    /// The mapping for a type reference, or a [`TemplateError`] against `entity`.
    pub fn mapping(
        &self,
        template: &'static str,
        entity: &str,
        name: &str,
        meta: Option<&str>,
    ) -> Result<&'a TypeMapping, TemplateError> {
        self.model
            .mapping(name, meta)
            .ok_or_else(|| TemplateError::new(template, entity, format!("no type mapping for `{name}`")))
    }

    fn import_path(&self, package: GoPackage) -> String {
        format!("{}/pkg/{}", self.module_path, package.name())
    }
}

/// A Go source file under construction that tracks the imports its body uses.
pub(crate) struct GoFile {
    package: GoPackage,
    packages: BTreeSet<GoPackage>,
    std: BTreeSet<&'static str>,
    cgo_preamble: Option<String>,
    pub w: CodeWriter,
}

impl GoFile {
    pub fn package(&self) -> GoPackage {
        self.package
    }

    fn use_package(&mut self, package: GoPackage) {
        if package != GoPackage::Universe && package != self.package {
            self.packages.insert(package);
        }
    }

    fn use_mapping(&mut self, mapping: &TypeMapping) {
        self.use_package(mapping.package);
        if mapping.target.starts_with("unsafe.") {
            self.std.insert("unsafe");
        }
    }

    fn use_encoder(&mut self, mapping: &TypeMapping) {
        self.use_mapping(mapping);
        self.use_package(GoPackage::Builtin);
    }

    pub fn import_std(&mut self, name: &'static str) {
        self.std.insert(name);
    }

    /// Include `header` in the cgo preamble and import `"C"`.
    pub fn cgo_include(&mut self, header: &str) {
        let preamble = self.cgo_preamble.get_or_insert_with(String::new);
        preamble.push_str(&format!("#include \"{header}\"\n"));
    }

    /// `ident` declared in `package`, as spelled in this file.
    pub fn qualify(&mut self, package: GoPackage, ident: &str) -> String {
        self.use_package(package);
        package.qualify(ident, self.package)
    }

    /// A runtime bridge identifier from the `builtin` package.
    pub fn runtime(&mut self, ident: &str) -> String {
        self.qualify(GoPackage::Builtin, ident)
    }

    /// An ABI type or constant from the `ffi` package.
    pub fn ffi(&mut self, ident: &str) -> String {
        self.qualify(GoPackage::Ffi, ident)
    }

    pub fn ty(&mut self, mapping: &TypeMapping) -> String {
        self.use_mapping(mapping);
        mapping.go_type(self.package)
    }

    pub fn encode_arg(&mut self, mapping: &TypeMapping, expr: &str) -> String {
        self.use_encoder(mapping);
        mapping.encode_arg(expr, self.package)
    }

    pub fn new_return_slot(&mut self, mapping: &TypeMapping) -> String {
        self.use_encoder(mapping);
        mapping.new_return_slot(self.package)
    }

    pub fn decode(&mut self, mapping: &TypeMapping, slot: &str) -> String {
        self.use_encoder(mapping);
        mapping.decode(slot, self.package)
    }

    pub fn encode_into(&mut self, mapping: &TypeMapping, expr: &str, slot: &str) -> String {
        self.use_encoder(mapping);
        mapping.encode_into(expr, slot, self.package)
    }

    pub fn to_variant(&mut self, mapping: &TypeMapping, expr: &str) -> String {
        self.use_encoder(mapping);
        mapping.to_variant(expr, self.package)
    }

    pub fn from_variant(&mut self, mapping: &TypeMapping, expr: &str) -> String {
        self.use_encoder(mapping);
        mapping.from_variant(expr, self.package)
    }

    /// Like [`CodeWriter::block`], with the whole file available to the body
    /// so it can record imports.
    pub fn block<R>(&mut self, open: impl AsRef<str>, f: impl FnOnce(&mut GoFile) -> R) -> R {
        self.w.open(open);
        let result = f(self);
        self.w.close();
        result
    }

    /// Banner, package clause and imports, followed by the body.
    pub fn finish(self, cx: &Context<'_>) -> String {
        let mut head = CodeWriter::new();
        for line in cx.banner.lines() {
            head.line(format!("// {line}"));
        }
        head.blank_line();
        head.line(format!("package {}", self.package.name()));
        head.blank_line();

        if let Some(preamble) = &self.cgo_preamble {
            head.line("/*");
            head.lines(preamble);
            head.line("*/");
            head.line("import \"C\"");
            head.blank_line();
        }

        let mut imports: Vec<String> = self.std.iter().map(|s| format!("\"{s}\"")).collect();
        if !self.std.is_empty() && !self.packages.is_empty() {
            imports.push(String::new());
        }
        let mut paths: Vec<String> = self.packages.iter().map(|&p| cx.import_path(p)).collect();
        paths.sort();
        imports.extend(paths.iter().map(|path| format!("\"{path}\"")));
        match imports.as_slice() {
            [] => {}
            [single] => {
                head.line(format!("import {single}"));
                head.blank_line();
            }
            _ => {
                head.group("import", |w| {
                    for import in &imports {
                        w.line(import);
                    }
                });
                head.blank_line();
            }
        }

        let mut out = head.finish();
        let body = self.w.finish();
        if body.trim().is_empty() {
            return out;
        }
        out.push('\n');
        out.push_str(&body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BuildConfiguration, load_api};
    use crate::header::parse_header;
    use crate::resolve::Resolver;

    fn model() -> ResolvedModel {
        let api = load_api(
            r#"{"classes": [{"name": "Object"}]}"#,
            BuildConfiguration::Float64,
        )
        .unwrap();
        Resolver::new()
            .resolve(api, parse_header("").unwrap())
            .unwrap()
    }

    #[test]
    fn test_output_units_in_order() {
        assert_eq!(OutputUnit::ALL.len(), 13);
        assert_eq!(OutputUnit::ALL[0], OutputUnit::BuiltinClasses);
        assert_eq!(OutputUnit::ALL[12], OutputUnit::Ffi);
        let mut sorted = OutputUnit::ALL;
        sorted.sort();
        assert_eq!(sorted, OutputUnit::ALL);
        assert_eq!(OutputUnit::ClassRefs.to_string(), "class_refs");
    }

    #[test]
    fn test_go_file_tracks_imports() {
        let model = model();
        let generator = CodeGenerator::new(&model);
        let cx = Context {
            model: &model,
            banner: generator.banner(),
            module_path: generator.module_path(),
        };

        let mut file = cx.go_file(GoPackage::ClassImpl);
        let ptr = file.ffi("GDExtensionObjectPtr");
        file.w.line(format!("var owner {ptr}"));
        file.import_std("unsafe");
        let text = file.finish(&cx);

        assert!(text.starts_with("// Code generated by gdext-codegen. DO NOT EDIT.\n\npackage gdclassimpl\n"));
        assert!(text.contains("import (\n\t\"unsafe\"\n\n\t\"github.com/godot-go/godot-go/pkg/ffi\"\n)\n"));
        assert!(text.ends_with("var owner ffi.GDExtensionObjectPtr\n"));
    }

    #[test]
    fn test_custom_banner_and_module_path() {
        let model = model();
        let mut generator = CodeGenerator::new(&model);
        generator
            .set_banner("Generated bindings.\nDo not edit.")
            .set_module_path("example.com/game");
        let cx = Context {
            model: &model,
            banner: generator.banner(),
            module_path: generator.module_path(),
        };

        let mut file = cx.go_file(GoPackage::Constant);
        let variant = file.runtime("Variant");
        file.w.line(format!("var v {variant}"));
        let text = file.finish(&cx);
        assert!(text.starts_with("// Generated bindings.\n// Do not edit.\n"));
        assert!(text.contains("import \"example.com/game/pkg/builtin\"\n"));
    }

    #[test]
    fn test_generate_all_is_deterministic() {
        let model = model();
        let generator = CodeGenerator::new(&model);
        let first = generator.generate_all().unwrap();
        let second = generator.generate_all().unwrap();
        assert_eq!(first, second);
        assert!(first.iter().all(|a| a.content.ends_with('\n')));
    }
}
