//! # gdext-codegen
//!
//! Go/cgo binding generator for the engine's extension ABI. It reads the C
//! interface header (`gdextension_interface.h`) and the API descriptor
//! (`extension_api.json`) and writes Go packages plus the C shims cgo needs
//! to call through the interface's function pointers.
//!
//! The pipeline is parse → load → resolve → generate → write:
//!
//! - [`header`] recovers declarations from the header.
//! - [`api`] validates and orders the descriptor.
//! - [`resolve`] maps every type reference to Go and derives identifiers.
//! - [`generator`] renders the resolved model through fixed templates.
//! - [`writer`] persists the artifacts, leaving unchanged files alone.
//!
//! ## Usage
//!
//! ### Run the whole pipeline
//!
//! ```rust,ignore
//! use gdext_codegen::{Config, Pipeline};
//!
//! let config = Config::load("path/to/project", None)?;
//! let report = Pipeline::new(config).run()?;
//! println!("{} files written", report.written.len());
//! ```
//!
//! ### Drive the stages yourself
//!
//! ```rust,ignore
//! use gdext_codegen::api::{load_api, BuildConfiguration};
//! use gdext_codegen::header::parse_header;
//! use gdext_codegen::resolve::Resolver;
//! use gdext_codegen::CodeGenerator;
//!
//! let header = parse_header(&header_text)?;
//! let api = load_api(&api_json, BuildConfiguration::Float64)?;
//! let model = Resolver::new().resolve(api, header)?;
//! let artifacts = CodeGenerator::new(&model)
//!     .set_module_path("example.com/game")
//!     .generate_all()?;
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod generator;
pub mod header;
pub mod resolve;
pub mod writer;

use std::fs;
use std::path::Path;

use tracing::info;

pub use config::Config;
pub use error::{Error, Result};
pub use generator::{CodeGenerator, GeneratedArtifact, OutputUnit};
pub use resolve::{ResolvedModel, Resolver};
pub use writer::{OutputWriter, WriteReport};

/// Runs every stage for one [`Config`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Config,
    resolver: Resolver,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        let mut resolver = Resolver::new();
        resolver.set_opaque_pointer_fallback(config.opaque_pointer_fallback);
        Self { config, resolver }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The resolver used for the run, e.g. to register extra type mappings.
    pub fn resolver_mut(&mut self) -> &mut Resolver {
        &mut self.resolver
    }

    /// Parse, load and resolve the inputs.
    pub fn resolve(&self) -> Result<ResolvedModel> {
        let header_text = read_input(&self.config.header)?;
        let api_text = read_input(&self.config.api)?;

        let header = header::parse_header(&header_text)?;
        info!(path = %self.config.header.display(), declarations = header.len(), "parsed header");

        let api = api::load_api(&api_text, self.config.build_configuration)?;
        info!(
            path = %self.config.api.display(),
            build = %self.config.build_configuration,
            classes = api.classes().len(),
            "loaded API descriptor"
        );

        let model = self.resolver.resolve(api, header)?;
        info!(types = model.type_count(), shims = model.shims().len(), "resolved types");
        Ok(model)
    }

    /// Everything up to, but not including, writing.
    pub fn generate(&self) -> Result<Vec<GeneratedArtifact>> {
        let model = self.resolve()?;
        let mut generator = CodeGenerator::new(&model);
        generator.set_module_path(&self.config.module_path);
        if let Some(banner) = &self.config.banner {
            generator.set_banner(banner);
        }
        Ok(generator.generate_all()?)
    }

    /// Generate and write every artifact under the output directory.
    pub fn run(&self) -> Result<WriteReport> {
        let artifacts = self.generate()?;
        Ok(OutputWriter::new(&self.config.output_dir).write(&artifacts)?)
    }

    /// Generate and compare against the output directory without writing.
    pub fn check(&self) -> Result<WriteReport> {
        let artifacts = self.generate()?;
        let mut writer = OutputWriter::new(&self.config.output_dir);
        writer.set_check(true);
        Ok(writer.write(&artifacts)?)
    }
}

fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Input {
        path: path.to_path_buf(),
        source,
    })
}
