//! Run configuration: defaults, an optional `gdext-codegen.toml` at the
//! project root, then explicit overrides (usually command-line flags).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::api::BuildConfiguration;
use crate::error::ConfigError;
use crate::generator::DEFAULT_MODULE_PATH;

/// Configuration file looked up at the project root.
pub const CONFIG_FILE_NAME: &str = "gdext-codegen.toml";

pub const DEFAULT_HEADER: &str = "godot_headers/godot/gdextension_interface.h";
pub const DEFAULT_API: &str = "godot_headers/extension_api.json";

const HEADER_FILE_NAME: &str = "gdextension_interface.h";
const API_FILE_NAME: &str = "extension_api.json";

/// Contents of `gdext-codegen.toml`. Every key is optional; unknown keys
/// are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub header: Option<PathBuf>,
    pub api: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub build_configuration: Option<BuildConfiguration>,
    /// Go module used in generated imports.
    pub module_path: Option<String>,
    pub banner: Option<String>,
    pub opaque_pointer_fallback: Option<bool>,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Effective settings for one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub project_root: PathBuf,
    pub header: PathBuf,
    pub api: PathBuf,
    pub output_dir: PathBuf,
    pub build_configuration: BuildConfiguration,
    pub module_path: String,
    pub banner: Option<String>,
    pub opaque_pointer_fallback: bool,
}

impl Config {
    /// Defaults, with input and output paths under `project_root`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        Self {
            header: project_root.join(DEFAULT_HEADER),
            api: project_root.join(DEFAULT_API),
            output_dir: project_root.clone(),
            build_configuration: BuildConfiguration::default(),
            module_path: DEFAULT_MODULE_PATH.to_string(),
            banner: None,
            opaque_pointer_fallback: true,
            project_root,
        }
    }

    /// Defaults layered with a configuration file: `config_path` when given
    /// (it must exist), otherwise [`CONFIG_FILE_NAME`] at the root if present.
    pub fn load(project_root: impl Into<PathBuf>, config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::new(project_root);
        let path = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => Some(config.project_root.join(CONFIG_FILE_NAME)).filter(|p| p.is_file()),
        };
        if let Some(path) = path {
            debug!(path = %path.display(), "reading configuration");
            config.apply(ConfigFile::from_file(&path)?);
        }
        Ok(config)
    }

    /// Layer file values over the current settings. Relative paths are taken
    /// relative to the project root.
    pub fn apply(&mut self, file: ConfigFile) -> &mut Self {
        if let Some(header) = file.header {
            self.header = self.project_root.join(header);
        }
        if let Some(api) = file.api {
            self.api = self.project_root.join(api);
        }
        if let Some(output_dir) = file.output_dir {
            self.output_dir = self.project_root.join(output_dir);
        }
        if let Some(build) = file.build_configuration {
            self.build_configuration = build;
        }
        if let Some(module_path) = file.module_path {
            self.module_path = module_path;
        }
        if file.banner.is_some() {
            self.banner = file.banner;
        }
        if let Some(fallback) = file.opaque_pointer_fallback {
            self.opaque_pointer_fallback = fallback;
        }
        self
    }

    pub fn set_header(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.header = path.into();
        self
    }

    pub fn set_api(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.api = path.into();
        self
    }

    pub fn set_output_dir(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.output_dir = path.into();
        self
    }

    pub fn set_build_configuration(&mut self, build: BuildConfiguration) -> &mut Self {
        self.build_configuration = build;
        self
    }

    pub fn set_module_path(&mut self, module_path: impl Into<String>) -> &mut Self {
        self.module_path = module_path.into();
        self
    }

    /// Replace inputs that do not exist with the first matching file found
    /// under the project root.
    pub fn discover_inputs(&mut self) -> Result<&mut Self, ConfigError> {
        if !self.header.is_file() {
            self.header = discover(&self.project_root, HEADER_FILE_NAME)?;
        }
        if !self.api.is_file() {
            self.api = discover(&self.project_root, API_FILE_NAME)?;
        }
        Ok(self)
    }
}

/// Depth-first, name-sorted search for `file_name`, skipping hidden and
/// `target` directories.
fn discover(root: &Path, file_name: &'static str) -> Result<PathBuf, ConfigError> {
    let found = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry))
        .filter_map(Result::ok)
        .find(|entry| entry.file_type().is_file() && entry.file_name() == file_name)
        .map(DirEntry::into_path);

    match found {
        Some(path) => {
            info!(path = %path.display(), "discovered {file_name}");
            Ok(path)
        }
        None => Err(ConfigError::MissingInput {
            what: file_name,
            root: root.to_path_buf(),
        }),
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.') || name == "target")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new("/project");
        assert_eq!(config.header, Path::new("/project").join(DEFAULT_HEADER));
        assert_eq!(config.api, Path::new("/project").join(DEFAULT_API));
        assert_eq!(config.output_dir, Path::new("/project"));
        assert_eq!(config.build_configuration, BuildConfiguration::Float64);
        assert_eq!(config.module_path, "github.com/godot-go/godot-go");
        assert!(config.opaque_pointer_fallback);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
header = "vendor/gdextension_interface.h"
output_dir = "gen"
build_configuration = "double_64"
module_path = "example.com/game"
opaque_pointer_fallback = false
"#;
        let file = ConfigFile::from_str(toml).unwrap();
        let mut config = Config::new("/project");
        config.apply(file);
        assert_eq!(config.header, Path::new("/project/vendor/gdextension_interface.h"));
        assert_eq!(config.output_dir, Path::new("/project/gen"));
        assert_eq!(config.build_configuration, BuildConfiguration::Double64);
        assert_eq!(config.module_path, "example.com/game");
        assert!(!config.opaque_pointer_fallback);
        assert_eq!(config.api, Path::new("/project").join(DEFAULT_API));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = ConfigFile::from_str("headr = \"x.h\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("headr"));
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::load(dir.path(), Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_root_config_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "banner = \"custom\"\n").unwrap();
        let config = Config::load(dir.path(), None).unwrap();
        assert_eq!(config.banner.as_deref(), Some("custom"));
    }

    #[test]
    fn test_discover_inputs_skips_hidden_and_target() {
        let dir = tempfile::tempdir().unwrap();
        for sub in [".cache", "target", "vendor/godot"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
            fs::write(dir.path().join(sub).join(HEADER_FILE_NAME), "").unwrap();
        }
        fs::write(dir.path().join("vendor").join(API_FILE_NAME), "{}").unwrap();

        let mut config = Config::new(dir.path());
        config.discover_inputs().unwrap();
        assert_eq!(config.header, dir.path().join("vendor/godot").join(HEADER_FILE_NAME));
        assert_eq!(config.api, dir.path().join("vendor").join(API_FILE_NAME));
    }

    #[test]
    fn test_discover_reports_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::new(dir.path()).discover_inputs().unwrap_err();
        assert!(matches!(err, ConfigError::MissingInput { what: HEADER_FILE_NAME, .. }));
    }
}
