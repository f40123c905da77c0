//! Error taxonomy for the generation pipeline.
//!
//! Each stage owns an error type carrying the entity it failed on. The
//! crate-level [`Error`] wraps them so callers can handle every failure with
//! one type, while `Display` keeps the stage name in front of the cause.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A malformed declaration in the ABI header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}{}: {message}", declaration_suffix(.declaration))]
pub struct ParseError {
    /// 1-based line where the problem was detected.
    pub line: usize,
    /// Name of the declaration being parsed, when it was already known.
    pub declaration: Option<String>,
    pub message: String,
}

fn declaration_suffix(declaration: &Option<String>) -> String {
    declaration
        .as_deref()
        .map(|name| format!(" (in `{name}`)"))
        .unwrap_or_default()
}

impl ParseError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            declaration: None,
            message: message.into(),
        }
    }

    /// Attach the declaration name unless a more specific one is already set.
    pub fn in_declaration(mut self, name: impl Into<String>) -> Self {
        if self.declaration.is_none() {
            self.declaration = Some(name.into());
        }
        self
    }
}

/// A structurally invalid API descriptor.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The descriptor is not well-formed JSON or does not match the expected shape.
    #[error("malformed descriptor: {0}")]
    Json(#[from] serde_json::Error),

    /// An entry failed validation. `path` locates it, e.g.
    /// `classes.Node.methods.add_child.arguments[1]`.
    #[error("{path}: {message}")]
    Invalid { path: String, message: String },
}

impl SchemaError {
    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.into(),
            message: message.into(),
        }
    }

    /// The entity path of a validation failure.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Invalid { path, .. } => Some(path),
            Self::Json(_) => None,
        }
    }
}

/// A type name that no rule could map, with every place it was referenced from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedType {
    pub type_name: String,
    pub sites: Vec<String>,
}

impl fmt::Display for UnresolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unresolved type `{}` referenced by {}",
            self.type_name,
            self.sites.join(", ")
        )
    }
}

/// Failures of the type and name resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// One or more type references could not be mapped.
    #[error("{}", render_unresolved(.0))]
    UnresolvedTypes(Vec<UnresolvedType>),

    /// Two distinct entities derive the same target identifier.
    #[error("generated name `{name}` collides between {first} and {second}")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },
}

fn render_unresolved(types: &[UnresolvedType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ResolveError {
    /// Names of every unresolved type, empty for other variants.
    pub fn unresolved_names(&self) -> Vec<&str> {
        match self {
            Self::UnresolvedTypes(types) => types.iter().map(|t| t.type_name.as_str()).collect(),
            Self::NameCollision { .. } => Vec::new(),
        }
    }
}

/// A template could not be instantiated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("template `{template}` failed on {entity}: {message}")]
pub struct TemplateError {
    pub template: &'static str,
    pub entity: String,
    pub message: String,
}

impl TemplateError {
    pub fn new(template: &'static str, entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            template,
            entity: entity.into(),
            message: message.into(),
        }
    }
}

/// A generated artifact could not be persisted.
#[derive(Debug, Error)]
#[error("failed to write {}: {source}", .path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Invalid or unreadable run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown build configuration `{0}` (expected float_32, float_64, double_32 or double_64)")]
    BuildConfiguration(String),

    #[error("could not locate {what} under {}", .root.display())]
    MissingInput { what: &'static str, root: PathBuf },
}

/// Unified error type for a generation run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("header parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("API descriptor rejected: {0}")]
    Schema(#[from] SchemaError),

    #[error("type resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("code generation failed: {0}")]
    Template(#[from] TemplateError),

    #[error("output failed: {0}")]
    Write(#[from] WriteError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to read {}: {source}", .path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A [`Result`] type alias using the unified [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }

    pub fn is_resolve(&self) -> bool {
        matches!(self, Self::Resolve(_))
    }

    pub fn is_template(&self) -> bool {
        matches!(self, Self::Template(_))
    }

    /// Filesystem failures, on either the input or the output side.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Write(_) | Self::Input { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_with_declaration() {
        let err = ParseError::new(12, "expected `;`").in_declaration("GDExtensionFoo");
        assert_eq!(err.to_string(), "line 12 (in `GDExtensionFoo`): expected `;`");
    }

    #[test]
    fn test_parse_error_keeps_innermost_declaration() {
        let err = ParseError::new(3, "bad field")
            .in_declaration("Inner")
            .in_declaration("Outer");
        assert_eq!(err.declaration.as_deref(), Some("Inner"));
    }

    #[test]
    fn test_unresolved_display_lists_sites() {
        let err = ResolveError::UnresolvedTypes(vec![UnresolvedType {
            type_name: "Frobnicator".to_string(),
            sites: vec!["classes.Node.methods.frob.arguments[0]".to_string()],
        }]);
        let text = Error::from(err).to_string();
        assert!(text.starts_with("type resolution failed: "));
        assert!(text.contains("`Frobnicator`"));
        assert!(text.contains("classes.Node.methods.frob"));
    }
}
