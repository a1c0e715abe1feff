use crate::culture::CultureName;
use thiserror::Error;

/// Failure while building the resource tree.
///
/// A failed build never replaces a previously built tree.
#[derive(Error, Debug)]
pub enum BuildError {
    /// A required scope field is missing.
    #[error("Resource scope is not buildable: missing {0}")]
    NotBuildable(String),

    /// Neither the requested nor the default culture document exists.
    #[error("Resource not found for culture '{culture}' (last path tried: {path})")]
    NotFound { culture: CultureName, path: String },

    /// The document exists but could not be deserialized.
    #[error("Malformed resource {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: MalformedResource,
    },

    /// Filesystem or stream error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Options were changed after the first build.
    #[error("Options are locked once the manager has been built")]
    Locked,

    /// The background build task did not complete.
    #[error("Build task failed: {0}")]
    Join(String),
}

/// Deserializer-level failure.
#[derive(Error, Debug)]
pub enum MalformedResource {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document root is not a mapping.
    #[error("document root must be a mapping")]
    NotAMapping,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON error: {0}")]
    RonError(#[from] ron::Error),
    #[error("Configuration file not found: {0}")]
    NotFound(String),
}
