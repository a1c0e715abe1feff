//! # Resource loader
//!
//! Turns a resolved culture into a [`ResourceTree`]:
//!
//! 1. build the document path from the scope and the culture;
//! 2. open it through the [`BlobSource`], retrying once with the default
//!    culture when it is missing;
//! 3. deserialize the stream (YAML keeps the nested tree, JSON is flattened).
//!
//! The stream is owned by the loader for the duration of the parse and
//! dropped on every exit path.

use crate::culture::CultureName;
use crate::error::{BuildError, MalformedResource};
use crate::scope::ResourceScope;
use crate::source::BlobSource;
use crate::tree::{FlatTree, KeySeparator, NestedTree, ResourceTree, ResourceValue};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Serialization format of the resource documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceFormat {
    Yaml,
    Json,
}

impl ResourceFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(ResourceFormat::Yaml),
            "json" => Some(ResourceFormat::Json),
            _ => None,
        }
    }

    /// Deserializes a document. YAML documents are walked live, JSON
    /// documents are flattened with `separator`.
    pub fn parse<R: Read>(
        self,
        reader: R,
        separator: KeySeparator,
    ) -> Result<Arc<dyn ResourceTree>, MalformedResource> {
        match self {
            ResourceFormat::Yaml => {
                let value: serde_yaml::Value = serde_yaml::from_reader(reader)?;
                match ResourceValue::from_yaml(value) {
                    Some(ResourceValue::Map(root)) => {
                        Ok(Arc::new(NestedTree::new(Arc::unwrap_or_clone(root))))
                    }
                    _ => Err(MalformedResource::NotAMapping),
                }
            }
            ResourceFormat::Json => {
                let value: serde_json::Value = serde_json::from_reader(reader)?;
                match ResourceValue::from_json(value) {
                    Some(ResourceValue::Map(root)) => Ok(Arc::new(FlatTree::new(
                        Arc::unwrap_or_clone(root),
                        separator,
                    ))),
                    _ => Err(MalformedResource::NotAMapping),
                }
            }
        }
    }
}

/// A successfully loaded document.
#[derive(Debug, Clone)]
pub struct LoadedResource {
    /// Culture whose document was actually read.
    pub culture: CultureName,
    pub path: String,
    pub tree: Arc<dyn ResourceTree>,
}

/// Loads per-culture documents of one scope.
pub struct ResourceLoader<'a, S: BlobSource + ?Sized> {
    source: &'a S,
    scope: &'a ResourceScope,
    format: ResourceFormat,
    separator: KeySeparator,
    default_culture: &'a CultureName,
}

impl<'a, S: BlobSource + ?Sized> ResourceLoader<'a, S> {
    /// Creates a loader; the format is taken from `format` or, when absent,
    /// from the extension of the resource file.
    pub fn new(
        source: &'a S,
        scope: &'a ResourceScope,
        format: Option<ResourceFormat>,
        separator: KeySeparator,
        default_culture: &'a CultureName,
    ) -> Result<Self, BuildError> {
        if let Some(field) = scope.missing_field() {
            return Err(BuildError::NotBuildable(field.to_string()));
        }
        let format = format
            .or_else(|| scope.extension().and_then(|e| ResourceFormat::from_extension(&e)))
            .ok_or_else(|| {
                BuildError::NotBuildable(format!(
                    "resource format for '{}'",
                    scope.resource_filename
                ))
            })?;

        Ok(Self {
            source,
            scope,
            format,
            separator,
            default_culture,
        })
    }

    pub fn format(&self) -> ResourceFormat {
        self.format
    }

    /// Loads the document of `culture`, falling back once to the default
    /// culture.
    pub fn load(&self, culture: &CultureName) -> Result<LoadedResource, BuildError> {
        let mut candidates = vec![culture.clone()];
        if culture != self.default_culture {
            candidates.push(self.default_culture.clone());
        }

        let mut last_path = String::new();
        for candidate in candidates {
            let path = self
                .scope
                .resource_path(&candidate, self.source.path_style());
            debug!("opening resource {}", path);

            match self.source.try_open(&path)? {
                Some(blob) => {
                    let tree = self
                        .format
                        .parse(blob, self.separator)
                        .map_err(|source| BuildError::Malformed {
                            path: path.clone(),
                            source,
                        })?;
                    info!("loaded resource {} for culture '{}'", path, candidate);
                    return Ok(LoadedResource {
                        culture: candidate,
                        path,
                        tree,
                    });
                }
                None => {
                    warn!("resource for culture '{}' not found at {}", candidate, path);
                    last_path = path;
                }
            }
        }

        Err(BuildError::NotFound {
            culture: culture.clone(),
            path: last_path,
        })
    }
}
