//! # Resource scope
//!
//! A [`ResourceScope`] tells the loader where the per-culture documents live.
//! Paths come in two styles:
//!
//! | Style | Example |
//! |-------|---------|
//! | [`PathStyle::Manifest`] | `MyApp.Assets.Locales.en_US.strings.yaml` |
//! | [`PathStyle::Directory`] | `assets/Locales/en_US/strings.yaml` |
//!
//! The culture segment always uses the locale form (`en_US`); the manifest
//! listers convert it back to display form with [`ResourceScope::culture_from_path`].

use crate::culture::CultureName;
use serde::{Deserialize, Serialize};

/// How the segments of a resource path are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// Dot-joined manifest names of compiled-in resources.
    Manifest,
    /// Slash-joined relative paths.
    Directory,
}

impl PathStyle {
    pub fn separator(self) -> char {
        match self {
            PathStyle::Manifest => '.',
            PathStyle::Directory => '/',
        }
    }
}

/// Location of the per-culture resource documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceScope {
    /// Opaque ownership token (crate or assembly name). Carried, never inspected.
    #[serde(default)]
    pub owner: Option<String>,
    /// Path prefix in front of the directory, may be empty.
    #[serde(default)]
    pub parent_path: String,
    pub directory_name: String,
    /// File name including its extension, e.g. `strings.yaml`.
    pub resource_filename: String,
}

impl ResourceScope {
    pub fn new(
        parent_path: impl Into<String>,
        directory_name: impl Into<String>,
        resource_filename: impl Into<String>,
    ) -> Self {
        Self {
            owner: None,
            parent_path: parent_path.into(),
            directory_name: directory_name.into(),
            resource_filename: resource_filename.into(),
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Returns the name of the first missing required field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.directory_name.trim().is_empty() {
            Some("directory_name")
        } else if self.resource_filename.trim().is_empty() {
            Some("resource_filename")
        } else {
            None
        }
    }

    pub fn is_buildable(&self) -> bool {
        self.missing_field().is_none()
    }

    /// Extension of the resource file, lowercased.
    pub fn extension(&self) -> Option<String> {
        self.resource_filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    /// Builds the path of the document for `culture`.
    ///
    /// Path separators inside `parent_path` (`/`, `\`) are translated to the
    /// target style. The neutral culture contributes no segment.
    pub fn resource_path(&self, culture: &CultureName, style: PathStyle) -> String {
        let mut segments = self.prefix_segments(style);
        if !culture.is_neutral() {
            segments.push(culture.locale_form());
        }
        segments.push(self.resource_filename.clone());
        segments.join(&style.separator().to_string())
    }

    /// Inverse of [`resource_path`](Self::resource_path): extracts the culture
    /// from a path that belongs to this scope.
    pub fn culture_from_path(&self, path: &str, style: PathStyle) -> Option<CultureName> {
        let sep = style.separator().to_string();
        let mut prefix = self.prefix_segments(style).join(&sep);
        if !prefix.is_empty() {
            prefix.push_str(&sep);
        }
        let suffix = format!("{}{}", sep, self.resource_filename);

        let rest = path.strip_prefix(&prefix)?;
        if rest == self.resource_filename {
            return Some(CultureName::neutral());
        }
        let culture = rest.strip_suffix(&suffix)?;
        if culture.is_empty() || culture.contains(style.separator()) {
            return None;
        }
        Some(CultureName::new(culture))
    }

    /// Path of the directory holding the per-culture documents.
    pub fn directory_path(&self, style: PathStyle) -> String {
        self.prefix_segments(style).join(&style.separator().to_string())
    }

    fn prefix_segments(&self, style: PathStyle) -> Vec<String> {
        let translated = self
            .parent_path
            .replace(['/', '\\'], &style.separator().to_string());
        translated
            .split(style.separator())
            .chain(std::iter::once(self.directory_name.as_str()))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
