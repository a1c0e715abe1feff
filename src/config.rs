//! Manager configuration

use crate::culture::{CultureName, DEFAULT_CULTURE};
use crate::error::ConfigError;
use crate::loader::ResourceFormat;
use crate::scope::ResourceScope;
use crate::tree::KeySeparator;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_culture() -> CultureName {
    DEFAULT_CULTURE.clone()
}

/// Options read by [`Manager::build`](crate::manager::Manager::build).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ManagerOptions {
    pub scope: ResourceScope,
    /// Requested culture; the host culture is used when unset.
    #[serde(default)]
    pub culture: Option<CultureName>,
    #[serde(default = "default_culture")]
    pub default_culture: CultureName,
    /// Overrides the format inferred from the file extension.
    #[serde(default)]
    pub format: Option<ResourceFormat>,
    /// Joiner of flattened JSON keys.
    #[serde(default)]
    pub key_separator: KeySeparator,
    #[serde(default)]
    pub cache_enabled: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self::new(ResourceScope::new("", "locales", "strings.yaml"))
    }
}

impl ManagerOptions {
    pub fn new(scope: ResourceScope) -> Self {
        Self {
            scope,
            culture: None,
            default_culture: default_culture(),
            format: None,
            key_separator: KeySeparator::default(),
            cache_enabled: false,
        }
    }

    pub fn with_culture(mut self, culture: impl Into<CultureName>) -> Self {
        self.culture = Some(culture.into());
        self
    }

    pub fn with_default_culture(mut self, culture: impl Into<CultureName>) -> Self {
        self.default_culture = culture.into();
        self
    }

    pub fn with_key_separator(mut self, separator: KeySeparator) -> Self {
        self.key_separator = separator;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Loads options from default location
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Loads options from specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        if !path_ref.exists() {
            return Err(ConfigError::NotFound(
                path_ref.to_string_lossy().to_string(),
            ));
        }

        let content = fs::read_to_string(path_ref)?;
        let options: ManagerOptions = ron::from_str(&content)?;
        Ok(options)
    }

    /// Saves options to default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::get_config_path()?;
        self.save_to_path(&config_path)
    }

    /// Saves options to specific path
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent() {
            fs::create_dir_all(parent)?;
        }

        let pretty = ron::ser::PrettyConfig::new();
        let ron_str = ron::ser::to_string_pretty(self, pretty)?;
        fs::write(path_ref, ron_str)?;

        Ok(())
    }

    /// Returns default options path (`~/.locman/options.ron`)
    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| ConfigError::NotFound("Home directory not found".to_string()))?;

        let mut config_path = home_dir;
        config_path.push(".locman");
        config_path.push("options.ron");

        Ok(config_path)
    }

    /// Creates default options file if missing
    pub fn ensure_default() -> Result<(), ConfigError> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            ManagerOptions::default().save()?;
        }

        Ok(())
    }
}
