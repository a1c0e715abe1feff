//! # Culture names
//!
//! Culture identifiers appear in two notations:
//! - **display form** (`en-US`), used in manifests, options and events;
//! - **locale form** (`en_US`), used when a culture becomes part of a
//!   resource path.
//!
//! [`CultureName`] always stores the display form. Two names that differ only
//! in separator or ASCII case compare (and hash) equal.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use unic_langid::{CharacterDirection, LanguageIdentifier};

/// Separator used by the display form.
pub const DISPLAY_SEPARATOR: char = '-';

/// Separator used by the locale (path) form.
pub const LOCALE_SEPARATOR: char = '_';

/// Culture used when neither the requested nor the host culture is available.
pub static DEFAULT_CULTURE: Lazy<CultureName> = Lazy::new(|| CultureName::new("en-US"));

/// A culture identifier normalized to display form.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CultureName(String);

impl CultureName {
    /// Normalizes `raw` into display form.
    ///
    /// Encoding suffixes (`en_US.UTF-8`) and modifiers (`sr_RS@latin`) as
    /// reported by POSIX hosts are stripped.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let trimmed = raw.as_ref().trim();
        let stripped = trimmed.split(['.', '@']).next().unwrap_or_default();
        Self(stripped.replace(LOCALE_SEPARATOR, "-"))
    }

    /// The empty, culture-neutral name.
    pub fn neutral() -> Self {
        Self(String::new())
    }

    pub fn is_neutral(&self) -> bool {
        self.0.is_empty()
    }

    /// Display form, e.g. `en-US`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Locale (path) form, e.g. `en_US`.
    pub fn locale_form(&self) -> String {
        self.0.replace(DISPLAY_SEPARATOR, "_")
    }

    /// Returns `true` when `self` is the language part of `other`
    /// (`en` is a parent of `en-GB`). Case-insensitive.
    pub fn is_parent_of(&self, other: &CultureName) -> bool {
        if self.is_neutral() || other.0.len() <= self.0.len() {
            return false;
        }
        let split = self.0.len();
        match (other.0.get(..split), other.0.get(split..)) {
            (Some(head), Some(tail)) => {
                head.eq_ignore_ascii_case(&self.0) && tail.starts_with(DISPLAY_SEPARATOR)
            }
            _ => false,
        }
    }

    /// Text flow direction of the script used by this culture.
    pub fn flow_direction(&self) -> FlowDirection {
        match self.0.parse::<LanguageIdentifier>() {
            Ok(id) if matches!(id.character_direction(), CharacterDirection::RTL) => {
                FlowDirection::RightToLeft
            }
            _ => FlowDirection::LeftToRight,
        }
    }
}

impl PartialEq for CultureName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for CultureName {}

impl Hash for CultureName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for CultureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CultureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CultureName({:?})", self.0)
    }
}

impl From<&str> for CultureName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CultureName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<CultureName> for String {
    fn from(value: CultureName) -> Self {
        value.0
    }
}

/// Text layout direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlowDirection {
    #[default]
    LeftToRight,
    RightToLeft,
}
