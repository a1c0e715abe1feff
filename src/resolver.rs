//! # Locale resolver
//!
//! Picks the culture whose document will be loaded. Resolution order:
//!
//! 1. the requested culture (exact or parent-language match);
//! 2. the host's installed culture, when it differs from the request;
//! 3. the default culture, reported as unmatched.
//!
//! The resolver never fails: a miss is signalled through
//! [`Resolution::matched`] so the loader can decide what to do.

use crate::culture::CultureName;
use tracing::debug;

/// Ordered list of cultures available for a scope.
///
/// Index `0` is always the neutral sentinel (empty name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CultureManifest {
    cultures: Vec<CultureName>,
}

impl CultureManifest {
    pub fn new(cultures: impl IntoIterator<Item = CultureName>) -> Self {
        let mut list = vec![CultureName::neutral()];
        for culture in cultures {
            if !list.contains(&culture) {
                list.push(culture);
            }
        }
        Self { cultures: list }
    }

    pub fn as_slice(&self) -> &[CultureName] {
        &self.cultures
    }

    /// Cultures without the neutral sentinel.
    pub fn cultures(&self) -> &[CultureName] {
        &self.cultures[1..]
    }

    pub fn len(&self) -> usize {
        self.cultures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cultures.len() <= 1
    }

    fn find(&self, requested: &CultureName) -> Option<usize> {
        if requested.is_neutral() {
            return Some(0);
        }
        self.cultures
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, candidate)| *candidate == requested || candidate.is_parent_of(requested))
            .map(|(index, _)| index)
    }
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub name: CultureName,
    /// Position in the manifest; `None` when nothing matched.
    pub index: Option<usize>,
    pub matched: bool,
}

/// Resolves `requested` against `manifest`.
pub fn resolve(
    requested: &CultureName,
    manifest: &CultureManifest,
    system: Option<&CultureName>,
    default: &CultureName,
) -> Resolution {
    if let Some(index) = manifest.find(requested) {
        return Resolution {
            name: manifest.as_slice()[index].clone(),
            index: Some(index),
            matched: true,
        };
    }

    if let Some(system) = system.filter(|s| *s != requested) {
        debug!("'{}' not available, trying host culture '{}'", requested, system);
        if let Some(index) = manifest.find(system) {
            return Resolution {
                name: manifest.as_slice()[index].clone(),
                index: Some(index),
                matched: true,
            };
        }
    }

    debug!("falling back to default culture '{}'", default);
    Resolution {
        name: default.clone(),
        index: None,
        matched: false,
    }
}

/// A requested culture together with its validated manifest index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CultureSelection {
    requested: CultureName,
    resolution: Option<Resolution>,
}

impl CultureSelection {
    pub fn new(requested: CultureName) -> Self {
        Self {
            requested,
            resolution: None,
        }
    }

    pub fn requested(&self) -> &CultureName {
        &self.requested
    }

    pub fn is_validated(&self) -> bool {
        self.resolution.as_ref().is_some_and(|r| r.index.is_some())
    }

    /// Resolves the selection once. A selection that already holds a
    /// manifest index is returned unchanged.
    pub fn validate(
        &mut self,
        manifest: &CultureManifest,
        system: Option<&CultureName>,
        default: &CultureName,
    ) -> &Resolution {
        if !self.is_validated() {
            self.resolution = Some(resolve(&self.requested, manifest, system, default));
        }
        self.resolution
            .get_or_insert_with(|| resolve(&self.requested, manifest, system, default))
    }
}
