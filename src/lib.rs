//! # locman
//!
//! Localization resource manager: loads one YAML or JSON document per
//! culture, resolves dotted keys against it, falls back to a default culture
//! and keeps registered consumers in sync when the culture changes.

pub mod cache;
pub mod cli;
pub mod config;
pub mod culture;
pub mod error;
pub mod hub;
pub mod loader;
pub mod log;
pub mod manager;
pub mod resolver;
pub mod scope;
pub mod source;
pub mod tree;

pub use config::ManagerOptions;
pub use culture::{CultureName, FlowDirection, DEFAULT_CULTURE};
pub use error::{BuildError, ConfigError, MalformedResource};
pub use hub::{
    ChangeFlags, DisplayValueTarget, EventKind, FnProvider, KeyProvider, LocaleState,
    LocaleTarget, Localizer, Registration, ResourceEvent, UpdateOutcome, ValueBinding,
    ValueProvider,
};
pub use loader::ResourceFormat;
pub use manager::{Manager, ManagerState};
pub use scope::{PathStyle, ResourceScope};
pub use source::{BlobSource, EmbeddedSource, FsSource, ManifestLister, MemorySource};
pub use tree::{KeySeparator, ResourceValue};
