//! # Localization manager
//!
//! [`Manager`] ties the pieces together:
//!
//! ```text
//! build ──► ResourceScope + resolver ──► ResourceLoader ──► ResourceTree
//!                                                              │
//! get_string / get_object / get_keys ◄── LookupCache ◄─────────┘
//! set_culture ──► rebuild ──► change latches ──► update_resource ──► hub
//! ```
//!
//! ## States
//! `Unbuilt → Building → Built`. Any lookup while unbuilt triggers a build
//! with the current options. Every build prepares a complete [`Snapshot`]
//! (tree, cache, culture list) off to the side and publishes it with a single
//! pointer swap, so readers see either the old or the new state, never a mix.
//! A failed build leaves the previous snapshot in place.
//!
//! ## Example
//! ```rust
//! use locman::{Manager, ManagerOptions, MemorySource, ResourceScope};
//! use std::sync::Arc;
//!
//! let source = MemorySource::default()
//!     .with("App.Locales.en_US.strings.yaml", "greeting:\n  hello: Hi\n");
//! let options = ManagerOptions::new(ResourceScope::new("App", "Locales", "strings.yaml"))
//!     .with_culture("en-US");
//! let manager = Manager::new(options, Arc::new(source));
//!
//! manager.build().unwrap();
//! assert_eq!(manager.get_string("greeting.hello"), "Hi");
//! assert_eq!(manager.get_string("greeting"), "");
//! ```

use crate::cache::LookupCache;
use crate::config::ManagerOptions;
use crate::culture::{CultureName, FlowDirection};
use crate::error::BuildError;
use crate::hub::{
    ChangeFlags, DisplayValueTarget, LocaleState, LocaleTarget, Localizer, NotificationHub,
    Registration, ResourceEvent, UpdateOutcome, ValueBinding, ValueProvider,
};
use crate::loader::ResourceLoader;
use crate::log::format_named;
use crate::resolver::{CultureManifest, CultureSelection, Resolution};
use crate::source::ResourceSource;
use crate::tree::{ResourceTree, ResourceValue};
use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Unbuilt,
    Building,
    Built,
}

impl ManagerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ManagerState::Building,
            2 => ManagerState::Built,
            _ => ManagerState::Unbuilt,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ManagerState::Unbuilt => 0,
            ManagerState::Building => 1,
            ManagerState::Built => 2,
        }
    }
}

/// Everything produced by one successful build.
struct Snapshot {
    resolution: Resolution,
    /// Culture whose document was loaded; differs from the resolution after
    /// a default-culture retry.
    culture: CultureName,
    flow_direction: FlowDirection,
    manifest: CultureManifest,
    path: String,
    tree: Arc<dyn ResourceTree>,
    cache: LookupCache,
}

type SystemCulture = Box<dyn Fn() -> Option<CultureName> + Send + Sync>;

/// Localization resource manager.
///
/// Construct one per application and share it (`Arc<Manager>`) with the
/// consumers that need it.
pub struct Manager {
    options: RwLock<ManagerOptions>,
    source: Arc<dyn ResourceSource>,
    system_culture: SystemCulture,
    selection: Mutex<Option<CultureSelection>>,
    snapshot: ArcSwapOption<Snapshot>,
    state: AtomicU8,
    build_lock: Mutex<()>,
    cache_enabled: AtomicBool,
    hub: NotificationHub,
}

impl Manager {
    pub fn new<S>(options: ManagerOptions, source: Arc<S>) -> Self
    where
        S: ResourceSource + 'static,
    {
        let cache_enabled = options.cache_enabled;
        Self {
            options: RwLock::new(options),
            source,
            system_culture: Box::new(|| sys_locale::get_locale().map(CultureName::new)),
            selection: Mutex::new(None),
            snapshot: ArcSwapOption::empty(),
            state: AtomicU8::new(ManagerState::Unbuilt.as_u8()),
            build_lock: Mutex::new(()),
            cache_enabled: AtomicBool::new(cache_enabled),
            hub: NotificationHub::new(),
        }
    }

    /// Replaces the host culture lookup (defaults to `sys-locale`).
    pub fn with_system_culture<F>(mut self, system_culture: F) -> Self
    where
        F: Fn() -> Option<CultureName> + Send + Sync + 'static,
    {
        self.system_culture = Box::new(system_culture);
        self
    }

    pub fn state(&self) -> ManagerState {
        ManagerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ManagerState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub fn options(&self) -> ManagerOptions {
        self.options.read().clone()
    }

    /// Edits the options. Only allowed before the first successful build.
    ///
    /// Changing the requested culture replaces a culture recorded earlier
    /// with [`set_culture`](Self::set_culture).
    pub fn configure<F>(&self, edit: F) -> Result<(), BuildError>
    where
        F: FnOnce(&mut ManagerOptions),
    {
        let _guard = self.build_lock.lock();
        if self.state() != ManagerState::Unbuilt {
            return Err(BuildError::Locked);
        }
        let mut options = self.options.write();
        let requested = options.culture.clone();
        edit(&mut options);
        if options.culture != requested {
            self.selection.lock().take();
        }
        self.cache_enabled
            .store(options.cache_enabled, Ordering::Release);
        Ok(())
    }

    /// Builds (or rebuilds) the resource tree and returns what changed.
    pub fn build(&self) -> Result<ChangeFlags, BuildError> {
        let _guard = self.build_lock.lock();
        self.build_locked(None)
    }

    /// [`build`](Self::build) on the blocking thread pool.
    pub async fn build_async(self: &Arc<Self>) -> Result<ChangeFlags, BuildError> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.build())
            .await
            .map_err(|e| BuildError::Join(e.to_string()))?
    }

    /// Builds with `request` or, when `None`, with the committed selection.
    /// The selection is only committed together with the new snapshot.
    fn build_locked(&self, request: Option<CultureSelection>) -> Result<ChangeFlags, BuildError> {
        let previous_state = self.state();
        self.set_state(ManagerState::Building);

        match self.prepare_snapshot(request) {
            Ok((snapshot, selection)) => {
                let next = Arc::new(snapshot);
                *self.selection.lock() = Some(selection);
                let previous = self.snapshot.swap(Some(Arc::clone(&next)));
                let flags = match previous.as_deref() {
                    Some(prev) => ChangeFlags {
                        culture_changed: prev.culture != next.culture,
                        flow_direction_changed: prev.flow_direction != next.flow_direction,
                    },
                    None => ChangeFlags {
                        culture_changed: true,
                        flow_direction_changed: next.flow_direction != FlowDirection::default(),
                    },
                };
                self.hub.mark_changed(flags);
                self.set_state(ManagerState::Built);
                info!(
                    "resources built for culture '{}' from {}",
                    next.culture, next.path
                );
                Ok(flags)
            }
            Err(e) => {
                self.set_state(previous_state);
                warn!("resource build failed: {}", e);
                Err(e)
            }
        }
    }

    fn prepare_snapshot(
        &self,
        request: Option<CultureSelection>,
    ) -> Result<(Snapshot, CultureSelection), BuildError> {
        let options = self.options();
        let default = &options.default_culture;
        let loader = ResourceLoader::new(
            &*self.source,
            &options.scope,
            options.format,
            options.key_separator,
            default,
        )?;

        let manifest = CultureManifest::new(self.source.list_cultures(&options.scope)?);
        let system = (self.system_culture)();

        let mut selection = request
            .or_else(|| self.selection.lock().clone())
            .unwrap_or_else(|| {
                let requested = options
                    .culture
                    .clone()
                    .or_else(|| system.clone())
                    .unwrap_or_else(|| default.clone());
                CultureSelection::new(requested)
            });
        let resolution = selection
            .validate(&manifest, system.as_ref(), default)
            .clone();
        debug!("resolved culture {:?}", resolution);

        let loaded = loader.load(&resolution.name)?;
        let snapshot = Snapshot {
            flow_direction: loaded.culture.flow_direction(),
            culture: loaded.culture,
            resolution,
            manifest,
            path: loaded.path,
            tree: loaded.tree,
            cache: LookupCache::new(self.cache_enabled.load(Ordering::Acquire)),
        };
        Ok((snapshot, selection))
    }

    /// Builds when nothing has been published yet. A build already running on
    /// another thread is waited for.
    fn ensure_built(&self) {
        if self.snapshot.load().is_some() {
            return;
        }
        let _guard = self.build_lock.lock();
        if self.snapshot.load().is_none() {
            debug!("building resources on first lookup");
            if let Err(e) = self.build_locked(None) {
                warn!("implicit build failed: {}", e);
            }
        }
    }

    fn lookup(&self, key: &str) -> Option<ResourceValue> {
        self.ensure_built();
        let guard = self.snapshot.load();
        let snapshot = guard.as_ref()?;
        snapshot
            .cache
            .get_or_resolve(key, || snapshot.tree.get(key))
    }

    fn string_at(&self, key: &str) -> String {
        match self.lookup(key) {
            Some(ResourceValue::Text(text)) => text,
            _ => String::new(),
        }
    }

    /// Text stored at `key`; empty when missing or not a string.
    pub fn get_string(&self, key: &str) -> String {
        self.string_at(key)
    }

    /// Value stored at `key`, including intermediate maps.
    pub fn get_object(&self, key: &str) -> Option<ResourceValue> {
        self.lookup(key)
    }

    /// Text at `key` with `{name}` placeholders replaced from `args`.
    pub fn format_string(&self, key: &str, args: &[(&str, &str)]) -> String {
        format_named(&self.string_at(key), args)
    }

    /// All fully-qualified leaf keys, or `None` when cancelled.
    pub fn get_keys(&self, token: &CancellationToken) -> Option<BTreeSet<String>> {
        self.ensure_built();
        let mut keys = BTreeSet::new();
        if token.is_cancelled() {
            return None;
        }
        let guard = self.snapshot.load();
        let Some(snapshot) = guard.as_ref() else {
            return Some(keys);
        };

        let flow = snapshot.tree.visit_keys(&mut |key| {
            if token.is_cancelled() {
                return ControlFlow::Break(());
            }
            keys.insert(key.to_string());
            ControlFlow::Continue(())
        });
        match flow {
            ControlFlow::Continue(()) => Some(keys),
            ControlFlow::Break(()) => None,
        }
    }

    /// Culture of the loaded document.
    pub fn culture(&self) -> Option<CultureName> {
        self.snapshot.load().as_ref().map(|s| s.culture.clone())
    }

    pub fn flow_direction(&self) -> FlowDirection {
        self.snapshot
            .load()
            .as_ref()
            .map(|s| s.flow_direction)
            .unwrap_or_default()
    }

    /// Resolver outcome of the last build.
    pub fn resolution(&self) -> Option<Resolution> {
        self.snapshot.load().as_ref().map(|s| s.resolution.clone())
    }

    /// Cultures offered by the source at the last build.
    pub fn cultures(&self) -> Vec<CultureName> {
        self.snapshot
            .load()
            .as_ref()
            .map(|s| s.manifest.cultures().to_vec())
            .unwrap_or_default()
    }

    /// Path of the loaded document.
    pub fn resource_path(&self) -> Option<String> {
        self.snapshot.load().as_ref().map(|s| s.path.clone())
    }

    /// Requests `name`. When already built, the resources are rebuilt and the
    /// change latches set; subscribers are updated by the next
    /// [`update_resource`](Self::update_resource). On failure the previous
    /// culture stays in effect.
    pub fn set_culture(&self, name: &str) -> Result<ChangeFlags, BuildError> {
        let requested = CultureName::new(name);
        let _guard = self.build_lock.lock();

        if self.state() != ManagerState::Built {
            debug!("culture '{}' recorded for the first build", requested);
            *self.selection.lock() = Some(CultureSelection::new(requested));
            return Ok(ChangeFlags::default());
        }

        self.build_locked(Some(CultureSelection::new(requested)))
    }

    /// [`set_culture`](Self::set_culture) followed by
    /// [`update_resource`](Self::update_resource).
    pub fn change_culture(
        &self,
        name: &str,
        token: &CancellationToken,
    ) -> Result<UpdateOutcome, BuildError> {
        self.set_culture(name)?;
        Ok(self.update_resource(token))
    }

    /// Pushes pending culture and flow direction changes to subscribers.
    pub fn update_resource(&self, token: &CancellationToken) -> UpdateOutcome {
        self.hub.update_resource(self, token)
    }

    pub fn pending_changes(&self) -> ChangeFlags {
        self.hub.pending()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.hub.subscribe()
    }

    pub fn enable_cache(&self) {
        self.cache_enabled.store(true, Ordering::Release);
        if let Some(snapshot) = self.snapshot.load().as_ref() {
            snapshot.cache.enable();
        }
    }

    pub fn disable_cache(&self) {
        self.cache_enabled.store(false, Ordering::Release);
        if let Some(snapshot) = self.snapshot.load().as_ref() {
            snapshot.cache.disable();
        }
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.cache_enabled.load(Ordering::Acquire)
    }

    /// Number of entries in the current lookup cache.
    pub fn cached_entries(&self) -> usize {
        self.snapshot
            .load()
            .as_ref()
            .map(|s| s.cache.len())
            .unwrap_or_default()
    }

    /// Registers a window; it receives the current locale immediately.
    pub fn register_window<T>(&self, window: &Arc<T>) -> Registration
    where
        T: LocaleTarget + 'static,
    {
        self.ensure_built();
        self.hub.register_window(window, &self.locale_state())
    }

    /// Registers an element; it receives the current locale immediately.
    pub fn register_element<T>(&self, element: &Arc<T>) -> Registration
    where
        T: LocaleTarget + 'static,
    {
        self.ensure_built();
        self.hub.register_element(element, &self.locale_state())
    }

    /// Binds `provider` to `target` and applies the current value.
    pub fn register_data_value_provider<T, P>(&self, target: &Arc<T>, provider: P) -> Arc<ValueBinding>
    where
        T: DisplayValueTarget + 'static,
        P: ValueProvider + 'static,
    {
        self.ensure_built();
        self.hub.register_value_provider(target, provider, self)
    }

    /// Removes a value binding from the live registry. Idempotent.
    pub fn unregister_data_value_provider(&self, binding: &ValueBinding) {
        self.hub.unregister_value_provider(binding);
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }
}

impl Localizer for Manager {
    fn get_string(&self, key: &str) -> String {
        self.string_at(key)
    }

    fn get_object(&self, key: &str) -> Option<ResourceValue> {
        self.lookup(key)
    }

    fn locale_state(&self) -> LocaleState {
        match self.snapshot.load().as_ref() {
            Some(s) => LocaleState {
                culture: s.culture.clone(),
                flow_direction: s.flow_direction,
            },
            None => LocaleState::default(),
        }
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("state", &self.state())
            .field("culture", &self.culture())
            .field("cache_enabled", &self.is_cache_enabled())
            .finish()
    }
}
