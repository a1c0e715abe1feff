//! # Subscription and notification hub
//!
//! Keeps three live registries of externally owned subscribers and pushes the
//! current locale to them when it changes:
//!
//! | Registry | Subscriber | Updated when |
//! |----------|------------|--------------|
//! | windows  | [`LocaleTarget`] | flow direction changed |
//! | elements | [`LocaleTarget`] | flow direction changed |
//! | values   | [`ValueBinding`] | culture changed |
//!
//! Registries hold weak references; a subscriber that is dropped simply
//! disappears. Registration handles ([`Registration`], [`ValueBinding`])
//! unregister on drop, and unregistering twice or after the hub is gone is a
//! no-op.
//!
//! Registries are snapshotted before each pass, so subscribers may register or
//! unregister from inside a callback.

use crate::culture::{CultureName, FlowDirection};
use crate::tree::ResourceValue;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const EVENT_CAPACITY: usize = 64;

/// Culture and flow direction currently in effect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocaleState {
    pub culture: CultureName,
    pub flow_direction: FlowDirection,
}

/// Read access to the active resources.
pub trait Localizer: Send + Sync {
    /// Text at `key`, empty when missing or not a string.
    fn get_string(&self, key: &str) -> String;

    fn get_object(&self, key: &str) -> Option<ResourceValue>;

    fn locale_state(&self) -> LocaleState;
}

/// A window- or element-like consumer of the locale.
pub trait LocaleTarget: Send + Sync {
    fn apply_locale(&self, state: &LocaleState);
}

/// A consumer displaying a single localized value.
pub trait DisplayValueTarget: Send + Sync {
    fn set_display_value(&self, value: &str);
}

/// Computes the value shown by a [`DisplayValueTarget`].
pub trait ValueProvider: Send + Sync {
    fn provide(&self, resources: &dyn Localizer) -> String;
}

/// Provides the string stored at a dotted key.
#[derive(Debug, Clone)]
pub struct KeyProvider {
    key: String,
}

impl KeyProvider {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl ValueProvider for KeyProvider {
    fn provide(&self, resources: &dyn Localizer) -> String {
        resources.get_string(&self.key)
    }
}

/// Provides a value computed by a closure.
pub struct FnProvider<F>(pub F);

impl<F> ValueProvider for FnProvider<F>
where
    F: Fn(&dyn Localizer) -> String + Send + Sync,
{
    fn provide(&self, resources: &dyn Localizer) -> String {
        (self.0)(resources)
    }
}

/// Which dimensions changed since the last update pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeFlags {
    pub culture_changed: bool,
    pub flow_direction_changed: bool,
}

impl ChangeFlags {
    pub fn is_empty(&self) -> bool {
        !self.culture_changed && !self.flow_direction_changed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ResourceUpdated,
    CultureChanged,
    FlowDirectionChanged,
}

/// Notification fired by [`NotificationHub::update_resource`].
///
/// The flags are the changes that were pending when the pass started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEvent {
    pub kind: EventKind,
    pub culture: CultureName,
    pub flow_direction: FlowDirection,
    pub culture_changed: bool,
    pub flow_direction_changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Completed,
    /// Cancelled before finishing; unprocessed changes stay pending.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegistryKind {
    Window,
    Element,
}

struct Registry<T: ?Sized> {
    entries: Mutex<Vec<(u64, Weak<T>)>>,
}

impl<T: ?Sized> Registry<T> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    fn insert(&self, id: u64, entry: Weak<T>) {
        let mut entries = self.entries.lock();
        if !entries.iter().any(|(i, _)| *i == id) {
            entries.push((id, entry));
        }
    }

    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(i, _)| *i != id);
        entries.len() != before
    }

    fn contains(&self, id: u64) -> bool {
        self.entries.lock().iter().any(|(i, _)| *i == id)
    }

    /// Live entries in registration order; dead ones are pruned.
    fn snapshot(&self) -> Vec<Arc<T>> {
        let mut entries = self.entries.lock();
        entries.retain(|(_, weak)| weak.strong_count() > 0);
        entries.iter().filter_map(|(_, weak)| weak.upgrade()).collect()
    }

    fn len(&self) -> usize {
        self.snapshot().len()
    }
}

struct HubShared {
    windows: Registry<dyn LocaleTarget>,
    elements: Registry<dyn LocaleTarget>,
    values: Registry<ValueBinding>,
    culture_changed: AtomicBool,
    flow_changed: AtomicBool,
    events: broadcast::Sender<ResourceEvent>,
    next_id: AtomicU64,
}

impl HubShared {
    fn registry(&self, kind: RegistryKind) -> &Registry<dyn LocaleTarget> {
        match kind {
            RegistryKind::Window => &self.windows,
            RegistryKind::Element => &self.elements,
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Handle of a window or element registration. Dropping it unregisters.
#[must_use = "dropping the registration unregisters the target"]
pub struct Registration {
    hub: Weak<HubShared>,
    kind: RegistryKind,
    id: u64,
}

impl Registration {
    pub fn is_registered(&self) -> bool {
        self.hub
            .upgrade()
            .is_some_and(|hub| hub.registry(self.kind).contains(self.id))
    }

    /// Unregisters now instead of at drop.
    pub fn unregister(self) {}
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.registry(self.kind).remove(self.id);
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}

/// Binding between a [`DisplayValueTarget`] and a [`ValueProvider`].
///
/// Only active bindings receive culture updates. The owner of the target
/// calls [`activate`](Self::activate) / [`deactivate`](Self::deactivate) as
/// the target comes and goes; dropping the binding unregisters it.
pub struct ValueBinding {
    id: u64,
    hub: Weak<HubShared>,
    target: Weak<dyn DisplayValueTarget>,
    provider: Box<dyn ValueProvider>,
    active: AtomicBool,
}

impl ValueBinding {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Recomputes the value and applies it to the target.
    /// Returns `false` when the target is gone.
    pub fn refresh(&self, resources: &dyn Localizer) -> bool {
        match self.target.upgrade() {
            Some(target) => {
                target.set_display_value(&self.provider.provide(resources));
                true
            }
            None => false,
        }
    }

    /// Joins the live registry and applies the current value.
    pub fn activate(self: &Arc<Self>, resources: &dyn Localizer) {
        if !self.active.swap(true, Ordering::AcqRel) {
            if let Some(hub) = self.hub.upgrade() {
                hub.values.insert(self.id, Arc::downgrade(self));
            }
        }
        self.refresh(resources);
    }

    /// Leaves the live registry. No-op when already inactive.
    pub fn deactivate(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            if let Some(hub) = self.hub.upgrade() {
                hub.values.remove(self.id);
            }
        }
    }
}

impl Drop for ValueBinding {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.values.remove(self.id);
        }
    }
}

impl fmt::Debug for ValueBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueBinding")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Registries, change latches and the event channel.
pub struct NotificationHub {
    shared: Arc<HubShared>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationHub {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(HubShared {
                windows: Registry::new(),
                elements: Registry::new(),
                values: Registry::new(),
                culture_changed: AtomicBool::new(false),
                flow_changed: AtomicBool::new(false),
                events,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.shared.events.subscribe()
    }

    pub fn register_window<T>(&self, window: &Arc<T>, state: &LocaleState) -> Registration
    where
        T: LocaleTarget + 'static,
    {
        self.register(RegistryKind::Window, window, state)
    }

    pub fn register_element<T>(&self, element: &Arc<T>, state: &LocaleState) -> Registration
    where
        T: LocaleTarget + 'static,
    {
        self.register(RegistryKind::Element, element, state)
    }

    fn register<T>(&self, kind: RegistryKind, target: &Arc<T>, state: &LocaleState) -> Registration
    where
        T: LocaleTarget + 'static,
    {
        let id = self.shared.next_id();
        let weak: Weak<dyn LocaleTarget> = Arc::downgrade(target) as Weak<dyn LocaleTarget>;
        self.shared.registry(kind).insert(id, weak);
        target.apply_locale(state);
        debug!("registered {:?} #{}", kind, id);
        Registration {
            hub: Arc::downgrade(&self.shared),
            kind,
            id,
        }
    }

    /// Binds `provider` to `target`, applies the current value and activates
    /// the binding.
    pub fn register_value_provider<T, P>(
        &self,
        target: &Arc<T>,
        provider: P,
        resources: &dyn Localizer,
    ) -> Arc<ValueBinding>
    where
        T: DisplayValueTarget + 'static,
        P: ValueProvider + 'static,
    {
        let binding = Arc::new(ValueBinding {
            id: self.shared.next_id(),
            hub: Arc::downgrade(&self.shared),
            target: Arc::downgrade(target) as Weak<dyn DisplayValueTarget>,
            provider: Box::new(provider),
            active: AtomicBool::new(false),
        });
        binding.activate(resources);
        debug!("registered value provider #{}", binding.id);
        binding
    }

    /// Removes `binding` from the live registry. Idempotent.
    pub fn unregister_value_provider(&self, binding: &ValueBinding) {
        binding.deactivate();
        self.shared.values.remove(binding.id);
    }

    pub fn window_count(&self) -> usize {
        self.shared.windows.len()
    }

    pub fn element_count(&self) -> usize {
        self.shared.elements.len()
    }

    pub fn value_provider_count(&self) -> usize {
        self.shared.values.len()
    }

    /// Sets the latches for every dimension flagged in `flags`.
    pub fn mark_changed(&self, flags: ChangeFlags) {
        if flags.culture_changed {
            self.shared.culture_changed.store(true, Ordering::Release);
        }
        if flags.flow_direction_changed {
            self.shared.flow_changed.store(true, Ordering::Release);
        }
    }

    pub fn pending(&self) -> ChangeFlags {
        ChangeFlags {
            culture_changed: self.shared.culture_changed.load(Ordering::Acquire),
            flow_direction_changed: self.shared.flow_changed.load(Ordering::Acquire),
        }
    }

    /// Pushes pending changes to the subscribers.
    ///
    /// Culture changes refresh the value bindings, flow direction changes
    /// refresh windows then elements. A final `ResourceUpdated` event is fired
    /// once the pass completes. Cancellation is checked before each category
    /// and each subscriber. Updates already pushed are kept; the latch of an
    /// interrupted category is set again so the next pass repeats it.
    pub fn update_resource(
        &self,
        resources: &dyn Localizer,
        token: &CancellationToken,
    ) -> UpdateOutcome {
        if token.is_cancelled() {
            debug!("resource update deferred");
            return UpdateOutcome::Deferred;
        }

        let shared = &self.shared;
        let flags = self.pending();
        let state = resources.locale_state();

        if shared.culture_changed.swap(false, Ordering::AcqRel) {
            self.emit(EventKind::CultureChanged, &state, flags);
            for binding in shared.values.snapshot() {
                if token.is_cancelled() {
                    shared.culture_changed.store(true, Ordering::Release);
                    debug!("culture update interrupted");
                    return UpdateOutcome::Deferred;
                }
                binding.refresh(resources);
            }
        }

        if token.is_cancelled() {
            return UpdateOutcome::Deferred;
        }

        if shared.flow_changed.swap(false, Ordering::AcqRel) {
            self.emit(EventKind::FlowDirectionChanged, &state, flags);
            let targets = shared
                .windows
                .snapshot()
                .into_iter()
                .chain(shared.elements.snapshot());
            for target in targets {
                if token.is_cancelled() {
                    shared.flow_changed.store(true, Ordering::Release);
                    debug!("flow direction update interrupted");
                    return UpdateOutcome::Deferred;
                }
                target.apply_locale(&state);
            }
        }

        self.emit(EventKind::ResourceUpdated, &state, flags);
        UpdateOutcome::Completed
    }

    fn emit(&self, kind: EventKind, state: &LocaleState, flags: ChangeFlags) {
        debug!("{:?} ({}, {:?})", kind, state.culture, state.flow_direction);
        // no receivers is fine
        let _ = self.shared.events.send(ResourceEvent {
            kind,
            culture: state.culture.clone(),
            flow_direction: state.flow_direction,
            culture_changed: flags.culture_changed,
            flow_direction_changed: flags.flow_direction_changed,
        });
    }
}
