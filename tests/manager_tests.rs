use locman::hub::{
    DisplayValueTarget, EventKind, FnProvider, KeyProvider, LocaleState, LocaleTarget, Localizer,
    UpdateOutcome,
};
use locman::source::Blob;
use locman::{
    BlobSource, BuildError, CultureName, FlowDirection, FsSource, KeySeparator, Manager,
    ManagerOptions, ManagerState, ManifestLister, MemorySource, PathStyle, ResourceScope,
    ResourceValue,
};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

const EN: &str = "App.Locales.en_US.strings.yaml";
const FR: &str = "App.Locales.fr.strings.yaml";
const AR: &str = "App.Locales.ar.strings.yaml";

fn source() -> Arc<MemorySource> {
    Arc::new(
        MemorySource::default()
            .with(EN, "greeting:\n  hello: Hi\ntitle: Title\n")
            .with(FR, "greeting:\n  hello: Salut\ntitle: Titre\n")
            .with(AR, "greeting:\n  hello: Marhaba\ntitle: Unwan\n"),
    )
}

fn manager_with(source: Arc<MemorySource>, culture: &str) -> Manager {
    let options = ManagerOptions::new(ResourceScope::new("App", "Locales", "strings.yaml"))
        .with_culture(culture);
    Manager::new(options, source).with_system_culture(|| None)
}

#[derive(Default)]
struct Window {
    applied: Mutex<Vec<LocaleState>>,
}

impl LocaleTarget for Window {
    fn apply_locale(&self, state: &LocaleState) {
        self.applied.lock().push(state.clone());
    }
}

#[derive(Default)]
struct Label {
    value: Mutex<String>,
}

impl Label {
    fn text(&self) -> String {
        self.value.lock().clone()
    }
}

impl DisplayValueTarget for Label {
    fn set_display_value(&self, value: &str) {
        *self.value.lock() = value.to_string();
    }
}

#[test]
fn test_greeting_lookups() {
    let manager = manager_with(source(), "en-US");
    manager.build().unwrap();

    assert_eq!(manager.get_string("greeting.hello"), "Hi");
    assert_eq!(manager.get_string("greeting"), "");
    assert!(manager.get_object("missing.key").is_none());
    assert!(matches!(
        manager.get_object("greeting"),
        Some(ResourceValue::Map(_))
    ));
    assert_eq!(manager.get_string(""), "");
}

#[test]
fn test_build_is_idempotent() {
    let source = source();
    let manager = manager_with(Arc::clone(&source), "en-US");

    let first = manager.build().unwrap();
    assert!(first.culture_changed);
    assert!(!first.flow_direction_changed);

    let second = manager.build().unwrap();
    assert!(second.is_empty());
    assert_eq!(manager.get_string("greeting.hello"), "Hi");
    assert_eq!(manager.culture(), Some(CultureName::new("en-US")));
    assert_eq!(source.open_count(), 2);
}

#[test]
fn test_unknown_culture_falls_back_to_default() {
    let source = Arc::new(
        MemorySource::default()
            .with("App.Locales.en.strings.yaml", "title: Title")
            .with("App.Locales.fr.strings.yaml", "title: Titre"),
    );
    let options = ManagerOptions::new(ResourceScope::new("App", "Locales", "strings.yaml"))
        .with_culture("xx-YY")
        .with_default_culture("en");
    let manager = Manager::new(options, source).with_system_culture(|| None);

    manager.build().unwrap();
    let resolution = manager.resolution().unwrap();
    assert_eq!(resolution.name.as_str(), "en");
    assert!(!resolution.matched);
    assert_eq!(resolution.index, None);
    assert_eq!(manager.get_string("title"), "Title");
}

#[test]
fn test_parent_language_match() {
    let source = Arc::new(
        MemorySource::default()
            .with("App.Locales.en.strings.yaml", "title: Title")
            .with("App.Locales.fr.strings.yaml", "title: Titre"),
    );
    let manager = manager_with(source, "en-GB");

    manager.build().unwrap();
    let resolution = manager.resolution().unwrap();
    assert_eq!(resolution.name.as_str(), "en");
    assert!(resolution.matched);
    assert_eq!(resolution.index, Some(1));
    assert_eq!(
        manager.cultures(),
        vec![CultureName::new("en"), CultureName::new("fr")]
    );
}

#[test]
fn test_host_culture_is_tried_second() {
    let options = ManagerOptions::new(ResourceScope::new("App", "Locales", "strings.yaml"))
        .with_culture("xx-YY");
    let manager =
        Manager::new(options, source()).with_system_culture(|| Some(CultureName::new("fr_FR")));

    manager.build().unwrap();
    assert_eq!(manager.culture(), Some(CultureName::new("fr")));
    assert_eq!(manager.get_string("title"), "Titre");
}

#[test]
fn test_rebuild_never_serves_stale_cache() {
    let source = source();
    let manager = manager_with(Arc::clone(&source), "en-US");
    manager.enable_cache();
    manager.build().unwrap();

    assert_eq!(manager.get_string("title"), "Title");
    assert_eq!(manager.cached_entries(), 1);

    source.insert(EN, "title: Heading\n");
    assert_eq!(manager.get_string("title"), "Title");

    manager.build().unwrap();
    assert_eq!(manager.cached_entries(), 0);
    assert_eq!(manager.get_string("title"), "Heading");

    manager.set_culture("fr").unwrap();
    assert_eq!(manager.get_string("title"), "Titre");
}

#[test]
fn test_disabling_cache_clears_entries() {
    let manager = manager_with(source(), "en-US");
    manager.enable_cache();
    manager.get_string("title");
    manager.get_string("greeting.hello");
    assert_eq!(manager.cached_entries(), 2);

    manager.disable_cache();
    assert!(!manager.is_cache_enabled());
    assert_eq!(manager.cached_entries(), 0);
    assert_eq!(manager.get_string("title"), "Title");
    assert_eq!(manager.cached_entries(), 0);
}

#[test]
fn test_notification_order() {
    let manager = manager_with(source(), "en-US");
    let mut events = manager.subscribe();
    let token = CancellationToken::new();

    manager.build().unwrap();
    assert_eq!(manager.update_resource(&token), UpdateOutcome::Completed);
    assert_eq!(events.try_recv().unwrap().kind, EventKind::CultureChanged);
    assert_eq!(events.try_recv().unwrap().kind, EventKind::ResourceUpdated);
    assert!(events.try_recv().is_err());

    let outcome = manager.change_culture("ar", &token).unwrap();
    assert_eq!(outcome, UpdateOutcome::Completed);

    let kinds: Vec<EventKind> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::CultureChanged,
            EventKind::FlowDirectionChanged,
            EventKind::ResourceUpdated
        ]
    );
    assert!(manager.pending_changes().is_empty());
    assert_eq!(manager.flow_direction(), FlowDirection::RightToLeft);
}

#[test]
fn test_update_without_changes_only_reports_update() {
    let manager = manager_with(source(), "en-US");
    let token = CancellationToken::new();
    manager.build().unwrap();
    manager.update_resource(&token);

    let mut events = manager.subscribe();
    assert_eq!(manager.update_resource(&token), UpdateOutcome::Completed);
    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, EventKind::ResourceUpdated);
    assert!(!event.culture_changed);
    assert!(!event.flow_direction_changed);
    assert!(events.try_recv().is_err());
}

#[test]
fn test_subscribers_receive_state_on_register() {
    let manager = manager_with(source(), "en-US");
    let window = Arc::new(Window::default());
    let element = Arc::new(Window::default());
    let label = Arc::new(Label::default());

    let _window_reg = manager.register_window(&window);
    let _element_reg = manager.register_element(&element);
    let _binding = manager.register_data_value_provider(&label, KeyProvider::new("title"));

    assert_eq!(window.applied.lock().len(), 1);
    assert_eq!(
        window.applied.lock()[0].culture,
        CultureName::new("en-US")
    );
    assert_eq!(element.applied.lock().len(), 1);
    assert_eq!(label.text(), "Title");
    assert_eq!(manager.hub().window_count(), 1);
    assert_eq!(manager.hub().element_count(), 1);
    assert_eq!(manager.hub().value_provider_count(), 1);
}

#[test]
fn test_culture_change_updates_values_and_flow_updates_windows() {
    let manager = manager_with(source(), "en-US");
    let token = CancellationToken::new();
    let window = Arc::new(Window::default());
    let label = Arc::new(Label::default());
    let _reg = manager.register_window(&window);
    let _binding = manager.register_data_value_provider(&label, KeyProvider::new("title"));
    manager.update_resource(&token);
    let applied = window.applied.lock().len();

    manager.change_culture("fr", &token).unwrap();
    assert_eq!(label.text(), "Titre");
    assert_eq!(window.applied.lock().len(), applied);

    manager.change_culture("ar", &token).unwrap();
    assert_eq!(label.text(), "Unwan");
    let last = window.applied.lock().last().cloned().unwrap();
    assert_eq!(last.flow_direction, FlowDirection::RightToLeft);
    assert_eq!(last.culture, CultureName::new("ar"));
}

#[test]
fn test_inactive_binding_is_skipped() {
    let manager = manager_with(source(), "en-US");
    let token = CancellationToken::new();
    let label = Arc::new(Label::default());
    let binding = manager.register_data_value_provider(
        &label,
        FnProvider(|res: &dyn Localizer| format!("[{}]", res.get_string("greeting.hello"))),
    );
    assert_eq!(label.text(), "[Hi]");

    binding.deactivate();
    manager.change_culture("fr", &token).unwrap();
    assert_eq!(label.text(), "[Hi]");

    binding.activate(&manager);
    assert_eq!(label.text(), "[Salut]");

    manager.unregister_data_value_provider(&binding);
    manager.unregister_data_value_provider(&binding);
    assert_eq!(manager.hub().value_provider_count(), 0);
}

#[test]
fn test_dropped_subscribers_are_forgotten() {
    let manager = manager_with(source(), "en-US");
    let window = Arc::new(Window::default());
    let registration = manager.register_window(&window);
    assert!(registration.is_registered());

    drop(window);
    assert_eq!(manager.hub().window_count(), 0);

    let other = Arc::new(Window::default());
    let registration = manager.register_window(&other);
    registration.unregister();
    assert_eq!(manager.hub().window_count(), 0);
}

#[test]
fn test_cancelled_update_is_deferred() {
    let manager = manager_with(source(), "en-US");
    let label = Arc::new(Label::default());
    let _binding = manager.register_data_value_provider(&label, KeyProvider::new("title"));
    manager.update_resource(&CancellationToken::new());
    let mut events = manager.subscribe();

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let outcome = manager.change_culture("fr", &cancelled).unwrap();

    assert_eq!(outcome, UpdateOutcome::Deferred);
    assert_eq!(label.text(), "Title");
    assert!(manager.pending_changes().culture_changed);
    assert!(events.try_recv().is_err());

    assert_eq!(
        manager.update_resource(&CancellationToken::new()),
        UpdateOutcome::Completed
    );
    assert_eq!(label.text(), "Titre");
    assert!(manager.pending_changes().is_empty());
}

#[test]
fn test_failed_rebuild_keeps_previous_resources() {
    let source = source();
    let manager = manager_with(Arc::clone(&source), "en-US");
    manager.build().unwrap();

    source.insert(FR, "title: [unclosed");
    assert!(matches!(
        manager.set_culture("fr"),
        Err(BuildError::Malformed { .. })
    ));
    assert_eq!(manager.state(), ManagerState::Built);
    assert_eq!(manager.culture(), Some(CultureName::new("en-US")));
    assert_eq!(manager.get_string("title"), "Title");

    // the failed request is forgotten
    manager.build().unwrap();
    assert_eq!(manager.culture(), Some(CultureName::new("en-US")));

    source.remove(EN);
    assert!(matches!(manager.build(), Err(BuildError::NotFound { .. })));
    assert_eq!(manager.get_string("greeting.hello"), "Hi");
}

#[test]
fn test_lookup_builds_implicitly() {
    let manager = manager_with(source(), "fr");
    assert_eq!(manager.state(), ManagerState::Unbuilt);
    assert_eq!(manager.get_string("greeting.hello"), "Salut");
    assert_eq!(manager.state(), ManagerState::Built);
}

#[test]
fn test_set_culture_before_build() {
    let manager = manager_with(source(), "en-US");
    let flags = manager.set_culture("fr").unwrap();
    assert!(flags.is_empty());
    assert_eq!(manager.state(), ManagerState::Unbuilt);

    manager.build().unwrap();
    assert_eq!(manager.get_string("title"), "Titre");
}

#[test]
fn test_format_string() {
    let source = Arc::new(
        MemorySource::default().with(EN, "welcome: \"Hello, {name}! You have {count} messages.\""),
    );
    let manager = manager_with(source, "en-US");
    assert_eq!(
        manager.format_string("welcome", &[("name", "Ada"), ("count", "3")]),
        "Hello, Ada! You have 3 messages."
    );
    assert_eq!(manager.format_string("missing", &[("name", "Ada")]), "");
}

#[test]
fn test_get_keys() {
    let manager = manager_with(source(), "en-US");
    let keys = manager.get_keys(&CancellationToken::new()).unwrap();
    let expected: BTreeSet<String> = ["greeting.hello", "title"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(keys, expected);

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert!(manager.get_keys(&cancelled).is_none());
}

#[test]
fn test_json_documents_are_flattened() {
    let source = Arc::new(MemorySource::default().with(
        "App.Locales.en_US.strings.json",
        r#"{"menu":{"file":{"text":"File","crowdinContext":"x"},"quit":"Quit"}}"#,
    ));
    let options = ManagerOptions::new(ResourceScope::new("App", "Locales", "strings.json"))
        .with_culture("en-US")
        .with_key_separator(KeySeparator::Underscore);
    let manager = Manager::new(options, source).with_system_culture(|| None);

    assert_eq!(manager.get_string("menu_file"), "File");
    assert_eq!(manager.get_string("menu_quit"), "Quit");
    assert_eq!(manager.get_string("menu_file_crowdinContext"), "");

    let keys = manager.get_keys(&CancellationToken::new()).unwrap();
    assert!(keys.contains("menu_file"));
    assert!(!keys.iter().any(|k| k.contains("crowdinContext")));
}

#[test]
fn test_yaml_marker_objects_are_leaves() {
    let source = Arc::new(MemorySource::default().with(
        EN,
        "menu:\n  file:\n    text: File\n    crowdinContext: top menu\n",
    ));
    let manager = manager_with(source, "en-US");
    assert_eq!(manager.get_string("menu.file"), "File");
    assert!(manager.get_object("menu.file.crowdinContext").is_none());
}

#[test]
fn test_documents_on_disk() {
    let tmp_dir = tempdir().unwrap();
    let locales = tmp_dir.path().join("res").join("locales");
    std::fs::create_dir_all(locales.join("en_US")).unwrap();
    std::fs::create_dir_all(locales.join("de")).unwrap();
    std::fs::write(locales.join("en_US").join("ui.yaml"), "title: Title").unwrap();
    std::fs::write(locales.join("de").join("ui.yaml"), "title: Titel").unwrap();

    let options = ManagerOptions::new(ResourceScope::new("res", "locales", "ui.yaml"))
        .with_culture("de-AT");
    let manager = Manager::new(options, Arc::new(FsSource::new(tmp_dir.path())))
        .with_system_culture(|| None);

    manager.build().unwrap();
    assert_eq!(manager.get_string("title"), "Titel");
    assert_eq!(manager.resource_path().as_deref(), Some("res/locales/de/ui.yaml"));
    assert_eq!(
        manager.cultures(),
        vec![CultureName::new("de"), CultureName::new("en-US")]
    );
}

#[tokio::test]
async fn test_build_async() {
    let manager = Arc::new(manager_with(source(), "fr"));
    let flags = manager.build_async().await.unwrap();
    assert!(flags.culture_changed);
    assert_eq!(manager.get_string("title"), "Titre");
}

#[tokio::test]
async fn test_events_reach_async_subscribers() {
    let manager = Arc::new(manager_with(source(), "en-US"));
    let mut events = manager.subscribe();
    manager.build_async().await.unwrap();

    let worker = Arc::clone(&manager);
    tokio::task::spawn_blocking(move || worker.update_resource(&CancellationToken::new()))
        .await
        .unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(event.kind, EventKind::CultureChanged);
    assert_eq!(event.culture, CultureName::new("en-US"));
}

#[test]
fn test_configure_after_failed_first_build() {
    let source = Arc::new(MemorySource::default().with(FR, "title: Titre\n"));
    let manager = manager_with(source, "de");

    assert!(matches!(manager.build(), Err(BuildError::NotFound { .. })));
    assert_eq!(manager.state(), ManagerState::Unbuilt);

    manager
        .configure(|o| o.culture = Some(CultureName::new("fr")))
        .unwrap();
    manager.build().unwrap();
    assert_eq!(manager.culture(), Some(CultureName::new("fr")));
    assert_eq!(manager.get_string("title"), "Titre");
}

#[test]
fn test_configure_overrides_recorded_culture() {
    let manager = manager_with(source(), "en-US");
    manager.set_culture("ar").unwrap();

    manager.configure(|o| o.cache_enabled = true).unwrap();
    manager
        .configure(|o| o.culture = Some(CultureName::new("fr")))
        .unwrap();
    manager.build().unwrap();
    assert_eq!(manager.get_string("title"), "Titre");
}

/// Holds the first open until released.
struct GatedSource {
    inner: MemorySource,
    gated: AtomicBool,
    entered: Barrier,
    release: Barrier,
}

impl BlobSource for GatedSource {
    fn try_open(&self, path: &str) -> io::Result<Option<Blob>> {
        if self.gated.swap(false, Ordering::SeqCst) {
            self.entered.wait();
            self.release.wait();
        }
        self.inner.try_open(path)
    }

    fn path_style(&self) -> PathStyle {
        self.inner.path_style()
    }
}

impl ManifestLister for GatedSource {
    fn list_cultures(&self, scope: &ResourceScope) -> io::Result<Vec<CultureName>> {
        self.inner.list_cultures(scope)
    }
}

#[test]
fn test_lookup_waits_for_running_first_build() {
    let source = Arc::new(GatedSource {
        inner: MemorySource::default().with(FR, "title: Titre\n"),
        gated: AtomicBool::new(true),
        entered: Barrier::new(2),
        release: Barrier::new(2),
    });
    let options = ManagerOptions::new(ResourceScope::new("App", "Locales", "strings.yaml"))
        .with_culture("fr");
    let manager = Manager::new(options, Arc::clone(&source)).with_system_culture(|| None);

    std::thread::scope(|s| {
        let builder = s.spawn(|| manager.build());
        source.entered.wait();
        assert_eq!(manager.state(), ManagerState::Building);

        let reader = s.spawn(|| manager.get_string("title"));
        std::thread::sleep(Duration::from_millis(50));
        source.release.wait();

        assert!(builder.join().unwrap().is_ok());
        assert_eq!(reader.join().unwrap(), "Titre");
    });
    assert_eq!(source.inner.open_count(), 1);
}
