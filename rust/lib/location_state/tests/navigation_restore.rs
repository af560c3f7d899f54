//! End-to-end: provider, default stores and an in-memory navigation history
//! restoring state across push, back/forward and reload.

use std::sync::Arc;

use location_state::*;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

struct App {
    queue: Arc<MicrotaskQueue>,
    provider: Arc<Provider>,
    _mount: ProviderMount,
}

impl App {
    fn session(&self) -> Arc<dyn Store> {
        self.provider.store("session").unwrap()
    }

    fn url(&self) -> Arc<dyn Store> {
        self.provider.store("url").unwrap()
    }
}

fn mount_native(nav: &Arc<MemoryNavigation>, storage: &Arc<MemoryStorage>) -> App {
    let syncer = Arc::new(NavigationSyncer::new(
        Some(nav.clone() as Arc<dyn Navigation>),
        nav.clone(),
    ));
    let queue = Arc::new(MicrotaskQueue::new());
    let provider = Provider::with_default_stores(
        &LocationStateConfig::default(),
        syncer,
        storage.clone(),
        nav.clone(),
        queue.clone(),
    );
    let mount = provider.mount(CancellationToken::new());
    App {
        queue,
        provider,
        _mount: mount,
    }
}

fn mount_polyfill(history: &Arc<MemoryHistory>, storage: &Arc<MemoryStorage>) -> (Arc<NavigationPolyfill>, App) {
    let polyfill = NavigationPolyfill::new(history.clone());
    let syncer = Arc::new(NavigationSyncer::new(
        Some(polyfill.clone() as Arc<dyn Navigation>),
        polyfill.clone(),
    ));
    let queue = Arc::new(MicrotaskQueue::new());
    let provider = Provider::with_default_stores(
        &LocationStateConfig::default(),
        syncer,
        storage.clone(),
        polyfill.clone(),
        queue.clone(),
    );
    let mount = provider.mount(CancellationToken::new());
    (
        polyfill,
        App {
            queue,
            provider,
            _mount: mount,
        },
    )
}

// ============================================================================
// Native navigation
// ============================================================================

#[test]
fn back_and_forward_restore_each_entry() {
    let nav = Arc::new(MemoryNavigation::new("http://localhost/").unwrap());
    let storage = Arc::new(MemoryStorage::new());
    let app = mount_native(&nav, &storage);

    app.session().set("scroll", Some(json!(120)));
    app.url().set("tab", Some(json!("details")));

    nav.navigate("/list", NavigationHistoryBehavior::Push)
        .unwrap();
    app.queue.run_pending();
    assert_eq!(app.session().get("scroll"), None);
    assert_eq!(app.url().get("tab"), None);
    app.session().set("scroll", Some(json!(900)));

    nav.back();
    app.queue.run_pending();
    assert_eq!(app.session().get("scroll"), Some(json!(120)));
    assert_eq!(app.url().get("tab"), Some(json!("details")));

    nav.forward();
    app.queue.run_pending();
    assert_eq!(app.session().get("scroll"), Some(json!(900)));
    assert_eq!(app.url().get("tab"), None);
}

#[test]
fn reload_keeps_state_and_key() {
    let nav = Arc::new(MemoryNavigation::new("http://localhost/").unwrap());
    let storage = Arc::new(MemoryStorage::new());
    let app = mount_native(&nav, &storage);
    app.session().set("open", Some(json!(true)));
    let key = app.provider.key();

    nav.reload();
    app.queue.run_pending();
    assert_eq!(app.provider.key(), key);
    assert_eq!(app.session().loaded_key(), key);
    assert_eq!(app.session().get("open"), Some(json!(true)));
}

#[test]
fn replace_keeps_entry_state() {
    let nav = Arc::new(MemoryNavigation::new("http://localhost/").unwrap());
    let storage = Arc::new(MemoryStorage::new());
    let app = mount_native(&nav, &storage);
    app.session().set("draft", Some(json!("hello")));

    nav.navigate("/same-entry", NavigationHistoryBehavior::Replace)
        .unwrap();
    app.queue.run_pending();
    assert_eq!(app.session().get("draft"), Some(json!("hello")));
}

#[test]
fn typed_state_follows_navigation() {
    let nav = Arc::new(MemoryNavigation::new("http://localhost/").unwrap());
    let storage = Arc::new(MemoryStorage::new());
    let app = mount_native(&nav, &storage);
    let page = || LocationStateDefinition::new("page", 1u32, "url");

    let (current, set_page) = use_location_state(page()).unwrap();
    assert_eq!(current, 1);
    set_page.set(4);
    assert_eq!(
        nav.href(),
        "http://localhost/?location-state=%7B%22page%22%3A4%7D"
    );

    nav.navigate("/other", NavigationHistoryBehavior::Push)
        .unwrap();
    app.queue.run_pending();
    assert_eq!(use_location_get_state(page()).unwrap().get(), 1);

    nav.back();
    app.queue.run_pending();
    assert_eq!(use_location_get_state(page()).unwrap().get(), 4);
}

// ============================================================================
// History polyfill
// ============================================================================

#[test]
fn polyfill_restores_across_traversal() {
    let history = Arc::new(MemoryHistory::new("http://localhost/").unwrap());
    let storage = Arc::new(MemoryStorage::new());
    let (polyfill, app) = mount_polyfill(&history, &storage);

    app.session().set("a", Some(json!(1)));
    app.url().set("q", Some(json!("x")));

    polyfill.push_state(Value::Null, Some("/page2")).unwrap();
    app.queue.run_pending();
    assert_eq!(app.session().get("a"), None);
    assert_eq!(app.url().get("q"), None);

    polyfill.back();
    app.queue.run_pending();
    assert_eq!(app.session().get("a"), Some(json!(1)));
    assert_eq!(app.url().get("q"), Some(json!("x")));

    let key = app.provider.key();
    polyfill.reload();
    app.queue.run_pending();
    assert_eq!(app.session().loaded_key(), key);
}

#[test]
fn polyfill_key_survives_page_reload() {
    let history = Arc::new(MemoryHistory::new("http://localhost/").unwrap());
    let storage = Arc::new(MemoryStorage::new());

    let key = {
        let (_polyfill, app) = mount_polyfill(&history, &storage);
        app.session().set("form", Some(json!({"name": "ada"})));
        app.provider.key()
    };

    // A fresh provider over the same history and storage, as after a reload.
    let (_polyfill, app) = mount_polyfill(&history, &storage);
    assert_eq!(app.provider.key(), key);
    assert_eq!(app.session().get("form"), Some(json!({"name": "ada"})));
}
