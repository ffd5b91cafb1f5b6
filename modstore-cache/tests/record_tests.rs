mod common;

use common::{service, Afk, Broken, Flags, Homes, Jail};
use modstore_cache::{CacheError, SaveOutcome};
use modstore_storage::StorageError;
use modstore_types::EntityKey;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Barrier};
use std::thread;

// ── Construction ─────────────────────────────────────────────────

#[test]
fn get_constructs_with_defaults() {
    let (_store, service) = service();
    let flags = service.get_module::<Flags>(EntityKey::new_user()).unwrap();
    assert_eq!(*flags.read().unwrap(), Flags::default());
}

#[test]
fn get_reads_existing_document() {
    let (store, service) = service();
    let key = EntityKey::new_user();
    store.insert(key, json!({"flags": {"muted": true, "reason": "spam"}}));

    let flags = service.get_module::<Flags>(key).unwrap();
    let flags = flags.read().unwrap();
    assert!(flags.muted);
    assert_eq!(flags.reason.as_deref(), Some("spam"));
}

#[test]
fn get_returns_same_instance() {
    let (_store, service) = service();
    let key = EntityKey::new_user();
    let a = service.get_module::<Flags>(key).unwrap();
    let b = service.get_module::<Flags>(key).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn different_types_are_cached_separately() {
    let (_store, service) = service();
    let key = EntityKey::new_user();
    service.get_module::<Flags>(key).unwrap();
    service.get_module::<Homes>(key).unwrap();
    assert_eq!(service.record(key).module_count(), 2);
}

#[test]
fn fallback_construction_is_counted() {
    let (_store, service) = service();
    let key = EntityKey::new_user();
    service.get_module::<Flags>(key).unwrap();
    service.get_module::<Flags>(key).unwrap();
    assert_eq!(service.registry().fallback_count(), 1);
}

#[test]
fn registered_factory_gets_back_reference() {
    let (_store, service) = service();
    let key = EntityKey::new_user();
    let jail = service.get_registered_module::<Jail>(key).unwrap();
    let owner = jail.read().unwrap().owner.upgrade().unwrap();
    assert!(Arc::ptr_eq(&owner, &service.record(key)));
    assert_eq!(service.registry().fallback_count(), 0);
}

#[test]
fn factory_error_is_fatal_and_not_cached() {
    let (_store, service) = service();
    let key = EntityKey::new_user();
    let err = service.get_module::<Broken>(key).unwrap_err();
    assert!(matches!(err, CacheError::Construction { .. }));
    assert!(err.to_string().contains("broken on purpose"));
    assert_eq!(service.record(key).module_count(), 0);
    assert_eq!(service.registry().fallback_count(), 0);
}

#[test]
fn unregistered_without_fallback_fails() {
    let (_store, service) = service();
    let err = service
        .get_registered_module::<Homes>(EntityKey::new_user())
        .unwrap_err();
    assert!(matches!(err, CacheError::NoFactory { .. }));
}

#[test]
fn malformed_field_fails_get() {
    let (store, service) = service();
    let key = EntityKey::new_user();
    store.insert(key, json!({"flags": {"muted": "often"}}));
    assert!(matches!(
        service.get_module::<Flags>(key),
        Err(CacheError::Model(_))
    ));
    assert_eq!(service.record(key).module_count(), 0);
}

#[test]
fn set_overwrites_cached_instance() {
    let (_store, service) = service();
    let key = EntityKey::new_user();
    let before = service.get_module::<Flags>(key).unwrap();
    let installed = service
        .set_module(
            key,
            Flags {
                muted: true,
                reason: None,
            },
        )
        .unwrap();
    let after = service.get_module::<Flags>(key).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(Arc::ptr_eq(&installed, &after));
    assert!(after.read().unwrap().muted);
}

// ── Concurrency ──────────────────────────────────────────────────

#[test]
fn concurrent_get_yields_one_instance() {
    let (_store, service) = service();
    let service = Arc::new(service);
    let key = EntityKey::new_user();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                service.get_module::<Flags>(key).unwrap()
            })
        })
        .collect();

    let modules: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for module in &modules[1..] {
        assert!(Arc::ptr_eq(&modules[0], module));
    }
    assert_eq!(service.registry().fallback_count(), 1);
}

// ── Load / save ──────────────────────────────────────────────────

#[test]
fn save_preserves_instances() {
    let (store, service) = service();
    let key = EntityKey::new_user();
    let flags = service.get_module::<Flags>(key).unwrap();
    flags.write().unwrap().muted = true;

    assert_eq!(service.save(key).unwrap(), SaveOutcome::Saved);
    assert_eq!(store.raw(key), Some(json!({"flags": {"muted": true}})));

    let again = service.get_module::<Flags>(key).unwrap();
    assert!(Arc::ptr_eq(&flags, &again));
    assert!(again.read().unwrap().muted);
}

#[test]
fn load_replaces_instances() {
    let (store, service) = service();
    let key = EntityKey::new_user();
    let flags = service.get_module::<Flags>(key).unwrap();
    flags.write().unwrap().muted = true;
    service.save(key).unwrap();

    store.insert(key, json!({"flags": {"muted": false}}));
    service.load(key).unwrap();

    let fresh = service.get_module::<Flags>(key).unwrap();
    assert!(!Arc::ptr_eq(&flags, &fresh));
    assert!(!fresh.read().unwrap().muted);
    // The stale handle still holds what it had.
    assert!(flags.read().unwrap().muted);
}

#[test]
fn virtual_empty_save_writes_nothing() {
    let (store, service) = service();
    let key = EntityKey::new_user();
    service.load(key).unwrap();
    assert_eq!(service.save(key).unwrap(), SaveOutcome::Skipped);
    assert_eq!(store.save_count(), 0);
    assert_eq!(store.raw(key), None);
}

#[test]
fn untouched_record_save_is_skipped() {
    let (store, service) = service();
    let key = EntityKey::new_user();
    store.insert(key, json!({"flags": {"muted": true}}));
    assert_eq!(service.save(key).unwrap(), SaveOutcome::Skipped);
    assert_eq!(store.save_count(), 0);
}

#[test]
fn transient_only_save_writes_nothing() {
    let (store, service) = service();
    let key = EntityKey::new_user();
    service.get_transient::<Afk>(key).unwrap().write().unwrap().away = true;
    service.load(key).unwrap();
    assert_eq!(service.save(key).unwrap(), SaveOutcome::Skipped);
    assert_eq!(store.save_count(), 0);
}

#[test]
fn existing_document_saves_without_modules() {
    let (store, service) = service();
    let key = EntityKey::new_user();
    store.insert(key, json!({"homes": {}}));
    service.load(key).unwrap();
    assert_eq!(service.save(key).unwrap(), SaveOutcome::Saved);
    assert_eq!(store.save_count(), 1);
}

#[test]
fn transient_survives_load() {
    let (_store, service) = service();
    let key = EntityKey::new_user();
    let afk = service.get_transient::<Afk>(key).unwrap();
    afk.write().unwrap().away = true;

    service.load(key).unwrap();

    let again = service.get_transient::<Afk>(key).unwrap();
    assert!(Arc::ptr_eq(&afk, &again));
    assert!(again.read().unwrap().away);
}

#[test]
fn transient_never_touches_document() {
    let (store, service) = service();
    let key = EntityKey::new_user();
    service.get_transient::<Afk>(key).unwrap();
    service.get_module::<Flags>(key).unwrap();
    service.save(key).unwrap();
    assert_eq!(store.raw(key), Some(json!({"flags": {"muted": false}})));
}

#[test]
fn failed_load_keeps_state() {
    let (store, service) = service();
    let key = EntityKey::new_user();
    let flags = service.get_module::<Flags>(key).unwrap();
    flags.write().unwrap().muted = true;

    store.corrupt(key);
    let err = service.load(key).unwrap_err();
    assert!(matches!(err, CacheError::Storage(StorageError::Malformed { .. })));

    let again = service.get_module::<Flags>(key).unwrap();
    assert!(Arc::ptr_eq(&flags, &again));
    assert!(again.read().unwrap().muted);
}

#[test]
fn failed_first_touch_retries_later() {
    let (store, service) = service();
    let key = EntityKey::new_user();
    store.insert(key, json!({"flags": {"muted": true}}));
    store.corrupt(key);
    assert!(service.get_module::<Flags>(key).is_err());
    assert!(!service.record(key).is_loaded());

    store.repair(key);
    assert!(service.get_module::<Flags>(key).unwrap().read().unwrap().muted);
}

#[test]
fn failed_save_keeps_cache_and_retries() {
    let (store, service) = service();
    let key = EntityKey::new_user();
    let flags = service.get_module::<Flags>(key).unwrap();
    flags.write().unwrap().muted = true;

    store.fail_saves(true);
    assert!(matches!(service.save(key), Err(CacheError::Storage(_))));
    assert!(Arc::ptr_eq(&flags, &service.get_module::<Flags>(key).unwrap()));

    store.fail_saves(false);
    assert_eq!(service.save(key).unwrap(), SaveOutcome::Saved);
    assert_eq!(store.raw(key), Some(json!({"flags": {"muted": true}})));
}

#[test]
fn save_keeps_unbound_paths() {
    let (store, service) = service();
    let key = EntityKey::new_user();
    store.insert(key, json!({"nickname": "Steve", "flags": {"muted": false}}));
    service.get_module::<Flags>(key).unwrap().write().unwrap().muted = true;
    service.save(key).unwrap();
    assert_eq!(
        store.raw(key),
        Some(json!({"nickname": "Steve", "flags": {"muted": true}}))
    );
}

#[test]
fn live_document_includes_unsaved_changes() {
    let (store, service) = service();
    let key = EntityKey::new_user();
    service.get_module::<Flags>(key).unwrap().write().unwrap().muted = true;

    let record = service.record(key);
    let live = record.live_document().unwrap();
    assert_eq!(live.get_bool("/flags/muted"), Some(true));
    assert_eq!(record.with_document(|d| d.get_bool("/flags/muted")).unwrap(), None);
    assert_eq!(store.save_count(), 0);
}

#[test]
fn update_document_is_saved() {
    let (store, service) = service();
    let key = EntityKey::General;
    service
        .record(key)
        .update_document(|doc| doc.set("/motd", json!("hello")))
        .unwrap()
        .unwrap();
    assert_eq!(service.save(key).unwrap(), SaveOutcome::Saved);
    assert_eq!(store.raw(key), Some(json!({"motd": "hello"})));
}

// ── Example scenario ─────────────────────────────────────────────

#[test]
fn mute_scenario() {
    let (store, service) = service();
    let u1 = EntityKey::new_user();

    let flags = service.get_module::<Flags>(u1).unwrap();
    assert!(!flags.read().unwrap().muted);

    flags.write().unwrap().muted = true;
    service.save(u1).unwrap();
    assert_eq!(store.raw(u1).unwrap()["flags"]["muted"], json!(true));
    let same = service.get_module::<Flags>(u1).unwrap();
    assert!(Arc::ptr_eq(&flags, &same));
    assert!(same.read().unwrap().muted);

    store.insert(u1, json!({"flags": {"muted": false}}));
    service.load(u1).unwrap();
    let fresh = service.get_module::<Flags>(u1).unwrap();
    assert!(!Arc::ptr_eq(&flags, &fresh));
    assert!(!fresh.read().unwrap().muted);
}
