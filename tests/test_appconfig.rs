//! Integration tests for the AppConfig facade over the in-memory store.
//!
//! Run with:
//!   cargo test --test test_appconfig

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use ampl::appconfig::stores::memory::MemoryStore;
use ampl::appconfig::{AliasConfiguration, AppConfig, ConfigStore, ConverterSet};
use ampl::display::DisplayName;
use ampl::{AppError, CompactGuid, guid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Theme {
    Light,
    Dark,
}

ampl::display_names!(Theme {
    Light => "Light mode",
    Dark => "Dark mode",
});

// ── helpers ──────────────────────────────────────────────────────────────────

fn app_config() -> AppConfig<MemoryStore> {
    AppConfig::new(MemoryStore::new())
}

// ── round trips ──────────────────────────────────────────────────────────────

#[test]
fn every_default_type_round_trips() {
    let cfg = app_config();
    let id = Uuid::new_v4();
    let when: DateTime<Utc> = "2026-01-02T03:04:05.678Z".parse().unwrap();

    cfg.set("T.String", &"hello world".to_string()).unwrap();
    cfg.set("T.Bool", &false).unwrap();
    cfg.set("T.Char", &'λ').unwrap();
    cfg.set("T.I64", &i64::MIN).unwrap();
    cfg.set("T.U128", &u128::MAX).unwrap();
    cfg.set("T.F32", &1.5f32).unwrap();
    cfg.set("T.Uuid", &id).unwrap();
    cfg.set("T.Compact", &CompactGuid::from(id)).unwrap();
    cfg.set("T.When", &when).unwrap();
    cfg.save_changes().unwrap();

    assert_eq!(cfg.get::<String>("T.String").unwrap().as_deref(), Some("hello world"));
    assert_eq!(cfg.get::<bool>("T.Bool").unwrap(), Some(false));
    assert_eq!(cfg.get::<char>("T.Char").unwrap(), Some('λ'));
    assert_eq!(cfg.get::<i64>("T.I64").unwrap(), Some(i64::MIN));
    assert_eq!(cfg.get::<u128>("T.U128").unwrap(), Some(u128::MAX));
    assert_eq!(cfg.get::<f32>("T.F32").unwrap(), Some(1.5));
    assert_eq!(cfg.get::<Uuid>("T.Uuid").unwrap(), Some(id));
    assert_eq!(cfg.get::<CompactGuid>("T.Compact").unwrap(), Some(CompactGuid::from(id)));
    assert_eq!(cfg.get::<DateTime<Utc>>("T.When").unwrap(), Some(when));
}

#[test]
fn compact_guid_is_stored_in_compact_form() {
    let cfg = app_config();
    let id = Uuid::new_v4();
    cfg.set("Session.Id", &CompactGuid::from(id)).unwrap();
    cfg.save_changes().unwrap();

    let raw = cfg.get::<String>("Session.Id").unwrap().unwrap();
    assert_eq!(raw, guid::encode(&id));
    assert_eq!(guid::decode(&raw).unwrap(), id);
}

#[test]
fn display_name_enums_via_custom_converters() {
    let mut converters = ConverterSet::with_defaults();
    converters.register_display::<Theme>();
    let cfg = AppConfig::with_configuration(
        MemoryStore::with_entries([("Ui.Theme", "Dark mode"), ("Ui.Bad", "dark")]),
        AliasConfiguration::default().with_converters(converters),
    );

    assert_eq!(cfg.get::<Theme>("Ui.Theme").unwrap(), Some(Theme::Dark));
    assert!(matches!(cfg.get::<Theme>("Ui.Bad"), Err(AppError::Conversion(_))));

    cfg.set("Ui.Theme", &Theme::Light).unwrap();
    assert_eq!(
        cfg.get::<String>("Ui.Theme").unwrap().as_deref(),
        Some(Theme::Light.display_name())
    );
}

// ── aliasing ─────────────────────────────────────────────────────────────────

#[test]
fn legacy_keys_resolve_one_hop() {
    let store = MemoryStore::with_entries([("Mail.Smtp.Host", "smtp.local"), ("Z", "end")]);
    let cfg = AppConfig::with_configuration(
        store,
        AliasConfiguration::default()
            .alias("SmtpHost", "Mail.Smtp.Host")
            .alias("X", "Y")
            .alias("Y", "Z"),
    );

    assert_eq!(
        cfg.get::<String>("SmtpHost").unwrap().as_deref(),
        Some("smtp.local")
    );
    // X -> Y only; Y -> Z is never consulted for X.
    assert_eq!(cfg.get::<String>("X").unwrap(), None);
    assert_eq!(cfg.get::<String>("Y").unwrap().as_deref(), Some("end"));
}

#[test]
fn writes_never_follow_aliases() {
    let cfg = AppConfig::with_configuration(
        MemoryStore::with_entries([("New", "1")]),
        AliasConfiguration::default().alias("Old", "New"),
    );
    cfg.set("Old", &2i32).unwrap();
    cfg.save_changes().unwrap();
    assert_eq!(cfg.get::<i32>("Old").unwrap(), Some(2));
    assert_eq!(cfg.get::<i32>("New").unwrap(), Some(1));
}

// ── transactions ─────────────────────────────────────────────────────────────

#[test]
fn dropped_scope_rolls_back() {
    let cfg = AppConfig::new(MemoryStore::with_entries([("Count", "1")]));
    {
        let _tx = cfg.begin_transaction().unwrap();
        cfg.set("Count", &2i32).unwrap();
        cfg.save_changes().unwrap();
    }
    assert_eq!(cfg.get::<i32>("Count").unwrap(), Some(1));
}

#[test]
fn committed_scope_keeps_changes() {
    let cfg = app_config();
    let tx = cfg.begin_transaction().unwrap();
    cfg.set("A", &1i32).unwrap();
    cfg.save_changes().unwrap();
    tx.commit().unwrap();

    // A fresh scope can be opened afterwards.
    let tx = cfg.begin_transaction().unwrap();
    assert!(!tx.is_nested());
    tx.commit().unwrap();
    assert_eq!(cfg.get::<i32>("A").unwrap(), Some(1));
}

#[test]
fn concurrent_transaction_from_other_thread_is_refused() {
    let store = Arc::new(MemoryStore::new());
    let tx = store.begin_transaction().unwrap();

    let other = Arc::clone(&store);
    let result = thread::spawn(move || other.begin_transaction().map(|t| t.is_nested()))
        .join()
        .unwrap();
    assert!(matches!(result, Err(AppError::Store(_))));

    tx.commit().unwrap();
}

#[test]
fn facade_is_shareable_across_threads() {
    let cfg = Arc::new(AppConfig::new(MemoryStore::new()));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let cfg = Arc::clone(&cfg);
            thread::spawn(move || cfg.set(&format!("Worker.{i}"), &i).unwrap())
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    cfg.save_changes().unwrap();
    assert_eq!(cfg.entries("Worker.").unwrap().len(), 4);
    assert_eq!(cfg.get::<i32>("Worker.3").unwrap(), Some(3));
}
