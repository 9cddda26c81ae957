//! End-to-end flows through the registry facade

use std::collections::HashMap;

use shroud_core::{store, SecuritySettings};
use shroud_dispatch::cipher::{default_ciphers, AES_GCM};
use shroud_dispatch::{
    Attributes, DispatcherRegistry, EnvSource, LegacyDispatcher, LookupDispatcher,
    MasterDispatcher,
};
use tempfile::TempDir;

const MASTER_DISPATCHER: &str = "master-dispatcher";

fn master_registry(dir: &TempDir) -> DispatcherRegistry {
    std::env::set_var("SHROUD_E2E_MASTER", "masterPw");

    let path = dir.path().join("settings.yaml");
    let mut settings = SecuritySettings::with_default_dispatcher(MASTER_DISPATCHER);
    settings.set_configuration(
        MASTER_DISPATCHER,
        &[("source", "env:SHROUD_E2E_MASTER"), ("cipher", AES_GCM)],
    );
    store::write(&path, &settings, false).unwrap();

    let master = MasterDispatcher::new(default_ciphers(), vec![Box::new(EnvSource::new())]);
    let meta = master.meta();
    DispatcherRegistry::new(path).register_with_meta(MASTER_DISPATCHER, meta, master)
}

#[test]
fn encrypts_with_master_dispatcher_and_round_trips() {
    let dir = TempDir::new().unwrap();
    let registry = master_registry(&dir);

    let attributes: Attributes =
        HashMap::from([("name".to_string(), MASTER_DISPATCHER.to_string()),
                       ("a".to_string(), "b".to_string())]);
    let protected = registry.encrypt("supersecret", &attributes).unwrap();

    assert!(protected.starts_with("{["), "got: {protected}");
    assert!(protected.ends_with('}'));
    assert!(protected.contains(&format!("name={MASTER_DISPATCHER}")));
    assert!(protected.contains(&format!("cipher={AES_GCM}")));
    assert!(protected.contains("a=b"));

    let plain = registry.decrypt(&protected).unwrap();
    assert_eq!(plain.expose(), "supersecret");
}

#[test]
fn default_dispatcher_comes_from_the_document() {
    let dir = TempDir::new().unwrap();
    let registry = master_registry(&dir);

    let protected = registry.encrypt("supersecret", &Attributes::new()).unwrap();
    assert!(protected.contains(&format!("name={MASTER_DISPATCHER}")));
    assert_eq!(registry.decrypt(&protected).unwrap().expose(), "supersecret");
}

#[test]
fn encrypt_is_idempotent_and_decrypt_passes_plaintext_through() {
    let dir = TempDir::new().unwrap();
    let registry = master_registry(&dir);

    let protected = registry.encrypt("supersecret", &Attributes::new()).unwrap();
    assert_eq!(registry.encrypt(&protected, &Attributes::new()).unwrap(), protected);
    assert_eq!(registry.decrypt("just a value").unwrap().expose(), "just a value");
}

#[test]
fn validation_tree_covers_registry_dispatcher_and_source() {
    let dir = TempDir::new().unwrap();
    let registry = master_registry(&dir);

    let response = registry.validate_configuration();
    assert!(response.is_valid());

    let dispatcher = &response.subsystems()[0];
    assert_eq!(dispatcher.source(), "master-dispatcher");
    assert_eq!(dispatcher.subsystems()[0].source(), "env-source");
}

#[test]
fn lookup_dispatcher_stores_references_and_resolves_them() {
    std::env::set_var("SHROUD_E2E_TOKEN", "resolved-token");

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.yaml");
    let settings = SecuritySettings::with_default_dispatcher("lookup");
    store::write(&path, &settings, false).unwrap();

    let lookup = LookupDispatcher::new(vec![Box::new(EnvSource::new())]);
    let registry = DispatcherRegistry::new(path).register("lookup", lookup);

    let protected = registry.encrypt("env:SHROUD_E2E_TOKEN", &Attributes::new()).unwrap();
    // the reference is stored unmodified inside the frame
    assert!(protected.contains("env:SHROUD_E2E_TOKEN"));
    assert_eq!(registry.decrypt(&protected).unwrap().expose(), "resolved-token");
}

#[test]
fn legacy_values_decrypt_through_the_facade() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.yaml");
    let mut settings = SecuritySettings::with_default_dispatcher(MASTER_DISPATCHER);
    settings.set_configuration(LegacyDispatcher::NAME, &[("master", "masterPw")]);
    store::write(&path, &settings, false).unwrap();

    let registry = DispatcherRegistry::new(path)
        .register(LegacyDispatcher::NAME, LegacyDispatcher::new());

    // historical value: "supersecret" under "masterPw"
    let plain = registry
        .decrypt("{AQIDBAUGBwgHwacoZabTenasjmwQR0268wAAAAAAAAA=}")
        .unwrap();
    assert_eq!(plain.expose(), "supersecret");

    // and the legacy dispatcher refuses to produce new values
    let err = registry
        .encrypt("new secret", &HashMap::from([("name".to_string(), "legacy".to_string())]))
        .unwrap_err();
    assert!(err.to_string().contains("insecure"));
}
