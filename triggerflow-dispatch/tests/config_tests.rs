use pretty_assertions::assert_eq;
use triggerflow_dispatch::DispatchConfig;
use triggerflow_model::HandlerDescriptor;
use triggerflow_types::Action;

#[test]
fn defaults() {
    let config = DispatchConfig::default();
    assert!(!config.error_handling_disabled);
    assert!(!config.propagate_errors);
    assert_eq!(config.context_tag, "dispatch");
    assert!(config.default_handlers.is_empty());
}

#[test]
fn parses_full_config() {
    let config = DispatchConfig::from_toml(
        r#"
        error_handling_disabled = true
        propagate_errors = true
        context_tag = "import"

        [[default_handlers]]
        class_identifier = "account.audit"
        entity_type = "account"
        actions = ["AfterInsert", "AfterUpdate"]
        rank = 10
        asynchronous = true
        "#,
    )
    .unwrap();

    assert!(config.error_handling_disabled);
    assert!(config.propagate_errors);
    assert_eq!(config.context_tag, "import");
    assert_eq!(
        config.default_handlers,
        vec![
            HandlerDescriptor::new("account.audit", "account", [Action::AfterInsert, Action::AfterUpdate])
                .with_rank(10)
                .asynchronous(true)
        ]
    );
}

#[test]
fn empty_document_uses_defaults() {
    assert_eq!(DispatchConfig::from_toml("").unwrap(), DispatchConfig::default());
}

#[test]
fn rejects_malformed_toml() {
    assert!(DispatchConfig::from_toml("error_handling_disabled = maybe").is_err());
}

#[test]
fn load_from_missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = DispatchConfig::load_from(dir.path().join("triggerflow.toml"));
    assert_eq!(config, DispatchConfig::default());
}

#[test]
fn load_from_malformed_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("triggerflow.toml");
    std::fs::write(&path, "propagate_errors = [").unwrap();
    assert_eq!(DispatchConfig::load_from(&path), DispatchConfig::default());
}

#[test]
fn load_from_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("triggerflow.toml");
    std::fs::write(&path, "propagate_errors = true\n").unwrap();
    assert!(DispatchConfig::load_from(&path).propagate_errors);
}

#[test]
fn configured_default_handlers_seed_an_empty_store() {
    let config = DispatchConfig::from_toml(
        r#"
        [[default_handlers]]
        class_identifier = "account.audit"
        entity_type = "account"
        actions = ["AfterInsert"]
        "#,
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = config.open_handler_store(dir.path().join("handlers.db")).unwrap();

    assert!(store.is_empty().unwrap());
    assert!(store.seed_defaults_if_empty().unwrap());
    assert_eq!(store.handlers_for("account", Action::AfterInsert).unwrap(), config.default_handlers);
}
