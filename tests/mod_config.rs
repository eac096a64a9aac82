use horus_store::Namespace;
use horus_store::config::{DEFAULT_MAX_POOL_SIZE, ServiceConfig};
use horus_store::logger;
use std::io::Write;

#[test]
fn load_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("horus.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(
        f,
        r#"
name = "crumbs-api"
log_level = "debug"

[database]
host = "db.internal"
port = 27018
name = "social"
collection = "follows"

[database.options]
strict = true
deprecation_errors = true
"#
    )
    .unwrap();

    let cfg = ServiceConfig::load(Some(&path)).unwrap();
    assert_eq!(cfg.name, "crumbs-api");
    assert_eq!(cfg.database.max_pool_size, DEFAULT_MAX_POOL_SIZE);
    assert!(cfg.database.options.strict && cfg.database.options.deprecation_errors);
    assert_eq!(cfg.database.namespace(), Namespace::new("social", "follows"));
    assert!(cfg.database.uri().starts_with("mongodb://db.internal:27018/"));
}

#[test]
fn invalid_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[database]\nport = \"not a number\"\n").unwrap();
    assert!(ServiceConfig::load(Some(&path)).is_err());

    std::fs::write(&path, "[database]\nmax_pool_size = 0\n").unwrap();
    assert!(ServiceConfig::load(Some(&path)).is_err());
}

#[test]
fn config_round_trips_through_toml() {
    let cfg = ServiceConfig::default();
    let text = toml::to_string(&cfg).unwrap();
    assert_eq!(ServiceConfig::from_toml(&text).unwrap(), cfg);
}

#[test]
fn logging_writes_app_and_audit_files() {
    let dir = tempfile::tempdir().unwrap();
    logger::configure_logging(Some(dir.path()), Some("info"), Some(2)).unwrap();
    log::info!("hello");
    logger::audit("create", "horus.crumbs", Some("abc"));
    assert!(dir.path().join("app.log").exists());
    assert!(dir.path().join("audit.log").exists());
}
