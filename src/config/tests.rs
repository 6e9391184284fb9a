use super::settings::{Settings, StoreBackend};
use super::load_config;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert!(settings.server.allow_client_publish);
    assert_eq!(settings.session.cookie_name, "connect.sid");
    assert!(settings.session.seed.is_empty());
    assert_eq!(settings.session.ttl_secs, None);
    assert_eq!(settings.store.backend, StoreBackend::Memory);
    assert_eq!(settings.log.level, "info");
    assert_eq!(settings.address(), "127.0.0.1:8080");
}

/// Run `f` with the current directory switched to a fresh temp dir.
fn in_temp_dir<T>(f: impl FnOnce(&TempDir) -> T) -> T {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");
    let out = f(&tmp);
    env::set_current_dir(orig).expect("restore cwd");
    out
}

#[test]
#[serial]
fn load_config_without_sources_uses_defaults() {
    let cfg = in_temp_dir(|_| load_config().expect("load_config failed"));
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.store.path, "sockmap_db");
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let cfg = in_temp_dir(|_| {
        fs::create_dir_all("config").expect("create config dir");
        let toml = r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [session]
            cookie_name = "sid"
            seed = ["alpha", "beta"]
            ttl_secs = 60

            [store]
            backend = "sled"
            path = "/tmp/registry"
        "#;
        fs::write("config/default.toml", toml).expect("write config file");
        load_config().expect("load_config failed")
    });

    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert!(cfg.server.allow_client_publish);
    assert_eq!(cfg.session.cookie_name, "sid");
    assert_eq!(cfg.session.seed, vec!["alpha", "beta"]);
    assert_eq!(cfg.session.ttl_secs, Some(60));
    assert_eq!(cfg.store.backend, StoreBackend::Sled);
    assert_eq!(cfg.store.path, "/tmp/registry");
    assert_eq!(cfg.log.level, "info");
}

#[test]
#[serial]
fn load_config_from_environment() {
    let cfg = temp_env::with_vars(
        [
            ("SOCKMAP__SERVER__PORT", Some("9100")),
            ("SOCKMAP__SERVER__ALLOW_CLIENT_PUBLISH", Some("false")),
            ("SOCKMAP__LOG__LEVEL", Some("debug")),
        ],
        || in_temp_dir(|_| load_config().expect("load_config failed")),
    );

    assert_eq!(cfg.server.port, 9100);
    assert!(!cfg.server.allow_client_publish);
    assert_eq!(cfg.log.level, "debug");
    assert_eq!(cfg.server.host, "127.0.0.1");
}
