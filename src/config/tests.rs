use super::load::{default_config_path, resolve_config_path};
use super::schema::*;
use crate::store::Encoding;
use std::sync::{Mutex, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap()
}

struct EnvGuard {
    key: &'static str,
    old: Option<std::ffi::OsString>,
}

impl EnvGuard {
    fn set(key: &'static str, val: &str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::set_var(key, val);
        }
        Self { key, old }
    }

    fn remove(key: &'static str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::remove_var(key);
        }
        Self { key, old }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.old.take() {
            Some(v) => unsafe {
                std::env::set_var(self.key, v);
            },
            None => unsafe {
                std::env::remove_var(self.key);
            },
        }
    }
}

#[test]
fn resolve_config_path_prefers_musicbox_config_path() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("MUSICBOX_CONFIG_PATH", "/tmp/musicbox-test-config.toml");
    assert_eq!(
        resolve_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/musicbox-test-config.toml")
    );
}

#[test]
fn default_config_path_prefers_xdg_config_home() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/xdg-config-home");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-should-not-win");

    let p = default_config_path().unwrap();
    assert_eq!(
        p,
        std::path::PathBuf::from("/tmp/xdg-config-home")
            .join("musicbox")
            .join("config.toml")
    );
}

#[test]
fn default_config_path_falls_back_to_home_dot_config() {
    let _lock = env_lock();
    let _g1 = EnvGuard::remove("XDG_CONFIG_HOME");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-dir");

    let p = default_config_path().unwrap();
    assert_eq!(
        p,
        std::path::PathBuf::from("/tmp/home-dir")
            .join(".config")
            .join("musicbox")
            .join("config.toml")
    );
}

#[test]
fn settings_load_from_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[library]
playlist_extensions = ["m3u"]
follow_links = false
include_hidden = true
flatten_dirs = []

[store]
compress = false
encoding = "tree"
max_history = 20

[log]
filter = "musicbox=debug"
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("MUSICBOX_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("MUSICBOX__STORE__COMPRESS");

    let s = Settings::load().unwrap();
    assert_eq!(s.library.playlist_extensions, vec!["m3u".to_string()]);
    assert!(!s.library.follow_links);
    assert!(s.library.include_hidden);
    assert!(s.library.flatten_dirs.is_empty());
    assert!(!s.store.compress);
    assert_eq!(s.store.encoding, Encoding::Tree);
    assert_eq!(s.store.max_history, Some(20));
    assert_eq!(s.log.filter, "musicbox=debug");
    assert!(s.validate().is_ok());
}

#[test]
fn missing_config_file_yields_defaults() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let _g1 = EnvGuard::set(
        "MUSICBOX_CONFIG_PATH",
        dir.path().join("absent.toml").to_str().unwrap(),
    );

    let s = Settings::load().unwrap();
    assert_eq!(
        s.library.playlist_extensions,
        vec!["m3u".to_string(), "m3u8".to_string()]
    );
    assert!(s.store.compress);
    assert_eq!(s.store.encoding, Encoding::Flat);
    assert_eq!(s.store.max_history, None);
    assert_eq!(s.log.filter, "warn");
}

#[test]
fn settings_env_overrides_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[store]
compress = true
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("MUSICBOX_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::set("MUSICBOX__STORE__COMPRESS", "false");

    let s = Settings::load().unwrap();
    assert!(!s.store.compress);
}

#[test]
fn validate_rejects_empty_extensions_and_zero_history() {
    let mut s = Settings::default();
    assert!(s.validate().is_ok());

    s.library.playlist_extensions.clear();
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.store.max_history = Some(0);
    assert!(s.validate().is_err());
}

#[test]
fn to_toml_renders_every_section() {
    let text = Settings::default().to_toml().unwrap();
    assert!(text.contains("[library]"));
    assert!(text.contains("[store]"));
    assert!(text.contains("[log]"));
    assert!(text.contains("encoding = \"flat\""));
}
