use clinic_client::config::{ConfigError, ConfigLoader};
use std::{
    env, fs,
    sync::{Mutex, MutexGuard, OnceLock},
    time::Duration,
};
use tempfile::TempDir;

const KEYS: &[&str] = &[
    "CLINIC_PROFILE",
    "CLINIC_API_BASE_URL",
    "CLINIC_LOG_LEVEL",
    "CLINIC_LOG_FORMAT",
    "CLINIC_DOCTOR_ID",
    "CLINIC_TOKEN_STORE_PATH",
    "CLINIC_DEFAULT_PER_PAGE",
    "CLINIC_MAX_PER_PAGE",
    "CLINIC_SEARCH_DEBOUNCE_MS",
    "CLINIC_LAZY_LOAD_TIMEOUT_MS",
    "CLINIC_TOKEN_REFRESH_LEAD_SECONDS",
    "VITE_API_BASE_URL",
];

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    for key in KEYS {
        unsafe {
            env::remove_var(key);
        }
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    let cfg = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.api_base_url, "http://localhost:8000");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.log_format, "pretty");
    assert_eq!(cfg.doctor_id, None);
    assert_eq!(cfg.default_per_page, 20);
    assert_eq!(cfg.search_debounce(), Duration::from_millis(300));
    assert_eq!(
        cfg.token_store_path,
        temp_dir.path().join(".clinic/session.json")
    );
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "CLINIC_API_BASE_URL=http://localhost:3000\nCLINIC_DOCTOR_ID=dr-1\n",
    );
    write_env_file(
        &temp_dir,
        ".env.staging",
        "CLINIC_API_BASE_URL=https://staging.clinic.test\nCLINIC_LOG_FORMAT=JSON\n",
    );
    write_env_file(
        &temp_dir,
        ".env.staging.local",
        "CLINIC_API_BASE_URL=https://staging-eu.clinic.test/api\n",
    );

    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "CLINIC_PROFILE=staging\nCLINIC_API_BASE_URL=http://localhost:4000\nCLINIC_SEARCH_DEBOUNCE_MS=150\n",
    );

    let cfg = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .expect("layered config loads");

    assert_eq!(cfg.profile, "staging");
    assert_eq!(cfg.api_base_url, "https://staging-eu.clinic.test/api");
    assert_eq!(cfg.log_format, "json");
    assert_eq!(cfg.doctor_id.as_deref(), Some("dr-1"));
    assert_eq!(cfg.search_debounce_ms, 150);
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "CLINIC_API_BASE_URL=http://localhost:3000\nCLINIC_DEFAULT_PER_PAGE=10\n",
    );

    unsafe {
        env::set_var("CLINIC_API_BASE_URL", "https://api.clinic.test");
        env::set_var("CLINIC_DEFAULT_PER_PAGE", "50");
    }

    let cfg = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .expect("env overrides load");

    assert_eq!(cfg.api_base_url, "https://api.clinic.test");
    assert_eq!(cfg.page_size(None), 50);
    clear_env();
}

#[test]
fn web_build_base_url_is_a_fallback() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "VITE_API_BASE_URL=http://localhost:8010\n");

    let cfg = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .unwrap();
    assert_eq!(cfg.api_base_url, "http://localhost:8010");

    unsafe {
        env::set_var("CLINIC_API_BASE_URL", "https://api.clinic.test");
    }
    let cfg = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .unwrap();
    assert_eq!(cfg.api_base_url, "https://api.clinic.test");
    clear_env();
}

#[test]
fn invalid_base_url_returns_error() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    unsafe {
        env::set_var("CLINIC_API_BASE_URL", "not a url");
    }

    let err = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    clear_env();
}

#[test]
fn blank_doctor_id_means_unscoped() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    unsafe {
        env::set_var("CLINIC_DOCTOR_ID", "   ");
    }

    let cfg = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .unwrap();
    assert_eq!(cfg.doctor_id, None);
    clear_env();
}

#[test]
fn absolute_token_path_is_kept() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    let session = temp_dir.path().join("elsewhere/session.json");
    unsafe {
        env::set_var("CLINIC_TOKEN_STORE_PATH", &session);
    }

    let cfg = ConfigLoader::with_base_dir(temp_dir.path().join("project"))
        .load()
        .unwrap();
    assert_eq!(cfg.token_store_path, session);
    clear_env();
}

#[test]
fn oversized_debounce_is_rejected() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "CLINIC_SEARCH_DEBOUNCE_MS=9000\n");

    let err = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSearchDebounce { value: 9000 }));
}
