use super::*;

use std::collections::HashMap;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_match_the_lab_backend() {
    let settings = Settings::default();
    assert_eq!(settings.bind_addr, "127.0.0.1:5000");
    assert_eq!(settings.database_url, "sqlite://./database/database.sqlite");
    assert!(settings.seed_demo_data);
    assert_eq!(settings.max_body_bytes, 1024 * 1024);
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    let file_cfg: HashMap<String, String> = toml::from_str(
        r#"
        bind_addr = "0.0.0.0:8080"
        seed_demo_data = "false"
        max_body_bytes = "4096"
        "#,
    )
    .expect("toml");
    apply_file_overrides(&mut settings, &file_cfg);

    assert_eq!(settings.bind_addr, "0.0.0.0:8080");
    assert!(!settings.seed_demo_data);
    assert_eq!(settings.max_body_bytes, 4096);
    assert_eq!(settings.database_url, Settings::default().database_url);
}

#[test]
fn app_prefixed_env_wins_over_plain_names() {
    let mut settings = Settings::default();
    apply_env_overrides(
        &mut settings,
        env_of(&[
            ("SERVER_BIND", "0.0.0.0:7000"),
            ("APP__BIND_ADDR", "0.0.0.0:7100"),
            ("DATABASE_URL", "sqlite://./a.db"),
            ("APP__DATABASE_URL", "sqlite://./b.db"),
            ("APP__SEED_DEMO_DATA", "off"),
        ]),
    );
    assert_eq!(settings.bind_addr, "0.0.0.0:7100");
    assert_eq!(settings.database_url, "sqlite://./b.db");
    assert!(!settings.seed_demo_data);
}

#[test]
fn port_replaces_only_the_port() {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings, env_of(&[("PORT", "6001")]));
    assert_eq!(settings.bind_addr, "127.0.0.1:6001");

    apply_env_overrides(&mut settings, env_of(&[("PORT", "not-a-port")]));
    assert_eq!(settings.bind_addr, "127.0.0.1:6001");
}

#[test]
fn unparseable_values_are_ignored() {
    let mut settings = Settings::default();
    apply_env_overrides(
        &mut settings,
        env_of(&[("APP__SEED_DEMO_DATA", "maybe"), ("APP__MAX_BODY_BYTES", "lots")]),
    );
    assert_eq!(settings, Settings::default());
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(normalize_database_url("  "), Settings::default().database_url);
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
}

#[test]
fn keeps_windows_absolute_path_with_single_sqlite_colon() {
    assert_eq!(
        normalize_database_url("sqlite:C:\\Users\\alice\\test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
    assert_eq!(
        normalize_database_url("sqlite://C:/Users/alice/test.db"),
        "sqlite:C:/Users/alice/test.db"
    );
}

#[tokio::test]
async fn normalized_database_url_opens_a_nested_sqlite_file() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("lab.sqlite");

    let prepared = normalize_database_url(db_path.to_string_lossy().as_ref());
    assert!(!temp_root.path().join("nested").exists());
    let storage = storage::Storage::new(&prepared).await.expect("open sqlite");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );
}
