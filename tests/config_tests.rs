use channel_export::core::config::{
    AppConfig, AttachmentPlacement, DEFAULT_AUTOSAVE_EVERY, DEFAULT_FILE_API_BASE, LinkMode,
    RenderOptions,
};
use channel_export::errors::ExportError;
use std::collections::HashMap;
use std::path::PathBuf;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn test_defaults_when_unset() {
    let config = AppConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(config.bot_token, None);
    assert_eq!(config.file_api_base, DEFAULT_FILE_API_BASE);
    assert_eq!(config.autosave_every, DEFAULT_AUTOSAVE_EVERY);
    assert_eq!(config.results_dir, PathBuf::from("./results"));
}

#[test]
fn test_values_are_read_and_blank_means_default() {
    let config = AppConfig::from_lookup(lookup(&[
        ("TG_BOT_TOKEN", "123:abc"),
        ("TG_FILE_API_BASE", "http://localhost:8081/"),
        ("EXPORT_RESULTS_DIR", "/tmp/out"),
        ("EXPORT_WORK_DIR", "  "),
        ("EXPORT_AUTOSAVE_EVERY", "10"),
        ("EXPORT_PAGE_SIZE", " 20 "),
    ]))
    .unwrap();

    assert_eq!(config.bot_token.as_deref(), Some("123:abc"));
    assert_eq!(config.file_api_base, "http://localhost:8081");
    assert_eq!(config.results_dir, PathBuf::from("/tmp/out"));
    assert_eq!(config.work_dir, PathBuf::from("./temp_media"));
    assert_eq!(config.autosave_every, 10);
    assert_eq!(config.page_size, 20);
}

#[test]
fn test_malformed_numbers_are_config_errors() {
    for (key, value) in [
        ("EXPORT_AUTOSAVE_EVERY", "0"),
        ("EXPORT_PAGE_SIZE", "many"),
        ("EXPORT_MAX_ATTACHMENT_BYTES", "-1"),
    ] {
        let err = AppConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
        match err {
            ExportError::ConfigError(msg) => assert!(msg.starts_with(key), "{msg}"),
            other => panic!("Unexpected error type: {other}"),
        }
    }
}

#[test]
fn test_render_options_defaults_and_serde_names() {
    let options = RenderOptions::default();
    assert!(options.include_date_heading);
    assert_eq!(options.placement, AttachmentPlacement::After);
    assert_eq!(options.link_mode, LinkMode::Active);

    assert_eq!(
        serde_json::to_string(&AttachmentPlacement::Before).unwrap(),
        "\"before\""
    );
    assert_eq!(
        serde_json::from_str::<LinkMode>("\"inert\"").unwrap(),
        LinkMode::Inert
    );
}
