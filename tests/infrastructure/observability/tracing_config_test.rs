use docconv::infrastructure::observability::TracingConfig;
use docconv::presentation::config::{Environment, LoggingSettings};

#[test]
fn given_logging_settings_when_config_built_then_fields_carried_over() {
    let settings = LoggingSettings {
        level: "debug".to_string(),
        enable_json: true,
    };

    let config = TracingConfig::from_settings(&settings, Environment::Prod);

    assert_eq!(config.environment, "Prod");
    assert_eq!(config.level, "debug");
    assert!(config.json_format);
}

#[test]
fn given_level_when_default_directives_built_then_dependencies_are_quieted() {
    let config = TracingConfig {
        level: "trace".to_string(),
        ..TracingConfig::default()
    };

    assert_eq!(config.default_directives(), "trace,tower_http=info,sqlx=warn");
}

#[test]
fn given_default_config_then_local_info_plain_text() {
    let config = TracingConfig::default();

    assert_eq!(config.environment, "Local");
    assert_eq!(config.level, "info");
    assert!(!config.json_format);
}
