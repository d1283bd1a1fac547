use docconv::presentation::config::{
    BrokerSettings, ConverterProvider, ConverterSettings, Environment, LimitSettings,
    LoggingSettings, RetentionSettings, ServerSettings, Settings, SettingsError, StagingProvider,
    StagingSettings, StoreProvider, StoreSettings, WorkerSettings,
};

fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 8080,
        },
        store: StoreSettings {
            provider: StoreProvider::Memory,
            url: None,
            max_connections: 5,
        },
        broker: BrokerSettings {
            provider: StoreProvider::Memory,
            url: None,
            visibility_timeout_secs: 120,
            poll_interval_ms: 100,
        },
        workers: WorkerSettings {
            pool_size: 2,
            task_timeout_secs: 60,
            max_retries: 3,
            retry_backoff_base_ms: 100,
            retry_backoff_max_ms: 1000,
        },
        limits: LimitSettings {
            max_document_size_mb: 10,
            max_batch_documents: 20,
            sync_concurrency: 2,
            url_fetch_timeout_secs: 10,
        },
        retention: RetentionSettings {
            job_ttl_secs: 3600,
            sweep_interval_secs: 60,
            stale_running_grace_secs: 30,
            stale_pending_grace_secs: 60,
        },
        converter: ConverterSettings {
            provider: ConverterProvider::PlainText,
            endpoint: None,
            request_timeout_secs: 30,
        },
        staging: StagingSettings {
            provider: StagingProvider::Memory,
            local_path: String::new(),
        },
        logging: LoggingSettings {
            level: "info".to_string(),
            enable_json: false,
        },
    }
}

fn invalid_key(settings: &Settings) -> Option<&'static str> {
    match settings.validate() {
        Err(SettingsError::Invalid { key, .. }) => Some(key),
        _ => None,
    }
}

#[test]
fn given_consistent_settings_when_validated_then_ok() {
    assert!(test_settings().validate().is_ok());
}

#[test]
fn given_visibility_not_above_task_timeout_when_validated_then_rejected() {
    let mut settings = test_settings();
    settings.broker.visibility_timeout_secs = settings.workers.task_timeout_secs;

    assert_eq!(invalid_key(&settings), Some("broker.visibility_timeout_secs"));
}

#[test]
fn given_zero_retries_when_validated_then_rejected() {
    let mut settings = test_settings();
    settings.workers.max_retries = 0;

    assert_eq!(invalid_key(&settings), Some("workers.max_retries"));
}

#[test]
fn given_backoff_cap_below_base_when_validated_then_rejected() {
    let mut settings = test_settings();
    settings.workers.retry_backoff_max_ms = 10;

    assert_eq!(invalid_key(&settings), Some("workers.retry_backoff_max_ms"));
}

#[test]
fn given_zero_batch_limit_when_validated_then_rejected() {
    let mut settings = test_settings();
    settings.limits.max_batch_documents = 0;

    assert_eq!(invalid_key(&settings), Some("limits.max_batch_documents"));
}

#[test]
fn given_postgres_store_without_url_when_validated_then_rejected() {
    let mut settings = test_settings();
    settings.store.provider = StoreProvider::Postgres;

    assert_eq!(invalid_key(&settings), Some("store.url"));
}

#[test]
fn given_postgres_broker_without_own_url_when_store_url_set_then_falls_back() {
    let mut settings = test_settings();
    settings.store.provider = StoreProvider::Postgres;
    settings.store.url = Some("postgres://localhost/docconv".to_string());
    settings.broker.provider = StoreProvider::Postgres;

    assert!(settings.validate().is_ok());
    assert_eq!(settings.broker_url(), Some("postgres://localhost/docconv"));
}

#[test]
fn given_http_converter_without_endpoint_when_validated_then_rejected() {
    let mut settings = test_settings();
    settings.converter.provider = ConverterProvider::Http;

    assert_eq!(invalid_key(&settings), Some("converter.endpoint"));
}

#[test]
fn given_limits_when_document_size_requested_then_reported_in_bytes() {
    let settings = test_settings();

    assert_eq!(settings.limits.max_document_size_bytes(), 10 * 1024 * 1024);
    assert_eq!(settings.workers.task_timeout().as_secs(), 60);
    assert_eq!(settings.broker.poll_interval().as_millis(), 100);
}

#[test]
fn given_no_overrides_when_loaded_then_defaults_are_valid() {
    let settings = Settings::load(Environment::Test).unwrap();

    assert!(settings.broker.visibility_timeout_secs > settings.workers.task_timeout_secs);
    assert!(settings.limits.max_batch_documents > 0);
    assert_eq!(settings.converter.provider, ConverterProvider::PlainText);
}

#[test]
fn given_prefixed_variable_with_nested_separator_when_loaded_then_it_overrides_default() {
    // SAFETY: no other test reads or writes this variable.
    unsafe { std::env::set_var("APP_LIMITS__SYNC_CONCURRENCY", "7") };

    let settings = Settings::load(Environment::Test);

    unsafe { std::env::remove_var("APP_LIMITS__SYNC_CONCURRENCY") };
    assert_eq!(settings.unwrap().limits.sync_concurrency, 7);
}
