mod environment;
mod settings;

pub use environment::{ENVIRONMENT_VAR, Environment};
pub use settings::{
    BrokerSettings, ConverterProvider, ConverterSettings, LimitSettings, LoggingSettings,
    RetentionSettings, ServerSettings, Settings, SettingsError, StagingProvider, StagingSettings,
    StoreProvider, StoreSettings, WorkerSettings,
};
