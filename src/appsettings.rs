use std::sync::OnceLock;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct TelegramSettings {
    pub token: String,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct ReminderSettings {
    /// How often due reminders are fetched from storage, in seconds.
    pub dispatch_period_secs: u64,
    pub max_future_years: u32,
    pub create_lead_minutes: i64,
    pub edit_lead_minutes: i64,
    pub max_reminders_per_user: usize,
    pub max_file_size_bytes: u64,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            dispatch_period_secs: 20,
            max_future_years: 2,
            create_lead_minutes: 1,
            edit_lead_minutes: 10,
            max_reminders_per_user: 50,
            max_file_size_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct AppSettings {
    pub telegram: TelegramSettings,
    #[serde(default)]
    pub reminders: ReminderSettings,
}

impl AppSettings {
    fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("appsettings").required(true))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(Environment::with_prefix("APP"))
            .build()?;

        settings.try_deserialize()
    }
}

pub fn get() -> &'static AppSettings {
    static APPSETTINGS: OnceLock<AppSettings> = OnceLock::new();
    APPSETTINGS.get_or_init(|| AppSettings::new().unwrap())
}
