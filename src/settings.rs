use crate::constants;
use crate::control::types::TunnelName;
use crate::errors;
use anyhow::{Context, ensure};
use config::{Config, Environment, File, Map};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "TUNNEL_UI";

/// Runtime knobs. Layered as defaults, then an optional settings file,
/// then `TUNNEL_UI_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tunnel_name: String,

    #[serde(with = "duration_text")]
    pub refresh_interval: Duration,

    #[serde(with = "duration_text")]
    pub reminder_initial_delay: Duration,

    #[serde(with = "duration_text")]
    pub reminder_interval: Duration,

    pub reminders_enabled: bool,

    pub log_directory: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tunnel_name: constants::DEFAULT_TUNNEL_NAME.to_string(),
            refresh_interval: constants::DEFAULT_REFRESH_INTERVAL,
            reminder_initial_delay: constants::DEFAULT_REMINDER_INITIAL_DELAY,
            reminder_interval: constants::DEFAULT_REMINDER_INTERVAL,
            reminders_enabled: true,
            log_directory: constants::default_log_directory(),
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_with_env(path, None)
    }

    /// `env` replaces the process environment when given.
    fn load_with_env(path: Option<&Path>, env: Option<Map<String, String>>) -> anyhow::Result<Self> {
        let source = path.map_or_else(
            || "defaults".to_string(),
            |p| p.display().to_string(),
        );

        let mut builder = Config::builder().add_source(
            Config::try_from(&Settings::default()).context("Failed to build default settings")?,
        );
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(env),
        );

        let settings: Settings = builder
            .build()
            .and_then(Config::try_deserialize)
            .with_context(|| errors::settings::failed_to_load(&source))?;
        settings.validate()?;

        tracing::debug!("Settings loaded from {}", source);
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.tunnel_name.trim().is_empty(),
            errors::settings::TUNNEL_NAME_EMPTY
        );
        ensure!(
            !self.refresh_interval.is_zero(),
            errors::settings::zero_duration("refresh_interval")
        );
        ensure!(
            !self.reminder_initial_delay.is_zero(),
            errors::settings::zero_duration("reminder_initial_delay")
        );
        ensure!(
            !self.reminder_interval.is_zero(),
            errors::settings::zero_duration("reminder_interval")
        );
        Ok(())
    }

    pub fn tunnel(&self) -> TunnelName {
        TunnelName::new(self.tunnel_name.trim())
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize settings to YAML")
    }
}

/// Durations as human-readable text such as `15m` or `1s`.
mod duration_text {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(text.trim()).map_err(de::Error::custom)
    }
}
