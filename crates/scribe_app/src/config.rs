use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scribe_engine::{ChannelKind, ManagerSettings, TransportSettings, DEFAULT_BASE_URL};
use scribe_logging::{scribe_info, scribe_warn};
use serde::{Deserialize, Serialize};

pub(crate) const CONFIG_FILENAME: &str = "scribe.ron";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub(crate) enum ChannelChoice {
    #[default]
    Push,
    Poll,
}

/// Settings read from `scribe.ron`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) base_url: String,
    pub(crate) connect_timeout_secs: u64,
    pub(crate) request_timeout_secs: u64,
    pub(crate) session_cookie: Option<String>,
    pub(crate) channel: ChannelChoice,
    pub(crate) poll_interval_ms: u64,
    pub(crate) output_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let transport = TransportSettings::default();
        let manager = ManagerSettings::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_secs: transport.connect_timeout.as_secs(),
            request_timeout_secs: transport.request_timeout.as_secs(),
            session_cookie: None,
            channel: ChannelChoice::Push,
            poll_interval_ms: u64::try_from(manager.poll_interval.as_millis()).unwrap_or(2_000),
            output_dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    pub(crate) fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            session_cookie: self.session_cookie.clone(),
        }
    }

    pub(crate) fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            channel: match self.channel {
                ChannelChoice::Push => ChannelKind::Push,
                ChannelChoice::Poll => ChannelKind::Poll,
            },
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

/// `./scribe.ron` unless a path was given.
pub(crate) fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".").join(CONFIG_FILENAME))
}

/// Missing file means defaults. An unreadable or invalid file is logged and
/// also falls back to defaults.
pub(crate) fn load_config(path: &Path) -> AppConfig {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return AppConfig::default();
        }
        Err(err) => {
            scribe_warn!("Failed to read config from {:?}: {}", path, err);
            return AppConfig::default();
        }
    };

    match ron::from_str(&content) {
        Ok(config) => {
            scribe_info!("Loaded config from {:?}", path);
            config
        }
        Err(err) => {
            scribe_warn!("Failed to parse config from {:?}: {}", path, err);
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load_config(&temp.path().join(CONFIG_FILENAME));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.manager_settings().channel, ChannelKind::Push);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"(base_url: "http://transcribe.internal:9000/api", channel: Poll, poll_interval_ms: 500)"#,
        )
        .unwrap();

        let config = load_config(&path);
        assert_eq!(config.base_url, "http://transcribe.internal:9000/api");
        assert_eq!(config.channel, ChannelChoice::Poll);
        assert_eq!(
            config.manager_settings().poll_interval,
            Duration::from_millis(500)
        );
        assert_eq!(config.request_timeout_secs, AppConfig::default().request_timeout_secs);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(&path, "(base_url: 42").unwrap();

        assert_eq!(load_config(&path), AppConfig::default());
    }

    #[test]
    fn transport_settings_carry_cookie() {
        let config = AppConfig {
            session_cookie: Some("JSESSIONID=abc".to_string()),
            connect_timeout_secs: 3,
            ..AppConfig::default()
        };
        let settings = config.transport_settings();
        assert_eq!(settings.session_cookie.as_deref(), Some("JSESSIONID=abc"));
        assert_eq!(settings.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn explicit_path_wins() {
        let explicit = PathBuf::from("/etc/scribe/scribe.ron");
        assert_eq!(config_path(Some(&explicit)), explicit);
        assert!(config_path(None).ends_with(CONFIG_FILENAME));
    }
}
