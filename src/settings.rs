use serde::{Deserialize, Serialize};

use crate::chat::DEFAULT_HISTORY_CAPACITY;

pub const SETTINGS_STORAGE_KEY: &str = "codepilot.settings";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub auto_refresh: bool,
    pub refresh_delay_ms: u32,
    pub history_capacity: usize,
    pub completion_endpoint: String,
    pub sandbox: String,
    pub auto_apply: bool,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_refresh: true,
            refresh_delay_ms: 300,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            completion_endpoint: "/api/v1/copilot/generate".to_string(),
            sandbox: "allow-scripts".to_string(),
            auto_apply: false,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Settings>(raw).map(Settings::normalized)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn normalized(mut self) -> Self {
        self.history_capacity = self.history_capacity.clamp(1, 1000);
        self.refresh_delay_ms = self.refresh_delay_ms.min(5_000);
        if self.completion_endpoint.trim().is_empty() {
            self.completion_endpoint = Settings::default().completion_endpoint;
        }
        self
    }

    pub fn log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings = Settings::from_json(r#"{"auto_refresh": false}"#).unwrap();
        assert_eq!(
            settings,
            Settings {
                auto_refresh: false,
                ..Settings::default()
            }
        );
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(Settings::from_json("{oops").is_err());
        assert!(Settings::from_json(r#"{"auto_refresh": "yes"}"#).is_err());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let raw =
            r#"{"history_capacity": 0, "refresh_delay_ms": 90000, "completion_endpoint": " "}"#;
        let settings = Settings::from_json(raw).unwrap();
        assert_eq!(settings.history_capacity, 1);
        assert_eq!(settings.refresh_delay_ms, 5_000);
        assert_eq!(settings.completion_endpoint, "/api/v1/copilot/generate");
    }

    #[test]
    fn log_level_parses_with_fallback() {
        let mut settings = Settings::default();
        settings.log_level = "debug".to_string();
        assert_eq!(settings.log_level(), tracing::Level::DEBUG);
        settings.log_level = "loud".to_string();
        assert_eq!(settings.log_level(), tracing::Level::INFO);
    }

    #[test]
    fn round_trips_through_json() {
        let settings = Settings {
            auto_apply: true,
            ..Settings::default()
        };
        assert_eq!(Settings::from_json(&settings.to_json().unwrap()).unwrap(), settings);
    }
}
