//! Settings type definitions.
//!
//! Field names are camelCase in JSON. Every section is `#[serde(default)]`,
//! so partial files only need the values they change.

use serde::{Deserialize, Serialize};

/// Root settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TetherSettings {
    /// Settings schema version.
    pub version: String,
    /// Context propagation behaviour.
    pub propagation: PropagationSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for TetherSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            propagation: PropagationSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Context propagation behaviour.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropagationSettings {
    /// Start lineage tracking as soon as a context module is built.
    pub auto_start: bool,
    /// Live association count above which a possible leak is reported.
    pub max_live_continuations: usize,
}

impl Default for PropagationSettings {
    fn default() -> Self {
        Self {
            auto_start: true,
            max_live_continuations: 100_000,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(TetherSettings::default()).unwrap();
        assert_eq!(json["propagation"]["autoStart"], true);
        assert_eq!(json["propagation"]["maxLiveContinuations"], 100_000);
        assert_eq!(json["logging"]["level"], "warn");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: TetherSettings =
            serde_json::from_str(r#"{"propagation": {"autoStart": false}}"#).unwrap();
        assert!(!settings.propagation.auto_start);
        assert_eq!(settings.propagation.max_live_continuations, 100_000);
        assert_eq!(settings.logging, LoggingSettings::default());
    }
}
