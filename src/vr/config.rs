use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read session config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse session config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown session mode '{0}'")]
    UnknownSessionMode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    #[default]
    Inline,
    ImmersiveVr,
    ImmersiveAr,
}

impl SessionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Inline => "inline",
            SessionMode::ImmersiveVr => "immersive-vr",
            SessionMode::ImmersiveAr => "immersive-ar",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "inline" => Ok(SessionMode::Inline),
            "immersive-vr" => Ok(SessionMode::ImmersiveVr),
            "immersive-ar" => Ok(SessionMode::ImmersiveAr),
            other => Err(ConfigError::UnknownSessionMode(other.to_string())),
        }
    }
}

/// What to ask the host for when a session is initialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub session_mode: SessionMode,
    pub required_features: Vec<String>,
    pub optional_features: Vec<String>,
    /// Tried by the host in order; the first one it can provide wins.
    pub requested_reference_space_types: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_mode: SessionMode::Inline,
            required_features: Vec::new(),
            optional_features: Vec::new(),
            requested_reference_space_types: vec!["local".to_string()],
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Splits a comma separated property string, dropping empty entries.
    pub fn parse_list(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn join_list(values: &[String]) -> String {
        values.join(",")
    }
}
