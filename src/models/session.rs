use std::{fmt, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use super::id_format;

/// Kind of capture run requested from the tracking backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Calibration,
    #[default]
    Assessment,
    Practice,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Calibration => "calibration",
            SessionType::Assessment => "assessment",
            SessionType::Practice => "practice",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "calibration" => Ok(SessionType::Calibration),
            "assessment" => Ok(SessionType::Assessment),
            "practice" => Ok(SessionType::Practice),
            other => Err(anyhow!("unknown session type '{other}'")),
        }
    }
}

/// Body of `POST /start`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StartSessionRequest {
    pub child_id: String,
    pub stimulus_id: String,
    pub session_type: SessionType,
}

/// Capture currently owned by the backend, as echoed by `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveSession {
    #[serde(deserialize_with = "id_format::deserialize")]
    pub child_id: String,
    #[serde(deserialize_with = "id_format::deserialize")]
    pub stimulus_id: String,
    #[serde(default)]
    pub session_type: Option<String>,
}

/// Processing flag polled while the backend classifies a finished capture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionStatus {
    pub processing: bool,
    #[serde(default)]
    pub session: Option<ActiveSession>,
}

impl SessionStatus {
    pub fn idle() -> Self {
        Self {
            processing: false,
            session: None,
        }
    }

    pub fn processing() -> Self {
        Self {
            processing: true,
            session: None,
        }
    }
}

/// Acknowledgement returned by `/start` and `/stop`. The backend is loose
/// about its shape, so every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Ack {
    /// Decode an ack body, keeping non-JSON bodies as the message.
    pub fn from_body(body: &str) -> Self {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Self::default();
        }
        serde_json::from_str(trimmed).unwrap_or_else(|_| Self {
            message: Some(trimmed.to_string()),
            status: None,
        })
    }
}
