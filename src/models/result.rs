use std::{fmt, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use super::id_format;

/// Screening category assigned by the backend classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum RiskLevel {
    Safe,
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "No risk indicators",
            RiskLevel::Low => "Low risk",
            RiskLevel::Moderate => "Moderate risk",
            RiskLevel::High => "High risk",
        }
    }

    /// Interpretation shown next to the result card.
    pub fn guidance(&self) -> &'static str {
        match self {
            RiskLevel::Safe => {
                "Gaze patterns are within the typical range. Continue routine developmental monitoring."
            }
            RiskLevel::Low => {
                "Minor atypical gaze patterns. Consider a follow-up screening at the next scheduled visit."
            }
            RiskLevel::Moderate => {
                "Several atypical gaze patterns. A clinical follow-up assessment is recommended."
            }
            RiskLevel::High => {
                "Strong atypical gaze patterns. Refer for a comprehensive diagnostic evaluation."
            }
        }
    }

    pub fn requires_follow_up(&self) -> bool {
        matches!(self, RiskLevel::Moderate | RiskLevel::High)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "safe" => Ok(RiskLevel::Safe),
            "low" => Ok(RiskLevel::Low),
            "moderate" | "medium" => Ok(RiskLevel::Moderate),
            "high" => Ok(RiskLevel::High),
            other => Err(anyhow!("unknown risk level '{other}'")),
        }
    }
}

impl TryFrom<String> for RiskLevel {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RiskLevel> for String {
    fn from(level: RiskLevel) -> Self {
        level.as_str().to_string()
    }
}

/// Output of one completed session. Written by the backend pipeline and
/// never mutated here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GazeResult {
    #[serde(deserialize_with = "id_format::deserialize")]
    pub id: String,
    #[serde(deserialize_with = "id_format::deserialize")]
    pub child_id: String,
    pub predicted_class: String,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub scanpath_path: Option<String>,
    #[serde(default)]
    pub heatmap_path: Option<String>,
    #[serde(default)]
    pub gaze_data_path: Option<String>,
    pub created_at: String,
}

impl GazeResult {
    /// Confidence as a 0..=100 percentage. The classifier reports a 0..1
    /// fraction but older rows were stored pre-scaled.
    pub fn confidence_percent(&self) -> f64 {
        let scaled = if self.confidence <= 1.0 {
            self.confidence * 100.0
        } else {
            self.confidence
        };
        scaled.clamp(0.0, 100.0)
    }
}

/// Outcome of `GET /get-report/:childId`. `Processing` is the HTTP 202
/// "still writing" answer, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultFetch {
    Ready(GazeResult),
    Processing,
}
