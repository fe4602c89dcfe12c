use anyhow::{Context, Result};

use crate::models::RiskLevel;

pub fn parse_risk_level(value: &str) -> Result<RiskLevel> {
    value
        .parse()
        .with_context(|| format!("invalid risk_level column value '{value}'"))
}
