use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShockType {
    Regulation,
    Cyber,
    FxShock,
    Earthquake,
    Sanctions,
}

impl ShockType {
    pub const ALL: [ShockType; 5] = [
        Self::Regulation,
        Self::Cyber,
        Self::FxShock,
        Self::Earthquake,
        Self::Sanctions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regulation => "REGULATION",
            Self::Cyber => "CYBER",
            Self::FxShock => "FX_SHOCK",
            Self::Earthquake => "EARTHQUAKE",
            Self::Sanctions => "SANCTIONS",
        }
    }
}

impl std::fmt::Display for ShockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ShockType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown shock type: {}", s))
    }
}

/// An external disruption, either injected manually or sourced from a feed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ShockEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub shock_type: ShockType,
    /// 0.0 - 1.0
    pub severity: f64,
    pub description: String,
    /// Unix seconds
    pub timestamp: f64,
    #[serde(default)]
    pub ticks_remaining: u32,
    #[serde(default)]
    pub source: String,
}

impl ShockEvent {
    /// One-line summary used for event log entries.
    pub fn summary(&self) -> String {
        format!(
            "{} shock (severity: {:.2}) - {}",
            self.shock_type, self.severity, self.description
        )
    }
}

/// Body of `POST /shock/inject`. Omitted overrides are computed server side.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InjectShockRequest {
    pub shock_type: ShockType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl InjectShockRequest {
    pub fn new(shock_type: ShockType) -> Self {
        Self {
            shock_type,
            severity: None,
            description: None,
        }
    }
}
