use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sector {
    FraudAml,
    Compliance,
    GeoOsint,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FraudAml => "FRAUD_AML",
            Self::Compliance => "COMPLIANCE",
            Self::GeoOsint => "GEO_OSINT",
        }
    }
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InflowDirection {
    Up,
    Down,
    Flat,
}

/// Full attribute set of an agent, as returned by the pull interface.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub sector: Sector,
    pub price: f64,
    pub price_change_pct: f64,
    pub market_cap: f64,
    pub usage_score: f64,
    pub performance_score: f64,
    pub reliability_score: f64,
    pub risk_score: f64,
    pub inflow_velocity: f64,
    pub inflow_direction: InflowDirection,
    pub volatility: f64,
    pub total_backing: f64,
}

/// `GET /market/agents/{id}` adds the recent price history.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AgentDetail {
    #[serde(flatten)]
    pub agent: Agent,
    #[serde(default)]
    pub price_history: Vec<f64>,
}

/// Partial attribute set pushed by the stream. Absent fields mean "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AgentPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_change_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inflow_velocity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inflow_direction: Option<InflowDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatility: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
}

impl AgentPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Overwrite the supplied fields of `agent`, leaving the rest untouched.
    pub fn apply_to(&self, agent: &mut Agent) {
        if let Some(v) = self.price {
            agent.price = v;
        }
        if let Some(v) = self.price_change_pct {
            agent.price_change_pct = v;
        }
        if let Some(v) = self.market_cap {
            agent.market_cap = v;
        }
        if let Some(v) = self.inflow_velocity {
            agent.inflow_velocity = v;
        }
        if let Some(v) = self.inflow_direction {
            agent.inflow_direction = v;
        }
        if let Some(v) = self.volatility {
            agent.volatility = v;
        }
        if let Some(v) = self.risk_score {
            agent.risk_score = v;
        }
    }

    /// Fold a newer patch into this one (newer fields win).
    pub fn merge(&mut self, newer: &AgentPatch) {
        self.price = newer.price.or(self.price);
        self.price_change_pct = newer.price_change_pct.or(self.price_change_pct);
        self.market_cap = newer.market_cap.or(self.market_cap);
        self.inflow_velocity = newer.inflow_velocity.or(self.inflow_velocity);
        self.inflow_direction = newer.inflow_direction.or(self.inflow_direction);
        self.volatility = newer.volatility.or(self.volatility);
        self.risk_score = newer.risk_score.or(self.risk_score);
    }

    pub fn is_empty(&self) -> bool {
        self.price.is_none()
            && self.price_change_pct.is_none()
            && self.market_cap.is_none()
            && self.inflow_velocity.is_none()
            && self.inflow_direction.is_none()
            && self.volatility.is_none()
            && self.risk_score.is_none()
    }
}

#[cfg(test)]
pub(crate) fn sample_agent(id: &str, price: f64) -> Agent {
    Agent {
        id: id.to_string(),
        name: format!("{}-agent", id),
        sector: Sector::Compliance,
        price,
        price_change_pct: 0.0,
        market_cap: price * 1000.0,
        usage_score: 0.8,
        performance_score: 0.7,
        reliability_score: 0.9,
        risk_score: 0.3,
        inflow_velocity: 0.0,
        inflow_direction: InflowDirection::Flat,
        volatility: 0.04,
        total_backing: 1000.0,
    }
}
