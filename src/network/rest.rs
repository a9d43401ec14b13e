//! Request/response pull interface of the market backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};
use crate::model::{
    Agent, AgentDetail, AnalysisResult, AudioSummary, GraphData, InjectShockRequest,
    MarketSnapshot, RiskResult, ShockEvent, TestRunResult, TradeReceipt, TradeSide,
};

/// Question sent when an analysis is requested without one.
pub const DEFAULT_ANALYSIS_QUESTION: &str = "Analyze the current market state.";

/// Pull operations against the backend. The engine and the action
/// dispatcher only ever talk to this trait.
#[async_trait]
pub trait MarketApi: Send + Sync + 'static {
    async fn fetch_agents(&self) -> SyncResult<Vec<Agent>>;

    async fn fetch_agent(&self, id: &str) -> SyncResult<AgentDetail>;

    async fn fetch_snapshot(&self) -> SyncResult<MarketSnapshot>;

    async fn trade(&self, agent_id: &str, side: TradeSide, amount: f64)
        -> SyncResult<TradeReceipt>;

    async fn inject_shock(&self, request: &InjectShockRequest) -> SyncResult<ShockEvent>;

    async fn run_analysis(&self, question: Option<&str>) -> SyncResult<AnalysisResult>;

    async fn run_risk_analysis(&self) -> SyncResult<RiskResult>;

    async fn run_tests(&self, test_name: &str) -> SyncResult<TestRunResult>;

    async fn fetch_audio_summary(&self, text: &str) -> SyncResult<AudioSummary>;

    async fn fetch_contagion_graph(&self, shock_id: Option<&str>) -> SyncResult<GraphData>;

    async fn buy(&self, agent_id: &str, amount: f64) -> SyncResult<TradeReceipt> {
        self.trade(agent_id, TradeSide::Buy, amount).await
    }

    async fn sell(&self, agent_id: &str, amount: f64) -> SyncResult<TradeReceipt> {
        self.trade(agent_id, TradeSide::Sell, amount).await
    }
}

/// `reqwest`-backed implementation.
#[derive(Debug, Clone)]
pub struct HttpMarketApi {
    client: Client,
    base_url: Url,
}

impl HttpMarketApi {
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::ConnectionError(format!(
                "API URL cannot be used as a base: {}",
                base_url
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> SyncResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Request failed with {}: {}", status, body);
            return Err(SyncError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MarketApi for HttpMarketApi {
    async fn fetch_agents(&self) -> SyncResult<Vec<Agent>> {
        let url = self.endpoint(&["market", "agents"]);
        self.send(self.client.get(url)).await
    }

    async fn fetch_agent(&self, id: &str) -> SyncResult<AgentDetail> {
        let url = self.endpoint(&["market", "agents", id]);
        self.send(self.client.get(url)).await
    }

    async fn fetch_snapshot(&self) -> SyncResult<MarketSnapshot> {
        let url = self.endpoint(&["market", "snapshot"]);
        let snapshot: MarketSnapshot = self.send(self.client.get(url)).await?;
        debug!(
            "Fetched snapshot: tick {} with {} agents",
            snapshot.tick_number,
            snapshot.agents.len()
        );
        Ok(snapshot)
    }

    async fn trade(
        &self,
        agent_id: &str,
        side: TradeSide,
        amount: f64,
    ) -> SyncResult<TradeReceipt> {
        let url = self.endpoint(&["market", "agents", agent_id, side.as_str()]);
        self.send(self.client.post(url).query(&[("amount", amount)]))
            .await
    }

    async fn inject_shock(&self, request: &InjectShockRequest) -> SyncResult<ShockEvent> {
        let url = self.endpoint(&["shock", "inject"]);
        self.send(self.client.post(url).json(request)).await
    }

    async fn run_analysis(&self, question: Option<&str>) -> SyncResult<AnalysisResult> {
        let url = self.endpoint(&["analysis", "run"]);
        let question = question.unwrap_or(DEFAULT_ANALYSIS_QUESTION);
        self.send(self.client.post(url).json(&json!({ "question": question })))
            .await
    }

    async fn run_risk_analysis(&self) -> SyncResult<RiskResult> {
        let url = self.endpoint(&["analysis", "risk"]);
        self.send(self.client.post(url)).await
    }

    async fn run_tests(&self, test_name: &str) -> SyncResult<TestRunResult> {
        let url = self.endpoint(&["tests", "run"]);
        self.send(self.client.post(url).json(&json!({ "test_name": test_name })))
            .await
    }

    async fn fetch_audio_summary(&self, text: &str) -> SyncResult<AudioSummary> {
        let url = self.endpoint(&["audio", "summary"]);
        self.send(self.client.post(url).json(&json!({ "text": text })))
            .await
    }

    async fn fetch_contagion_graph(&self, shock_id: Option<&str>) -> SyncResult<GraphData> {
        let url = self.endpoint(&["graph", "contagion"]);
        let mut request = self.client.get(url);
        if let Some(shock_id) = shock_id {
            request = request.query(&[("shock_id", shock_id)]);
        }
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpMarketApi {
        HttpMarketApi::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let api = api("http://localhost:8000");
        assert_eq!(
            api.endpoint(&["market", "snapshot"]).as_str(),
            "http://localhost:8000/market/snapshot"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = api("https://aex.example.com/api/");
        assert_eq!(
            api.endpoint(&["market", "agents", "sentinel", "buy"]).as_str(),
            "https://aex.example.com/api/market/agents/sentinel/buy"
        );
    }

    #[test]
    fn test_endpoint_escapes_ids() {
        let api = api("http://localhost:8000");
        assert_eq!(
            api.endpoint(&["market", "agents", "a/b c"]).as_str(),
            "http://localhost:8000/market/agents/a%2Fb%20c"
        );
    }

    #[test]
    fn test_rejects_unusable_base() {
        assert!(matches!(
            HttpMarketApi::new("not a url", Duration::from_secs(1)),
            Err(SyncError::UrlParseError(_))
        ));
        assert!(matches!(
            HttpMarketApi::new("mailto:ops@example.com", Duration::from_secs(1)),
            Err(SyncError::ConnectionError(_))
        ));
    }
}
