pub mod agent;
pub mod analysis;
pub mod message;
pub mod shock;
pub mod snapshot;

pub use agent::{Agent, AgentDetail, AgentPatch, InflowDirection, Sector};
pub use analysis::{
    AnalysisResult, AudioSummary, GraphData, GraphEdge, GraphNode, RiskLevel, RiskResult,
    TestResult, TestRunResult, TestStatus, TradeReceipt, TradeSide,
};
pub use message::{EventNotice, NoticeLevel, StreamMessage, TickMessage};
pub use shock::{InjectShockRequest, ShockEvent, ShockType};
pub use snapshot::{AggregateMetrics, AggregatePatch, MarketSnapshot, SectorSummary};
