pub mod reconciler;
pub mod view;

pub use reconciler::{AgentEntry, AgentMap, Reconciler};
pub use view::MarketView;
