pub mod dispatcher;
pub mod kind;

pub use dispatcher::{execute, ActionDispatcher};
pub use kind::{ActionKind, ActionOutcome, ActionParams, ActionPhase, ActionReply, ActionRequest};
