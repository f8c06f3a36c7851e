//! Core logic: rule sets, structured replies, the model-backed agent, tools,
//! and the conversation loop.

#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod driver;
mod error;
mod model_client;
mod render;
pub mod reply;
mod responder;
mod ruleset;
pub mod tool;

pub use agent::{Agent, AgentBuilder, ModelAgent};
pub use driver::{ConversationState, InputSource, Stage};
pub use error::{AgentError, Error};
pub use model_client::RetryPolicy;
pub use render::Render;
pub use reply::{
    ContinuationSignal, MalformedReplyError, Schema, StructuredReply,
};
pub use responder::Responder;
pub use ruleset::RuleSet;
