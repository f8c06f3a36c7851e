use std::io;

use rulechat_model::ErrorKind;
use thiserror::Error;

use crate::reply::MalformedReplyError;

/// Errors raised while an agent produces its raw output.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model provider failed, after any retries.
    #[error("model request failed ({kind:?}): {message}")]
    Model { kind: ErrorKind, message: String },
    /// The model kept asking for tools instead of answering.
    #[error("model requested tools for {0} consecutive rounds without answering")]
    ToolRoundsExceeded(usize),
}

/// Errors that end a conversation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    MalformedReply(#[from] MalformedReplyError),
    #[error("failed to read user input: {0}")]
    Input(#[from] io::Error),
}
