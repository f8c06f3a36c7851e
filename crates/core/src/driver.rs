//! The conversation loop.
//!
//! A conversation is either running or stopped. Which one comes next is
//! decided by [`next_stage`] from the reply's continuation signal alone, the
//! loops below only do the I/O around it.

use std::io;

use async_trait::async_trait;

use crate::agent::Agent;
use crate::error::Error;
use crate::render::Render;
use crate::reply::ContinuationSignal;
use crate::responder::Responder;

pub const CHAT_INTRO: &str = "Introduce yourself to the user.";
pub const CHAT_LABEL: &str = "Chat with the assistant";
pub const ANSWER_LABEL: &str = "Your answer";

/// Where user lines come from.
#[async_trait]
pub trait InputSource: Send {
    /// Shows `label` and blocks until the user enters a line. Returns `None`
    /// at end of input.
    async fn read_line(&mut self, label: &str) -> io::Result<Option<String>>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Stage {
    #[default]
    Running,
    Stopped,
}

/// Decides whether the conversation goes on after a reply.
#[inline]
pub fn next_stage(signal: &ContinuationSignal) -> Stage {
    if signal.continue_chatting {
        Stage::Running
    } else {
        Stage::Stopped
    }
}

/// What the driver knows about the conversation. Never persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConversationState {
    pub stage: Stage,
    /// Number of agent replies received.
    pub turns: usize,
    pub score: Option<f64>,
    pub distribution: Option<f64>,
}

impl ConversationState {
    #[inline]
    pub fn is_running(&self) -> bool {
        self.stage == Stage::Running
    }

    /// Folds a reply's signal into the state.
    pub fn apply(&mut self, signal: &ContinuationSignal) {
        self.turns += 1;
        self.stage = next_stage(signal);
        if signal.score.is_some() {
            self.score = signal.score;
        }
        if signal.distribution.is_some() {
            self.distribution = signal.distribution;
        }
    }

    #[inline]
    fn stop(&mut self) {
        self.stage = Stage::Stopped;
    }
}

/// Runs a free chat: one introduction turn, then one turn per user line,
/// until the agent says the user is done or the input ends.
pub async fn chat<A, R, I>(
    responder: &mut Responder<A, R>,
    input: &mut I,
    intro: &str,
) -> Result<ConversationState, Error>
where
    A: Agent,
    R: Render,
    I: InputSource + ?Sized,
{
    let mut state = ConversationState::default();
    state.apply(&responder.respond(intro).await?);

    while state.is_running() {
        let Some(line) = read_non_blank(input, CHAT_LABEL).await? else {
            debug!("input closed");
            state.stop();
            break;
        };
        state.apply(&responder.respond(&line).await?);
    }

    info!("chat stopped after {} turns", state.turns);
    Ok(state)
}

/// Runs a questioning session about `topic`: the agent asks, the user
/// answers, and each answer goes into the next question turn.
pub async fn question<A, R, I>(
    responder: &mut Responder<A, R>,
    input: &mut I,
    topic: &str,
) -> Result<ConversationState, Error>
where
    A: Agent,
    R: Render,
    I: InputSource + ?Sized,
{
    let mut state = ConversationState::default();
    state.apply(&responder.respond(&question_prompt(topic, None)).await?);

    while state.is_running() {
        let Some(answer) = read_non_blank(input, ANSWER_LABEL).await? else {
            debug!("input closed");
            state.stop();
            break;
        };
        let prompt = question_prompt(topic, Some(&answer));
        state.apply(&responder.respond(&prompt).await?);
    }

    info!("question session stopped after {} turns", state.turns);
    Ok(state)
}

fn question_prompt(topic: &str, answer: Option<&str>) -> String {
    let ask = format!(
        "Ask a relevant question to gather more information about: {topic}"
    );
    match answer {
        Some(answer) => format!("My answer: {answer}\n\n{ask}"),
        None => ask,
    }
}

async fn read_non_blank<I: InputSource + ?Sized>(
    input: &mut I,
    label: &str,
) -> io::Result<Option<String>> {
    loop {
        let Some(line) = input.read_line(label).await? else {
            return Ok(None);
        };
        let line = line.trim();
        if !line.is_empty() {
            return Ok(Some(line.to_owned()));
        }
    }
}
