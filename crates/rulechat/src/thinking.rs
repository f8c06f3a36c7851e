use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use rulechat_core::{Agent, AgentError};
use tokio::select;
use tokio::time::interval;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Shows a spinner on stderr while the wrapped agent is working.
///
/// The spinner ticks on the same task as the agent call and is cleared before
/// `run` returns, so nothing rendered afterwards is interleaved with it.
pub struct Thinking<A> {
    agent: A,
    style: ProgressStyle,
}

impl<A: Agent> Thinking<A> {
    /// Wraps `agent`.
    pub fn new(agent: A) -> Self {
        let style = ProgressStyle::with_template("{spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        Self { agent, style }
    }
}

#[async_trait]
impl<A: Agent> Agent for Thinking<A> {
    async fn run(&mut self, input: &str) -> Result<String, AgentError> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(self.style.clone());
        spinner.set_message("🤔 Thinking...");

        let mut run = self.agent.run(input);
        let mut ticks = interval(TICK_INTERVAL);
        let output = loop {
            select! {
                output = &mut run => break output,
                _ = ticks.tick() => spinner.tick(),
            }
        };

        spinner.finish_and_clear();
        output
    }
}
