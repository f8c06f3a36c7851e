mod builder;

use async_trait::async_trait;
use rulechat_model::{ModelMessage, ModelRequest, ResponseFormat};

use crate::error::AgentError;
use crate::model_client::ModelClient;
use crate::ruleset::RuleSet;
use crate::tool::Executor as ToolExecutor;
pub use builder::AgentBuilder;

/// Something that turns a piece of user text into raw output text.
///
/// How the output is produced (which model, which tools, how much history)
/// is up to the implementation. Calls are made one at a time.
#[async_trait]
pub trait Agent: Send {
    /// Runs the agent on `input` and returns its raw output.
    async fn run(&mut self, input: &str) -> Result<String, AgentError>;
}

#[async_trait]
impl<A: Agent + ?Sized> Agent for Box<A> {
    #[inline]
    async fn run(&mut self, input: &str) -> Result<String, AgentError> {
        (**self).run(input).await
    }
}

/// An agent backed by a chat model, with rule sets, tools and an in-memory
/// conversation history.
///
/// The history lives as long as the agent and is never persisted.
pub struct ModelAgent {
    model_client: ModelClient,
    rulesets: Vec<RuleSet>,
    tool_executor: ToolExecutor,
    response_format: ResponseFormat,
    max_tool_rounds: usize,
    history: Vec<ModelMessage>,
}

impl ModelAgent {
    fn from_builder(builder: AgentBuilder) -> Self {
        let AgentBuilder {
            model_client,
            rulesets,
            tools,
            response_format,
            max_tool_rounds,
        } = builder;

        Self {
            model_client,
            rulesets,
            tool_executor: ToolExecutor::with_tools(tools),
            response_format,
            max_tool_rounds,
            history: vec![],
        }
    }

    /// Returns the conversation so far, without the system instructions.
    #[inline]
    pub fn history(&self) -> &[ModelMessage] {
        &self.history
    }

    fn build_model_request(&self) -> ModelRequest {
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        if !self.rulesets.is_empty() {
            let instructions = self
                .rulesets
                .iter()
                .map(RuleSet::to_instructions)
                .collect::<Vec<_>>()
                .join("\n\n");
            messages.push(ModelMessage::System(instructions));
        }
        messages.extend(self.history.iter().cloned());
        ModelRequest {
            messages,
            tools: self.tool_executor.definitions(),
            response_format: self.response_format,
        }
    }
}

#[async_trait]
impl Agent for ModelAgent {
    async fn run(&mut self, input: &str) -> Result<String, AgentError> {
        debug!("agent run: {input:?}");
        self.history.push(ModelMessage::User(input.to_owned()));

        let mut tool_rounds = 0;
        loop {
            let request = self.build_model_request();
            let resp = self.model_client.send_request(request).await?;

            if !resp.wants_tools() {
                trace!("agent output: {}", resp.content);
                self.history
                    .push(ModelMessage::Assistant(resp.content.clone()));
                return Ok(resp.content);
            }

            tool_rounds += 1;
            if tool_rounds > self.max_tool_rounds {
                error!("giving up after {} tool rounds", self.max_tool_rounds);
                return Err(AgentError::ToolRoundsExceeded(
                    self.max_tool_rounds,
                ));
            }

            let tool_calls = resp.tool_calls;
            self.history.push(ModelMessage::AssistantToolCalls {
                content: Some(resp.content).filter(|c| !c.is_empty()),
                tool_calls: tool_calls.clone(),
            });
            // Tools run one after another, results keep the request order.
            for call in tool_calls {
                debug!("model called tool `{}`", call.name);
                let result = self.tool_executor.execute(call).await;
                self.history.push(ModelMessage::Tool(result));
            }
        }
    }
}
