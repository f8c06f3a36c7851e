use rulechat_model::{ModelProvider, ResponseFormat};

use super::ModelAgent;
use crate::model_client::{ModelClient, RetryPolicy};
use crate::ruleset::RuleSet;
use crate::tool::{AnyTool, Tool, ToolObject};

const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

/// [`ModelAgent`] builder.
pub struct AgentBuilder {
    pub(crate) model_client: ModelClient,
    pub(crate) rulesets: Vec<RuleSet>,
    pub(crate) tools: Vec<Box<dyn ToolObject>>,
    pub(crate) response_format: ResponseFormat,
    pub(crate) max_tool_rounds: usize,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            rulesets: vec![],
            tools: vec![],
            response_format: ResponseFormat::Text,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Attaches a rule set. Rule sets are sent to the model in the order
    /// they are attached.
    #[inline]
    pub fn with_ruleset(mut self, ruleset: RuleSet) -> Self {
        self.rulesets.push(ruleset);
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.push(Box::new(AnyTool(tool)));
        self
    }

    /// Asks the model to answer with a JSON object.
    #[inline]
    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.response_format = if enabled {
            ResponseFormat::JsonObject
        } else {
            ResponseFormat::Text
        };
        self
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.model_client = self.model_client.with_retry_policy(retry_policy);
        self
    }

    /// Limits how many consecutive tool rounds a single run may take.
    #[inline]
    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> ModelAgent {
        ModelAgent::from_builder(self)
    }
}
