use rulechat_core::driver::{self, CHAT_INTRO};
use rulechat_core::{
    Agent, AgentBuilder, ConversationState, Error, InputSource, Render,
    Responder, RetryPolicy, Schema,
};
use rulechat_model::ModelProvider;

use crate::panel::PanelRenderer;
use crate::thinking::Thinking;
use crate::tools::CalculatorTool;

const READER_INTRO: &str =
    "Introduce yourself to the user and ask for the text they want summarized.";

/// The kind of conversation a session runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Flow {
    /// Free chat until the user is done.
    #[default]
    Chat,
    /// Free chat that also tracks a budget score and a distribution.
    Scored,
    /// Chat where every reply is a summary of what the user shared.
    Reader,
    /// The assistant asks questions about a topic, the user answers.
    Question {
        /// What the questions are about.
        topic: String,
    },
}

impl Flow {
    /// Returns the reply schema used by this flow.
    pub fn schema(&self) -> Schema {
        match self {
            Flow::Chat => Schema::Chat,
            Flow::Scored => Schema::ScoredChat,
            Flow::Reader => Schema::Summary,
            Flow::Question { .. } => Schema::Question,
        }
    }
}

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    flow: Flow,
    spinner: bool,
    renderer: Option<Box<dyn Render + Send>>,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider);
        Self {
            agent_builder,
            flow: Flow::default(),
            spinner: false,
            renderer: None,
        }
    }

    /// Sets the flow to run. Defaults to [`Flow::Chat`].
    #[inline]
    pub fn with_flow(mut self, flow: Flow) -> Self {
        self.flow = flow;
        self
    }

    /// Sets how failed model requests are retried.
    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.agent_builder = self.agent_builder.with_retry_policy(retry_policy);
        self
    }

    /// Shows a spinner on stderr while waiting for the model.
    #[inline]
    pub fn with_spinner(mut self, enabled: bool) -> Self {
        self.spinner = enabled;
        self
    }

    /// Sets where replies are shown. Defaults to panels on stdout.
    #[inline]
    pub fn with_renderer(
        mut self,
        renderer: impl Render + Send + 'static,
    ) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        let schema = self.flow.schema();
        let mut agent_builder = self
            .agent_builder
            .with_ruleset(schema.ruleset())
            .with_json_output(true);
        if matches!(self.flow, Flow::Question { .. }) {
            agent_builder = agent_builder.with_tool(CalculatorTool::new());
        }

        let agent = agent_builder.build();
        let agent: Box<dyn Agent> = if self.spinner {
            Box::new(Thinking::new(agent))
        } else {
            Box::new(agent)
        };
        let renderer = self
            .renderer
            .unwrap_or_else(|| Box::new(PanelRenderer::stdout()));

        Session {
            flow: self.flow,
            responder: Responder::new(agent, schema, renderer),
        }
    }
}

/// A conversation with a configured agent, from the first reply until the
/// agent or the user ends it.
pub struct Session {
    flow: Flow,
    responder: Responder<Box<dyn Agent>, Box<dyn Render + Send>>,
}

impl Session {
    /// Returns the flow this session runs.
    #[inline]
    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    /// Runs the conversation, reading user lines from `input`.
    pub async fn run<I: InputSource + ?Sized>(
        &mut self,
        input: &mut I,
    ) -> Result<ConversationState, Error> {
        info!("starting {:?} flow", self.flow);
        match &self.flow {
            Flow::Chat | Flow::Scored => {
                driver::chat(&mut self.responder, input, CHAT_INTRO).await
            }
            Flow::Reader => {
                driver::chat(&mut self.responder, input, READER_INTRO).await
            }
            Flow::Question { topic } => {
                driver::question(&mut self.responder, input, topic).await
            }
        }
    }
}
