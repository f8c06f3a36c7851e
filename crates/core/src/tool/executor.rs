use std::collections::HashMap;

use rulechat_model::{ModelTool, ToolCallRequest, ToolCallResult};
use tracing::Instrument;

use crate::tool::{Error, ToolObject, ToolResult};

/// An executor that handles tool call requests from the model.
#[derive(Default)]
pub struct Executor {
    tools: HashMap<String, Box<dyn ToolObject>>,
}

impl Executor {
    pub fn with_tools(tools: Vec<Box<dyn ToolObject>>) -> Self {
        let mut tool_map = HashMap::with_capacity(tools.len());
        for tool in tools {
            let name = tool.name();
            tool_map.insert(name.to_owned(), tool);
        }
        let tools = tool_map;
        Self { tools }
    }

    /// Returns the tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ModelTool> {
        let mut definitions: Vec<_> =
            self.tools.values().map(|tool| tool.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Runs one tool call and turns its outcome into a message for the
    /// model. Failures are reported to the model rather than raised.
    pub async fn execute(&self, req: ToolCallRequest) -> ToolCallResult {
        let span = debug_span!("tool executor", tool = %req.name);
        let result = self.run(&req).instrument(span).await;

        let content = match result {
            Ok(output) => output,
            Err(err) => {
                debug!("tool call failed: {err}");
                format!("Error: {}", err.reason())
            }
        };
        ToolCallResult {
            id: req.id,
            content,
        }
    }

    async fn run(&self, req: &ToolCallRequest) -> ToolResult {
        let Some(tool) = self.tools.get(&req.name) else {
            warn!("tool not found: {}", req.name);
            return Err(Error::not_found().with_reason(format!(
                "no tool named `{}` is available",
                req.name
            )));
        };
        trace!("running tool ({}) with args: {:?}", req.id, req.arguments);
        tool.execute(req.arguments.clone()).await
    }
}
