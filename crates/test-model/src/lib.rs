//! A local fake model for testing purpose.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rulechat_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse,
};
use tokio::time::sleep;

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub fn message(&self) -> &str {
        self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Default)]
struct ScriptState {
    script: Vec<PresetResponse>,
    // Index of the next step to answer with.
    cursor: usize,
    // Failed attempts on the current step.
    failed_attempts: u64,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the model should respond to each request, in order. Every request
/// consumes one step, unless the step is configured to fail first. If there
/// are no enough steps in the script, an error will be returned.
///
/// Every request is recorded and can be inspected with [`requests`].
/// Clones share the same script and records.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
///
/// [`requests`]: TestModelProvider::requests
#[derive(Clone, Default)]
pub struct TestModelProvider {
    state: Arc<Mutex<ScriptState>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_response_step(&mut self, preset: PresetResponse) {
        self.lock().script.push(preset);
    }

    /// Adds a step answering with a single message.
    #[inline]
    pub fn add_message_step<S: Into<String>>(&mut self, message: S) {
        self.add_response_step(PresetResponse::with_message(message));
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, including failed ones.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    /// Returns how many requests have been received so far.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        // A panicking test thread is the only way to poison this lock.
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn next_response(
        &self,
        req: &ModelRequest,
    ) -> Result<ModelResponse, Error> {
        let mut state = self.lock();
        state.requests.push(req.clone());

        let cursor = state.cursor;
        let Some(step) = state.script.get(cursor).cloned() else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            });
        };

        match step.failures {
            Some(0) => {
                return Err(Error {
                    message: "preset failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            Some(failures) if state.failed_attempts < failures => {
                state.failed_attempts += 1;
                return Err(Error {
                    message: "preset failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            _ => {}
        }

        state.cursor += 1;
        state.failed_attempts = 0;
        Ok(response_from_events(step.events))
    }
}

fn response_from_events(events: Vec<PresetEvent>) -> ModelResponse {
    let mut content = String::new();
    let mut tool_calls = vec![];
    for event in events {
        match event {
            PresetEvent::MessageDelta(delta) => content.push_str(&delta),
            PresetEvent::ToolCall(req) => tool_calls.push(req),
        }
    }
    let finish_reason = if tool_calls.is_empty() {
        ModelFinishReason::Stop
    } else {
        ModelFinishReason::ToolCalls
    };
    ModelResponse {
        content,
        tool_calls,
        finish_reason,
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static
    {
        let result = self.next_response(req);
        let delay = self.delay;
        async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            result
        }
    }
}
