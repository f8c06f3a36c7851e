use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use rulechat_model::{
    ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
};
use tracing::Instrument;

use crate::error::AgentError;

type SendRequestResult = Result<ModelResponse, AgentError>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// How failed model requests are retried.
///
/// Only transient errors (rate limits, unavailable provider) are retried,
/// and never more than `max_attempts` times in total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl RetryPolicy {
    /// A policy that sends every request exactly once.
    #[inline]
    pub fn never() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(4),
        }
    }
}

/// A wrapper around a model provider that provides a type-erased interface
/// for the other modules and retries transient failures.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
    retry_policy: RetryPolicy,
}

impl ModelClient {
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    fut.await.map_err(|err| {
                        error!("got an error: {err:?}");
                        AgentError::Model {
                            kind: err.kind(),
                            message: err.to_string(),
                        }
                    })
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self {
            handler_fn,
            retry_policy: Default::default(),
        }
    }

    #[inline]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Sends a request and returns the complete response.
    pub async fn send_request(
        &self,
        req: ModelRequest,
    ) -> Result<ModelResponse, AgentError> {
        let policy = self.retry_policy;
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(policy.initial_interval)
            .with_max_interval(policy.max_interval)
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 0;
        backoff::future::retry(backoff, || {
            attempt += 1;
            let this_attempt = attempt;
            let fut = (self.handler_fn)(req.clone());
            async move {
                fut.await.map_err(|err| {
                    let transient = matches!(
                        &err,
                        AgentError::Model { kind, .. } if kind.is_transient()
                    );
                    if transient && this_attempt < policy.max_attempts {
                        warn!("attempt {this_attempt} failed, retrying: {err}");
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use rulechat_model::{ErrorKind, ModelMessage};
    use rulechat_test_model::{PresetResponse, TestModelProvider};

    use super::*;

    fn request() -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_owned())],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        for _ in 0..3 {
            model_provider.add_message_step("How are you?");
        }
        let model_client = ModelClient::new(model_provider.clone());

        for _ in 0..3 {
            let resp = model_client.send_request(request()).await.unwrap();
            assert_eq!(resp.content, "How are you?");
        }
        assert_eq!(model_provider.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_response_step(
            PresetResponse::with_message("ok").with_failures(2),
        );
        let model_client = ModelClient::new(model_provider.clone());

        let resp = model_client.send_request(request()).await.unwrap();
        assert_eq!(resp.content, "ok");
        assert_eq!(model_provider.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_response_step(
            PresetResponse::with_message("ok").with_failures(0),
        );
        let model_client = ModelClient::new(model_provider.clone())
            .with_retry_policy(RetryPolicy {
                max_attempts: 4,
                ..Default::default()
            });

        let err = model_client.send_request(request()).await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Model {
                kind: ErrorKind::RateLimitExceeded,
                ..
            }
        ));
        assert_eq!(model_provider.request_count(), 4);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        // An empty script fails with a permanent error.
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider.clone());

        let err = model_client.send_request(request()).await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Model {
                kind: ErrorKind::Other,
                ..
            }
        ));
        assert_eq!(model_provider.request_count(), 1);
    }
}
