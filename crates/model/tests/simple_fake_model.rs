use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use rulechat_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ResponseFormat,
};
use tokio::time::sleep;

#[derive(Debug)]
struct FakeModelProviderError(ErrorKind);

impl Display for FakeModelProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeModelProviderError {}

impl ModelProviderError for FakeModelProviderError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Answers every request with a JSON echo of the last user message.
struct FakeModelProvider;

impl ModelProvider for FakeModelProvider {
    type Error = FakeModelProviderError;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static
    {
        let last_user = req.messages.iter().rev().find_map(|msg| match msg {
            ModelMessage::User(text) => Some(text.clone()),
            _ => None,
        });
        let json = req.response_format == ResponseFormat::JsonObject;
        async move {
            sleep(Duration::from_millis(1)).await;
            let Some(text) = last_user else {
                return Err(FakeModelProviderError(ErrorKind::Other));
            };
            let content = if json {
                serde_json::json!({ "echo": text }).to_string()
            } else {
                format!("You said {text}")
            };
            Ok(ModelResponse::text(content))
        }
    }
}

mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completion() {
        let provider = FakeModelProvider;
        let req = ModelRequest {
            messages: vec![
                ModelMessage::System("Be brief.".to_string()),
                ModelMessage::User("Good morning".to_string()),
            ],
            ..Default::default()
        };
        let resp = provider.send_request(&req).await.unwrap();
        assert_eq!(resp.content, "You said Good morning");
        assert_eq!(resp.finish_reason, ModelFinishReason::Stop);
        assert!(!resp.wants_tools());
    }

    #[tokio::test]
    async fn test_json_format() {
        let provider = FakeModelProvider;
        let req = ModelRequest {
            messages: vec![ModelMessage::User("Hi".to_string())],
            response_format: ResponseFormat::JsonObject,
            ..Default::default()
        };
        let resp = provider.send_request(&req).await.unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&resp.content).unwrap();
        assert_eq!(value["echo"], "Hi");
    }

    #[tokio::test]
    async fn test_error() {
        let provider = FakeModelProvider;
        let req = ModelRequest::default();
        let result = provider.send_request(&req).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert!(!err.kind().is_transient());
    }
}
