use crate::agent::Agent;
use crate::error::Error;
use crate::render::Render;
use crate::reply::{self, ContinuationSignal, Schema};

/// Runs an agent, validates its reply against a schema, and shows the
/// human-facing part of it.
pub struct Responder<A, R> {
    agent: A,
    schema: Schema,
    renderer: R,
}

impl<A: Agent, R: Render> Responder<A, R> {
    #[inline]
    pub fn new(agent: A, schema: Schema, renderer: R) -> Self {
        Self {
            agent,
            schema,
            renderer,
        }
    }

    #[inline]
    pub fn schema(&self) -> Schema {
        self.schema
    }

    #[inline]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Sends `input` to the agent and renders the reply.
    ///
    /// A reply that does not match the schema is returned as an error and
    /// nothing is rendered.
    pub async fn respond(
        &mut self,
        input: &str,
    ) -> Result<ContinuationSignal, Error> {
        let raw = self.agent.run(input).await?;
        let reply = reply::parse(&raw, self.schema).inspect_err(|err| {
            warn!("rejected reply: {err}: {raw:?}");
        })?;
        self.renderer.render(reply.text());

        let signal = reply.signal();
        debug!("reply signal: {signal:?}");
        Ok(signal)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::AgentError;
    use crate::reply::MalformedReason;

    struct CannedAgent(Vec<&'static str>);

    #[async_trait]
    impl Agent for CannedAgent {
        async fn run(&mut self, _input: &str) -> Result<String, AgentError> {
            Ok(self.0.remove(0).to_owned())
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl Render for Recorder {
        fn render(&mut self, text: &str) {
            self.0.push(text.to_owned());
        }
    }

    #[tokio::test]
    async fn test_renders_and_continues() {
        let agent = CannedAgent(vec![
            r#"{"response": "Hi there!", "continue_chatting": true}"#,
        ]);
        let mut responder =
            Responder::new(agent, Schema::Chat, Recorder::default());

        let signal = responder.respond("Hello").await.unwrap();
        assert!(signal.continue_chatting);
        assert_eq!(responder.renderer().0, vec!["Hi there!"]);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_not_rendered() {
        let agent = CannedAgent(vec![
            r#"{"score": 70, "distribution": 0.5, "continue_chatting": true}"#,
        ]);
        let mut responder =
            Responder::new(agent, Schema::ScoredChat, Recorder::default());

        let err = responder.respond("I have $1500").await.unwrap_err();
        let Error::MalformedReply(err) = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(err.reason(), &MalformedReason::MissingKey("response"));
        assert!(responder.renderer().0.is_empty());
    }

    #[tokio::test]
    async fn test_scored_signal() {
        let agent = CannedAgent(vec![
            r#"{"response": "Noted.", "continue_chatting": true, "score": 85, "distribution": 0.6}"#,
        ]);
        let mut responder =
            Responder::new(agent, Schema::ScoredChat, Recorder::default());
        assert_eq!(responder.schema(), Schema::ScoredChat);

        let signal = responder.respond("I have $3000").await.unwrap();
        assert_eq!(signal.score, Some(85.0));
        assert_eq!(signal.distribution, Some(0.6));
        assert_eq!(responder.renderer().0, vec!["Noted."]);
    }
}
