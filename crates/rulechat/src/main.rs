//! Runs a structured chat in the terminal.

#[macro_use]
extern crate tracing;

use std::io;
use std::process::ExitCode;

use owo_colors::OwoColorize;
use rulechat::core::{ConversationState, Error};
use rulechat::{AppConfig, Flow, SessionBuilder, StdinPrompt};
use rulechat_openai_model::OpenAIProvider;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            return ExitCode::FAILURE;
        }
    };
    debug!("config: {config:?}");

    let model_provider = OpenAIProvider::new(config.openai);
    let mut session = SessionBuilder::with_model_provider(model_provider)
        .with_flow(config.flow)
        .with_retry_policy(config.retry_policy)
        .with_spinner(true)
        .build();

    let result = session.run(&mut StdinPrompt::new()).await;
    match result {
        Ok(state) => {
            if session.flow() == &Flow::Scored {
                print_scores(&state);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn print_scores(state: &ConversationState) {
    if let (Some(score), Some(distribution)) = (state.score, state.distribution)
    {
        println!("Score: {score}, distribution: {distribution}");
    }
}

fn report(err: &Error) {
    debug!("conversation failed: {err:?}");
    eprintln!("{} {err}", "error:".red().bold());
    if let Error::MalformedReply(err) = err {
        eprintln!("{}", "raw reply:".dimmed());
        eprintln!("{}", err.raw());
    }
}
