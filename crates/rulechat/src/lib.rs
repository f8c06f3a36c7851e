//! Terminal chat sessions where every assistant reply is a structured JSON
//! object.
//!
//! The crate includes a CLI tool for using in the terminal. It can also be
//! used as a library: build a [`Session`] for a [`Flow`], then run it with any
//! [`core::InputSource`] and [`core::Render`].

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod markdown;
mod panel;
mod prompt;
mod session;
mod thinking;
pub mod tools;

pub use config::{AppConfig, ConfigError};
pub use panel::{PANEL_WIDTH, PanelRenderer, render_panel};
pub use prompt::StdinPrompt;
pub use session::{Flow, Session, SessionBuilder};
pub use thinking::Thinking;

/// Re-exports of [`rulechat_core`] crate.
pub mod core {
    pub use rulechat_core::*;
}
