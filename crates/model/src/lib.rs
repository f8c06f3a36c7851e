//! A provider-neutral protocol for talking to chat models.
//!
//! The agent only ever speaks the types defined here, so that a model
//! provider can be swapped (or faked in tests) without touching the
//! conversation logic.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
