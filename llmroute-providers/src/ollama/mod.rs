//! Ollama provider implementation.
//!
//! Talks to a local server without authentication; an unreachable server
//! surfaces as a server error like any other connection failure.

mod adapter;
pub(crate) mod parser;

pub use adapter::OllamaAdapter;
