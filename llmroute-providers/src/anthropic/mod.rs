//! Anthropic provider implementation.
//!
//! Auth is `x-api-key` plus a pinned `anthropic-version` header.

mod adapter;
pub(crate) mod parser;

pub use adapter::AnthropicAdapter;
