//! Google Gemini provider implementation.
//!
//! Auth is the `x-goog-api-key` header; the key never goes in the URL.

mod adapter;
pub(crate) mod parser;

pub use adapter::GoogleAdapter;
