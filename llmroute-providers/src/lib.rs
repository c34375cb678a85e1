// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `llmroute` Providers
//!
//! Concrete [`ProviderAdapter`](llmroute_core::ProviderAdapter)
//! implementations for each supported LLM API.
//!
//! Each provider module includes:
//!
//! - **Adapter**: Credentials, headers, endpoint, and error mapping
//! - **Parser**: Request payload construction and response parsing
//!
//! ## Supported Providers
//!
//! | Provider | Endpoint | Auth |
//! |----------|----------|------|
//! | OpenAI | `/v1/chat/completions` | Bearer |
//! | Groq | `/openai/v1/chat/completions` | Bearer |
//! | OpenRouter | `/api/v1/chat/completions` | Bearer + attribution headers |
//! | Anthropic | `/v1/messages` | `x-api-key` |
//! | Google | `/v1beta/models/{model}:generateContent` | `x-goog-api-key` |
//! | Ollama | `/api/generate` | none |
//!
//! ## Usage
//!
//! ```ignore
//! use llmroute_providers::AdapterRegistry;
//!
//! let adapters = AdapterRegistry::from_configs(registry.providers());
//! let groq = adapters.get("groq").unwrap();
//! let response = groq.invoke("llama-3.1-8b-instant", &request, timeout).await?;
//! ```

pub mod error;
pub mod http;
pub mod registry;
mod response;

// Provider modules (alphabetical)
pub mod anthropic;
pub mod google;
pub mod ollama;
pub mod openai;


pub use anthropic::AnthropicAdapter;
pub use error::HttpError;
pub use google::GoogleAdapter;
pub use http::{HttpClient, HttpReply, ResponseExt};
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
pub use registry::AdapterRegistry;
