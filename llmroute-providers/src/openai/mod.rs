//! OpenAI-compatible providers: OpenAI, Groq, and OpenRouter.
//!
//! Auth is `Authorization: Bearer <key>`. OpenRouter additionally wants
//! `HTTP-Referer` and `X-Title` for attribution.

mod adapter;
pub(crate) mod parser;

pub use adapter::OpenAiAdapter;
