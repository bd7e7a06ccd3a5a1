//! LLM Provider implementations for Steward.
//!
//! All providers implement the `steward_core::Provider` trait. Steward
//! speaks the OpenAI-compatible chat-completions protocol, which covers
//! OpenRouter, OpenAI, Ollama and most self-hosted servers.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
