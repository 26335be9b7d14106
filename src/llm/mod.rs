//! LLM integration for tableqa.
//!
//! Provides the OpenAI-compatible chat-completions client and the
//! [`CodeGenerator`] abstraction the pipeline programs against.

pub mod client;
pub mod generator;

pub use client::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message,
};
pub use generator::{CodeGenerator, ScriptGenerator};
