//! # Steward Core
//!
//! Domain types, traits, and error definitions for the Steward task agent.
//! Every other crate in the workspace depends inward on this one.
//!
//! ## Design Philosophy
//!
//! The seams of the system are traits defined here:
//! - [`Provider`] — a language model backend (streaming and non-streaming)
//! - [`Tool`] — a capability the model may invoke
//!
//! Implementations live in their respective crates, which keeps the agent
//! loop testable against scripted providers and in-memory tools.

pub mod error;
pub mod message;
pub mod provider;
pub mod schema;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, ToolError};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{
    Provider, ProviderRequest, ProviderResponse, StreamEvent, TokenUsage, ToolDefinition,
};
pub use schema::{ParamType, Parameter, ParameterSchema};
pub use tool::{
    Tool, ToolConfirmation, ToolInvocation, ToolKind, ToolRegistry, ToolResult,
};
