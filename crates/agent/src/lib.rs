//! The core agent loop for Steward.
//!
//! One run follows a **Stream → Approve → Act → Observe** cycle:
//!
//! 1. **Receive** a user message and append it to history
//! 2. **Stream** the model's response, forwarding text as it arrives
//! 3. **If tool calls**: route each one through the approval policy,
//!    execute it via the registry, append the result, and loop back to 2
//! 4. **If text only**: the run ends with that text
//!
//! Between turns the [`LoopDetector`] watches for repetition and the
//! [`ChatCompactor`] keeps history within the context window.

pub mod agent;
pub mod compaction;
pub mod event;
pub mod loop_detector;
pub mod token;

#[cfg(test)]
mod test_helpers;

pub use agent::{Agent, AgentSettings, COMPACTION_THRESHOLD, system_prompt};
pub use compaction::{ChatCompactor, CompactionSummary};
pub use event::AgentEvent;
pub use loop_detector::LoopDetector;
