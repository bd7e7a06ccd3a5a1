//! Security module for Steward — approval policy and path containment.
//!
//! Provides:
//! - **Approval**: the ordered policy pipeline that approves, rejects, or
//!   escalates each mutating action to a human
//! - **Path containment**: sandbox-root checks for affected paths

pub mod approval;
pub mod path;

pub use approval::{
    ApprovalContext, ApprovalDecision, ApprovalManager, ConfirmationHandler,
    assess_command_safety, is_dangerous_command, is_safe_command,
};
pub use path::{is_within_root, normalize};
