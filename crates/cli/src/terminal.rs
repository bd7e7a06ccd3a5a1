//! Blocking terminal input, bridged into async code.

use async_trait::async_trait;
use std::io::{BufRead, Write};
use steward_core::tool::ToolConfirmation;
use steward_security::ConfirmationHandler;

/// Read one line from stdin on the blocking pool. `None` on end of input.
pub async fn read_line() -> Option<String> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    })
    .await
    .ok()
    .flatten()
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Asks the operator on the terminal; anything but `y`/`yes` denies.
pub struct TerminalConfirmation;

#[async_trait]
impl ConfirmationHandler for TerminalConfirmation {
    async fn confirm(&self, confirmation: &ToolConfirmation) -> bool {
        eprintln!();
        eprintln!("  Approval required: {}", confirmation.description);
        if let Some(command) = &confirmation.command {
            eprintln!("    command: {command}");
        }
        for path in &confirmation.affected_paths {
            eprintln!("    path:    {}", path.display());
        }
        eprint!("  Allow? [y/N] ");
        let _ = std::io::stderr().flush();

        read_line().await.is_some_and(|answer| is_affirmative(&answer))
    }
}
