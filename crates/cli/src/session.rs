//! Agent construction and the single-shot / interactive drivers.

use std::io::Write;
use std::sync::Arc;
use steward_agent::{Agent, AgentSettings};
use steward_config::AppConfig;
use steward_providers::OpenAiCompatProvider;
use steward_security::ApprovalManager;
use tokio::sync::mpsc;

use crate::render;
use crate::terminal::{self, TerminalConfirmation};

/// Wire provider, tools and approval policy from `config`.
pub fn build_agent(config: &AppConfig) -> Result<Agent, Box<dyn std::error::Error>> {
    let provider = Arc::new(OpenAiCompatProvider::from_config(config)?);

    let mut tools = steward_tools::default_registry(&config.shell_environment);
    if let Some(allowed) = &config.allowed_tools {
        tools.retain(allowed);
    }

    let settings = AgentSettings::from_config(config);
    let approval = ApprovalManager::new(config.approval, settings.cwd.clone())
        .with_handler(Arc::new(TerminalConfirmation));

    Ok(Agent::new(provider, Arc::new(tools), approval, settings))
}

/// Run one task while rendering its events. Returns `false` if the run
/// ended with an error.
pub async fn run_once(agent: &mut Agent, prompt: &str) -> bool {
    let (tx, rx) = mpsc::channel(64);
    let run = async move {
        let response = agent.run(prompt, &tx).await;
        drop(tx);
        response
    };
    let (_, outcome) = tokio::join!(run, render::render_events(rx));
    !outcome.had_error
}

/// Close the agent, then hand back what the session produced. The agent
/// is released even when the session failed.
pub async fn close_after<T>(agent: &mut Agent, outcome: T) -> T {
    agent.close().await;
    outcome
}

pub async fn interactive(
    agent: &mut Agent,
    config: &AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("  Steward — Interactive Mode");
    println!();
    println!("  Model:     {}", config.model.name);
    println!("  Approval:  {}", config.approval);
    println!("  Directory: {}", agent.settings().cwd.display());
    println!();
    println!("  Type a task and press Enter. Type 'exit' or Ctrl+D to quit.");
    println!();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = terminal::read_line().await else {
            println!();
            break;
        };
        let task = line.trim();
        if task.is_empty() {
            continue;
        }
        if matches!(task, "exit" | "quit") {
            break;
        }

        println!();
        run_once(agent, task).await;
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use steward_config::ApprovalPolicy;
    use steward_core::error::ProviderError;
    use steward_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use steward_core::tool::ToolRegistry;

    #[derive(Default)]
    struct CountingProvider {
        closes: AtomicUsize,
    }

    #[async_trait]
    impl Provider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::InvalidResponse("not scripted".into()))
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn failed_session_still_closes_agent() {
        let provider = Arc::new(CountingProvider::default());
        let config = AppConfig::default();
        let mut agent = Agent::new(
            provider.clone(),
            Arc::new(ToolRegistry::new()),
            ApprovalManager::new(ApprovalPolicy::OnRequest, config.working_dir()),
            AgentSettings::from_config(&config),
        );

        let outcome: Result<bool, &str> =
            close_after(&mut agent, Err("stdout closed")).await;

        assert_eq!(outcome, Err("stdout closed"));
        assert_eq!(provider.closes.load(Ordering::SeqCst), 1);
    }
}
