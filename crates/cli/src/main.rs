//! Steward CLI — the main entry point.
//!
//! `steward "fix the failing test"` runs one task and exits.
//! `steward` with no prompt starts an interactive session that keeps
//! history across tasks until `exit`, `quit` or end of input.

use clap::Parser;
use std::path::PathBuf;
use steward_config::{AppConfig, ApprovalPolicy};

mod render;
mod session;
mod terminal;

#[derive(Parser)]
#[command(
    name = "steward",
    about = "Steward — an autonomous task agent with approval-gated tools",
    version
)]
struct Cli {
    /// Task to run; starts an interactive session when omitted
    prompt: Option<String>,

    /// Config file (default: ~/.steward/config.toml)
    #[arg(short, long, env = "STEWARD_CONFIG")]
    config: Option<PathBuf>,

    /// Working directory the agent operates in
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Approval policy: on-request, on-failure, auto, auto-edit, never, yolo
    #[arg(short, long)]
    approval: Option<ApprovalPolicy>,

    /// Model name
    #[arg(short, long)]
    model: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env_overrides(|name| std::env::var(name).ok());
            config
        }
        None => AppConfig::load()?,
    };

    if let Some(cwd) = &cli.cwd {
        config.cwd = Some(cwd.clone());
    }
    if let Some(policy) = cli.approval {
        config.approval = policy;
    }
    if let Some(model) = &cli.model {
        config.model.name = model.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli).map_err(|e| format!("Failed to load config: {e}"))?;

    // Initialize tracing
    let filter = if cli.verbose || config.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!(
        model = %config.model.name,
        approval = %config.approval,
        cwd = %config.working_dir().display(),
        "Configuration loaded"
    );

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    STEWARD_API_KEY=sk-...   (recommended)");
        eprintln!("    API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let mut agent = session::build_agent(&config)?;

    let outcome = match cli.prompt {
        Some(prompt) => Ok(session::run_once(&mut agent, &prompt).await),
        None => session::interactive(&mut agent, &config).await.map(|()| true),
    };

    if !session::close_after(&mut agent, outcome).await? {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prompt_and_flags() {
        let cli = Cli::parse_from([
            "steward",
            "list the files",
            "--approval",
            "auto-edit",
            "--model",
            "gpt-4o",
            "-v",
        ]);
        assert_eq!(cli.prompt.as_deref(), Some("list the files"));
        assert_eq!(cli.approval, Some(ApprovalPolicy::AutoEdit));
        assert_eq!(cli.model.as_deref(), Some("gpt-4o"));
        assert!(cli.verbose);
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(Cli::try_parse_from(["steward", "--approval", "sometimes"]).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("steward-cli-test-{}.toml", std::process::id()));
        std::fs::write(&path, "approval = \"never\"\n[model]\nname = \"from-file\"\n").unwrap();

        let cli = Cli::parse_from([
            "steward",
            "--config",
            path.to_str().unwrap(),
            "--model",
            "from-flag",
        ]);
        let config = load_config(&cli).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.approval, ApprovalPolicy::Never);
        assert_eq!(config.model.name, "from-flag");
    }
}
