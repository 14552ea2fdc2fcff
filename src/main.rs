//! diffscribe - CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::Confirm;
use tracing_subscriber::EnvFilter;

use diffscribe::command::{CommandOutcome, GenerateCommand, Notifier, TerminalNotifier};
use diffscribe::config::load_settings;
use diffscribe::generate::GenerationClient;
use diffscribe::scm::GitProvider;

/// Environment variable holding the tracing filter directive.
const LOG_ENV_VAR: &str = "DIFFSCRIBE_LOG";

/// Generate a commit message for the staged changes using a local LLM.
#[derive(Parser, Debug)]
#[command(name = "diffscribe")]
#[command(about = "Generate a commit message for staged changes using a local LLM")]
#[command(version)]
struct Cli {
    /// Config file to use instead of the user and repository config files
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the message to this file instead of .git/COMMIT_EDITMSG
    /// (e.g. the path passed to a prepare-commit-msg hook)
    #[arg(long)]
    message_file: Option<PathBuf>,

    /// Print the generated message without writing it anywhere
    #[arg(long, conflicts_with_all = ["commit", "message_file"])]
    dry_run: bool,

    /// Create a commit from the staged changes with the generated message
    #[arg(long)]
    commit: bool,

    /// Skip the confirmation prompt for --commit
    #[arg(short = 'y', long, requires = "commit")]
    yes: bool,

    /// Show debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let notifier = TerminalNotifier;
    let cwd = std::env::current_dir().context("Failed to read current directory")?;

    let mut provider = match GitProvider::discover(&cwd) {
        Ok(provider) => provider,
        Err(e) => {
            notifier.error(&e.to_string());
            return Ok(ExitCode::FAILURE);
        }
    };
    if let Some(path) = cli.message_file.clone() {
        provider = provider.with_message_file(path);
    }

    let client = GenerationClient::new().context("Failed to create HTTP client")?;

    let command = GenerateCommand {
        scm: &provider,
        generator: &client,
        notifier: &notifier,
        dry_run: cli.dry_run,
    };

    let config_path = cli.config.as_deref();
    let outcome = command
        .run(|root| load_settings(config_path, root))
        .await;

    let success = match &outcome {
        CommandOutcome::Generated { message } => {
            println!("\n{message}");
            true
        }
        CommandOutcome::Written { message } => match provider.repository() {
            Some(repo) if cli.commit => commit_with_message(repo, message, cli.yes, &notifier),
            Some(repo) => {
                println!("\n{message}\n");
                println!("✓ Commit message written to {}", repo.message_path().display());
                true
            }
            None => true,
        },
        other => other.is_success(),
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Confirm (unless `yes`) and commit the index with `message`.
fn commit_with_message(
    repo: &diffscribe::scm::GitRepository,
    message: &str,
    yes: bool,
    notifier: &TerminalNotifier,
) -> bool {
    println!("\n{message}\n");

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt("Commit staged changes with this message?")
            .default(true)
            .interact();
        match confirmed {
            Ok(true) => {}
            Ok(false) => {
                println!("Commit skipped. The message is in {}", repo.message_path().display());
                return true;
            }
            Err(e) => {
                notifier.error(&format!("Could not read confirmation: {e}"));
                return false;
            }
        }
    }

    match repo.commit_index(message) {
        Ok(oid) => {
            let short: String = oid.to_string().chars().take(7).collect();
            println!("✓ Created commit {short}");
            true
        }
        Err(e) => {
            notifier.error(&e.to_string());
            false
        }
    }
}

/// Install the stderr tracing subscriber.
///
/// `DIFFSCRIBE_LOG` takes precedence; otherwise `--verbose` enables debug
/// output for this crate and everything else stays at warn.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "warn,diffscribe=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
