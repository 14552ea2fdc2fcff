//! The generate-commit-message command.
//!
//! Pulls the staged diff from the source control provider, asks the
//! generator for a message and writes it into the repository's message
//! input. Every failure ends here as a notice; nothing is returned as an
//! error to the caller.

pub mod notify;

use std::path::Path;

use tracing::debug;

use crate::config::Settings;
use crate::error::{ConfigError, GenerateError};
use crate::generate::MessageGenerator;
use crate::scm::SourceControl;

pub use notify::{Notifier, TerminalNotifier};

/// What a command invocation ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Message generated and written into the input box.
    Written { message: String },
    /// Message generated but not written (dry run).
    Generated { message: String },
    NoRepository,
    NoStagedChanges,
    /// The stream completed but the cleaned message was empty.
    EmptyMessage,
    /// A notice describing the failure has already been shown.
    Failed { reason: String },
}

impl CommandOutcome {
    /// Whether the invocation should exit successfully.
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            CommandOutcome::EmptyMessage | CommandOutcome::Failed { .. }
        )
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            CommandOutcome::Written { message } | CommandOutcome::Generated { message } => {
                Some(message)
            }
            _ => None,
        }
    }
}

/// Collaborators of one command invocation.
pub struct GenerateCommand<'a> {
    pub scm: &'a dyn SourceControl,
    pub generator: &'a dyn MessageGenerator,
    pub notifier: &'a dyn Notifier,
    /// Skip writing the message into the input box.
    pub dry_run: bool,
}

impl GenerateCommand<'_> {
    /// Run the command.
    ///
    /// `load_settings` receives the working tree root of the repository (if
    /// any) so repository-level config can be found. Settings are checked
    /// before anything else; no request is made without them.
    pub async fn run<F>(&self, load_settings: F) -> CommandOutcome
    where
        F: FnOnce(Option<&Path>) -> Result<Settings, ConfigError>,
    {
        let repositories = self.scm.repositories();
        let repo = repositories.first().copied();

        let settings = match load_settings(repo.map(|r| r.root())) {
            Ok(settings) => settings,
            Err(e) => return self.fail(e.to_string()),
        };

        let Some(repo) = repo else {
            self.notifier.info("No git repository found.");
            return CommandOutcome::NoRepository;
        };

        let diff = match repo.diff(true).await {
            Ok(diff) => diff,
            Err(e) => return self.fail(e.to_string()),
        };

        if diff.trim().is_empty() {
            self.notifier
                .info("No staged changes. Stage files with `git add` first.");
            return CommandOutcome::NoStagedChanges;
        }

        debug!("Staged diff: {} chars in {}", diff.chars().count(), repo.root().display());
        self.notifier.info(&format!(
            "Generating commit message with {}...",
            settings.model
        ));

        let message = match self.generator.generate(&diff, &settings).await {
            Ok(message) => message,
            Err(GenerateError::EmptyMessage) => {
                self.notifier
                    .warn("The model returned an empty commit message. Nothing was written.");
                return CommandOutcome::EmptyMessage;
            }
            Err(e) => return self.fail(e.to_string()),
        };

        if self.dry_run {
            return CommandOutcome::Generated { message };
        }

        if let Err(e) = repo.input_box().set_value(&message) {
            return self.fail(e.to_string());
        }

        CommandOutcome::Written { message }
    }

    fn fail(&self, reason: String) -> CommandOutcome {
        self.notifier.error(&reason);
        CommandOutcome::Failed { reason }
    }
}
