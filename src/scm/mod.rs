//! Source control capability: repositories, staged diffs and the message input.

pub mod git;

use std::path::Path;

use async_trait::async_trait;

use crate::error::ScmError;

pub use git::{GitProvider, GitRepository, MessageFile};

/// Writable commit message field of a repository.
#[cfg_attr(test, mockall::automock)]
pub trait InputBox {
    fn set_value(&self, value: &str) -> Result<(), ScmError>;
}

/// One repository known to the provider.
#[async_trait]
pub trait ScmRepository: Send + Sync {
    /// Root of the working tree.
    fn root(&self) -> &Path;

    /// Unified diff of the index (`staged = true`) or of the working tree.
    async fn diff(&self, staged: bool) -> Result<String, ScmError>;

    fn input_box(&self) -> &dyn InputBox;
}

/// Provider of the repositories the command can act on.
pub trait SourceControl {
    fn repositories(&self) -> Vec<&dyn ScmRepository>;
}
