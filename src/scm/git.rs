//! git2-backed source control provider.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use git2::{Diff, DiffFormat, DiffOptions, ErrorCode, Oid, Repository, Tree};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::ScmError;
use crate::scm::{InputBox, ScmRepository, SourceControl};

/// File git reads the pending commit message from.
const COMMIT_EDITMSG: &str = "COMMIT_EDITMSG";

/// Discovers the repository containing a path.
#[derive(Debug)]
pub struct GitProvider {
    repository: Option<GitRepository>,
}

impl GitProvider {
    /// Find the repository containing `path`.
    ///
    /// Not being inside a repository is not an error: the provider simply has
    /// no repositories. Bare repositories are skipped since they have no
    /// working tree to commit from.
    pub fn discover(path: &Path) -> Result<Self, ScmError> {
        let repo = match Repository::discover(path) {
            Ok(repo) => repo,
            Err(e) if e.code() == ErrorCode::NotFound => {
                debug!("No git repository found from {}", path.display());
                return Ok(Self { repository: None });
            }
            Err(e) => return Err(ScmError::OpenRepository(e)),
        };

        let Some(workdir) = repo.workdir() else {
            debug!("Skipping bare repository at {}", repo.path().display());
            return Ok(Self { repository: None });
        };

        let repository = GitRepository {
            workdir: workdir.to_path_buf(),
            input: MessageFile::new(repo.path().join(COMMIT_EDITMSG)),
        };
        Ok(Self {
            repository: Some(repository),
        })
    }

    /// Redirect the message input of the discovered repository to `path`,
    /// e.g. the file passed to a `prepare-commit-msg` hook.
    pub fn with_message_file(mut self, path: PathBuf) -> Self {
        if let Some(repo) = self.repository.as_mut() {
            repo.input = MessageFile::new(path);
        }
        self
    }

    pub fn repository(&self) -> Option<&GitRepository> {
        self.repository.as_ref()
    }
}

impl SourceControl for GitProvider {
    fn repositories(&self) -> Vec<&dyn ScmRepository> {
        self.repository
            .iter()
            .map(|r| r as &dyn ScmRepository)
            .collect()
    }
}

/// A repository with a working tree.
///
/// The git2 handle is reopened per operation so this type stays `Sync`.
#[derive(Debug)]
pub struct GitRepository {
    workdir: PathBuf,
    input: MessageFile,
}

impl GitRepository {
    fn open(&self) -> Result<Repository, ScmError> {
        Repository::open(&self.workdir).map_err(ScmError::OpenRepository)
    }

    /// Path the generated message is written to.
    pub fn message_path(&self) -> &Path {
        self.input.path()
    }

    /// Unified diff of HEAD against the index.
    pub fn staged_diff(&self) -> Result<String, ScmError> {
        let repo = self.open()?;
        let head_tree = resolve_head_tree(&repo)?;
        let diff = repo
            .diff_tree_to_index(head_tree.as_ref(), None, None)
            .map_err(ScmError::DiffFailed)?;
        render_patch(&diff)
    }

    /// Unified diff of the index against the working tree, untracked files included.
    pub fn unstaged_diff(&self) -> Result<String, ScmError> {
        let repo = self.open()?;
        let mut opts = DiffOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .show_untracked_content(true);
        let diff = repo
            .diff_index_to_workdir(None, Some(&mut opts))
            .map_err(ScmError::DiffFailed)?;
        render_patch(&diff)
    }

    /// Create a commit from the current index on HEAD.
    ///
    /// Only what is already staged is committed. An unborn HEAD produces a
    /// root commit.
    pub fn commit_index(&self, message: &str) -> Result<Oid, ScmError> {
        let repo = self.open()?;

        let mut index = repo.index().map_err(ScmError::CommitFailed)?;
        let tree_id = index.write_tree().map_err(ScmError::CommitFailed)?;
        let tree = repo.find_tree(tree_id).map_err(ScmError::CommitFailed)?;

        let sig = repo.signature().map_err(ScmError::ConfigError)?;

        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit().map_err(ScmError::CommitFailed)?),
            Err(e)
                if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound =>
            {
                None
            }
            Err(e) => return Err(ScmError::CommitFailed(e)),
        };
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .map_err(ScmError::CommitFailed)
    }
}

#[async_trait]
impl ScmRepository for GitRepository {
    fn root(&self) -> &Path {
        &self.workdir
    }

    async fn diff(&self, staged: bool) -> Result<String, ScmError> {
        if staged {
            self.staged_diff()
        } else {
            self.unstaged_diff()
        }
    }

    fn input_box(&self) -> &dyn InputBox {
        &self.input
    }
}

/// Commit message input backed by a file, written atomically.
#[derive(Debug, Clone)]
pub struct MessageFile {
    path: PathBuf,
}

impl MessageFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InputBox for MessageFile {
    fn set_value(&self, value: &str) -> Result<(), ScmError> {
        let write_failed = |source| ScmError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(dir).map_err(write_failed)?;
        file.write_all(value.as_bytes()).map_err(write_failed)?;
        if !value.ends_with('\n') {
            file.write_all(b"\n").map_err(write_failed)?;
        }
        file.persist(&self.path).map_err(|e| write_failed(e.error))?;

        debug!("Wrote commit message to {}", self.path.display());
        Ok(())
    }
}

/// Resolve the HEAD tree, distinguishing empty-repo errors from real failures.
///
/// Returns `Ok(None)` for repos with no commits (unborn branch / not found),
/// so staged files diff against the empty tree.
fn resolve_head_tree(repo: &Repository) -> Result<Option<Tree<'_>>, ScmError> {
    let head_ref = match repo.head() {
        Ok(r) => r,
        Err(e)
            if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound =>
        {
            return Ok(None);
        }
        Err(e) => return Err(ScmError::DiffFailed(e)),
    };

    let tree = head_ref.peel_to_tree().map_err(ScmError::DiffFailed)?;
    Ok(Some(tree))
}

/// Render a diff as patch text with origin markers.
fn render_patch(diff: &Diff<'_>) -> Result<String, ScmError> {
    let mut text = String::new();

    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        let origin = line.origin();
        if matches!(origin, '+' | '-' | ' ') {
            text.push(origin);
        }
        text.push_str(&String::from_utf8_lossy(line.content()));
        true
    })
    .map_err(ScmError::DiffFailed)?;

    Ok(text)
}
