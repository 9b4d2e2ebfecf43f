use chrono::Local;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::{PublishError, PublishRequest, PublishResponse};

const REMOTE_NAME: &str = "origin";
const UP_TO_DATE: &str = "Everything up-to-date";

/// Outcome of the local half of a publish: repository ready, changes committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRepo {
    pub initialized: bool,
    /// Commit message, or `None` when the tree was clean.
    pub commit: Option<String>,
}

/// Publishes a local folder to GitHub by driving the `git` executable.
pub struct GitPublisher {
    git: PathBuf,
}

impl GitPublisher {
    pub fn new() -> Result<Self, PublishError> {
        let git = which::which("git").map_err(|_| PublishError::GitMissing)?;
        Ok(Self { git })
    }

    pub fn with_executable(git: impl Into<PathBuf>) -> Self {
        Self { git: git.into() }
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<Output, PublishError> {
        Command::new(&self.git)
            .current_dir(dir)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|e| PublishError::ServiceUnavailable(e.to_string()))
    }

    /// Run and require a zero exit status.
    fn run_ok(&self, dir: &Path, args: &[&str]) -> Result<String, PublishError> {
        let out = self.run(dir, args)?;
        if !out.status.success() {
            return Err(PublishError::GitFailed {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&out.stdout).into())
    }

    pub fn is_repo(&self, dir: &Path) -> bool {
        self.run(dir, &["rev-parse", "--is-inside-work-tree"])
            .map(|out| out.status.success() && String::from_utf8_lossy(&out.stdout).trim() == "true")
            .unwrap_or(false)
    }

    fn has_remote(&self, dir: &Path, name: &str) -> Result<bool, PublishError> {
        let remotes = self.run_ok(dir, &["remote"])?;
        Ok(remotes.lines().any(|line| line.trim() == name))
    }

    /// Init if needed, set the author and `origin`, and commit pending changes.
    pub fn prepare(&self, request: &PublishRequest) -> Result<PreparedRepo, PublishError> {
        let dir = request.local_path.as_path();
        if !dir.is_dir() {
            return Err(PublishError::Configuration(format!(
                "Local Path does not exist: {}",
                dir.display()
            )));
        }

        let initialized = !self.is_repo(dir);
        if initialized {
            self.run_ok(dir, &["init"])?;
            tracing::info!(target: "publish", "initialized new git repository in {}", dir.display());
        }

        self.run_ok(dir, &["config", "user.name", &request.repo_owner])?;
        self.run_ok(dir, &["config", "user.email", &request.author_email()])?;

        let url = request.remote_url();
        if self.has_remote(dir, REMOTE_NAME)? {
            self.run_ok(dir, &["remote", "set-url", REMOTE_NAME, &url])?;
        } else {
            self.run_ok(dir, &["remote", "add", REMOTE_NAME, &url])?;
        }

        // A failed commit still lets the push go out with whatever is already committed.
        let commit = self.commit_changes(dir).unwrap_or_else(|err| {
            tracing::warn!(target: "publish", "commit step failed, pushing anyway: {}", err);
            None
        });

        Ok(PreparedRepo { initialized, commit })
    }

    fn commit_changes(&self, dir: &Path) -> Result<Option<String>, PublishError> {
        let status = self.run_ok(dir, &["status", "--porcelain"])?;
        if status.trim().is_empty() {
            tracing::info!(target: "publish", "no changes to commit, pushing anyway");
            return Ok(None);
        }
        let message = format!("Update from SFT Console: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        self.run_ok(dir, &["add", "."])?;
        self.run_ok(dir, &["commit", "-m", &message])?;
        tracing::info!(target: "publish", "commit created: {}", message);
        Ok(Some(message))
    }

    fn push(&self, request: &PublishRequest) -> Result<PublishResponse, PublishError> {
        let dir = request.local_path.as_path();
        let branch = request.branch.as_str();
        let first = self.run(dir, &["push", REMOTE_NAME, branch])?;
        if first.status.success() {
            return Ok(PublishResponse::ok(""));
        }

        tracing::info!(target: "publish", "push failed, retrying with --set-upstream");
        let retry = self.run(dir, &["push", "--set-upstream", REMOTE_NAME, branch])?;
        let stderr = String::from_utf8_lossy(&retry.stderr).trim().to_string();
        if retry.status.success() {
            Ok(PublishResponse::ok("Synced (Upstream Set)!"))
        } else if stderr.contains(UP_TO_DATE) {
            Ok(PublishResponse::ok("Already up-to-date."))
        } else {
            tracing::error!(target: "publish", "push failed: {}", stderr);
            Err(PublishError::GitFailed {
                command: "push".into(),
                stderr,
            })
        }
    }

    /// Commit and push `local_path` to `owner/repo` on the configured branch.
    pub fn publish(&self, request: &PublishRequest) -> Result<PublishResponse, PublishError> {
        tracing::info!(
            target: "publish",
            "git sync start: {} -> {} ({})",
            request.local_path.display(),
            request.slug(),
            request.branch
        );
        let prepared = self.prepare(request)?;
        let response = self.push(request)?;
        if response.message.is_empty() {
            let detail = prepared.commit.as_deref().unwrap_or("No changes");
            return Ok(PublishResponse::ok(format!("Synced successfully! ({detail})")));
        }
        Ok(response)
    }
}
