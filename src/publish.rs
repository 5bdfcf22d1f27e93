//! Committing and pushing the working copy.
//!
//! Publishing runs `git add .`, `git commit`, and `git push` inside the
//! working copy. Each command receives the working copy as its own working
//! directory, so the caller's current directory is never changed.

use std::fmt;

use camino::Utf8Path;
use thiserror::Error;

use crate::process::{CommandOutput, CommandRunner, CommandSpec, ProcessError};
use crate::remote::TransportEnv;

const NOTHING_TO_COMMIT_MARKERS: [&str; 2] = ["nothing to commit", "nothing added to commit"];

/// Git step that a publish failure belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PublishStep {
    /// `git add .`
    Add,
    /// `git commit -m <message>`
    Commit,
    /// `git push`
    Push,
}

impl fmt::Display for PublishStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Commit => "commit",
            Self::Push => "push",
        };
        formatter.write_str(name)
    }
}

/// Progress reported as each step completes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PublishMilestone {
    /// Changes were staged with `git add`.
    Staged,
    /// A commit was recorded.
    Committed,
    /// The commit reached the remote.
    Pushed,
}

impl PublishMilestone {
    /// Approximate completion percentage for progress displays.
    #[must_use]
    pub const fn percent(self) -> u8 {
        match self {
            Self::Staged => 33,
            Self::Committed => 66,
            Self::Pushed => 100,
        }
    }
}

/// Successful publish outcomes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PublishResult {
    /// Nothing differed from the last commit; no push happened.
    NoChanges,
    /// The change was committed and pushed.
    Success,
}

/// Errors raised while publishing.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum PublishError {
    /// Raised when a git step exits with a non-zero status.
    #[error("git {step} exited with status {status_text}: {stderr}")]
    GitOperation {
        /// Step that failed.
        step: PublishStep,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Diagnostic text captured from git.
        stderr: String,
    },
    /// Raised when git cannot be run at all.
    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Outcome of the commit step.
#[derive(Debug, Eq, PartialEq)]
enum CommitOutcome {
    Committed,
    NothingToCommit,
    Failed,
}

/// Classifies `git commit` output. Git exits non-zero when there is nothing
/// to commit, so the markers only matter on a failed exit.
fn commit_outcome(output: &CommandOutput) -> CommitOutcome {
    if output.is_success() {
        return CommitOutcome::Committed;
    }
    let mentions_nothing = [&output.stdout, &output.stderr].into_iter().any(|text| {
        let lowered = text.to_lowercase();
        NOTHING_TO_COMMIT_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
    });
    if mentions_nothing {
        CommitOutcome::NothingToCommit
    } else {
        CommitOutcome::Failed
    }
}

/// Runs the add, commit, push sequence.
#[derive(Clone, Debug)]
pub struct Publisher<R: CommandRunner> {
    git_bin: String,
    commit_message: String,
    runner: R,
}

impl<R: CommandRunner> Publisher<R> {
    /// Creates a publisher invoking `git_bin` and committing with
    /// `commit_message`.
    #[must_use]
    pub fn new(git_bin: &str, commit_message: &str, runner: R) -> Self {
        Self {
            git_bin: git_bin.to_owned(),
            commit_message: commit_message.to_owned(),
            runner,
        }
    }

    /// Stages everything under `root`, commits, and pushes.
    ///
    /// `progress` is called after each completed step. When git reports
    /// nothing to commit the push is skipped and
    /// [`PublishResult::NoChanges`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::GitOperation`] naming the failing step, or
    /// [`PublishError::Process`] when git cannot be run.
    pub fn publish(
        &self,
        root: &Utf8Path,
        transport: &TransportEnv,
        mut progress: impl FnMut(PublishMilestone),
    ) -> Result<PublishResult, PublishError> {
        let add = self.run_step(PublishStep::Add, &self.git(root, transport).args(["add", "."]))?;
        check(PublishStep::Add, &add)?;
        progress(PublishMilestone::Staged);

        let commit_command = self
            .git(root, transport)
            .args(["commit", "-m"])
            .arg(self.commit_message.as_str())
            .env("LC_ALL", "C");
        let commit = self.run_step(PublishStep::Commit, &commit_command)?;
        match commit_outcome(&commit) {
            CommitOutcome::NothingToCommit => {
                tracing::info!(%root, "nothing to commit; skipping push");
                return Ok(PublishResult::NoChanges);
            }
            CommitOutcome::Failed => return Err(step_error(PublishStep::Commit, &commit)),
            CommitOutcome::Committed => progress(PublishMilestone::Committed),
        }

        let push = self.run_step(PublishStep::Push, &self.git(root, transport).arg("push"))?;
        check(PublishStep::Push, &push)?;
        progress(PublishMilestone::Pushed);
        Ok(PublishResult::Success)
    }

    fn git(&self, root: &Utf8Path, transport: &TransportEnv) -> CommandSpec {
        CommandSpec::new(self.git_bin.as_str())
            .current_dir(root)
            .envs(transport.vars())
    }

    fn run_step(
        &self,
        step: PublishStep,
        command: &CommandSpec,
    ) -> Result<CommandOutput, PublishError> {
        tracing::debug!(%step, cwd = ?command.current_dir, "running publish step");
        Ok(self.runner.run(command)?)
    }
}

fn check(step: PublishStep, output: &CommandOutput) -> Result<(), PublishError> {
    if output.is_success() {
        Ok(())
    } else {
        Err(step_error(step, output))
    }
}

fn step_error(step: PublishStep, output: &CommandOutput) -> PublishError {
    PublishError::GitOperation {
        step,
        status_text: output.status_text(),
        stderr: output.diagnostic(),
    }
}
