//! Session lifecycle around a single clone, stage, and publish cycle.
//!
//! A [`Session`] owns at most one keypair and one working copy. Operations
//! are gated on their prerequisites (a key before connecting, a working copy
//! before staging or publishing) and [`Session::teardown`] removes whatever
//! is still live. Dropping a session tears it down as well.

use thiserror::Error;

use crate::clipboard::{ClipboardError, ClipboardSink};
use crate::clone::{CloneError, Cloner, WorkingCopy};
use crate::config::{ConfigError, GitzillaConfig};
use crate::keys::{KeyError, KeyManager, KeyPaths, Keypair};
use crate::process::CommandRunner;
use crate::publish::{PublishError, PublishMilestone, PublishResult, Publisher};
use crate::remote::{RemoteError, RemoteSession};
use crate::staging::{self, StageError, StagedFile, StagingRequest};

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// An operation needs a generated key and none is live.
    #[error("no generated SSH key found; generate a key first")]
    NoKey,
    /// Staging or publishing was attempted before cloning.
    #[error("repository not cloned; connect first")]
    NoWorkingCopy,
    /// Key generation or loading failed.
    #[error(transparent)]
    Key(#[from] KeyError),
    /// Account or repository names are invalid.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// Cloning failed.
    #[error(transparent)]
    Clone(#[from] CloneError),
    /// Copying the file into the working copy failed.
    #[error(transparent)]
    Stage(#[from] StageError),
    /// Committing or pushing failed.
    #[error(transparent)]
    Publish(#[from] PublishError),
    /// The public key could not be copied.
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
}

/// What [`Session::teardown`] removed and what it could not.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TeardownReport {
    /// A working copy was deleted.
    pub removed_working_copy: bool,
    /// The key files were deleted.
    pub removed_keys: bool,
    /// Cleanup failures, already logged.
    pub failures: Vec<String>,
}

impl TeardownReport {
    /// Returns `true` when every cleanup step succeeded.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Workflow controller owning the keypair and working copy.
pub struct Session<R: CommandRunner, C: ClipboardSink> {
    config: GitzillaConfig,
    key_paths: KeyPaths,
    runner: R,
    clipboard: C,
    keypair: Option<Keypair>,
    owns_key_files: bool,
    remote: Option<RemoteSession>,
    working_copy: Option<WorkingCopy>,
    status: String,
}

impl<R: CommandRunner, C: ClipboardSink> std::fmt::Debug for Session<R, C> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Session")
            .field("key_paths", &self.key_paths)
            .field("keypair", &self.keypair.is_some())
            .field("remote", &self.remote.as_ref().map(RemoteSession::url))
            .field("working_copy", &self.working_copy.as_ref().map(WorkingCopy::root))
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl<R: CommandRunner, C: ClipboardSink> Session<R, C> {
    /// Creates an idle session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] when the configuration is invalid or
    /// the key directory cannot be resolved.
    pub fn new(config: GitzillaConfig, runner: R, clipboard: C) -> Result<Self, SessionError> {
        config.validate()?;
        let key_paths = KeyPaths::from_config(&config)?;
        Ok(Self {
            config,
            key_paths,
            runner,
            clipboard,
            keypair: None,
            owns_key_files: false,
            remote: None,
            working_copy: None,
            status: String::from("Ready."),
        })
    }

    /// Last human-readable status line.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Live keypair, if one was generated or adopted.
    #[must_use]
    pub const fn keypair(&self) -> Option<&Keypair> {
        self.keypair.as_ref()
    }

    /// Live working copy, if connected.
    #[must_use]
    pub const fn working_copy(&self) -> Option<&WorkingCopy> {
        self.working_copy.as_ref()
    }

    /// Remote details of the live working copy, if connected.
    #[must_use]
    pub const fn remote(&self) -> Option<&RemoteSession> {
        self.remote.as_ref()
    }

    /// Key file locations used by this session.
    #[must_use]
    pub const fn key_paths(&self) -> &KeyPaths {
        &self.key_paths
    }

    fn key_manager(&self) -> KeyManager<&R> {
        KeyManager::new(
            self.key_paths.clone(),
            &self.config.ssh_keygen_bin,
            &self.config.key_comment,
            &self.runner,
        )
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        self.status = format!("Error: {err}");
        err
    }

    /// Generates a fresh keypair, replacing any previous one.
    ///
    /// The previous keypair is dropped before `ssh-keygen` runs, so a failed
    /// generation leaves the session without a key. Files at the key paths
    /// belong to the session from here on and are removed on teardown even
    /// when generation fails part way.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Key`] when generation fails.
    pub fn generate_keypair(&mut self) -> Result<&Keypair, SessionError> {
        self.status = String::from("Generating SSH key pair...");
        self.keypair = None;
        self.owns_key_files = true;
        let generated = self.key_manager().generate();
        let keypair = generated.map_err(|err| self.fail(err.into()))?;
        self.status = format!("SSH key generated: {}", keypair.snippet());
        Ok(self.keypair.insert(keypair))
    }

    /// Adopts a keypair left on disk by an earlier run.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Key`] when no readable keypair exists.
    pub fn adopt_existing_keypair(&mut self) -> Result<&Keypair, SessionError> {
        let loaded = self.key_manager().load_existing();
        let keypair = loaded.map_err(|err| self.fail(err.into()))?;
        self.status = format!("Using SSH key {}", keypair.snippet());
        Ok(self.keypair.insert(keypair))
    }

    /// Copies the full public key to the clipboard.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoKey`] before a key exists, or
    /// [`SessionError::Clipboard`] when copying fails.
    pub fn copy_public_key(&mut self) -> Result<(), SessionError> {
        let live_key = self
            .keypair
            .as_ref()
            .map(|keypair| keypair.public_key().to_owned());
        let Some(public_key) = live_key else {
            return Err(self.fail(SessionError::NoKey));
        };
        let copied = self.clipboard.set_text(&public_key);
        copied.map_err(|err| self.fail(err.into()))?;
        self.status = String::from("Public key copied to clipboard.");
        Ok(())
    }

    /// Clones `account/repository` with the live key.
    ///
    /// Any working copy from an earlier connect is removed first. A failed
    /// clone leaves the session without a working copy.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoKey`] when no key file is present,
    /// [`SessionError::Remote`] for blank names, or
    /// [`SessionError::Clone`] when cloning fails.
    pub fn connect(
        &mut self,
        account: &str,
        repository: &str,
    ) -> Result<&WorkingCopy, SessionError> {
        let key_file = self
            .keypair
            .as_ref()
            .map(|keypair| keypair.private_key_path().to_path_buf())
            .filter(|path| path.is_file());
        let Some(private_key) = key_file else {
            return Err(self.fail(SessionError::NoKey));
        };
        let built = RemoteSession::build(
            &self.config.host,
            account,
            repository,
            &self.config.ssh_bin,
            &private_key,
        );
        let remote = built.map_err(|err| self.fail(err.into()))?;

        self.discard_working_copy();
        self.status = format!("Cloning repository '{}'...", remote.url());
        let cloned = Cloner::new(&self.config.git_bin, &self.runner).clone_repository(&remote);
        let copy = cloned.map_err(|err| self.fail(err.into()))?;

        self.status = format!(
            "Repository cloned; folders: {}",
            copy.folders().entries().join(", ")
        );
        self.remote = Some(remote);
        Ok(self.working_copy.insert(copy))
    }

    /// Copies a file into the live working copy.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoWorkingCopy`] before connecting, or
    /// [`SessionError::Stage`] when staging fails.
    pub fn stage(&mut self, request: &StagingRequest) -> Result<StagedFile, SessionError> {
        let attempt = self
            .working_copy
            .as_mut()
            .map(|copy| stage_into(copy, request));
        let Some(outcome) = attempt else {
            return Err(self.fail(SessionError::NoWorkingCopy));
        };
        let staged = outcome.map_err(|err| self.fail(err.into()))?;
        self.status = format!("File copied to {}.", staged.relative);
        Ok(staged)
    }

    /// Commits and pushes the live working copy.
    ///
    /// The caller's current directory is unchanged afterwards, whatever the
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoWorkingCopy`] before connecting, or
    /// [`SessionError::Publish`] when a git step fails.
    pub fn publish(
        &mut self,
        progress: impl FnMut(PublishMilestone),
    ) -> Result<PublishResult, SessionError> {
        let attempt = match (&self.working_copy, &self.remote) {
            (Some(copy), Some(remote)) => Some(
                Publisher::new(
                    &self.config.git_bin,
                    &self.config.commit_message,
                    &self.runner,
                )
                .publish(copy.root(), remote.transport(), progress),
            ),
            _ => None,
        };
        let Some(published) = attempt else {
            return Err(self.fail(SessionError::NoWorkingCopy));
        };
        let result = published.map_err(|err| self.fail(err.into()))?;
        self.status = match result {
            PublishResult::NoChanges => String::from("Nothing to commit."),
            PublishResult::Success => {
                String::from("File uploaded and changes pushed successfully.")
            }
        };
        Ok(result)
    }

    /// Detaches the keypair so teardown leaves its files in place.
    pub const fn release_keypair(&mut self) -> Option<Keypair> {
        self.owns_key_files = false;
        self.keypair.take()
    }

    /// Deletes the live working copy and key files.
    ///
    /// Failures are logged and collected in the report rather than returned.
    /// Calling this again after a successful teardown is a no-op.
    pub fn teardown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        if let Some(copy) = self.working_copy.take() {
            match remove_working_copy(copy) {
                Ok(()) => report.removed_working_copy = true,
                Err(failure) => report.failures.push(failure),
            }
        }
        self.remote = None;
        let live_key = self.keypair.take().is_some();
        if live_key || self.owns_key_files {
            self.owns_key_files = false;
            match self.key_paths.remove() {
                Ok(()) => report.removed_keys = true,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to remove key files");
                    report.failures.push(err.to_string());
                }
            }
        }
        if report.removed_working_copy || report.removed_keys || !report.is_clean() {
            self.status = String::from("Session closed.");
        }
        report
    }

    fn discard_working_copy(&mut self) {
        self.remote = None;
        if let Some(copy) = self.working_copy.take() {
            if let Err(failure) = remove_working_copy(copy) {
                tracing::warn!(%failure, "continuing with a fresh clone");
            }
        }
    }
}

fn stage_into(copy: &mut WorkingCopy, request: &StagingRequest) -> Result<StagedFile, StageError> {
    let staged = staging::stage(copy.root(), request)?;
    if let Err(err) = copy.refresh_folders() {
        tracing::warn!(error = %err, "failed to refresh folder listing");
    }
    Ok(staged)
}

fn remove_working_copy(copy: WorkingCopy) -> Result<(), String> {
    let root = copy.root().to_path_buf();
    copy.remove().map_err(|err| {
        tracing::warn!(%root, error = %err, "failed to remove working copy");
        format!("failed to remove working copy {root}: {err}")
    })
}

impl<R: CommandRunner, C: ClipboardSink> Drop for Session<R, C> {
    fn drop(&mut self) {
        let report = self.teardown();
        if !report.is_clean() {
            tracing::warn!(failures = report.failures.len(), "session teardown was incomplete");
        }
    }
}
