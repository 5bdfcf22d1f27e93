//! Remote URL and SSH transport environment construction.
//!
//! Git reaches the repository over SSH. [`RemoteSession::build`] validates the
//! account and repository names, renders the `git@host:account/repo.git` URL,
//! and prepares a `GIT_SSH_COMMAND` override pinning the transport to the
//! generated private key.

use camino::Utf8Path;
use shell_escape::unix::escape;
use thiserror::Error;

/// Environment variable git consults for its SSH command.
pub const GIT_SSH_COMMAND: &str = "GIT_SSH_COMMAND";

/// Environment variable that stops git from prompting for credentials.
pub const GIT_TERMINAL_PROMPT: &str = "GIT_TERMINAL_PROMPT";

/// Errors raised while building remote details.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RemoteError {
    /// Raised when a required name is blank.
    #[error("missing {field}: enter a non-empty value")]
    MissingField {
        /// Name of the blank field.
        field: String,
    },
}

/// Account and repository identifying the remote.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteIdentity {
    account: String,
    repository: String,
}

impl RemoteIdentity {
    /// Builds an identity, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::MissingField`] naming `host_account` or
    /// `repository_name` when either is blank.
    pub fn new(account: &str, repository: &str) -> Result<Self, RemoteError> {
        Ok(Self {
            account: require(account, "host_account")?,
            repository: require(repository, "repository_name")?,
        })
    }

    /// Account (user or organisation) owning the repository.
    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Repository name without the `.git` suffix.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Renders the SSH clone URL for `host`.
    #[must_use]
    pub fn remote_url(&self, host: &str) -> String {
        format!("git@{}:{}/{}.git", host.trim(), self.account, self.repository)
    }
}

fn require(value: &str, field: &str) -> Result<String, RemoteError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RemoteError::MissingField {
            field: field.to_owned(),
        });
    }
    Ok(trimmed.to_owned())
}

/// Environment overrides that force git's SSH transport onto one key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransportEnv {
    ssh_command: String,
}

impl TransportEnv {
    /// Builds the overrides for `ssh_bin` using `private_key`.
    ///
    /// Host keys are accepted without prompting and agent or default keys
    /// are ignored.
    #[must_use]
    pub fn for_key(ssh_bin: &str, private_key: &Utf8Path) -> Self {
        let key = escape(private_key.as_str().into());
        Self {
            ssh_command: format!(
                "{ssh_bin} -i {key} -o IdentitiesOnly=yes -o StrictHostKeyChecking=no"
            ),
        }
    }

    /// Value assigned to `GIT_SSH_COMMAND`.
    #[must_use]
    pub fn ssh_command(&self) -> &str {
        &self.ssh_command
    }

    /// Variables to layer over the inherited environment.
    #[must_use]
    pub fn vars(&self) -> [(&str, &str); 2] {
        [
            (GIT_SSH_COMMAND, self.ssh_command.as_str()),
            (GIT_TERMINAL_PROMPT, "0"),
        ]
    }
}

/// Everything needed to talk to the remote repository.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteSession {
    identity: RemoteIdentity,
    url: String,
    transport: TransportEnv,
}

impl RemoteSession {
    /// Validates the names and derives the URL and transport environment.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::MissingField`] when `account` or `repository`
    /// is blank.
    pub fn build(
        host: &str,
        account: &str,
        repository: &str,
        ssh_bin: &str,
        private_key: &Utf8Path,
    ) -> Result<Self, RemoteError> {
        let identity = RemoteIdentity::new(account, repository)?;
        let url = identity.remote_url(host);
        Ok(Self {
            identity,
            url,
            transport: TransportEnv::for_key(ssh_bin, private_key),
        })
    }

    /// Validated account and repository.
    #[must_use]
    pub const fn identity(&self) -> &RemoteIdentity {
        &self.identity
    }

    /// SSH clone URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Transport environment shared by clone and publish.
    #[must_use]
    pub const fn transport(&self) -> &TransportEnv {
        &self.transport
    }
}
