//! Configuration loading via `ortho-config`.
//!
//! [`GitzillaConfig`] merges defaults, `gitzilla.toml` discovery, and
//! `GITZILLA_*` environment variables. Every field has a working default, so
//! a bare installation runs without any configuration file.
//!
//! Environment values are parsed before they are merged, so a string field
//! set to a bare `true`, `false`, or number is rejected with
//! [`ConfigError::Parse`]. Quote such values, for example
//! `GITZILLA_COMMIT_MESSAGE='"2024"'`, or set them in `gitzilla.toml`.

use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Host serving the repositories when none is configured.
pub const DEFAULT_HOST: &str = "github.com";

/// Per-user directory that holds the generated keypair.
pub const DEFAULT_KEY_DIR: &str = "~/.gitzilla_keys";

/// File name of the generated private key; the public key adds `.pub`.
pub const DEFAULT_KEY_NAME: &str = "id_rsa_gitzilla";

/// Comment embedded in the generated public key.
pub const DEFAULT_KEY_COMMENT: &str = "gitzilla_key";

/// Message used for every publish commit.
pub const DEFAULT_COMMIT_MESSAGE: &str = "Add file via Gitzilla";

/// Tool paths, key location, and workflow constants.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "GITZILLA",
    discovery(
        app_name = "gitzilla",
        env_var = "GITZILLA_CONFIG_PATH",
        config_file_name = "gitzilla.toml",
        dotfile_name = ".gitzilla.toml",
        project_file_name = "gitzilla.toml"
    )
)]
pub struct GitzillaConfig {
    /// Path to the `ssh-keygen` executable.
    #[ortho_config(default = "ssh-keygen".to_owned())]
    pub ssh_keygen_bin: String,
    /// Path to the `git` executable.
    #[ortho_config(default = "git".to_owned())]
    pub git_bin: String,
    /// Path to the `ssh` executable git should use as its transport.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Host name placed in `git@<host>:<account>/<repo>.git`.
    #[ortho_config(default = DEFAULT_HOST.to_owned())]
    pub host: String,
    /// Directory that receives the keypair. Supports a leading `~/`.
    #[ortho_config(default = DEFAULT_KEY_DIR.to_owned())]
    pub key_dir: String,
    /// File name of the private key inside `key_dir`.
    #[ortho_config(default = DEFAULT_KEY_NAME.to_owned())]
    pub key_name: String,
    /// Comment passed to `ssh-keygen -C`.
    #[ortho_config(default = DEFAULT_KEY_COMMENT.to_owned())]
    pub key_comment: String,
    /// Commit message used when publishing.
    #[ortho_config(default = DEFAULT_COMMIT_MESSAGE.to_owned())]
    pub commit_message: String,
    /// Optional limit, in seconds, for every external command.
    pub command_timeout_secs: Option<u64>,
}

impl GitzillaConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("gitzilla")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Ensures required values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is blank,
    /// or [`ConfigError::ZeroTimeout`] when the timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (value, field) in [
            (&self.ssh_keygen_bin, "ssh_keygen_bin"),
            (&self.git_bin, "git_bin"),
            (&self.ssh_bin, "ssh_bin"),
            (&self.host, "host"),
            (&self.key_dir, "key_dir"),
            (&self.key_name, "key_name"),
            (&self.key_comment, "key_comment"),
            (&self.commit_message, "commit_message"),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_owned(),
                });
            }
        }
        if self.command_timeout_secs == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Returns the configured command timeout.
    #[must_use]
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    /// Resolves `key_dir`, expanding a leading `~/` against `HOME`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HomeUnavailable`] when the path needs `HOME` and
    /// it is unset or not valid UTF-8.
    pub fn resolved_key_dir(&self) -> Result<Utf8PathBuf, ConfigError> {
        let raw = self.key_dir.trim();
        let Some(rest) = raw.strip_prefix("~/") else {
            return Ok(Utf8PathBuf::from(raw));
        };
        let home = std::env::var("HOME").map_err(|_| ConfigError::HomeUnavailable {
            path: raw.to_owned(),
        })?;
        Ok(Utf8PathBuf::from(home).join(rest))
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty.
    #[error("missing {field}: set GITZILLA_{env_suffix} or add {field} to gitzilla.toml", env_suffix = field.to_uppercase())]
    MissingField {
        /// Configuration field that failed validation.
        field: String,
    },
    /// Raised when a zero-second timeout is configured.
    #[error("command_timeout_secs must be greater than zero")]
    ZeroTimeout,
    /// Raised when `~/` cannot be expanded.
    #[error("cannot expand {path}: HOME is not set")]
    HomeUnavailable {
        /// Path that required expansion.
        path: String,
    },
    /// Surfaces errors from the `ortho-config` loader, including type
    /// mismatches such as `GITZILLA_GIT_BIN=false` being read as a boolean.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}
