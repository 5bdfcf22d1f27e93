//! SSH keypair generation and disposal.
//!
//! The key manager owns one RSA keypair at a fixed location inside the
//! per-user key directory. Regeneration deletes the previous files first so at
//! most one keypair ever exists on disk.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

use crate::config::{ConfigError, GitzillaConfig};
use crate::process::{CommandRunner, CommandSpec, ProcessError};

const KEY_TYPE: &str = "rsa";
const KEY_BITS: &str = "4096";
const SNIPPET_CHARS: usize = 30;

/// Errors raised while creating, loading, or deleting the keypair.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Raised when the key directory cannot be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Raised when the key directory cannot be created or opened.
    #[error("failed to prepare key directory {path}: {message}")]
    Directory {
        /// Directory that could not be prepared.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a key file cannot be deleted.
    #[error("failed to remove key file {path}: {message}")]
    Remove {
        /// File that could not be removed.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when `ssh-keygen` exits with a non-zero status.
    #[error("ssh-keygen exited with status {status_text}: {stderr}")]
    Generation {
        /// Human readable representation of the exit status.
        status_text: String,
        /// Diagnostic text captured from the tool.
        stderr: String,
    },
    /// Raised when the generated public key cannot be read back.
    #[error("failed to read public key {path}: {message}")]
    ReadPublicKey {
        /// Public key path.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when an existing keypair was expected but not found.
    #[error("no generated key found at {path}; run `gitzilla keygen` first")]
    Missing {
        /// Private key path that was checked.
        path: Utf8PathBuf,
    },
    /// Raised when `ssh-keygen` cannot be run at all.
    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Locations of the private and public key files.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyPaths {
    /// Private key file.
    pub private_key: Utf8PathBuf,
    /// Public key file, the private key path with `.pub` appended.
    pub public_key: Utf8PathBuf,
}

impl KeyPaths {
    /// Builds the key paths for `name` inside `dir`.
    #[must_use]
    pub fn new(dir: &Utf8Path, name: &str) -> Self {
        let private_key = dir.join(name.trim());
        let public_key = Utf8PathBuf::from(format!("{private_key}.pub"));
        Self {
            private_key,
            public_key,
        }
    }

    /// Resolves the key paths from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the key directory cannot be expanded.
    pub fn from_config(config: &GitzillaConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(&config.resolved_key_dir()?, &config.key_name))
    }

    /// Directory containing both files.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        self.private_key
            .parent()
            .unwrap_or_else(|| Utf8Path::new("."))
    }

    /// Deletes both files, ignoring files that are already absent.
    ///
    /// Both deletions are attempted even when the first fails; the first
    /// failure is returned.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Remove`] when a present file cannot be deleted.
    pub fn remove(&self) -> Result<(), KeyError> {
        let private = remove_if_present(&self.private_key);
        let public = remove_if_present(&self.public_key);
        private.and(public)
    }

    /// Returns `true` when either key file exists.
    #[must_use]
    pub fn any_exist(&self) -> bool {
        self.private_key.exists() || self.public_key.exists()
    }
}

/// A generated keypair and its public key text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Keypair {
    paths: KeyPaths,
    public_key: String,
}

impl Keypair {
    /// Path of the private key used for the SSH transport.
    #[must_use]
    pub fn private_key_path(&self) -> &Utf8Path {
        &self.paths.private_key
    }

    /// Path of the public key file.
    #[must_use]
    pub fn public_key_path(&self) -> &Utf8Path {
        &self.paths.public_key
    }

    /// Both key paths.
    #[must_use]
    pub const fn paths(&self) -> &KeyPaths {
        &self.paths
    }

    /// Full public key text, trimmed.
    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Short preview of the public key for status lines.
    #[must_use]
    pub fn snippet(&self) -> String {
        let mut snippet: String = self.public_key.chars().take(SNIPPET_CHARS).collect();
        snippet.push_str("...");
        snippet
    }
}

/// Generates and loads the single session keypair with `ssh-keygen`.
#[derive(Clone, Debug)]
pub struct KeyManager<R: CommandRunner> {
    paths: KeyPaths,
    keygen_bin: String,
    comment: String,
    runner: R,
}

impl<R: CommandRunner> KeyManager<R> {
    /// Creates a key manager writing to `paths`.
    #[must_use]
    pub fn new(paths: KeyPaths, keygen_bin: &str, comment: &str, runner: R) -> Self {
        Self {
            paths,
            keygen_bin: keygen_bin.to_owned(),
            comment: comment.to_owned(),
            runner,
        }
    }

    /// Creates a key manager from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Config`] when the key directory cannot be resolved.
    pub fn from_config(config: &GitzillaConfig, runner: R) -> Result<Self, KeyError> {
        let paths = KeyPaths::from_config(config)?;
        Ok(Self::new(
            paths,
            &config.ssh_keygen_bin,
            &config.key_comment,
            runner,
        ))
    }

    /// Key locations managed by this instance.
    #[must_use]
    pub const fn paths(&self) -> &KeyPaths {
        &self.paths
    }

    /// Generates a fresh RSA-4096 keypair without a passphrase.
    ///
    /// Any previous key files at the managed paths are deleted first.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Generation`] when `ssh-keygen` fails, or another
    /// [`KeyError`] when the directory, stale files, or public key cannot be
    /// handled.
    pub fn generate(&self) -> Result<Keypair, KeyError> {
        let dir = self.paths.dir();
        Dir::create_ambient_dir_all(dir, ambient_authority()).map_err(|err| {
            KeyError::Directory {
                path: dir.to_path_buf(),
                message: err.to_string(),
            }
        })?;
        self.paths.remove()?;

        tracing::info!(path = %self.paths.private_key, "generating SSH keypair");
        let output = self.runner.run(&self.keygen_command())?;
        if !output.is_success() {
            return Err(KeyError::Generation {
                status_text: output.status_text(),
                stderr: output.diagnostic(),
            });
        }

        self.read_keypair()
    }

    /// Loads a keypair left by an earlier `generate` call.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Missing`] when the private key is absent, or
    /// [`KeyError::ReadPublicKey`] when the public key cannot be read.
    pub fn load_existing(&self) -> Result<Keypair, KeyError> {
        if !self.paths.private_key.is_file() {
            return Err(KeyError::Missing {
                path: self.paths.private_key.clone(),
            });
        }
        self.read_keypair()
    }

    fn keygen_command(&self) -> CommandSpec {
        CommandSpec::new(self.keygen_bin.as_str())
            .args(["-t", KEY_TYPE, "-b", KEY_BITS, "-C"])
            .arg(self.comment.as_str())
            .arg("-f")
            .arg(self.paths.private_key.as_str())
            .args(["-N", ""])
    }

    fn read_keypair(&self) -> Result<Keypair, KeyError> {
        let public_key = read_public_key(&self.paths.public_key)?;
        Ok(Keypair {
            paths: self.paths.clone(),
            public_key,
        })
    }
}

fn read_public_key(path: &Utf8Path) -> Result<String, KeyError> {
    let read_error = |err: io::Error| KeyError::ReadPublicKey {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    let (parent, name) = split_file_path(path).ok_or_else(|| KeyError::ReadPublicKey {
        path: path.to_path_buf(),
        message: String::from("key path is missing a file name"),
    })?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_error)?;
    let contents = dir.read_to_string(name).map_err(read_error)?;
    Ok(contents.trim().to_owned())
}

fn remove_if_present(path: &Utf8Path) -> Result<(), KeyError> {
    let remove_error = |err: io::Error| KeyError::Remove {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    let Some((parent, name)) = split_file_path(path) else {
        return Ok(());
    };
    let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(remove_error(err)),
    };
    match dir.remove_file(name) {
        Ok(()) => {
            tracing::debug!(%path, "removed key file");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(remove_error(err)),
    }
}

fn split_file_path(path: &Utf8Path) -> Option<(&Utf8Path, &str)> {
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    Some((parent, name))
}

#[cfg(test)]
mod tests;
