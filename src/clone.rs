//! Repository cloning into a disposable working copy.
//!
//! Each clone lands in a fresh `gitzilla_clone_*` temporary directory. The
//! [`WorkingCopy`] owns that directory and deletes it when removed or
//! dropped, so a failed or abandoned session never leaves a checkout behind.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use tempfile::TempDir;
use thiserror::Error;

use crate::process::{CommandRunner, CommandSpec, ProcessError};
use crate::remote::RemoteSession;

/// Placeholder shown when a repository has no top-level folders.
pub const NO_FOLDERS: &str = "(No folders yet)";

const CLONE_DIR_PREFIX: &str = "gitzilla_clone_";
const METADATA_DIR: &str = ".git";

/// Errors raised while cloning or inspecting a working copy.
#[derive(Debug, Error)]
pub enum CloneError {
    /// Raised when the temporary directory cannot be allocated.
    #[error("failed to create clone directory: {message}")]
    TempDir {
        /// Operating system error string.
        message: String,
    },
    /// Raised when the temporary directory path is not valid UTF-8.
    #[error("clone directory path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the offending path.
        path: String,
    },
    /// Raised when `git clone` exits with a non-zero status.
    #[error("git clone exited with status {status_text}: {stderr}")]
    Command {
        /// Human readable representation of the exit status.
        status_text: String,
        /// Diagnostic text captured from git.
        stderr: String,
    },
    /// Raised when the working copy's folders cannot be listed.
    #[error("failed to read repository folders in {path}: {message}")]
    ListFolders {
        /// Directory being listed.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when git cannot be run at all.
    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Top-level folders of a working copy.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FolderListing {
    /// The repository root holds no folders besides git metadata.
    NoFolders,
    /// Folder names in ascending lexicographic order.
    Folders(Vec<String>),
}

impl FolderListing {
    fn from_names(mut names: Vec<String>) -> Self {
        if names.is_empty() {
            return Self::NoFolders;
        }
        names.sort();
        Self::Folders(names)
    }

    /// Entries to present for selection; never empty.
    #[must_use]
    pub fn entries(&self) -> Vec<&str> {
        match self {
            Self::NoFolders => vec![NO_FOLDERS],
            Self::Folders(names) => names.iter().map(String::as_str).collect(),
        }
    }

    /// Real folder names, empty for [`FolderListing::NoFolders`].
    #[must_use]
    pub fn names(&self) -> &[String] {
        match self {
            Self::NoFolders => &[],
            Self::Folders(names) => names,
        }
    }
}

/// A checked-out repository inside a private temporary directory.
#[derive(Debug)]
pub struct WorkingCopy {
    dir: TempDir,
    root: Utf8PathBuf,
    listing: FolderListing,
}

impl WorkingCopy {
    /// Absolute path of the checkout.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Top-level folders observed at clone time or the last refresh.
    #[must_use]
    pub const fn folders(&self) -> &FolderListing {
        &self.listing
    }

    /// Re-reads the top-level folders, picking up directories created by
    /// staging.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::ListFolders`] when the root cannot be read.
    pub fn refresh_folders(&mut self) -> Result<&FolderListing, CloneError> {
        self.listing = list_folders(&self.root)?;
        Ok(&self.listing)
    }

    /// Deletes the checkout. A directory already removed by someone else
    /// counts as success.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when deletion fails for another
    /// reason.
    pub fn remove(self) -> io::Result<()> {
        let root = self.root;
        match self.dir.close() {
            Ok(()) => {
                tracing::debug!(%root, "removed working copy");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Runs `git clone` for a [`RemoteSession`].
#[derive(Clone, Debug)]
pub struct Cloner<R: CommandRunner> {
    git_bin: String,
    runner: R,
}

impl<R: CommandRunner> Cloner<R> {
    /// Creates a cloner invoking `git_bin`.
    #[must_use]
    pub fn new(git_bin: &str, runner: R) -> Self {
        Self {
            git_bin: git_bin.to_owned(),
            runner,
        }
    }

    /// Clones the remote into a new temporary directory and lists its
    /// top-level folders.
    ///
    /// The temporary directory is deleted again when the clone fails.
    ///
    /// # Errors
    ///
    /// Returns [`CloneError::Command`] with git's diagnostic on a non-zero
    /// exit, or another [`CloneError`] when the directory cannot be prepared
    /// or read.
    pub fn clone_repository(&self, remote: &RemoteSession) -> Result<WorkingCopy, CloneError> {
        let dir = tempfile::Builder::new()
            .prefix(CLONE_DIR_PREFIX)
            .tempdir()
            .map_err(|err| CloneError::TempDir {
                message: err.to_string(),
            })?;
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).map_err(|path| {
            CloneError::NonUtf8Path {
                path: path.display().to_string(),
            }
        })?;

        tracing::info!(url = remote.url(), %root, "cloning repository");
        let command = CommandSpec::new(self.git_bin.as_str())
            .arg("clone")
            .arg(remote.url())
            .arg(root.as_str())
            .envs(remote.transport().vars());
        let output = self.runner.run(&command)?;
        if !output.is_success() {
            return Err(CloneError::Command {
                status_text: output.status_text(),
                stderr: output.diagnostic(),
            });
        }

        let listing = list_folders(&root)?;
        Ok(WorkingCopy { dir, root, listing })
    }
}

fn list_folders(root: &Utf8Path) -> Result<FolderListing, CloneError> {
    let list_error = |err: io::Error| CloneError::ListFolders {
        path: root.to_path_buf(),
        message: err.to_string(),
    };
    let dir = Dir::open_ambient_dir(root, ambient_authority()).map_err(list_error)?;
    let mut names = Vec::new();
    for listed in dir.entries().map_err(list_error)? {
        let entry = listed.map_err(list_error)?;
        if !entry.file_type().map_err(list_error)?.is_dir() {
            continue;
        }
        let name = entry.file_name().map_err(list_error)?;
        if name != METADATA_DIR {
            names.push(name);
        }
    }
    Ok(FolderListing::from_names(names))
}
