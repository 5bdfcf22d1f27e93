//! Copying a local file into the working copy.
//!
//! Destinations are resolved relative to the working copy root and every
//! filesystem mutation goes through a capability handle on that root, so a
//! destination can never reach outside the checkout.

use std::io;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

use crate::clone::NO_FOLDERS;

/// Errors raised while staging a file.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum StageError {
    /// Raised when the source is missing or is not a regular file.
    #[error("no valid file to upload at {path}")]
    InvalidSource {
        /// Path that failed validation.
        path: Utf8PathBuf,
    },
    /// Raised when a destination would escape the working copy.
    #[error("destination {value:?} must stay inside the repository")]
    OutsideWorkingCopy {
        /// Offending subfolder or relative path.
        value: String,
    },
    /// Raised when destination directories cannot be created.
    #[error("failed to create folder {path}: {message}")]
    DirectoryCreation {
        /// Directory relative to the working copy root.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the copy itself fails.
    #[error("failed to copy {source_path} to {destination}: {message}")]
    FileCopy {
        /// File being copied.
        source_path: Utf8PathBuf,
        /// Destination relative to the working copy root.
        destination: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
}

/// A file to place into the working copy and where to put it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StagingRequest {
    /// Local file to copy.
    pub source: Utf8PathBuf,
    /// Existing top-level folder; empty or the no-folders placeholder means
    /// the repository root.
    pub subfolder: Option<String>,
    /// Additional folders to create below the subfolder, such as
    /// `docs/notes`.
    pub relative_path: Option<String>,
}

impl StagingRequest {
    /// Starts a request that copies `source` into the repository root.
    #[must_use]
    pub fn new(source: impl Into<Utf8PathBuf>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Targets an existing top-level folder.
    #[must_use]
    pub fn subfolder(mut self, subfolder: impl Into<String>) -> Self {
        self.subfolder = Some(subfolder.into());
        self
    }

    /// Adds nested folders below the subfolder.
    #[must_use]
    pub fn relative_path(mut self, relative_path: impl Into<String>) -> Self {
        self.relative_path = Some(relative_path.into());
        self
    }

    /// Destination directory relative to the working copy root.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::OutsideWorkingCopy`] when either part contains
    /// a parent-directory segment or an absolute path.
    pub fn destination_dir(&self) -> Result<Utf8PathBuf, StageError> {
        let mut target = Utf8PathBuf::new();
        let chosen = self
            .subfolder
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != NO_FOLDERS);
        if let Some(subfolder) = chosen {
            push_contained(&mut target, subfolder)?;
        }
        if let Some(relative) = self.relative_path.as_deref().map(str::trim) {
            push_contained(&mut target, relative)?;
        }
        Ok(target)
    }
}

fn push_contained(target: &mut Utf8PathBuf, value: &str) -> Result<(), StageError> {
    for component in Utf8Path::new(value).components() {
        match component {
            Utf8Component::Normal(segment) => target.push(segment),
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir | Utf8Component::RootDir | Utf8Component::Prefix(_) => {
                return Err(StageError::OutsideWorkingCopy {
                    value: value.to_owned(),
                });
            }
        }
    }
    Ok(())
}

/// Where a staged file ended up.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StagedFile {
    /// Absolute path of the copy.
    pub path: Utf8PathBuf,
    /// Path of the copy relative to the working copy root.
    pub relative: Utf8PathBuf,
}

/// Copies `request.source` into the working copy rooted at `root`.
///
/// Missing destination folders are created. An existing file with the same
/// name is overwritten.
///
/// # Errors
///
/// Returns [`StageError`] when the source is invalid, the destination
/// escapes `root`, or the filesystem refuses the operation.
pub fn stage(root: &Utf8Path, request: &StagingRequest) -> Result<StagedFile, StageError> {
    let source = request.source.as_path();
    let invalid_source = || StageError::InvalidSource {
        path: source.to_path_buf(),
    };
    if !source.is_file() {
        return Err(invalid_source());
    }
    let file_name = source.file_name().ok_or_else(invalid_source)?;
    let source_parent = match source.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };

    let destination = request.destination_dir()?;
    let relative = destination.join(file_name);
    let create_error = |err: io::Error| StageError::DirectoryCreation {
        path: destination.clone(),
        message: err.to_string(),
    };

    let root_dir = Dir::open_ambient_dir(root, ambient_authority()).map_err(create_error)?;
    let target_dir = if destination.as_str().is_empty() {
        root_dir
    } else {
        root_dir.create_dir_all(&destination).map_err(create_error)?;
        root_dir.open_dir(&destination).map_err(create_error)?
    };

    let copy_error = |err: io::Error| StageError::FileCopy {
        source_path: source.to_path_buf(),
        destination: relative.clone(),
        message: err.to_string(),
    };
    let source_dir =
        Dir::open_ambient_dir(source_parent, ambient_authority()).map_err(copy_error)?;
    source_dir
        .copy(file_name, &target_dir, file_name)
        .map_err(copy_error)?;

    tracing::info!(source = %source, destination = %relative, "staged file");
    Ok(StagedFile {
        path: root.join(&relative),
        relative,
    })
}
