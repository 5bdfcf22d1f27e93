//! Command-line interface definitions for the `gitzilla` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser};

/// Top-level CLI for the `gitzilla` binary.
#[derive(Debug, Parser)]
#[command(
    name = "gitzilla",
    about = "Generate a deploy key, clone a repository, drop a file in, and push it",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Generate the SSH keypair and copy the public key to the clipboard.
    #[command(name = "keygen")]
    Keygen(KeygenCommand),
    /// Clone the repository with the generated key and list its folders.
    #[command(name = "folders")]
    Folders(RepositoryArgs),
    /// Clone, copy a file in, commit, and push using the generated key.
    #[command(name = "upload")]
    Upload(UploadCommand),
    /// Run the whole workflow interactively and remove every key afterwards.
    #[command(name = "session")]
    Session(TransferArgs),
    /// Delete the generated key files.
    #[command(name = "clean")]
    Clean,
}

/// Arguments for `gitzilla keygen`.
#[derive(Debug, Args)]
pub(crate) struct KeygenCommand {
    /// Print the public key without touching the clipboard.
    #[arg(long)]
    pub(crate) no_clipboard: bool,
}

/// Repository coordinates shared by the cloning subcommands.
#[derive(Debug, Args)]
pub(crate) struct RepositoryArgs {
    /// Account or organisation that owns the repository.
    #[arg(long, value_name = "ACCOUNT")]
    pub(crate) account: String,
    /// Repository name without the `.git` suffix.
    #[arg(long, value_name = "REPO")]
    pub(crate) repo: String,
}

/// Repository, file, and destination shared by `upload` and `session`.
#[derive(Debug, Args)]
pub(crate) struct TransferArgs {
    /// Repository to publish to.
    #[command(flatten)]
    pub(crate) repository: RepositoryArgs,
    /// Local file to upload. Drag-and-drop payloads such as
    /// `{/path/with spaces.txt}` or `file:///path` are accepted.
    #[arg(long, value_name = "PATH")]
    pub(crate) file: String,
    /// Existing top-level folder to place the file in; defaults to the root.
    #[arg(long, value_name = "FOLDER")]
    pub(crate) folder: Option<String>,
    /// New folders to create below the chosen folder, such as `docs/notes`.
    #[arg(long, value_name = "RELATIVE_PATH")]
    pub(crate) path: Option<String>,
}

/// Arguments for `gitzilla upload`.
#[derive(Debug, Args)]
pub(crate) struct UploadCommand {
    /// What to upload and where.
    #[command(flatten)]
    pub(crate) transfer: TransferArgs,
    /// Delete the generated key files once the upload finishes.
    #[arg(long)]
    pub(crate) discard_key: bool,
}
