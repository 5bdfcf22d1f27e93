//! Core library for the Gitzilla upload workflow.
//!
//! The crate drives a single clone, edit, and push cycle against a remote
//! repository: generate a deploy key, clone with that key, drop a file into
//! the checkout, then commit and push. Every external tool is reached through
//! the [`CommandRunner`] seam so the workflow can be exercised without
//! spawning processes.

pub mod clipboard;
pub mod clone;
pub mod config;
pub mod drop_path;
pub mod keys;
pub mod process;
pub mod publish;
pub mod remote;
pub mod session;
pub mod staging;
pub mod test_support;

pub use clipboard::{ClipboardError, ClipboardSink, SystemClipboard};
pub use clone::{CloneError, Cloner, FolderListing, NO_FOLDERS, WorkingCopy};
pub use config::{ConfigError, GitzillaConfig};
pub use keys::{KeyError, KeyManager, KeyPaths, Keypair};
pub use process::{CommandOutput, CommandRunner, CommandSpec, ProcessCommandRunner, ProcessError};
pub use publish::{PublishError, PublishMilestone, PublishResult, PublishStep, Publisher};
pub use remote::{RemoteError, RemoteIdentity, RemoteSession, TransportEnv};
pub use session::{Session, SessionError, TeardownReport};
pub use staging::{StageError, StagedFile, StagingRequest, stage};
