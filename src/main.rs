//! Binary entry point for the Gitzilla CLI.

use std::io::{self, BufRead, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use gitzilla::drop_path::normalise_drop;
use gitzilla::{
    ConfigError, GitzillaConfig, KeyError, KeyPaths, ProcessCommandRunner, PublishMilestone,
    PublishResult, Session, SessionError, StagingRequest, SystemClipboard,
};

mod cli;

use cli::{Cli, KeygenCommand, RepositoryArgs, TransferArgs, UploadCommand};

const LOG_ENV: &str = "GITZILLA_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error("no valid file to upload: {0}")]
    InvalidFile(String),
    #[error("failed to read confirmation from stdin: {0}")]
    Prompt(String),
}

type CliSession = Session<ProcessCommandRunner, SystemClipboard>;

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli) {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .try_init();
    if installed.is_err() {
        writeln!(io::stderr(), "warning: logging was already initialised").ok();
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    let config = GitzillaConfig::load_without_cli_args()?;
    match cli {
        Cli::Keygen(command) => keygen(config, &command),
        Cli::Folders(repository) => folders(config, &repository),
        Cli::Upload(command) => upload(config, &command),
        Cli::Session(transfer) => interactive_session(config, &transfer),
        Cli::Clean => clean(&config),
    }
}

fn runner_for(config: &GitzillaConfig) -> ProcessCommandRunner {
    config
        .command_timeout()
        .map_or_else(ProcessCommandRunner::new, ProcessCommandRunner::with_timeout)
}

fn open_session(config: GitzillaConfig) -> Result<CliSession, CliError> {
    let runner = runner_for(&config);
    Ok(Session::new(config, runner, SystemClipboard::new())?)
}

fn keygen(config: GitzillaConfig, command: &KeygenCommand) -> Result<(), CliError> {
    let mut session = open_session(config)?;
    let public_key = session.generate_keypair()?.public_key().to_owned();
    writeln!(io::stdout(), "{public_key}").ok();
    if !command.no_clipboard {
        copy_key_or_warn(&mut session);
    }
    let kept = session.key_paths().private_key.clone();
    session.release_keypair();
    writeln!(
        io::stderr(),
        "Key kept at {kept}. Add the public key to the repository as a deploy key with write access."
    )
    .ok();
    Ok(())
}

fn folders(config: GitzillaConfig, repository: &RepositoryArgs) -> Result<(), CliError> {
    let mut session = open_session(config)?;
    session.adopt_existing_keypair()?;
    let outcome = list_folders(&mut session, repository);
    session.release_keypair();
    outcome
}

fn list_folders(session: &mut CliSession, repository: &RepositoryArgs) -> Result<(), CliError> {
    let entries: Vec<String> = session
        .connect(&repository.account, &repository.repo)?
        .folders()
        .entries()
        .into_iter()
        .map(str::to_owned)
        .collect();
    let mut stdout = io::stdout();
    for entry in entries {
        writeln!(stdout, "{entry}").ok();
    }
    Ok(())
}

fn upload(config: GitzillaConfig, command: &UploadCommand) -> Result<(), CliError> {
    let request = staging_request(&command.transfer)?;
    let mut session = open_session(config)?;
    session.adopt_existing_keypair()?;
    let outcome = run_upload(&mut session, &command.transfer.repository, &request);
    if !command.discard_key {
        session.release_keypair();
    }
    report_teardown(&mut session);
    outcome
}

fn interactive_session(config: GitzillaConfig, transfer: &TransferArgs) -> Result<(), CliError> {
    let request = staging_request(transfer)?;
    let mut session = open_session(config)?;
    let public_key = session.generate_keypair()?.public_key().to_owned();
    writeln!(io::stdout(), "{public_key}").ok();
    copy_key_or_warn(&mut session);
    wait_for_registration(&mut io::stdin().lock(), &mut io::stderr())?;

    let outcome = run_upload(&mut session, &transfer.repository, &request);
    report_teardown(&mut session);
    outcome
}

fn clean(config: &GitzillaConfig) -> Result<(), CliError> {
    config.validate()?;
    let paths = KeyPaths::from_config(config)?;
    paths.remove()?;
    writeln!(io::stdout(), "Removed key files in {}.", paths.dir()).ok();
    Ok(())
}

fn staging_request(transfer: &TransferArgs) -> Result<StagingRequest, CliError> {
    let source: Utf8PathBuf = normalise_drop(&transfer.file)
        .ok_or_else(|| CliError::InvalidFile(transfer.file.clone()))?;
    let mut request = StagingRequest::new(source);
    request.subfolder.clone_from(&transfer.folder);
    request.relative_path.clone_from(&transfer.path);
    Ok(request)
}

fn run_upload(
    session: &mut CliSession,
    repository: &RepositoryArgs,
    request: &StagingRequest,
) -> Result<(), CliError> {
    session.connect(&repository.account, &repository.repo)?;
    let staged = session.stage(request)?;
    writeln!(io::stderr(), "Copied to {}.", staged.relative).ok();
    let result = session.publish(report_progress)?;
    let message = match result {
        PublishResult::Success => "File uploaded and changes pushed successfully.",
        PublishResult::NoChanges => "No changes to commit.",
    };
    writeln!(io::stdout(), "{message}").ok();
    Ok(())
}

fn report_progress(milestone: PublishMilestone) {
    writeln!(io::stderr(), "progress: {}%", milestone.percent()).ok();
}

fn copy_key_or_warn(session: &mut CliSession) {
    match session.copy_public_key() {
        Ok(()) => {
            writeln!(io::stderr(), "Public key copied to clipboard.").ok();
        }
        Err(err) => {
            writeln!(io::stderr(), "warning: {err}; copy the key printed above").ok();
        }
    }
}

fn wait_for_registration(
    input: &mut impl BufRead,
    prompt: &mut impl Write,
) -> Result<(), CliError> {
    writeln!(
        prompt,
        "Add the key to the repository as a deploy key with write access, then press Enter."
    )
    .ok();
    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|err| CliError::Prompt(err.to_string()))?;
    Ok(())
}

fn report_teardown(session: &mut CliSession) {
    let report = session.teardown();
    let mut stderr = io::stderr();
    for failure in &report.failures {
        writeln!(stderr, "warning: {failure}").ok();
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
