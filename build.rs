//! Build script for generating the `gitzilla` man pages.
//!
//! One page is rendered for the top-level command and one per subcommand
//! into the build output directory using clap-mangen.

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
        })?);

    let command = Cli::command();
    write_page(&out_dir.join("gitzilla.1"), command.clone())?;
    for subcommand in command.get_subcommands() {
        let name = format!("gitzilla-{}.1", subcommand.get_name());
        write_page(&out_dir.join(name), subcommand.clone())?;
    }

    Ok(())
}

fn write_page(path: &Path, command: clap::Command) -> Result<(), Box<dyn std::error::Error>> {
    let mut buffer = Vec::new();
    Man::new(command).render(&mut buffer)?;
    File::create(path)?.write_all(&buffer)?;
    Ok(())
}
