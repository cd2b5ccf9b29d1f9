//! `hbnb` command interpreter entry point.
//!
//! Reads commands from stdin (with a prompt when attached to a terminal), or
//! runs the single command given as trailing arguments.

use anyhow::Context;
use clap::Parser;
use hbnb_core::{default_log_level, init_logging, FileStorage, DEFAULT_FILE_PATH};
use std::io::{self, IsTerminal};
use std::path::PathBuf;

mod console;

use console::{join_command, Console};

#[derive(Parser)]
#[command(name = "hbnb", about = "Command interpreter for hbnb records", version)]
struct Cli {
    /// JSON file holding every record.
    #[arg(long, env = "HBNB_FILE", default_value = DEFAULT_FILE_PATH)]
    file: PathBuf,

    /// trace|debug|info|warn|error. Defaults to debug in debug builds.
    #[arg(long, env = "HBNB_LOG_LEVEL")]
    log_level: Option<String>,

    /// Directory for rotating log files. Logging is off when unset.
    #[arg(long, env = "HBNB_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Run one command and exit, e.g. `hbnb show User 1234`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let log_dir = if log_dir.is_absolute() {
            log_dir.clone()
        } else {
            std::env::current_dir()
                .context("cannot resolve current directory")?
                .join(log_dir)
        };
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &log_dir).context("failed to initialize logging")?;
    }

    let stdout = io::stdout();
    let mut console = Console::new(FileStorage::new(&cli.file), stdout.lock());
    console
        .startup()
        .with_context(|| format!("failed to load `{}`", cli.file.display()))?;
    log::info!(
        "event=console_ready module=cli status=ok file={} records={}",
        cli.file.display(),
        console.storage().len()
    );

    if !cli.command.is_empty() {
        console.execute(&join_command(&cli.command))?;
        return Ok(());
    }

    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    console.run(stdin.lock(), interactive)
}
