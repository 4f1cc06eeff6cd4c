use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use workstation_cli::{cli, commands, logging};

/// Exit code for a run interrupted with Ctrl-C.
const INTERRUPTED_EXIT_CODE: i32 = 130;

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();
    let command = args.command.name();

    logging::init_subscriber(args.verbose, command);
    let log = Arc::new(logging::Logger::new(command));

    ctrlc::set_handler(|| {
        tracing::warn!("interrupted");
        std::process::exit(INTERRUPTED_EXIT_CODE);
    })?;

    match &args.command {
        cli::Command::List => commands::list::run(&args.global, &log),
        cli::Command::Show(opts) => commands::show::run(&args.global, opts, &log),
        cli::Command::Apply(opts) => commands::apply::run(&args.global, opts, &log),
        cli::Command::Remove(opts) => commands::remove::run(&args.global, opts, &log),
        cli::Command::Validate => commands::validate::run(&args.global, &log),
        cli::Command::BackupList => commands::backups::list(&args.global, &log),
        cli::Command::Restore(opts) => commands::backups::restore(&args.global, opts, &log),
        cli::Command::Version => {
            commands::version::run(&log);
            Ok(())
        }
    }
}
