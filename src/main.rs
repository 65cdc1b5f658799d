// Entrypoint for the fairflow CLI.
// - Keeps `main` small: parse the command line, set up logging, dispatch.
// - A failure prints one line on stderr and exits with the code for its
//   failure class (see `error`).

use clap::Parser;
use fairflow_cli::cli::{Cli, Commands};
use fairflow_cli::config::ServiceConfig;
use fairflow_cli::{auth, error, flow, status};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(error::exit_code_for(&err))
        }
    }
}

fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => flow::run(&args, cli.verbose),
        Commands::Status(args) => status::run(&args),
        Commands::Login(args) => {
            let config = ServiceConfig::resolve(None)?;
            auth::run_login(&config, args.force_login, args.no_browser)
        }
        Commands::Logout => {
            let config = ServiceConfig::resolve(None)?;
            auth::run_logout(&config)
        }
    }
}

/// --verbose lowers the default filter to debug; RUST_LOG always wins.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}
