// redline CLI entry point.

use clap::Parser;

mod client;
mod commands;
mod exit_code;
mod output;

#[derive(Parser)]
#[command(name = "redline", about = "Staged document edits: plan, preview, apply")]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    match commands::run(cli.command) {
        Ok(()) => exit_code::ExitCode::Success.into(),
        Err(err) => exit_code::ExitCode::from_error(&err).into(),
    }
}
