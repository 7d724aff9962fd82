pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "outreach",
    about = "Outreach operator CLI",
    long_about = "Apply migrations, inspect configuration, check readiness, and run single messages through the reply pipeline.",
    after_help = "Examples:\n  outreach doctor --json\n  outreach config\n  outreach chat --identity 573001112233 \"hola\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database connectivity, and generation provider settings")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one message through the reply pipeline and print the reply")]
    Chat {
        #[arg(long, help = "Sender identity, usually a phone number")]
        identity: String,
        #[arg(help = "Inbound message text")]
        message: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Chat { identity, message } => commands::chat::run(&identity, &message),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
