pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "voxact",
    about = "Voxact operator CLI",
    long_about = "Inspect Voxact configuration, run readiness checks, and execute one-shot prompts.",
    after_help = "Examples:\n  voxact doctor --json\n  voxact config\n  voxact ask \"play take five\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, LLM readiness, and tool availability checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one prompt through the full pipeline and print the actions JSON")]
    Ask {
        #[arg(help = "The utterance to classify and execute")]
        prompt: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Ask { prompt } => commands::ask::run(&prompt),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
