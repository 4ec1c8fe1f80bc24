pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "propbot",
    about = "PropBot operator CLI",
    long_about = "Operate PropBot runtime readiness, migrations, demo data, config inspection, \
                  and offline message analysis.",
    after_help = "Examples:\n  propbot doctor --json\n  propbot config\n  \
                  propbot analyze \"Looking for a 3 BHK villa, budget 1.5 crore\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo leads and verify them")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, LLM settings, prompt template, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Classify, extract and score one message offline, without the LLM")]
    Analyze {
        #[arg(help = "Lead message text")]
        message: String,
        #[arg(long, default_value_t = 2, help = "Conversation turns to assume when scoring")]
        turns: u64,
        #[arg(long, help = "Treat the lead's phone number as known")]
        with_phone: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start => commands::start::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Analyze { message, turns, with_phone } => {
            commands::analyze::run(&message, turns, with_phone)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
