pub mod args;
pub mod commands;

pub use args::{RunArgs, ValidateArgs};
use clap::{Parser, Subcommand};
use std::path::Path;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
MIGRATION COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "migrate-tools")]
#[command(version = crate::VERSION)]
#[command(about = "Run row-oriented migration process pipelines")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: validate a definition, then run it against exported source rows."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(
        about = "Check a migration definition",
        long_about = "Validate parses the definition and builds every process stage, reporting configuration errors without reading any rows.",
        after_help = "Example:\n    migrate-tools validate ./migrations/contacts.yml"
    )]
    Validate(ValidateArgs),
    #[command(
        about = "Run a migration over source rows",
        long_about = "Run processes every source row against an in-memory destination, printing processed rows as JSON lines followed by skip messages and a summary.",
        after_help = "Example:\n    migrate-tools run ./migrations/contacts.yml --source rows.jsonl --destination existing.json"
    )]
    Run(RunArgs),
}

impl Command {
    /// Directory searched for `migrate.toml`.
    pub fn workspace(&self) -> Option<&Path> {
        match self {
            Command::Validate(args) => args.workspace.as_deref(),
            Command::Run(args) => args.workspace.as_deref(),
        }
    }

    pub fn quiet(&self) -> bool {
        match self {
            Command::Validate(args) => args.quiet,
            Command::Run(args) => args.quiet,
        }
    }
}

pub fn run(args: Args) -> crate::Result<()> {
    match args.command {
        Command::Validate(validate_args) => commands::validate(validate_args),
        Command::Run(run_args) => commands::run(run_args),
    }
}
