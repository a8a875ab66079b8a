use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Migration definition file (YAML)
    #[arg(value_name = "DEFINITION")]
    pub definition: PathBuf,

    /// Directory holding migrate.toml (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Disable console logging
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Migration definition file (YAML)
    #[arg(value_name = "DEFINITION")]
    pub definition: PathBuf,

    /// Source rows as a JSON array or JSON lines
    #[arg(long, value_name = "FILE")]
    pub source: PathBuf,

    /// Destination fixture with existing entities (JSON)
    #[arg(long, value_name = "FILE")]
    pub destination: Option<PathBuf>,

    /// Directory holding migrate.toml (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Print the run summary as JSON instead of text
    #[arg(long)]
    pub json_summary: bool,

    /// Disable console logging
    #[arg(long, short = 'q')]
    pub quiet: bool,
}
