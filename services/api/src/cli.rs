use crate::server;
use crate::stages;
use ans_despesas::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "ANS Despesas",
    about = "Consolidate, validate and serve accounting expense data of ANS health-insurance operators",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP reporting service (default command)
    Serve(ServeArgs),
    /// Run batch pipeline stages over the configured data directories
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommand,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum PipelineCommand {
    /// Consolidate, enrich and load into the store, in sequence
    Run,
    /// Consolidate raw statement files into the canonical expense dataset
    Consolidate,
    /// Enrich the consolidated dataset and write both reports
    Enrich,
    /// Enrich and replace the store contents with the results
    Load,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Pipeline { command } => stages::run(command),
    }
}
