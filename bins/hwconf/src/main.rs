//! hwconf command - apply reversible NIC tuning around a command.

mod apply;
mod describe;
mod example;
mod targets;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hwconf", version, about = "Reversible NIC tuning")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a parameter file and print what would be configured.
    Describe(describe::DescribeArgs),

    /// Configure devices, optionally run a command, then restore them.
    Apply(apply::ApplyArgs),

    /// Print an example parameter file.
    Example(example::ExampleArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Describe(args) => describe::run(args),
        Command::Apply(args) => apply::run(args).await,
        Command::Example(args) => example::run(args),
    }
}
