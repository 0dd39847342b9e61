use clap::Parser;

mod commands;
mod console;

#[derive(Parser)]
#[command(
    name = "mongostats",
    about = "mongostats - read-only MongoDB statistics report for databases, collections and replication state",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // Logs go to stderr so a JSON report on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        commands::Commands::Collect(args) => commands::collect::execute(args).await,
        commands::Commands::Validate(args) => commands::validate::execute(args).await,
    }
}
