//! CLI entry point - the composition root.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ferry_cli::{Cli, Commands, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Logs go to stderr so they interleave cleanly with the progress bars
    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Upload(args) => {
            let result = handlers::upload::execute(&args)
                .await
                .and_then(|report| {
                    println!("{}", report.summary.line());
                    report.check()
                });
            if let Err(e) = result {
                eprintln!("Error: {e}");
                std::process::exit(e.exit_code());
            }
        }
    }

    Ok(())
}
