/// Ruleway: decision automation core
///
/// Command-line entry point. Runs workflows, analyzes rule sets for conflicts and
/// validates workflow definitions, printing JSON to stdout.

use clap::Parser;
use ruleway::app::{execute, init_tracing, load_config, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config);

    let output = execute(&cli.command, &config).await?;
    println!("{}", serde_json::to_string_pretty(&output.json)?);

    if !output.success {
        std::process::exit(1);
    }
    Ok(())
}
