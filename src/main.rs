use clap::Parser;
use tracing_subscriber::EnvFilter;

use rt_scaffold::cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Logs go to stderr; stdout carries the report when no output file is given
    let filter = if cli.verbose {
        EnvFilter::new("rt_scaffold=debug,info")
    } else {
        EnvFilter::new("rt_scaffold=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        cli::Commands::Run(args) => {
            cli::run::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::ShowConfig(args) => {
            cli::show_config(&args)?;
        }
    }

    Ok(())
}
