mod build;
mod cli;
mod constants;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Test { filter } => {
            host_test::run_host_tests(filter.as_deref())?;
        }
        Commands::Check { features, release } => {
            println!("Building for {}...", constants::TARGET);
            build::check_embedded(features.as_deref(), *release)?;
            println!("Build complete!");
        }
        Commands::Ci => {
            host_test::run_host_tests(None)?;
            build::check_embedded(None, false)?;
            build::check_embedded(Some("defmt"), false)?;
            println!("All checks passed!");
        }
    }

    Ok(())
}
