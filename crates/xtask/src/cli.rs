use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the host test suite
    Test {
        /// Only run tests whose name contains this string
        filter: Option<String>,
    },
    /// Cross-build the library for the embedded target
    Check {
        #[arg(long)]
        features: Option<String>,

        #[arg(long)]
        release: bool,
    },
    /// Run the tests, then cross-build with and without defmt
    Ci,
}
