//! # locman entry point
//!
//! Command line inspector for per-culture resource directories. It
//! initializes tracing, parses the arguments and runs the requested command.

use clap::Parser;
use locman::cli::Cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing/logging
    tracing_subscriber::fmt::init();

    let args = Cli::parse();
    args.run().await?;

    Ok(())
}
