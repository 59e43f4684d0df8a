//! This crate implements a CLI finding the scones of the day of Arizmendi Bakery in San Rafael
//! which contain your favorite ingredients, and adding them to your calendar.
//! It also collects the history of every scone into a single JSON file.
//!
//! The dates are read from <http://www.arizmendi-sanrafael.com/api/open/GetItemsByMonth>.

mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let arguments = cli::Arguments::parse();
    cli::run(arguments).await
}
