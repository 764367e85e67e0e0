mod crawl;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stayscout_core::Source;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stayscout")]
#[command(about = "Multi-source hotel listing crawler")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Crawl listings, detail pages and photo galleries, then reconcile
    /// them into a run document.
    Crawl {
        /// Sources to crawl; repeat the flag or separate with commas.
        #[arg(
            long = "source",
            value_delimiter = ',',
            default_values_t = [Source::Booking, Source::Ctrip]
        )]
        sources: Vec<Source>,

        /// City or region passed to each source's search page.
        #[arg(long)]
        city: String,

        /// Listing pages per source (default: STAYSCOUT_PAGE_LIMIT).
        #[arg(long)]
        pages: Option<u32>,

        /// Retries per navigation after the first attempt.
        #[arg(long)]
        max_retries: Option<u32>,

        /// Seconds between consecutive navigations of one source.
        #[arg(long)]
        delay: Option<f64>,

        /// Write the run document here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the effective site profiles as YAML.
    Profiles {
        #[arg(long = "source", value_delimiter = ',')]
        sources: Vec<Source>,
    },
    /// Re-reconcile the listings of one or more run documents.
    Merge {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = stayscout_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    // stdout carries the JSON document.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Crawl {
            sources,
            city,
            pages,
            max_retries,
            delay,
            output,
        }) => {
            let opts = crawl::CrawlOptions {
                sources,
                city,
                pages,
                max_retries,
                delay,
                output,
            };
            crawl::run_crawl(&config, opts).await?;
        }
        Some(Commands::Profiles { sources }) => {
            crawl::print_profiles(&config, &sources)?;
        }
        Some(Commands::Merge { inputs, output }) => {
            output::run_merge(&inputs, output.as_deref())?;
        }
        None => println!("stayscout: run with --help for available commands"),
    }

    Ok(())
}

#[cfg(test)]
mod tests;
