use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use linkify::config::{Config, LinksConfig};
use linkify::country::CountryAliases;
use linkify::links::{LinkAliases, LinkIndex, LinkLoader};
use linkify::resolver::{Resolver, ResolverOptions};
use linkify::server::handlers::parse_sources;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "linkify-check")]
#[command(about = "Inspect link files and test resolution offline", long_about = None)]
struct Cli {
    /// Settings file (TOML, JSON or YAML)
    #[arg(long, env = "LINKIFY_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the links directory and report what was loaded
    Load,
    /// List every link key with its countries
    List,
    /// Resolve a link id or search terms for a country
    Resolve {
        /// Link id, or search terms with --search
        id: String,
        /// Two letter country code
        #[arg(long)]
        country: Option<String>,
        /// Comma separated list of sources
        #[arg(long)]
        sources: Option<String>,
        /// Treat the id as search terms
        #[arg(long)]
        search: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.settings.as_deref()).context("failed to load settings")?;

    // No watchers for a one-shot run
    let links_config = LinksConfig {
        auto_reload: false,
        ..config.links.clone()
    };
    let index = Arc::new(LinkIndex::new());
    let link_aliases = Arc::new(LinkAliases::new(
        &links_config.aliases,
        links_config.auto_plural,
    ));
    let loader = LinkLoader::new(Arc::clone(&index), Arc::clone(&link_aliases), links_config);
    let report = loader.load(false).await;

    match cli.command {
        Commands::Load => {
            println!(
                "✓ Loaded {} links from {} file(s)",
                report.links, report.files
            );
            for path in &report.failed {
                println!("⚠ Failed to load {}", path.display());
            }
            if !report.failed.is_empty() {
                bail!("{} link file(s) failed to load", report.failed.len());
            }
        }
        Commands::List => {
            let links = index.snapshot();
            if links.is_empty() {
                println!("No links loaded.");
            } else {
                println!("{:<40} {:<15} {}", "Key", "Source", "Countries");
                println!("{}", "-".repeat(80));
                for (key, link) in links {
                    let countries = link.urls.keys().cloned().collect::<Vec<_>>().join(", ");
                    println!("{:<40} {:<15} {}", key, link.source, countries);
                }
            }
        }
        Commands::Resolve {
            id,
            country,
            sources,
            search,
        } => {
            let resolver = Resolver::new(
                Arc::clone(&index),
                link_aliases,
                Arc::new(CountryAliases::new(&config.country.aliases)),
                ResolverOptions::from_config(&config),
            );
            let country = country.unwrap_or_else(|| config.country.default.clone());
            let sources = sources.as_deref().map(parse_sources);

            match resolver.url_for(&id, &country, sources.as_deref(), search) {
                Ok(target) => println!("✓ {} ({})", target.url, target.source),
                Err(e) => bail!("{e}"),
            }
        }
    }

    Ok(())
}
