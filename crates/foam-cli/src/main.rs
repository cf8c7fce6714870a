use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use foam_analytics::{build_page_view, page_facet_panels, RawSelections};
use foam_core::{Datasets, Page};
use foam_data::{load_datasets, load_facet_order, DataConfig};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "foam-cli")]
#[command(about = "FOAM dashboard command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the dashboard pages as JSON over HTTP.
    Serve,
    /// Print one page view (KPIs, charts, records) as JSON.
    Page {
        page: Page,
        /// Facet selection as `key=value`; repeat for several values.
        #[arg(short, long = "filter")]
        filters: Vec<String>,
        #[arg(long)]
        pretty: bool,
    },
    /// Print the facet options of a page as JSON.
    Facets {
        page: Page,
        #[arg(short, long = "filter")]
        filters: Vec<String>,
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foam_data=info,foam_web=info,foam_analytics=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => foam_web::serve_from_env().await?,
        Commands::Page {
            page,
            filters,
            pretty,
        } => {
            let selections = parse_filters(&filters)?;
            if let Some(datasets) = load_or_warn(&DataConfig::from_env())? {
                let view = build_page_view(page, &datasets, &selections)?;
                print_json(&view, pretty)?;
            }
        }
        Commands::Facets {
            page,
            filters,
            pretty,
        } => {
            let config = DataConfig::from_env();
            let selections = parse_filters(&filters)?;
            let order = load_facet_order(&config)?;
            if let Some(datasets) = load_or_warn(&config)? {
                let panels = page_facet_panels(page, &datasets, &order, &selections)?;
                print_json(&panels, pretty)?;
            }
        }
    }

    Ok(())
}

fn load_or_warn(config: &DataConfig) -> Result<Option<Datasets>> {
    match load_datasets(config) {
        Ok(datasets) => Ok(Some(datasets)),
        Err(err) if err.is_missing_input() => {
            eprintln!("warning: {err}");
            Ok(None)
        }
        Err(err) => Err(err).context("loading datasets"),
    }
}

fn parse_filters(filters: &[String]) -> Result<RawSelections> {
    let mut raw = RawSelections::new();
    for filter in filters {
        let Some((key, value)) = filter.split_once('=') else {
            bail!("filter `{filter}` must look like key=value");
        };
        raw.entry(key.trim().to_string())
            .or_default()
            .insert(value.trim().to_string());
    }
    Ok(raw)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}
