//! CLI entry point for the fitwarm backend (for dev and testing).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use fitwarm_core::{
    app_data_dir, build_index, default_config_path, load_config, load_config_from, ollama_client,
    set_source_path, status, watch_collection, Config, RepoweringWindow, SearchHit, SearchQuery, WarmIndex,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "fitwarm")]
#[command(about = "fitwarm: warm in-memory search over Feed-in Tariff installations")]
struct Cli {
    /// Config file to use instead of the one in the app data directory.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status (for dev).
    Status,
    /// Show where fitwarm stores its config (app data directory).
    DataDir,
    /// Print the effective configuration.
    Config,
    /// Use a JSONL file or directory of .jsonl files as the collection source.
    SetSource {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Load the index and print record and postcode-area counts.
    Stats,
    /// Load the index and run one search.
    Search {
        query: String,
        #[command(flatten)]
        filters: Filters,
        /// Print hits as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the index whenever the JSONL source changes.
    Watch {
        /// Query to rerun after every rebuild.
        query: Option<String>,
        #[command(flatten)]
        filters: Filters,
    },
}

#[derive(clap::Args, Debug, Default)]
struct Filters {
    /// Postcode area, exact match (repeatable), e.g. M, ML, AB.
    #[arg(long = "area")]
    areas: Vec<String>,
    /// Two-character postcode prefix (repeatable); ignored when --area is given.
    #[arg(long = "prefix")]
    prefixes: Vec<String>,
    /// Technology name or alias, e.g. "solar panels".
    #[arg(long)]
    technology: Option<String>,
    #[arg(long)]
    min_kw: Option<f64>,
    #[arg(long)]
    max_kw: Option<f64>,
    /// Repowering window label (repeatable), e.g. URGENT.
    #[arg(long = "window")]
    windows: Vec<RepoweringWindow>,
    #[arg(long)]
    min_years: Option<f64>,
    #[arg(long)]
    max_years: Option<f64>,
    /// Maximum number of hits (defaults to the configured value).
    #[arg(long)]
    top_k: Option<usize>,
}

impl Filters {
    fn to_query(&self, text: &str, config: &Config) -> SearchQuery {
        let mut q = SearchQuery::new(text).top_k(self.top_k.unwrap_or(config.search.top_k));
        if !self.areas.is_empty() {
            q = q.areas(self.areas.iter().cloned());
        }
        if !self.prefixes.is_empty() {
            q = q.prefixes(self.prefixes.iter().cloned());
        }
        if !self.windows.is_empty() {
            q = q.repowering_window(self.windows.iter().map(|w| w.as_str()));
        }
        q.technology = self.technology.clone();
        q.min_kw = self.min_kw;
        q.max_kw = self.max_kw;
        q.min_years_left = self.min_years;
        q.max_years_left = self.max_years;
        q
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config(),
    };

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            println!("fitwarm backend");
            println!("  core: {}", status());
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => println!("{}", p.display()),
            None => eprintln!("Could not determine app data directory."),
        },
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::SetSource { path } => {
            let config_file = match cli.config {
                Some(p) => p,
                None => default_config_path()?,
            };
            let config = set_source_path(&config_file, &path)?;
            println!(
                "Source set to {} ({})",
                config.source.path.unwrap_or_default(),
                config_file.display()
            );
        }
        Commands::Stats => {
            let index = build_index(&config).await?;
            print_stats(&index);
        }
        Commands::Search { query, filters, json } => {
            let index = build_index(&config).await?;
            let q = filters.to_query(&query, &config);
            let hits = index.search(&q).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                print_hits(&hits);
            }
        }
        Commands::Watch { query, filters } => {
            let path = config
                .source_path()
                .context("watch needs a JSONL source (run `fitwarm set-source <PATH>`)")?;
            watch(path, query, filters, config).await?;
        }
    }
    Ok(())
}

async fn watch(path: PathBuf, query: Option<String>, filters: Filters, config: Config) -> anyhow::Result<()> {
    let embedder = ollama_client(&config)?;
    let page_size = config.source.page_size;
    let handle = tokio::runtime::Handle::current();
    info!(path = %path.display(), "watching collection source");

    tokio::task::spawn_blocking(move || {
        watch_collection(&path, move |res| {
            let collection = match res {
                Ok(c) => c,
                Err(e) => {
                    warn!("could not re-read collection: {}", e);
                    return;
                }
            };
            handle.block_on(async {
                let index = match WarmIndex::load(&collection, embedder.clone(), page_size).await {
                    Ok(index) => index,
                    Err(e) => {
                        warn!("rebuild failed: {}", e);
                        return;
                    }
                };
                print_stats(&index);
                if let Some(text) = &query {
                    match index.search(&filters.to_query(text, &config)).await {
                        Ok(hits) => print_hits(&hits),
                        Err(e) => warn!("search failed: {}", e),
                    }
                }
            });
        })
    })
    .await??;
    Ok(())
}

fn print_stats<E>(index: &WarmIndex<E>) {
    println!(
        "{} record(s), {} dimension(s), {} without a postcode area",
        index.len(),
        index.dimension(),
        index.unlocated()
    );
    for (area, count) in index.area_counts() {
        println!("  {:<3} {}", area, count);
    }
}

fn print_hits(hits: &[SearchHit<'_>]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }
    for hit in hits {
        let m = hit.metadata;
        let capacity = m.capacity_kw().map(|kw| format!("{kw} kW")).unwrap_or_default();
        println!(
            "{:.3}  {}  {}  {}  {}  {}",
            hit.score,
            hit.id,
            m.postcode.as_deref().unwrap_or("-"),
            m.technology.as_deref().unwrap_or("-"),
            capacity,
            m.repowering_window.as_deref().unwrap_or("")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_status() {
        let cli = Cli::try_parse_from(["fitwarm"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn search_flags_map_to_query() {
        let cli = Cli::try_parse_from([
            "fitwarm", "search", "wind turbines", "--area", "M", "--area", "ml", "--technology", "wind",
            "--min-kw", "10", "--window", "urgent", "--top-k", "5",
        ])
        .unwrap();
        let Some(Commands::Search { query, filters, json }) = cli.command else {
            panic!("expected search");
        };
        assert!(!json);
        let q = filters.to_query(&query, &Config::default());
        assert_eq!(q.text, "wind turbines");
        assert_eq!(q.areas, Some(vec!["M".to_string(), "ml".to_string()]));
        assert_eq!(q.prefixes, None);
        assert_eq!(q.technology.as_deref(), Some("wind"));
        assert_eq!(q.min_kw, Some(10.0));
        assert_eq!(q.repowering_window, Some(vec!["URGENT".to_string()]));
        assert_eq!(q.top_k, 5);
    }

    #[test]
    fn unknown_window_is_rejected() {
        let res = Cli::try_parse_from(["fitwarm", "search", "wind", "--window", "someday"]);
        assert!(res.is_err());
    }

    #[test]
    fn top_k_falls_back_to_config() {
        let mut config = Config::default();
        config.search.top_k = 42;
        let q = Filters::default().to_query("x", &config);
        assert_eq!(q.top_k, 42);
        assert_eq!(q.areas, None);
    }

    #[test]
    fn global_config_flag() {
        let cli = Cli::try_parse_from(["fitwarm", "stats", "--config", "/tmp/fit.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/fit.toml")));
        assert!(matches!(cli.command, Some(Commands::Stats)));
    }
}
