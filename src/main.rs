use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use faqsearch::connector::api::{Container, ContainerConfig, Router};
use faqsearch::{Commands, RetrievalConfig};

#[derive(Parser)]
#[command(name = "faqsearch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding the store and passage corpus
    #[arg(short, long, global = true, default_value = "./data")]
    data_dir: String,

    #[arg(long, global = true)]
    mock_embeddings: bool,

    /// Embedding dimensions (defaults to EMBEDDING_DIMENSIONS, or 384 with mock embeddings)
    #[arg(long, global = true)]
    dimensions: Option<usize>,

    /// Neighbours fetched per session lookup
    #[arg(long, global = true, default_value = "5")]
    over_fetch: usize,

    /// New passages returned per session lookup
    #[arg(long, global = true, default_value = "2")]
    return_count: usize,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    // stdout carries command output and the MCP transport
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let container = Container::new(ContainerConfig {
        data_dir: PathBuf::from(expand_tilde(&cli.data_dir)),
        mock_embeddings: cli.mock_embeddings,
        dimensions: cli.dimensions,
        retrieval: RetrievalConfig {
            over_fetch_count: cli.over_fetch,
            return_count: cli.return_count,
            search_effort: None,
        },
    })?;

    let output = Router::new(&container).route(cli.command).await?;
    if !output.is_empty() {
        println!("{}", output);
    }

    Ok(())
}

fn expand_tilde(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            if path == "~" {
                return home.to_string_lossy().to_string();
            }
            return path.replacen("~", &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use faqsearch::DistanceMetric;

    #[test]
    fn build_parses_metric_and_trees() {
        let cli = Cli::try_parse_from([
            "faqsearch", "build", "corpus/", "--metric", "euclidean", "--trees", "20",
        ])
        .unwrap();
        match cli.command {
            Commands::Build { metric, trees, .. } => {
                assert_eq!(metric, DistanceMetric::Euclidean);
                assert_eq!(trees, 20);
            }
            _ => panic!("expected build command"),
        }
    }

    #[test]
    fn items_accepts_single_id() {
        let cli = Cli::try_parse_from(["faqsearch", "items", "--id", "3"]).unwrap();
        match cli.command {
            Commands::Items { id, limit } => {
                assert_eq!(id, Some(3));
                assert_eq!(limit, None);
            }
            _ => panic!("expected items command"),
        }
    }

    #[test]
    fn unknown_metric_is_rejected() {
        let res = Cli::try_parse_from(["faqsearch", "build", "corpus/", "--metric", "jaccard"]);
        assert!(res.is_err());
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "faqsearch", "session", "--over-fetch", "8", "--return-count", "3", "--mock-embeddings",
        ])
        .unwrap();
        assert_eq!(cli.over_fetch, 8);
        assert_eq!(cli.return_count, 3);
        assert!(cli.mock_embeddings);
        assert_eq!(cli.data_dir, "./data");
    }

    #[test]
    fn expand_tilde_leaves_relative_paths() {
        assert_eq!(expand_tilde("./data"), "./data");
    }
}
