use std::path::PathBuf;

use clap::Subcommand;

use crate::connector::DEFAULT_TREE_COUNT;
use crate::domain::{DistanceMetric, ItemId};

#[derive(Subcommand)]
pub enum Commands {
    /// Embed a text corpus and write the store into the data directory
    Build {
        /// Corpus file, or directory of corpus files
        corpus: PathBuf,

        /// Number of trees in the search forest
        #[arg(short, long, default_value_t = DEFAULT_TREE_COUNT)]
        trees: usize,

        /// Distance metric: angular, euclidean, manhattan, hamming or dot
        #[arg(short, long, default_value = "angular")]
        metric: DistanceMetric,

        /// Seed for reproducible trees
        #[arg(long)]
        seed: Option<u64>,

        /// Maximum embedding requests in flight
        #[arg(long, default_value = "4")]
        concurrency: usize,

        /// Passages sent per embedding request
        #[arg(long, default_value = "16")]
        batch_size: usize,

        /// File extensions to read from a corpus directory (default: txt, md)
        #[arg(long = "ext")]
        extensions: Option<Vec<String>>,
    },

    /// Run a one-off nearest-neighbour query without session state
    Query {
        text: String,

        #[arg(long, default_value = "5")]
        num: usize,

        /// Candidates to examine; defaults to num * trees
        #[arg(long)]
        search_effort: Option<usize>,
    },

    /// Interactive retrieval session reading queries from stdin
    Session,

    /// Print stored items as JSON lines
    Items {
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print a single item, including its vector
        #[arg(long, conflicts_with = "limit")]
        id: Option<ItemId>,
    },

    Stats,

    /// Start MCP (Model Context Protocol) server on stdio
    Mcp,
}
