use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Resolve and fetch artifacts across federated repositories",
    arg_required_else_help = true
)]
pub struct Args {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print logs as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Use cached repository metadata only
    #[arg(long, global = true)]
    pub offline: bool,

    /// HTTP proxy URL
    #[arg(long, global = true)]
    pub proxy: Option<String>,

    /// User agent for HTTP requests
    #[arg(long, global = true)]
    pub user_agent: Option<String>,

    /// Extra HTTP header, as `name: value`
    #[arg(short = 'H', long, global = true)]
    pub header: Option<Vec<String>>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    Local,
    Remote,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List artifacts matching a query
    #[clap(name = "query", visible_alias = "q")]
    Query {
        /// Query as `[classifier/]id[@version-requirement]`; `*` lists everything
        #[arg(required = false, default_value = "*")]
        query: String,

        /// Only consult these repositories
        #[arg(short, long)]
        repo: Option<Vec<String>>,
    },

    /// Show every available encoding of an artifact
    #[clap(name = "descriptors", visible_alias = "desc")]
    Descriptors {
        /// Artifact as `classifier/id/version`
        #[arg(required = true)]
        artifact: String,
    },

    /// Fetch an artifact
    #[clap(name = "fetch", visible_alias = "get")]
    Fetch {
        /// Artifact as `classifier/id/version`
        #[arg(required = true)]
        artifact: String,

        /// Output file; `-` writes to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Store this exact encoding without decoding it, e.g. `zstd`
        #[arg(long)]
        raw: Option<String>,

        /// Fetch this encoding and decode it, instead of letting the policy choose
        #[arg(long, conflicts_with = "raw")]
        format: Option<String>,

        /// Override the transfer policy for this fetch
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },

    /// Show the effective location of repositories after mirror resolution
    #[clap(name = "translate")]
    Translate {
        /// Repository names; all enabled repositories if omitted
        repositories: Vec<String>,
    },

    /// Load repository metadata into the cache
    #[clap(name = "load", visible_alias = "sync")]
    Load {
        /// Repository names; all enabled repositories if omitted
        repositories: Vec<String>,
    },

    /// Generate a default configuration file
    #[clap(name = "defconfig")]
    DefConfig,

    /// Print the configuration file
    #[clap(name = "config")]
    Config,
}
