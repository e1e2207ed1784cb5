use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

const VERSION_LONG: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (features: ",
    env!("FINRAG_FEATURES"),
    ")"
);

#[derive(Parser, Debug)]
#[command(
    name = "finrag",
    version,
    long_version = VERSION_LONG,
    about = "Financial report metric extraction and retrieval"
)]
pub struct Cli {
    /// TOML config file; defaults to $FINRAG_CONFIG or finrag.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the reconstructed text of every page of one document.
    Pages { input: PathBuf },
    /// Build the knowledge base and write it as JSON.
    Build {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Rebuild the knowledge base and replace the indexed collection.
    Load {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Answer a prompt using retrieved metrics as context.
    Report {
        #[arg(long)]
        prompt: String,
        /// Retrieval text; the configured default query when omitted.
        #[arg(long)]
        query: Option<String>,
    },
}
