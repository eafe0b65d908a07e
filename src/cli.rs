//! Command line interface for the `truthframe` binary.
//!
//! `publish` turns a JSON or YAML document into framed lines or links;
//! `ingest` reads scanned frames back and reassembles the document.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Command line arguments for the `truthframe` binary.
#[derive(Debug, Parser)]
#[command(
    name = "truthframe",
    version,
    about = "Split documents into QR/link frames and reassemble them"
)]
pub struct Cli {
    /// TOML configuration file; `TRUTH_*` environment variables override it.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Publish a document as framed lines or links.
    Publish(PublishArgs),
    /// Reassemble a document from scanned frames, one per line.
    Ingest(IngestArgs),
}

/// Arguments of `truthframe publish`.
#[derive(Debug, Args)]
pub struct PublishArgs {
    /// JSON or YAML document to publish.
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,
    /// Document code carried by every frame.
    #[arg(long)]
    pub code: String,
    /// Chunking strategy.
    #[arg(long, value_parser = ["count", "size"])]
    pub by: Option<String>,
    /// Number of fragments when chunking by count.
    #[arg(long)]
    pub count: Option<usize>,
    /// Maximum fragment length when chunking by size.
    #[arg(long)]
    pub size: Option<usize>,
    /// Serializer alias.
    #[arg(long)]
    pub serializer: Option<String>,
    /// Transport codec alias.
    #[arg(long)]
    pub transport: Option<String>,
    /// Envelope alias.
    #[arg(long)]
    pub envelope: Option<String>,
    /// Envelope prefix for this run.
    #[arg(long)]
    pub prefix: Option<String>,
    /// Envelope version for this run.
    #[arg(long = "version", value_name = "VERSION")]
    pub envelope_version: Option<String>,
}

/// Arguments of `truthframe ingest`.
#[derive(Debug, Args)]
pub struct IngestArgs {
    /// File holding one scanned frame per line.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    /// Only accept frames for this code.
    #[arg(long)]
    pub code: Option<String>,
    /// Print the payload as JSON once complete.
    #[arg(long)]
    pub print: bool,
    /// Write the serialized document here once complete.
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}
