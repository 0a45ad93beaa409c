use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Strata: content-addressed file storage with chunked, seekable files",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./strata.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Blob store directory, overriding the configuration
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Chunk a file into the store and print its ref
    Put(PutArgs),
    /// Write a stored file's bytes to stdout
    Cat(CatArgs),
    /// Print a composition document as JSON
    Show(ShowArgs),
    /// Summarize a stored file and its chunk tree
    Stat(StatArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct PutArgs {
    pub path: PathBuf,
    /// Name recorded in the file document (defaults to the file name)
    #[arg(long)]
    pub name: Option<String>,
    /// Cut fixed-size chunks of this many bytes instead of rolling ones
    #[arg(long)]
    pub fixed: Option<usize>,
}

#[derive(Args)]
pub struct CatArgs {
    pub blob: String,
    #[arg(long, default_value = "0")]
    pub offset: u64,
    #[arg(long)]
    pub length: Option<u64>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub blob: String,
    /// Print the stored bytes exactly, without pretty-printing
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args)]
pub struct StatArgs {
    pub blob: String,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Print the built-in defaults instead of the loaded configuration
    #[arg(long)]
    pub defaults: bool,
}
