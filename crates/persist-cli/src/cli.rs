use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "persist",
    about = "Inspect persistent-object store records without loading classes",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Encode or decode an object identifier
    #[command(subcommand)]
    Oid(OidAction),
    /// Show the class, attributes and references of a record file
    Inspect(InspectArgs),
    /// Show the conflict report for a committed and a new record
    Conflict(ConflictArgs),
}

#[derive(Subcommand)]
pub enum OidAction {
    /// Print the 8-byte big-endian form of an integer
    Encode { value: u64 },
    /// Print the integer held in 8 hex-encoded bytes
    Decode { hex: String },
}

#[derive(Args)]
pub struct InspectArgs {
    pub record: PathBuf,
}

#[derive(Args)]
pub struct ConflictArgs {
    /// OID of the conflicting object (hex, optional 0x prefix)
    #[arg(long)]
    pub oid: String,
    pub committed: PathBuf,
    pub new: PathBuf,
}
