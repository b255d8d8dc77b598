use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::random::RandomSourceKind;

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate all managed secrets and write them into the env file (default)
    Generate(GenerateArgs),
    /// Print a single signed token
    Token(TokenArgs),
    /// Show version information
    Version,
}

#[derive(Args, Debug, Default)]
pub struct GenerateArgs {
    /// Env file to patch (default: docker/.env)
    #[arg(short, long)]
    pub env_file: Option<PathBuf>,
    /// Where random bytes come from
    #[arg(long, value_enum)]
    pub random_source: Option<RandomSourceKind>,
    /// Generate and report, but leave the env file untouched
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct TokenArgs {
    /// Role claim of the token
    #[arg(short, long)]
    pub role: String,
    /// Signing secret (default: read from the env file)
    #[arg(short, long)]
    pub secret: Option<String>,
    /// Token lifetime in seconds (default: from configuration)
    #[arg(short, long)]
    pub lifetime: Option<i64>,
    /// Env file to read the signing secret from (default: docker/.env)
    #[arg(short, long)]
    pub env_file: Option<PathBuf>,
}
