//! Command line arguments

use std::path::PathBuf;

use bae_jwt::SignAlgorithm;
use clap::{Args, Parser, Subcommand};

/// bae-authctl - inspect and exercise the authentication bridge configuration
#[derive(Parser, Debug)]
#[command(
    name = "bae-authctl",
    version,
    about = "Check identity provider configuration, sign SIOP tokens and inspect discovery documents",
    author
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Bridge configuration file (.toml, .yaml, .json)
    #[arg(short, long, global = true, env = "BAE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v, -vv, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load the configuration, the SIOP key and every provider, then report status
    Check,

    /// Sign a JWT with the configured SIOP key
    Sign(SignArgs),

    /// Fetch and validate a discovery document
    Discover {
        /// Issuer URL or full `.well-known` URL
        uri: String,
    },

    /// Build an authorization redirect for a configured provider
    Authorize {
        /// Provider name from the configuration
        provider: String,
    },
}

/// Arguments for `sign`
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Claims as a JSON object
    #[arg(long)]
    pub claims: String,

    /// Token lifetime, e.g. 300, 30m, 1h, 7d
    #[arg(long)]
    pub expires_in: Option<String>,

    /// Algorithm; defaults to the configured `sign_algorithm`
    #[arg(long)]
    pub algorithm: Option<SignAlgorithm>,

    /// Key id for the `kid` header
    #[arg(long)]
    pub key_id: Option<String>,
}

impl Cli {
    /// Log level implied by `-v`/`-q`, if either was given
    pub fn log_level(&self) -> Option<&'static str> {
        if self.quiet {
            return Some("error");
        }
        match self.verbose {
            0 => None,
            1 => Some("info"),
            2 => Some("debug"),
            _ => Some("trace"),
        }
    }
}
