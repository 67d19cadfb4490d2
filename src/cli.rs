//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Personal automation hub - tool gateway with an OAuth credential broker
#[derive(Parser, Debug)]
#[command(name = "toolhub")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "TOOLHUB_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "TOOLHUB_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "TOOLHUB_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to serving both roles)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the credential broker and the protocol gateway together,
    /// with the gateway bound to the broker in-process (default)
    Serve,

    /// Run only the credential broker
    Broker,

    /// Run only the protocol gateway
    Gateway,
}
