//! CLI entry point for bearer-gate.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// bearer-gate CLI
#[derive(Parser, Debug)]
#[command(name = "bearer-gate", version, about = "Token session and authenticated API requests")]
pub struct Cli {
    /// TOML environment file (defaults to BEARER_GATE_* env vars)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the persisted session (default ~/.bearer-gate)
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with username and password
    Login(LoginArgs),
    /// Show the stored session
    Status,
    /// Drop the stored session
    Logout,
    /// Send an authenticated request to the API
    Request(RequestArgs),
}

/// Arguments for `bearer-gate login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    #[arg(short, long)]
    pub username: String,

    /// Password (read from BEARER_GATE_PASSWORD when omitted)
    #[arg(short, long)]
    pub password: Option<String>,
}

/// Arguments for `bearer-gate request`.
#[derive(Parser, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, ...)
    pub method: String,

    /// Path relative to the API base URL
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub json: Option<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
