use clap::{Parser, Subcommand};

/// roadmap — feature-voting roadmap backend
#[derive(Parser)]
#[command(name = "roadmap", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Port to bind (overrides ROADMAP_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the authorization URL for a fresh consent flow
    AuthUrl,
}
