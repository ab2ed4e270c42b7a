use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bgshell",
    about = "Allow-listed shell execution service with background process supervision",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the tool API on stdio, optionally with the HTTP dashboard.
    Serve {
        /// Port for the embedded HTTP dashboard; disabled when omitted.
        #[arg(long)]
        http_port: Option<u16>,

        /// Override PROCESS_RETENTION_SECONDS (<= 0 disables auto-cleanup).
        #[arg(long)]
        retention_seconds: Option<i64>,
    },
}
