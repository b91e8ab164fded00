use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cert-tracker")]
#[command(about = "Staff certification import service and admin tools")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (without extension)
    #[arg(short, long, global = true, default_value = "config/default")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP import service
    Serve,

    /// Import staff and certifications from a CSV file
    Import {
        /// CSV file with a header row
        file: PathBuf,

        /// Account to import into
        #[arg(short, long)]
        account: String,

        /// Output format: table or json
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Set the subscription tier of an account
    Plan {
        /// Account id
        #[arg(short, long)]
        account: String,

        /// Tier: starter, growth or professional
        #[arg(short, long)]
        tier: String,
    },

    /// List certifications expiring soon
    Expiring {
        /// Account id
        #[arg(short, long)]
        account: String,

        /// Look-ahead window in days
        #[arg(short, long, default_value = "30")]
        days: u32,
    },

    /// Show record counts for an account
    Stats {
        /// Account id
        #[arg(short, long)]
        account: String,

        /// Output format: table or json
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Initialize database and show configuration
    Init,
}
