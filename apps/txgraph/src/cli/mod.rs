//! # txgraph CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show store counters
//! - `seed` - Load the sample dataset or a synthetic one
//! - `user` / `transaction` - Upsert one node
//! - `show` - Print one node
//! - `path` - Shortest path between two ids
//! - `neighbors` - Every edge touching a node
//! - `export` / `import` - Snapshot files
//! - `reset` - Drop everything
//! - `init` - Initialize a new database

mod commands;
pub mod seed;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use txgraph_core::GraphError;

use crate::config::{AppConfig, Backend};

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// txgraph - user and transaction graph for fraud analysis
///
/// Links users that share contact or payment details and transactions
/// that share a device or IP address, then answers path queries.
#[derive(Parser, Debug)]
#[command(name = "txgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the database or snapshot file
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: memory, file (snapshot) or redb
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<Backend>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show store counters
    Status,

    /// Load sample data. Without counts, loads the fixed scenario dataset.
    Seed {
        /// Number of synthetic users
        #[arg(long)]
        users: Option<usize>,

        /// Number of synthetic transactions
        #[arg(long)]
        transactions: Option<usize>,
    },

    /// Insert or update a user
    User {
        /// User id
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        payment_method: Option<String>,
    },

    /// Insert or update a transaction
    Transaction {
        /// Transaction id
        id: String,

        /// Sending user id
        #[arg(long)]
        sender: String,

        /// Receiving user id
        #[arg(long)]
        receiver: String,

        /// Decimal amount, at most two fractional digits
        #[arg(long)]
        amount: Option<String>,

        #[arg(long)]
        device: Option<String>,

        #[arg(long)]
        ip: Option<String>,
    },

    /// Print one node by id
    Show {
        id: String,
    },

    /// Shortest path between two ids
    Path {
        from: String,
        to: String,

        /// Give up after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Every edge touching a node
    Neighbors {
        id: String,
    },

    /// Export the store to a file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format (binary, json)
        #[arg(short = 't', long, default_value = "binary")]
        format: String,
    },

    /// Replace the store with a snapshot file
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Drop every node and edge
    Reset,

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Config file and environment, then global flags.
    pub fn resolve_config(&self) -> Result<AppConfig, GraphError> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        if let Some(backend) = self.backend {
            config.storage.backend = backend;
        }
        if let Some(path) = &self.database {
            config.storage.path = path.clone();
        }
        Ok(config)
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), GraphError> {
    let mut config = cli.resolve_config()?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
        Some(Commands::Status) => cmd_status(&config, json_mode),
        Some(Commands::Seed {
            users,
            transactions,
        }) => cmd_seed(&config, json_mode, users, transactions),
        Some(Commands::User {
            id,
            name,
            email,
            phone,
            address,
            payment_method,
        }) => {
            let patch = txgraph_core::UserPatch {
                user_id: id,
                name,
                email,
                phone,
                address,
                payment_method,
            };
            cmd_user(&config, json_mode, patch)
        }
        Some(Commands::Transaction {
            id,
            sender,
            receiver,
            amount,
            device,
            ip,
        }) => {
            let amount = amount
                .as_deref()
                .map(txgraph_core::Amount::parse)
                .transpose()?;
            let patch = txgraph_core::TransactionPatch {
                txn_id: id,
                sender_id: sender,
                receiver_id: receiver,
                amount,
                device_id: device,
                ip_address: ip,
            };
            cmd_transaction(&config, json_mode, patch)
        }
        Some(Commands::Show { id }) => cmd_show(&config, json_mode, &id),
        Some(Commands::Path {
            from,
            to,
            timeout_ms,
        }) => cmd_path(&config, json_mode, &from, &to, timeout_ms),
        Some(Commands::Neighbors { id }) => cmd_neighbors(&config, json_mode, &id),
        Some(Commands::Export { output, format }) => cmd_export(&config, &output, &format),
        Some(Commands::Import { input }) => cmd_import(&config, &input),
        Some(Commands::Reset) => cmd_reset(&config),
        Some(Commands::Init { force }) => cmd_init(&config, force),
        None => cmd_status(&config, json_mode),
    }
}
