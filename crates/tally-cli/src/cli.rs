use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tally_core::models::MutationKind;
use tally_core::Collection;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Offline-first personal ledger synced with Firestore")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name holding backend settings
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Treat the network as unreachable (serve cache, queue writes)
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure backend profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Sign up, sign in and manage the stored session
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Load the signed-in user's ledger, from the cloud when reachable
    Load {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Queue a write and replay the queue if online
    Enqueue {
        /// Mutation type: set, update or delete
        kind: MutationKind,
        /// Target collection (accounts, journalHeaders, journalLines)
        #[arg(long, value_name = "NAME")]
        collection: Collection,
        /// Target document id
        #[arg(long, value_name = "ID")]
        id: String,
        /// JSON object payload for set and update
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
    },
    /// List pending writes
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay pending writes against the cloud
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Firebase web API key
        #[arg(long, value_name = "KEY")]
        api_key: Option<String>,
        /// Firebase project id
        #[arg(long, value_name = "ID")]
        project_id: Option<String>,
        /// Firestore database id (defaults to "(default)")
        #[arg(long, value_name = "ID")]
        database_id: Option<String>,
        /// Firestore REST base URL override
        #[arg(long, value_name = "URL")]
        firestore_url: Option<String>,
        /// Identity Toolkit base URL override
        #[arg(long, value_name = "URL")]
        identity_toolkit_url: Option<String>,
        /// Secure token base URL override
        #[arg(long, value_name = "URL")]
        secure_token_url: Option<String>,
        /// Per-request timeout in seconds
        #[arg(long, value_name = "SECS")]
        request_timeout_secs: Option<u64>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show the resolved settings for a profile
    Show {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Create an account and sign in
    Signup {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Sign in with email and password
    Login {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Email a password reset link
    ResetPassword {
        #[arg(long, value_name = "EMAIL")]
        email: String,
    },
    /// Show auth status for profile
    Status,
    /// Clear the stored session
    Logout,
}
