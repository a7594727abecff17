//! CLI structure and command definitions
//!
//! Defines the command-line interface using clap:
//! 1. Knowledge base management (`kb`, `operation`, `endpoint-keys`)
//! 2. The end-to-end `quickstart` walkthrough
//! 3. Profile management (`profile`)

use clap::{Parser, Subcommand};

pub mod kb;

pub use kb::*;

/// Knowledge base management CLI
#[derive(Parser, Debug)]
#[command(name = "qnactl")]
#[command(version, about = "QnA Maker knowledge base management CLI")]
#[command(long_about = "
QnA Maker knowledge base management CLI

Create, update, publish, query and delete knowledge bases. Long-running
requests are followed until the service reports a final state, honoring the
service's Retry-After hint.

EXAMPLES:
    # Set up a profile
    qnactl profile set default --endpoint https://westus.api.cognitive.microsoft.com \\
        --subscription-key KEY --runtime-endpoint https://my-qna.azurewebsites.net

    # Or use environment variables
    export QNA_MAKER_ENDPOINT=https://westus.api.cognitive.microsoft.com
    export QNA_MAKER_SUBSCRIPTION_KEY=KEY

    # Create a knowledge base and wait for it
    qnactl kb create --file kb.json

    # Get JSON output for scripting
    qnactl kb list -o json

    # Run the full create/update/publish/query/delete walkthrough
    qnactl quickstart

For more help on a specific command, run:
    qnactl <command> --help
")]
pub struct Cli {
    /// Profile to use for this command
    #[arg(long, short, global = true, env = "QNACTL_PROFILE")]
    pub profile: Option<String>,

    /// Path to alternate configuration file
    #[arg(long, global = true, env = "QNACTL_CONFIG_FILE")]
    pub config_file: Option<String>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "auto")]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Seconds to wait between status checks when the service sends no Retry-After
    #[arg(long, global = true, value_name = "SECS")]
    pub retry_interval: Option<u64>,

    /// Give up waiting for an operation after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub wait_timeout: Option<u64>,

    /// Give up waiting for an operation after this many status checks
    #[arg(long, global = true, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Automatically choose format based on command and context
    Auto,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
    /// Human-readable table format
    Table,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Knowledge base operations
    #[command(subcommand, visible_alias = "knowledge-base")]
    #[command(after_help = "EXAMPLES:
    # Create from a JSON definition (CreateKbDTO) and wait
    qnactl kb create --file kb.json

    # Submit an update without waiting
    qnactl kb update <kb-id> --file changes.json --no-wait

    # Publish and query
    qnactl kb publish <kb-id>
    qnactl kb query <kb-id> \"Is the QnA Maker service free?\" --top 3
")]
    Kb(KbCommands),

    /// Long-running operation status
    #[command(subcommand, visible_alias = "op")]
    #[command(after_help = "EXAMPLES:
    # Check an operation once
    qnactl operation get 9d2d7d47-4d7a-4a5b-8f7e-3a9f1a1c2b3d

    # Wait for an operation, giving up after 10 minutes
    qnactl operation wait /operations/9d2d7d47-4d7a-4a5b-8f7e-3a9f1a1c2b3d --wait-timeout 600
")]
    Operation(OperationCommands),

    /// Show the runtime endpoint keys of the resource
    #[command(name = "endpoint-keys", visible_alias = "keys")]
    EndpointKeys,

    /// Create, list, update, publish, query and delete a sample knowledge base
    #[command(after_help = "Requires QNA_MAKER_ENDPOINT, QNA_MAKER_SUBSCRIPTION_KEY and
QNA_MAKER_RUNTIME_ENDPOINT (or a profile providing them). The runtime
endpoint key is fetched from the resource when none is configured.")]
    Quickstart {
        /// Question to ask the published knowledge base
        #[arg(long, default_value = "Is the QnA Maker service free?")]
        question: String,

        /// Keep the knowledge base instead of deleting it at the end
        #[arg(long)]
        keep: bool,
    },

    /// Profile management
    #[command(subcommand, visible_alias = "prof")]
    #[command(after_help = "EXAMPLES:
    # Create a profile
    qnactl profile set default --endpoint https://westus.api.cognitive.microsoft.com --subscription-key KEY

    # Reference an environment variable instead of storing the key
    qnactl profile set ci --endpoint https://westus.api.cognitive.microsoft.com --subscription-key '${QNA_KEY}'

    # List all profiles
    qnactl profile list

    # Show profile details
    qnactl profile show default
")]
    Profile(ProfileCommands),
}

/// Profile management commands
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List all configured profiles
    #[command(visible_alias = "ls")]
    List,

    /// Show the path to the configuration file
    Path,

    /// Show details of a profile (keys are masked)
    Show {
        /// Profile name (defaults to the active profile)
        name: Option<String>,
    },

    /// Create or update a profile
    #[command(visible_alias = "add")]
    Set {
        /// Profile name
        name: String,

        /// Authoring endpoint, e.g. https://westus.api.cognitive.microsoft.com
        #[arg(long)]
        endpoint: Option<String>,

        /// Authoring subscription key (plaintext, ${VAR} or keyring:<name>)
        #[arg(long)]
        subscription_key: Option<String>,

        /// Runtime endpoint, e.g. https://my-qna.azurewebsites.net
        #[arg(long)]
        runtime_endpoint: Option<String>,

        /// Runtime endpoint key
        #[arg(long)]
        endpoint_key: Option<String>,

        /// Knowledge base used when a command is given no id
        #[arg(long)]
        knowledge_base_id: Option<String>,

        /// Default wait between status checks, in seconds
        #[arg(long, value_name = "SECS")]
        poll_interval: Option<u64>,

        /// Give up waiting for operations after this many seconds
        #[arg(long, value_name = "SECS")]
        poll_timeout: Option<u64>,

        /// Give up waiting for operations after this many status checks
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
        poll_max_attempts: Option<u32>,

        /// Make this the default profile
        #[arg(long)]
        default: bool,

        /// Store keys in OS keyring instead of config file
        #[cfg(feature = "secure-storage")]
        #[arg(long)]
        use_keyring: bool,
    },

    /// Remove a profile
    #[command(visible_alias = "rm", visible_alias = "delete")]
    Remove {
        /// Profile name to remove
        name: String,
    },
}
