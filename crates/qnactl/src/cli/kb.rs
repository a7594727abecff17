//! Knowledge base and operation command definitions

use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Arguments shared by commands that start a long-running operation
#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// JSON request body; the built-in sample is used when omitted
    #[arg(long, short)]
    pub file: Option<PathBuf>,

    /// Print the operation handle instead of waiting for completion
    #[arg(long)]
    pub no_wait: bool,
}

#[derive(Subcommand, Debug)]
pub enum KbCommands {
    /// Create a knowledge base
    Create {
        #[command(flatten)]
        submit: SubmitArgs,
    },

    /// Add, update and delete entries of a knowledge base
    Update {
        /// Knowledge base id (defaults to the profile's knowledge_base_id)
        id: Option<String>,

        #[command(flatten)]
        submit: SubmitArgs,
    },

    /// List knowledge bases of the resource
    #[command(visible_alias = "ls")]
    List,

    /// Show details of a knowledge base
    Get {
        /// Knowledge base id (defaults to the profile's knowledge_base_id)
        id: Option<String>,
    },

    /// Publish the test index of a knowledge base
    Publish {
        /// Knowledge base id (defaults to the profile's knowledge_base_id)
        id: Option<String>,
    },

    /// Delete a knowledge base
    #[command(visible_alias = "rm")]
    Delete {
        /// Knowledge base id (defaults to the profile's knowledge_base_id)
        id: Option<String>,
    },

    /// Ask a published knowledge base a question
    #[command(visible_alias = "ask")]
    Query {
        /// Knowledge base id
        id: String,

        /// Question text
        question: String,

        /// Number of answers to return
        #[arg(long, default_value_t = 3)]
        top: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum OperationCommands {
    /// Check the status of an operation once
    Get {
        /// Operation id or location (e.g. /operations/<id>)
        handle: String,
    },

    /// Wait for an operation to reach a final state
    Wait {
        /// Operation id or location (e.g. /operations/<id>)
        handle: String,
    },
}
