use anyhow::Result;
use clap::Parser;
use qnactl_core::Config;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod connection;
mod error;
mod output;
mod samples;

use cli::{Cli, Commands};
use connection::{ConnectionManager, PollingOverrides};
use error::QnaCtlError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level
    init_tracing(cli.verbose);

    // Load configuration from specified path or default location
    let loaded = if let Some(config_file) = &cli.config_file {
        let path = std::path::PathBuf::from(config_file);
        debug!("Loading config from explicit path: {:?}", path);
        Config::load_from_path(&path).map(|config| (config, Some(path)))
    } else {
        debug!("Loading config from default location");
        Config::load().map(|config| (config, None))
    };
    let (config, config_path) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            QnaCtlError::from(e).print_diagnostic();
            std::process::exit(1);
        }
    };

    let polling = PollingOverrides {
        retry_interval_secs: cli.retry_interval,
        timeout_secs: cli.wait_timeout,
        max_attempts: cli.max_attempts,
    };
    let conn_mgr = ConnectionManager::new(config, config_path, cli.profile.clone(), polling);

    // Ctrl-C stops any poll loop at its next suspension point
    let cancel = conn_mgr.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            cancel.cancel();
        }
    });

    // Execute command
    if let Err(e) = execute_command(&cli, &conn_mgr).await {
        e.print_diagnostic();
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    // Check for RUST_LOG env var first, then fall back to verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "qnactl=warn,qnactl_core=warn",
            1 => "qnactl=info,qnactl_core=info",
            2 => "qnactl=debug,qnactl_core=debug",
            _ => "qnactl=trace,qnactl_core=trace",
        };
        tracing_subscriber::EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .init();

    debug!("Tracing initialized with verbosity level: {}", verbose);
}

async fn execute_command(cli: &Cli, conn_mgr: &ConnectionManager) -> Result<(), QnaCtlError> {
    info!("Command: {}", format_command(&cli.command));

    let start = std::time::Instant::now();
    let result = match &cli.command {
        Commands::Kb(cmd) => {
            commands::knowledge_base::handle_kb_command(conn_mgr, cmd, cli.output).await
        }
        Commands::Operation(cmd) => {
            commands::operation::handle_operation_command(conn_mgr, cmd, cli.output).await
        }
        Commands::EndpointKeys => {
            commands::knowledge_base::handle_endpoint_keys(conn_mgr, cli.output).await
        }
        Commands::Quickstart { question, keep } => {
            commands::quickstart::handle_quickstart(conn_mgr, question, *keep, cli.output).await
        }
        Commands::Profile(cmd) => {
            commands::profile::handle_profile_command(cmd, conn_mgr, cli.output).await
        }
    };

    let duration = start.elapsed();
    match &result {
        Ok(_) => info!("Command completed successfully in {:?}", duration),
        Err(e) => debug!("Command failed after {:?}: {}", duration, e),
    }

    result
}

/// Command name for logging; arguments are left out since they may carry keys
fn format_command(command: &Commands) -> String {
    use cli::{KbCommands, OperationCommands, ProfileCommands};

    match command {
        Commands::Kb(cmd) => {
            let sub = match cmd {
                KbCommands::Create { .. } => "create",
                KbCommands::Update { .. } => "update",
                KbCommands::List => "list",
                KbCommands::Get { .. } => "get",
                KbCommands::Publish { .. } => "publish",
                KbCommands::Delete { .. } => "delete",
                KbCommands::Query { .. } => "query",
            };
            format!("kb {}", sub)
        }
        Commands::Operation(cmd) => match cmd {
            OperationCommands::Get { handle } => format!("operation get {}", handle),
            OperationCommands::Wait { handle } => format!("operation wait {}", handle),
        },
        Commands::EndpointKeys => "endpoint-keys".to_string(),
        Commands::Quickstart { .. } => "quickstart".to_string(),
        Commands::Profile(cmd) => {
            let sub = match cmd {
                ProfileCommands::List => "list".to_string(),
                ProfileCommands::Path => "path".to_string(),
                ProfileCommands::Show { .. } => "show".to_string(),
                ProfileCommands::Set { name, .. } => format!("set {}", name),
                ProfileCommands::Remove { name } => format!("remove {}", name),
            };
            format!("profile {}", sub)
        }
    }
}
