//! Operation status commands and the shared wait-with-spinner helper
//!
//! Wraps [`OperationPoller`] with a progress spinner and CLI-specific
//! formatting of the final operation.

use indicatif::{ProgressBar, ProgressStyle};
use qnactl_core::config::Settings;
use qnactl_core::{
    Operation, OperationHandle, OperationOutcome, OperationPoller, OperationState,
    ProgressCallback, ProgressEvent, QnaMakerClient,
};
use tracing::debug;

use crate::cli::{OperationCommands, OutputFormat};
use crate::connection::ConnectionManager;
use crate::error::{QnaCtlError, Result as CliResult};
use crate::output::{self, print_output};

/// Handle operation commands
pub async fn handle_operation_command(
    conn_mgr: &ConnectionManager,
    cmd: &OperationCommands,
    output_format: OutputFormat,
) -> CliResult<()> {
    let settings = conn_mgr.settings()?;
    let client = conn_mgr.create_client(&settings)?;

    match cmd {
        OperationCommands::Get { handle } => {
            let handle = parse_handle(handle);
            let result = client.get_operation(&handle).await?;

            match output::OutputFormat::structured(output_format) {
                Some(fmt) => print_output(&result.operation, fmt)?,
                None => {
                    print_operation_details(&handle, &result.operation);
                    if !result.state().is_terminal() {
                        println!(
                            "Next check suggested in {}s. To wait for completion, run: qnactl operation wait {}",
                            result.wait_interval.as_secs(),
                            handle
                        );
                    }
                }
            }
            Ok(())
        }
        OperationCommands::Wait { handle } => {
            let handle = parse_handle(handle);
            let outcome = wait_for_operation(conn_mgr, &settings, &client, &handle).await?;
            print_outcome(&handle, &outcome, output_format)?;
            outcome.into_result()?;
            Ok(())
        }
    }
}

/// Accept either a bare operation id or a full location
pub fn parse_handle(raw: &str) -> OperationHandle {
    let raw = raw.trim();
    if raw.contains('/') {
        OperationHandle::new(raw)
    } else {
        OperationHandle::from_operation_id(raw)
    }
}

/// Spinner plus a progress callback that drives it
pub fn progress_spinner(message: String) -> (ProgressBar, ProgressCallback) {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed_precise}]")
    {
        pb.set_style(style);
    }
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb.set_message(message);

    let pb_clone = pb.clone();
    let callback: ProgressCallback = Box::new(move |event: ProgressEvent| match &event {
        ProgressEvent::Started { operation_id } => {
            pb_clone.set_message(format!("Operation {} started", operation_id));
        }
        ProgressEvent::Polling {
            operation_id,
            state,
            ..
        } => {
            pb_clone.set_message(format!(
                "Operation {}: {}",
                operation_id,
                format_operation_state(state)
            ));
        }
        ProgressEvent::Waiting {
            operation_id,
            delay,
        } => {
            pb_clone.set_message(format!(
                "Operation {}: next check in {}s",
                operation_id,
                delay.as_secs()
            ));
        }
        ProgressEvent::Completed {
            operation_id,
            state,
            ..
        } => {
            pb_clone.finish_with_message(format!(
                "Operation {}: {}",
                operation_id,
                format_operation_state(state)
            ));
        }
        ProgressEvent::Failed {
            operation_id,
            error,
        } => {
            pb_clone.finish_with_message(format!(
                "Operation {}: {} {}",
                operation_id,
                format_operation_state(&OperationState::Failed),
                error
            ));
        }
    });

    (pb, callback)
}

/// Wait for an operation with a spinner, honoring Ctrl-C and the configured bounds
pub async fn wait_for_operation(
    conn_mgr: &ConnectionManager,
    settings: &Settings,
    client: &QnaMakerClient,
    handle: &OperationHandle,
) -> CliResult<OperationOutcome> {
    let config = conn_mgr.poller_config(settings);
    debug!("Waiting for {} with {:?}", handle, config);

    let (pb, callback) = progress_spinner(format!("Waiting for operation {}", handle.operation_id()));
    let result = OperationPoller::new(client, config)
        .with_progress(Some(callback))
        .with_cancellation(conn_mgr.cancel.clone())
        .drive_to_completion(handle)
        .await;

    match result {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            pb.abandon_with_message(format!("Stopped waiting for operation {}", handle.operation_id()));
            Err(QnaCtlError::from(e))
        }
    }
}

/// Format operation state for display with status icons
pub fn format_operation_state(state: &OperationState) -> String {
    match state {
        OperationState::Succeeded => format!("\u{2713} {}", state), // checkmark
        OperationState::Failed => format!("\u{2717} {}", state),    // x mark
        OperationState::Running => format!("\u{21bb} {}", state),   // arrow circle
        OperationState::NotStarted => format!("\u{2026} {}", state), // ellipsis
        OperationState::Other(_) => state.to_string(),
    }
}

/// Print the final state of a waited-for operation
pub fn print_outcome(
    handle: &OperationHandle,
    outcome: &OperationOutcome,
    output_format: OutputFormat,
) -> CliResult<()> {
    match output::OutputFormat::structured(output_format) {
        Some(fmt) => print_output(outcome.operation(), fmt)?,
        None => print_operation_details(handle, outcome.operation()),
    }
    Ok(())
}

/// Print detailed operation information
fn print_operation_details(handle: &OperationHandle, operation: &Operation) {
    println!("\nOperation Details:");
    println!("------------------");
    println!(
        "ID: {}",
        operation
            .operation_id
            .as_deref()
            .unwrap_or(handle.operation_id())
    );
    println!(
        "State: {}",
        format_operation_state(&operation.operation_state)
    );

    if let Some(created) = &operation.created_timestamp {
        println!("Created: {}", created);
    }
    if let Some(updated) = &operation.last_action_timestamp {
        println!("Last action: {}", updated);
    }
    if let Some(location) = &operation.resource_location {
        println!("Resource: {}", location);
    }
    if let Some(detail) = operation.error_detail() {
        println!("Error:");
        for line in detail.render().lines() {
            println!("  {}", line);
        }
    }
}
