//! Knowledge base command implementations

use std::path::Path;

use comfy_table::Table;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use qnactl_core::{
    CreateKbDto, QnaMakerClient, QueryDto, Submission, UpdateKbOperationDto,
    create_knowledge_base_and_wait, update_knowledge_base_and_wait,
};

use crate::cli::{KbCommands, OutputFormat};
use crate::commands::operation::{format_operation_state, progress_spinner};
use crate::connection::ConnectionManager;
use crate::error::{QnaCtlError, Result as CliResult};
use crate::output::{self, format_timestamp, print_output};
use crate::samples;

pub async fn handle_kb_command(
    conn_mgr: &ConnectionManager,
    cmd: &KbCommands,
    output_format: OutputFormat,
) -> CliResult<()> {
    let settings = conn_mgr.settings()?;
    let client = conn_mgr.create_client(&settings)?;

    match cmd {
        KbCommands::Create { submit } => {
            let dto: CreateKbDto = match &submit.file {
                Some(path) => read_json(path)?,
                None => samples::create_kb(),
            };
            info!("Creating knowledge base '{}'", dto.name);

            if submit.no_wait {
                let submission = client.create_knowledge_base(&dto).await?;
                return print_submission(&submission, output_format);
            }

            let (_pb, callback) = progress_spinner(format!("Creating knowledge base '{}'", dto.name));
            let kb_id = create_knowledge_base_and_wait(
                &client,
                &dto,
                conn_mgr.poller_config(&settings),
                Some(callback),
                Some(conn_mgr.cancel.clone()),
            )
            .await?;

            match output::OutputFormat::structured(output_format) {
                Some(fmt) => print_output(json!({ "id": kb_id, "name": dto.name }), fmt)?,
                None => println!("Created knowledge base {}", kb_id),
            }
            Ok(())
        }
        KbCommands::Update { id, submit } => {
            let kb_id = settings.knowledge_base_id(id.as_deref())?;
            let dto: UpdateKbOperationDto = match &submit.file {
                Some(path) => read_json(path)?,
                None => samples::update_kb(),
            };
            info!("Updating knowledge base {}", kb_id);

            if submit.no_wait {
                let submission = client.update_knowledge_base(&kb_id, &dto).await?;
                return print_submission(&submission, output_format);
            }

            let (_pb, callback) = progress_spinner(format!("Updating knowledge base {}", kb_id));
            let operation = update_knowledge_base_and_wait(
                &client,
                &kb_id,
                &dto,
                conn_mgr.poller_config(&settings),
                Some(callback),
                Some(conn_mgr.cancel.clone()),
            )
            .await?;

            match output::OutputFormat::structured(output_format) {
                Some(fmt) => print_output(&operation, fmt)?,
                None => println!(
                    "Updated knowledge base {}: {}",
                    kb_id,
                    format_operation_state(&operation.operation_state)
                ),
            }
            Ok(())
        }
        KbCommands::List => list_knowledge_bases(&client, output_format).await,
        KbCommands::Get { id } => {
            let kb_id = settings.knowledge_base_id(id.as_deref())?;
            let kb = client.get_knowledge_base(&kb_id).await?;
            print_output(&kb, output_format.into())?;
            Ok(())
        }
        KbCommands::Publish { id } => {
            let kb_id = settings.knowledge_base_id(id.as_deref())?;
            client.publish_knowledge_base(&kb_id).await?;
            print_status(output_format, &kb_id, "published")
        }
        KbCommands::Delete { id } => {
            let kb_id = settings.knowledge_base_id(id.as_deref())?;
            client.delete_knowledge_base(&kb_id).await?;
            print_status(output_format, &kb_id, "deleted")
        }
        KbCommands::Query { id, question, top } => {
            let runtime = conn_mgr
                .create_runtime_client_with_lookup(&settings, &client)
                .await?;
            let query = QueryDto::new(question.as_str()).top(*top);
            let response = runtime.generate_answer(id, &query).await?;

            match output::OutputFormat::structured(output_format) {
                Some(fmt) => print_output(&response, fmt)?,
                None if response.answers.is_empty() => println!("No answers found"),
                None => {
                    for answer in &response.answers {
                        println!("Answer: {}", answer.answer);
                        println!("Score: {}", answer.score);
                        println!();
                    }
                }
            }
            Ok(())
        }
    }
}

/// Show the runtime endpoint keys of the resource
pub async fn handle_endpoint_keys(
    conn_mgr: &ConnectionManager,
    output_format: OutputFormat,
) -> CliResult<()> {
    let settings = conn_mgr.settings()?;
    let client = conn_mgr.create_client(&settings)?;
    let keys = client.endpoint_keys().await?;

    if let Some(fmt) = output::OutputFormat::structured(output_format) {
        print_output(&keys, fmt)?;
        return Ok(());
    }

    let primary = keys.primary_endpoint_key.as_deref().unwrap_or("-");
    let secondary = keys.secondary_endpoint_key.as_deref().unwrap_or("-");
    println!("Primary key: {}", primary);
    println!("Secondary key: {}", secondary);
    if let Some(version) = &keys.installed_version {
        println!("Installed version: {}", version);
    }
    if let Some(version) = &keys.last_stable_version {
        println!("Last stable version: {}", version);
    }
    Ok(())
}

pub(crate) async fn list_knowledge_bases(
    client: &QnaMakerClient,
    output_format: OutputFormat,
) -> CliResult<()> {
    let kbs = client.list_knowledge_bases().await?;
    debug!("Found {} knowledge bases", kbs.len());

    if let Some(fmt) = output::OutputFormat::structured(output_format) {
        print_output(&kbs, fmt)?;
        return Ok(());
    }

    if kbs.is_empty() {
        println!("No knowledge bases found");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Last Changed", "Last Published"]);
    for kb in &kbs {
        table.add_row(vec![
            kb.id.clone(),
            kb.name.clone().unwrap_or_else(|| "-".to_string()),
            format_timestamp(kb.last_changed_timestamp.as_deref()),
            format_timestamp(kb.last_published_timestamp.as_deref()),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Print the handle of an operation the caller chose not to wait for
fn print_submission(submission: &Submission, output_format: OutputFormat) -> CliResult<()> {
    let handle = &submission.handle;
    let state = submission
        .operation
        .as_ref()
        .map(|op| op.operation_state.to_string());

    match output::OutputFormat::structured(output_format) {
        Some(fmt) => print_output(
            json!({
                "operation_id": handle.operation_id(),
                "location": handle.as_str(),
                "state": state,
            }),
            fmt,
        )?,
        None => {
            println!("Operation {} submitted", handle.operation_id());
            if let Some(state) = state {
                println!("State: {}", state);
            }
            println!(
                "To wait for completion, run: qnactl operation wait {}",
                handle.operation_id()
            );
        }
    }
    Ok(())
}

fn print_status(output_format: OutputFormat, kb_id: &str, status: &str) -> CliResult<()> {
    match output::OutputFormat::structured(output_format) {
        Some(fmt) => print_output(json!({ "id": kb_id, "status": status }), fmt)?,
        None => println!("Knowledge base {} {}", kb_id, status),
    }
    Ok(())
}

/// Read a JSON request body from disk
fn read_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let content = std::fs::read_to_string(path).map_err(|e| QnaCtlError::FileError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| QnaCtlError::InvalidInput {
        message: format!("{} is not a valid request body: {}", path.display(), e),
    })
}
