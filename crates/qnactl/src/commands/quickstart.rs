//! End-to-end walkthrough: create, list, update, publish, query, delete

use colored::Colorize;
use qnactl_core::config::{ConfigError, MissingSetting, RUNTIME_ENDPOINT_ENV};
use qnactl_core::{QueryDto, create_knowledge_base_and_wait, update_knowledge_base_and_wait};
use tracing::{info, warn};

use crate::cli::OutputFormat;
use crate::commands::knowledge_base::list_knowledge_bases;
use crate::commands::operation::{format_operation_state, progress_spinner};
use crate::connection::ConnectionManager;
use crate::error::Result as CliResult;
use crate::samples;

pub async fn handle_quickstart(
    conn_mgr: &ConnectionManager,
    question: &str,
    keep: bool,
    output_format: OutputFormat,
) -> CliResult<()> {
    let settings = conn_mgr.settings()?;
    let client = conn_mgr.create_client(&settings)?;

    // Fail before creating anything that would need cleaning up
    if settings.runtime_endpoint.is_none() {
        return Err(ConfigError::MissingSettings(vec![MissingSetting {
            field: "runtime_endpoint",
            env_var: RUNTIME_ENDPOINT_ENV,
        }])
        .into());
    }
    let poller = conn_mgr.poller_config(&settings);

    step("Creating KB...");
    let (_pb, callback) = progress_spinner("Creating knowledge base".to_string());
    let kb_id = create_knowledge_base_and_wait(
        &client,
        &samples::create_kb(),
        poller.clone(),
        Some(callback),
        Some(conn_mgr.cancel.clone()),
    )
    .await?;
    println!("Created KB with ID: {}", kb_id);
    info!("Quickstart knowledge base {}", kb_id);

    // Anything past this point should still delete the knowledge base
    let result = async {
        step("Listing KBs...");
        list_knowledge_bases(&client, output_format).await?;

        step("Updating KB...");
        let (_pb, callback) = progress_spinner(format!("Updating knowledge base {}", kb_id));
        let operation = update_knowledge_base_and_wait(
            &client,
            &kb_id,
            &samples::update_kb(),
            poller.clone(),
            Some(callback),
            Some(conn_mgr.cancel.clone()),
        )
        .await?;
        println!(
            "Update finished: {}",
            format_operation_state(&operation.operation_state)
        );

        step("Publishing KB...");
        client.publish_knowledge_base(&kb_id).await?;
        println!("KB published");

        step("Querying KB...");
        let runtime = conn_mgr
            .create_runtime_client_with_lookup(&settings, &client)
            .await?;
        let response = runtime
            .generate_answer(&kb_id, &QueryDto::new(question).top(3))
            .await?;
        println!("Question: {}", question);
        if response.answers.is_empty() {
            println!("No answers found");
        }
        for answer in &response.answers {
            println!("Answer: {}", answer.answer);
            println!("Score: {}", answer.score);
        }
        CliResult::Ok(())
    }
    .await;

    if keep {
        println!("Keeping KB {}", kb_id);
    } else {
        step("Deleting KB...");
        match client.delete_knowledge_base(&kb_id).await {
            Ok(()) => println!("KB deleted"),
            // The walkthrough error is the one worth reporting
            Err(e) if result.is_err() => warn!("Failed to delete KB {}: {}", kb_id, e),
            Err(e) => return Err(e.into()),
        }
    }

    result
}

fn step(message: &str) {
    println!("\n{}", message.bold());
}
