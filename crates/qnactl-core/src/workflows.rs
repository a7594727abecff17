//! Knowledge base workflows - submit and wait
//!
//! These workflows compose a client submission with [`OperationPoller`] and
//! turn the terminal outcome into a plain result.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::QnaMakerClient;
use crate::error::{CoreError, Result};
use crate::models::{CreateKbDto, UpdateKbOperationDto};
use crate::operation::{Operation, OperationOutcome};
use crate::poller::{OperationPoller, PollerConfig, ProgressCallback};

fn poller<'a>(
    client: &'a QnaMakerClient,
    config: PollerConfig,
    on_progress: Option<ProgressCallback>,
    cancel: Option<CancellationToken>,
) -> OperationPoller<&'a QnaMakerClient> {
    let poller = OperationPoller::new(client, config).with_progress(on_progress);
    match cancel {
        Some(token) => poller.with_cancellation(token),
        None => poller,
    }
}

/// Create a knowledge base and wait for completion
///
/// This is a convenience workflow that:
/// 1. Submits the create request (returns an operation location)
/// 2. Polls the operation until it is terminal
/// 3. Extracts the new knowledge base id from `resourceLocation`
///
/// # Arguments
///
/// * `client` - The authoring API client
/// * `dto` - The knowledge base definition
/// * `config` - Poll pacing and bounds
/// * `on_progress` - Optional callback for progress updates
/// * `cancel` - Optional token that aborts the wait
///
/// # Example
///
/// ```rust,ignore
/// use qnactl_core::{CreateKbDto, PollerConfig, create_knowledge_base_and_wait};
///
/// let dto: CreateKbDto = serde_json::from_str(&std::fs::read_to_string("kb.json")?)?;
/// let kb_id = create_knowledge_base_and_wait(
///     &client,
///     &dto,
///     PollerConfig::default(),
///     None,  // No progress callback
///     None,  // Not cancellable
/// ).await?;
///
/// println!("Created knowledge base: {}", kb_id);
/// ```
pub async fn create_knowledge_base_and_wait(
    client: &QnaMakerClient,
    dto: &CreateKbDto,
    config: PollerConfig,
    on_progress: Option<ProgressCallback>,
    cancel: Option<CancellationToken>,
) -> Result<String> {
    // Step 1: Submit
    let submission = client.create_knowledge_base(dto).await?;

    // Step 2: Poll until terminal
    let outcome = poller(client, config, on_progress, cancel)
        .drive_to_completion(&submission.handle)
        .await?;

    // Step 3: Extract the knowledge base id
    let kb_id = outcome.knowledge_base_id();
    let operation = outcome.into_result()?;
    let kb_id = kb_id.ok_or_else(|| {
        CoreError::protocol(
            "Operation succeeded without a resourceLocation",
            serde_json::to_string(&operation).ok(),
        )
    })?;

    info!("Created knowledge base {}", kb_id);
    Ok(kb_id)
}

/// Update a knowledge base and wait for completion
///
/// # Arguments
///
/// * `client` - The authoring API client
/// * `id` - The knowledge base to update
/// * `dto` - Entries to add, update and delete
/// * `config` - Poll pacing and bounds
/// * `on_progress` - Optional callback for progress updates
/// * `cancel` - Optional token that aborts the wait
pub async fn update_knowledge_base_and_wait(
    client: &QnaMakerClient,
    id: &str,
    dto: &UpdateKbOperationDto,
    config: PollerConfig,
    on_progress: Option<ProgressCallback>,
    cancel: Option<CancellationToken>,
) -> Result<Operation> {
    // Step 1: Submit
    let submission = client.update_knowledge_base(id, dto).await?;

    // Step 2: Poll until terminal
    let outcome: OperationOutcome = poller(client, config, on_progress, cancel)
        .drive_to_completion(&submission.handle)
        .await?;

    let operation = outcome.into_result()?;
    info!("Updated knowledge base {}", id);
    Ok(operation)
}
