//! # qnactl-core
//!
//! Client library for knowledge base authoring and runtime APIs, shared by the
//! `qnactl` CLI.
//!
//! ## Layers
//!
//! - **Config** - named profiles, env overrides, credential references
//! - **Client** - typed HTTP calls ([`QnaMakerClient`], [`RuntimeClient`])
//! - **Operations** - long-running operation types and [`OperationPoller`]
//! - **Workflows** - "create and wait" style compositions
//!
//! ## Example
//!
//! ```rust,ignore
//! use qnactl_core::{Config, PollerConfig, QnaMakerClient, Settings};
//!
//! let config = Config::load()?;
//! let auth = Settings::resolve(&config, None)?.authoring()?;
//! let client = QnaMakerClient::builder()
//!     .endpoint(auth.endpoint)
//!     .subscription_key(auth.subscription_key)
//!     .build()?;
//!
//! let kb_id = qnactl_core::create_knowledge_base_and_wait(
//!     &client,
//!     &dto,
//!     PollerConfig::default(),
//!     None,
//!     None,
//! )
//! .await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod error_detail;
pub mod models;
pub mod operation;
pub mod poller;
pub mod workflows;

pub use client::{QnaMakerClient, QnaMakerClientBuilder, RuntimeClient, Submission};
pub use config::{ApiKey, Config, ConfigError, PollingConfig, Profile, Settings};
pub use error::{CoreError, Result, TimeoutKind};
pub use error_detail::{ErrorDetail, ErrorResponse, InnerError};
pub use models::{
    Answer, AnswerResponse, CreateKbDto, EndpointKeys, KnowledgeBase, QnaDto, QueryDto,
    UpdateKbOperationDto,
};
pub use operation::{
    Operation, OperationHandle, OperationOutcome, OperationState, PollResult, StatusResponse,
};
pub use poller::{OperationPoller, OperationSource, PollerConfig, ProgressCallback, ProgressEvent};
pub use workflows::{create_knowledge_base_and_wait, update_knowledge_base_and_wait};
