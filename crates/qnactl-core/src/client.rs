//! HTTP clients for the knowledge base authoring and runtime APIs
//!
//! [`QnaMakerClient`] talks to the authoring API under
//! `<endpoint>/qnamaker/v4.0` using the `Ocp-Apim-Subscription-Key` header.
//! [`RuntimeClient`] queries a published knowledge base with
//! `Authorization: EndpointKey <key>`.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, LOCATION, RETRY_AFTER};
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

use crate::config::{ApiKey, ConfigError, DEFAULT_RETRY_INTERVAL_SECS};
use crate::error::{CoreError, Result};
use crate::error_detail::{ErrorDetail, ErrorResponse};
use crate::models::{
    AnswerResponse, CreateKbDto, EndpointKeys, KnowledgeBase, KnowledgeBases, QueryDto,
    UpdateKbOperationDto,
};
use crate::operation::{Operation, OperationHandle, PollResult, StatusResponse, parse_retry_after};
use crate::poller::OperationSource;

/// Header carrying the authoring subscription key
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Path of the authoring API below the resource endpoint
pub const AUTHORING_BASE_PATH: &str = "/qnamaker/v4.0";

/// Path of the runtime API below the runtime endpoint
pub const RUNTIME_BASE_PATH: &str = "/qnamaker";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent with every request
pub fn default_user_agent() -> String {
    format!("qnactl/{}", env!("CARGO_PKG_VERSION"))
}

/// Accepted long-running request
#[derive(Debug, Clone)]
pub struct Submission {
    pub handle: OperationHandle,
    /// Initial operation body, when the service returned one
    pub operation: Option<Operation>,
    pub body: String,
}

/// Validate an endpoint and append `base_path` to it
fn base_url(
    field: &'static str,
    endpoint: &str,
    base_path: &str,
) -> std::result::Result<String, ConfigError> {
    let trimmed = endpoint.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|e| ConfigError::InvalidSetting {
        field,
        message: format!("'{}' is not a valid URL: {}", endpoint, e),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidSetting {
            field,
            message: format!("'{}' must use http or https", endpoint),
        });
    }
    Ok(format!("{}{}", trimmed, base_path))
}

fn http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(|e| CoreError::transport("building HTTP client", e))
}

/// Decode a non-success response into [`CoreError::Service`]
async fn service_error(response: Response) -> CoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    debug!("Service error {}: {}", status, body);

    let error = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(|envelope| envelope.error)
        .unwrap_or_else(|| {
            let message = if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body.clone()
            };
            ErrorDetail::with_message(message)
        });

    CoreError::Service {
        status: status.as_u16(),
        error,
    }
}

fn decode<T: DeserializeOwned>(what: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        CoreError::protocol(
            format!("Failed to parse {}: {}", what, e),
            Some(body.to_string()),
        )
    })
}

/// Builder for [`QnaMakerClient`]
#[derive(Debug, Default)]
pub struct QnaMakerClientBuilder {
    endpoint: Option<String>,
    subscription_key: Option<ApiKey>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
    default_retry_interval: Option<Duration>,
}

impl QnaMakerClientBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn subscription_key(mut self, key: ApiKey) -> Self {
        self.subscription_key = Some(key);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Wait used by [`QnaMakerClient::get_operation`] when no `Retry-After` is sent
    pub fn default_retry_interval(mut self, interval: Duration) -> Self {
        self.default_retry_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<QnaMakerClient> {
        let endpoint = self.endpoint.ok_or(ConfigError::InvalidSetting {
            field: "endpoint",
            message: "no authoring endpoint given".to_string(),
        })?;
        let subscription_key = self.subscription_key.ok_or(ConfigError::InvalidSetting {
            field: "subscription_key",
            message: "no subscription key given".to_string(),
        })?;
        let user_agent = self.user_agent.unwrap_or_else(default_user_agent);

        Ok(QnaMakerClient {
            base_url: base_url("endpoint", &endpoint, AUTHORING_BASE_PATH)?,
            http: http_client(&user_agent, self.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT))?,
            subscription_key,
            default_retry_interval: self
                .default_retry_interval
                .unwrap_or(Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS)),
        })
    }
}

/// Authoring API client
#[derive(Debug, Clone)]
pub struct QnaMakerClient {
    base_url: String,
    http: reqwest::Client,
    subscription_key: ApiKey,
    default_retry_interval: Duration,
}

impl QnaMakerClient {
    pub fn builder() -> QnaMakerClientBuilder {
        QnaMakerClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a path or an absolute operation location against the base URL
    ///
    /// Absolute locations must share the endpoint's origin, since every
    /// request carries the subscription key.
    fn url(&self, path: &str) -> Result<String> {
        if path.starts_with("http://") || path.starts_with("https://") {
            let target = Url::parse(path).map_err(|e| {
                CoreError::protocol(format!("Invalid operation location '{}': {}", path, e), None)
            })?;
            let base = Url::parse(&self.base_url).map_err(|e| {
                CoreError::protocol(format!("Invalid endpoint '{}': {}", self.base_url, e), None)
            })?;
            if target.origin() != base.origin() {
                warn!("Refusing to send the subscription key to {}", path);
                return Err(CoreError::protocol(
                    format!(
                        "Operation location '{}' is not on the configured endpoint {}",
                        path,
                        base.origin().ascii_serialization()
                    ),
                    None,
                ));
            }
            Ok(path.to_string())
        } else if path.starts_with('/') {
            Ok(format!("{}{}", self.base_url, path))
        } else {
            Ok(format!("{}/{}", self.base_url, path))
        }
    }

    fn knowledge_base_path(id: &str) -> String {
        format!("/knowledgebases/{}", urlencoding::encode(id))
    }

    /// Send a request and return the raw response, mapping non-2xx statuses
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response> {
        let url = self.url(path)?;
        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(SUBSCRIPTION_KEY_HEADER, self.subscription_key.expose());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CoreError::transport(format!("sending {} {}", method, url), e))?;

        trace!("{} {} -> {}", method, url, response.status());
        if !response.status().is_success() {
            return Err(service_error(response).await);
        }
        Ok(response)
    }

    async fn send_text<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<String> {
        let response = self.send(method, path, body).await?;
        response
            .text()
            .await
            .map_err(|e| CoreError::transport(format!("reading response from {}", path), e))
    }

    /// Send a request that starts a long-running operation
    ///
    /// The handle comes from the `Location` header. If that is missing but the
    /// body carries an `operationId`, the handle is `/operations/<id>`.
    pub async fn submit<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Submission> {
        let response = self.send(method, path, Some(body)).await?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::transport(format!("reading response from {}", path), e))?;
        let operation = serde_json::from_str::<Operation>(&body).ok();

        let handle = match location {
            Some(location) => OperationHandle::new(location),
            None => match operation.as_ref().and_then(|op| op.operation_id.as_deref()) {
                Some(id) => {
                    debug!("No Location header, using operationId {}", id);
                    OperationHandle::from_operation_id(id)
                }
                None => {
                    return Err(CoreError::protocol(
                        "Response carried neither a Location header nor an operationId",
                        Some(body),
                    ));
                }
            },
        };

        debug!("Operation accepted at {}", handle);
        Ok(Submission {
            handle,
            operation,
            body,
        })
    }

    /// Start creating a knowledge base
    pub async fn create_knowledge_base(&self, dto: &CreateKbDto) -> Result<Submission> {
        self.submit(Method::POST, "/knowledgebases/create", dto).await
    }

    /// Start updating a knowledge base
    pub async fn update_knowledge_base(
        &self,
        id: &str,
        dto: &UpdateKbOperationDto,
    ) -> Result<Submission> {
        self.submit(Method::PATCH, &Self::knowledge_base_path(id), dto)
            .await
    }

    /// Check an operation once, applying the client's default retry interval
    pub async fn get_operation(&self, handle: &OperationHandle) -> Result<PollResult> {
        let status = self.operation_status(handle).await?;
        Ok(PollResult::from_status(status, self.default_retry_interval))
    }

    /// Check an operation once and return the raw `Retry-After` hint
    pub async fn operation_status(&self, handle: &OperationHandle) -> Result<StatusResponse> {
        let response = self.send::<()>(Method::GET, handle.as_str(), None).await?;

        let retry_after = match response.headers().get(RETRY_AFTER) {
            None => None,
            Some(value) => {
                let parsed = value.to_str().ok().and_then(parse_retry_after);
                if parsed.is_none() {
                    warn!(
                        "Ignoring Retry-After {:?} for {}, expected whole seconds",
                        value, handle
                    );
                }
                parsed
            }
        };

        let raw_body = response.text().await.map_err(|e| {
            CoreError::transport(format!("reading operation status for {}", handle), e)
        })?;
        let operation = decode("operation status", &raw_body)?;

        Ok(StatusResponse {
            operation,
            retry_after,
            raw_body,
        })
    }

    pub async fn list_knowledge_bases(&self) -> Result<Vec<KnowledgeBase>> {
        let body = self
            .send_text::<()>(Method::GET, "/knowledgebases", None)
            .await?;
        let list: KnowledgeBases = decode("knowledge base list", &body)?;
        Ok(list.knowledgebases)
    }

    pub async fn get_knowledge_base(&self, id: &str) -> Result<KnowledgeBase> {
        let body = self
            .send_text::<()>(Method::GET, &Self::knowledge_base_path(id), None)
            .await?;
        decode("knowledge base", &body)
    }

    /// Publish the test index of a knowledge base to production
    pub async fn publish_knowledge_base(&self, id: &str) -> Result<()> {
        self.send::<()>(Method::POST, &Self::knowledge_base_path(id), None)
            .await?;
        Ok(())
    }

    pub async fn delete_knowledge_base(&self, id: &str) -> Result<()> {
        self.send::<()>(Method::DELETE, &Self::knowledge_base_path(id), None)
            .await?;
        Ok(())
    }

    /// Runtime keys for querying published knowledge bases
    pub async fn endpoint_keys(&self) -> Result<EndpointKeys> {
        let body = self
            .send_text::<()>(Method::GET, "/endpointkeys", None)
            .await?;
        decode("endpoint keys", &body)
    }
}

#[async_trait]
impl OperationSource for QnaMakerClient {
    async fn fetch_status(&self, handle: &OperationHandle) -> Result<StatusResponse> {
        self.operation_status(handle).await
    }
}

/// Runtime API client for querying published knowledge bases
#[derive(Debug, Clone)]
pub struct RuntimeClient {
    base_url: String,
    http: reqwest::Client,
    endpoint_key: ApiKey,
}

impl RuntimeClient {
    pub fn new(endpoint: &str, endpoint_key: ApiKey) -> Result<Self> {
        Self::with_timeout(endpoint, endpoint_key, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, endpoint_key: ApiKey, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url("runtime_endpoint", endpoint, RUNTIME_BASE_PATH)?,
            http: http_client(&default_user_agent(), timeout)?,
            endpoint_key,
        })
    }

    /// Ask a published knowledge base a question
    pub async fn generate_answer(&self, id: &str, query: &QueryDto) -> Result<AnswerResponse> {
        let url = format!(
            "{}/knowledgebases/{}/generateAnswer",
            self.base_url,
            urlencoding::encode(id)
        );
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .header(
                AUTHORIZATION,
                format!("EndpointKey {}", self.endpoint_key.expose()),
            )
            .json(query)
            .send()
            .await
            .map_err(|e| CoreError::transport(format!("querying knowledge base {}", id), e))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Knowledge base {} is not published", id);
        }
        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| CoreError::transport(format!("reading answer from {}", url), e))?;
        decode("answer", &body)
    }
}
