//! Error types for qnactl
//!
//! Library errors are folded into [`QnaCtlError`], which knows how to print
//! itself as a cargo-style diagnostic with tips for fixing the problem.

use colored::Colorize;
use qnactl_core::config::{ConfigError, MissingSetting};
use qnactl_core::{CoreError, ErrorDetail, TimeoutKind};
use thiserror::Error;

/// Cargo-style diagnostic formatter for CLI errors.
///
/// Produces structured output like:
/// ```text
/// error: Missing required settings: 'endpoint' (set QNA_MAKER_ENDPOINT or add it to the profile)
///
///   tip: configure a profile:
///       qnactl profile set default --endpoint <url> --subscription-key <key>
/// ```
pub struct CliDiagnostic {
    message: String,
    detail: Option<String>,
    tips: Vec<(String, Vec<String>)>,
}

impl CliDiagnostic {
    /// Start a new error diagnostic with the given message.
    pub fn error(message: &str) -> Self {
        Self {
            message: message.to_string(),
            detail: None,
            tips: Vec::new(),
        }
    }

    /// Add detail lines below the error message.
    pub fn detail(mut self, text: &str) -> Self {
        self.detail = Some(text.to_string());
        self
    }

    /// Add a tip with optional example commands.
    pub fn tip(mut self, description: &str, commands: &[&str]) -> Self {
        self.tips.push((
            description.to_string(),
            commands.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// Print the diagnostic to stderr with colored formatting.
    pub fn print(&self) {
        eprint!("{}{}", "error".red().bold(), ": ".bold());
        eprintln!("{}", self.message);

        if let Some(detail) = &self.detail {
            for line in detail.lines() {
                eprintln!("  {}", line);
            }
        }

        for (description, commands) in &self.tips {
            eprintln!();
            eprint!("  {}{}", "tip".yellow().bold(), ": ".bold());
            eprintln!("{}", description);
            for cmd in commands {
                eprintln!("      {}", cmd);
            }
        }
    }
}

/// Main error type for the qnactl application
#[derive(Error, Debug)]
pub enum QnaCtlError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("Missing required settings: {}", format_missing(.missing))]
    MissingSettings { missing: Vec<MissingSetting> },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("API error: {message}")]
    ApiError {
        message: String,
        status: Option<u16>,
        detail: Option<ErrorDetail>,
    },

    #[error("Operation failed: {}", .detail)]
    OperationFailed { detail: ErrorDetail },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("File error for '{path}': {message}")]
    FileError { path: String, message: String },

    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    #[error("Timeout: {message}")]
    Timeout { message: String },

    #[error("Cancelled")]
    Cancelled,

    #[error("Output formatting error: {message}")]
    OutputError { message: String },
}

fn format_missing(missing: &[MissingSetting]) -> String {
    missing
        .iter()
        .map(|m| format!("'{}'", m.field))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for qnactl operations
pub type Result<T> = std::result::Result<T, QnaCtlError>;

impl QnaCtlError {
    /// Get helpful suggestions for resolving this error
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            QnaCtlError::ProfileNotFound { name } => vec![
                "List available profiles: qnactl profile list".to_string(),
                format!(
                    "Create profile '{}': qnactl profile set {} --endpoint <url> --subscription-key <key>",
                    name, name
                ),
                "Check profile name spelling".to_string(),
            ],
            QnaCtlError::MissingSettings { missing } => {
                let mut tips: Vec<String> = missing
                    .iter()
                    .map(|m| format!("Set {} or add '{}' to the profile", m.env_var, m.field))
                    .collect();
                tips.push("Configure a profile: qnactl profile set <name> --help".to_string());
                tips
            }
            QnaCtlError::AuthenticationFailed { .. } => vec![
                "Check your keys: qnactl profile show <profile>".to_string(),
                "Verify the subscription key belongs to this resource's endpoint".to_string(),
                "Runtime queries need the endpoint key: qnactl endpoint-keys".to_string(),
            ],
            QnaCtlError::ConnectionError { .. } => vec![
                "Check network connectivity".to_string(),
                "Verify the endpoint URL is correct: qnactl profile show <profile>".to_string(),
            ],
            QnaCtlError::ApiError {
                status: Some(404), ..
            } => vec![
                "Verify the knowledge base id is correct".to_string(),
                "List knowledge bases to find the correct id: qnactl kb list".to_string(),
                "Check that you're using the correct profile".to_string(),
            ],
            QnaCtlError::Timeout { .. } => vec![
                "The operation may still finish; check it with: qnactl operation wait <handle>"
                    .to_string(),
                "Raise the bound with --wait-timeout or --max-attempts".to_string(),
            ],
            QnaCtlError::InvalidInput { .. } => vec![
                "Check the command syntax: qnactl <command> --help".to_string(),
                "Verify the input file is valid JSON".to_string(),
            ],
            QnaCtlError::FileError { path, .. } => vec![
                format!("Check that file exists: {}", path),
                "Verify file permissions are correct".to_string(),
            ],
            _ => vec![],
        }
    }

    /// Service error tree rendered one line per message/code
    fn detail_text(&self) -> Option<String> {
        let detail = match self {
            QnaCtlError::ApiError {
                detail: Some(detail),
                ..
            }
            | QnaCtlError::OperationFailed { detail } => detail,
            _ => return None,
        };
        let rendered = detail.render();
        (!rendered.is_empty()).then_some(rendered)
    }

    /// Print a cargo-style diagnostic to stderr using colored formatting.
    pub fn print_diagnostic(&self) {
        let mut diag = CliDiagnostic::error(&format!("{}", self));

        if let Some(detail) = self.detail_text() {
            diag = diag.detail(&detail);
        }

        for suggestion in self.suggestions() {
            diag = diag.tip(&suggestion, &[]);
        }

        diag.print();
    }
}

impl From<ConfigError> for QnaCtlError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ProfileNotFound { name } => QnaCtlError::ProfileNotFound { name },
            ConfigError::MissingSettings(missing) => QnaCtlError::MissingSettings { missing },
            other => QnaCtlError::Configuration(other.to_string()),
        }
    }
}

impl From<CoreError> for QnaCtlError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config(config_err) => QnaCtlError::from(config_err),
            CoreError::Service { status, error } if status == 401 || status == 403 => {
                QnaCtlError::AuthenticationFailed {
                    message: format!("HTTP {}: {}", status, error),
                }
            }
            CoreError::Service { status, error } => QnaCtlError::ApiError {
                message: format!("HTTP {}: {}", status, error),
                status: Some(status),
                detail: Some(error),
            },
            CoreError::Transport { context, source } if source.is_timeout() => {
                QnaCtlError::Timeout {
                    message: format!("request timed out while {}", context),
                }
            }
            CoreError::Transport { context, source } => QnaCtlError::ConnectionError {
                message: format!("{}: {}", context, source),
            },
            CoreError::Protocol { message, body } => QnaCtlError::ApiError {
                message: match body {
                    Some(body) if !body.is_empty() => format!("{} (response: {})", message, body),
                    _ => message,
                },
                status: None,
                detail: None,
            },
            CoreError::OperationFailed(detail) => QnaCtlError::OperationFailed { detail },
            CoreError::Timeout(kind) => QnaCtlError::Timeout {
                message: match kind {
                    TimeoutKind::Deadline(d) => {
                        format!("operation still running after {} seconds", d.as_secs())
                    }
                    TimeoutKind::Attempts(n) => {
                        format!("operation still running after {} status checks", n)
                    }
                },
            },
            CoreError::Cancelled => QnaCtlError::Cancelled,
        }
    }
}

impl From<serde_json::Error> for QnaCtlError {
    fn from(err: serde_json::Error) -> Self {
        QnaCtlError::OutputError {
            message: format!("JSON error: {}", err),
        }
    }
}

impl From<std::io::Error> for QnaCtlError {
    fn from(err: std::io::Error) -> Self {
        QnaCtlError::OutputError {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<anyhow::Error> for QnaCtlError {
    fn from(err: anyhow::Error) -> Self {
        QnaCtlError::Configuration(format!("{:#}", err))
    }
}
