//! Structured error bodies returned by the knowledge base service
//!
//! The service reports failures as a possibly deep tree: each error carries a
//! message and code, an ordered list of child `details`, and an `innerError`
//! chain of codes. Rendering walks that tree with an explicit stack so that a
//! hostile or buggy response cannot exhaust the call stack.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Envelope the service wraps error details in (`{ "error": { ... } }`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

/// One node of the error tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_error: Option<Box<InnerError>>,
}

/// Link in the `innerError` chain, carrying only a code
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InnerError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_error: Option<Box<InnerError>>,
}

/// What a rendered line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLineKind {
    Message,
    Code,
}

/// A single line produced by walking an [`ErrorDetail`] tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLine {
    pub depth: usize,
    pub kind: ErrorLineKind,
    pub text: String,
}

enum Frame<'a> {
    Detail(&'a ErrorDetail, usize),
    Inner(&'a InnerError, usize),
}

impl ErrorDetail {
    /// Convenience constructor for a message-only detail
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Walk the tree depth-first in document order.
    ///
    /// For each node the message comes first, then every child detail (fully
    /// expanded), then the codes of the inner error chain.
    pub fn lines(&self) -> Vec<ErrorLine> {
        let mut out = Vec::new();
        let mut stack = vec![Frame::Detail(self, 0)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Detail(detail, depth) => {
                    if let Some(message) = &detail.message {
                        out.push(ErrorLine {
                            depth,
                            kind: ErrorLineKind::Message,
                            text: message.clone(),
                        });
                    }
                    // Pushed in reverse so they pop in document order
                    if let Some(inner) = &detail.inner_error {
                        stack.push(Frame::Inner(inner, depth + 1));
                    }
                    for child in detail.details.iter().rev() {
                        stack.push(Frame::Detail(child, depth + 1));
                    }
                }
                Frame::Inner(inner, depth) => {
                    if let Some(code) = &inner.code {
                        out.push(ErrorLine {
                            depth,
                            kind: ErrorLineKind::Code,
                            text: code.clone(),
                        });
                    }
                    if let Some(next) = &inner.inner_error {
                        stack.push(Frame::Inner(next, depth + 1));
                    }
                }
            }
        }

        out
    }

    /// All messages in the tree, in document order
    pub fn messages(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.kind == ErrorLineKind::Message)
            .map(|line| line.text)
            .collect()
    }

    /// Multi-line, indented rendering of the whole tree
    pub fn render(&self) -> String {
        self.lines()
            .iter()
            .map(|line| {
                let indent = "  ".repeat(line.depth);
                match line.kind {
                    ErrorLineKind::Message => format!("{indent}{}", line.text),
                    ErrorLineKind::Code => format!("{indent}code: {}", line.text),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{code}: {message}"),
            (None, Some(message)) => write!(f, "{message}"),
            (Some(code), None) => write!(f, "{code}"),
            (None, None) => write!(f, "unknown error"),
        }
    }
}
