//! Request and response bodies for the knowledge base API

use serde::{Deserialize, Serialize};

/// Name/value pair attached to a QnA entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDto {
    pub name: String,
    pub value: String,
}

impl MetadataDto {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A question/answer entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QnaDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub metadata: Vec<MetadataDto>,
}

/// File to import, referenced by URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDto {
    pub file_name: String,
    pub file_uri: String,
}

/// Body of `POST /knowledgebases/create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKbDto {
    pub name: String,
    #[serde(default)]
    pub qna_list: Vec<QnaDto>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub files: Vec<FileDto>,
}

/// Entries to add in an update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateKbAdd {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qna_list: Vec<QnaDto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileDto>,
}

/// Knowledge base level changes in an update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateKbUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Entries and sources to remove in an update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateKbDelete {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

/// Body of `PATCH /knowledgebases/{id}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateKbOperationDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<UpdateKbAdd>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateKbUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<UpdateKbDelete>,
}

/// Knowledge base details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBase {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_published_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
}

/// Body of `GET /knowledgebases`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBases {
    #[serde(default)]
    pub knowledgebases: Vec<KnowledgeBase>,
}

/// Body of `GET /endpointkeys`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_endpoint_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_endpoint_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_stable_version: Option<String>,
}

/// Body of `POST .../generateAnswer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDto {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
}

impl QueryDto {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top: None,
        }
    }

    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }
}

/// One ranked answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub answer: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataDto>,
}

/// Body returned by `generateAnswer`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerResponse {
    #[serde(default)]
    pub answers: Vec<Answer>,
}
