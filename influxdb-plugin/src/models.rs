//! JSON replies returned by the verb routes.

use serde::Serialize;
use serde_json::Value;

use crate::error::PluginError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Failed,
}

/// Body of every verb reply.
#[derive(Debug, Serialize)]
pub struct VerbReply {
    pub status: ReplyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl VerbReply {
    pub fn success(info: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Success,
            info: Some(info.into()),
            response: None,
        }
    }

    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }

    pub fn failed(err: &PluginError) -> Self {
        Self {
            status: ReplyStatus::Failed,
            info: Some(err.detail()),
            response: None,
        }
    }
}
