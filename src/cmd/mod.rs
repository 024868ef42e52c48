pub mod patch;
pub mod query_bugs;
pub mod test_failures;
pub mod update_work_item;

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::adapters::TransportError;
use crate::domain::error::{ClientError, ConfigError};

/// Structured command response that carries exit-code mapping and JSON payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommandResponse {
    pub exit_code: i32,
    pub payload: Value,
}

impl CommandResponse {
    pub fn success(payload: Value) -> Self {
        Self {
            exit_code: 0,
            payload,
        }
    }

    /// Completed, but the result needs attention (exit code 2).
    pub fn found(payload: Value) -> Self {
        Self {
            exit_code: 2,
            payload,
        }
    }

    pub fn failure(command: &'static str, error: &CommandError) -> Self {
        let code = error.exit_code();
        Self {
            exit_code: code,
            payload: json!({
                "error": error.kind(),
                "message": error.to_string(),
                "code": code,
                "details": {"command": command},
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    InputUsage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("{0}")]
    Internal(String),
}

impl CommandError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InputUsage(_) | Self::Config(_) => 3,
            Self::Client(error) => match error {
                ClientError::Status { status, .. } if *status >= 500 => 1,
                ClientError::Transport(TransportError::Unavailable { .. }) => 3,
                ClientError::Transport(_)
                | ClientError::Decode { .. }
                | ClientError::Serialize(_) => 1,
                _ => 3,
            },
            Self::Internal(_) => 1,
        }
    }

    pub fn kind(&self) -> &'static str {
        if self.exit_code() == 3 {
            "input_usage_error"
        } else {
            "internal_error"
        }
    }
}

/// Compact JSON view of a work item for command output.
pub(crate) fn work_item_summary(item: &crate::domain::work_item::WorkItem) -> Value {
    json!({
        "id": item.id,
        "rev": item.revision,
        "type": item.work_item_type,
        "title": item.title,
        "state": item.state,
        "assigned_to": item
            .assigned_to
            .as_ref()
            .and_then(|person| person.email.as_deref().or(person.display_name.as_deref())),
        "tags": item.tag_list(),
        "relations": item.relations.len(),
    })
}
