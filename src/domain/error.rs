use std::path::PathBuf;

use thiserror::Error;

use crate::adapters::TransportError;

/// Errors produced while resolving connection settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML or has unknown keys.
    #[error("failed to parse config file `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// No organization/project URL from flags, environment or config file.
    #[error("missing service url; pass --url, set DEVOPS_HELPER_URL or add `url` to the config file")]
    MissingUrl,

    /// No personal access token from flags, environment or config file.
    #[error("missing access token; pass --token, set DEVOPS_HELPER_TOKEN or add `token` to the config file")]
    MissingToken,

    /// Service url is not an absolute `http(s)://host/.../project` url.
    #[error("invalid service url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: &'static str },
}

/// Errors produced by the service client boundary.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced an HTTP response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The service answered with a non-2xx status.
    #[error("request to `{url}` failed with HTTP {status}: {body}")]
    Status { status: u16, url: String, body: String },

    /// The response body is not JSON.
    #[error("failed to parse response from `{url}`: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The response JSON lacks a member the client relies on.
    #[error("response from `{url}` has no `{member}` member")]
    MissingMember { url: String, member: &'static str },

    /// A saved work item without an id cannot be addressed.
    #[error("work item has a snapshot but no id")]
    MissingId,

    /// A new work item must name its type to be created.
    #[error("new work item has no work item type")]
    MissingType,

    /// Patch document could not be serialized.
    #[error("failed to serialize patch: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl ClientError {
    /// `true` for HTTP 409/412, the statuses returned when the `test /rev`
    /// guard or a concurrent write rejects the patch.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Status { status: 409 | 412, .. })
    }
}
