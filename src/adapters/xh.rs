use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use serde_json::{Value, json};
use tempfile::NamedTempFile;

use crate::adapters::{HttpRequest, HttpResponse, Transport, TransportError};

pub const DEFAULT_XH_BIN: &str = "xh";

/// Headers kept off the command line, where other users could read them.
const SESSION_HEADERS: &[&str] = &["authorization"];

fn is_session_header(name: &str) -> bool {
    SESSION_HEADERS
        .iter()
        .any(|candidate| name.eq_ignore_ascii_case(candidate))
}

/// Transport that runs one `xh` child process per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XhTransport {
    bin: String,
}

impl XhTransport {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    fn command_args(request: &HttpRequest, session: Option<&Path>) -> Vec<String> {
        let mut args = vec![
            "--ignore-stdin".to_string(),
            "--pretty=none".to_string(),
            "--print=hb".to_string(),
        ];
        if let Some(path) = session {
            args.push(format!("--session-read-only={}", path.display()));
        }
        args.push(request.method.as_str().to_string());
        args.push(request.url.clone());
        for (name, value) in &request.query {
            args.push(format!("{name}=={value}"));
        }
        for (name, value) in &request.headers {
            if !is_session_header(name) {
                args.push(format!("{name}:{value}"));
            }
        }
        if let Some(body) = request.body.as_ref() {
            args.push("--raw".to_string());
            args.push(body.clone());
        }
        args
    }
}

/// Session document carrying the credential headers of `request`.
fn session_document(request: &HttpRequest) -> Option<Value> {
    let headers: Vec<Value> = request
        .headers
        .iter()
        .filter(|(name, _)| is_session_header(name))
        .map(|(name, value)| json!({"name": name, "value": value}))
        .collect();
    if headers.is_empty() {
        return None;
    }
    Some(json!({
        "__meta__": {"about": "xh session file"},
        "auth": {"type": null, "username": null, "password": null},
        "cookies": [],
        "headers": headers,
    }))
}

/// Writes the session to a temporary file, owner read/write only on unix.
/// The file is removed when the returned handle drops.
fn write_session(request: &HttpRequest) -> Result<Option<NamedTempFile>, TransportError> {
    let Some(document) = session_document(request) else {
        return Ok(None);
    };
    let mut file = NamedTempFile::new().map_err(TransportError::Session)?;
    serde_json::to_writer(file.as_file_mut(), &document)
        .map_err(|error| TransportError::Session(error.into()))?;
    file.flush().map_err(TransportError::Session)?;
    Ok(Some(file))
}

impl Default for XhTransport {
    fn default() -> Self {
        Self::new(DEFAULT_XH_BIN)
    }
}

impl Transport for XhTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        tracing::debug!(
            method = request.method.as_str(),
            url = %request.url,
            query = request.query.len(),
            bin = %self.bin,
            "sending request"
        );
        let session = write_session(request)?;
        let args = Self::command_args(request, session.as_ref().map(NamedTempFile::path));
        let output = match Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child
                .wait_with_output()
                .map_err(|source| TransportError::Spawn {
                    bin: self.bin.clone(),
                    source,
                })?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransportError::Unavailable {
                    bin: self.bin.clone(),
                });
            }
            Err(source) => {
                return Err(TransportError::Spawn {
                    bin: self.bin.clone(),
                    source,
                });
            }
        };
        drop(session);

        if !output.status.success() {
            let stderr = String::from_utf8(output.stderr)
                .unwrap_or_else(|_| "failed to decode stderr".to_string());
            tracing::warn!(bin = %self.bin, status = ?output.status.code(), "http client failed");
            return Err(TransportError::Execution {
                bin: self.bin.clone(),
                message: stderr.trim().to_string(),
            });
        }

        let response = parse_response(&output.stdout)?;
        tracing::debug!(status = response.status, bytes = response.body.len(), "received response");
        Ok(response)
    }
}

fn parse_response(raw: &[u8]) -> Result<HttpResponse, TransportError> {
    let text = std::str::from_utf8(raw).map_err(TransportError::OutputDecode)?;
    let normalized = text.replace("\r\n", "\n");
    let (head, body) = split_head_and_body(normalized.as_str());

    let mut lines = head.lines();
    let status_line = lines
        .next()
        .ok_or_else(|| TransportError::Parse("missing HTTP status line".to_string()))?;
    let status = parse_status_line(status_line)?;

    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (name, value) = trimmed
            .split_once(':')
            .ok_or_else(|| TransportError::Parse(format!("invalid header line `{trimmed}`")))?;
        let key = name.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(TransportError::Parse("header name cannot be empty".to_string()));
        }
        let value = value.trim().to_string();
        headers
            .entry(key)
            .and_modify(|existing| {
                if !existing.is_empty() {
                    existing.push_str(", ");
                }
                existing.push_str(value.as_str());
            })
            .or_insert(value);
    }

    Ok(HttpResponse {
        status,
        headers,
        body: body.to_string(),
    })
}

fn split_head_and_body(input: &str) -> (&str, &str) {
    input.split_once("\n\n").unwrap_or((input, ""))
}

fn parse_status_line(status_line: &str) -> Result<u16, TransportError> {
    let mut tokens = status_line.split_ascii_whitespace();
    let http_version = tokens
        .next()
        .ok_or_else(|| TransportError::Parse("missing HTTP version in status line".to_string()))?;
    if !http_version.starts_with("HTTP/") {
        return Err(TransportError::Parse(format!(
            "status line must start with HTTP version, got `{status_line}`"
        )));
    }
    let status_raw = tokens
        .next()
        .ok_or_else(|| TransportError::Parse("missing status code in status line".to_string()))?;
    status_raw
        .parse::<u16>()
        .map_err(|_| TransportError::Parse(format!("invalid status code `{status_raw}`")))
}
