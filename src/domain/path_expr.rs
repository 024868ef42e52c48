use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// One step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Declarative locator into a JSON document.
///
/// Accepts the JSONPath subset used by field declarations:
/// `$.fields.id`, `$['fields']['System.Title']`, `$["a"][0]`, `$.['data']`.
/// A path without the `$` root marker is relative to the root, so
/// `displayName` and `$.displayName` are the same locator. The empty string
/// and `$` both denote the whole document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathExpr {
    segments: Vec<PathSegment>,
}

impl PathExpr {
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, PathExprError> {
        if input.is_empty() {
            return Ok(Self::root());
        }
        let body = match input.strip_prefix('$') {
            Some(rest) => rest.to_string(),
            None => format!(".{input}"),
        };
        let segments = SegmentParser::new(input, body.as_str()).parse()?;
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Walks the document; `None` means the path does not exist.
    ///
    /// A present JSON `null` resolves to `Some(&Value::Null)`.
    pub fn resolve<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(document, |node, segment| match (segment, node) {
                (PathSegment::Key(key), Value::Object(map)) => map.get(key),
                (PathSegment::Index(index), Value::Array(items)) => items.get(*index),
                _ => None,
            })
    }

    /// RFC 6901 pointer for the same location (`/fields/System.Title`).
    pub fn to_wire_path(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                PathSegment::Key(key) => out.push_str(&escape_pointer_token(key)),
                PathSegment::Index(index) => out.push_str(&index.to_string()),
            }
        }
        out
    }

    /// Writes `value` at this path, creating intermediate objects.
    ///
    /// Returns `false` when the path crosses an array index or a non-object
    /// node, leaving `document` untouched. Assigning at the root replaces the
    /// whole document.
    pub fn assign(&self, document: &mut Value, value: Value) -> bool {
        let Some((last, parents)) = self.segments.split_last() else {
            *document = value;
            return true;
        };
        if self
            .segments
            .iter()
            .any(|segment| matches!(segment, PathSegment::Index(_)))
        {
            return false;
        }

        let mut node = document;
        for segment in parents {
            let PathSegment::Key(key) = segment else {
                return false;
            };
            if node.is_null() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else {
                return false;
            };
            node = map
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }

        if node.is_null() {
            *node = Value::Object(Map::new());
        }
        match (last, node) {
            (PathSegment::Key(key), Value::Object(map)) => {
                map.insert(key.clone(), value);
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("$")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => {
                    let encoded = serde_json::to_string(key).map_err(|_| fmt::Error)?;
                    write!(formatter, "[{encoded}]")?;
                }
                PathSegment::Index(index) => {
                    write!(formatter, "[{index}]")?;
                }
            }
        }
        Ok(())
    }
}

fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

struct SegmentParser<'a> {
    input: &'a str,
    body: &'a str,
    cursor: usize,
}

impl<'a> SegmentParser<'a> {
    fn new(input: &'a str, body: &'a str) -> Self {
        Self {
            input,
            body,
            cursor: 0,
        }
    }

    fn parse(mut self) -> Result<Vec<PathSegment>, PathExprError> {
        let mut segments = Vec::new();
        while let Some(next) = self.peek() {
            match next {
                '.' => {
                    self.cursor += 1;
                    if self.peek() == Some('[') {
                        continue;
                    }
                    segments.push(PathSegment::Key(self.dotted_name()?));
                }
                '[' => {
                    self.cursor += 1;
                    segments.push(self.bracketed()?);
                }
                other => {
                    return Err(self.error(format!(
                        "unexpected `{other}` at byte {}",
                        self.cursor
                    )));
                }
            }
        }
        Ok(segments)
    }

    fn peek(&self) -> Option<char> {
        self.body[self.cursor..].chars().next()
    }

    fn dotted_name(&mut self) -> Result<String, PathExprError> {
        let body = self.body;
        let rest = &body[self.cursor..];
        let end = rest.find(['.', '[']).unwrap_or(rest.len());
        if end == 0 {
            return Err(self.error(format!("empty key at byte {}", self.cursor)));
        }
        self.cursor += end;
        Ok(rest[..end].to_string())
    }

    fn bracketed(&mut self) -> Result<PathSegment, PathExprError> {
        let segment = match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.cursor += 1;
                PathSegment::Key(self.quoted(quote)?)
            }
            Some(digit) if digit.is_ascii_digit() => PathSegment::Index(self.index()?),
            Some(_) => {
                return Err(self.error(format!(
                    "expected quoted key or numeric index at byte {}",
                    self.cursor
                )));
            }
            None => return Err(self.error("path cannot end inside `[`".to_string())),
        };
        if self.peek() != Some(']') {
            return Err(self.error(format!("expected `]` at byte {}", self.cursor)));
        }
        self.cursor += 1;
        Ok(segment)
    }

    fn quoted(&mut self, quote: char) -> Result<String, PathExprError> {
        let mut key = String::new();
        let mut escaped = false;
        let body = self.body;
        for ch in body[self.cursor..].chars() {
            self.cursor += ch.len_utf8();
            if escaped {
                key.push(ch);
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                return Ok(key);
            } else {
                key.push(ch);
            }
        }
        Err(self.error("unterminated quoted key".to_string()))
    }

    fn index(&mut self) -> Result<usize, PathExprError> {
        let body = self.body;
        let rest = &body[self.cursor..];
        let end = rest
            .find(|ch: char| !ch.is_ascii_digit())
            .unwrap_or(rest.len());
        self.cursor += end;
        rest[..end]
            .parse::<usize>()
            .map_err(|error| self.error(format!("invalid index: {error}")))
    }

    fn error(&self, reason: String) -> PathExprError {
        PathExprError::new(self.input, reason)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid path expression `{input}`: {reason}")]
pub struct PathExprError {
    input: String,
    reason: String,
}

impl PathExprError {
    fn new(input: &str, reason: String) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}
