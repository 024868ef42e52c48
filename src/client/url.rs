use std::fmt;

use crate::domain::error::ConfigError;

pub const WORK_ITEM_API_VERSION: &str = "6.0";
pub const TEST_RESULT_WORK_ITEMS_API_VERSION: &str = "5.1-preview.1";

/// Project-scoped service url such as `https://org.visualstudio.com/Project`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevOpsUrl {
    base: String,
}

impl DevOpsUrl {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason,
        };
        let base = raw.trim().trim_end_matches('/');
        let Some((_, rest)) = base.split_once("://") else {
            return Err(invalid("expected an absolute http(s) url"));
        };
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(invalid("expected an absolute http(s) url"));
        }
        match rest.split_once('/') {
            Some((host, path)) if !host.is_empty() && !path.is_empty() => Ok(Self {
                base: base.to_string(),
            }),
            _ => Err(invalid("url must end with a project path segment")),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Last path segment of the url.
    pub fn project(&self) -> &str {
        self.split_project().1
    }

    /// Everything before the project segment.
    pub fn organization_url(&self) -> &str {
        self.split_project().0
    }

    /// Analytics host: `analytics.` is inserted after the first `.` of the url.
    /// Urls without a dot (local test servers) are returned unchanged.
    pub fn analytics_url(&self) -> String {
        match self.base.find('.') {
            Some(index) => {
                let (head, tail) = self.base.split_at(index + 1);
                format!("{head}analytics.{tail}")
            }
            None => self.base.clone(),
        }
    }

    pub fn work_item(&self, id: i64) -> String {
        format!("{}/_apis/wit/workitems/{id}", self.base)
    }

    pub fn work_items(&self) -> String {
        format!("{}/_apis/wit/workItems", self.base)
    }

    pub fn new_work_item(&self, work_item_type: &str) -> String {
        format!("{}/_apis/wit/workitems/${work_item_type}", self.base)
    }

    pub fn wiql(&self, query_id: &str) -> String {
        format!("{}/_apis/wit/wiql/{query_id}", self.base)
    }

    pub fn test_result_work_items(&self) -> String {
        format!("{}/_apis/test/Results/WorkItems", self.base)
    }

    pub fn analytics_test_results(&self) -> String {
        format!("{}/_odata/v4.0-preview/TestResults", self.analytics_url())
    }

    fn split_project(&self) -> (&str, &str) {
        self.base
            .rsplit_once('/')
            .unwrap_or((self.base.as_str(), ""))
    }
}

impl fmt::Display for DevOpsUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}
