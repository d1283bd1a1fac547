use std::fmt;

use serde::{Deserialize, Serialize};

use super::JobId;

/// Location of a staged document blob inside the staging store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoragePath(String);

impl StoragePath {
    pub fn new(job_id: &JobId, filename: &str) -> Self {
        let safe: String = filename
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        let safe = if safe.trim().is_empty() {
            "document".to_string()
        } else {
            safe
        };
        Self(format!("{}/{}", job_id.as_uuid(), safe))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
