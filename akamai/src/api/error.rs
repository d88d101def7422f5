use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::edgegrid::EdgegridError;

/// RFC 7807 problem details returned by Akamai APIs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(rename = "type", default)]
    pub problem_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub instance: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<serde_json::Value>,
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Title: {}; Type: {}; Detail: {}",
            self.title, self.problem_type, self.detail
        )?;
        if !self.errors.is_empty() {
            let errors = serde_json::to_string(&self.errors).unwrap_or_default();
            write!(f, "; Errors: {}", errors)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API error (HTTP {status}): {problem}")]
    Problem { status: u16, problem: Box<Problem> },

    #[error("API returned error (HTTP {status}): {message}")]
    Unexpected { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Edgegrid(#[from] EdgegridError),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Problem { status, .. } | ApiError::Unexpected { status, .. } => Some(*status),
            ApiError::NotFound(_) => Some(404),
            _ => None,
        }
    }
}
