use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WhiskerError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Invalid settings: {}", FieldErrors(.0))]
    InvalidSettings(Vec<FieldError>),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}

/// A single rejected settings field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

struct FieldErrors<'a>(&'a [FieldError]);

impl fmt::Display for FieldErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl WhiskerError {
    /// Names of the settings fields that failed validation, if any.
    pub fn invalid_fields(&self) -> Vec<&str> {
        match self {
            Self::InvalidSettings(errors) => errors.iter().map(|e| e.field.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WhiskerError>;
