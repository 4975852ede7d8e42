//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts to tell a bad photo from a missing file or model.

use whisker_core::WhiskerError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Invalid arguments or settings.
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (undecodable image, malformed catalog or signature).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Model weights could not be loaded.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const UNAVAILABLE: i32 = 69;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Library errors carry their own classification
        let library = err.chain().find_map(|e| e.downcast_ref::<WhiskerError>());
        let code = match library {
            Some(WhiskerError::InvalidSettings(_)) => USAGE_ERROR,
            Some(WhiskerError::ImageDecode(_) | WhiskerError::InvalidSignature(_)) => DATA_ERROR,
            Some(WhiskerError::ModelUnavailable(_)) => UNAVAILABLE,
            None => classify_message(&message),
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

fn classify_message(message: &str) -> i32 {
    if message.contains("Failed to read") {
        INPUT_ERROR
    } else if message.contains("Failed to parse") || message.contains("No references") {
        DATA_ERROR
    } else if message.contains("Failed to write") || message.contains("serialize") {
        IO_ERROR
    } else {
        GENERAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use whisker_core::FieldError;

    #[test]
    fn test_library_errors_take_precedence() {
        let err = Err::<(), _>(WhiskerError::ImageDecode("bad".into()))
            .context("Failed to read image")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, DATA_ERROR);

        let err = anyhow::Error::new(WhiskerError::InvalidSettings(vec![FieldError::new(
            "threshold",
            "must be between 0 and 1 (exclusive)",
        )]));
        assert_eq!(ExitCode::from_anyhow(&err).code, USAGE_ERROR);

        let err = anyhow::Error::new(WhiskerError::ModelUnavailable("gone".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, UNAVAILABLE);
    }

    #[test]
    fn test_message_classification() {
        assert_eq!(classify_message("Failed to read catalog: x"), INPUT_ERROR);
        assert_eq!(classify_message("Failed to parse catalog: x"), DATA_ERROR);
        assert_eq!(classify_message("Failed to write event: x"), IO_ERROR);
        assert_eq!(classify_message("something else"), GENERAL_ERROR);
    }
}
