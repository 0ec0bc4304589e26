//! LUT file-format error types.

use thiserror::Error;

use xform_ops::OpError;

/// Result type for LUT file operations.
pub type LutResult<T> = Result<T, LutError>;

/// Errors raised while reading or writing LUT files.
#[derive(Debug, Error)]
pub enum LutError {
    /// A single line could not be parsed.
    ///
    /// Carries the file name, the 1-based line number and the offending
    /// line text.
    #[error("error parsing .cube file '{file}' at line {line}: '{content}': {reason}")]
    Parse {
        /// File name (or a placeholder for in-memory readers).
        file: String,
        /// 1-based line number.
        line: usize,
        /// The offending line text.
        content: String,
        /// What went wrong.
        reason: String,
    },

    /// A whole-file consistency check failed after parsing.
    ///
    /// No single line is at fault (e.g. a triplet-count mismatch), so no
    /// line number is reported.
    #[error("error parsing .cube file '{file}': {reason}")]
    Consistency {
        /// File name (or a placeholder for in-memory readers).
        file: String,
        /// What went wrong.
        reason: String,
    },

    /// The parsed data failed operation validation.
    #[error("LUT op error: {0}")]
    Op(#[from] OpError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LutError {
    /// Creates a [`LutError::Parse`] error.
    pub fn parse(
        file: impl Into<String>,
        line: usize,
        content: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Parse {
            file: file.into(),
            line,
            content: content.into(),
            reason: reason.into(),
        }
    }

    /// Creates a [`LutError::Consistency`] error.
    pub fn consistency(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Consistency {
            file: file.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_line() {
        let err = LutError::parse("grade.cube", 12, "LUT_2D_SIZE 4", "unsupported tag");
        let msg = err.to_string();
        assert!(msg.contains("grade.cube"));
        assert!(msg.contains("12"));
        assert!(msg.contains("LUT_2D_SIZE 4"));
    }

    #[test]
    fn test_consistency_error_has_no_line() {
        let err = LutError::consistency("grade.cube", "incorrect number of entries");
        assert!(!err.to_string().contains("line"));
    }
}
