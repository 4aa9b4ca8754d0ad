//! Errors raised while loading a target file.
//!
//! Every variant carries the 1-based line of the input where the problem was
//! found. Loading is all-or-nothing: the first error ends the load and no
//! endpoints are handed back.
use std::io;
use thiserror::Error;

/// A fatal problem in the target file.
#[derive(Debug, Error)]
pub enum SpecError {
    /// An address bound contains an unexpected character or does not
    /// decode as a dotted quad.
    #[error("line {line}: malformed address '{token}'")]
    MalformedAddress { line: usize, token: String },

    /// A port bound contains an unexpected character or is empty.
    #[error("line {line}: malformed port '{token}'")]
    MalformedPort { line: usize, token: String },

    /// The left address bound is greater than the right one.
    #[error("line {line}: address range {start}-{end} is reversed")]
    InvalidAddressRange {
        line: usize,
        start: String,
        end: String,
    },

    /// A port bound is out of range or the bounds are reversed.
    #[error("line {line}: invalid port range {start}-{end}")]
    InvalidPortRange {
        line: usize,
        start: String,
        end: String,
    },

    /// A `timeout` directive whose value is not an integer of at least 1.
    #[error("line {line}: invalid timeout '{value}', expected whole seconds >= 1")]
    InvalidTimeout { line: usize, value: String },

    /// A `port` directive whose value is not an integer in `0..=65535`.
    #[error("line {line}: invalid default port '{value}'")]
    InvalidPort { line: usize, value: String },

    /// A directive line without a value.
    #[error("line {line}: directive '{key}' has no value")]
    EmptyDirectiveValue { line: usize, key: String },

    /// Expanding a record would grow the endpoint set past the configured cap.
    #[error("line {line}: target set exceeds the limit of {limit} endpoints")]
    RangeTooLarge { line: usize, limit: usize },

    /// The underlying reader failed.
    #[error("line {line}: failed to read targets")]
    Io {
        line: usize,
        #[source]
        source: io::Error,
    },
}

impl SpecError {
    /// The 1-based input line the error refers to.
    pub fn line(&self) -> usize {
        match self {
            Self::MalformedAddress { line, .. }
            | Self::MalformedPort { line, .. }
            | Self::InvalidAddressRange { line, .. }
            | Self::InvalidPortRange { line, .. }
            | Self::InvalidTimeout { line, .. }
            | Self::InvalidPort { line, .. }
            | Self::EmptyDirectiveValue { line, .. }
            | Self::RangeTooLarge { line, .. }
            | Self::Io { line, .. } => *line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SpecError;

    #[test]
    fn message_names_the_line() {
        let err = SpecError::MalformedAddress {
            line: 7,
            token: "10.0.0".to_owned(),
        };
        assert_eq!(err.line(), 7);
        assert_eq!(err.to_string(), "line 7: malformed address '10.0.0'");
    }
}
