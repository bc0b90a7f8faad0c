use std::io;

/// Errors surfaced by the classifier-system engine.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum Error {
    /// Out-of-range parameter, malformed variant selector, or unknown key.
    #[display("configuration error: {_0}")]
    #[from(ignore)]
    Config(#[error(not(source))] String),
    /// Input of the wrong width for the configured dimensions.
    #[display("dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },
    /// I/O failure while saving or loading a population snapshot.
    #[display("snapshot I/O failed: {_0}")]
    Io(io::Error),
    /// Malformed snapshot contents (bad magic, version, or variant tag).
    #[display("snapshot format error: {_0}")]
    #[from(ignore)]
    Snapshot(#[error(not(source))] String),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub(crate) fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category() {
        let err = Error::config("POP_SIZE must be at least 1");
        assert_eq!(
            err.to_string(),
            "configuration error: POP_SIZE must be at least 1"
        );

        let err = Error::Dimension {
            expected: 6,
            actual: 4,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 6, got 4");
    }
}
