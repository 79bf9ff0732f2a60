use std::path::PathBuf;

/// Errors that can occur while counting, classifying or filtering read pairs.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("invalid parameter: {0}")]
    Parameter(String),

    #[error("I/O error: {source} ({path})")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("malformed read-pair line {line}: {message}")]
    Parse {
        line: usize,
        message: String,
    },

    #[error("mask table error: {0}")]
    Csv(#[from] csv::Error),
}

impl FilterError {
    /// Convenience for wrapping an `io::Error` with a path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for FilterError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            source: err,
            path: PathBuf::from("<unknown>"),
        }
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;
