//! Global error handling for ctxpack
//!
//! Only configuration problems and an unusable output budget are errors.
//! Everything that can go wrong for a single file is carried as a
//! [`SoftError`](crate::types::SoftError) on the result instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Global error type for ctxpack operations
#[derive(Error, Debug)]
pub enum PackError {
    /// File system errors outside of per-file processing
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A CLI include/exclude glob failed to compile
    #[error("Invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: ignore::Error,
    },

    /// Scan root does not exist
    #[error("Root directory not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// Scan root exists but is not a directory
    #[error("Root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Output budget cannot hold even a single unit of output
    #[error("Output budget of {budget} bytes is too small; at least {required} bytes are required")]
    BudgetTooSmall { budget: usize, required: usize },

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// JSON processing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Specialized Result type for ctxpack operations
pub type Result<T> = std::result::Result<T, PackError>;

/// Creates a PackError with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::PackError::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}

impl PackError {
    /// Whether the error stems from caller-supplied configuration
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            PackError::Config(_)
                | PackError::InvalidPattern { .. }
                | PackError::RootNotFound(_)
                | PackError::NotADirectory(_)
        )
    }
}

// Allow converting PackError to io::Error for the binary's main signature
impl From<PackError> for io::Error {
    fn from(err: PackError) -> Self {
        match err {
            PackError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}
