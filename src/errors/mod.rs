pub mod types;

pub use types::{AppError, SourceError, WebError};

/// Convenience result alias used throughout the application.
pub type AppResult<T> = Result<T, AppError>;
