use thiserror::Error;

/// Main error type for RelMcp
#[derive(Error, Debug)]
pub enum RelmcpError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or missing caller parameter, raised before any I/O
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The graph store could not be reached; callers may retry
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Parse errors (stored payloads, import files)
    #[error("Parse error: {0}")]
    Parse(String),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    McpProtocol(String),

    /// An error annotated with the operation that produced it
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<RelmcpError>,
    },
}

/// Coarse classification used by transports to pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    StoreUnavailable,
    Internal,
}

impl RelmcpError {
    /// Kind of the innermost error, looking through context layers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelmcpError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            RelmcpError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            RelmcpError::Context { source, .. } => source.kind(),
            _ => ErrorKind::Internal,
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        RelmcpError::InvalidArgument(msg.into())
    }

    pub fn with_context(self, context: impl Into<String>) -> Self {
        RelmcpError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Attach operation context to a failing result.
pub trait ResultExt<T> {
    fn context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

/// Convenient Result type using RelmcpError
pub type Result<T> = std::result::Result<T, RelmcpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelmcpError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: RelmcpError = rusqlite_err.into();
        assert!(matches!(err, RelmcpError::Database(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_context_preserves_kind() {
        let res: Result<()> = Err(RelmcpError::invalid("depth must be positive"));
        let err = res.context(|| "related_similar(article_key=a1)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let text = err.to_string();
        assert!(text.starts_with("related_similar(article_key=a1)"));
        assert!(text.contains("depth must be positive"));
    }

    #[test]
    fn test_store_unavailable_kind() {
        let err = RelmcpError::StoreUnavailable("cannot open".into()).with_context("outer");
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    }
}
