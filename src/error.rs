use thiserror::Error;

/// Main error type for relgraph
#[derive(Error, Debug)]
pub enum RelgraphError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A required request field was empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Timestamp string that is not an integer
    #[error("Invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Duration string that does not follow the `1h30m` grammar
    #[error("Invalid duration: {0:?}")]
    InvalidDuration(String),

    /// PathFinder exhausted the schema without a single admissible path
    #[error("no paths found from {source_type} to {target_type} through {path_resource:?}")]
    NoPathsFound {
        source_type: String,
        target_type: String,
        path_resource: Vec<String>,
    },

    /// Graph query executor failures
    #[error("Executor error: {0}")]
    Executor(String),

    /// Response shape errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// JSON decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result type using RelgraphError
pub type Result<T> = std::result::Result<T, RelgraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelgraphError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_no_paths_found_mentions_endpoints() {
        let err = RelgraphError::NoPathsFound {
            source_type: "pod".to_string(),
            target_type: "biz".to_string(),
            path_resource: vec!["node".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("no paths found"));
        assert!(msg.contains("pod"));
        assert!(msg.contains("biz"));
        assert!(msg.contains("node"));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: RelgraphError = json_err.into();
        assert!(matches!(err, RelgraphError::Json(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RelgraphError = io_err.into();
        assert!(matches!(err, RelgraphError::Io(_)));
    }
}
