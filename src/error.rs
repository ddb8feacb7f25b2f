/// Error types for the page normalizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    /// The page text could not be split into a consistent section tree
    Structural(String),
    /// A tree operation would break a level or LangSection invariant
    InvariantViolation(String),
    /// Template nesting is deeper than the configured limit
    MaxTemplateDepthExceeded { depth: usize, limit: usize },
    /// Opening and closing delimiters do not pair up in a text block
    UnbalancedDelimiters(String),
    /// No Catgram descriptor is known under the given surface form
    UnknownDescriptor(String),
    /// Error while loading or parsing configuration resources
    Config(String),
    /// Error while reading or writing page text
    Io(String),
}

impl std::fmt::Display for EditorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditorError::Structural(msg) => write!(f, "Structural error: {}", msg),
            EditorError::InvariantViolation(msg) => write!(f, "Invariant violation: {}", msg),
            EditorError::MaxTemplateDepthExceeded { depth, limit } => write!(
                f,
                "Maximum template depth exceeded: {} (limit {})",
                depth, limit
            ),
            EditorError::UnbalancedDelimiters(msg) => write!(f, "Unbalanced delimiters: {}", msg),
            EditorError::UnknownDescriptor(msg) => write!(f, "Unknown descriptor: {}", msg),
            EditorError::Config(msg) => write!(f, "Configuration error: {}", msg),
            EditorError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for EditorError {}

impl From<std::io::Error> for EditorError {
    fn from(e: std::io::Error) -> Self {
        EditorError::Io(e.to_string())
    }
}

impl EditorError {
    /// Fatal errors abort the whole pipeline run for a page.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EditorError::Structural(_)
                | EditorError::InvariantViolation(_)
                | EditorError::MaxTemplateDepthExceeded { .. }
                | EditorError::UnbalancedDelimiters(_)
        )
    }
}

/// Result type for normalizer operations
pub type EditorResult<T> = Result<T, EditorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = EditorError::MaxTemplateDepthExceeded { depth: 3, limit: 2 };
        assert_eq!(
            err.to_string(),
            "Maximum template depth exceeded: 3 (limit 2)"
        );
        assert_eq!(
            EditorError::UnknownDescriptor("foo".to_string()).to_string(),
            "Unknown descriptor: foo"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(EditorError::Structural("x".into()).is_fatal());
        assert!(EditorError::UnbalancedDelimiters("x".into()).is_fatal());
        assert!(!EditorError::UnknownDescriptor("x".into()).is_fatal());
        assert!(!EditorError::Config("x".into()).is_fatal());
    }
}
