use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Keystore error: {0}")]
    KeyStore(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model not available for selection: {0}")]
    ModelNotAvailable(String),

    #[error("A model refresh is already in progress")]
    RefreshInProgress,

    #[error("Runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SettingsError::RefreshInProgress;
        assert_eq!(err.to_string(), "A model refresh is already in progress");

        let err = SettingsError::ModelNotAvailable("llama3".to_string());
        assert!(err.to_string().contains("llama3"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: SettingsError = io.into();
        assert!(matches!(err, SettingsError::Io(_)));
    }
}
