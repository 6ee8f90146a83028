use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExifToolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ExifTool not found or not runnable. path={path}, reason={reason}")]
    ExifToolNotFound { path: String, reason: String },

    #[error("ExifTool {version} does not support {feature}. path={path}")]
    UnsupportedFeature {
        path: String,
        version: String,
        feature: String,
    },

    #[error("Failed to start process. command={command}")]
    ProcessStart {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Communication with exiftool failed. path={path}")]
    Protocol {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("Invalid version '{value}': {reason}")]
    InvalidVersion { value: String, reason: String },

    #[error("Deserialization error at path '{path}': {source}")]
    Deserialization {
        path: String,
        source: serde_json::Error,
    },
}

impl From<serde_path_to_error::Error<serde_json::Error>> for ExifToolError {
    fn from(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        ExifToolError::Deserialization {
            path: err.path().to_string(),
            source: err.into_inner(),
        }
    }
}
