use std::path::{Path, PathBuf};
use thiserror::Error;

/// error handling for a single step launch
#[derive(Debug, Error)]
pub enum StepError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Engine not found: {0}")]
    EngineNotFound(String),
    #[error("Step not found: {step} (available: {})", format_available(.available))]
    StepNotFound { step: String, available: Vec<String> },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Link conflict: {} already exists and does not point to {}", .link.display(), .target.display())]
    LinkConflict { link: PathBuf, target: PathBuf },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".into()
    } else {
        available.join(", ")
    }
}

/// argument validation
pub fn validate_file(path: &Path) -> Result<(), StepError> {
    if !path.is_file() {
        return Err(StepError::FileNotFound(path.to_path_buf()));
    }

    Ok(())
}

/// Parse and validate an identifier [a-zA-Z0-9_-]+ of at most 64 characters.
pub fn validate_id(id: &str) -> Result<String, StepError> {
    if id.is_empty() {
        return Err(StepError::InvalidInput("identifier cannot be empty".into()));
    }

    if id.len() > crate::consts::MAX_ID_LEN {
        return Err(StepError::InvalidInput(format!(
            "'{}' must be {} characters or less",
            id,
            crate::consts::MAX_ID_LEN
        )));
    }

    if !id
        .chars()
        .all(|c| matches!(c, '0'..='9' | 'A'..='Z' | 'a'..='z' | '_' | '-'))
    {
        return Err(StepError::InvalidInput(format!(
            "'{}' must contain only letters, digits, underscores, and dashes",
            id
        )));
    }

    Ok(id.to_string())
}
