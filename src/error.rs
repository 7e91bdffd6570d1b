use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IpaLinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Plist error: {0}")]
    Plist(#[from] plist::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Upload failed: {0}")]
    Upload(String),
}

impl From<ureq::Error> for IpaLinkError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, response) => {
                let body = response.into_string().unwrap_or_default();
                IpaLinkError::Http(format!("status {}: {}", code, body.trim()))
            }
            ureq::Error::Transport(transport) => IpaLinkError::Http(transport.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, IpaLinkError>;
