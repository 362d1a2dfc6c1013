//! Error types for building and configuring the client

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Missing setting: {0}")]
    MissingSetting(&'static str),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
