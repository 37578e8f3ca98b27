use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("JSON (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unparsable date in {field}: {value:?}")]
    InvalidDate { field: String, value: String },

    #[error("Date out of supported range: {0}")]
    DateOutOfRange(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, CompilerError>;
