use std::time::Duration;

/// MeteoBridge bridge error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(std::io::Error),

    #[error("Timed out after {0:?} waiting for the device")]
    Timeout(Duration),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("<{tag}> is missing attribute '{attribute}'")]
    MissingAttribute {
        tag: String,
        attribute: &'static str,
    },

    #[error("<{tag}> attribute '{attribute}' is not a number: '{value}'")]
    InvalidAttribute {
        tag: String,
        attribute: &'static str,
        value: String,
    },

    #[error("Unknown channel '{channel}' for category {category}")]
    UnknownChannel { category: String, channel: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Zenoh error: {0}")]
    Zenoh(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<zenoh::Error> for Error {
    fn from(err: zenoh::Error) -> Self {
        Error::Zenoh(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
