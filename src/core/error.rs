use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No suite handles URL: {0}")]
    UnhandledUrl(String),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Video was deleted: {0}")]
    VideoDeleted(String),

    #[error("Capability not supported: {0}")]
    CapabilityUnsupported(String),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Suite registered twice: {0}")]
    DuplicateSuite(String),

    #[error("Unknown suite: {0}")]
    UnknownSuite(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn field_not_found(field: impl Into<String>) -> Self {
        Error::FieldNotFound(field.into())
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        Error::CapabilityUnsupported(what.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(format!("invalid JSON: {}", err))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Parse(format!("invalid XML: {}", err))
    }
}

impl From<chrono::ParseError> for Error {
    fn from(err: chrono::ParseError) -> Self {
        Error::Parse(format!("invalid date: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
