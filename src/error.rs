use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Unknown label: {0:?} is not in the practice alphabet")]
    UnknownLabel(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Decode(format!("invalid base64 payload: {err}"))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl Error {
    /// Whether the failure was caused by the caller's request rather than by
    /// the pipeline itself.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::UnknownLabel(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
