use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    StorageError(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Password hashing error: {0}")]
    PasswordHashError(String),

    // Caller bug: bad field path, wrong value type or unsupported relation
    #[error("Malformed query: {0}")]
    MalformedQuery(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::ConfigurationError(err.to_string())
    }
}

impl From<std::net::AddrParseError> for Error {
    fn from(err: std::net::AddrParseError) -> Self {
        Error::ConfigurationError(err.to_string())
    }
}
