use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("credential store error: {0}")]
    Keyring(#[from] keyring::Error),
    #[error("invalid identifier pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("unknown credential slot: {0}")]
    UnknownSlot(String),
    #[error("invalid command arguments: {0}")]
    Arguments(String),
}

pub type Result<T> = std::result::Result<T, Error>;
