use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid trading configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
