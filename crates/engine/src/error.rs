use core_types::PositionId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown position id: {0}")]
    UnknownPosition(PositionId),

    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
