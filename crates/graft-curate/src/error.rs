//! Error types for the graft-curate crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CurateError {
    #[error("Store error: {0}")]
    Store(#[from] graft_store::StoreError),

    #[error("Proposer error: {0}")]
    Propose(String),
}

pub type Result<T> = std::result::Result<T, CurateError>;
