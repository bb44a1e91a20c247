//! Parse errors for the value types in this crate.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("identity must not be empty")]
    EmptyIdentity,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
