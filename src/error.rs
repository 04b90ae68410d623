use crate::datastructure::LengthMismatchError;
use crate::entity::{AutoDetectError, SpanNotFoundError};
use crate::metrics::DivisionByZeroError;
use crate::schemes::MalformedTagError;
use crate::voter::TokenMismatchError;
use thiserror::Error;

/// Every failure the crate can report. Each of them is fatal to the sentence or the operation
/// it happened in.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnsembleError {
    #[error(transparent)]
    MalformedTag(#[from] MalformedTagError),
    #[error(transparent)]
    LengthMismatch(#[from] LengthMismatchError),
    #[error(transparent)]
    TokenMismatch(#[from] TokenMismatchError),
    #[error(transparent)]
    SpanNotFound(#[from] SpanNotFoundError),
    #[error(transparent)]
    AutoDetect(#[from] AutoDetectError),
    #[error(transparent)]
    DivisionByZero(#[from] DivisionByZeroError),
    /// The priority list names a tagger that was never registered.
    #[error("unknown tagger {0:?} in the priority list")]
    UnknownTagger(String),
    /// The priority list names the same tagger more than once.
    #[error("tagger {0:?} is listed more than once in the priority list")]
    DuplicateTagger(String),
    #[error("at least one tagger is needed")]
    EmptyInput,
}

pub type Result<T> = std::result::Result<T, EnsembleError>;
