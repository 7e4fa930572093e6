use std::fmt::{Debug, Display};

use thiserror::Error;

/// Invariant violations in the belief state handed to the math layer.
///
/// These are always surfaced to the caller: they mean the supplied state is
/// malformed, not that the computation transiently failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("variance must be positive, got {0}")]
    NonPositiveVariance(f64),
    #[error("competence parameters must be positive, got alpha={alpha}, beta={beta}")]
    NonPositiveCompetence { alpha: f64, beta: f64 },
    #[error("non-finite value in belief state: {0}")]
    NonFinite(f64),
}

/// Errors at the session/aggregation layer, where candidate identities are
/// in play.
#[derive(Error, Debug)]
pub enum RankError<T: Display + Debug> {
    #[error("candidate not found: {0}")]
    CandidateNotFound(T),
    #[error("candidate already exists: {0}")]
    CandidateAlreadyExists(T),
    #[error("invalid comparison: winner must be one of the two distinct candidates")]
    InvalidComparison,
    #[error("at least 2 candidates required, got {0}")]
    NotEnoughCandidates(usize),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("serialization error: {0}")]
    Serialization(String),
}
