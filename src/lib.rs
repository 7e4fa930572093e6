//! crowdrank: pairwise-preference ranking engine.
//!
//! Aggregates many "A beats B" judgments into a ranked order while tracking
//! each candidate's latent skill (Gaussian, updated online via Crowd-BT
//! moment matching) and the pooled annotator competence (Beta). Rankings come
//! from the Schulze method over raw win counts, and an active-learning
//! selection policy picks the next pair worth a vote.
//!
//! No IO, no clocks, no hidden state — every operation is a deterministic
//! function of its inputs. Candidates are identified by any caller-provided
//! ordered, hashable type; the crate maps them to internal indices.
//!
//! # Quick start
//!
//! ```rust
//! use crowdrank::{ComparisonOutcome, RankingSession, Strategy};
//!
//! let mut session = RankingSession::new(&["rust", "go", "zig"], 1).unwrap();
//!
//! while let Some(pair) = session.next_pair(Strategy::BeliefGap).unwrap() {
//!     // Present the pair to an annotator; here the first candidate wins.
//!     session
//!         .record(ComparisonOutcome {
//!             candidate_a: *pair.first(),
//!             candidate_b: *pair.second(),
//!             winner: Some(*pair.first()),
//!         })
//!         .unwrap();
//! }
//!
//! let ranking = session.ranking().unwrap();
//! for result in &ranking.results {
//!     println!("#{} {} (score {})", result.rank, result.candidate, result.score);
//! }
//! ```

pub mod constants;
pub mod crowd_bt;
pub mod divergence;
pub mod error;
pub mod schulze;
pub mod selection;
pub mod session;

// Re-export the primary public API at the crate root.
pub use crowd_bt::{
    expected_information_gain, update, AnnotatorCompetence, BeliefUpdate, CandidateBelief,
};
pub use divergence::{beta_divergence, gaussian_divergence};
pub use error::{DomainError, RankError};
pub use schulze::{rank, ComparisonOutcome, RankedResult, Ranking};
pub use selection::{belief_gap, path_ambiguity, PairKey, Strategy};
pub use session::RankingSession;
