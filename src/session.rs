//! One ranking session: the owner of all mutable engine state.
//!
//! A session holds one `AnnotatorCompetence`, one `CandidateBelief` per
//! candidate, and the append-only outcome log. Nothing is shared across
//! sessions. Belief updates are applied as a fold in log-append order, which
//! makes the Crowd-BT non-commutativity explicit: callers that need
//! reproducible state must record outcomes in creation-time order and must
//! serialize concurrent `record` calls on the same session (the update is a
//! read-modify-write over shared competence state). Ranking snapshots are
//! read-only over committed outcomes and may be recomputed freely.

use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display};
use std::hash::Hash;

use crate::crowd_bt::{self, AnnotatorCompetence, CandidateBelief};
use crate::error::RankError;
use crate::schulze::{self, ComparisonOutcome, Ranking};
use crate::selection::{self, PairKey, Strategy};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(bound(
    serialize = "T: Clone + Debug + Eq + Hash + Ord + Send + Sync + 'static + serde::Serialize",
    deserialize = "T: Clone + Debug + Eq + Hash + Ord + Send + Sync + 'static + serde::de::DeserializeOwned"
)))]
#[derive(Debug, Clone)]
pub struct RankingSession<T: Clone + Debug + Eq + Hash + Ord + Send + Sync + 'static> {
    candidates: Vec<T>,
    index: HashMap<T, usize>,
    beliefs: Vec<CandidateBelief>,
    annotator: AnnotatorCompetence,
    outcomes: Vec<ComparisonOutcome<T>>,
    required_per_pair: u64,
    /// Updates whose competence moment-match degenerated and held the prior.
    /// Exposed so callers can log or alert on numeric instability.
    degenerate_updates: u64,
    ranking_cache: Option<Ranking<T>>,
}

impl<T: Clone + Debug + Display + Eq + Hash + Ord + Send + Sync + 'static> RankingSession<T> {
    /// Create a session over `candidates` with all beliefs at their priors.
    /// `required_per_pair` is the number of recorded outcomes each unordered
    /// pair needs before the session counts as complete (typically 1).
    pub fn new(candidates: &[T], required_per_pair: u64) -> Result<Self, RankError<T>> {
        let mut session = RankingSession {
            candidates: Vec::with_capacity(candidates.len()),
            index: HashMap::with_capacity(candidates.len()),
            beliefs: Vec::with_capacity(candidates.len()),
            annotator: AnnotatorCompetence::default(),
            outcomes: Vec::new(),
            required_per_pair,
            degenerate_updates: 0,
            ranking_cache: None,
        };
        for candidate in candidates {
            session.add_candidate(candidate.clone())?;
        }
        Ok(session)
    }

    /// Register a late-arriving candidate at the prior belief.
    pub fn add_candidate(&mut self, candidate: T) -> Result<(), RankError<T>> {
        if self.index.contains_key(&candidate) {
            return Err(RankError::CandidateAlreadyExists(candidate));
        }
        self.index.insert(candidate.clone(), self.candidates.len());
        self.candidates.push(candidate);
        self.beliefs.push(CandidateBelief::default());
        self.ranking_cache = None;
        Ok(())
    }

    /// Record one outcome: append it to the log and, unless it is a skip,
    /// fold the Crowd-BT update into the winner's, loser's, and annotator's
    /// beliefs. Outcomes are applied strictly in the order recorded.
    pub fn record(&mut self, outcome: ComparisonOutcome<T>) -> Result<(), RankError<T>> {
        if outcome.candidate_a == outcome.candidate_b {
            return Err(RankError::InvalidComparison);
        }
        let a = self.index_of(&outcome.candidate_a)?;
        let b = self.index_of(&outcome.candidate_b)?;

        if let Some(winner) = &outcome.winner {
            let (winner_idx, loser_idx) = if *winner == outcome.candidate_a {
                (a, b)
            } else if *winner == outcome.candidate_b {
                (b, a)
            } else {
                return Err(RankError::InvalidComparison);
            };

            let updated = crowd_bt::update(
                self.annotator,
                self.beliefs[winner_idx],
                self.beliefs[loser_idx],
            )?;
            self.annotator = updated.annotator;
            self.beliefs[winner_idx] = updated.winner;
            self.beliefs[loser_idx] = updated.loser;
            if updated.competence_held {
                self.degenerate_updates += 1;
            }
        }

        self.outcomes.push(outcome);
        self.ranking_cache = None;
        Ok(())
    }

    /// Fold a batch of outcomes into the session, in iteration order.
    pub fn record_all(
        &mut self,
        outcomes: impl IntoIterator<Item = ComparisonOutcome<T>>,
    ) -> Result<(), RankError<T>> {
        for outcome in outcomes {
            self.record(outcome)?;
        }
        Ok(())
    }

    /// Current skill belief for one candidate.
    pub fn belief(&self, candidate: &T) -> Result<CandidateBelief, RankError<T>> {
        Ok(self.beliefs[self.index_of(candidate)?])
    }

    /// Snapshot of every candidate's skill belief.
    pub fn beliefs(&self) -> HashMap<T, CandidateBelief> {
        self.candidates
            .iter()
            .cloned()
            .zip(self.beliefs.iter().copied())
            .collect()
    }

    /// Current pooled annotator-competence belief.
    pub fn competence(&self) -> AnnotatorCompetence {
        self.annotator
    }

    /// The append-only outcome log, in the order outcomes were recorded.
    pub fn outcomes(&self) -> &[ComparisonOutcome<T>] {
        &self.outcomes
    }

    pub fn candidates(&self) -> &[T] {
        &self.candidates
    }

    pub fn required_per_pair(&self) -> u64 {
        self.required_per_pair
    }

    /// How many recorded updates hit the degenerate-competence fallback.
    pub fn degenerate_update_count(&self) -> u64 {
        self.degenerate_updates
    }

    /// Schulze ranking over the current log, with completeness metadata.
    /// Cached until the next recorded outcome or added candidate.
    pub fn ranking(&mut self) -> Result<Ranking<T>, RankError<T>> {
        if let Some(cached) = &self.ranking_cache {
            return Ok(cached.clone());
        }
        let ranking = schulze::rank(&self.candidates, &self.outcomes, self.required_per_pair)?;
        self.ranking_cache = Some(ranking.clone());
        Ok(ranking)
    }

    /// Choose the next pair to present, or `None` once every pair has
    /// reached its required outcome count.
    pub fn next_pair(&self, strategy: Strategy) -> Result<Option<PairKey<T>>, RankError<T>> {
        match strategy {
            Strategy::BeliefGap => {
                let served = self.served_pairs();
                selection::belief_gap(&self.candidates, &self.beliefs(), &served)
            }
            Strategy::PathAmbiguity => selection::path_ambiguity(
                &self.candidates,
                &self.outcomes,
                self.required_per_pair,
            ),
        }
    }

    /// Expected information gain of comparing `a` against `b` under current
    /// beliefs. Pure read; mutates nothing.
    pub fn expected_information_gain(&self, a: &T, b: &T) -> Result<f64, RankError<T>> {
        let a = self.beliefs[self.index_of(a)?];
        let b = self.beliefs[self.index_of(b)?];
        Ok(crowd_bt::expected_information_gain(self.annotator, a, b)?)
    }

    /// Vote-collection progress as `(completed, remaining, total)` over the
    /// pair universe, where each pair contributes up to `required_per_pair`
    /// recorded outcomes (skips included).
    pub fn progress(&self) -> (u64, u64, u64) {
        let n = self.candidates.len() as u64;
        let total = n.saturating_sub(1) * n / 2 * self.required_per_pair;
        let completed: u64 = self
            .pair_counts()
            .values()
            .map(|&count| count.min(self.required_per_pair))
            .sum();
        (completed, total.saturating_sub(completed), total)
    }

    fn index_of(&self, candidate: &T) -> Result<usize, RankError<T>> {
        self.index
            .get(candidate)
            .copied()
            .ok_or_else(|| RankError::CandidateNotFound(candidate.clone()))
    }

    /// Recorded outcomes per unordered pair, skips included.
    fn pair_counts(&self) -> HashMap<PairKey<&T>, u64> {
        let mut counts = HashMap::new();
        for outcome in &self.outcomes {
            *counts
                .entry(PairKey::new(&outcome.candidate_a, &outcome.candidate_b))
                .or_insert(0) += 1;
        }
        counts
    }

    fn served_pairs(&self) -> HashSet<PairKey<T>> {
        // A zero collection target serves every pair up front, including
        // pairs with no recorded outcomes.
        if self.required_per_pair == 0 {
            let mut served = HashSet::new();
            for (i, a) in self.candidates.iter().enumerate() {
                for b in &self.candidates[i + 1..] {
                    served.insert(PairKey::new(a.clone(), b.clone()));
                }
            }
            return served;
        }
        self.pair_counts()
            .into_iter()
            .filter(|&(_, count)| count >= self.required_per_pair)
            .map(|(key, _)| PairKey::new((*key.first()).clone(), (*key.second()).clone()))
            .collect()
    }
}

#[cfg(feature = "serde")]
impl<
        T: Clone
            + Debug
            + Display
            + Eq
            + Hash
            + Ord
            + Send
            + Sync
            + 'static
            + serde::Serialize
            + serde::de::DeserializeOwned,
    > RankingSession<T>
{
    pub fn to_json(&self) -> Result<String, RankError<T>> {
        serde_json::to_string(self)
            .map_err(|e| RankError::Serialization(format!("Failed to serialize: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self, RankError<T>> {
        serde_json::from_str(json)
            .map_err(|e| RankError::Serialization(format!("Failed to deserialize: {}", e)))
    }

    pub fn save_to_file(&self, path: &str) -> Result<(), RankError<T>> {
        let json = self.to_json()?;
        std::fs::write(path, json)
            .map_err(|e| RankError::Serialization(format!("Failed to write file: {}", e)))
    }

    pub fn load_from_file(path: &str) -> Result<Self, RankError<T>> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| RankError::Serialization(format!("Failed to read file: {}", e)))?;
        Self::from_json(&json)
    }
}
