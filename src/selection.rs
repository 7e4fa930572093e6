//! Next-comparison selection: which pair of candidates is worth a vote.
//!
//! Two interchangeable strategies. Belief-gap reads the Crowd-BT beliefs and
//! asks for the least predictable matchup; path-ambiguity reads the Schulze
//! path matrix and asks for a pair neither direction of which currently
//! dominates. Both are deterministic: pairs are enumerated in ascending
//! candidate-identity order and every tie-break bottoms out at pair identity.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display};
use std::hash::Hash;

use rayon::prelude::*;

use crate::crowd_bt::CandidateBelief;
use crate::error::RankError;
use crate::schulze::{candidate_index, strongest_paths, win_matrix, ComparisonOutcome};

/// Unordered candidate pair, normalized to ascending identity order. Used to
/// detect repeat comparisons and to enumerate the `n(n-1)/2` pair universe.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PairKey<T: Ord> {
    first: T,
    second: T,
}

impl<T: Ord> PairKey<T> {
    pub fn new(a: T, b: T) -> Self {
        if b < a {
            PairKey { first: b, second: a }
        } else {
            PairKey { first: a, second: b }
        }
    }

    pub fn first(&self) -> &T {
        &self.first
    }

    pub fn second(&self) -> &T {
        &self.second
    }
}

/// Which signal drives selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Strategy {
    /// Minimize `|mu_i - mu_j|` over unserved pairs: the outcome least
    /// predictable under current beliefs carries the most information.
    BeliefGap,
    /// Prefer pairs whose Schulze strongest paths are exactly balanced.
    PathAmbiguity,
}

/// Candidate indices sorted by identity, so pair enumeration and identity
/// tie-breaks agree regardless of the caller's candidate order.
fn identity_order<T: Ord>(candidates: &[T]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| candidates[a].cmp(&candidates[b]));
    order
}

/// Choose the unserved pair with the smallest skill-mean gap. Ties break by
/// lowest combined variance, then pair identity. Returns `None` once every
/// pair is served — the session is complete, not in error.
pub fn belief_gap<T: Clone + Debug + Display + Eq + Hash + Ord + Send + Sync>(
    candidates: &[T],
    beliefs: &HashMap<T, CandidateBelief>,
    served: &HashSet<PairKey<T>>,
) -> Result<Option<PairKey<T>>, RankError<T>> {
    if candidates.len() < 2 {
        return Err(RankError::NotEnoughCandidates(candidates.len()));
    }
    for candidate in candidates {
        if !beliefs.contains_key(candidate) {
            return Err(RankError::CandidateNotFound(candidate.clone()));
        }
    }

    let order = identity_order(candidates);
    let mut open_pairs = Vec::new();
    for (i, &a) in order.iter().enumerate() {
        for &b in &order[i + 1..] {
            let key = PairKey::new(candidates[a].clone(), candidates[b].clone());
            if !served.contains(&key) {
                open_pairs.push(key);
            }
        }
    }

    let best = open_pairs
        .into_par_iter()
        .map(|key| {
            let lhs = &beliefs[key.first()];
            let rhs = &beliefs[key.second()];
            let gap = (lhs.mu - rhs.mu).abs();
            let combined_sigma_sq = lhs.sigma_sq + rhs.sigma_sq;
            (gap, combined_sigma_sq, key)
        })
        .min_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
                .then_with(|| a.2.cmp(&b.2))
        });

    Ok(best.map(|(_, _, key)| key))
}

/// Choose an under-voted pair whose strongest paths are exactly equal, i.e.
/// neither direction dominates yet. Ties break by fewest direct votes on the
/// pair, then pair identity. Falls back to the first under-voted pair in
/// identity order when no ambiguous pair exists; `None` once every pair has
/// reached `required_per_pair` recorded outcomes.
pub fn path_ambiguity<T: Clone + Debug + Display + Eq + Hash + Ord>(
    candidates: &[T],
    outcomes: &[ComparisonOutcome<T>],
    required_per_pair: u64,
) -> Result<Option<PairKey<T>>, RankError<T>> {
    if candidates.len() < 2 {
        return Err(RankError::NotEnoughCandidates(candidates.len()));
    }
    let index = candidate_index(candidates)?;

    let d = win_matrix(candidates, &index, outcomes);
    let p = strongest_paths(&d);

    // Recorded outcomes per pair, skips included: a skip serves the pair
    // even though it never enters the win matrix.
    let mut recorded: HashMap<PairKey<&T>, u64> = HashMap::new();
    for outcome in outcomes {
        if index.contains_key(&outcome.candidate_a) && index.contains_key(&outcome.candidate_b) {
            *recorded
                .entry(PairKey::new(&outcome.candidate_a, &outcome.candidate_b))
                .or_insert(0) += 1;
        }
    }

    let order = identity_order(candidates);
    let mut fallback: Option<PairKey<T>> = None;
    let mut best: Option<(u64, PairKey<T>)> = None;

    for (pos, &a) in order.iter().enumerate() {
        for &b in &order[pos + 1..] {
            let key_ref = PairKey::new(&candidates[a], &candidates[b]);
            if recorded.get(&key_ref).copied().unwrap_or(0) >= required_per_pair {
                continue;
            }

            let key = PairKey::new(candidates[a].clone(), candidates[b].clone());
            if fallback.is_none() {
                fallback = Some(key.clone());
            }

            if p[(a, b)] == p[(b, a)] {
                let direct_votes = d[(a, b)] + d[(b, a)];
                let better = match &best {
                    None => true,
                    Some((votes, current)) => {
                        direct_votes < *votes || (direct_votes == *votes && key < *current)
                    }
                };
                if better {
                    best = Some((direct_votes, key));
                }
            }
        }
    }

    Ok(best.map(|(_, key)| key).or(fallback))
}
