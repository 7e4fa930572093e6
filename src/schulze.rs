//! Condorcet-consistent aggregation of the raw outcome log via the Schulze
//! method: direct win counts, strongest-path relaxation, then a total order
//! with deterministic tie-breaking.
//!
//! Aggregation reads already-committed outcomes only, so any number of
//! readers may run it concurrently against a snapshot of the log. Unlike the
//! Crowd-BT fold, the win matrix accumulates commutatively: feeding the
//! outcomes in any order yields the same ranking.

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;

use nalgebra::DMatrix;

use crate::error::RankError;

/// One recorded judgment. `winner == None` is an explicit skip: it updates
/// no belief and no win count, but still marks the pair as served.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComparisonOutcome<T> {
    pub candidate_a: T,
    pub candidate_b: T,
    pub winner: Option<T>,
}

impl<T: PartialEq> ComparisonOutcome<T> {
    /// Whether the annotator declined to state a preference.
    pub fn is_skip(&self) -> bool {
        self.winner.is_none()
    }
}

/// A candidate's position in an aggregated ranking. Derived data, recomputed
/// on demand; never a source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankedResult<T> {
    pub candidate: T,
    /// Number of other candidates this one beats via the strongest
    /// comparison path.
    pub score: u64,
    /// Direct (single-edge) win count, the first tie-breaker.
    pub direct_wins: u64,
    /// 1-based rank. Equal scores share a rank; the next distinct score gets
    /// its 1-based sort position, so ties are not compressed.
    pub rank: usize,
}

/// An aggregated ranking plus completeness metadata. The metadata is
/// advisory: a ranking is always computed, even from partial data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ranking<T> {
    pub results: Vec<RankedResult<T>>,
    /// True when fewer non-skip outcomes were recorded than the configured
    /// requirement of `C(n,2) * required_per_pair`.
    pub incomplete: bool,
    /// How many more non-skip outcomes the requirement calls for.
    pub comparisons_needed: u64,
}

/// Build the direct win matrix: `d[(i, j)]` counts outcomes where candidate
/// `i` beat candidate `j`. Skips and outcomes naming unknown candidates are
/// ignored.
pub(crate) fn win_matrix<T: Eq + Hash>(
    candidates: &[T],
    index: &HashMap<&T, usize>,
    outcomes: &[ComparisonOutcome<T>],
) -> DMatrix<u64> {
    let n = candidates.len();
    let mut d = DMatrix::<u64>::zeros(n, n);

    for outcome in outcomes {
        let Some(winner) = &outcome.winner else {
            continue;
        };
        let loser = if *winner == outcome.candidate_a {
            &outcome.candidate_b
        } else if *winner == outcome.candidate_b {
            &outcome.candidate_a
        } else {
            continue;
        };
        let (Some(&i), Some(&j)) = (index.get(winner), index.get(loser)) else {
            continue;
        };
        d[(i, j)] += 1;
    }

    d
}

/// All-pairs strongest (widest) paths over the win graph:
/// `p[(i, j)] = max(p[(i, j)], min(p[(i, k)], p[(k, j)]))` for every
/// intermediate `k`. O(n^3).
pub(crate) fn strongest_paths(d: &DMatrix<u64>) -> DMatrix<u64> {
    let n = d.nrows();
    let mut p = d.clone();
    for i in 0..n {
        p[(i, i)] = 0;
    }

    for k in 0..n {
        for i in 0..n {
            if i == k {
                continue;
            }
            for j in 0..n {
                if j == k || j == i {
                    continue;
                }
                p[(i, j)] = p[(i, j)].max(p[(i, k)].min(p[(k, j)]));
            }
        }
    }

    p
}

pub(crate) fn candidate_index<T: Clone + Debug + Display + Eq + Hash>(
    candidates: &[T],
) -> Result<HashMap<&T, usize>, RankError<T>> {
    let mut index = HashMap::with_capacity(candidates.len());
    for (i, candidate) in candidates.iter().enumerate() {
        if index.insert(candidate, i).is_some() {
            return Err(RankError::CandidateAlreadyExists(candidate.clone()));
        }
    }
    Ok(index)
}

/// Rank `candidates` from the full outcome log.
///
/// Sort order: Schulze score descending, direct wins descending, candidate
/// identity ascending. Fully deterministic for any input permutation.
pub fn rank<T: Clone + Debug + Display + Eq + Hash + Ord>(
    candidates: &[T],
    outcomes: &[ComparisonOutcome<T>],
    required_per_pair: u64,
) -> Result<Ranking<T>, RankError<T>> {
    let n = candidates.len();
    if n < 2 {
        return Err(RankError::NotEnoughCandidates(n));
    }
    let index = candidate_index(candidates)?;

    let d = win_matrix(candidates, &index, outcomes);
    let p = strongest_paths(&d);

    let mut scores = vec![0u64; n];
    let mut direct_wins = vec![0u64; n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            direct_wins[i] += d[(i, j)];
            if p[(i, j)] > p[(j, i)] {
                scores[i] += 1;
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .cmp(&scores[a])
            .then_with(|| direct_wins[b].cmp(&direct_wins[a]))
            .then_with(|| candidates[a].cmp(&candidates[b]))
    });

    // Equal scores share a rank; the next distinct score takes its 1-based
    // position, so [5, 5, 3] ranks as [1, 1, 3].
    let mut results = Vec::with_capacity(n);
    let mut current_rank = 1;
    let mut last_score = None;
    for (pos, &i) in order.iter().enumerate() {
        if last_score != Some(scores[i]) {
            current_rank = pos + 1;
        }
        last_score = Some(scores[i]);
        results.push(RankedResult {
            candidate: candidates[i].clone(),
            score: scores[i],
            direct_wins: direct_wins[i],
            rank: current_rank,
        });
    }

    let expected = (n as u64 * (n as u64 - 1) / 2) * required_per_pair;
    let recorded = outcomes.iter().filter(|o| !o.is_skip()).count() as u64;

    Ok(Ranking {
        results,
        incomplete: recorded < expected,
        comparisons_needed: expected.saturating_sub(recorded),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beat(winner: &str, loser: &str) -> ComparisonOutcome<String> {
        ComparisonOutcome {
            candidate_a: winner.to_string(),
            candidate_b: loser.to_string(),
            winner: Some(winner.to_string()),
        }
    }

    fn skip(a: &str, b: &str) -> ComparisonOutcome<String> {
        ComparisonOutcome {
            candidate_a: a.to_string(),
            candidate_b: b.to_string(),
            winner: None,
        }
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_outcomes_all_tied_at_rank_one() {
        let ranking = rank(&names(&["A", "B", "C"]), &[], 1).unwrap();

        for result in &ranking.results {
            assert_eq!(result.score, 0);
            assert_eq!(result.rank, 1);
        }
        assert!(ranking.incomplete);
        assert_eq!(ranking.comparisons_needed, 3);
    }

    #[test]
    fn test_transitive_outcomes_rank_cleanly() {
        let outcomes = vec![beat("A", "B"), beat("B", "C"), beat("A", "C")];
        let ranking = rank(&names(&["A", "B", "C"]), &outcomes, 1).unwrap();

        let by_candidate: Vec<(&str, u64, usize)> = ranking
            .results
            .iter()
            .map(|r| (r.candidate.as_str(), r.score, r.rank))
            .collect();
        assert_eq!(
            by_candidate,
            vec![("A", 2, 1), ("B", 1, 2), ("C", 0, 3)]
        );
        assert!(!ranking.incomplete);
        assert_eq!(ranking.comparisons_needed, 0);
    }

    #[test]
    fn test_three_cycle_ties_everyone() {
        // The relaxation equalizes every strongest path at 1, so no candidate
        // beats any other through the path relation and all tie at rank 1.
        let outcomes = vec![beat("A", "B"), beat("B", "C"), beat("C", "A")];
        let ranking = rank(&names(&["A", "B", "C"]), &outcomes, 1).unwrap();

        for result in &ranking.results {
            assert_eq!(result.score, ranking.results[0].score);
            assert_eq!(result.rank, 1);
            assert_eq!(result.direct_wins, 1);
        }
    }

    #[test]
    fn test_ranks_are_not_compressed_after_ties() {
        // A and B tie ahead of C and D: ranks [1, 1, 3, 3].
        let outcomes = vec![
            beat("A", "C"),
            beat("A", "D"),
            beat("B", "C"),
            beat("B", "D"),
        ];
        let ranking = rank(&names(&["A", "B", "C", "D"]), &outcomes, 1).unwrap();

        let ranks: Vec<usize> = ranking.results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 1, 3, 3]);
    }

    #[test]
    fn test_indirect_paths_decide_unplayed_pairs() {
        // A beat B twice, B beat C twice; A vs C never played directly but
        // the strongest path A->B->C gives A the win.
        let outcomes = vec![beat("A", "B"), beat("A", "B"), beat("B", "C"), beat("B", "C")];
        let ranking = rank(&names(&["A", "B", "C"]), &outcomes, 2).unwrap();

        assert_eq!(ranking.results[0].candidate, "A");
        assert_eq!(ranking.results[0].score, 2);
        assert_eq!(ranking.results[2].candidate, "C");
        assert!(ranking.incomplete);
        assert_eq!(ranking.comparisons_needed, 2);
    }

    #[test]
    fn test_aggregation_is_order_invariant() {
        let candidates = names(&["A", "B", "C", "D"]);
        let mut outcomes = vec![
            beat("A", "B"),
            beat("B", "C"),
            beat("C", "D"),
            beat("D", "A"),
            beat("A", "C"),
            beat("B", "D"),
        ];

        let forward = rank(&candidates, &outcomes, 1).unwrap();
        outcomes.reverse();
        let reversed = rank(&candidates, &outcomes, 1).unwrap();

        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_direct_wins_break_score_ties_deterministically() {
        // B beats C twice, A beats C once: both beat only C via paths, but
        // B's direct win count is higher.
        let outcomes = vec![beat("B", "C"), beat("B", "C"), beat("A", "C")];
        let ranking = rank(&names(&["A", "B", "C"]), &outcomes, 1).unwrap();

        assert_eq!(ranking.results[0].candidate, "B");
        assert_eq!(ranking.results[1].candidate, "A");
        assert_eq!(ranking.results[0].rank, 1);
        assert_eq!(ranking.results[1].rank, 1);
    }

    #[test]
    fn test_skips_count_nowhere_in_the_win_matrix() {
        let outcomes = vec![beat("A", "B"), skip("A", "B"), skip("B", "C")];
        let ranking = rank(&names(&["A", "B", "C"]), &outcomes, 1).unwrap();

        assert_eq!(ranking.results[0].candidate, "A");
        assert_eq!(ranking.results[0].direct_wins, 1);
        // Only one non-skip outcome recorded out of the three required.
        assert!(ranking.incomplete);
        assert_eq!(ranking.comparisons_needed, 2);
    }

    #[test]
    fn test_rejects_fewer_than_two_candidates() {
        assert!(matches!(
            rank(&names(&["A"]), &[], 1),
            Err(RankError::NotEnoughCandidates(1))
        ));
    }

    #[test]
    fn test_rejects_duplicate_candidates() {
        assert!(matches!(
            rank(&names(&["A", "A"]), &[], 1),
            Err(RankError::CandidateAlreadyExists(_))
        ));
    }

    #[test]
    fn test_unknown_candidates_in_outcomes_are_ignored() {
        let outcomes = vec![beat("A", "B"), beat("X", "A")];
        let ranking = rank(&names(&["A", "B"]), &outcomes, 1).unwrap();

        assert_eq!(ranking.results[0].candidate, "A");
        assert_eq!(ranking.results[0].direct_wins, 1);
    }
}
