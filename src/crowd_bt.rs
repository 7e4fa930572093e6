//! Online Crowd-BT belief updates.
//!
//! One recorded comparison revises three beliefs by moment matching: the
//! winner's and loser's Gaussian skill beliefs, and the session-wide Beta
//! belief over pooled annotator competence. The observation model is
//! Bradley-Terry mixed over competence: an annotator reports the true
//! ordering with probability `c ~ Beta(alpha, beta)` and the inverted
//! ordering otherwise.
//!
//! Everything here is a pure function of its inputs. The update is
//! order-dependent, so callers must apply outcomes as a fold over a
//! deterministically ordered log (see `RankingSession`).

use crate::constants::{
    ALPHA_PRIOR, BETA_PRIOR, GAMMA, KAPPA, MU_PRIOR, SIGMA_SQ_PRIOR,
};
use crate::divergence::{beta_divergence, gaussian_divergence};
use crate::error::DomainError;

/// Gaussian belief over a candidate's latent skill. Invariant: `sigma_sq > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CandidateBelief {
    pub mu: f64,
    pub sigma_sq: f64,
}

impl Default for CandidateBelief {
    fn default() -> Self {
        CandidateBelief {
            mu: MU_PRIOR,
            sigma_sq: SIGMA_SQ_PRIOR,
        }
    }
}

/// Beta belief over the pooled probability that a reported preference matches
/// the true skill ordering. Invariant: `alpha > 0`, `beta > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnotatorCompetence {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for AnnotatorCompetence {
    fn default() -> Self {
        AnnotatorCompetence {
            alpha: ALPHA_PRIOR,
            beta: BETA_PRIOR,
        }
    }
}

impl AnnotatorCompetence {
    /// Posterior mean competence.
    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }
}

/// Result of applying one comparison outcome to the belief state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeliefUpdate {
    pub annotator: AnnotatorCompetence,
    pub winner: CandidateBelief,
    pub loser: CandidateBelief,
    /// Predictive probability that the observed label was correct, under the
    /// pre-update beliefs. Also the outcome weight used by
    /// [`expected_information_gain`].
    pub win_probability: f64,
    /// True when the competence moment-match degenerated (non-positive or
    /// non-finite implied variance) and the prior `alpha`/`beta` were kept
    /// unchanged. The skill update still applies. Callers should count these
    /// for observability.
    pub competence_held: bool,
}

fn validate(
    annotator: &AnnotatorCompetence,
    winner: &CandidateBelief,
    loser: &CandidateBelief,
) -> Result<(), DomainError> {
    for v in [annotator.alpha, annotator.beta, winner.mu, winner.sigma_sq, loser.mu, loser.sigma_sq]
    {
        if !v.is_finite() {
            return Err(DomainError::NonFinite(v));
        }
    }
    if annotator.alpha <= 0.0 || annotator.beta <= 0.0 {
        return Err(DomainError::NonPositiveCompetence {
            alpha: annotator.alpha,
            beta: annotator.beta,
        });
    }
    if winner.sigma_sq <= 0.0 {
        return Err(DomainError::NonPositiveVariance(winner.sigma_sq));
    }
    if loser.sigma_sq <= 0.0 {
        return Err(DomainError::NonPositiveVariance(loser.sigma_sq));
    }
    Ok(())
}

/// Exponentiated skills for winner and loser, shifted by the larger mean.
/// Every downstream expression is a degree-zero ratio in these, so the shift
/// changes nothing except keeping `exp` away from overflow.
fn exp_skills(winner: &CandidateBelief, loser: &CandidateBelief) -> (f64, f64) {
    let shift = winner.mu.max(loser.mu);
    ((winner.mu - shift).exp(), (loser.mu - shift).exp())
}

/// Moment-matched Beta posterior over competence.
///
/// Returns `(competence', c, held)` where `c` is the predictive probability
/// of the observed label and `held` reports the degenerate-variance fallback.
fn updated_annotator(
    annotator: &AnnotatorCompetence,
    winner: &CandidateBelief,
    loser: &CandidateBelief,
) -> (AnnotatorCompetence, f64, bool) {
    let (alpha, beta) = (annotator.alpha, annotator.beta);
    let (exp_w, exp_l) = exp_skills(winner, loser);
    let sum_exp = exp_w + exp_l;

    // P(model predicts the winner correctly): sigmoid of the mean gap with a
    // second-order variance correction.
    let c1 = exp_w / sum_exp
        + 0.5 * (winner.sigma_sq + loser.sigma_sq) * (exp_w * exp_l * (exp_l - exp_w))
            / sum_exp.powi(3);
    let c2 = 1.0 - c1;
    let c = (c1 * alpha + c2 * beta) / (alpha + beta);

    // First and second moments of the implied Beta under mixture weights
    // (c1, c2), then solve for the (alpha', beta') reproducing them.
    let expt = (c1 * (alpha + 1.0) * alpha + c2 * alpha * beta)
        / (c * (alpha + beta + 1.0) * (alpha + beta));
    let expt_sq = (c1 * (alpha + 2.0) * (alpha + 1.0) * alpha
        + c2 * (alpha + 1.0) * alpha * beta)
        / (c * (alpha + beta + 2.0) * (alpha + beta + 1.0) * (alpha + beta));
    let variance = expt_sq - expt * expt;

    let updated_alpha = (expt - expt_sq) * expt / variance;
    let updated_beta = (expt - expt_sq) * (1.0 - expt) / variance;

    // Degenerate moment match (extreme mean separations drive the implied
    // variance to zero or below): hold the prior rather than persist NaN.
    let degenerate = !(variance > 0.0)
        || !updated_alpha.is_finite()
        || !updated_beta.is_finite()
        || updated_alpha <= 0.0
        || updated_beta <= 0.0;

    let updated = if degenerate {
        *annotator
    } else {
        AnnotatorCompetence {
            alpha: updated_alpha,
            beta: updated_beta,
        }
    };

    (updated, c.clamp(0.0, 1.0), degenerate)
}

/// Moment-matched Gaussian means. Higher-variance beliefs move further.
fn updated_mus(
    annotator: &AnnotatorCompetence,
    winner: &CandidateBelief,
    loser: &CandidateBelief,
) -> (f64, f64) {
    let (alpha, beta) = (annotator.alpha, annotator.beta);
    let (exp_w, exp_l) = exp_skills(winner, loser);

    let mult =
        alpha * exp_w / (alpha * exp_w + beta * exp_l) - exp_w / (exp_w + exp_l);
    (
        winner.mu + winner.sigma_sq * mult,
        loser.mu - loser.sigma_sq * mult,
    )
}

/// Moment-matched Gaussian variances, floored at a `KAPPA` relative shrink.
/// The shared multiplier is usually negative; an upset outcome under a
/// confident competence belief makes it positive, so a variance can grow.
fn updated_sigma_sqs(
    annotator: &AnnotatorCompetence,
    winner: &CandidateBelief,
    loser: &CandidateBelief,
) -> (f64, f64) {
    let (alpha, beta) = (annotator.alpha, annotator.beta);
    let (exp_w, exp_l) = exp_skills(winner, loser);

    let term1 =
        alpha * exp_w * beta * exp_l / (alpha * exp_w + beta * exp_l).powi(2);
    let term2 = exp_w * exp_l / (exp_w + exp_l).powi(2);
    let mult = term1 - term2;

    (
        winner.sigma_sq * (1.0 + winner.sigma_sq * mult).max(KAPPA),
        loser.sigma_sq * (1.0 + loser.sigma_sq * mult).max(KAPPA),
    )
}

/// Apply one comparison with a definite winner to the belief state.
///
/// Pure value-in/value-out; the caller maps candidate identities to and from
/// belief records and serializes concurrent updates on a session.
pub fn update(
    annotator: AnnotatorCompetence,
    winner: CandidateBelief,
    loser: CandidateBelief,
) -> Result<BeliefUpdate, DomainError> {
    validate(&annotator, &winner, &loser)?;

    let (annotator_posterior, c, held) = updated_annotator(&annotator, &winner, &loser);
    let (mu_winner, mu_loser) = updated_mus(&annotator, &winner, &loser);
    let (sigma_sq_winner, sigma_sq_loser) = updated_sigma_sqs(&annotator, &winner, &loser);

    Ok(BeliefUpdate {
        annotator: annotator_posterior,
        winner: CandidateBelief {
            mu: mu_winner,
            sigma_sq: sigma_sq_winner,
        },
        loser: CandidateBelief {
            mu: mu_loser,
            sigma_sq: sigma_sq_loser,
        },
        win_probability: c,
        competence_held: held,
    })
}

/// Expected reduction in uncertainty from comparing `a` against `b`.
///
/// Runs the updater on copies for both hypothetical outcomes and combines
/// each outcome's total divergence (both skill updates plus `GAMMA` times
/// the competence update) weighted by its predicted probability. Reads the
/// beliefs, mutates nothing.
pub fn expected_information_gain(
    annotator: AnnotatorCompetence,
    a: CandidateBelief,
    b: CandidateBelief,
) -> Result<f64, DomainError> {
    let a_wins = update(annotator, a, b)?;
    let b_wins = update(annotator, b, a)?;
    let prob_a_wins = a_wins.win_probability;

    let gain_if_a = gaussian_divergence(a_wins.winner.mu, a_wins.winner.sigma_sq, a.mu, a.sigma_sq)?
        + gaussian_divergence(a_wins.loser.mu, a_wins.loser.sigma_sq, b.mu, b.sigma_sq)?
        + GAMMA
            * beta_divergence(
                a_wins.annotator.alpha,
                a_wins.annotator.beta,
                annotator.alpha,
                annotator.beta,
            )?;

    let gain_if_b = gaussian_divergence(b_wins.loser.mu, b_wins.loser.sigma_sq, a.mu, a.sigma_sq)?
        + gaussian_divergence(b_wins.winner.mu, b_wins.winner.sigma_sq, b.mu, b.sigma_sq)?
        + GAMMA
            * beta_divergence(
                b_wins.annotator.alpha,
                b_wins.annotator.beta,
                annotator.alpha,
                annotator.beta,
            )?;

    Ok(prob_a_wins * gain_if_a + (1.0 - prob_a_wins) * gain_if_b)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn priors() -> (AnnotatorCompetence, CandidateBelief, CandidateBelief) {
        (
            AnnotatorCompetence::default(),
            CandidateBelief::default(),
            CandidateBelief::default(),
        )
    }

    #[test]
    fn test_update_moves_means_apart() {
        let (annotator, winner, loser) = priors();
        let updated = update(annotator, winner, loser).unwrap();

        assert!(updated.winner.mu > winner.mu);
        assert!(updated.loser.mu < loser.mu);
        assert!(!updated.competence_held);
    }

    #[test]
    fn test_update_matches_reference_values() {
        // Hand-computed from the moment-matching equations at the priors:
        // mu mult = 10/11 - 1/2, sigma mult = 10/121 - 1/4.
        let (annotator, winner, loser) = priors();
        let updated = update(annotator, winner, loser).unwrap();

        assert_abs_diff_eq!(updated.winner.mu, 10.0 / 11.0 - 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(updated.loser.mu, 0.5 - 10.0 / 11.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            updated.winner.sigma_sq,
            1.0 + (10.0 / 121.0 - 0.25),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(updated.win_probability, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_expected_outcome_shrinks_variance_with_floor() {
        let (annotator, winner, loser) = priors();
        let updated = update(annotator, winner, loser).unwrap();

        assert!(updated.winner.sigma_sq <= winner.sigma_sq);
        assert!(updated.loser.sigma_sq <= loser.sigma_sq);
        assert!(updated.winner.sigma_sq >= winner.sigma_sq * KAPPA);
        assert!(updated.loser.sigma_sq >= loser.sigma_sq * KAPPA);

        // Huge variances drive the multiplier to the floor instead of below it.
        let wide = CandidateBelief { mu: 0.0, sigma_sq: 100.0 };
        let updated = update(annotator, wide, wide).unwrap();
        assert!(updated.winner.sigma_sq >= wide.sigma_sq * KAPPA);
        assert!(updated.winner.sigma_sq <= wide.sigma_sq);
    }

    #[test]
    fn test_upset_outcome_can_grow_variance() {
        // When the reported winner sits far below the loser and the
        // competence belief is confident (the default prior is Beta(10, 1)),
        // the variance multiplier turns positive: an upset makes the model
        // less sure of both skills, not more.
        let annotator = AnnotatorCompetence::default();
        let winner = CandidateBelief { mu: -2.0, sigma_sq: 1.0 };
        let loser = CandidateBelief { mu: 2.0, sigma_sq: 1.0 };

        let updated = update(annotator, winner, loser).unwrap();
        assert!(updated.winner.sigma_sq > winner.sigma_sq);
        assert!(updated.loser.sigma_sq > loser.sigma_sq);
    }

    #[test]
    fn test_repeated_update_sharpens_beliefs() {
        let (annotator, winner, loser) = priors();
        let first = update(annotator, winner, loser).unwrap();
        let second = update(first.annotator, first.winner, first.loser).unwrap();

        assert!(second.winner.sigma_sq < first.winner.sigma_sq);
        assert!(second.loser.sigma_sq < first.loser.sigma_sq);
        assert!(second.winner.mu - second.loser.mu > first.winner.mu - first.loser.mu);
    }

    #[test]
    fn test_update_is_order_dependent() {
        // Applying "a beats b" then "b beats c" leaves different state than
        // the same two outcomes in the opposite order: each update reads the
        // competence and b-belief the previous one wrote.
        let annotator = AnnotatorCompetence::default();
        let a = CandidateBelief { mu: 0.3, sigma_sq: 1.0 };
        let b = CandidateBelief { mu: 0.0, sigma_sq: 1.0 };
        let c = CandidateBelief { mu: -0.3, sigma_sq: 1.0 };

        let forward = {
            let u1 = update(annotator, a, b).unwrap();
            let u2 = update(u1.annotator, u1.loser, c).unwrap();
            (u2.annotator, u2.winner) // final competence and b-belief
        };
        let backward = {
            let u1 = update(annotator, b, c).unwrap();
            let u2 = update(u1.annotator, a, u1.winner).unwrap();
            (u2.annotator, u2.loser)
        };

        assert!((forward.0.alpha - backward.0.alpha).abs() > 1e-9);
        assert!((forward.1.mu - backward.1.mu).abs() > 1e-9);
    }

    #[test]
    fn test_degenerate_competence_holds_prior() {
        // An extreme mean separation collapses the implied Beta variance;
        // the competence belief must hold at its prior instead of going NaN.
        let annotator = AnnotatorCompetence::default();
        let strong = CandidateBelief { mu: 40.0, sigma_sq: 1.0 };
        let weak = CandidateBelief { mu: -40.0, sigma_sq: 1.0 };

        let updated = update(annotator, strong, weak).unwrap();
        assert!(updated.annotator.alpha.is_finite());
        assert!(updated.annotator.beta.is_finite());
        assert!(updated.winner.sigma_sq > 0.0);
        assert!(updated.loser.sigma_sq > 0.0);
        if updated.competence_held {
            assert_eq!(updated.annotator, annotator);
        }
    }

    #[test]
    fn test_update_rejects_malformed_state() {
        let (annotator, winner, _) = priors();
        let bad = CandidateBelief { mu: 0.0, sigma_sq: 0.0 };
        assert!(matches!(
            update(annotator, winner, bad),
            Err(DomainError::NonPositiveVariance(_))
        ));

        let bad_annotator = AnnotatorCompetence { alpha: -1.0, beta: 1.0 };
        assert!(matches!(
            update(bad_annotator, winner, winner),
            Err(DomainError::NonPositiveCompetence { .. })
        ));
    }

    #[test]
    fn test_information_gain_prefers_close_pairs() {
        let annotator = AnnotatorCompetence::default();
        let near_a = CandidateBelief { mu: 0.0, sigma_sq: 1.0 };
        let near_b = CandidateBelief { mu: 0.1, sigma_sq: 1.0 };
        let far = CandidateBelief { mu: 5.0, sigma_sq: 1.0 };

        let close_gain = expected_information_gain(annotator, near_a, near_b).unwrap();
        let far_gain = expected_information_gain(annotator, near_a, far).unwrap();

        assert!(close_gain > 0.0);
        assert!(close_gain > far_gain);
    }

    #[test]
    fn test_information_gain_does_not_mutate_inputs() {
        let annotator = AnnotatorCompetence::default();
        let a = CandidateBelief { mu: 0.2, sigma_sq: 0.8 };
        let b = CandidateBelief { mu: -0.1, sigma_sq: 1.2 };

        let _ = expected_information_gain(annotator, a, b).unwrap();
        assert_eq!(a, CandidateBelief { mu: 0.2, sigma_sq: 0.8 });
        assert_eq!(b, CandidateBelief { mu: -0.1, sigma_sq: 1.2 });
    }
}
