//! Closed-form KL divergences between the two belief families the engine
//! tracks: Gaussian (candidate skill) and Beta (annotator competence).
//!
//! Pure math, no state. Log-Gamma and digamma come from `statrs`, which is
//! accurate to double precision over the parameter range these beliefs live
//! in (roughly 1e-2 to 1e6).

use statrs::function::gamma::{digamma, ln_gamma};

use crate::error::DomainError;

/// Directed KL divergence `KL(N(mu1, sigma_sq1) || N(mu2, sigma_sq2))`.
///
/// Fails if either variance is non-positive or any argument is non-finite.
pub fn gaussian_divergence(
    mu1: f64,
    sigma_sq1: f64,
    mu2: f64,
    sigma_sq2: f64,
) -> Result<f64, DomainError> {
    for v in [mu1, sigma_sq1, mu2, sigma_sq2] {
        if !v.is_finite() {
            return Err(DomainError::NonFinite(v));
        }
    }
    if sigma_sq1 <= 0.0 {
        return Err(DomainError::NonPositiveVariance(sigma_sq1));
    }
    if sigma_sq2 <= 0.0 {
        return Err(DomainError::NonPositiveVariance(sigma_sq2));
    }

    let ratio = sigma_sq1 / sigma_sq2;
    Ok((mu1 - mu2).powi(2) / (2.0 * sigma_sq2) + (ratio - 1.0 - ratio.ln()) / 2.0)
}

/// Directed KL divergence `KL(Beta(alpha1, beta1) || Beta(alpha2, beta2))`.
///
/// Fails if any parameter is non-positive or non-finite.
pub fn beta_divergence(
    alpha1: f64,
    beta1: f64,
    alpha2: f64,
    beta2: f64,
) -> Result<f64, DomainError> {
    for &(a, b) in &[(alpha1, beta1), (alpha2, beta2)] {
        if !a.is_finite() || !b.is_finite() {
            return Err(DomainError::NonFinite(if a.is_finite() { b } else { a }));
        }
        if a <= 0.0 || b <= 0.0 {
            return Err(DomainError::NonPositiveCompetence { alpha: a, beta: b });
        }
    }

    Ok(ln_beta(alpha2, beta2) - ln_beta(alpha1, beta1)
        + (alpha1 - alpha2) * digamma(alpha1)
        + (beta1 - beta2) * digamma(beta1)
        + (alpha2 - alpha1 + beta2 - beta1) * digamma(alpha1 + beta1))
}

/// Log of the Beta function, via log-Gamma.
fn ln_beta(alpha: f64, beta: f64) -> f64 {
    ln_gamma(alpha) + ln_gamma(beta) - ln_gamma(alpha + beta)
}
