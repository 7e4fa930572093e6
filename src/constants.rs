/// Weight of the annotator-competence term in the expected-information-gain
/// metric. Skill divergence counts fully; competence divergence counts at
/// GAMMA because a single session shares one competence estimate across all
/// comparisons.
pub const GAMMA: f64 = 0.1;

/// Regularization weight from the Crowd-BT objective. Kept for parity with
/// the exported constant set; the online moment-matching update does not
/// consume it.
pub const LAMBDA: f64 = 1.0;

/// Floor on the multiplicative variance shrink applied by one update.
///
/// A posterior variance is `sigma_sq * max(1 + sigma_sq * mult, KAPPA)`, so a
/// single vote can never collapse a belief to near-certainty no matter how
/// extreme the moment-matched multiplier comes out.
pub const KAPPA: f64 = 1e-4;

/// Prior mean of a candidate's latent skill.
pub const MU_PRIOR: f64 = 0.0;

/// Prior variance of a candidate's latent skill.
pub const SIGMA_SQ_PRIOR: f64 = 1.0;

/// Prior Beta alpha for pooled annotator competence. The (10, 1) prior
/// encodes the assumption that annotators agree with the true ordering far
/// more often than not.
pub const ALPHA_PRIOR: f64 = 10.0;

/// Prior Beta beta for pooled annotator competence.
pub const BETA_PRIOR: f64 = 1.0;

/// Minimum expected-information-gain threshold reserved for callers that
/// want to stop collecting votes once no pair is worth asking about. Not
/// enforced inside the updater.
pub const EPSILON: f64 = 0.25;
