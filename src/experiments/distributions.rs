//! Normal, Gamma and Beta primitives used by every estimator.
//!
//! Nothing here has a closed form, so each function is a published
//! approximation or sampler. The samplers take the random source as an
//! argument; pass a seeded `StdRng` for reproducible draws.

use rand::Rng;

use crate::error::{Result, StatsError};

/// Upper bound on Marsaglia-Tsang proposals per Gamma draw. Acceptance is
/// above 95% for every valid shape, so hitting this means the input is bad.
pub const MAX_GAMMA_REJECTIONS: usize = 10_000;

// ── Normal Distribution ─────────────────────────────────────────────

/// Computes P(Z > z) for the standard normal distribution.
/// Uses Abramowitz & Stegun 26.2.17 rational approximation with Horner's method.
/// Caller must pass z >= 0 (use z.abs() before calling).
pub fn normal_sf(z: f64) -> f64 {
    debug_assert!(z >= 0.0, "normal_sf requires z >= 0, got {}", z);

    let t = 1.0 / (1.0 + 0.2316419 * z);
    let d = 0.3989422804014327; // 1/sqrt(2*pi)
    let p = d * (-z * z / 2.0).exp();

    let poly = t
        * (0.319381530
            + t * (-0.356563782 + t * (1.781477937 + t * (-1.821255978 + t * 1.330274429))));

    p * poly
}

/// Standard normal CDF, symmetric by construction:
/// `normal_cdf(-z) == 1 - normal_cdf(z)`.
pub fn normal_cdf(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 - normal_sf(z)
    } else {
        normal_sf(-z)
    }
}

const ACKLAM_A: [f64; 6] = [
    -3.969683028665376e+01,
    2.209460984245205e+02,
    -2.759285104469687e+02,
    1.383577518672690e+02,
    -3.066479806614716e+01,
    2.506628277459239e+00,
];
const ACKLAM_B: [f64; 5] = [
    -5.447609879822406e+01,
    1.615858368580409e+02,
    -1.556989798598866e+02,
    6.680131188771972e+01,
    -1.328068155288572e+01,
];
const ACKLAM_C: [f64; 6] = [
    -7.784894002430293e-03,
    -3.223964580411365e-01,
    -2.400758277161838e+00,
    -2.549732539343734e+00,
    4.374664141464968e+00,
    2.938163982698783e+00,
];
const ACKLAM_D: [f64; 4] = [
    7.784695709041462e-03,
    3.224671290700398e-01,
    2.445134137142996e+00,
    3.754408661907416e+00,
];
const ACKLAM_P_LOW: f64 = 0.02425;
const ACKLAM_P_HIGH: f64 = 1.0 - ACKLAM_P_LOW;

/// Inverse standard normal CDF (Acklam's rational approximation, relative
/// error below 1.15e-9). Returns z such that P(Z < z) = p.
///
/// `p` must lie strictly inside (0, 1).
pub fn inverse_normal_cdf(p: f64) -> Result<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(StatsError::Domain(format!(
            "inverse normal CDF requires 0 < p < 1, got {}",
            p
        )));
    }

    let [a0, a1, a2, a3, a4, a5] = ACKLAM_A;
    let [b0, b1, b2, b3, b4] = ACKLAM_B;
    let [c0, c1, c2, c3, c4, c5] = ACKLAM_C;
    let [d0, d1, d2, d3] = ACKLAM_D;

    let tail = |q: f64| {
        (((((c0 * q + c1) * q + c2) * q + c3) * q + c4) * q + c5)
            / ((((d0 * q + d1) * q + d2) * q + d3) * q + 1.0)
    };

    let z = if p < ACKLAM_P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= ACKLAM_P_HIGH {
        let q = p - 0.5;
        let r = q * q;
        (((((a0 * r + a1) * r + a2) * r + a3) * r + a4) * r + a5) * q
            / (((((b0 * r + b1) * r + b2) * r + b3) * r + b4) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    };

    Ok(z)
}

/// Two-tailed critical value: the z with `confidence_level` mass between -z and z.
pub fn two_tailed_critical_value(confidence_level: f64) -> Result<f64> {
    inverse_normal_cdf(1.0 - (1.0 - confidence_level) / 2.0)
}

// ── Sampling ────────────────────────────────────────────────────────

/// Uniform draw on (0, 1], safe to pass to `ln`.
fn open_uniform<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    1.0 - rng.gen::<f64>()
}

/// One standard normal draw via Box-Muller. The paired sine sample is discarded.
pub fn sample_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1 = open_uniform(rng);
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Gamma(shape, 1) draw using Marsaglia & Tsang (2000).
///
/// Shapes below 1 are drawn at `shape + 1` and scaled by `U^(1/shape)`.
/// Non-positive or non-finite shapes are rejected up front; the rejection
/// loop is capped at [`MAX_GAMMA_REJECTIONS`].
pub fn sample_gamma<R: Rng + ?Sized>(shape: f64, rng: &mut R) -> Result<f64> {
    if !(shape.is_finite() && shape > 0.0) {
        return Err(StatsError::Domain(format!(
            "gamma shape must be finite and > 0, got {}",
            shape
        )));
    }

    if shape < 1.0 {
        let boost = open_uniform(rng).powf(1.0 / shape);
        return Ok(sample_gamma(shape + 1.0, rng)? * boost);
    }

    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();

    for _ in 0..MAX_GAMMA_REJECTIONS {
        let x = sample_normal(rng);
        let v = 1.0 + c * x;
        if v <= 0.0 {
            continue;
        }
        let v = v * v * v;
        let u = open_uniform(rng);

        // Squeeze check first; the log test only runs on its rare misses.
        if u < 1.0 - 0.0331 * x.powi(4) || u.ln() < 0.5 * x * x + d * (1.0 - v + v.ln()) {
            return Ok(d * v);
        }
    }

    Err(StatsError::SamplingExhausted {
        shape,
        attempts: MAX_GAMMA_REJECTIONS,
    })
}

/// Beta(alpha, beta) draw as `X / (X + Y)` with X, Y independent Gamma draws.
pub fn sample_beta<R: Rng + ?Sized>(alpha: f64, beta: f64, rng: &mut R) -> Result<f64> {
    let x = sample_gamma(alpha, rng)?;
    let y = sample_gamma(beta, rng)?;
    let total = x + y;
    if total <= 0.0 {
        // Both draws underflowed; fall back to the mean.
        return Ok(alpha / (alpha + beta));
    }
    Ok(x / total)
}

// ── Gamma Function ──────────────────────────────────────────────────

/// Log of the Beta function: ln(B(a,b)) = ln(Gamma(a)) + ln(Gamma(b)) - ln(Gamma(a+b))
pub(crate) fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// Lanczos approximation of ln(Gamma(x)) for x > 0.
#[allow(clippy::excessive_precision)]
pub fn ln_gamma(x: f64) -> f64 {
    const LANCZOS_G7: [f64; 9] = [
        0.99999999999980993,
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];

    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let t = x + 7.5;
    let series = LANCZOS_G7
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS_G7[0], |acc, (i, &coef)| acc + coef / (x + i as f64));

    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}
