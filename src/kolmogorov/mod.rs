//! Two-sided Kolmogorov-Smirnov distribution
//!
//! Exact evaluation of `P(D_n <= d)` and `P(D_n > d)` for finite `n`,
//! switching between closed forms, the Durbin matrix method, the Pomeranz
//! recursion, the Pelz-Good asymptotic series and the doubled one-sided
//! Smirnov tail depending on where `(n, d)` falls. Both tails come from the
//! same computation, so `cdf + sf == 1` up to rounding.

mod durbin;
mod pelz_good;
mod pomeranz;

use log::debug;
use serde::Serialize;

use crate::params::KsParams;
use crate::smirnov::smirnov_upper;
use crate::KsError;

pub(crate) use durbin::durbin_cdf;
pub(crate) use pelz_good::pelz_good;
pub(crate) use pomeranz::pomeranz_cdf;

/// Intermediate results are rescaled by `2^128` to stay inside `f64` range.
pub(crate) const SCALE_EXPONENT: i64 = 128;
// 2^128 and 2^-128
pub(crate) const SCALE_UP: f64 = 3.402_823_669_209_384_634_633_746_074_317_682_114_56e38;
pub(crate) const SCALE_DOWN: f64 = 2.938_735_877_055_718_769_921_841_343_055_614_194_546_7e-39;

/// Largest `n` evaluated with the small-sample algorithms.
const SMALL_SAMPLE_MAX: u64 = 140;
/// Largest `n` for which the Durbin matrix is used in the large-sample branch.
const DURBIN_SAMPLE_MAX: u64 = 100_000;
/// `n d^2` beyond which the two-sided tail is zero in `f64`.
const NEGLIGIBLE_TAIL: f64 = 370.0;
/// `n d^2` range over which the doubled one-sided tail takes over,
/// for small and large `n`.
const SMALL_SAMPLE_TAIL_BLEND: (f64, f64) = (4.0, 5.0);
const LARGE_SAMPLE_TAIL_BLEND: (f64, f64) = (3.0, 4.0);
/// `n d` range over which Pelz-Good takes over from the Durbin matrix.
const DURBIN_BLEND: (f64, f64) = (48.0, 64.0);

/// Which tail of the distribution to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tail {
    /// `P(D_n <= d)`
    Lower,
    /// `P(D_n > d)`
    Upper,
}

/// Evaluation regime that produced a probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    Boundary,
    RubenGambino,
    DurbinMatrix,
    Pomeranz,
    PelzGood,
    Smirnov,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Boundary => "boundary",
            Method::RubenGambino => "ruben-gambino",
            Method::DurbinMatrix => "durbin-matrix",
            Method::Pomeranz => "pomeranz",
            Method::PelzGood => "pelz-good",
            Method::Smirnov => "smirnov",
        }
    }
}

/// Probability together with the regime used to compute it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub probability: f64,
    pub method: Method,
}

/// p-value of an observed two-sided statistic: `P(D_n > d)`.
///
/// `d <= 0` gives `1.0`, `d >= 1` gives `0.0`. Fails with
/// [`KsError::InvalidArgument`] when `d` is negative or NaN, or `n` is zero.
pub fn evaluate(d: f64, n: u64) -> Result<f64, KsError> {
    sf(d, n)
}

/// Survival function `P(D_n > d)`
pub fn sf(d: f64, n: u64) -> Result<f64, KsError> {
    let params = KsParams::new(d, n)?;
    Ok(evaluate_detailed(&params, Tail::Upper).probability)
}

/// Cumulative distribution function `P(D_n <= d)`
pub fn cdf(d: f64, n: u64) -> Result<f64, KsError> {
    let params = KsParams::new(d, n)?;
    Ok(evaluate_detailed(&params, Tail::Lower).probability)
}

/// Evaluate one tail and report the regime that was used
pub fn evaluate_detailed(params: &KsParams, tail: Tail) -> Evaluation {
    let evaluation = kolmogorov(params.sample_size, params.statistic, tail);
    debug!(
        "n={} d={} tail={:?} -> {} via {}",
        params.sample_size,
        params.statistic,
        tail,
        evaluation.probability,
        evaluation.method.as_str()
    );
    evaluation
}

/// Smallest `d` with `P(D_n > d) <= alpha`.
///
/// Bisection on `[0, 1]`; the survival function is non-increasing in `d`
/// so the bracket always holds the answer.
pub fn critical_value(alpha: f64, n: u64) -> Result<f64, KsError> {
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(KsError::invalid(format!(
            "significance level alpha must be in (0, 1], got {alpha}"
        )));
    }
    KsParams::new(0.0, n)?;
    if alpha >= 1.0 {
        return Ok(0.0);
    }

    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        if kolmogorov(n, mid, Tail::Upper).probability > alpha {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    debug!("critical value for alpha={alpha} n={n}: {hi}");
    Ok(hi)
}

/// Both tails at one point, derived from a single computation
#[derive(Debug, Clone, Copy)]
struct Split {
    cdf: f64,
    sf: f64,
    method: Method,
}

impl Split {
    fn from_cdf(cdf: f64, method: Method) -> Self {
        Self {
            cdf,
            sf: 1.0 - cdf,
            method,
        }
    }

    fn from_sf(sf: f64, method: Method) -> Self {
        Self {
            cdf: 1.0 - sf,
            sf,
            method,
        }
    }

    /// `(1 - w) * self + w * other`, labelled with the heavier side
    fn blend(self, other: Split, w: f64) -> Self {
        Self {
            cdf: (1.0 - w) * self.cdf + w * other.cdf,
            sf: (1.0 - w) * self.sf + w * other.sf,
            method: if w < 0.5 { self.method } else { other.method },
        }
    }

    fn tail(self, tail: Tail) -> Evaluation {
        let probability = match tail {
            Tail::Lower => self.cdf,
            Tail::Upper => self.sf,
        };
        Evaluation {
            probability: probability.clamp(0.0, 1.0),
            method: self.method,
        }
    }
}

/// Smooth weight rising from 0 at `lo` to 1 at `hi`
fn smoothstep((lo, hi): (f64, f64), v: f64) -> f64 {
    let s = ((v - lo) / (hi - lo)).clamp(0.0, 1.0);
    s * s * (3.0 - 2.0 * s)
}

pub(crate) fn kolmogorov(n: u64, x: f64, tail: Tail) -> Evaluation {
    split(n, x).tail(tail)
}

// Neighbouring regimes are blended over a short range rather than switched
// at a point, keeping both tails continuous and monotone in `x`.
fn split(n: u64, x: f64) -> Split {
    if x >= 1.0 {
        return Split::from_cdf(1.0, Method::Boundary);
    }
    if x <= 0.0 {
        return Split::from_cdf(0.0, Method::Boundary);
    }

    let nf = n as f64;
    let t = nf * x;

    // Ruben-Gambino: exact for 1/2n <= x <= 1/n
    if t <= 1.0 {
        if t <= 0.5 {
            return Split::from_cdf(0.0, Method::Boundary);
        }
        let p = if n <= SMALL_SAMPLE_MAX {
            (1..=n).fold(1.0, |acc, i| acc * (i as f64 / nf) * (2.0 * t - 1.0))
        } else {
            (log_factorial_over_power(n) + nf * (2.0 * t - 1.0).ln()).exp()
        };
        return Split::from_cdf(p, Method::RubenGambino);
    }

    let nx_squared = t * x;
    if nx_squared >= NEGLIGIBLE_TAIL {
        return Split::from_sf(0.0, Method::Boundary);
    }

    // Ruben-Gambino: exact for x >= 1 - 1/n
    if t >= nf - 1.0 {
        let p = 2.0 * (1.0 - x).powf(nf);
        return Split::from_sf(p, Method::RubenGambino);
    }

    // D+ and D- cannot both exceed 1/2, so the two-sided tail is exactly
    // twice the one-sided one.
    if x >= 0.5 {
        return doubled_smirnov(n, x);
    }

    let band = if n <= SMALL_SAMPLE_MAX {
        SMALL_SAMPLE_TAIL_BLEND
    } else {
        LARGE_SAMPLE_TAIL_BLEND
    };
    if nx_squared >= band.1 {
        return doubled_smirnov(n, x);
    }
    let body = central(n, x, nx_squared);
    if nx_squared <= band.0 {
        return body;
    }
    body.blend(doubled_smirnov(n, x), smoothstep(band, nx_squared))
}

/// Twice the one-sided tail; overstates the two-sided tail by about
/// `2 exp(-8 n x^2)`.
fn doubled_smirnov(n: u64, x: f64) -> Split {
    Split::from_sf(2.0 * smirnov_upper(n, x), Method::Smirnov)
}

/// Body of the distribution, below the tail band
fn central(n: u64, x: f64, nx_squared: f64) -> Split {
    if n <= SMALL_SAMPLE_MAX {
        return if nx_squared <= 0.754_693 {
            Split::from_cdf(durbin_cdf(n, x), Method::DurbinMatrix)
        } else {
            Split::from_cdf(pomeranz_cdf(n, x), Method::Pomeranz)
        };
    }

    let asymptotic = || Split::from_cdf(pelz_good(n, x, Tail::Lower), Method::PelzGood);
    let t = n as f64 * x;
    if n > DURBIN_SAMPLE_MAX || t >= DURBIN_BLEND.1 {
        return asymptotic();
    }
    let exact = Split::from_cdf(durbin_cdf(n, x), Method::DurbinMatrix);
    if t <= DURBIN_BLEND.0 {
        return exact;
    }
    exact.blend(asymptotic(), smoothstep(DURBIN_BLEND, t))
}

/// `ln(n! / n^n)` by Stirling's series with `n ln n` removed up front.
fn log_factorial_over_power(n: u64) -> f64 {
    let nf = n as f64;
    let rn = 1.0 / nf;
    let rn2 = rn * rn;
    0.5 * nf.ln() - nf
        + 0.5 * (2.0 * std::f64::consts::PI).ln()
        + rn * (1.0 / 12.0 - rn2 * (1.0 / 360.0 - rn2 / 1260.0))
}

/// Multiply by `2^exponent` without overflowing intermediate powers.
pub(crate) fn scale_by_pow2(mut value: f64, mut exponent: i64) -> f64 {
    while exponent >= SCALE_EXPONENT {
        value *= SCALE_UP;
        exponent -= SCALE_EXPONENT;
    }
    while exponent <= -SCALE_EXPONENT {
        value *= SCALE_DOWN;
        exponent += SCALE_EXPONENT;
    }
    value * 2f64.powi(exponent as i32)
}
