//! One-sided Smirnov distribution
//!
//! Upper tail of `D_n+ = sup (F_n(x) - F(x))`. The two-sided distribution
//! falls back to twice this tail wherever the two one-sided events cannot
//! overlap (or overlap negligibly).

use crate::params::KsParams;
use crate::KsError;

/// Above this size the exact sum is replaced by its asymptotic form.
const EXACT_SAMPLE_MAX: u64 = 1_000_000;

/// `P(D_n+ >= d)`, validated
pub fn smirnov_sf(d: f64, n: u64) -> Result<f64, KsError> {
    let params = KsParams::new(d, n)?;
    Ok(smirnov_upper(params.sample_size, params.statistic))
}

/// `P(D_n+ >= x)` for validated input.
///
/// Exact Birnbaum-Tingey sum
/// `x * sum_{j=0}^{floor(n(1-x))} C(n,j) (1-x-j/n)^(n-j) (x+j/n)^(j-1)`
/// evaluated term by term in log space.
pub(crate) fn smirnov_upper(n: u64, x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if x >= 1.0 {
        return 0.0;
    }

    let nf = n as f64;
    if n > EXACT_SAMPLE_MAX {
        let a = 6.0 * nf * x + 1.0;
        return (-(a * a) / (18.0 * nf)).exp().clamp(0.0, 1.0);
    }

    let last = (nf * (1.0 - x)).floor() as u64;
    let ln_x = x.ln();
    let mut ln_binomial = 0.0;
    let mut total = 0.0;
    for j in 0..=last {
        let jf = j as f64;
        if j > 0 {
            ln_binomial += (nf - jf + 1.0).ln() - jf.ln();
        }
        let base = 1.0 - x - jf / nf;
        if base <= 0.0 {
            break;
        }
        let ln_term = ln_x + ln_binomial + (nf - jf) * base.ln() + (jf - 1.0) * (x + jf / nf).ln();
        total += ln_term.exp();
    }

    total.clamp(0.0, 1.0)
}
