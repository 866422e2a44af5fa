//! Empirical distribution functions and observed KS statistics
//!
//! Produces the `D` that [`crate::evaluate`] turns into a p-value, either
//! against a reference CDF (one sample) or between two samples.

use serde::Serialize;

use crate::kolmogorov::{evaluate_detailed, Method, Tail};
use crate::params::KsParams;
use crate::KsError;

/// Empirical cumulative distribution function
///
/// The value for `x` in `[x_(i), x_(i+1))` is `i / n`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ecdf {
    samples: Vec<f64>,
}

impl Ecdf {
    /// Create from unordered samples. Empty input and NaN are rejected.
    pub fn new(mut samples: Vec<f64>) -> Result<Self, KsError> {
        if samples.is_empty() {
            return Err(KsError::invalid("sample must contain at least one value"));
        }
        if samples.iter().any(|v| v.is_nan()) {
            return Err(KsError::invalid("sample contains NaN"));
        }
        samples.sort_by(f64::total_cmp);
        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Ordered samples
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Fraction of samples `<= x`
    pub fn value(&self, x: f64) -> f64 {
        let idx = self.samples.partition_point(|v| *v <= x);
        idx as f64 / self.samples.len() as f64
    }
}

/// Outcome of a two-sample comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TwoSampleResult {
    pub statistic: f64,
    pub n1: usize,
    pub n2: usize,
    /// `round(n1 n2 / (n1 + n2))`, the size the p-value is evaluated at
    pub effective_n: u64,
    pub p_value: f64,
    pub method: Method,
}

/// `sup |F_n(x) - F(x)|` against a continuous reference CDF.
///
/// Fails when the reference returns anything outside `[0, 1]`, NaN included.
pub fn one_sample_statistic(
    samples: Vec<f64>,
    cdf: impl Fn(f64) -> f64,
) -> Result<f64, KsError> {
    let ecdf = Ecdf::new(samples)?;
    let n = ecdf.len() as f64;

    let mut statistic = 0.0_f64;
    for (i, &x) in ecdf.samples().iter().enumerate() {
        let f = cdf(x);
        if !(0.0..=1.0).contains(&f) {
            return Err(KsError::invalid(format!(
                "reference CDF returned {f} at {x}, expected a probability"
            )));
        }
        let above = (i + 1) as f64 / n - f;
        let below = f - i as f64 / n;
        statistic = statistic.max(above.max(below));
    }

    Ok(statistic)
}

/// `sup |F_a(x) - F_b(x)|` over the merged support
pub fn two_sample_statistic(a: &Ecdf, b: &Ecdf) -> f64 {
    a.samples()
        .iter()
        .chain(b.samples())
        .map(|&x| (a.value(x) - b.value(x)).abs())
        .fold(0.0_f64, f64::max)
}

/// Two-sample test with the asymptotic p-value `P(D_m > d)`,
/// `m = round(n1 n2 / (n1 + n2))`
pub fn two_sample_test(a: Vec<f64>, b: Vec<f64>) -> Result<TwoSampleResult, KsError> {
    let a = Ecdf::new(a)?;
    let b = Ecdf::new(b)?;
    let statistic = two_sample_statistic(&a, &b);

    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let effective_n = ((n1 * n2 / (n1 + n2)).round() as u64).max(1);
    let evaluation = evaluate_detailed(&KsParams::new(statistic, effective_n)?, Tail::Upper);

    Ok(TwoSampleResult {
        statistic,
        n1: a.len(),
        n2: b.len(),
        effective_n,
        p_value: evaluation.probability,
        method: evaluation.method,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ecdf_steps() {
        let ecdf = Ecdf::new(vec![0.1, 0.0, 0.7, 0.2]).unwrap();
        assert_eq!(ecdf.samples(), &[0.0, 0.1, 0.2, 0.7]);
        assert_eq!(ecdf.value(-1.0), 0.0);
        assert_eq!(ecdf.value(0.1), 0.5);
        assert_eq!(ecdf.value(0.5), 0.75);
        assert_eq!(ecdf.value(2.0), 1.0);
    }

    #[test]
    fn ecdf_rejects_nan_and_empty() {
        assert!(matches!(Ecdf::new(vec![]), Err(KsError::InvalidArgument(_))));
        assert!(matches!(
            Ecdf::new(vec![0.1, f64::NAN]),
            Err(KsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn one_sample_against_uniform() {
        // Evenly spread points miss the uniform CDF by half a step
        let samples = vec![0.1, 0.3, 0.5, 0.7, 0.9];
        let d = one_sample_statistic(samples, |x| x.clamp(0.0, 1.0)).unwrap();
        assert_abs_diff_eq!(d, 0.1, epsilon = 1e-12);

        let d = one_sample_statistic(vec![0.9, 0.95], |x| x).unwrap();
        assert_abs_diff_eq!(d, 0.9, epsilon = 1e-12);
    }

    #[test]
    fn reference_cdf_must_return_probabilities() {
        let samples = vec![0.1, 0.5, 0.9];
        for bad in [f64::NAN, f64::INFINITY, -0.5, 1.5] {
            let result = one_sample_statistic(samples.clone(), |x| if x > 0.4 { bad } else { x });
            assert!(matches!(result, Err(KsError::InvalidArgument(_))), "{bad}");
        }
    }

    #[test]
    fn identical_samples_have_zero_distance() {
        let a = Ecdf::new(vec![1.0, 2.0, 3.0]).unwrap();
        let b = Ecdf::new(vec![3.0, 2.0, 1.0]).unwrap();
        assert_eq!(two_sample_statistic(&a, &b), 0.0);
    }

    #[test]
    fn two_sample_with_ties() {
        let a = Ecdf::new(vec![1.0, 2.0, 2.0, 3.0]).unwrap();
        let b = Ecdf::new(vec![2.0]).unwrap();
        assert_abs_diff_eq!(two_sample_statistic(&a, &b), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn disjoint_samples_are_maximally_apart() {
        let result =
            two_sample_test(vec![1.0, 2.0, 3.0, 4.0], vec![10.0, 11.0, 12.0, 13.0]).unwrap();
        assert_eq!(result.statistic, 1.0);
        assert_eq!(result.effective_n, 2);
        assert_eq!(result.p_value, 0.0);
    }

    #[test]
    fn shifted_samples() {
        let a: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..50).map(|i| i as f64 + 10.0).collect();
        let result = two_sample_test(a, b).unwrap();
        assert_abs_diff_eq!(result.statistic, 0.2, epsilon = 1e-12);
        assert_eq!(result.effective_n, 25);
        let expected = crate::evaluate(0.2, 25).unwrap();
        assert_abs_diff_eq!(result.p_value, expected, epsilon = 1e-15);
        assert!(result.p_value > 0.05);
    }
}
