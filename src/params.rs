//! Statistic parameters
//!
//! The validated `(D, N)` pair every distribution routine takes.

use crate::KsError;

/// Observed statistic and sample size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KsParams {
    /// Observed statistic `D` (non-negative, `+inf` allowed)
    pub statistic: f64,
    /// Sample size `N` (at least one)
    pub sample_size: u64,
}

impl KsParams {
    /// Create validated parameters
    pub fn new(statistic: f64, sample_size: u64) -> Result<Self, KsError> {
        if statistic.is_nan() {
            return Err(KsError::invalid("statistic D must be a number, got NaN"));
        }
        if statistic < 0.0 {
            return Err(KsError::invalid(format!(
                "statistic D must be non-negative, got {statistic}"
            )));
        }
        if sample_size < 1 {
            return Err(KsError::invalid("sample size N must be at least 1, got 0"));
        }

        Ok(Self {
            statistic,
            sample_size,
        })
    }

    /// Parse parameters from their command-line representation
    pub fn parse(statistic: &str, sample_size: &str) -> Result<Self, KsError> {
        let d = parse_statistic(statistic)?;
        let n = parse_sample_size(sample_size)?;
        Self::new(d, n)
    }

    /// `N * D`
    pub fn scaled(&self) -> f64 {
        self.sample_size as f64 * self.statistic
    }
}

pub fn parse_statistic(raw: &str) -> Result<f64, KsError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| KsError::invalid(format!("cannot parse statistic D from {raw:?}")))
}

pub fn parse_sample_size(raw: &str) -> Result<u64, KsError> {
    let value = raw
        .trim()
        .parse::<i128>()
        .map_err(|_| KsError::invalid(format!("cannot parse sample size N from {raw:?}")))?;

    if value < 1 {
        return Err(KsError::invalid(format!(
            "sample size N must be at least 1, got {value}"
        )));
    }

    u64::try_from(value)
        .map_err(|_| KsError::invalid(format!("sample size N is too large: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_arguments() {
        let params = KsParams::parse("0.5", "10").unwrap();
        assert_eq!(params.statistic, 0.5);
        assert_eq!(params.sample_size, 10);
        assert_eq!(params.scaled(), 5.0);
    }

    #[test]
    fn rejects_negative_statistic() {
        let err = KsParams::new(-0.1, 5).unwrap_err();
        assert!(matches!(err, KsError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_nan_statistic() {
        assert!(matches!(
            KsParams::new(f64::NAN, 5),
            Err(KsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_zero_and_negative_sample_size() {
        assert!(matches!(
            KsParams::new(0.5, 0),
            Err(KsError::InvalidArgument(_))
        ));
        assert!(matches!(
            KsParams::parse("0.5", "-3"),
            Err(KsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_unparseable_text() {
        assert!(matches!(
            KsParams::parse("half", "10"),
            Err(KsError::InvalidArgument(_))
        ));
        // N has to be an integer literal
        assert!(matches!(
            KsParams::parse("0.5", "10.0"),
            Err(KsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn accepts_infinite_statistic() {
        let params = KsParams::new(f64::INFINITY, 3).unwrap();
        assert!(params.statistic.is_infinite());
    }
}
