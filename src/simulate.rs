use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::params::KsParams;
use crate::KsError;

pub const DEFAULT_MONTE_CARLO_RUNS: usize = 20_000;
/// Largest sample size that can be simulated.
pub const MAX_SIMULATED_SAMPLE_SIZE: u64 = 1_000_000;
/// Upper bound on `runs * n` uniform draws per estimate.
pub const MAX_SIMULATED_DRAWS: u64 = 2_000_000_000;

#[derive(Clone, Debug)]
pub struct MonteCarloConfig {
    pub runs: usize,
    pub seed: u64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            runs: DEFAULT_MONTE_CARLO_RUNS,
            seed: 2026,
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<(), KsError> {
        if self.runs == 0 {
            return Err(KsError::invalid("runs must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonteCarloEstimate {
    pub runs: usize,
    pub seed: u64,
    pub exceedances: usize,
    pub probability: f64,
    pub std_error: f64,
}

/// Estimate `P(D_n > d)` by drawing uniform samples of size `n`.
///
/// The statistic is distribution-free under the null hypothesis, so U(0,1)
/// samples stand in for any continuous reference.
pub fn estimate_sf(
    params: &KsParams,
    config: &MonteCarloConfig,
) -> Result<MonteCarloEstimate, KsError> {
    config.validate()?;
    if params.sample_size > MAX_SIMULATED_SAMPLE_SIZE {
        return Err(KsError::invalid(format!(
            "sample size {} is too large to simulate (at most {MAX_SIMULATED_SAMPLE_SIZE})",
            params.sample_size
        )));
    }
    let draws = (config.runs as u64).saturating_mul(params.sample_size);
    if draws > MAX_SIMULATED_DRAWS {
        return Err(KsError::invalid(format!(
            "{} runs of n={} need {draws} draws (at most {MAX_SIMULATED_DRAWS})",
            config.runs, params.sample_size
        )));
    }
    let n = params.sample_size as usize;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut sample = vec![0.0; n];
    let mut exceedances = 0;

    for _ in 0..config.runs {
        for u in sample.iter_mut() {
            *u = rng.gen::<f64>();
        }
        if uniform_statistic(&mut sample) > params.statistic {
            exceedances += 1;
        }
    }

    let runs = config.runs as f64;
    let probability = exceedances as f64 / runs;
    let std_error = (probability * (1.0 - probability) / runs).sqrt();

    info!(
        "simulated {} runs of n={}: {} exceedances of d={}",
        config.runs, n, exceedances, params.statistic
    );

    Ok(MonteCarloEstimate {
        runs: config.runs,
        seed: config.seed,
        exceedances,
        probability,
        std_error,
    })
}

/// `D_n` of a sample against the U(0,1) CDF; sorts in place.
fn uniform_statistic(sample: &mut [f64]) -> f64 {
    sample.sort_by(f64::total_cmp);
    let n = sample.len() as f64;
    sample
        .iter()
        .enumerate()
        .map(|(i, &u)| ((i + 1) as f64 / n - u).max(u - i as f64 / n))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kolmogorov::evaluate;

    #[test]
    fn estimate_is_reproducible() {
        let params = KsParams::new(0.25, 10).unwrap();
        let config = MonteCarloConfig {
            runs: 500,
            ..MonteCarloConfig::default()
        };
        let a = estimate_sf(&params, &config).unwrap();
        let b = estimate_sf(&params, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_runs_is_rejected() {
        let params = KsParams::new(0.25, 10).unwrap();
        let config = MonteCarloConfig {
            runs: 0,
            ..MonteCarloConfig::default()
        };
        assert!(matches!(
            estimate_sf(&params, &config),
            Err(KsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn oversized_simulations_are_rejected() {
        let huge = KsParams::new(0.5, 100_000_000_000_000).unwrap();
        let one_run = MonteCarloConfig {
            runs: 1,
            ..MonteCarloConfig::default()
        };
        assert!(matches!(
            estimate_sf(&huge, &one_run),
            Err(KsError::InvalidArgument(_))
        ));

        let params = KsParams::new(0.01, MAX_SIMULATED_SAMPLE_SIZE).unwrap();
        assert!(matches!(
            estimate_sf(&params, &MonteCarloConfig::default()),
            Err(KsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn statistic_of_evenly_spread_sample() {
        let mut sample = vec![0.9, 0.1, 0.5, 0.3, 0.7];
        let d = uniform_statistic(&mut sample);
        assert!((d - 0.1).abs() < 1e-12);
    }

    #[test]
    fn agrees_with_exact_distribution() {
        let config = MonteCarloConfig {
            runs: 20_000,
            seed: 7,
        };
        for (d, n) in [(0.2, 10), (0.15, 20), (0.3, 30)] {
            let params = KsParams::new(d, n).unwrap();
            let estimate = estimate_sf(&params, &config).unwrap();
            let exact = evaluate(d, n).unwrap();
            let tolerance = 5.0 * estimate.std_error.max(1e-3);
            assert!(
                (estimate.probability - exact).abs() < tolerance,
                "d={d} n={n}: simulated {} vs exact {exact}",
                estimate.probability
            );
        }
    }
}
