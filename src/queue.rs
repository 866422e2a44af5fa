//! Single-server queue with deterministic service
//!
//! Arrivals form a Poisson process and each one is tagged independently with
//! a fixed probability. Every arrival records how many customers are already
//! in the system, so the counts seen by all arrivals and by tagged arrivals
//! can be compared with a two-sample test.

use std::collections::VecDeque;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};
use serde::Serialize;

use crate::KsError;

/// Largest expected number of arrivals (`arrival_rate * duration`) per run.
pub const MAX_EXPECTED_ARRIVALS: f64 = 10_000_000.0;

/// Queue simulation configuration
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Probability that an arrival is tagged
    pub tag_probability: f64,
    /// Mean arrivals per second
    pub arrival_rate: f64,
    /// Service time per customer, in seconds
    pub service_time: f64,
    /// Simulated time span, in seconds
    pub duration: f64,
    pub seed: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            tag_probability: 0.5,
            arrival_rate: 100.0,
            service_time: 0.005,
            duration: 60.0,
            seed: 2026,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), KsError> {
        if !(0.0..=1.0).contains(&self.tag_probability) {
            return Err(KsError::invalid(format!(
                "tag probability must be in [0, 1], got {}",
                self.tag_probability
            )));
        }
        if !(self.arrival_rate.is_finite() && self.arrival_rate > 0.0) {
            return Err(KsError::invalid(format!(
                "arrival rate must be positive, got {}",
                self.arrival_rate
            )));
        }
        if !(self.service_time.is_finite() && self.service_time >= 0.0) {
            return Err(KsError::invalid(format!(
                "service time must be non-negative, got {}",
                self.service_time
            )));
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(KsError::invalid(format!(
                "duration must be positive, got {}",
                self.duration
            )));
        }
        let expected = self.arrival_rate * self.duration;
        if expected > MAX_EXPECTED_ARRIVALS {
            return Err(KsError::invalid(format!(
                "{expected} expected arrivals exceed the limit of {MAX_EXPECTED_ARRIVALS}"
            )));
        }
        Ok(())
    }
}

/// System sizes observed at arrival instants
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueTrace {
    /// Seen by every arrival
    pub total: Vec<u64>,
    /// Seen by tagged arrivals only
    pub tagged: Vec<u64>,
}

/// Run the queue for `config.duration` seconds.
///
/// Inter-arrival gaps and tags come from two generators seeded from
/// `seed` and `seed + 1`, so changing the tag probability leaves the
/// arrival times unchanged.
pub fn run_queue(config: &QueueConfig) -> Result<QueueTrace, KsError> {
    config.validate()?;

    let mut arrival_rng = StdRng::seed_from_u64(config.seed);
    let mut tag_rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));
    let gap = Exp::new(config.arrival_rate)
        .map_err(|e| KsError::invalid(format!("arrival rate: {e}")))?;

    // Departure times of everyone still in the system, in service order
    let mut departures: VecDeque<f64> = VecDeque::new();
    let mut trace = QueueTrace::default();
    let mut clock = 0.0;

    loop {
        clock += gap.sample(&mut arrival_rng);
        if clock >= config.duration {
            break;
        }

        while departures.front().is_some_and(|&t| t <= clock) {
            departures.pop_front();
        }

        let in_system = departures.len() as u64;
        trace.total.push(in_system);
        if tag_rng.gen::<f64>() < config.tag_probability {
            trace.tagged.push(in_system);
        }

        let start = departures.back().map_or(clock, |&t| t.max(clock));
        departures.push_back(start + config.service_time);
    }

    info!(
        "queue: {} arrivals ({} tagged) over {}s",
        trace.total.len(),
        trace.tagged.len(),
        config.duration
    );

    Ok(trace)
}

/// One category of the count distributions
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CountRow {
    pub count: u64,
    pub total_pmf: f64,
    pub total_cdf: f64,
    pub tagged_pmf: f64,
    pub tagged_cdf: f64,
}

/// Relative frequency of each count in `0..categories`; all zero when
/// `counts` is empty.
pub fn count_pmf(counts: &[u64], categories: usize) -> Vec<f64> {
    let mut pmf = vec![0.0; categories];
    for &c in counts {
        if let Some(slot) = pmf.get_mut(c as usize) {
            *slot += 1.0;
        }
    }
    if !counts.is_empty() {
        let total = counts.len() as f64;
        for p in pmf.iter_mut() {
            *p /= total;
        }
    }
    pmf
}

fn cumulative(pmf: &[f64]) -> Vec<f64> {
    pmf.iter()
        .scan(0.0, |acc, &p| {
            *acc += p;
            Some(*acc)
        })
        .collect()
}

/// PMF and CDF of both traces over `0..=max(total)`
pub fn count_table(trace: &QueueTrace) -> Vec<CountRow> {
    let categories = trace.total.iter().max().map_or(0, |&m| m as usize + 1);
    let total_pmf = count_pmf(&trace.total, categories);
    let tagged_pmf = count_pmf(&trace.tagged, categories);
    let total_cdf = cumulative(&total_pmf);
    let tagged_cdf = cumulative(&tagged_pmf);

    (0..categories)
        .map(|i| CountRow {
            count: i as u64,
            total_pmf: total_pmf[i],
            total_cdf: total_cdf[i],
            tagged_pmf: tagged_pmf[i],
            tagged_cdf: tagged_cdf[i],
        })
        .collect()
}

/// Largest CDF gap in a count table
pub fn table_statistic(rows: &[CountRow]) -> f64 {
    rows.iter()
        .map(|r| (r.total_cdf - r.tagged_cdf).abs())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecdf::{two_sample_statistic, Ecdf};
    use approx::assert_abs_diff_eq;

    fn short_run() -> QueueConfig {
        QueueConfig {
            duration: 20.0,
            ..QueueConfig::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        QueueConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_parameters() {
        let bad = [
            QueueConfig {
                tag_probability: 1.5,
                ..QueueConfig::default()
            },
            QueueConfig {
                arrival_rate: 0.0,
                ..QueueConfig::default()
            },
            QueueConfig {
                service_time: -1.0,
                ..QueueConfig::default()
            },
            QueueConfig {
                duration: f64::NAN,
                ..QueueConfig::default()
            },
            QueueConfig {
                arrival_rate: 1e9,
                ..QueueConfig::default()
            },
        ];
        for config in bad {
            assert!(matches!(run_queue(&config), Err(KsError::InvalidArgument(_))));
        }
    }

    #[test]
    fn run_is_reproducible() {
        let a = run_queue(&short_run()).unwrap();
        let b = run_queue(&short_run()).unwrap();
        assert_eq!(a, b);
        assert!(!a.total.is_empty());
    }

    #[test]
    fn arrival_count_matches_rate() {
        let trace = run_queue(&short_run()).unwrap();
        // 2000 expected arrivals, standard deviation about 45
        let n = trace.total.len() as f64;
        assert!((n - 2_000.0).abs() < 250.0, "{n} arrivals");
        let tagged = trace.tagged.len() as f64 / n;
        assert!((tagged - 0.5).abs() < 0.05, "tagged fraction {tagged}");
    }

    #[test]
    fn tags_do_not_move_arrivals() {
        let all = run_queue(&QueueConfig {
            tag_probability: 1.0,
            ..short_run()
        })
        .unwrap();
        let none = run_queue(&QueueConfig {
            tag_probability: 0.0,
            ..short_run()
        })
        .unwrap();
        assert_eq!(all.total, none.total);
        assert_eq!(all.tagged, all.total);
        assert!(none.tagged.is_empty());
    }

    #[test]
    fn zero_service_time_keeps_the_system_empty() {
        let trace = run_queue(&QueueConfig {
            service_time: 0.0,
            ..short_run()
        })
        .unwrap();
        assert!(trace.total.iter().all(|&c| c == 0));
    }

    #[test]
    fn busy_fraction_matches_load() {
        // M/D/1: an arrival finds the server busy with probability rho
        let trace = run_queue(&QueueConfig {
            arrival_rate: 100.0,
            service_time: 0.004,
            duration: 200.0,
            ..QueueConfig::default()
        })
        .unwrap();
        let busy = trace.total.iter().filter(|&&c| c > 0).count() as f64;
        let fraction = busy / trace.total.len() as f64;
        assert!((fraction - 0.4).abs() < 0.03, "busy fraction {fraction}");
    }

    #[test]
    fn table_of_known_counts() {
        let trace = QueueTrace {
            total: vec![0, 0, 1, 2],
            tagged: vec![0, 2],
        };
        let rows = count_table(&trace);
        assert_eq!(rows.len(), 3);
        assert_abs_diff_eq!(rows[0].total_pmf, 0.5);
        assert_abs_diff_eq!(rows[1].total_cdf, 0.75);
        assert_abs_diff_eq!(rows[1].tagged_pmf, 0.0);
        assert_abs_diff_eq!(rows[2].tagged_cdf, 1.0);
        assert_abs_diff_eq!(table_statistic(&rows), 0.25);
    }

    #[test]
    fn empty_tagged_trace_has_zero_pmf() {
        assert_eq!(count_pmf(&[], 3), vec![0.0; 3]);
        assert!(count_table(&QueueTrace::default()).is_empty());
    }

    #[test]
    fn table_statistic_matches_empirical_distance() {
        let trace = run_queue(&QueueConfig {
            service_time: 0.008,
            ..short_run()
        })
        .unwrap();
        let rows = count_table(&trace);
        let to_ecdf = |v: &[u64]| Ecdf::new(v.iter().map(|&c| c as f64).collect()).unwrap();
        let expected = two_sample_statistic(&to_ecdf(&trace.total), &to_ecdf(&trace.tagged));
        assert_abs_diff_eq!(table_statistic(&rows), expected, epsilon = 1e-12);
    }
}
