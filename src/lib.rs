//! kstwo - Kolmogorov-Smirnov two-sided distribution
//!
//! Evaluates the distribution of the two-sided Kolmogorov-Smirnov statistic
//! `D_n = sup |F_n(x) - F(x)|` for a sample of size `n` under the null
//! hypothesis. The survival function of that distribution is the p-value of
//! an observed statistic.
//!
//! ```
//! let p = kstwo::evaluate(0.5, 10).unwrap();
//! assert!(p > 0.0 && p < 0.01);
//! ```

pub mod config;
pub mod ecdf;
pub mod io;
pub mod kolmogorov;
pub mod params;
pub mod queue;
pub mod report;
pub mod simulate;
pub mod smirnov;

use thiserror::Error;

// Re-export main types
pub use config::{OutputFormat, ToolConfig};
pub use ecdf::{one_sample_statistic, two_sample_statistic, two_sample_test, Ecdf, TwoSampleResult};
pub use kolmogorov::{
    cdf, critical_value, evaluate, evaluate_detailed, sf, Evaluation, Method, Tail,
};
pub use params::KsParams;
pub use queue::{count_table, run_queue, CountRow, QueueConfig, QueueTrace};
pub use simulate::{estimate_sf, MonteCarloConfig, MonteCarloEstimate};
pub use smirnov::smirnov_sf;

#[derive(Debug, Error)]
pub enum KsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KsError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
