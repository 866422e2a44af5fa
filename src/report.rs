//! Rendering of computed values for the command line
//!
//! Every text report interpolates the computed number into its line; JSON
//! reports serialize the same records.

use serde::Serialize;

use crate::config::{OutputFormat, ToolConfig};
use crate::ecdf::TwoSampleResult;
use crate::kolmogorov::{Evaluation, Method};
use crate::params::KsParams;
use crate::simulate::MonteCarloEstimate;
use crate::KsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    PValue,
    Cdf,
    OneSidedPValue,
    CriticalValue,
}

impl Quantity {
    pub fn label(&self) -> &'static str {
        match self {
            Quantity::PValue | Quantity::OneSidedPValue => "p-value",
            Quantity::Cdf => "cdf",
            Quantity::CriticalValue => "critical value",
        }
    }
}

/// A single computed value and what it was computed from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub quantity: Quantity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    pub sample_size: u64,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,
}

impl Report {
    pub fn from_evaluation(quantity: Quantity, params: &KsParams, evaluation: Evaluation) -> Self {
        Self {
            quantity,
            statistic: Some(params.statistic),
            alpha: None,
            sample_size: params.sample_size,
            value: evaluation.probability,
            method: Some(evaluation.method),
        }
    }

    pub fn one_sided(params: &KsParams, value: f64) -> Self {
        Self {
            quantity: Quantity::OneSidedPValue,
            statistic: Some(params.statistic),
            alpha: None,
            sample_size: params.sample_size,
            value,
            method: Some(Method::Smirnov),
        }
    }

    pub fn critical(alpha: f64, sample_size: u64, value: f64) -> Self {
        Self {
            quantity: Quantity::CriticalValue,
            statistic: None,
            alpha: Some(alpha),
            sample_size,
            value,
            method: None,
        }
    }
}

/// Exact value next to its simulated estimate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub statistic: f64,
    pub sample_size: u64,
    pub exact: f64,
    pub estimate: MonteCarloEstimate,
}

/// Queue run summary and the comparison of its two count files
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueReport {
    pub arrivals: usize,
    pub tagged: usize,
    /// Largest count seen by any arrival
    pub max_count: u64,
    pub comparison: TwoSampleResult,
}

pub fn format_value(value: f64, precision: Option<usize>) -> String {
    match precision {
        Some(digits) => format!("{value:.digits$}"),
        None => format!("{value}"),
    }
}

pub fn render_report(report: &Report, config: &ToolConfig) -> Result<String, KsError> {
    match config.format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => Ok(format!(
            "{}: {}",
            report.quantity.label(),
            format_value(report.value, config.precision)
        )),
    }
}

pub fn render_two_sample(result: &TwoSampleResult, config: &ToolConfig) -> Result<String, KsError> {
    match config.format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Text => Ok([
            format!("statistic: {}", format_value(result.statistic, config.precision)),
            format!(
                "samples: {} / {} (effective n = {})",
                result.n1, result.n2, result.effective_n
            ),
            format!("p-value: {}", format_value(result.p_value, config.precision)),
        ]
        .join("\n")),
    }
}

pub fn render_simulation(
    report: &SimulationReport,
    config: &ToolConfig,
) -> Result<String, KsError> {
    match config.format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => Ok([
            format!("p-value: {}", format_value(report.exact, config.precision)),
            format!(
                "simulated p-value: {} +/- {} ({} runs, seed {})",
                format_value(report.estimate.probability, config.precision),
                format_value(report.estimate.std_error, config.precision),
                report.estimate.runs,
                report.estimate.seed
            ),
        ]
        .join("\n")),
    }
}

pub fn render_queue(report: &QueueReport, config: &ToolConfig) -> Result<String, KsError> {
    match config.format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => Ok(format!(
            "arrivals: {} (tagged: {}, max count: {})\n{}",
            report.arrivals,
            report.tagged,
            report.max_count,
            render_two_sample(&report.comparison, config)?
        )),
    }
}
