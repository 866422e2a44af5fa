use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use kstwo::config::{load_config, OutputFormat, ToolConfig};
use kstwo::io::{
    distribution_grid, read_samples_file, write_count_table_csv, write_counts, write_grid_csv,
    COUNT_TABLE_FILE, TAGGED_COUNTS_FILE, TOTAL_COUNTS_FILE,
};
use kstwo::params::{parse_sample_size, parse_statistic};
use kstwo::report::{
    render_queue, render_report, render_simulation, render_two_sample, QueueReport, Quantity,
    Report, SimulationReport,
};
use kstwo::{
    count_table, critical_value, estimate_sf, evaluate_detailed, run_queue, smirnov_sf,
    two_sample_test, KsParams, QueueConfig, Tail,
};
use log::info;

#[derive(Debug, Parser)]
#[command(name = "kstwo", version)]
#[command(about = "p-values from the two-sided Kolmogorov-Smirnov distribution")]
#[command(subcommand_negates_reqs = true)]
struct Cli {
    /// Observed statistic D
    #[arg(required = true, allow_negative_numbers = true)]
    statistic: Option<String>,

    /// Sample size N
    #[arg(required = true, allow_negative_numbers = true)]
    sample_size: Option<String>,

    /// JSON configuration file (defaults to ./kstwo.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, global = true)]
    format: Option<OutputFormat>,

    /// Digits after the decimal point
    #[arg(long, global = true)]
    precision: Option<usize>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Args)]
struct PointArgs {
    /// Observed statistic D
    #[arg(allow_negative_numbers = true)]
    statistic: String,

    /// Sample size N
    #[arg(allow_negative_numbers = true)]
    sample_size: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Two-sided p-value P(D_N > D) (same as the bare invocation)
    Sf(PointArgs),
    /// Two-sided CDF P(D_N <= D)
    Cdf(PointArgs),
    /// One-sided p-value P(D_N+ >= D)
    OneSided(PointArgs),
    /// Smallest D whose p-value is at most ALPHA
    Critical {
        /// Significance level in (0, 1]
        #[arg(allow_negative_numbers = true)]
        alpha: String,

        /// Sample size N
        #[arg(allow_negative_numbers = true)]
        sample_size: String,
    },
    /// CSV table of the distribution over D in [0, 1]
    Grid {
        /// Sample size N
        #[arg(allow_negative_numbers = true)]
        sample_size: String,

        /// Number of equally spaced statistics
        #[arg(long)]
        points: Option<usize>,

        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Two-sample statistic and asymptotic p-value from two observation files
    TwoSample {
        /// First observation file, one value per line
        first: PathBuf,

        /// Second observation file, one value per line
        second: PathBuf,
    },
    /// Monte Carlo estimate of P(D_N > D) next to the exact value
    Simulate {
        #[command(flatten)]
        point: PointArgs,

        /// Number of simulated samples
        #[arg(long)]
        runs: Option<usize>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Queue simulation: system size seen by all and by tagged arrivals
    Queue {
        /// Probability that an arrival is tagged
        #[arg(short = 'p', long, allow_negative_numbers = true)]
        tag_probability: f64,

        /// Mean arrivals per second
        #[arg(short = 'm', long, allow_negative_numbers = true)]
        arrival_rate: f64,

        /// Service time per customer, in seconds
        #[arg(short = 'd', long, allow_negative_numbers = true)]
        service_time: f64,

        /// Simulated seconds
        #[arg(long)]
        duration: Option<f64>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Directory for the count files and the distribution table
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut cfg = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(v) = cli.format {
        cfg.format = v;
    }
    if let Some(v) = cli.precision {
        cfg.precision = Some(v);
    }
    cfg.validate()?;

    let command = match cli.command {
        Some(command) => command,
        None => Command::Sf(PointArgs {
            statistic: cli.statistic.unwrap_or_default(),
            sample_size: cli.sample_size.unwrap_or_default(),
        }),
    };

    run(command, cfg)
}

fn run(command: Command, mut cfg: ToolConfig) -> anyhow::Result<()> {
    match command {
        Command::Sf(point) => {
            let params = KsParams::parse(&point.statistic, &point.sample_size)?;
            let evaluation = evaluate_detailed(&params, Tail::Upper);
            let report = Report::from_evaluation(Quantity::PValue, &params, evaluation);
            println!("{}", render_report(&report, &cfg)?);
        }
        Command::Cdf(point) => {
            let params = KsParams::parse(&point.statistic, &point.sample_size)?;
            let evaluation = evaluate_detailed(&params, Tail::Lower);
            let report = Report::from_evaluation(Quantity::Cdf, &params, evaluation);
            println!("{}", render_report(&report, &cfg)?);
        }
        Command::OneSided(point) => {
            let params = KsParams::parse(&point.statistic, &point.sample_size)?;
            let value = smirnov_sf(params.statistic, params.sample_size)?;
            println!("{}", render_report(&Report::one_sided(&params, value), &cfg)?);
        }
        Command::Critical { alpha, sample_size } => {
            let alpha = parse_statistic(&alpha).context("invalid significance level")?;
            let n = parse_sample_size(&sample_size)?;
            let value = critical_value(alpha, n)?;
            println!("{}", render_report(&Report::critical(alpha, n, value), &cfg)?);
        }
        Command::Grid {
            sample_size,
            points,
            output,
        } => {
            if let Some(v) = points {
                cfg.grid_points = v;
            }
            cfg.validate()?;
            let n = parse_sample_size(&sample_size)?;
            let rows = distribution_grid(n, &cfg.statistic_grid())?;
            match output {
                Some(path) => {
                    write_grid_csv(create_file(&path)?, &rows)?;
                    info!("wrote {} rows to {}", rows.len(), path.display());
                    println!("Grid: {}", path.display());
                }
                None => write_grid_csv(io::stdout().lock(), &rows)?,
            }
        }
        Command::TwoSample { first, second } => {
            let a = read_samples_file(&first)
                .with_context(|| format!("failed to read samples from {}", first.display()))?;
            let b = read_samples_file(&second)
                .with_context(|| format!("failed to read samples from {}", second.display()))?;
            let result = two_sample_test(a, b)?;
            println!("{}", render_two_sample(&result, &cfg)?);
        }
        Command::Simulate { point, runs, seed } => {
            if let Some(v) = runs {
                cfg.monte_carlo_runs = v;
            }
            if let Some(v) = seed {
                cfg.seed = v;
            }
            cfg.validate()?;
            let params = KsParams::parse(&point.statistic, &point.sample_size)?;
            let exact = evaluate_detailed(&params, Tail::Upper).probability;
            let estimate = estimate_sf(&params, &cfg.monte_carlo())?;
            let report = SimulationReport {
                statistic: params.statistic,
                sample_size: params.sample_size,
                exact,
                estimate,
            };
            println!("{}", render_simulation(&report, &cfg)?);
        }
        Command::Queue {
            tag_probability,
            arrival_rate,
            service_time,
            duration,
            seed,
            output_dir,
        } => {
            if let Some(v) = duration {
                cfg.queue_duration = v;
            }
            if let Some(v) = seed {
                cfg.seed = v;
            }
            cfg.validate()?;
            let config = QueueConfig {
                tag_probability,
                arrival_rate,
                service_time,
                duration: cfg.queue_duration,
                seed: cfg.seed,
            };
            let trace = run_queue(&config)?;

            fs::create_dir_all(&output_dir)
                .with_context(|| format!("failed to create {}", output_dir.display()))?;
            write_counts(create_file(&output_dir.join(TOTAL_COUNTS_FILE))?, &trace.total)?;
            write_counts(create_file(&output_dir.join(TAGGED_COUNTS_FILE))?, &trace.tagged)?;
            let rows = count_table(&trace);
            write_count_table_csv(create_file(&output_dir.join(COUNT_TABLE_FILE))?, &rows)?;
            info!("wrote queue counts to {}", output_dir.display());

            let as_samples =
                |counts: &[u64]| -> Vec<f64> { counts.iter().map(|&c| c as f64).collect() };
            let comparison = two_sample_test(as_samples(&trace.total), as_samples(&trace.tagged))
                .context("need at least one tagged arrival to compare")?;
            let report = QueueReport {
                arrivals: trace.total.len(),
                tagged: trace.tagged.len(),
                max_count: trace.total.iter().copied().max().unwrap_or(0),
                comparison,
            };
            println!("{}", render_queue(&report, &cfg)?);
        }
    }

    Ok(())
}

fn create_file(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}
