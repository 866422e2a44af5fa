use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, Trim, WriterBuilder};
use log::debug;
use serde::Serialize;

use crate::kolmogorov::{evaluate_detailed, Method, Tail};
use crate::params::KsParams;
use crate::queue::CountRow;
use crate::KsError;

/// Counts seen by every arrival of a queue run
pub const TOTAL_COUNTS_FILE: &str = "event_data.txt";
/// Counts seen by tagged arrivals
pub const TAGGED_COUNTS_FILE: &str = "event_data_tagged.txt";
/// PMF and CDF of both count files
pub const COUNT_TABLE_FILE: &str = "count_distribution.csv";

/// One line of the distribution table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridRow {
    pub statistic: f64,
    pub cdf: f64,
    pub sf: f64,
    pub method: Method,
}

/// Evaluate both tails at every statistic of `grid`
pub fn distribution_grid(sample_size: u64, grid: &[f64]) -> Result<Vec<GridRow>, KsError> {
    grid.iter()
        .map(|&statistic| {
            let params = KsParams::new(statistic, sample_size)?;
            let upper = evaluate_detailed(&params, Tail::Upper);
            let lower = evaluate_detailed(&params, Tail::Lower);
            Ok(GridRow {
                statistic,
                cdf: lower.probability,
                sf: upper.probability,
                method: upper.method,
            })
        })
        .collect()
}

pub fn write_grid_csv<W: Write>(writer: W, rows: &[GridRow]) -> Result<(), KsError> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// One count per line, readable by [`read_samples`]
pub fn write_counts<W: Write>(writer: W, counts: &[u64]) -> Result<(), KsError> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    for count in counts {
        wtr.write_record([count.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_count_table_csv<W: Write>(writer: W, rows: &[CountRow]) -> Result<(), KsError> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read one observation per record (first column, no header, `#` comments)
pub fn read_samples<R: Read>(reader: R) -> Result<Vec<f64>, KsError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let mut samples = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        let Some(field) = record.get(0) else {
            continue;
        };
        if field.is_empty() {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or(idx as u64 + 1);
        let value = field.parse::<f64>().map_err(|_| {
            KsError::invalid(format!("line {line}: cannot parse {field:?} as a number"))
        })?;
        samples.push(value);
    }

    Ok(samples)
}

pub fn read_samples_file(path: &Path) -> Result<Vec<f64>, KsError> {
    let file = std::fs::File::open(path)?;
    let samples = read_samples(file)?;
    debug!("read {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn reads_first_column_and_skips_comments() {
        let input = "# counts\n3\n 4 \n\n5,ignored\n";
        let samples = read_samples(input.as_bytes()).unwrap();
        assert_eq!(samples, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn reports_bad_values_with_line() {
        let err = read_samples("1\n2\nthree\n".as_bytes()).unwrap_err();
        match err {
            KsError::InvalidArgument(message) => assert!(message.contains("line 3"), "{message}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0.5\n0.25").unwrap();
        assert_eq!(read_samples_file(file.path()).unwrap(), vec![0.5, 0.25]);
    }

    #[test]
    fn counts_read_back_as_samples() {
        let mut out = Vec::new();
        write_counts(&mut out, &[0, 3, 1]).unwrap();
        assert_eq!(String::from_utf8(out.clone()).unwrap(), "0\n3\n1\n");
        assert_eq!(read_samples(out.as_slice()).unwrap(), vec![0.0, 3.0, 1.0]);
    }

    #[test]
    fn count_table_layout() {
        let rows = [CountRow {
            count: 0,
            total_pmf: 0.5,
            total_cdf: 0.5,
            tagged_pmf: 1.0,
            tagged_cdf: 1.0,
        }];
        let mut out = Vec::new();
        write_count_table_csv(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "count,total_pmf,total_cdf,tagged_pmf,tagged_cdf");
        assert_eq!(lines[1], "0,0.5,0.5,1.0,1.0");
    }

    #[test]
    fn grid_rows_are_complementary() {
        let rows = distribution_grid(10, &[0.0, 0.2, 0.5, 1.0]).unwrap();
        assert_eq!(rows.len(), 4);
        for row in &rows {
            assert_abs_diff_eq!(row.cdf + row.sf, 1.0, epsilon = 1e-12);
        }
        assert_eq!(rows[0].sf, 1.0);
        assert_eq!(rows[3].sf, 0.0);
        assert_eq!(rows[1].method, Method::DurbinMatrix);
    }

    #[test]
    fn grid_csv_layout() {
        let rows = distribution_grid(10, &[0.0, 1.0]).unwrap();
        let mut out = Vec::new();
        write_grid_csv(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "statistic,cdf,sf,method");
        assert_eq!(lines[1], "0.0,0.0,1.0,boundary");
        assert_eq!(lines[2], "1.0,1.0,0.0,boundary");
    }
}
