//! CSV Data Loader Module
//! Reads a per-country station log into a typed Dataset using Polars.

use super::model::{Country, Dataset, LoadReport, Metric, Record, Schema, TIMESTAMP_COLUMN};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use polars::prelude::*;
use std::path::Path;
use thiserror::Error;

/// Cell contents treated as a missing measurement rather than a parse failure.
const NULL_MARKERS: [&str; 6] = ["", "NA", "NaN", "nan", "null", "NULL"];

/// Timestamp layouts tried when the caller supplies none.
pub const DEFAULT_TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    Polars(#[from] PolarsError),
    #[error("Schema mismatch: missing required columns {missing:?}")]
    SchemaMismatch { missing: Vec<String> },
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Schema and timestamp layouts a load must conform to.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub schema: Schema,
    pub timestamp_formats: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            schema: Schema::solar(),
            timestamp_formats: DEFAULT_TIMESTAMP_FORMATS
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }
}

/// Handles CSV file loading with Polars.
pub struct DataLoader;

impl DataLoader {
    /// Load a station CSV for `country`.
    pub fn load(
        path: &Path,
        country: Country,
        options: &LoadOptions,
    ) -> Result<Dataset, LoaderError> {
        let path_str = path.to_string_lossy().to_string();
        info!("Loading {country} from {path_str}");

        // Every column is read as text so unparsable cells can be counted
        let df = LazyCsvReader::new(&path_str)
            .with_infer_schema_length(Some(0))
            .finish()?
            .collect()?;

        Self::from_frame(&df, country, options)
    }

    /// Convert a string-typed frame into a Dataset, rejecting rows that do not conform.
    pub fn from_frame(
        df: &DataFrame,
        country: Country,
        options: &LoadOptions,
    ) -> Result<Dataset, LoaderError> {
        let schema = &options.schema;
        let missing: Vec<String> = schema
            .column_names()
            .into_iter()
            .filter(|name| df.column(name).is_err())
            .collect();
        if !missing.is_empty() {
            return Err(LoaderError::SchemaMismatch { missing });
        }

        let expected = schema.column_names();
        for name in df.get_column_names() {
            if !expected.iter().any(|e| e == name.as_str()) {
                debug!("Ignoring extra column '{name}'");
            }
        }

        let timestamps = Self::text_column(df, TIMESTAMP_COLUMN)?;
        let metric_cells: Vec<(Metric, Vec<Option<&str>>)> = schema
            .metrics()
            .iter()
            .map(|m| -> Result<_, LoaderError> {
                Ok((*m, Self::text_column(df, m.column_name())?))
            })
            .collect::<Result<_, _>>()?;

        let mut report = LoadReport {
            rows_read: df.height(),
            rejected_by_column: schema
                .metrics()
                .iter()
                .map(|m| (m.column_name().to_string(), 0))
                .collect(),
            ..LoadReport::default()
        };

        let mut records = Vec::with_capacity(df.height());
        'rows: for (i, ts_cell) in timestamps.iter().enumerate() {
            let parsed = ts_cell.and_then(|s| parse_timestamp(s, &options.timestamp_formats));
            let Some(timestamp) = parsed else {
                report.rejected_timestamps += 1;
                continue;
            };

            let mut record = Record::empty(timestamp, country);
            for (col_idx, (metric, cells)) in metric_cells.iter().enumerate() {
                match parse_value(cells[i]) {
                    Ok(value) => metric.set(&mut record, value),
                    Err(()) => {
                        report.rejected_values += 1;
                        report.rejected_by_column[col_idx].1 += 1;
                        continue 'rows;
                    }
                }
            }
            records.push(record);
        }

        report.rows_loaded = records.len();
        if report.rejected_total() > 0 {
            warn!(
                "{country}: dropped {} rows ({} bad timestamps, {} bad values)",
                report.rejected_total(),
                report.rejected_timestamps,
                report.rejected_values
            );
        }
        info!("{country}: loaded {} of {} rows", report.rows_loaded, report.rows_read);

        Ok(Dataset::new(country, schema.clone(), records).with_load_report(report))
    }

    fn text_column<'a>(df: &'a DataFrame, name: &str) -> Result<Vec<Option<&'a str>>, LoaderError> {
        let series = df.column(name)?.as_materialized_series();
        let ca = series
            .str()
            .map_err(|_| LoaderError::Parse(format!("column '{name}' is not textual")))?;
        Ok(ca.into_iter().collect())
    }
}

/// Parse a timestamp cell into the canonical naive representation.
pub fn parse_timestamp(raw: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for format in formats {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// `Ok(None)` for a missing cell, `Err` when the cell holds something that is not a number.
fn parse_value(cell: Option<&str>) -> Result<Option<f64>, ()> {
    let Some(raw) = cell.map(str::trim) else {
        return Ok(None);
    };
    if NULL_MARKERS.contains(&raw) {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    const HEADER: &str = "Timestamp,GHI,DNI,DHI,ModA,Tamb,RH,WS,WD,Comments\n";

    #[test]
    fn loads_rows_and_ignores_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let body = [
            HEADER,
            "2021-08-09 00:01,1.5,0,2,0,26.2,93.4,0.0,0,\n",
            "2021-08-09 00:02,,0.1,2,0,26.2,93.6,1.1,120,x\n",
        ]
        .concat();
        let path = write_csv(&dir, "benin.csv", &body);

        let ds = DataLoader::load(&path, Country::Benin, &LoadOptions::default()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records()[0].ghi, Some(1.5));
        assert_eq!(ds.records()[1].ghi, None);
        assert_eq!(ds.records()[1].wind_direction, Some(120.0));
        assert_eq!(ds.load_report().rejected_total(), 0);
    }

    #[test]
    fn missing_required_column_is_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "togo.csv", "Timestamp,GHI,DNI\n2021-08-09 00:01,1,2\n");

        let err = DataLoader::load(&path, Country::Togo, &LoadOptions::default()).unwrap_err();
        match err {
            LoaderError::SchemaMismatch { missing } => {
                assert_eq!(missing, vec!["DHI", "Tamb", "RH", "WS", "WD"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_rows_are_dropped_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        let body = [
            HEADER,
            "not-a-date,1,0,2,0,26,93,0,0,\n",
            "2021-08-09 00:02,abc,0,2,0,26,93,0,0,\n",
            ",1,0,2,0,26,93,0,0,\n",
            "2021-08-09 00:04,3,0,2,0,26,93,0,0,\n",
        ]
        .concat();
        let path = write_csv(&dir, "sl.csv", &body);

        let ds = DataLoader::load(&path, Country::SierraLeone, &LoadOptions::default()).unwrap();
        let report = ds.load_report();
        assert_eq!(ds.len(), 1);
        assert_eq!(report.rows_read, 4);
        assert_eq!(report.rejected_timestamps, 2);
        assert_eq!(report.rejected_values, 1);
        assert_eq!(report.rejected_by_column[0], ("GHI".to_string(), 1));
    }

    #[test]
    fn narrower_schema_only_requires_its_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "b.csv", "Timestamp,GHI\n2021-08-09T00:01:00,4\n");
        let options = LoadOptions {
            schema: Schema::with_metrics(&[Metric::Ghi]),
            ..LoadOptions::default()
        };

        let ds = DataLoader::load(&path, Country::Benin, &options).unwrap();
        assert_eq!(ds.values(Metric::Ghi), vec![4.0]);
        assert_eq!(ds.records()[0].dni, None);
    }

    #[test]
    fn timestamp_layouts() {
        let formats: Vec<String> =
            DEFAULT_TIMESTAMP_FORMATS.iter().map(|f| f.to_string()).collect();
        assert!(parse_timestamp("2021-08-09 00:01", &formats).is_some());
        assert!(parse_timestamp("2021-08-09T00:01:30", &formats).is_some());
        assert!(parse_timestamp("2021-08-09T00:01:30+01:00", &formats).is_some());
        assert!(parse_timestamp("2021-08-09", &formats).is_some());
        assert!(parse_timestamp("09/08/2021", &formats).is_none());

        let fractional = parse_timestamp("2021-08-09 00:02:30.5", &formats).unwrap();
        assert_eq!(fractional.and_utc().timestamp_subsec_millis(), 500);
        assert!(parse_timestamp("2021-08-09T00:02:30.250", &formats).is_some());
    }

    #[test]
    fn fractional_second_rows_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let body = [
            HEADER,
            "2021-08-09 00:02:30.5,1,0,2,0,26,93,0,0,\n",
            "2021-08-09 00:02:31,2,0,2,0,26,93,0,0,\n",
        ]
        .concat();
        let path = write_csv(&dir, "togo.csv", &body);

        let ds = DataLoader::load(&path, Country::Togo, &LoadOptions::default()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.load_report().rejected_timestamps, 0);
    }

    #[test]
    fn value_cells() {
        assert_eq!(parse_value(None), Ok(None));
        assert_eq!(parse_value(Some(" NaN ")), Ok(None));
        assert_eq!(parse_value(Some("-1.25")), Ok(Some(-1.25)));
        assert_eq!(parse_value(Some("inf")), Err(()));
        assert_eq!(parse_value(Some("12a")), Err(()));
    }
}
