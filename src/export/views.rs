//! View Adapter
//! Reshapes pipeline outputs into the tables and chart series the dashboard displays.

use crate::data::{CombinedDataset, Country, GroupSummary, Metric, TIMESTAMP_FORMAT};
use crate::stats::MetricComparison;
use chrono::NaiveDateTime;
use serde::Serialize;

/// Reshaping knobs for chart series and ranking tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportOptions {
    /// Upper bound on points per chart series.
    pub max_series_points: usize,
    /// Rows per ranking table.
    pub top_n: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            max_series_points: 5000,
            top_n: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryCount {
    pub country: Country,
    pub records: usize,
}

/// Headline figures shown above the charts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Headline {
    pub total_records: usize,
    pub records_by_country: Vec<CountryCount>,
    pub date_range: Option<DateRange>,
}

/// One row of the combined table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    pub timestamp: String,
    pub country: Country,
    /// Values in `DatasetView::columns` metric order.
    pub values: Vec<Option<f64>>,
}

/// Chart-ready values of one metric for one country.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesView {
    pub country: Country,
    pub metric: Metric,
    pub total_points: usize,
    pub stride: usize,
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetView {
    pub columns: Vec<String>,
    pub headline: Headline,
    pub rows: Vec<RowView>,
    pub series: Vec<SeriesView>,
}

/// Box-plot statistics, copied from a GroupSummary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxView {
    pub country: Country,
    pub metric: Metric,
    pub n: usize,
    pub min: Option<f64>,
    pub q1: Option<f64>,
    pub median: Option<f64>,
    pub q3: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    pub rank: usize,
    pub country: Country,
    pub n: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
}

/// Countries ordered by mean of one metric, highest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingView {
    pub metric: Metric,
    pub entries: Vec<RankEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryView {
    pub summaries: Vec<GroupSummary>,
    pub comparisons: Vec<MetricComparison>,
    pub boxes: Vec<BoxView>,
    pub rankings: Vec<RankingView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportBundle {
    pub dataset_view: DatasetView,
    pub summary_view: SummaryView,
}

pub struct Exporter;

impl Exporter {
    /// Build both dashboard views. Inputs are only read.
    pub fn export(
        combined: &CombinedDataset,
        summaries: &[GroupSummary],
        results: &[MetricComparison],
        options: &ExportOptions,
    ) -> ExportBundle {
        let metrics = metric_order(summaries);
        ExportBundle {
            dataset_view: Self::dataset_view(combined, &metrics, options),
            summary_view: Self::summary_view(summaries, results, &metrics, options),
        }
    }

    fn dataset_view(
        combined: &CombinedDataset,
        metrics: &[Metric],
        options: &ExportOptions,
    ) -> DatasetView {
        let schema_metrics = combined.schema().metrics();
        let rows = combined
            .records()
            .iter()
            .map(|r| RowView {
                timestamp: r.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                country: r.country,
                values: schema_metrics.iter().map(|m| m.get(r)).collect(),
            })
            .collect();

        let date_range = combined
            .records()
            .iter()
            .map(|r| r.timestamp)
            .min()
            .zip(combined.records().iter().map(|r| r.timestamp).max())
            .map(|(start, end)| DateRange { start, end });

        let records_by_country = combined
            .countries()
            .iter()
            .map(|&country| CountryCount {
                country,
                records: combined.count_for(country),
            })
            .collect();

        let mut series = Vec::new();
        for &country in combined.countries() {
            for &metric in metrics {
                series.push(Self::series(combined, country, metric, options.max_series_points));
            }
        }

        DatasetView {
            columns: combined.column_names(),
            headline: Headline {
                total_records: combined.len(),
                records_by_country,
                date_range,
            },
            rows,
            series,
        }
    }

    /// Every `stride`-th non-missing point, so at most `max_points` remain.
    fn series(
        combined: &CombinedDataset,
        country: Country,
        metric: Metric,
        max_points: usize,
    ) -> SeriesView {
        let points: Vec<(NaiveDateTime, f64)> = combined
            .records()
            .iter()
            .filter(|r| r.country == country)
            .filter_map(|r| metric.get(r).map(|v| (r.timestamp, v)))
            .collect();
        let total_points = points.len();
        let stride = if max_points == 0 {
            1
        } else {
            total_points.div_ceil(max_points).max(1)
        };
        let (timestamps, values): (Vec<NaiveDateTime>, Vec<f64>) =
            points.into_iter().step_by(stride).unzip();
        SeriesView {
            country,
            metric,
            total_points,
            stride,
            timestamps,
            values,
        }
    }

    fn summary_view(
        summaries: &[GroupSummary],
        results: &[MetricComparison],
        metrics: &[Metric],
        options: &ExportOptions,
    ) -> SummaryView {
        let boxes = summaries
            .iter()
            .map(|s| BoxView {
                country: s.country,
                metric: s.metric,
                n: s.n,
                min: s.min,
                q1: s.q1,
                median: s.median,
                q3: s.q3,
                max: s.max,
                mean: s.mean,
            })
            .collect();

        let rankings = metrics
            .iter()
            .map(|&metric| {
                let mut rows: Vec<&GroupSummary> =
                    summaries.iter().filter(|s| s.metric == metric).collect();
                // undefined means sort last
                rows.sort_by(|a, b| match (a.mean, b.mean) {
                    (Some(x), Some(y)) => y.total_cmp(&x),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                });
                let entries = rows
                    .into_iter()
                    .take(options.top_n)
                    .enumerate()
                    .map(|(i, s)| RankEntry {
                        rank: i + 1,
                        country: s.country,
                        n: s.n,
                        mean: s.mean,
                        median: s.median,
                        std: s.std,
                    })
                    .collect();
                RankingView { metric, entries }
            })
            .collect();

        SummaryView {
            summaries: summaries.to_vec(),
            comparisons: results.to_vec(),
            boxes,
            rankings,
        }
    }
}

/// Metrics in first-appearance order of the summaries.
fn metric_order(summaries: &[GroupSummary]) -> Vec<Metric> {
    let mut metrics = Vec::new();
    for s in summaries {
        if !metrics.contains(&s.metric) {
            metrics.push(s.metric);
        }
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Aggregator, Dataset, Record, Schema};
    use crate::stats::{Comparator, DEFAULT_ALPHA};
    use chrono::{Duration, NaiveDate};
    use std::collections::BTreeMap;

    fn combined() -> CombinedDataset {
        let start = NaiveDate::from_ymd_opt(2021, 8, 9)
            .and_then(|d| d.and_hms_opt(6, 0, 0))
            .unwrap();
        let mut map = BTreeMap::new();
        for (country, base) in [(Country::Benin, 200.0), (Country::Togo, 400.0)] {
            let records = (0..10)
                .map(|i| {
                    let mut r = Record::empty(start + Duration::minutes(i), country);
                    r.ghi = Some(base + i as f64);
                    r.dni = if i % 2 == 0 { Some(1.0) } else { None };
                    r
                })
                .collect();
            let schema = Schema::with_metrics(&[Metric::Ghi, Metric::Dni]);
            map.insert(country, Dataset::new(country, schema, records));
        }
        map.insert(
            Country::SierraLeone,
            Dataset::new(
                Country::SierraLeone,
                Schema::with_metrics(&[Metric::Ghi, Metric::Dni]),
                Vec::new(),
            ),
        );
        Aggregator::merge(&map).unwrap()
    }

    fn bundle(options: ExportOptions) -> (CombinedDataset, ExportBundle) {
        let c = combined();
        let metrics = [Metric::Ghi, Metric::Dni];
        let summaries = Aggregator::summarize(&c, &metrics);
        let results = Comparator::compare_all(&c, &metrics, &Country::ALL, DEFAULT_ALPHA);
        let b = Exporter::export(&c, &summaries, &results, &options);
        (c, b)
    }

    #[test]
    fn dataset_view_reshapes_without_losing_rows() {
        let (c, b) = bundle(ExportOptions::default());
        let view = &b.dataset_view;
        assert_eq!(view.columns, vec!["Timestamp", "GHI", "DNI", "country"]);
        assert_eq!(view.rows.len(), c.len());
        assert_eq!(view.headline.total_records, 20);
        assert_eq!(view.headline.records_by_country[1].records, 0);
        let range = view.headline.date_range.as_ref().unwrap();
        assert_eq!(range.end - range.start, Duration::minutes(9));
        assert_eq!(view.rows[0].timestamp, "2021-08-09 06:00:00");
        assert_eq!(view.rows[1].values, vec![Some(201.0), None]);
    }

    #[test]
    fn series_are_decimated_by_stride() {
        let (_, b) = bundle(ExportOptions {
            max_series_points: 4,
            top_n: 10,
        });
        let ghi = b
            .dataset_view
            .series
            .iter()
            .find(|s| s.country == Country::Benin && s.metric == Metric::Ghi)
            .unwrap();
        assert_eq!(ghi.total_points, 10);
        assert_eq!(ghi.stride, 3);
        assert_eq!(ghi.values, vec![200.0, 203.0, 206.0, 209.0]);
        assert_eq!(ghi.timestamps.len(), 4);
    }

    #[test]
    fn rankings_put_highest_mean_first_and_undefined_last() {
        let (_, b) = bundle(ExportOptions::default());
        let ghi = &b.summary_view.rankings[0];
        assert_eq!(ghi.metric, Metric::Ghi);
        let order: Vec<Country> = ghi.entries.iter().map(|e| e.country).collect();
        assert_eq!(order, vec![Country::Togo, Country::Benin, Country::SierraLeone]);
        assert_eq!(ghi.entries[0].rank, 1);
        assert!(ghi.entries[2].mean.is_none());
    }

    #[test]
    fn top_n_truncates_rankings() {
        let (_, b) = bundle(ExportOptions {
            max_series_points: 10,
            top_n: 1,
        });
        assert!(b.summary_view.rankings.iter().all(|r| r.entries.len() == 1));
        assert_eq!(b.summary_view.boxes.len(), 6);
        assert_eq!(b.summary_view.comparisons.len(), 2);
    }

    #[test]
    fn views_serialize_undefined_as_null() {
        let (_, b) = bundle(ExportOptions::default());
        let json = serde_json::to_value(&b.summary_view).unwrap();
        let sierra = &json["boxes"][2];
        assert_eq!(sierra["country"], "SierraLeone");
        assert!(sierra["median"].is_null());
        assert_eq!(json["comparisons"][0]["status"], "computed");
    }
}
