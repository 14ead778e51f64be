//! Stats module - Descriptive statistics, profiling and group comparison

mod calculator;
mod comparator;
mod profiler;

pub use calculator::{Descriptive, StatsCalculator};
pub use comparator::{
    CompareError, Comparator, ComparisonResult, GroupCount, MetricComparison, RankStatistic,
    DEFAULT_ALPHA,
};
pub use profiler::{ColumnProfile, Profiler, Quartiles};
