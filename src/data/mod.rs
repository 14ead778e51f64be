//! Data module - loading, cleaning and merging station logs

mod aggregator;
mod cleaner;
mod loader;
mod model;

pub use aggregator::{AggregateError, Aggregator, CombinedDataset, GroupSummary};
pub use cleaner::{
    Cleaner, CleaningDecision, CleaningMethod, CleaningReport, ColumnCleaning, DEFAULT_Z_THRESHOLD,
};
pub use loader::{parse_timestamp, DataLoader, LoadOptions, LoaderError, DEFAULT_TIMESTAMP_FORMATS};
pub use model::{
    Country, Dataset, LoadReport, Metric, ModelError, Record, Schema, SemanticType, COUNTRY_COLUMN,
    TIMESTAMP_COLUMN, TIMESTAMP_FORMAT,
};
