//! Export module - dashboard views and persisted artifacts

mod views;
mod writer;

pub use views::{
    BoxView, CountryCount, DatasetView, DateRange, ExportBundle, ExportOptions, Exporter, Headline,
    RankEntry, RankingView, RowView, SeriesView, SummaryView,
};
pub use writer::{ArtifactWriter, ExportError, CLEAN_SUFFIX};
