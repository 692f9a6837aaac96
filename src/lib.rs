//! annobin - interval annotations to binary time series
//!
//! annobin turns manually coded annotation exports (tiers of labeled intervals
//! with start/end times in milliseconds) into fixed-interval binary series and
//! combines coded channels per subject through a deterministic pipeline:
//! interval loading → grid resampling → channel merge → conjunction.
//!
//! ## Modules
//!
//! - **Loading**: `schema` parses exports and extracts one tier's intervals
//! - **Resampling**: `grid` and `resampler` map intervals onto 100 ms bins
//! - **Combining**: `merger` (OR with provenance) and `reducer` (inner-join AND)
//! - **Batch**: `subject`, `storage`, `config` and `pipeline` run whole folders

pub mod config;
pub mod error;
pub mod grid;
pub mod merger;
pub mod pipeline;
pub mod reducer;
pub mod report;
pub mod resampler;
pub mod schema;
pub mod storage;
pub mod subject;
pub mod types;

pub use config::PipelineConfig;
pub use error::BinarizeError;
pub use grid::TimeGrid;
pub use merger::ChannelMerger;
pub use pipeline::BatchProcessor;
pub use reducer::ConjunctionReducer;
pub use report::{BatchReport, StageReport};
pub use resampler::{ActivationRule, GridResampler, OverlapPolicy};
pub use schema::{AnnotationAdapter, AnnotationRecord, ColumnLayout};
pub use subject::{KeyPolicy, SubjectKey, SuffixConvention};
pub use types::{BinaryRow, BinarySeries, Interval, MergedRow, MergedSeries, Provenance};

/// annobin version
pub const ANNOBIN_VERSION: &str = env!("CARGO_PKG_VERSION");
