//! Inter-subject correlation (ISC) engine.
//!
//! Validates multi-subject time series, computes pairwise or leave-one-out
//! ISC, summarizes it, and turns an observed statistic plus a sampled null
//! distribution into p-values. The randomization schemes that produce those
//! null distributions live in `isc-test-null`.

pub mod config;
pub mod config_loader;
pub mod correlation;
pub mod dataset;
pub mod error;
pub mod isc;
pub mod masked;
pub mod pvalue;
pub mod summary;

pub use config::{AnalysisConfig, AppConfig, GridConfig, SimulationConfig};
pub use config_loader::ConfigLoader;
pub use correlation::pearson;
pub use dataset::TimeSeriesDataset;
pub use error::{IscError, Result};
pub use isc::{
    compute_isc, isc, nan_unit_counts, subject_pairs, IscMode, IscOptions, IscResult, NanUnitCounts,
};
pub use masked::{masked_mean, masked_mean_excluding, NanTolerance};
pub use pvalue::{p_from_null, p_from_null_with, PValueMethod, Side};
pub use summary::SummaryStatistic;
