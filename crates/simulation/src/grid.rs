//! Parameter sweep over subject counts, durations and tests.
//!
//! One grid run uses one seed: every (subjects × duration) cell simulates a
//! single dataset from that seed and runs every configured test on it. Many
//! seeds, run as separate jobs, together give a false-positive rate per cell.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use isc_test_core::{AnalysisConfig, GridConfig, IscMode};
use isc_test_null::NullConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::generator::correlated_dataset;
use crate::kind::TestKind;

/// Dataset size of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridCell {
    pub n_subjects: usize,
    pub n_time_points: usize,
}

/// p-value of one test on one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    pub test: TestKind,
    pub n_subjects: usize,
    pub n_time_points: usize,
    pub p_value: f64,
}

/// Column-oriented results of one grid run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridReport {
    pub seed: u64,
    pub pairwise: bool,
    pub true_correlation: f64,
    pub n_trials: usize,
    pub generated_at: DateTime<Utc>,
    pub test: Vec<TestKind>,
    #[serde(rename = "subjects (N)")]
    pub subjects: Vec<usize>,
    #[serde(rename = "duration (TRs)")]
    pub duration: Vec<usize>,
    #[serde(rename = "p-values")]
    pub p_values: Vec<f64>,
}

impl GridReport {
    #[must_use]
    pub fn from_rows(config: &GridConfig, seed: u64, rows: Vec<GridRow>) -> Self {
        let mut report = Self {
            seed,
            pairwise: config.pairwise,
            true_correlation: config.true_correlation,
            n_trials: config.n_trials,
            generated_at: Utc::now(),
            test: Vec::with_capacity(rows.len()),
            subjects: Vec::with_capacity(rows.len()),
            duration: Vec::with_capacity(rows.len()),
            p_values: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            report.test.push(row.test);
            report.subjects.push(row.n_subjects);
            report.duration.push(row.n_time_points);
            report.p_values.push(row.p_value);
        }
        report
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.p_values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.p_values.is_empty()
    }

    /// File name for this run, e.g. `isc-loo_sim-7_pvals.json`.
    #[must_use]
    pub fn file_name(&self) -> String {
        let design = if self.pairwise { "pw" } else { "loo" };
        format!("isc-{design}_sim-{}_pvals.json", self.seed)
    }

    /// Writes the report as pretty JSON under `dir`, creating it if needed.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be written.
    pub fn write_json(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Parses the configured test names.
///
/// # Errors
/// Returns an error naming the first unknown test.
pub fn grid_tests(config: &GridConfig) -> Result<Vec<TestKind>> {
    config
        .tests
        .iter()
        .map(|name| {
            name.parse::<TestKind>()
                .with_context(|| format!("invalid grid test '{name}'"))
        })
        .collect()
}

/// Cells in sweep order: subject counts outer, durations inner.
#[must_use]
pub fn grid_cells(config: &GridConfig) -> Vec<GridCell> {
    config
        .n_subjects
        .iter()
        .flat_map(|&n_subjects| {
            config.n_time_points.iter().map(move |&n_time_points| GridCell {
                n_subjects,
                n_time_points,
            })
        })
        .collect()
}

/// Simulates one cell and runs every test on it.
///
/// Statistic, tolerance, side and p-value method come from `analysis`;
/// design, trial count and seed come from the grid.
///
/// # Errors
/// Returns an error if data generation or a test fails.
pub fn run_cell(
    cell: GridCell,
    tests: &[TestKind],
    config: &GridConfig,
    analysis: &AnalysisConfig,
    seed: u64,
) -> Result<Vec<GridRow>> {
    let dataset = correlated_dataset(
        cell.n_time_points,
        cell.n_subjects,
        config.true_correlation,
        seed,
    )
    .with_context(|| format!("failed to simulate {cell:?}"))?;
    let null_config = NullConfig {
        mode: IscMode::from_pairwise(config.pairwise),
        n_trials: config.n_trials,
        seed: Some(seed),
        ..NullConfig::from(analysis)
    };

    tests
        .iter()
        .map(|test| {
            let outcome = test
                .run(&dataset, &null_config)
                .with_context(|| format!("{test} failed on {cell:?}"))?;
            let p_value = outcome.p_values.first().copied().unwrap_or(f64::NAN);
            info!(
                %test,
                n_subjects = cell.n_subjects,
                n_time_points = cell.n_time_points,
                p_value,
                "finished grid cell"
            );
            Ok(GridRow {
                test: *test,
                n_subjects: cell.n_subjects,
                n_time_points: cell.n_time_points,
                p_value,
            })
        })
        .collect()
}

/// Runs every cell of the grid for one seed.
///
/// # Errors
/// Returns an error for an unknown test name or a failing cell.
pub fn run_grid(config: &GridConfig, analysis: &AnalysisConfig, seed: u64) -> Result<GridReport> {
    let tests = grid_tests(config)?;
    let mut rows = Vec::new();
    for cell in grid_cells(config) {
        rows.extend(run_cell(cell, &tests, config, analysis, seed)?);
    }
    Ok(GridReport::from_rows(config, seed, rows))
}
