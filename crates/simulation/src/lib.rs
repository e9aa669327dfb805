//! Simulation harness for ISC significance tests.
//!
//! Generates compound-symmetric Gaussian data with a known inter-subject
//! correlation, runs randomization tests (and a parametric t-test baseline)
//! on it, and tallies false-positive rates for single parameter sets or a
//! whole grid of subject counts and durations.

pub mod generator;
pub mod grid;
pub mod harness;
pub mod kind;
pub mod ttest;

pub use generator::{correlated_data, correlated_dataset};
pub use grid::{grid_cells, grid_tests, run_cell, run_grid, GridCell, GridReport, GridRow};
pub use harness::{run_fpr, FprReport, SimulationParams};
pub use kind::{TestKind, TestOutcome};
pub use ttest::{one_sample_ttest, ttest_p_values, TTestResult};
