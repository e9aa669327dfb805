pub mod analyze;
pub mod format;
pub mod fpr;
pub mod grid;
pub mod simulate;

pub use analyze::{run_analyze, AnalyzeArgs};
pub use fpr::{run_fpr, FprArgs};
pub use grid::{run_grid, GridArgs};
pub use simulate::{run_simulate, SimulateArgs};
