//! Analyze CLI command.
//!
//! Loads recorded time series from CSV, computes the observed ISC and tests
//! it against the chosen null distribution (or the parametric t-test).

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use ndarray::Array2;
use serde::Serialize;

use isc_test_core::{
    AnalysisConfig, IscMode, PValueMethod, Side, SummaryStatistic, TimeSeriesDataset,
};
use isc_test_null::NullConfig;
use isc_test_simulation::{TestKind, TestOutcome};

use super::format::{format_p, OutputFormat};

/// Arguments for the analyze command.
#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// One CSV per subject: rows are time points, columns are units
    #[arg(required = true, num_args = 1..)]
    pub inputs: Vec<String>,

    /// Read a single (time point x subject) CSV as a one-unit dataset
    #[arg(long)]
    pub matrix: bool,

    /// Input files have no header row
    #[arg(long)]
    pub no_header: bool,

    /// Test: signflip, timeshift, phaseshift, permutation, bootstrap, ttest
    #[arg(short, long, default_value = "timeshift")]
    pub test: String,

    /// ISC design: pairwise, leave-one-out (default from config)
    #[arg(long)]
    pub mode: Option<String>,

    /// Summary statistic: mean, median (default from config)
    #[arg(long)]
    pub summary: Option<String>,

    /// Tail: two-sided, greater, less (default from config)
    #[arg(long)]
    pub side: Option<String>,

    /// Number of randomized samples (default from config)
    #[arg(long)]
    pub n_trials: Option<usize>,

    /// Initial seed; a fresh one is drawn and reported when absent
    #[arg(long)]
    pub seed: Option<u64>,

    /// Missing data in the leave-one-out mean: strict, true, or the minimum
    /// fraction of non-missing subjects
    #[arg(long)]
    pub tolerate_nans: Option<String>,

    /// Fit a normal to the null instead of counting samples
    #[arg(long)]
    pub approximate: bool,

    /// Enumerate every sign pattern when 2^N fits in the trial count
    #[arg(long)]
    pub exhaustive: bool,

    /// Group label (0 or 1) per subject for a two-group permutation test
    #[arg(long, value_delimiter = ',')]
    pub groups: Option<Vec<usize>>,

    /// Run trials on a single thread
    #[arg(long)]
    pub sequential: bool,

    /// Write per-unit results to this CSV file
    #[arg(long)]
    pub output: Option<String>,

    /// Output format: text, json (default: text)
    #[arg(long, default_value = "text")]
    pub format: String,
}

/// Result for one unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitResult {
    pub unit: usize,
    pub observed: f64,
    pub p_value: f64,
    pub ci_lower: Option<f64>,
    pub ci_upper: Option<f64>,
}

/// Everything the analyze command reports.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub test: TestKind,
    pub mode: IscMode,
    pub summary_statistic: SummaryStatistic,
    pub side: Side,
    pub n_time_points: usize,
    pub n_units: usize,
    pub n_subjects: usize,
    /// Absent for the t-test.
    pub n_trials: Option<usize>,
    pub seed: Option<u64>,
    pub method: Option<PValueMethod>,
    pub confidence_level: Option<f64>,
    pub units: Vec<UnitResult>,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn new(
        test: TestKind,
        config: &NullConfig,
        extents: (usize, usize, usize),
        outcome: &TestOutcome,
    ) -> Self {
        let (n_time_points, n_units, n_subjects) = extents;
        let null = outcome.null.as_ref();
        let interval = null.and_then(|n| n.confidence_interval.as_ref());

        let units = outcome
            .observed
            .iter()
            .zip(outcome.p_values.iter())
            .enumerate()
            .map(|(unit, (&observed, &p_value))| UnitResult {
                unit,
                observed,
                p_value,
                ci_lower: interval.map(|ci| ci.lower[unit]),
                ci_upper: interval.map(|ci| ci.upper[unit]),
            })
            .collect();

        Self {
            test,
            mode: config.mode,
            summary_statistic: config.summary_statistic,
            side: config.side,
            n_time_points,
            n_units,
            n_subjects,
            n_trials: null.map(|n| n.n_trials()),
            seed: null.and_then(|n| n.seed),
            method: null.map(|n| n.method),
            confidence_level: interval.map(|ci| ci.level),
            units,
            generated_at: Utc::now(),
        }
    }

    /// Units with p below `alpha`.
    pub fn n_significant(&self, alpha: f64) -> usize {
        self.units.iter().filter(|u| u.p_value < alpha).count()
    }
}

/// Parses one numeric CSV cell. Empty cells and `NaN`/`NA` are missing data.
fn parse_cell(field: &str) -> Result<f64> {
    if field.is_empty() || field.eq_ignore_ascii_case("nan") || field.eq_ignore_ascii_case("na") {
        return Ok(f64::NAN);
    }
    field
        .parse::<f64>()
        .map_err(|e| anyhow!("invalid number '{}': {}", field, e))
}

/// Reads a numeric CSV into a (row x column) array.
pub fn read_csv_matrix(path: &Path, has_headers: bool) -> Result<Array2<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut values = Vec::new();
    let mut n_columns = 0;
    let mut n_rows = 0;
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read {}", path.display()))?;
        n_columns = record.len();
        for (column, field) in record.iter().enumerate() {
            let value = parse_cell(field).with_context(|| {
                format!("{}: row {}, column {}", path.display(), row + 1, column + 1)
            })?;
            values.push(value);
        }
        n_rows += 1;
    }

    if n_rows == 0 {
        bail!("{} contains no data rows", path.display());
    }
    Array2::from_shape_vec((n_rows, n_columns), values)
        .with_context(|| format!("ragged rows in {}", path.display()))
}

/// Builds the dataset described by the input arguments.
pub fn load_dataset(args: &AnalyzeArgs) -> Result<TimeSeriesDataset> {
    let has_headers = !args.no_header;
    if args.matrix {
        let [path] = args.inputs.as_slice() else {
            bail!(
                "--matrix expects exactly one input file, got {}",
                args.inputs.len()
            );
        };
        let matrix = read_csv_matrix(Path::new(path), has_headers)?;
        return Ok(TimeSeriesDataset::from_matrix(matrix)?);
    }

    let subjects = args
        .inputs
        .iter()
        .map(|path| read_csv_matrix(Path::new(path), has_headers))
        .collect::<Result<Vec<_>>>()?;
    Ok(TimeSeriesDataset::from_subjects(&subjects)?)
}

/// Applies command-line overrides on top of the configured defaults.
pub fn null_config(args: &AnalyzeArgs, analysis: &AnalysisConfig) -> Result<NullConfig> {
    let mut config = NullConfig::from(analysis);
    if let Some(mode) = &args.mode {
        config.mode = mode.parse()?;
    }
    if let Some(summary) = &args.summary {
        config.summary_statistic = summary.parse()?;
    }
    if let Some(side) = &args.side {
        config.side = side.parse()?;
    }
    if let Some(n_trials) = args.n_trials {
        config.n_trials = n_trials;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(tolerance) = &args.tolerate_nans {
        config.tolerance = tolerance.parse()?;
    }
    if args.approximate {
        config.exact = false;
    }
    if args.exhaustive {
        config.exhaustive_permutations = true;
    }
    if args.sequential {
        config.parallel = false;
    }
    if let Some(groups) = &args.groups {
        config.groups = Some(groups.clone());
    }
    config.validate()?;
    Ok(config)
}

fn method_label(method: PValueMethod) -> &'static str {
    match method {
        PValueMethod::MonteCarlo => "monte-carlo",
        PValueMethod::Enumerated => "enumerated",
        PValueMethod::NormalApproximation => "normal approximation",
    }
}

/// Formats the analysis report as text.
pub fn format_text_report(report: &AnalysisReport) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("===============================================================\n");
    output.push_str("                 ISC SIGNIFICANCE TEST RESULTS                 \n");
    output.push_str("===============================================================\n");
    output.push_str(&format!("Test:       {}\n", report.test));
    output.push_str(&format!("Design:     {}\n", report.mode));
    output.push_str(&format!("Statistic:  {}\n", report.summary_statistic));
    output.push_str(&format!("Side:       {}\n", report.side));
    output.push_str(&format!(
        "Data:       {} subjects x {} time points x {} units\n",
        report.n_subjects, report.n_time_points, report.n_units
    ));
    if let (Some(n_trials), Some(method)) = (report.n_trials, report.method) {
        let seed = report
            .seed
            .map_or_else(|| "no seed".to_string(), |seed| format!("seed {seed}"));
        output.push_str(&format!(
            "Null:       {} trials, {}, {}\n",
            n_trials,
            seed,
            method_label(method)
        ));
    }
    output.push('\n');

    output.push_str("UNIT RESULTS\n");
    output.push_str("---------------------------------------------------------------\n");
    match report.confidence_level {
        Some(level) => output.push_str(&format!(
            "{:>6}  {:>10}  {:>10}  {:>5.0}% interval\n",
            "unit",
            "observed",
            "p-value",
            level * 100.0
        )),
        None => output.push_str(&format!(
            "{:>6}  {:>10}  {:>10}\n",
            "unit", "observed", "p-value"
        )),
    }
    for unit in &report.units {
        output.push_str(&format!(
            "{:>6}  {:>10.4}  {:>10}",
            unit.unit,
            unit.observed,
            format_p(unit.p_value)
        ));
        if let (Some(lower), Some(upper)) = (unit.ci_lower, unit.ci_upper) {
            output.push_str(&format!("  [{lower:.4}, {upper:.4}]"));
        }
        output.push('\n');
    }
    output.push('\n');

    output.push_str(&format!(
        "Significant at 0.05: {} of {} units\n",
        report.n_significant(0.05),
        report.units.len()
    ));
    output.push_str("===============================================================\n");

    output
}

/// Writes one CSV row per unit.
pub fn write_unit_csv(path: &str, units: &[UnitResult]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path))?;
    for unit in units {
        writer.serialize(unit)?;
    }
    writer.flush()?;
    Ok(())
}

/// Runs the analyze command.
pub async fn run_analyze(args: AnalyzeArgs, analysis: &AnalysisConfig) -> Result<()> {
    let format = OutputFormat::parse(&args.format)?;
    let test: TestKind = args.test.parse()?;
    let config = null_config(&args, analysis)?;
    let dataset = load_dataset(&args)?;
    let extents = dataset.extents();

    tracing::info!(
        %test,
        mode = %config.mode,
        n_time_points = extents.0,
        n_units = extents.1,
        n_subjects = extents.2,
        "running ISC significance test"
    );

    let worker_config = config.clone();
    let outcome =
        tokio::task::spawn_blocking(move || test.run(&dataset, &worker_config)).await??;

    let report = AnalysisReport::new(test, &config, extents, &outcome);
    if let Some(seed) = report.seed {
        tracing::info!(seed, "null distribution seed");
    }

    match format {
        OutputFormat::Text => println!("{}", format_text_report(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if let Some(path) = &args.output {
        write_unit_csv(path, &report.units)?;
        tracing::info!("Per-unit results written to {}", path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use isc_test_core::NanTolerance;
    use isc_test_null::NullKind;
    use isc_test_simulation::correlated_dataset;
    use std::path::PathBuf;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: AnalyzeArgs,
    }

    fn parse_args(argv: &[&str]) -> AnalyzeArgs {
        let mut full = vec!["isc-test"];
        full.extend_from_slice(argv);
        TestCli::parse_from(full).args
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("isc-test-analyze-{}-{}", std::process::id(), name))
    }

    // ============================================
    // CSV Loading Tests
    // ============================================

    #[test]
    fn read_csv_matrix_parses_missing_cells() {
        let path = temp_path("missing.csv");
        std::fs::write(&path, "a,b\n1.0,2.5\n,NaN\n-3,4e-1\n").unwrap();

        let matrix = read_csv_matrix(&path, true).unwrap();

        assert_eq!(matrix.dim(), (3, 2));
        assert!((matrix[[0, 1]] - 2.5).abs() < 1e-12);
        assert!(matrix[[1, 0]].is_nan());
        assert!(matrix[[1, 1]].is_nan());
        assert!((matrix[[2, 1]] - 0.4).abs() < 1e-12);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn read_csv_matrix_rejects_text_cells() {
        let path = temp_path("text.csv");
        std::fs::write(&path, "1.0,2.0\n3.0,abc\n").unwrap();

        let err = read_csv_matrix(&path, false).unwrap_err();

        assert!(format!("{err:#}").contains("row 2, column 2"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn read_csv_matrix_rejects_empty_file() {
        let path = temp_path("empty.csv");
        std::fs::write(&path, "a,b\n").unwrap();

        assert!(read_csv_matrix(&path, true).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_dataset_stacks_subject_files() {
        let first = temp_path("subject0.csv");
        let second = temp_path("subject1.csv");
        std::fs::write(&first, "1,2,3\n4,5,6\n").unwrap();
        std::fs::write(&second, "6,5,4\n3,2,1\n").unwrap();

        let args = parse_args(&[
            "--no-header",
            first.to_str().unwrap(),
            second.to_str().unwrap(),
        ]);
        let dataset = load_dataset(&args).unwrap();

        assert_eq!(dataset.extents(), (2, 3, 2));
        assert!((dataset.data()[[1, 0, 1]] - 3.0).abs() < 1e-12);
        std::fs::remove_file(&first).ok();
        std::fs::remove_file(&second).ok();
    }

    #[test]
    fn load_dataset_reads_matrix_as_one_unit() {
        let path = temp_path("matrix.csv");
        std::fs::write(&path, "s0,s1,s2\n1,2,3\n2,3,1\n3,1,2\n4,4,4\n").unwrap();

        let args = parse_args(&["--matrix", path.to_str().unwrap()]);
        let dataset = load_dataset(&args).unwrap();

        assert_eq!(dataset.extents(), (4, 1, 3));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn matrix_mode_requires_one_file() {
        let args = parse_args(&["--matrix", "a.csv", "b.csv"]);
        assert!(load_dataset(&args).is_err());
    }

    // ============================================
    // Configuration Override Tests
    // ============================================

    #[test]
    fn null_config_applies_overrides() {
        let args = parse_args(&[
            "--mode",
            "pairwise",
            "--summary",
            "mean",
            "--side",
            "greater",
            "--n-trials",
            "250",
            "--seed",
            "9",
            "--approximate",
            "--groups",
            "0,0,1,1",
            "x.csv",
        ]);

        let config = null_config(&args, &AnalysisConfig::default()).unwrap();

        assert_eq!(config.mode, IscMode::Pairwise);
        assert_eq!(config.summary_statistic, SummaryStatistic::Mean);
        assert_eq!(config.side, Side::Greater);
        assert_eq!(config.n_trials, 250);
        assert_eq!(config.seed, Some(9));
        assert!(!config.exact);
        assert_eq!(config.groups, Some(vec![0, 0, 1, 1]));
    }

    #[test]
    fn null_config_accepts_strict_tolerance() {
        let analysis = AnalysisConfig::default();

        let strict = null_config(&parse_args(&["--tolerate-nans", "strict", "x.csv"]), &analysis);
        let half = null_config(&parse_args(&["--tolerate-nans", "0.5", "x.csv"]), &analysis);

        assert_eq!(strict.unwrap().tolerance, NanTolerance::Strict);
        assert_eq!(half.unwrap().tolerance, NanTolerance::Threshold(0.5));
    }

    #[test]
    fn null_config_keeps_configured_defaults() {
        let analysis = AnalysisConfig {
            n_trials: 321,
            seed: Some(4),
            ..AnalysisConfig::default()
        };
        let args = parse_args(&["x.csv"]);

        let config = null_config(&args, &analysis).unwrap();

        assert_eq!(config.n_trials, 321);
        assert_eq!(config.seed, Some(4));
        assert_eq!(config.mode, IscMode::LeaveOneOut);
        assert!(config.exact);
    }

    #[test]
    fn null_config_rejects_bad_values() {
        let analysis = AnalysisConfig::default();

        assert!(null_config(&parse_args(&["--side", "up", "x.csv"]), &analysis).is_err());
        assert!(null_config(&parse_args(&["--tolerate-nans", "1.5", "x.csv"]), &analysis).is_err());
        assert!(null_config(&parse_args(&["--n-trials", "0", "x.csv"]), &analysis).is_err());
    }

    // ============================================
    // Report Tests
    // ============================================

    fn bootstrap_report() -> AnalysisReport {
        let dataset = correlated_dataset(60, 6, 0.3, 11).unwrap();
        let config = NullConfig::new(IscMode::Pairwise, 50).with_seed(3);
        let test = TestKind::Randomized(NullKind::Bootstrap);
        let outcome = test.run(&dataset, &config).unwrap();
        AnalysisReport::new(test, &config, dataset.extents(), &outcome)
    }

    #[test]
    fn report_carries_seed_and_interval() {
        let report = bootstrap_report();

        assert_eq!(report.n_subjects, 6);
        assert_eq!(report.n_trials, Some(50));
        assert_eq!(report.seed, Some(3));
        assert_eq!(report.units.len(), 1);
        let unit = &report.units[0];
        assert!(unit.ci_lower.unwrap() <= unit.ci_upper.unwrap());
        assert!((report.confidence_level.unwrap() - 0.95).abs() < 1e-12);
    }

    #[test]
    fn ttest_report_has_no_null_fields() {
        let dataset = correlated_dataset(40, 5, 0.0, 2).unwrap();
        let config = NullConfig::default();
        let outcome = TestKind::TTest.run(&dataset, &config).unwrap();

        let report = AnalysisReport::new(TestKind::TTest, &config, dataset.extents(), &outcome);

        assert!(report.n_trials.is_none());
        assert!(report.seed.is_none());
        assert!(report.units[0].ci_lower.is_none());
    }

    #[test]
    fn enumerated_permutation_reports_no_seed() {
        let dataset = correlated_dataset(40, 4, 0.2, 5).unwrap();
        let config = NullConfig::new(IscMode::LeaveOneOut, 100)
            .with_seed(9)
            .with_exhaustive_permutations(true);
        let test = TestKind::Randomized(NullKind::Permutation);
        let outcome = test.run(&dataset, &config).unwrap();

        let report = AnalysisReport::new(test, &config, dataset.extents(), &outcome);

        assert_eq!(report.n_trials, Some(16));
        assert!(report.seed.is_none());
        assert!(format_text_report(&report).contains("16 trials, no seed, enumerated"));
    }

    #[test]
    fn format_text_report_contains_key_sections() {
        let text = format_text_report(&bootstrap_report());

        assert!(text.contains("ISC SIGNIFICANCE TEST RESULTS"));
        assert!(text.contains("Test:       bootstrap"));
        assert!(text.contains("50 trials, seed 3"));
        assert!(text.contains("UNIT RESULTS"));
        assert!(text.contains("95% interval"));
        assert!(text.contains("of 1 units"));
    }

    #[test]
    fn unit_csv_has_header_and_rows() {
        let path = temp_path("units.csv");
        let report = bootstrap_report();

        write_unit_csv(path.to_str().unwrap(), &report.units).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();

        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("unit,observed,p_value,ci_lower,ci_upper"));
        assert!(lines.next().unwrap().starts_with("0,"));
        std::fs::remove_file(&path).ok();
    }
}
