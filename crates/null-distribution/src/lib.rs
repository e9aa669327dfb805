//! Resampling null distributions for inter-subject correlation.
//!
//! Five schemes are available through [`NullKind`]: sign-flip, circular
//! time-shift, phase randomization, subject-label permutation and case
//! bootstrap. All of them draw from a precomputed [`SeedChain`], so a run is
//! reproducible from one seed and gives the same samples with or without
//! parallel execution.

pub mod bootstrap;
pub mod config;
pub mod kind;
pub mod permutation;
pub mod phaseshift;
pub mod result;
pub mod seed_chain;
pub mod signflip;
pub mod timeshift;
pub mod trial;

pub use bootstrap::{bootstrap, bootstrap_from_iscs, percentile_ci};
pub use config::NullConfig;
pub use kind::{null_distribution, NullKind};
pub use permutation::{permutation, permutation_from_iscs};
pub use phaseshift::{phase_shift, PhaseRandomizer};
pub use result::{ConfidenceInterval, NullDistribution};
pub use seed_chain::{SeedChain, MAX_RANDOM_SEED};
pub use signflip::{apply_flips, draw_flips, sign_flip};
pub use timeshift::{circular_shift, time_shift};
