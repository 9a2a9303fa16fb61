//! Configuration for a recovery run.

/// Configuration options shared across the pipeline stages.
///
/// Fields map one-to-one onto knobs the (external) driver layer exposes;
/// the engine itself never reads the environment or the command line.
#[derive(Debug, Clone)]
pub struct Config {
    /// Lower redshift limit of the recovery (default: 0.01).
    pub z_min: f64,

    /// Upper redshift limit; reference objects at or above this redshift
    /// are excluded from the aggregation (default: 3.0).
    pub z_max: f64,

    /// Number of redshift bins (default: 10).
    pub z_n_bins: usize,

    /// Angular-scale name selecting which matched-index list of each pair
    /// record to collapse (default: `"kpc30t300"`).
    pub scale_name: String,

    /// Number of bootstrap trials (default: 1,000).
    pub n_bootstraps: usize,

    /// Optional deterministic seed for the bootstrap region draws.
    ///
    /// `None` seeds from OS entropy. A caller-supplied draw list bypasses
    /// the RNG entirely, seed or no seed.
    pub bootstrap_seed: Option<u64>,

    /// Normalize each reference object's weighted pair sum by its unmasked
    /// matched count, turning the density into a per-object over-density
    /// ratio (default: false).
    pub normalize_by_total: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            z_min: 0.01,
            z_max: 3.0,
            z_n_bins: 10,
            scale_name: "kpc30t300".to_string(),
            n_bootstraps: 1_000,
            bootstrap_seed: None,
            normalize_by_total: false,
        }
    }
}
