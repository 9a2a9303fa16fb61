//! Redshift bin-edge construction.
//!
//! The choice of binning dominates the signal-to-noise of the recovered
//! PDF. Four policies are provided, plus a verbatim external edge list:
//!
//! - `linear`: evenly spaced in redshift
//! - `logspace`: evenly spaced in ln(1+z)
//! - `comoving`: evenly spaced in comoving distance along the line of sight
//! - `adaptive`: equal reference-object counts per bin (quantile binning)
//!
//! All constructors return a validated [`BinEdges`], N+1 strictly
//! increasing floats defining N half-open bins `[e_i, e_{i+1})`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maps redshift to comoving distance and back.
///
/// Injected by the caller; the engine never computes cosmology itself.
/// Both mappings must be monotonically increasing over the binned range.
pub trait Cosmology {
    /// Comoving distance to redshift `z`, in the caller's length unit.
    fn comoving_distance(&self, z: f64) -> f64;
    /// Inverse mapping: the redshift at comoving distance `d`.
    fn redshift_at_distance(&self, d: f64) -> f64;
}

/// Ordered redshift bin edges: N+1 strictly increasing floats for N bins.
///
/// Immutable once constructed. Bin membership is half-open, `[e_i, e_{i+1})`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinEdges {
    edges: Vec<f64>,
}

impl BinEdges {
    /// Validate and wrap an edge list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Binning`] if fewer than two edges are supplied or
    /// the sequence is not strictly increasing.
    pub fn new(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::Binning(format!(
                "need at least 2 bin edges, got {}",
                edges.len()
            )));
        }
        for pair in edges.windows(2) {
            if !(pair[0] < pair[1]) {
                return Err(Error::Binning(format!(
                    "bin edges must be strictly increasing, got {} before {}",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(Self { edges })
    }

    /// Number of bins (one less than the number of edges).
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// The full edge sequence.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Lower edge of bin `bin`.
    pub fn low(&self, bin: usize) -> f64 {
        self.edges[bin]
    }

    /// Upper edge of bin `bin`.
    pub fn high(&self, bin: usize) -> f64 {
        self.edges[bin + 1]
    }

    /// Locate the bin containing redshift `z` by binary search.
    ///
    /// Returns `None` for redshifts below the first edge or at/above the
    /// last edge (bins are half-open on the right).
    pub fn bin_index(&self, z: f64) -> Option<usize> {
        let idx = self.edges.partition_point(|&e| e <= z);
        if idx == 0 || idx == self.edges.len() {
            None
        } else {
            Some(idx - 1)
        }
    }
}

fn check_range(z_min: f64, z_max: f64, n_bins: usize) -> Result<()> {
    if n_bins == 0 {
        return Err(Error::Binning("n_bins must be at least 1".to_string()));
    }
    if !(z_min < z_max) {
        return Err(Error::Binning(format!(
            "z_min must be below z_max, got [{}, {}]",
            z_min, z_max
        )));
    }
    Ok(())
}

/// Edges evenly spaced in redshift between `z_min` and `z_max` inclusive.
///
/// # Errors
///
/// Returns [`Error::Binning`] for an empty bin count or inverted range.
pub fn linear_edges(z_min: f64, z_max: f64, n_bins: usize) -> Result<BinEdges> {
    check_range(z_min, z_max, n_bins)?;
    let step = (z_max - z_min) / n_bins as f64;
    let mut edges: Vec<f64> = (0..=n_bins).map(|i| z_min + step * i as f64).collect();
    edges[n_bins] = z_max;
    BinEdges::new(edges)
}

/// Edges evenly spaced in ln(1+z), mapped back to redshift.
///
/// Gives comoving-like spacing without a cosmology dependence, and errors
/// that compare naturally to the usual sigma/(1+z) convention.
///
/// # Errors
///
/// Returns [`Error::Binning`] if `z_min <= -1` (the transform is undefined
/// there) or for a degenerate range.
pub fn logspace_edges(z_min: f64, z_max: f64, n_bins: usize) -> Result<BinEdges> {
    check_range(z_min, z_max, n_bins)?;
    if z_min <= -1.0 {
        return Err(Error::Binning(format!(
            "logspace binning requires z_min > -1, got {}",
            z_min
        )));
    }
    let log_min = (1.0 + z_min).ln();
    let log_max = (1.0 + z_max).ln();
    let step = (log_max - log_min) / n_bins as f64;
    let mut edges: Vec<f64> = (0..=n_bins)
        .map(|i| (log_min + step * i as f64).exp() - 1.0)
        .collect();
    edges[0] = z_min;
    edges[n_bins] = z_max;
    BinEdges::new(edges)
}

/// Edges evenly spaced in comoving distance, mapped back to redshift via
/// the injected [`Cosmology`].
///
/// # Errors
///
/// Returns [`Error::Binning`] for a degenerate range, or if the distance
/// function is not increasing over `[z_min, z_max]`.
pub fn comoving_edges(
    z_min: f64,
    z_max: f64,
    n_bins: usize,
    cosmology: &dyn Cosmology,
) -> Result<BinEdges> {
    check_range(z_min, z_max, n_bins)?;
    let d_min = cosmology.comoving_distance(z_min);
    let d_max = cosmology.comoving_distance(z_max);
    if !(d_min < d_max) {
        return Err(Error::Binning(format!(
            "comoving distance must increase over [{}, {}], got [{}, {}]",
            z_min, z_max, d_min, d_max
        )));
    }
    let step = (d_max - d_min) / n_bins as f64;
    let mut edges: Vec<f64> = (0..=n_bins)
        .map(|i| cosmology.redshift_at_distance(d_min + step * i as f64))
        .collect();
    edges[0] = z_min;
    edges[n_bins] = z_max;
    BinEdges::new(edges)
}

/// Equal-count (quantile) edges over the reference redshifts in range.
///
/// Each bin receives the same number of the supplied redshifts to within
/// one object. Ties at shared redshift values keep their stable sort
/// order; interior edges sit halfway between the bracketing values.
///
/// # Errors
///
/// Returns [`Error::Binning`] when fewer than `n_bins` distinct redshifts
/// fall inside `[z_min, z_max]` — there is no equal-count solution then.
pub fn adaptive_edges(
    z_min: f64,
    z_max: f64,
    n_bins: usize,
    reference_redshifts: &[f64],
) -> Result<BinEdges> {
    check_range(z_min, z_max, n_bins)?;
    let mut in_range: Vec<f64> = reference_redshifts
        .iter()
        .copied()
        .filter(|&z| z >= z_min && z <= z_max)
        .collect();
    in_range.sort_by(|a, b| a.total_cmp(b));

    let mut distinct = 0usize;
    for (i, &z) in in_range.iter().enumerate() {
        if i == 0 || z > in_range[i - 1] {
            distinct += 1;
        }
    }
    if distinct < n_bins {
        return Err(Error::Binning(format!(
            "adaptive binning needs at least {} distinct redshifts in [{}, {}], found {}",
            n_bins, z_min, z_max, distinct
        )));
    }

    let n = in_range.len();
    let mut edges = Vec::with_capacity(n_bins + 1);
    edges.push(z_min);
    for i in 1..n_bins {
        let pos = i * n / n_bins;
        edges.push(0.5 * (in_range[pos - 1] + in_range[pos]));
    }
    edges.push(z_max);
    BinEdges::new(edges)
}

/// Edges taken verbatim from an externally supplied ordered list, minus
/// its trailing element.
///
/// The external file format stores one extra upper bound past the edge
/// sequence proper; matching the original loader, the last entry is
/// dropped before validation. Range semantics are the caller's
/// responsibility.
///
/// # Errors
///
/// Returns [`Error::Binning`] if the remaining list is too short or not
/// strictly increasing.
pub fn edges_from_list(values: &[f64]) -> Result<BinEdges> {
    if values.len() < 3 {
        return Err(Error::Binning(format!(
            "external edge list needs at least 3 entries (trailing bound is dropped), got {}",
            values.len()
        )));
    }
    BinEdges::new(values[..values.len() - 1].to_vec())
}

/// The named binning policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinningPolicy {
    /// Evenly spaced in redshift.
    Linear,
    /// Equal reference-object counts per bin.
    Adaptive,
    /// Evenly spaced in comoving distance.
    Comoving,
    /// Evenly spaced in ln(1+z).
    Logspace,
}

impl BinningPolicy {
    /// Strictly parse a policy name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBinningPolicy`] for an unrecognized name.
    /// Most callers want [`edges_for_policy`] instead, which recovers by
    /// falling back to linear binning.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "linear" => Ok(Self::Linear),
            "adaptive" => Ok(Self::Adaptive),
            "comoving" => Ok(Self::Comoving),
            "logspace" => Ok(Self::Logspace),
            _ => Err(Error::InvalidBinningPolicy {
                name: name.to_string(),
            }),
        }
    }
}

/// Build edges for a policy selected by name.
///
/// An unrecognized name is not fatal: a warning listing the valid policies
/// is printed to stderr and linear binning is used instead. This fallback
/// matches long-standing driver behavior and is kept for compatibility.
///
/// `reference_redshifts` is only consulted for `adaptive`; `cosmology`
/// only for `comoving`.
///
/// # Errors
///
/// Returns [`Error::Binning`] when the selected (or fallen-back-to) policy
/// itself fails, e.g. degenerate adaptive input.
pub fn edges_for_policy(
    name: &str,
    z_min: f64,
    z_max: f64,
    n_bins: usize,
    reference_redshifts: &[f64],
    cosmology: &dyn Cosmology,
) -> Result<BinEdges> {
    let policy = match BinningPolicy::parse(name) {
        Ok(policy) => policy,
        Err(_) => {
            eprintln!("[zcluster] WARNING: unknown binning policy '{}'. Valid policies are:", name);
            eprintln!("[zcluster]     linear: linear binning in redshift");
            eprintln!("[zcluster]     adaptive: constant reference objects per redshift bin");
            eprintln!("[zcluster]     comoving: linear binning in comoving distance");
            eprintln!("[zcluster]     logspace: linear binning in ln(1+z)");
            eprintln!("[zcluster] falling back to linear binning");
            BinningPolicy::Linear
        }
    };
    match policy {
        BinningPolicy::Linear => linear_edges(z_min, z_max, n_bins),
        BinningPolicy::Adaptive => adaptive_edges(z_min, z_max, n_bins, reference_redshifts),
        BinningPolicy::Comoving => comoving_edges(z_min, z_max, n_bins, cosmology),
        BinningPolicy::Logspace => logspace_edges(z_min, z_max, n_bins),
    }
}
