//! Type aliases and common types.

use serde::{Deserialize, Serialize};

/// Spatial (jackknife) region label assigned to reference objects upstream.
///
/// Labels are opaque identifiers: they are not required to be dense or
/// zero-based, only consistent across the pair table.
pub type RegionLabel = u32;

/// Index of an object in the unknown-sample catalog.
pub type UnknownIndex = u64;

/// Per-reference-object clustering amplitude produced by the collapse stage.
///
/// One estimate is created per reference object and never mutated afterwards;
/// the aggregation and bootstrap stages only read these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollapsedEstimate {
    /// Spatial region label inherited from the reference object.
    pub region: RegionLabel,
    /// True (spectroscopic) redshift of the reference object.
    pub redshift: f64,
    /// Scalar density: the weighted sum of selected matched objects,
    /// optionally normalized by the unmasked matched count.
    pub density: f64,
    /// Number of matched objects that survived the selection mask.
    pub raw_pairs: u64,
}
