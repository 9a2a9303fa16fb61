//! Error taxonomy for the recovery pipeline.
//!
//! Fatal conditions abort a run before any output is written; the two
//! recoverable conditions (an unknown binning-policy name, a weight source
//! supplied in full-sample mode) are handled at their call sites with a
//! stderr warning and a documented fallback instead of an error.

use thiserror::Error;

use crate::maker::PipelineState;
use crate::types::{RegionLabel, UnknownIndex};

/// Unified error type for all pipeline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Unrecognized binning-policy name. Recovered by
    /// [`edges_for_policy`](crate::binning::edges_for_policy), which warns
    /// and falls back to linear binning; fatal only for callers that opt
    /// into strict parsing via [`BinningPolicy::parse`](crate::binning::BinningPolicy::parse).
    #[error("unknown binning policy '{name}'; valid policies are linear, adaptive, comoving, logspace")]
    InvalidBinningPolicy {
        /// The name that failed to parse.
        name: String,
    },

    /// Degenerate or inconsistent binning input (bad z range, too few
    /// distinct redshifts for adaptive binning, non-monotonic edge list).
    #[error("binning error: {0}")]
    Binning(String),

    /// The requested angular-scale name is absent from a pair record.
    #[error("angular scale '{scale}' not present in the pair table")]
    UnknownScale {
        /// The scale name that was requested.
        scale: String,
    },

    /// A matched unknown-object index lies outside the selection mask.
    #[error("unknown-object index {index} is outside the selection of length {len}")]
    IndexOutOfRange {
        /// The offending catalog index.
        index: UnknownIndex,
        /// Length of the selection mask it was checked against.
        len: usize,
    },

    /// A pipeline operation was invoked before its prerequisite stage.
    #[error("'{operation}' requires pipeline state {required:?} or later, but the pipeline is at {actual:?}")]
    PipelineState {
        /// The operation that was refused.
        operation: &'static str,
        /// The minimum state the operation needs.
        required: PipelineState,
        /// The state the pipeline was actually in.
        actual: PipelineState,
    },

    /// A parallel collapse worker failed; the whole stage is aborted and
    /// no partial results are kept.
    #[error("collapse worker failed: {0}")]
    Worker(String),

    /// A bootstrap draw references a region label the density matrix does
    /// not contain.
    #[error("bootstrap draw references unknown region label {label}")]
    UnknownRegion {
        /// The unmatched label.
        label: RegionLabel,
    },

    /// A persisted region-draw list could not be parsed.
    #[error("malformed region draw list: {0}")]
    DrawParse(String),

    /// I/O failure while writing or reading an artifact.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure on the snapshot surfaces.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
