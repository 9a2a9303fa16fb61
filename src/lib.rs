//! # zcluster
//!
//! Recover the redshift distribution of a photometric ("unknown") sample
//! from its angular clustering against a spectroscopic reference sample.
//!
//! An upstream pairing stage has already matched every reference object to
//! the nearby unknown-sample objects at one or more angular scales; this
//! crate is the engine that turns those matched-pair index lists into a
//! redshift PDF with bootstrap errors:
//!
//! 1. **Collapse** — filter each reference object's matched indices
//!    through a selection mask and sum the weights into one scalar
//!    clustering amplitude per reference object.
//! 2. **Bin & aggregate** — bin the collapsed estimates in redshift and
//!    accumulate per spatial (jackknife) region.
//! 3. **Bootstrap** — resample regions with replacement, re-reduce per
//!    trial, and report the per-bin mean and spread.
//!
//! ## Quick Start
//!
//! ```ignore
//! use zcluster::{linear_edges, Config, PairTable, PdfMaker, UnknownSelection};
//!
//! let config = Config::default();
//! let table = PairTable::new(records); // from the (external) pair loader
//! let selection = UnknownSelection::from_mask(mask).with_weights(weights);
//!
//! let mut maker = PdfMaker::new(table, config);
//! maker.collapse(&selection)?;
//! let edges = linear_edges(0.01, 3.0, 10)?;
//! maker.compute_region_densities(edges, 3.0)?;
//! maker.compute_pdf_bootstrap(1000)?;
//! maker.write_pdf(&mut std::io::stdout())?;
//! ```
//!
//! ## Determinism
//!
//! Every random choice is confined to the bootstrap draws. Set
//! `Config::bootstrap_seed` for a reproducible run, or supply a fixed
//! draw list to `compute_pdf_bootstrap_with_draws` for bit-identical
//! replay — the mode used for external verification.
//!
//! ## What this crate is not
//!
//! Catalog loading, selection semantics, command-line handling, and the
//! spatial cross-match that found the pairs all live outside; the crate
//! speaks plain data shapes (`PairTable`, masks, `io::Write` sinks) at
//! those boundaries.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod error;
mod types;

// Functional modules
pub mod binning;
pub mod bootstrap;
pub mod collapse;
pub mod density;
pub mod maker;
pub mod output;
pub mod pairs;
pub mod stats;
mod thread_pool;

// Re-exports for public API
pub use binning::{
    adaptive_edges, comoving_edges, edges_for_policy, edges_from_list, linear_edges,
    logspace_edges, BinEdges, BinningPolicy, Cosmology,
};
pub use bootstrap::{bootstrap_pdf, bootstrap_pdf_with_draws, PdfResult};
pub use collapse::{collapse_full_sample, collapse_ids_to_single_estimate};
pub use config::Config;
pub use density::RegionDensityMatrix;
pub use error::{Error, Result};
pub use maker::{PdfMaker, PipelineState};
pub use output::read_region_draws;
pub use pairs::{PairRecord, PairTable, UnknownSelection};
pub use types::{CollapsedEstimate, RegionLabel, UnknownIndex};
