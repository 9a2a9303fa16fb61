//! Pipeline orchestrator: owns per-stage artifacts and sequences the run.
//!
//! The recovery is a strictly ordered pipeline — load pairs, collapse,
//! aggregate region densities, bootstrap, write — and [`PdfMaker`] makes
//! that order explicit as a typed state machine instead of ad hoc
//! "has this been computed yet" checks. Every operation names the state it
//! requires and refuses to run early; state only ever advances.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::binning::BinEdges;
use crate::bootstrap::{bootstrap_pdf, bootstrap_pdf_with_draws, PdfResult};
use crate::collapse::{collapse_full_sample, collapse_ids_to_single_estimate};
use crate::config::Config;
use crate::density::RegionDensityMatrix;
use crate::error::{Error, Result};
use crate::output;
use crate::pairs::{PairTable, UnknownSelection};
use crate::types::{CollapsedEstimate, RegionLabel};

/// The pipeline stages, in execution order.
///
/// Ordering is meaningful: a stage guard checks `state >= required`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PipelineState {
    /// No pair table attached yet.
    Uninitialized,
    /// Pair table attached; collapse may run.
    PairsLoaded,
    /// Per-reference estimates exist; aggregation may run.
    Collapsed,
    /// The region × bin matrix exists; bootstrapping may run.
    RegionDensitiesComputed,
    /// PDF and errors exist; final outputs may be written.
    BootstrapComputed,
    /// At least one final output was written. Re-writing is allowed.
    Written,
}

/// End-to-end owner of the recovery pipeline.
///
/// Holds the loaded pair table, the collapsed estimates, the region
/// density matrix, and the bootstrap result as they come into existence;
/// all state lives in memory until an explicit write.
#[derive(Debug)]
pub struct PdfMaker {
    config: Config,
    state: PipelineState,
    table: Option<PairTable>,
    estimates: Option<Vec<CollapsedEstimate>>,
    densities: Option<RegionDensityMatrix>,
    pdf: Option<PdfResult>,
}

impl PdfMaker {
    /// Attach a loaded pair table; the pipeline starts at `PairsLoaded`.
    ///
    /// Warns on stderr when the configured `z_max` exceeds the largest
    /// available reference redshift — the recovery would silently cover
    /// less range than requested otherwise.
    pub fn new(table: PairTable, config: Config) -> Self {
        if let Some(max_z) = table.max_reference_redshift() {
            if max_z < config.z_max {
                eprintln!(
                    "[zcluster] WARNING: requested z_max {} is greater than the maximum \
                     available reference redshift {}",
                    config.z_max, max_z
                );
            }
        }
        Self {
            config,
            state: PipelineState::PairsLoaded,
            table: Some(table),
            estimates: None,
            densities: None,
            pdf: None,
        }
    }

    /// Resume a pipeline at `RegionDensitiesComputed` from a previously
    /// serialized region-density snapshot.
    ///
    /// The pair table is not restored, so the collapse stages are
    /// unavailable on a resumed maker; bootstrapping and writing work as
    /// usual.
    pub fn from_region_snapshot(matrix: RegionDensityMatrix, config: Config) -> Self {
        Self {
            config,
            state: PipelineState::RegionDensitiesComputed,
            table: None,
            estimates: None,
            densities: Some(matrix),
            pdf: None,
        }
    }

    /// Current pipeline state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn require(&self, operation: &'static str, required: PipelineState) -> Result<()> {
        if self.state < required {
            return Err(Error::PipelineState {
                operation,
                required,
                actual: self.state,
            });
        }
        Ok(())
    }

    fn advance(&mut self, to: PipelineState) {
        if self.state < to {
            self.state = to;
        }
    }

    fn table(&self, operation: &'static str) -> Result<&PairTable> {
        self.table.as_ref().ok_or(Error::PipelineState {
            operation,
            required: PipelineState::PairsLoaded,
            actual: self.state,
        })
    }

    /// Reference redshifts from the attached pair table (adaptive binning
    /// wants these).
    ///
    /// # Errors
    ///
    /// Returns [`Error::PipelineState`] when no pair table is attached
    /// (before `new`, or on a snapshot-resumed maker).
    pub fn reference_redshifts(&self) -> Result<Vec<f64>> {
        Ok(self.table("reference_redshifts")?.reference_redshifts())
    }

    /// Collapse with the configured scale, a selection mask, and optional
    /// weights (the weighted workflow). Advances to `Collapsed`.
    ///
    /// # Errors
    ///
    /// [`Error::PipelineState`] before `PairsLoaded`, plus everything
    /// [`collapse_ids_to_single_estimate`] reports.
    pub fn collapse(&mut self, selection: &UnknownSelection) -> Result<()> {
        self.require("collapse", PipelineState::PairsLoaded)?;
        let table = self.table("collapse")?;
        let estimates = collapse_ids_to_single_estimate(
            table,
            &self.config.scale_name,
            selection,
            self.config.normalize_by_total,
        )?;
        self.estimates = Some(estimates);
        self.advance(PipelineState::Collapsed);
        Ok(())
    }

    /// Collapse in full-sample mode (every unknown object counted once,
    /// weights ignored with a warning). Advances to `Collapsed`.
    ///
    /// # Errors
    ///
    /// [`Error::PipelineState`] before `PairsLoaded`, plus everything
    /// [`collapse_full_sample`] reports.
    pub fn collapse_full_sample(&mut self, selection: Option<&UnknownSelection>) -> Result<()> {
        self.require("collapse_full_sample", PipelineState::PairsLoaded)?;
        let table = self.table("collapse_full_sample")?;
        let estimates = collapse_full_sample(table, &self.config.scale_name, selection)?;
        self.estimates = Some(estimates);
        self.advance(PipelineState::Collapsed);
        Ok(())
    }

    /// Aggregate the collapsed estimates into the region × bin matrix.
    /// Advances to `RegionDensitiesComputed`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PipelineState`] before `Collapsed`.
    pub fn compute_region_densities(&mut self, edges: BinEdges, z_max: f64) -> Result<()> {
        self.require("compute_region_densities", PipelineState::Collapsed)?;
        let estimates = self.estimates.as_ref().expect("guarded by state");
        self.densities = Some(RegionDensityMatrix::build(estimates, edges, z_max));
        self.advance(PipelineState::RegionDensitiesComputed);
        Ok(())
    }

    /// Bootstrap the PDF with `n_trials` random region draws (seeded from
    /// the config). Advances to `BootstrapComputed`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PipelineState`] before `RegionDensitiesComputed`.
    pub fn compute_pdf_bootstrap(&mut self, n_trials: usize) -> Result<()> {
        self.require("compute_pdf_bootstrap", PipelineState::RegionDensitiesComputed)?;
        let matrix = self.densities.as_ref().expect("guarded by state");
        self.pdf = Some(bootstrap_pdf(matrix, n_trials, self.config.bootstrap_seed)?);
        self.advance(PipelineState::BootstrapComputed);
        Ok(())
    }

    /// Bootstrap the PDF from a fixed draw list (replay / verification
    /// mode). Advances to `BootstrapComputed`.
    ///
    /// # Errors
    ///
    /// [`Error::PipelineState`] before `RegionDensitiesComputed`;
    /// [`Error::UnknownRegion`] for a draw naming an absent region.
    pub fn compute_pdf_bootstrap_with_draws(
        &mut self,
        draws: &[Vec<RegionLabel>],
    ) -> Result<()> {
        self.require(
            "compute_pdf_bootstrap_with_draws",
            PipelineState::RegionDensitiesComputed,
        )?;
        let matrix = self.densities.as_ref().expect("guarded by state");
        self.pdf = Some(bootstrap_pdf_with_draws(matrix, draws)?);
        self.advance(PipelineState::BootstrapComputed);
        Ok(())
    }

    /// The collapsed estimates, once the collapse stage has run.
    pub fn estimates(&self) -> Option<&[CollapsedEstimate]> {
        self.estimates.as_deref()
    }

    /// The region density matrix, once aggregation has run.
    pub fn region_densities(&self) -> Option<&RegionDensityMatrix> {
        self.densities.as_ref()
    }

    /// The bootstrap result, once bootstrapping has run.
    pub fn pdf(&self) -> Option<&PdfResult> {
        self.pdf.as_ref()
    }

    /// Write the final PDF as an ASCII table. Advances to `Written`;
    /// re-writing in `Written` is allowed.
    ///
    /// # Errors
    ///
    /// [`Error::PipelineState`] before `BootstrapComputed`; [`Error::Io`]
    /// from the sink.
    pub fn write_pdf<W: Write>(&mut self, w: &mut W) -> Result<()> {
        self.require("write_pdf", PipelineState::BootstrapComputed)?;
        output::write_pdf_ascii(w, self.pdf.as_ref().expect("guarded by state"))?;
        self.advance(PipelineState::Written);
        Ok(())
    }

    /// Write the per-trial PDF values, one trial per row. Advances to
    /// `Written`.
    ///
    /// # Errors
    ///
    /// [`Error::PipelineState`] before `BootstrapComputed`; [`Error::Io`]
    /// from the sink.
    pub fn write_bootstrap_samples<W: Write>(&mut self, w: &mut W) -> Result<()> {
        self.require("write_bootstrap_samples", PipelineState::BootstrapComputed)?;
        output::write_bootstraps_ascii(w, self.pdf.as_ref().expect("guarded by state"))?;
        self.advance(PipelineState::Written);
        Ok(())
    }

    /// Write the region-label draws used per trial, so a later run can
    /// replay them via [`Self::compute_pdf_bootstrap_with_draws`].
    /// Advances to `Written`.
    ///
    /// # Errors
    ///
    /// [`Error::PipelineState`] before `BootstrapComputed`; [`Error::Io`]
    /// from the sink.
    pub fn write_region_draws<W: Write>(&mut self, w: &mut W) -> Result<()> {
        self.require("write_region_draws", PipelineState::BootstrapComputed)?;
        output::write_region_draws_ascii(w, &self.pdf.as_ref().expect("guarded by state").draws)?;
        self.advance(PipelineState::Written);
        Ok(())
    }

    /// Serialize the region-density snapshot (matrix + edges + z_max).
    ///
    /// Unlike the final outputs this is a mid-pipeline artifact: it only
    /// requires `RegionDensitiesComputed` and does not advance the state,
    /// matching the driver flow that checkpoints right after aggregation.
    ///
    /// # Errors
    ///
    /// [`Error::PipelineState`] before `RegionDensitiesComputed`;
    /// [`Error::Json`] / [`Error::Io`] from serialization.
    pub fn write_region_densities<W: Write>(&mut self, w: &mut W) -> Result<()> {
        self.require(
            "write_region_densities",
            PipelineState::RegionDensitiesComputed,
        )?;
        output::write_region_snapshot_json(w, self.densities.as_ref().expect("guarded by state"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::linear_edges;
    use crate::pairs::PairRecord;

    fn toy_maker() -> PdfMaker {
        let table = PairTable::new(vec![
            PairRecord::new(0, 0.2, 0).with_scale("kpc30t300", vec![0, 1]),
            PairRecord::new(1, 0.7, 1).with_scale("kpc30t300", vec![1, 2]),
            PairRecord::new(2, 0.4, 2).with_scale("kpc30t300", vec![0]),
        ]);
        let config = Config {
            z_max: 1.0,
            ..Config::default()
        };
        PdfMaker::new(table, config)
    }

    #[test]
    fn operations_refuse_to_run_early() {
        let mut maker = toy_maker();
        let edges = linear_edges(0.0, 1.0, 2).unwrap();

        let err = maker.compute_region_densities(edges.clone(), 1.0).unwrap_err();
        match err {
            Error::PipelineState {
                operation,
                required,
                actual,
            } => {
                assert_eq!(operation, "compute_region_densities");
                assert_eq!(required, PipelineState::Collapsed);
                assert_eq!(actual, PipelineState::PairsLoaded);
            }
            other => panic!("expected PipelineState, got {:?}", other),
        }

        assert!(matches!(
            maker.compute_pdf_bootstrap(10),
            Err(Error::PipelineState { .. })
        ));
        let mut sink = Vec::new();
        assert!(matches!(
            maker.write_pdf(&mut sink),
            Err(Error::PipelineState { .. })
        ));
    }

    #[test]
    fn happy_path_walks_every_state() {
        let mut maker = toy_maker();
        assert_eq!(maker.state(), PipelineState::PairsLoaded);

        let selection = UnknownSelection::all(3);
        maker.collapse(&selection).unwrap();
        assert_eq!(maker.state(), PipelineState::Collapsed);
        assert_eq!(maker.estimates().unwrap().len(), 3);

        let edges = linear_edges(0.0, 1.0, 2).unwrap();
        maker.compute_region_densities(edges, 1.0).unwrap();
        assert_eq!(maker.state(), PipelineState::RegionDensitiesComputed);

        maker.compute_pdf_bootstrap_with_draws(&[vec![0, 1, 2]]).unwrap();
        assert_eq!(maker.state(), PipelineState::BootstrapComputed);

        let mut sink = Vec::new();
        maker.write_pdf(&mut sink).unwrap();
        assert_eq!(maker.state(), PipelineState::Written);
        assert!(!sink.is_empty());

        // Idempotent re-write: state stays Written, output regenerates.
        let mut sink2 = Vec::new();
        maker.write_pdf(&mut sink2).unwrap();
        assert_eq!(maker.state(), PipelineState::Written);
        assert_eq!(sink, sink2);
    }

    #[test]
    fn snapshot_resume_skips_straight_to_bootstrap() {
        let mut maker = toy_maker();
        maker.collapse(&UnknownSelection::all(3)).unwrap();
        let edges = linear_edges(0.0, 1.0, 2).unwrap();
        maker.compute_region_densities(edges, 1.0).unwrap();

        let mut snapshot = Vec::new();
        maker.write_region_densities(&mut snapshot).unwrap();
        // The snapshot write is a checkpoint, not a final output.
        assert_eq!(maker.state(), PipelineState::RegionDensitiesComputed);

        let matrix = crate::output::read_region_snapshot_json(snapshot.as_slice()).unwrap();
        let mut resumed = PdfMaker::from_region_snapshot(matrix, Config::default());
        assert_eq!(resumed.state(), PipelineState::RegionDensitiesComputed);

        resumed
            .compute_pdf_bootstrap_with_draws(&[vec![0, 1, 2]])
            .unwrap();
        maker.compute_pdf_bootstrap_with_draws(&[vec![0, 1, 2]]).unwrap();
        assert_eq!(resumed.pdf().unwrap().estimates, maker.pdf().unwrap().estimates);

        // No pair table on a resumed maker: collapsing is refused.
        assert!(matches!(
            resumed.collapse(&UnknownSelection::all(3)),
            Err(Error::PipelineState { .. })
        ));
    }
}
