//! Region × redshift-bin aggregation of collapsed estimates.
//!
//! Each collapsed estimate lands in one (region, bin) cell; the matrix of
//! accumulated densities and object counts is the sole input to the
//! bootstrap stage. Rows (regions) are independent, swappable units — no
//! normalization mixes information across regions here, which is exactly
//! what lets the bootstrap resample them freely.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::binning::BinEdges;
use crate::types::{CollapsedEstimate, RegionLabel};

/// Per-region, per-bin accumulators plus the binning they were built with.
///
/// Immutable once built. Also serves as the region-density snapshot
/// artifact: serializing this struct (with serde) captures everything
/// needed to resume a pipeline at the aggregated stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDensityMatrix {
    labels: Vec<RegionLabel>,
    edges: BinEdges,
    z_max: f64,
    density: DMatrix<f64>,
    counts: DMatrix<f64>,
    raw_pairs: DMatrix<f64>,
}

impl RegionDensityMatrix {
    /// Aggregate collapsed estimates into (region, bin) cells.
    ///
    /// Estimates with `redshift >= z_max` are excluded entirely, mirroring
    /// the z_max clipping applied at binning time; estimates below the
    /// first edge or at/above the last edge fall outside every bin and are
    /// likewise skipped. Region rows follow the sorted distinct labels
    /// present in the input — labels need not be dense.
    ///
    /// A non-finite density (the zero-match sentinel of the normalized
    /// collapse mode) contributes its unit object count but no density, so
    /// one empty reference object can never poison a whole cell.
    pub fn build(estimates: &[CollapsedEstimate], edges: BinEdges, z_max: f64) -> Self {
        let mut labels: Vec<RegionLabel> = estimates.iter().map(|e| e.region).collect();
        labels.sort_unstable();
        labels.dedup();

        let n_bins = edges.n_bins();
        let mut density = DMatrix::<f64>::zeros(labels.len(), n_bins);
        let mut counts = DMatrix::<f64>::zeros(labels.len(), n_bins);
        let mut raw_pairs = DMatrix::<f64>::zeros(labels.len(), n_bins);

        for est in estimates {
            if est.redshift >= z_max {
                continue;
            }
            let Some(bin) = edges.bin_index(est.redshift) else {
                continue;
            };
            let row = labels
                .binary_search(&est.region)
                .expect("label collected above");
            if est.density.is_finite() {
                density[(row, bin)] += est.density;
            }
            counts[(row, bin)] += 1.0;
            raw_pairs[(row, bin)] += est.raw_pairs as f64;
        }

        Self {
            labels,
            edges,
            z_max,
            density,
            counts,
            raw_pairs,
        }
    }

    /// Number of distinct regions (matrix rows).
    pub fn n_regions(&self) -> usize {
        self.labels.len()
    }

    /// Number of redshift bins (matrix columns).
    pub fn n_bins(&self) -> usize {
        self.edges.n_bins()
    }

    /// Sorted distinct region labels, one per row.
    pub fn labels(&self) -> &[RegionLabel] {
        &self.labels
    }

    /// The bin edges the matrix was built with.
    pub fn edges(&self) -> &BinEdges {
        &self.edges
    }

    /// The z_max clip applied during aggregation.
    pub fn z_max(&self) -> f64 {
        self.z_max
    }

    /// Row offset of a region label, if present.
    pub fn row_of(&self, label: RegionLabel) -> Option<usize> {
        self.labels.binary_search(&label).ok()
    }

    /// Accumulated density of cell (`row`, `bin`).
    pub fn density_sum(&self, row: usize, bin: usize) -> f64 {
        self.density[(row, bin)]
    }

    /// Object count of cell (`row`, `bin`).
    pub fn count(&self, row: usize, bin: usize) -> f64 {
        self.counts[(row, bin)]
    }

    /// Accumulated raw (selected) pair count of cell (`row`, `bin`).
    pub fn raw_pair_sum(&self, row: usize, bin: usize) -> f64 {
        self.raw_pairs[(row, bin)]
    }

    /// Over-density of a cell: accumulated density / object count.
    ///
    /// A cell with zero objects reports NaN — a defined sentinel that
    /// propagates through the bootstrap reduction without raising.
    pub fn over_density(&self, row: usize, bin: usize) -> f64 {
        let n = self.counts[(row, bin)];
        if n == 0.0 {
            f64::NAN
        } else {
            self.density[(row, bin)] / n
        }
    }

    /// Total object count across all cells.
    pub fn total_count(&self) -> f64 {
        self.counts.sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::linear_edges;

    fn est(region: RegionLabel, redshift: f64, density: f64) -> CollapsedEstimate {
        CollapsedEstimate {
            region,
            redshift,
            density,
            raw_pairs: density as u64,
        }
    }

    #[test]
    fn counts_partition_the_surviving_estimates() {
        let estimates = vec![
            est(0, 0.1, 2.0),
            est(0, 0.6, 3.0),
            est(1, 0.2, 1.0),
            est(1, 1.4, 9.0), // >= z_max, excluded
            est(2, 0.9, 4.0),
        ];
        let edges = linear_edges(0.0, 1.0, 2).unwrap();
        let matrix = RegionDensityMatrix::build(&estimates, edges, 1.0);

        assert_eq!(matrix.n_regions(), 3);
        assert_eq!(matrix.n_bins(), 2);
        // Every estimate below z_max lands in exactly one cell.
        assert!((matrix.total_count() - 4.0).abs() < 1e-12);
        assert!((matrix.count(0, 0) - 1.0).abs() < 1e-12);
        assert!((matrix.count(0, 1) - 1.0).abs() < 1e-12);
        assert!((matrix.count(1, 0) - 1.0).abs() < 1e-12);
        assert!((matrix.count(2, 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_cell_over_density_is_nan_not_a_fault() {
        let estimates = vec![est(0, 0.1, 2.0), est(1, 0.6, 3.0)];
        let edges = linear_edges(0.0, 1.0, 2).unwrap();
        let matrix = RegionDensityMatrix::build(&estimates, edges, 1.0);

        assert!(matrix.over_density(0, 1).is_nan());
        assert!(matrix.over_density(1, 0).is_nan());
        assert!((matrix.over_density(0, 0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn out_of_edge_redshifts_are_skipped() {
        let estimates = vec![
            est(0, -0.5, 1.0), // below first edge
            est(0, 0.5, 2.0),
        ];
        let edges = linear_edges(0.0, 1.0, 2).unwrap();
        let matrix = RegionDensityMatrix::build(&estimates, edges, 5.0);
        assert!((matrix.total_count() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sparse_labels_map_to_dense_rows() {
        let estimates = vec![est(3, 0.1, 1.0), est(17, 0.1, 2.0)];
        let edges = linear_edges(0.0, 1.0, 1).unwrap();
        let matrix = RegionDensityMatrix::build(&estimates, edges, 1.0);

        assert_eq!(matrix.labels(), &[3, 17]);
        assert_eq!(matrix.row_of(17), Some(1));
        assert_eq!(matrix.row_of(4), None);
        assert!((matrix.density_sum(1, 0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn nan_density_counts_the_object_but_not_the_density() {
        let estimates = vec![est(0, 0.2, f64::NAN), est(0, 0.3, 4.0)];
        let edges = linear_edges(0.0, 1.0, 1).unwrap();
        let matrix = RegionDensityMatrix::build(&estimates, edges, 1.0);

        assert!((matrix.count(0, 0) - 2.0).abs() < 1e-12);
        assert!((matrix.density_sum(0, 0) - 4.0).abs() < 1e-12);
        assert!((matrix.over_density(0, 0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn snapshot_round_trips_through_serde() {
        let estimates = vec![est(0, 0.2, 2.0), est(1, 0.7, 3.0)];
        let edges = linear_edges(0.0, 1.0, 2).unwrap();
        let matrix = RegionDensityMatrix::build(&estimates, edges, 1.0);

        let json = serde_json::to_string(&matrix).unwrap();
        let restored: RegionDensityMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, matrix);
    }
}
