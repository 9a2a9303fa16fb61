//! Collapse matched-pair index lists into per-reference-object densities.
//!
//! This is the indexed join at the heart of the recovery: each reference
//! object's matched unknown-sample indices are filtered through the
//! selection mask and summed with their weights, yielding one scalar
//! clustering amplitude per reference object. Two variants exist:
//!
//! - [`collapse_ids_to_single_estimate`]: the weighted, per-object-selection
//!   workflow, parallel across reference objects.
//! - [`collapse_full_sample`]: every unknown object counts once, weights
//!   disallowed — the mode of choice when the unknown catalog carries no
//!   usable selection information (e.g. single-band surveys).

use crate::error::{Error, Result};
use crate::pairs::{PairRecord, PairTable, UnknownSelection};
use crate::thread_pool;
use crate::types::CollapsedEstimate;

/// Reference objects per parallel work unit.
///
/// Chunks this size keep dispatch overhead negligible while still feeding
/// every pool thread on realistic table sizes.
const CHUNK_SIZE: usize = 1024;

fn collapse_record(
    record: &PairRecord,
    scale: &str,
    selection: &UnknownSelection,
    normalize_by_total: bool,
) -> Result<CollapsedEstimate> {
    let indices = record.matched(scale).ok_or_else(|| Error::UnknownScale {
        scale: scale.to_string(),
    })?;

    let mut density = 0.0;
    let mut raw_pairs = 0u64;
    for &index in indices {
        let offset = index as usize;
        if offset >= selection.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: selection.len(),
            });
        }
        if selection.includes(offset) {
            density += selection.weight(offset);
            raw_pairs += 1;
        }
    }
    if normalize_by_total {
        // Ratio of selected weight to all matches; no matches at all is
        // the NaN sentinel, not an error.
        density = if indices.is_empty() {
            f64::NAN
        } else {
            density / indices.len() as f64
        };
    }

    Ok(CollapsedEstimate {
        region: record.region,
        redshift: record.redshift,
        density,
        raw_pairs,
    })
}

/// Collapse each reference object's matched indices into a single weighted
/// density estimate.
///
/// For every record: filter its matched-index list at `scale` through the
/// selection mask, sum the surviving objects' weights (1.0 each when the
/// selection carries no weights). With `normalize_by_total` the sum is
/// divided by the record's unmasked matched count, making the density an
/// over-density ratio per object.
///
/// With the `parallel` feature the table is split into contiguous chunks
/// dispatched on the shared pool and the per-chunk results concatenated in
/// input order; chunks share no mutable state. A failing chunk aborts the
/// whole collapse — there are never silent partial results.
///
/// # Errors
///
/// - [`Error::UnknownScale`] when a record lacks the requested scale.
/// - [`Error::IndexOutOfRange`] when a matched index is not covered by the
///   selection mask.
/// - [`Error::Worker`] when a parallel work unit fails (wrapping one of
///   the above).
pub fn collapse_ids_to_single_estimate(
    table: &PairTable,
    scale: &str,
    selection: &UnknownSelection,
    normalize_by_total: bool,
) -> Result<Vec<CollapsedEstimate>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        let chunks: std::result::Result<Vec<Vec<CollapsedEstimate>>, Error> =
            thread_pool::install(|| {
                table
                    .records()
                    .par_chunks(CHUNK_SIZE)
                    .map(|chunk| {
                        chunk
                            .iter()
                            .map(|record| {
                                collapse_record(record, scale, selection, normalize_by_total)
                            })
                            .collect()
                    })
                    .collect()
            });
        match chunks {
            Ok(chunks) => Ok(chunks.concat()),
            Err(err) => Err(Error::Worker(err.to_string())),
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        thread_pool::install(|| {
            table
                .records()
                .iter()
                .map(|record| collapse_record(record, scale, selection, normalize_by_total))
                .collect()
        })
    }
}

/// Collapse treating every unknown object as included, weight 1.0 each.
///
/// The density of each reference object is simply its matched count at
/// `scale`. Selection masks and weights are not consulted: if the supplied
/// selection carries weights, a warning is printed and they are ignored —
/// this mode exists precisely for catalogs where no per-object weighting
/// is meaningful, and a stray weight column must not change the estimate.
///
/// # Errors
///
/// Returns [`Error::UnknownScale`] when a record lacks the requested scale.
pub fn collapse_full_sample(
    table: &PairTable,
    scale: &str,
    selection: Option<&UnknownSelection>,
) -> Result<Vec<CollapsedEstimate>> {
    if let Some(selection) = selection {
        if selection.has_weights() {
            eprintln!(
                "[zcluster] WARNING: a weight source was supplied in full-sample mode; \
                 weights are not possible here and will be ignored"
            );
        }
    }
    table
        .records()
        .iter()
        .map(|record| {
            let indices = record.matched(scale).ok_or_else(|| Error::UnknownScale {
                scale: scale.to_string(),
            })?;
            Ok(CollapsedEstimate {
                region: record.region,
                redshift: record.redshift,
                density: indices.len() as f64,
                raw_pairs: indices.len() as u64,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairs::PairRecord;

    const SCALE: &str = "kpc30t300";

    fn table_with_k_matches(k: usize, n_refs: usize) -> PairTable {
        let records = (0..n_refs)
            .map(|i| {
                PairRecord::new(i as u64, 0.2 + 0.1 * i as f64, (i % 3) as u32)
                    .with_scale(SCALE, (0..k as u64).collect())
            })
            .collect();
        PairTable::new(records)
    }

    #[test]
    fn all_true_mask_unit_weights_counts_matches() {
        let table = table_with_k_matches(5, 8);
        let selection = UnknownSelection::all(5);
        let estimates =
            collapse_ids_to_single_estimate(&table, SCALE, &selection, false).unwrap();
        assert_eq!(estimates.len(), 8);
        for est in &estimates {
            assert!((est.density - 5.0).abs() < 1e-12);
            assert_eq!(est.raw_pairs, 5);
        }
    }

    #[test]
    fn mask_and_weights_restrict_the_sum() {
        let table = PairTable::new(vec![
            PairRecord::new(0, 0.5, 0).with_scale(SCALE, vec![0, 1, 2, 3])
        ]);
        let selection = UnknownSelection::from_mask(vec![true, false, true, false])
            .with_weights(vec![0.5, 100.0, 1.5, 100.0]);
        let estimates =
            collapse_ids_to_single_estimate(&table, SCALE, &selection, false).unwrap();
        assert!((estimates[0].density - 2.0).abs() < 1e-12);
        assert_eq!(estimates[0].raw_pairs, 2);
    }

    #[test]
    fn normalization_divides_by_unmasked_total() {
        let table = PairTable::new(vec![
            PairRecord::new(0, 0.5, 0).with_scale(SCALE, vec![0, 1, 2, 3]),
            PairRecord::new(1, 0.6, 0).with_scale(SCALE, vec![]),
        ]);
        let selection = UnknownSelection::from_mask(vec![true, true, false, false]);
        let estimates =
            collapse_ids_to_single_estimate(&table, SCALE, &selection, true).unwrap();
        // 2 selected of 4 matched.
        assert!((estimates[0].density - 0.5).abs() < 1e-12);
        // Zero matches normalizes to the NaN sentinel, not a fault.
        assert!(estimates[1].density.is_nan());
    }

    #[test]
    fn unknown_scale_is_fatal() {
        let table = table_with_k_matches(2, 1);
        let selection = UnknownSelection::all(2);
        let err =
            collapse_ids_to_single_estimate(&table, "kpc3t30", &selection, false).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("kpc3t30"), "unexpected message: {}", msg);
    }

    #[test]
    fn out_of_range_index_is_fatal() {
        let table = PairTable::new(vec![
            PairRecord::new(0, 0.5, 0).with_scale(SCALE, vec![7])
        ]);
        let selection = UnknownSelection::all(3);
        let err =
            collapse_ids_to_single_estimate(&table, SCALE, &selection, false).unwrap_err();
        assert!(err.to_string().contains("index 7"));
    }

    #[test]
    fn full_sample_counts_everything_and_ignores_weights() {
        let table = table_with_k_matches(4, 6);
        let weighted = UnknownSelection::all(4).with_weights(vec![2.0, 2.0, 2.0, 2.0]);

        let plain = collapse_full_sample(&table, SCALE, None).unwrap();
        let with_weights = collapse_full_sample(&table, SCALE, Some(&weighted)).unwrap();

        assert_eq!(plain.len(), 6);
        for (a, b) in plain.iter().zip(&with_weights) {
            // Non-unit weights must not leak into the estimate.
            assert_eq!(a.density.to_bits(), b.density.to_bits());
            assert!((a.density - 4.0).abs() < 1e-12);
        }
    }

    #[test]
    fn chunked_collapse_preserves_input_order() {
        // More records than one chunk to exercise the concatenation path.
        let table = table_with_k_matches(1, 3000);
        let selection = UnknownSelection::all(1);
        let estimates =
            collapse_ids_to_single_estimate(&table, SCALE, &selection, false).unwrap();
        assert_eq!(estimates.len(), 3000);
        for (i, est) in estimates.iter().enumerate() {
            assert!((est.redshift - (0.2 + 0.1 * i as f64)).abs() < 1e-9);
        }
    }
}
