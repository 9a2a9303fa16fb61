//! Writers and readers for the pipeline's artifacts.
//!
//! The engine never opens files itself: final tables go to any
//! `io::Write` sink, and the replayable region-draw list comes back in
//! through any `io::Read` source. File and format policy beyond these
//! plain ASCII/JSON shapes belongs to the driver layer.

use std::io::{BufRead, BufReader, Read, Write};

use crate::bootstrap::PdfResult;
use crate::density::RegionDensityMatrix;
use crate::error::{Error, Result};
use crate::types::RegionLabel;

/// Write the final PDF as an ASCII table, one row per bin in ascending
/// order: `z_low z_high estimate error`.
///
/// # Errors
///
/// Returns any error from the sink.
pub fn write_pdf_ascii<W: Write>(w: &mut W, result: &PdfResult) -> Result<()> {
    writeln!(w, "# z_low z_high estimate error")?;
    for bin in 0..result.n_bins() {
        writeln!(
            w,
            "{:.6e} {:.6e} {:.6e} {:.6e}",
            result.edges.low(bin),
            result.edges.high(bin),
            result.estimates[bin],
            result.errors[bin],
        )?;
    }
    Ok(())
}

/// Write the per-trial PDF values, one row per bootstrap trial with one
/// column per bin.
///
/// # Errors
///
/// Returns any error from the sink.
pub fn write_bootstraps_ascii<W: Write>(w: &mut W, result: &PdfResult) -> Result<()> {
    writeln!(w, "# one row per bootstrap trial, one column per redshift bin")?;
    for trial in &result.trials {
        let mut first = true;
        for value in trial {
            if !first {
                write!(w, " ")?;
            }
            write!(w, "{:.6e}", value)?;
            first = false;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Write the per-trial region-label draws, one whitespace-separated row
/// per trial. [`read_region_draws`] accepts exactly this shape.
///
/// # Errors
///
/// Returns any error from the sink.
pub fn write_region_draws_ascii<W: Write>(w: &mut W, draws: &[Vec<RegionLabel>]) -> Result<()> {
    for draw in draws {
        let mut first = true;
        for label in draw {
            if !first {
                write!(w, " ")?;
            }
            write!(w, "{}", label)?;
            first = false;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Read a region-draw list previously written by
/// [`write_region_draws_ascii`].
///
/// Blank lines and `#` comment lines are skipped. Feeding the result to
/// [`bootstrap_pdf_with_draws`](crate::bootstrap::bootstrap_pdf_with_draws)
/// recomputes the original PDF exactly.
///
/// # Errors
///
/// [`Error::DrawParse`] on a non-integer token; [`Error::Io`] from the
/// source.
pub fn read_region_draws<R: Read>(r: R) -> Result<Vec<Vec<RegionLabel>>> {
    let reader = BufReader::new(r);
    let mut draws = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let draw: std::result::Result<Vec<RegionLabel>, _> = trimmed
            .split_whitespace()
            .map(|token| token.parse::<RegionLabel>())
            .collect();
        match draw {
            Ok(draw) => draws.push(draw),
            Err(err) => {
                return Err(Error::DrawParse(format!("'{}': {}", trimmed, err)));
            }
        }
    }
    Ok(draws)
}

/// Serialize the region-density snapshot as JSON.
///
/// # Errors
///
/// [`Error::Json`] on serialization failure, [`Error::Io`] from the sink.
pub fn write_region_snapshot_json<W: Write>(w: &mut W, matrix: &RegionDensityMatrix) -> Result<()> {
    serde_json::to_writer(w, matrix)?;
    Ok(())
}

/// Restore a region-density snapshot written by
/// [`write_region_snapshot_json`].
///
/// # Errors
///
/// [`Error::Json`] on malformed input.
pub fn read_region_snapshot_json<R: Read>(r: R) -> Result<RegionDensityMatrix> {
    Ok(serde_json::from_reader(r)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::linear_edges;
    use crate::bootstrap::bootstrap_pdf_with_draws;
    use crate::density::RegionDensityMatrix;
    use crate::types::CollapsedEstimate;

    fn toy_result() -> PdfResult {
        let estimates = vec![
            CollapsedEstimate {
                region: 0,
                redshift: 0.25,
                density: 2.0,
                raw_pairs: 2,
            },
            CollapsedEstimate {
                region: 1,
                redshift: 0.75,
                density: 4.0,
                raw_pairs: 4,
            },
        ];
        let edges = linear_edges(0.0, 1.0, 2).unwrap();
        let matrix = RegionDensityMatrix::build(&estimates, edges, 1.0);
        bootstrap_pdf_with_draws(&matrix, &[vec![0, 1], vec![1, 1]]).unwrap()
    }

    #[test]
    fn pdf_table_has_header_and_one_row_per_bin() {
        let result = toy_result();
        let mut sink = Vec::new();
        write_pdf_ascii(&mut sink, &result).unwrap();

        let text = String::from_utf8(sink).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1 + result.n_bins());
        assert!(lines[0].starts_with('#'));
        assert_eq!(lines[1].split_whitespace().count(), 4);
    }

    #[test]
    fn bootstrap_table_has_one_row_per_trial() {
        let result = toy_result();
        let mut sink = Vec::new();
        write_bootstraps_ascii(&mut sink, &result).unwrap();

        let text = String::from_utf8(sink).unwrap();
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(rows.len(), result.n_trials());
        assert_eq!(rows[0].split_whitespace().count(), result.n_bins());
    }

    #[test]
    fn draw_list_round_trips() {
        let draws = vec![vec![0, 1, 2], vec![2, 2, 2]];
        let mut sink = Vec::new();
        write_region_draws_ascii(&mut sink, &draws).unwrap();
        let restored = read_region_draws(sink.as_slice()).unwrap();
        assert_eq!(restored, draws);
    }

    #[test]
    fn draw_reader_skips_comments_and_rejects_junk() {
        let text = "# comment\n\n0 1 2\n";
        assert_eq!(read_region_draws(text.as_bytes()).unwrap(), vec![vec![0, 1, 2]]);

        let bad = "0 one 2\n";
        assert!(matches!(
            read_region_draws(bad.as_bytes()),
            Err(Error::DrawParse(_))
        ));
    }
}
