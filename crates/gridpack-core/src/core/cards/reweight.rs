use crate::core::dof::DegreeOfFreedom;
use crate::core::point::{ScanPoint, format_value, round_to_precision};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

const BANNER_RULE: &str = "#******************************************************************";
const DUMMY_POINT_NAME: &str = "dummy_point";
const DUMMY_POINT_VALUE: f64 = 0.0123;

/// Name of the reweight entry for the `idx`-th scan point.
///
/// Encodes every coordinate as `_<dof>_<value>`, e.g. `EFTrwgt3_ctG_1.5_ctW_-2.0`.
pub fn reweight_name(idx: usize, point: &ScanPoint) -> String {
    let mut name = format!("EFTrwgt{}", idx);
    for (dof, value) in point.iter() {
        let _ = write!(name, "_{}_{}", dof, format_value(round_to_precision(value)));
    }
    name
}

/// Renders the reweight card for `points`.
///
/// The first launch block is a throw-away point on the first DoF; the generator
/// fails to rename the first reweight entry, so every real point starts at the
/// second block.
pub fn render_reweight_card(dofs: &[DegreeOfFreedom], points: &[ScanPoint]) -> String {
    let mut out = String::new();
    out.push_str(BANNER_RULE);
    out.push('\n');
    out.push_str("#                       Reweight Module                           *\n");
    out.push_str(BANNER_RULE);
    out.push('\n');
    out.push_str("\nchange rwgt_dir rwgt\n");

    out.push_str(&format!("\nlaunch --rwgt_name={}", DUMMY_POINT_NAME));
    if let Some(first) = dofs.first() {
        push_set_lines(&mut out, first, DUMMY_POINT_VALUE);
    }
    out.push('\n');

    for (idx, point) in points.iter().enumerate() {
        out.push_str(&format!("\nlaunch --rwgt_name={}", reweight_name(idx, point)));
        for (name, value) in point.iter() {
            match dofs.iter().find(|d| d.name() == name) {
                Some(dof) => push_set_lines(&mut out, dof, value),
                None => warn!("Reweight point {} references unknown DoF {}", idx, name),
            }
        }
        out.push('\n');
    }
    out
}

fn push_set_lines(out: &mut String, dof: &DegreeOfFreedom, x: f64) {
    for (coupling, value) in dof.eval(x) {
        let _ = write!(out, "\nset {} {:.6}", coupling, value);
    }
}

/// Writes the reweight card to `path`. Nothing is written for an empty point list.
///
/// Returns `true` if a file was written.
pub fn write_reweight_card(
    path: &Path,
    dofs: &[DegreeOfFreedom],
    points: &[ScanPoint],
) -> io::Result<bool> {
    if points.is_empty() {
        return Ok(false);
    }
    fs::write(path, render_reweight_card(dofs, points))?;
    Ok(true)
}
