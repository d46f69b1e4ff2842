use super::FileFormatError;
use crate::core::dof::DegreeOfFreedom;
use crate::core::point::{ScanPoint, format_value};
use std::fs;
use std::path::Path;

const COL_WIDTH: usize = 15;
const COL_SEP: &str = " ";
const START_ROW: &str = "MGStart";

/// Renders the scan-point table: a header of DoF names, the start point, then one row per reweight point.
pub fn render_scan_points(dofs: &[DegreeOfFreedom], points: &[ScanPoint]) -> String {
    let mut out = format!("{:<w$}", "", w = COL_WIDTH);
    for dof in dofs {
        out.push_str(&format!("{:<w$}{}", dof.name(), COL_SEP, w = COL_WIDTH));
    }

    // The leading newline counts toward the first column's width.
    out.push_str(&format!("\n{:<w$}{}", START_ROW, COL_SEP, w = COL_WIDTH - 1));
    for dof in dofs {
        out.push_str(&format!("{:<w$}{}", format_value(dof.start()), COL_SEP, w = COL_WIDTH));
    }

    for (idx, point) in points.iter().enumerate() {
        out.push_str(&format!("\n{:<w$}{}", format!("rwgt{}", idx), COL_SEP, w = COL_WIDTH));
        for dof in dofs {
            let value = format_value(point.get(dof.name()));
            out.push_str(&format!("{:<w$}{}", value, COL_SEP, w = COL_WIDTH));
        }
    }
    out
}

pub fn write_scan_points(
    path: &Path,
    dofs: &[DegreeOfFreedom],
    points: &[ScanPoint],
) -> Result<(), FileFormatError> {
    fs::write(path, render_scan_points(dofs, points))?;
    Ok(())
}

/// Reads a scan-point table. The first returned point is the start point.
pub fn read_scan_points(path: &Path) -> Result<Vec<ScanPoint>, FileFormatError> {
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines().enumerate();
    let names: Vec<&str> = match lines.next() {
        Some((_, header)) => header.split_whitespace().collect(),
        None => return Err(FileFormatError::MissingHeader(path.to_path_buf())),
    };

    let mut points = Vec::new();
    for (idx, line) in lines {
        let mut fields = line.split_whitespace();
        if fields.next().is_none() {
            continue;
        }
        let mut point = ScanPoint::new();
        for (name, raw) in names.iter().zip(fields) {
            let value = raw.parse::<f64>().map_err(|_| FileFormatError::InvalidFloat {
                path: path.to_path_buf(),
                line: idx + 1,
                value: raw.to_string(),
            })?;
            point.insert(*name, value);
        }
        points.push(point);
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dofs() -> Vec<DegreeOfFreedom> {
        vec![
            DegreeOfFreedom::single("ctG").with_limits(2.5, Some(-5.0), Some(5.0)),
            DegreeOfFreedom::single("ctW").with_limits(-1.0, Some(-5.0), Some(5.0)),
        ]
    }

    #[test]
    fn render_aligns_columns() {
        let pts = vec![[("ctG", 1.0)].into_iter().collect::<ScanPoint>()];
        let text = render_scan_points(&dofs(), &pts);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("{:15}{:15} {:15} ", "", "ctG", "ctW"));
        assert_eq!(lines[1], format!("{:14} {:15} {:15} ", "MGStart", "2.5", "-1.0"));
        assert_eq!(lines[2], format!("{:15} {:15} {:15} ", "rwgt0", "1.0", "0.0"));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn read_returns_start_point_first() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ttH_Test_run0_scanpoints.txt");
        let pts = vec![
            [("ctG", 1.0), ("ctW", -2.0)].into_iter().collect::<ScanPoint>(),
            ScanPoint::sm(["ctG", "ctW"]),
        ];
        write_scan_points(&path, &dofs(), &pts).unwrap();

        let read = read_scan_points(&path).unwrap();
        assert_eq!(read.len(), 3);
        assert_eq!(read[0].get("ctG"), 2.5);
        assert_eq!(read[0].get("ctW"), -1.0);
        assert_eq!(read[1], pts[0]);
        assert!(read[2].is_sm());
    }

    #[test]
    fn read_rejects_bad_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.txt");
        fs::write(&path, "  ctG\nMGStart 1.0\nrwgt0 abc\n").unwrap();
        assert!(matches!(
            read_scan_points(&path),
            Err(FileFormatError::InvalidFloat { line: 3, .. })
        ));
    }

    #[test]
    fn read_empty_file_has_no_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.txt");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            read_scan_points(&path),
            Err(FileFormatError::MissingHeader(_))
        ));
    }
}
