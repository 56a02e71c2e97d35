//! Violation records and report rendering.
//!
//! Violations are plain data: produced by the check routines, never
//! mutated, and rendered here either as a row-oriented table (CSV) or as an
//! IPC-D-356A-style netlist file with one comment record per violation.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::engine::DrcError;
use crate::snapshot::{LayoutSnapshot, ObjectId};

/// One design rule violation.
///
/// Only the fields that apply to the rule kind are set; the table export
/// leaves the rest blank. Distances are micrometers, impedances ohms,
/// ratios percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Violation {
    /// Rule kind name (`min_line_width`, ...).
    pub rule: String,
    /// Rule instance name from the deck.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object2: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_um: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_um: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imbalance_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_ohms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_ohms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_pct: Option<f64>,
    pub message: String,
}

/// Column order used by the table export. Only columns with at least one
/// value appear in a given table.
const COLUMNS: &[&str] = &[
    "rule",
    "name",
    "layer",
    "net",
    "net2",
    "object",
    "object2",
    "via",
    "value_um",
    "limit_um",
    "imbalance_pct",
    "z_ohms",
    "target_ohms",
    "deviation_pct",
    "limit_pct",
    "message",
];

fn fmt_num(v: f64) -> String {
    format!("{v:.3}")
}

impl Violation {
    fn column(&self, name: &str) -> Option<String> {
        match name {
            "rule" => Some(self.rule.clone()),
            "name" => Some(self.name.clone()),
            "layer" => self.layer.clone(),
            "net" => self.net.clone(),
            "net2" => self.net2.clone(),
            "object" => self.object.map(|id| id.to_string()),
            "object2" => self.object2.map(|id| id.to_string()),
            "via" => self.via.clone(),
            "value_um" => self.value_um.map(fmt_num),
            "limit_um" => self.limit_um.map(fmt_num),
            "imbalance_pct" => self.imbalance_pct.map(fmt_num),
            "z_ohms" => self.z_ohms.map(fmt_num),
            "target_ohms" => self.target_ohms.map(fmt_num),
            "deviation_pct" => self.deviation_pct.map(fmt_num),
            "limit_pct" => self.limit_pct.map(fmt_num),
            "message" => Some(self.message.clone()),
            _ => None,
        }
    }
}

/// Row-oriented view of a violation list: the column set is the union of
/// the fields present across all rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn to_table(violations: &[Violation]) -> ViolationTable {
    let columns: Vec<String> = COLUMNS
        .iter()
        .filter(|c| violations.iter().any(|v| v.column(c).is_some()))
        .map(|c| c.to_string())
        .collect();
    let rows = violations
        .iter()
        .map(|v| {
            columns
                .iter()
                .map(|c| v.column(c).unwrap_or_default())
                .collect()
        })
        .collect();
    ViolationTable { columns, rows }
}

/// Write the violation table as CSV.
pub fn write_csv<W: Write>(violations: &[Violation], writer: W) -> Result<(), DrcError> {
    let table = to_table(violations);
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(&table.columns)
        .map_err(|e| DrcError::Report(e.to_string()))?;
    for row in &table.rows {
        out.write_record(row)
            .map_err(|e| DrcError::Report(e.to_string()))?;
    }
    out.flush()?;
    Ok(())
}

/// Fixed-precision integer micrometer coordinate, sign always present.
fn fmt_um(meters: f64) -> String {
    let um = (meters * 1e6).round() as i64;
    format!("{um:+08}")
}

/// Render the IPC-D-356A-style netlist report: a header block, per-net
/// geometry records, one comment per violation, and the `999` sentinel.
pub fn render_netlist(snapshot: &LayoutSnapshot, violations: &[Violation]) -> String {
    let mut out = String::new();
    out.push_str("C  IPC-D-356A STYLE NETLIST\n");
    out.push_str(&format!(
        "C  DATE {}\n",
        chrono::Utc::now().format("%Y-%m-%d")
    ));
    out.push_str(&format!(
        "C  SOURCE COPPERCHECK {}\n",
        env!("CARGO_PKG_VERSION")
    ));

    for net in snapshot.net_names() {
        out.push_str(&format!("NET {net}\n"));
        for prim in snapshot.primitives.iter().filter(|p| p.net == net) {
            if prim.length.is_none() {
                continue;
            }
            if let (Some(start), Some(end)) = (prim.start, prim.end) {
                out.push_str(&format!(
                    "317 L {} {} {} {}\n",
                    fmt_um(start.x),
                    fmt_um(start.y),
                    fmt_um(end.x),
                    fmt_um(end.y)
                ));
            }
        }
        for via in snapshot.vias.iter().filter(|v| v.net == net) {
            out.push_str(&format!(
                "317 V {} {}\n",
                fmt_um(via.position.x),
                fmt_um(via.position.y)
            ));
        }
    }

    for v in violations {
        out.push_str(&format!("C  RULE {}", v.rule));
        if let Some(id) = v.object {
            out.push_str(&format!(" OBJ {id}"));
        }
        if let Some(net) = &v.net {
            out.push_str(&format!(" NET {net}"));
        }
        if let Some(limit) = v.limit_um.or(v.limit_pct).or(v.target_ohms) {
            out.push_str(&format!(" LIMIT {}", fmt_num(limit)));
        }
        out.push('\n');
    }

    out.push_str("999\n");
    out
}

/// Write the netlist report to `path`, creating or overwriting the file.
pub fn write_netlist_report(
    path: &Path,
    snapshot: &LayoutSnapshot,
    violations: &[Violation],
) -> Result<(), DrcError> {
    std::fs::write(path, render_netlist(snapshot, violations))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Polygon};
    use crate::snapshot::{Primitive, PrimitiveKind, Via};

    fn width_violation() -> Violation {
        Violation {
            rule: "min_line_width".into(),
            name: "MW".into(),
            layer: Some("TOP".into()),
            object: Some(3),
            value_um: Some(76.2),
            limit_um: Some(88.9),
            message: "path 3 on TOP is 76.200µm wide, minimum is 88.900µm".into(),
            ..Default::default()
        }
    }

    fn balance_violation() -> Violation {
        Violation {
            rule: "copper_balance".into(),
            name: "CB".into(),
            layer: Some("L3".into()),
            imbalance_pct: Some(40.0),
            limit_pct: Some(15.0),
            message: "copper on L3 is 40.0% out of balance, limit 15.0%".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_table_union_of_columns() {
        let table = to_table(&[width_violation(), balance_violation()]);
        assert!(table.columns.contains(&"value_um".to_string()));
        assert!(table.columns.contains(&"imbalance_pct".to_string()));
        // No violation set a via name, so the column is absent entirely.
        assert!(!table.columns.contains(&"via".to_string()));
        assert_eq!(table.rows.len(), 2);

        // The balance row leaves the width columns blank.
        let value_idx = table.columns.iter().position(|c| c == "value_um").unwrap();
        assert_eq!(table.rows[1][value_idx], "");
    }

    #[test]
    fn test_csv_roundtrip_shape() {
        let mut buf = Vec::new();
        write_csv(&[width_violation()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("rule,name,"));
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn test_netlist_layout() {
        let snapshot = LayoutSnapshot {
            nets: vec!["GND".into()],
            primitives: vec![Primitive {
                id: 1,
                net: "GND".into(),
                layer: "TOP".into(),
                kind: PrimitiveKind::Path,
                width: Some(0.2e-3),
                length: Some(10e-3),
                start: Some(Point::new(0.0, 0.0)),
                end: Some(Point::new(10e-3, 0.0)),
                outline: Polygon::rect(Point::new(0.0, -0.1e-3), Point::new(10e-3, 0.1e-3)),
                is_void: false,
            }],
            vias: vec![Via {
                id: 2,
                name: Some("V1".into()),
                net: "GND".into(),
                position: Point::new(5e-3, 0.0),
                pads: vec![],
                hole_diameter: 0.2e-3,
                start_layer: "TOP".into(),
                stop_layer: "BOTTOM".into(),
                backdrill_depth: None,
                component: None,
            }],
            ..Default::default()
        };

        let text = render_netlist(&snapshot, &[width_violation()]);
        assert!(text.starts_with("C  IPC-D-356A STYLE NETLIST\n"));
        assert!(text.contains("NET GND\n"));
        assert!(text.contains("317 L +0000000 +0000000 +0010000 +0000000\n"));
        assert!(text.contains("317 V +0005000 +0000000\n"));
        assert!(text.contains("C  RULE min_line_width OBJ 3 LIMIT 88.900\n"));
        assert!(text.ends_with("999\n"));
    }

    #[test]
    fn test_netlist_file_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.356");
        write_netlist_report(&path, &LayoutSnapshot::default(), &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("999\n"));
    }
}
