//! Measurement results as returned by the inference service, and their
//! presentation as table rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::EstimateError;

pub const DISCLAIMER: &str = "Measurements are approximate and generated using pose estimation, \
geometric scaling, and anthropometric constraints.";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub estimated_height_cm: f64,
    pub shoulder_width_cm: f64,
    pub arm_length_cm: f64,
    pub leg_length_cm: f64,
}

/// A successful estimation. Replaced wholesale by the next success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    pub measurements: Measurements,
    #[serde(default)]
    pub views_used: u32,
    #[serde(default)]
    pub accuracy_note: String,
}

impl MeasurementResult {
    /// Parse a 2xx response body.
    ///
    /// A body that is not a JSON object with a `measurements` field is a
    /// malformed response, never a panic.
    pub fn from_body(body: &str) -> Result<Self, EstimateError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| EstimateError::MalformedResponse(format!("body is not JSON: {}", e)))?;

        match value.get("measurements") {
            None | Some(Value::Null) => {
                return Err(EstimateError::MalformedResponse(
                    "missing `measurements` field".to_string(),
                ))
            }
            Some(_) => {}
        }

        serde_json::from_value(value).map_err(|e| EstimateError::MalformedResponse(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub label: &'static str,
    pub value: String,
}

pub fn format_cm(value: f64) -> String {
    // {:.1} alone rounds ties to even on the binary value, so 45.25 would print 45.2
    format!("{:.1} cm", (value * 10.0).round() / 10.0)
}

/// The four measurement rows, in display order.
pub fn measurement_rows(result: &MeasurementResult) -> Vec<ResultRow> {
    let m = &result.measurements;
    [
        ("Estimated Height", m.estimated_height_cm),
        ("Shoulder Width", m.shoulder_width_cm),
        ("Arm Length", m.arm_length_cm),
        ("Leg / Inseam Length", m.leg_length_cm),
    ]
    .into_iter()
    .map(|(label, value)| ResultRow { label, value: format_cm(value) })
    .collect()
}

/// View count and accuracy note, verbatim.
pub fn metadata_rows(result: &MeasurementResult) -> Vec<ResultRow> {
    vec![
        ResultRow { label: "Views Used", value: result.views_used.to_string() },
        ResultRow { label: "Accuracy", value: result.accuracy_note.clone() },
    ]
}

/// Plain-text table for non-interactive output.
pub fn render_table(result: &MeasurementResult) -> String {
    let rows = measurement_rows(result);
    let meta = metadata_rows(result);
    let label_width = rows
        .iter()
        .chain(meta.iter())
        .map(|r| r.label.len())
        .max()
        .unwrap_or(0)
        .max("Measurement".len());

    let mut out = String::new();
    out.push_str(&format!("{:<width$}  {}\n", "Measurement", "Value", width = label_width));
    out.push_str(&format!("{}  {}\n", "-".repeat(label_width), "-".repeat(10)));
    for row in rows.iter().chain(meta.iter()) {
        out.push_str(&format!("{:<width$}  {}\n", row.label, row.value, width = label_width));
    }
    out.push('\n');
    out.push_str(DISCLAIMER);
    out.push('\n');
    out
}
