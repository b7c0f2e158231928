//! Query results as JSON rows, and their conversion into typed models.

use serde_json::{Map, Value};

use crate::errors::{SettingsError, SettingsResult};
use crate::models::{OverrideRow, UnusedSettingRow, WarehouseSettingRow};

/// One result row keyed by lower-case column name.
pub type Row = Map<String, Value>;

/// Lower-case every key of `row`.
pub fn normalize_row(row: Row) -> Row {
    row.into_iter()
        .map(|(key, value)| (key.to_ascii_lowercase(), value))
        .collect()
}

/// Locate and decode the JSON payload in raw CLI output.
///
/// The whole output is tried first; failing that, decoding starts at the
/// first line that opens with `[` or `{` (clients like to print banners and
/// warnings first). When the payload is a list of result sets, one per
/// statement, the last set is returned.
pub fn parse_rows(output: &str) -> SettingsResult<Vec<Row>> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(SettingsError::MalformedOutput(
            "query produced no output".to_string(),
        ));
    }

    let payload = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(_) => {
            let start = json_start(output).ok_or_else(|| {
                SettingsError::MalformedOutput(format!(
                    "no JSON payload found in output: {}",
                    preview(trimmed)
                ))
            })?;
            serde_json::from_str::<Value>(output[start..].trim()).map_err(|e| {
                SettingsError::MalformedOutput(format!("unparsable JSON payload: {e}"))
            })?
        }
    };

    rows_from_value(payload)
}

fn rows_from_value(payload: Value) -> SettingsResult<Vec<Row>> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("data").or_else(|| obj.remove("rows")) {
            Some(inner) => return rows_from_value(inner),
            None => vec![Value::Object(obj)],
        },
        other => {
            return Err(SettingsError::MalformedOutput(format!(
                "expected a list of rows, got {}",
                preview(&other.to_string())
            )))
        }
    };

    if !items.is_empty() && items.iter().all(Value::is_array) {
        let last = items.into_iter().last().unwrap_or(Value::Array(vec![]));
        return rows_from_value(last);
    }

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(row) => Ok(normalize_row(row)),
            other => Err(SettingsError::MalformedOutput(format!(
                "expected a row object, got {}",
                preview(&other.to_string())
            ))),
        })
        .collect()
}

fn json_start(output: &str) -> Option<usize> {
    let mut offset = 0usize;
    for line in output.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }
    None
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 200;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

/// Render a scalar cell as text. Numbers and booleans use their JSON form;
/// null becomes the empty string.
pub fn cell_text(row: &Row, column: &str) -> String {
    match row.get(column) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn required_text(row: &Row, column: &str) -> SettingsResult<String> {
    let text = cell_text(row, column);
    if text.is_empty() {
        return Err(SettingsError::MalformedOutput(format!(
            "row is missing required column {column:?}"
        )));
    }
    Ok(text)
}

fn cell_number(row: &Row, column: &str, default: f64) -> f64 {
    match row.get(column) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

impl WarehouseSettingRow {
    pub fn from_row(row: &Row) -> SettingsResult<Self> {
        Ok(Self {
            name: required_text(row, "name")?,
            description: cell_text(row, "description"),
            created_date: cell_text(row, "created_date"),
        })
    }
}

impl UnusedSettingRow {
    pub fn from_row(row: &Row) -> SettingsResult<Self> {
        Ok(Self {
            name: required_text(row, "name")?,
        })
    }
}

impl OverrideRow {
    pub fn from_row(row: &Row) -> SettingsResult<Self> {
        Ok(Self {
            name: required_text(row, "name")?,
            pod: cell_text(row, "pod"),
            override_type: cell_text(row, "override_type"),
            target_id: cell_text(row, "target_id"),
            value: cell_text(row, "value"),
            percentage: cell_number(row, "percentage", 100.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_array_normalizes_keys() {
        let rows = parse_rows(r#"[{"NAME": "a", "Description": "d"}]"#).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], json!("a"));
        assert_eq!(rows[0]["description"], json!("d"));
    }

    #[test]
    fn test_parse_skips_banner_lines() {
        let output = "WARNING: new client version available\nConnecting...\n[\n  {\"NAME\": \"a\"}\n]\n";
        let rows = parse_rows(output).unwrap();
        assert_eq!(cell_text(&rows[0], "name"), "a");
    }

    #[test]
    fn test_parse_multi_statement_takes_last_result_set() {
        let output = r#"[[{"status": "ok"}], [{"NAME": "x"}, {"NAME": "y"}]]"#;
        let rows = parse_rows(output).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(cell_text(&rows[1], "name"), "y");
    }

    #[test]
    fn test_parse_data_envelope() {
        let rows = parse_rows(r#"{"data": [{"NAME": "z"}]}"#).unwrap();
        assert_eq!(cell_text(&rows[0], "name"), "z");
    }

    #[test]
    fn test_parse_empty_result() {
        assert!(parse_rows("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_output_without_payload() {
        for output in ["", "   \n", "Error: authentication failed", "[not json", "42"] {
            let err = parse_rows(output).unwrap_err();
            assert!(
                matches!(err, SettingsError::MalformedOutput(_)),
                "{output:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_cell_text_renders_scalars() {
        let row: Row = normalize_row(
            json!({"A": 1, "B": null, "C": true, "D": "s"})
                .as_object()
                .unwrap()
                .clone(),
        );
        assert_eq!(cell_text(&row, "a"), "1");
        assert_eq!(cell_text(&row, "b"), "");
        assert_eq!(cell_text(&row, "c"), "true");
        assert_eq!(cell_text(&row, "d"), "s");
        assert_eq!(cell_text(&row, "missing"), "");
    }

    #[test]
    fn test_typed_rows() {
        let row = normalize_row(
            json!({"NAME": "f", "DESCRIPTION": null, "CREATED_DATE": "2023-01-01"})
                .as_object()
                .unwrap()
                .clone(),
        );
        let setting = WarehouseSettingRow::from_row(&row).unwrap();
        assert_eq!(setting.name, "f");
        assert_eq!(setting.description, "");
        assert_eq!(setting.created_date, "2023-01-01");

        let nameless = Row::new();
        assert!(UnusedSettingRow::from_row(&nameless).is_err());

        let ov = normalize_row(
            json!({"NAME": "f", "POD": "us1", "PERCENTAGE": "40", "VALUE": 7})
                .as_object()
                .unwrap()
                .clone(),
        );
        let ov = OverrideRow::from_row(&ov).unwrap();
        assert_eq!(ov.percentage, 40.0);
        assert_eq!(ov.value, "7");
    }
}
