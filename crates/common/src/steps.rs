//! Step table codec
//!
//! Steps travel as CSV with a fixed `Action,Data,Expected Result` header. The
//! same table is embedded in the generation prompt, so the column order and
//! quoting must be deterministic.

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};

use crate::types::Step;
use crate::{Error, Result};

/// Column headers in serialization order
pub const TABLE_HEADERS: [&str; 3] = ["Action", "Data", "Expected Result"];

const ACTION_ALIASES: &[&str] = &["Action", "Aktion"];
const DATA_ALIASES: &[&str] = &["Data", "Daten"];
const EXPECTED_ALIASES: &[&str] = &["Expected Result", "Erwartetes Resultat"];

/// Serialize steps to CSV ordered by index (stable for duplicate indices).
///
/// An empty step list yields the header line alone.
pub fn steps_to_table(steps: &[Step]) -> Result<String> {
    let mut ordered: Vec<&Step> = steps.iter().collect();
    ordered.sort_by_key(|s| s.index);

    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(TABLE_HEADERS)?;
    for step in ordered {
        writer.write_record([
            step.action.as_str(),
            step.input_data.as_str(),
            step.expected_result.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidConfig(format!("step table is not UTF-8: {}", e)))
}

/// Parse a CSV step table. Indices are reassigned `0..n-1` in row order.
///
/// Blank input yields no steps. Unknown columns are ignored and missing
/// columns default to empty strings.
pub fn table_to_steps(table: &str) -> Result<Vec<Step>> {
    if table.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(table.as_bytes());

    let headers = reader.headers()?.clone();
    let action_col = column_positions(&headers, ACTION_ALIASES);
    let data_col = column_positions(&headers, DATA_ALIASES);
    let expected_col = column_positions(&headers, EXPECTED_ALIASES);

    let mut steps = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        steps.push(Step {
            index: idx as u32,
            action: first_non_blank(&record, &action_col),
            input_data: first_non_blank(&record, &data_col),
            expected_result: first_non_blank(&record, &expected_col),
        });
    }

    Ok(steps)
}

/// True when at least one step carries content worth sending to the agent
pub fn has_content(steps: &[Step]) -> bool {
    steps.iter().any(|s| !s.is_blank())
}

fn column_positions(headers: &StringRecord, aliases: &[&str]) -> Vec<usize> {
    aliases
        .iter()
        .filter_map(|alias| headers.iter().position(|h| h == *alias))
        .collect()
}

fn first_non_blank(record: &StringRecord, columns: &[usize]) -> String {
    columns
        .iter()
        .filter_map(|&col| record.get(col))
        .find(|v| !v.trim().is_empty())
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_steps() -> Vec<Step> {
        vec![
            Step::new(2, "Click login", "", "Dashboard is shown"),
            Step::new(0, "Open start page", "https://example.com", ""),
            Step::new(1, "Enter credentials", "user, \"quoted\" pass", ""),
        ]
    }

    #[test]
    fn test_header_only_for_empty_steps() {
        let table = steps_to_table(&[]).unwrap();
        assert_eq!(table.trim_end(), "Action,Data,Expected Result");
        assert!(table_to_steps(&table).unwrap().is_empty());
    }

    #[test]
    fn test_table_is_sorted_by_index() {
        let table = steps_to_table(&sample_steps()).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Action,Data,Expected Result");
        assert!(lines[1].starts_with("Open start page"));
        assert!(lines[2].starts_with("Enter credentials"));
        assert!(lines[3].starts_with("Click login"));
    }

    #[test]
    fn test_round_trip_preserves_content_and_reindexes() {
        let steps = sample_steps();
        let parsed = table_to_steps(&steps_to_table(&steps).unwrap()).unwrap();

        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0], Step::new(0, "Open start page", "https://example.com", ""));
        assert_eq!(parsed[1], Step::new(1, "Enter credentials", "user, \"quoted\" pass", ""));
        assert_eq!(parsed[2], Step::new(2, "Click login", "", "Dashboard is shown"));
    }

    #[test]
    fn test_round_trip_is_idempotent() {
        let once = table_to_steps(&steps_to_table(&sample_steps()).unwrap()).unwrap();
        let twice = table_to_steps(&steps_to_table(&once).unwrap()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_gaps_and_duplicate_indices_keep_sort_order() {
        let steps = vec![
            Step::new(10, "b", "", ""),
            Step::new(3, "a", "", ""),
            Step::new(10, "c", "", ""),
        ];
        let parsed = table_to_steps(&steps_to_table(&steps).unwrap()).unwrap();
        let actions: Vec<_> = parsed.iter().map(|s| s.action.as_str()).collect();
        let indices: Vec<_> = parsed.iter().map(|s| s.index).collect();
        assert_eq!(actions, vec!["a", "b", "c"]);
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_german_headers_and_missing_columns() {
        let csv = "Aktion,Erwartetes Resultat\n  Seite öffnen  ,Startseite sichtbar\n";
        let steps = table_to_steps(csv).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, "Seite öffnen");
        assert_eq!(steps[0].input_data, "");
        assert_eq!(steps[0].expected_result, "Startseite sichtbar");
    }

    #[test]
    fn test_blank_input_yields_no_steps() {
        assert!(table_to_steps("").unwrap().is_empty());
        assert!(table_to_steps("   \n ").unwrap().is_empty());
    }

    #[test]
    fn test_has_content() {
        assert!(!has_content(&[]));
        assert!(!has_content(&[Step::new(0, " ", "", "")]));
        assert!(has_content(&[Step::new(0, "", "", "visible")]));
    }
}
