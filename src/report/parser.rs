//! Report parser
//!
//! The header is checked eagerly when a reader is created. Data rows are
//! coerced lazily, one per call to `next`; a bad row yields an error item
//! and the reader carries on with the next one.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use csv::{StringRecord, StringRecordsIntoIter};
use thiserror::Error;

use super::schema::{FieldSpec, FieldType, Preamble, ReportSchema};
use super::value::{FieldValue, ReportRecord};
use crate::profile::ReportRules;

/// Errors that stop a report from being read at all
#[derive(Debug, Error)]
pub enum ReportError {
    /// No schema is pinned for this report kind
    #[error("no schema pinned for report kind '{kind}'")]
    UnknownKind { kind: String },

    /// The header row disagrees with the pinned schema
    #[error(
        "report '{kind}' does not match its pinned schema: expected [{}], found [{}]{}",
        .expected.join(", "),
        .observed.join(", "),
        format_missing(.missing)
    )]
    SchemaMismatch {
        kind: String,
        expected: Vec<String>,
        observed: Vec<String>,
        missing: Vec<String>,
    },

    /// The input ended before a header row was found
    #[error("report '{kind}' has no header row")]
    MissingHeader { kind: String },

    #[error("failed to read report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn format_missing(missing: &[String]) -> String {
    if missing.is_empty() {
        String::new()
    } else {
        format!("; missing {}", missing.join(", "))
    }
}

/// Why a single row could not be read
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldErrorKind {
    #[error("expected {expected}")]
    Unparsable { expected: FieldType },
    #[error("empty value for non-nullable field")]
    MissingValue,
    #[error("row ends before this field")]
    MissingColumn,
    #[error("unexpected extra column")]
    ExtraColumn,
    #[error("malformed row: {reason}")]
    Malformed { reason: String },
}

/// A row that could not be coerced. Recoverable: the rest of the report is
/// still read.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("row {row}, field '{field}': {kind} (value {raw:?})")]
pub struct FieldParseError {
    /// Data row number, starting at 1
    pub row: usize,
    pub field: String,
    pub raw: String,
    pub kind: FieldErrorKind,
}

/// Everything read from a report
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedReport {
    pub records: Vec<ReportRecord>,
    pub errors: Vec<FieldParseError>,
    /// `Label: value` cells found before the header
    pub metadata: BTreeMap<String, String>,
    /// Scenario start, from the `Start` metadata entry
    pub start: Option<NaiveDateTime>,
    /// Scenario stop, from the `Stop` metadata entry
    pub stop: Option<NaiveDateTime>,
}

impl ParsedReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Single-pass reader over the data rows of a report
pub struct ReportReader<'a> {
    schema: &'a ReportSchema,
    rules: &'a ReportRules,
    records: StringRecordsIntoIter<&'a [u8]>,
    metadata: BTreeMap<String, String>,
    row: usize,
}

impl fmt::Debug for ReportReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportReader")
            .field("kind", &self.schema.kind)
            .field("row", &self.row)
            .finish()
    }
}

/// Check the header of `raw` against `schema` and return a reader over its
/// data rows
pub fn parse<'a>(
    schema: &'a ReportSchema,
    rules: &'a ReportRules,
    raw: &'a str,
) -> Result<ReportReader<'a>, ReportError> {
    let lines = source_lines(raw);
    let missing_header = || ReportError::MissingHeader {
        kind: schema.kind.clone(),
    };

    let header_at = match &schema.preamble {
        Preamble::None => first_non_blank(&lines, 0),
        Preamble::Lines(n) if lines.len() < *n => None,
        Preamble::Lines(n) => first_non_blank(&lines, *n),
        Preamble::UntilHeader => find_header(schema, rules, &lines),
    }
    .ok_or_else(missing_header)?;

    let metadata = read_metadata(rules, &lines[..header_at]);
    let (header, data_start) = lines[header_at];

    let observed = header_cells(schema, rules, header);
    let expected: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();
    if observed != expected {
        let missing = expected
            .iter()
            .filter(|name| !observed.contains(name))
            .cloned()
            .collect();
        return Err(ReportError::SchemaMismatch {
            kind: schema.kind.clone(),
            expected,
            observed,
            missing,
        });
    }

    let mut records = csv_reader(&raw[data_start..], rules).into_records();
    for _ in 0..schema.units_rows {
        records.next();
    }

    tracing::debug!("Header of report '{}' matches its schema", schema.kind);
    Ok(ReportReader {
        schema,
        rules,
        records,
        metadata,
        row: 0,
    })
}

/// Read a report file and parse it completely
pub fn parse_file(
    schema: &ReportSchema,
    rules: &ReportRules,
    path: &Path,
) -> Result<ParsedReport, ReportError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse(schema, rules, &raw)?.finish())
}

impl ReportReader<'_> {
    /// `Label: value` cells found before the header
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Timestamp held by a metadata entry, e.g. `Start` or `Stop`.
    ///
    /// Text after the timestamp (a time zone, fractional seconds) is ignored.
    pub fn metadata_time(&self, label: &str) -> Option<NaiveDateTime> {
        let value = self.metadata.get(label)?;
        self.rules.timestamp_formats.iter().find_map(|format| {
            NaiveDateTime::parse_and_remainder(value, format)
                .ok()
                .map(|(time, _)| time)
        })
    }

    /// Drain the remaining rows, separating records from row errors
    pub fn finish(mut self) -> ParsedReport {
        let mut report = ParsedReport {
            start: self.metadata_time("Start"),
            stop: self.metadata_time("Stop"),
            metadata: std::mem::take(&mut self.metadata),
            ..Default::default()
        };
        let kind = self.schema.kind.clone();
        for item in self {
            match item {
                Ok(record) => report.records.push(record),
                Err(error) => report.errors.push(error),
            }
        }
        if !report.errors.is_empty() {
            tracing::warn!(
                "Report '{}': {} rows could not be read ({} records kept)",
                kind,
                report.errors.len(),
                report.records.len()
            );
        }
        report
    }

    fn parse_row(&self, record: &StringRecord) -> Result<ReportRecord, FieldParseError> {
        let fields = &self.schema.fields;
        let mut cells: Vec<&str> = record.iter().collect();
        drop_trailing_empty(&mut cells, fields.len());

        // Trailing nullable columns may be left off entirely
        if cells.len() < fields.len() && fields[cells.len()..].iter().all(|f| f.nullable) {
            cells.resize(fields.len(), "");
        }

        if cells.len() < fields.len() {
            return Err(FieldParseError {
                row: self.row,
                field: fields[cells.len()].name.clone(),
                raw: String::new(),
                kind: FieldErrorKind::MissingColumn,
            });
        }
        if cells.len() > fields.len() {
            return Err(FieldParseError {
                row: self.row,
                field: format!("column {}", fields.len() + 1),
                raw: cells[fields.len()].to_string(),
                kind: FieldErrorKind::ExtraColumn,
            });
        }

        let values = fields
            .iter()
            .zip(cells)
            .map(|(spec, cell)| {
                let value = self.coerce(spec, cell)?;
                Ok((spec.name.clone(), value))
            })
            .collect::<Result<Vec<_>, FieldParseError>>()?;
        Ok(ReportRecord::new(values))
    }

    fn coerce(&self, spec: &FieldSpec, cell: &str) -> Result<FieldValue, FieldParseError> {
        let error = |kind| FieldParseError {
            row: self.row,
            field: spec.name.clone(),
            raw: cell.to_string(),
            kind,
        };
        if cell.is_empty() {
            return if spec.nullable {
                Ok(FieldValue::Null)
            } else {
                Err(error(FieldErrorKind::MissingValue))
            };
        }

        let value = match spec.ty {
            FieldType::Text => Some(FieldValue::Text(self.schema.normalize_label(cell))),
            FieldType::Integer => cell.parse().ok().map(FieldValue::Integer),
            FieldType::Float => cell.parse().ok().map(FieldValue::Float),
            FieldType::Bool => self.parse_bool(cell).map(FieldValue::Bool),
            FieldType::Timestamp => self
                .rules
                .timestamp_formats
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(cell, format).ok())
                .map(FieldValue::Timestamp),
        };
        value.ok_or_else(|| error(FieldErrorKind::Unparsable { expected: spec.ty }))
    }

    fn parse_bool(&self, cell: &str) -> Option<bool> {
        let matches = |tokens: &[String]| tokens.iter().any(|t| t.eq_ignore_ascii_case(cell));
        if matches(&self.rules.true_tokens) {
            Some(true)
        } else if matches(&self.rules.false_tokens) {
            Some(false)
        } else {
            None
        }
    }
}

impl Iterator for ReportReader<'_> {
    type Item = Result<ReportRecord, FieldParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => {
                    self.row += 1;
                    return Some(Err(FieldParseError {
                        row: self.row,
                        field: String::new(),
                        raw: String::new(),
                        kind: FieldErrorKind::Malformed {
                            reason: e.to_string(),
                        },
                    }));
                }
            };
            // Whitespace-only lines
            if record.iter().all(str::is_empty) {
                continue;
            }
            self.row += 1;
            return Some(self.parse_row(&record));
        }
    }
}

/// Lines of `raw` without terminators, each with the byte offset just past it
fn source_lines(raw: &str) -> Vec<(&str, usize)> {
    let mut offset = 0;
    raw.split_inclusive('\n')
        .map(|chunk| {
            offset += chunk.len();
            (chunk.trim_end_matches(['\r', '\n']), offset)
        })
        .collect()
}

fn first_non_blank(lines: &[(&str, usize)], from: usize) -> Option<usize> {
    (from..lines.len()).find(|&i| !lines[i].0.trim().is_empty())
}

/// Locate the header of a report with a free-form preamble.
///
/// The header is the first line starting with the first field name. When the
/// application renamed or dropped that column, fall back to the first line
/// naming any declared field, then to the first line with as many cells as
/// the schema, so the drift is reported against the actual header.
fn find_header(
    schema: &ReportSchema,
    rules: &ReportRules,
    lines: &[(&str, usize)],
) -> Option<usize> {
    let first = schema.fields.first().map(|f| f.name.as_str())?;
    let candidates = move || {
        lines
            .iter()
            .enumerate()
            .filter(|(_, (line, _))| !line.trim().is_empty())
            .map(move |(i, (line, _))| (i, header_cells(schema, rules, line)))
    };
    let declared = |cell: &String| schema.fields.iter().any(|f| &f.name == cell);

    candidates()
        .find(|(_, cells)| cells.first().is_some_and(|cell| cell == first))
        .or_else(|| candidates().find(|(_, cells)| cells.iter().any(declared)))
        .or_else(|| candidates().find(|(_, cells)| cells.len() == schema.fields.len()))
        .map(|(i, _)| i)
}

/// Header names of one line, normalized and without the trailing delimiter
fn header_cells(schema: &ReportSchema, rules: &ReportRules, line: &str) -> Vec<String> {
    let record = split_line(line, rules);
    let mut cells: Vec<&str> = record.iter().collect();
    drop_trailing_empty(&mut cells, schema.fields.len());
    cells.into_iter().map(|c| schema.normalize_label(c)).collect()
}

/// Collect `Label: value` cells from the preamble
fn read_metadata(rules: &ReportRules, lines: &[(&str, usize)]) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    for (line, _) in lines {
        for cell in split_line(line, rules).iter() {
            if let Some((label, value)) = cell.split_once(':') {
                let (label, value) = (label.trim(), value.trim());
                if !label.is_empty() && !value.is_empty() {
                    metadata.insert(label.to_string(), value.to_string());
                }
            }
        }
    }
    metadata
}

fn csv_reader<'a>(text: &'a str, rules: &ReportRules) -> csv::Reader<&'a [u8]> {
    csv::ReaderBuilder::new()
        .delimiter(rules.delimiter as u8)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes())
}

fn split_line(line: &str, rules: &ReportRules) -> StringRecord {
    csv_reader(line, rules)
        .into_records()
        .next()
        .and_then(Result::ok)
        .unwrap_or_default()
}

/// The application ends rows with a delimiter; accept one empty cell past
/// the declared fields
fn drop_trailing_empty(cells: &mut Vec<&str>, expected: usize) {
    if cells.len() == expected + 1 && cells.last().is_some_and(|c| c.is_empty()) {
        cells.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;
    use pretty_assertions::assert_eq;

    fn altitude_schema() -> ReportSchema {
        ReportSchema::new(
            "altitude",
            vec![
                FieldSpec::new("time", FieldType::Timestamp),
                FieldSpec::new("altitude_km", FieldType::Float),
                FieldSpec::new("valid", FieldType::Bool).nullable(),
            ],
        )
    }

    fn rules() -> ReportRules {
        Profile::default().report
    }

    #[test]
    fn test_bad_row_does_not_stop_parsing() {
        let schema = altitude_schema();
        let rules = rules();
        let raw = "time,altitude_km,valid\n2024-001T00:00:00,550.2,\n2024-001T00:10:00,abc,true\n2024-001T00:20:00,551.0,no\n";
        let report = parse(&schema, &rules, raw).expect("header matches").finish();

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].get("altitude_km"), Some(&FieldValue::Float(550.2)));
        assert_eq!(report.records[0].get("valid"), Some(&FieldValue::Null));
        assert_eq!(report.records[1].get("valid"), Some(&FieldValue::Bool(false)));
        assert_eq!(
            report.errors,
            vec![FieldParseError {
                row: 2,
                field: "altitude_km".to_string(),
                raw: "abc".to_string(),
                kind: FieldErrorKind::Unparsable {
                    expected: FieldType::Float
                },
            }]
        );
    }

    #[test]
    fn test_reader_is_lazy() {
        let schema = altitude_schema();
        let rules = rules();
        let raw = "time,altitude_km,valid\n2024-001T00:00:00,1.0,yes\nnot,a,row\n";
        let mut reader = parse(&schema, &rules, raw).expect("header matches");
        assert!(reader.next().expect("first row").is_ok());
        assert!(reader.next().expect("second row").is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_header_missing_field() {
        let schema = altitude_schema();
        let rules = rules();
        let err = parse(&schema, &rules, "time,valid\n").expect_err("Should fail");
        match err {
            ReportError::SchemaMismatch { missing, observed, .. } => {
                assert_eq!(missing, vec!["altitude_km"]);
                assert_eq!(observed, vec!["time", "valid"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_header_order_matters() {
        let schema = altitude_schema();
        let rules = rules();
        let err = parse(&schema, &rules, "altitude_km,time,valid\n").expect_err("Should fail");
        assert!(matches!(
            err,
            ReportError::SchemaMismatch { ref missing, .. } if missing.is_empty()
        ));
        assert!(err.to_string().contains("expected [time, altitude_km, valid]"));
    }

    #[test]
    fn test_empty_input() {
        let schema = altitude_schema();
        let rules = rules();
        assert!(matches!(
            parse(&schema, &rules, "\n\n"),
            Err(ReportError::MissingHeader { .. })
        ));
    }

    #[test]
    fn test_contact_report_with_preamble_and_trailing_delimiter() {
        let profile = Profile::default();
        let raw = "\
Contact Analysis Report,
Scenario: demo,

Link,Rise,Set,Duration,
GS-1 - SAT-1,120.0,780.0,660.0,
GS-1 - SAT-1,6120.0,6700.5,580.5,
";
        let report = profile.parse_report("contact", raw).expect("header matches");
        assert!(report.is_clean());
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[1].get("Link").and_then(|v| v.as_str()), Some("GS-1 - SAT-1"));
        assert_eq!(report.records[1].get("Duration").and_then(|v| v.as_f64()), Some(580.5));
        assert_eq!(report.metadata.get("Scenario").map(String::as_str), Some("demo"));
        assert_eq!(report.start, None);
    }

    #[test]
    fn test_arity_errors() {
        let schema = altitude_schema();
        let rules = rules();
        let raw = "time,altitude_km,valid\n2024-001T00:00:00\n2024-001T00:00:00,1.0,true,extra\n,1.0,true\n";
        let report = parse(&schema, &rules, raw).expect("header matches").finish();
        let kinds: Vec<_> = report.errors.iter().map(|e| (e.row, e.kind.clone())).collect();
        assert_eq!(
            kinds,
            vec![
                (1, FieldErrorKind::MissingColumn),
                (2, FieldErrorKind::ExtraColumn),
                (3, FieldErrorKind::MissingValue),
            ]
        );
        assert_eq!(report.errors[0].field, "altitude_km");
    }

    #[test]
    fn test_units_rows_and_fixed_preamble() {
        let schema = ReportSchema::new(
            "distances",
            vec![
                FieldSpec::new("TIME_UNITS", FieldType::Float),
                FieldSpec::new("Distance A - B", FieldType::Float),
            ],
        )
        .with_preamble(Preamble::Lines(1))
        .with_units_rows(1);
        let rules = rules();
        let raw = "Distances\nTIME_UNITS,Distance A - B,\nsec,km,\n0.0,1000.5,\n60.0,1001.25,\n";
        let report = parse(&schema, &rules, raw).expect("header matches").finish();
        assert!(report.is_clean());
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].get("TIME_UNITS"), Some(&FieldValue::Float(0.0)));
    }

    #[test]
    fn test_quoted_cells_keep_delimiters_and_quotes() {
        let schema = ReportSchema::new(
            "links",
            vec![
                FieldSpec::new("Link", FieldType::Text),
                FieldSpec::new("Rise", FieldType::Float),
            ],
        );
        let rules = rules();
        let raw = "Link,Rise\n\"Madrid, ES - SAT-1\",1.0\n\"The \"\"Big\"\" Dish - SAT-2\",2.5\n";
        let report = parse(&schema, &rules, raw).expect("header matches").finish();
        assert!(report.is_clean());
        assert_eq!(
            report.records[0].get("Link").and_then(|v| v.as_str()),
            Some("Madrid, ES - SAT-1")
        );
        assert_eq!(
            report.records[1].get("Link").and_then(|v| v.as_str()),
            Some("The \"Big\" Dish - SAT-2")
        );
    }

    #[test]
    fn test_trailing_nullable_column_may_be_left_off() {
        let schema = altitude_schema();
        let rules = rules();
        let raw = "time,altitude_km,valid\n2024-001T00:00:00,550.2\n";
        let report = parse(&schema, &rules, raw).expect("header matches").finish();
        assert!(report.is_clean());
        assert_eq!(report.records[0].get("valid"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_renamed_first_column_is_schema_mismatch() {
        let profile = Profile::default();
        let raw = "Demo Contact Analysis,\nConnection,Rise,Set,Duration,\nGS-1 - SAT-1,1.0,2.0,1.0,\n";
        let err = profile.parse_report("contact", raw).expect_err("Should fail");
        match err {
            ReportError::SchemaMismatch { observed, missing, .. } => {
                assert_eq!(observed, vec!["Connection", "Rise", "Set", "Duration"]);
                assert_eq!(missing, vec!["Link"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dropped_first_column_is_schema_mismatch() {
        let schema = ReportSchema::new(
            "alt",
            vec![
                FieldSpec::new("time", FieldType::Timestamp),
                FieldSpec::new("alt", FieldType::Float),
            ],
        )
        .with_preamble(Preamble::UntilHeader);
        let rules = rules();
        let err = parse(&schema, &rules, "Altitude report\nalt\n550.2\n").expect_err("Should fail");
        match err {
            ReportError::SchemaMismatch { observed, missing, .. } => {
                assert_eq!(observed, vec!["alt"]);
                assert_eq!(missing, vec!["time"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_preamble_metadata_and_contact_labels() {
        let profile = Profile::default();
        let raw = "\
Demo Contact Analysis,
Start: 2020/07/07 00:00:00 UTC,Stop: 2020/07/08 00:00:00 UTC,

Link,Rise,Set,Duration,
Contact GS-1 sees SAT-1,120.0,780.0,660.0,
";
        let report = profile.parse_report("contact", raw).expect("header matches");
        assert!(report.is_clean());
        assert_eq!(
            report.records[0].get("Link").and_then(|v| v.as_str()),
            Some("GS-1 - SAT-1")
        );
        assert_eq!(
            report.metadata.get("Start").map(String::as_str),
            Some("2020/07/07 00:00:00 UTC")
        );
        let day = |d| {
            chrono::NaiveDate::from_ymd_opt(2020, 7, d)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .expect("valid date")
        };
        assert_eq!(report.start, Some(day(7)));
        assert_eq!(report.stop, Some(day(8)));
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("alt.csv");
        std::fs::write(&path, "time,altitude_km,valid\r\n2024/01/01 00:00:00,550.2,TRUE\r\n").expect("write");
        let report = parse_file(&altitude_schema(), &rules(), &path).expect("Should parse");
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].get("valid"), Some(&FieldValue::Bool(true)));

        let missing = parse_file(&altitude_schema(), &rules(), &dir.path().join("none.csv"));
        assert!(matches!(missing, Err(ReportError::Io { .. })));
    }
}
