//! Report schemas: the pinned column layout of each report kind

use std::fmt;

use serde::Deserialize;

/// Semantic type of a report column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Bool,
    Timestamp,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::Timestamp => "timestamp",
        };
        write!(f, "{}", name)
    }
}

/// One declared column
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    #[serde(default)]
    pub nullable: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Lines the application writes before the header row
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preamble {
    /// The first line is the header
    #[default]
    None,
    /// Skip a fixed number of lines
    Lines(usize),
    /// Skip until a line whose first cell is the first field name
    UntilHeader,
}

/// Rewrites applied to header names and text cells before they are compared
/// or returned. The application words the same label differently between
/// report kinds (`A sees B`, `Dist A to B`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LabelRule {
    /// Replace every occurrence of `replace` with `with`
    Replace { replace: String, with: String },
    /// Remove a leading `strip_prefix`
    StripPrefix { strip_prefix: String },
}

impl LabelRule {
    pub fn replace(from: impl Into<String>, to: impl Into<String>) -> Self {
        LabelRule::Replace {
            replace: from.into(),
            with: to.into(),
        }
    }

    pub fn strip_prefix(prefix: impl Into<String>) -> Self {
        LabelRule::StripPrefix {
            strip_prefix: prefix.into(),
        }
    }

    fn apply(&self, label: String) -> String {
        match self {
            LabelRule::Replace { replace, with } if !replace.is_empty() => {
                label.replace(replace.as_str(), with)
            }
            LabelRule::Replace { .. } => label,
            LabelRule::StripPrefix { strip_prefix } => {
                match label.strip_prefix(strip_prefix.as_str()) {
                    Some(rest) => rest.to_string(),
                    None => label,
                }
            }
        }
    }
}

/// Expected layout of one report kind
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReportSchema {
    pub kind: String,
    #[serde(default)]
    pub preamble: Preamble,
    /// Rows between the header and the first data row (units, separators)
    #[serde(default)]
    pub units_rows: usize,
    /// Applied in order to header names and text cells
    #[serde(default)]
    pub labels: Vec<LabelRule>,
    pub fields: Vec<FieldSpec>,
}

impl ReportSchema {
    pub fn new(kind: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            kind: kind.into(),
            preamble: Preamble::None,
            units_rows: 0,
            labels: Vec::new(),
            fields,
        }
    }

    pub fn with_label_rule(mut self, rule: LabelRule) -> Self {
        self.labels.push(rule);
        self
    }

    /// Rewrite a header name or text cell with the schema's label rules
    pub fn normalize_label(&self, label: &str) -> String {
        self.labels
            .iter()
            .fold(label.to_string(), |label, rule| rule.apply(label))
    }

    pub fn with_preamble(mut self, preamble: Preamble) -> Self {
        self.preamble = preamble;
        self
    }

    pub fn with_units_rows(mut self, rows: usize) -> Self {
        self.units_rows = rows;
        self
    }

    /// Column names in declared order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Check the schema is usable: at least one field and no repeated names
    pub fn validate(&self) -> Result<(), String> {
        if self.fields.is_empty() {
            return Err(format!("report schema '{}' declares no fields", self.kind));
        }
        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(format!(
                    "report schema '{}' declares field '{}' twice",
                    self.kind, field.name
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_schema() {
        let schema: ReportSchema = toml::from_str(
            r#"
kind = "altitude"
preamble = { lines = 2 }
fields = [
  { name = "time", type = "timestamp" },
  { name = "valid", type = "bool", nullable = true },
]
"#,
        )
        .expect("Should parse");
        assert_eq!(schema.preamble, Preamble::Lines(2));
        assert_eq!(schema.units_rows, 0);
        assert_eq!(schema.field_names(), vec!["time", "valid"]);
        assert!(schema.fields[1].nullable);
        assert!(!schema.fields[0].nullable);
    }

    #[test]
    fn test_until_header_preamble() {
        let schema: ReportSchema = toml::from_str(
            r#"
kind = "contact"
preamble = "until_header"
fields = [{ name = "Link", type = "text" }]
"#,
        )
        .expect("Should parse");
        assert_eq!(schema.preamble, Preamble::UntilHeader);
    }

    #[test]
    fn test_label_rules() {
        let schema: ReportSchema = toml::from_str(
            r#"
kind = "contact"
labels = [
  { replace = " sees ", with = " - " },
  { strip_prefix = "Contact " },
]
fields = [{ name = "Link", type = "text" }]
"#,
        )
        .expect("Should parse");
        assert_eq!(
            schema.labels,
            vec![LabelRule::replace(" sees ", " - "), LabelRule::strip_prefix("Contact ")]
        );
        assert_eq!(schema.normalize_label("Contact GS-1 sees SAT-1"), "GS-1 - SAT-1");
        assert_eq!(schema.normalize_label("Link"), "Link");
    }

    #[test]
    fn test_validate_rejects_duplicate_fields() {
        let schema = ReportSchema::new(
            "dup",
            vec![
                FieldSpec::new("a", FieldType::Float),
                FieldSpec::new("a", FieldType::Text),
            ],
        );
        assert!(schema.validate().is_err());
        assert!(ReportSchema::new("empty", vec![]).validate().is_err());
    }
}
