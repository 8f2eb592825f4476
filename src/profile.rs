//! Format profiles pinned to a version of the external application
//!
//! The character-level conventions the application expects (decimal
//! precision, timestamp layout, line endings) and the layout of the reports
//! it writes are not documented anywhere. They were recorded by hand for each
//! supported version and live here as static configuration.

use std::collections::HashSet;
use std::path::Path;

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use thiserror::Error;

use crate::report::{self, ParsedReport, ReportError, ReportSchema};

/// Errors that can occur when loading a profile
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read profile file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse profile TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid profile: {0}")]
    Invalid(String),
}

/// Line terminator written into scenario files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    Lf,
    Crlf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Application {
    pub name: String,
    pub version: String,
}

/// How placeholder values and documents are written
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FormatRules {
    pub float_precision: usize,
    pub timestamp_format: String,
    pub line_ending: LineEnding,
    pub trailing_newline: bool,
}

/// How report cells are read
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReportRules {
    pub delimiter: char,
    pub timestamp_formats: Vec<String>,
    pub true_tokens: Vec<String>,
    pub false_tokens: Vec<String>,
}

/// A complete format profile for one application version
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Profile {
    pub application: Application,
    pub format: FormatRules,
    pub report: ReportRules,
    #[serde(default)]
    reports: Vec<ReportSchema>,
}

/// Profile for SOAP 15.5
const DEFAULT_PROFILE: &str = r#"
[application]
name = "SOAP"
version = "15.5.0"

[format]
# The application writes doubles with 17 decimals on save
float_precision = 17
timestamp_format = "%Y %m %d %H %M %S"
line_ending = "lf"
trailing_newline = true

[report]
delimiter = ","
timestamp_formats = ["%Y-%jT%H:%M:%S", "%Y/%m/%d %H:%M:%S"]
true_tokens = ["true", "yes", "on", "1"]
false_tokens = ["false", "no", "off", "0"]

# Contact analysis (RISE_SET) report
[[reports]]
kind = "contact"
preamble = "until_header"
# Links are written as `Contact A sees B`
labels = [{ replace = " sees ", with = " - " }, { strip_prefix = "Contact " }]
fields = [
  { name = "Link", type = "text" },
  { name = "Rise", type = "float" },
  { name = "Set", type = "float" },
  { name = "Duration", type = "float" },
]

[[reports]]
kind = "altitude"
fields = [
  { name = "time", type = "timestamp" },
  { name = "altitude_km", type = "float" },
  { name = "valid", type = "bool", nullable = true },
]
"#;

impl Profile {
    /// Load a profile from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load a profile from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ProfileError> {
        let profile: Profile = toml::from_str(content)?;
        profile.validate()?;
        tracing::debug!(
            "Loaded profile for {} {} ({} report schemas)",
            profile.application.name,
            profile.application.version,
            profile.reports.len()
        );
        Ok(profile)
    }

    fn validate(&self) -> Result<(), ProfileError> {
        if has_invalid_items(&self.format.timestamp_format) {
            return Err(ProfileError::Invalid(format!(
                "bad timestamp format '{}'",
                self.format.timestamp_format
            )));
        }
        if self.report.timestamp_formats.is_empty() {
            return Err(ProfileError::Invalid(
                "report.timestamp_formats must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .report
            .timestamp_formats
            .iter()
            .find(|f| has_invalid_items(f))
        {
            return Err(ProfileError::Invalid(format!("bad timestamp format '{}'", bad)));
        }
        let delimiter = self.report.delimiter;
        if !delimiter.is_ascii() || delimiter.is_whitespace() || delimiter == '"' {
            return Err(ProfileError::Invalid(format!(
                "unusable report delimiter {:?}",
                self.report.delimiter
            )));
        }

        let mut kinds = HashSet::new();
        for schema in &self.reports {
            schema.validate().map_err(ProfileError::Invalid)?;
            if !kinds.insert(schema.kind.as_str()) {
                return Err(ProfileError::Invalid(format!(
                    "report kind '{}' is declared twice",
                    schema.kind
                )));
            }
        }
        Ok(())
    }

    /// Look up the pinned schema for a report kind
    pub fn report_schema(&self, kind: &str) -> Option<&ReportSchema> {
        self.reports.iter().find(|s| s.kind == kind)
    }

    /// Report kinds this profile knows about, in declaration order
    pub fn report_kinds(&self) -> impl Iterator<Item = &str> {
        self.reports.iter().map(|s| s.kind.as_str())
    }

    /// Parse a report of a pinned kind, collecting row errors
    pub fn parse_report(&self, kind: &str, raw: &str) -> Result<ParsedReport, ReportError> {
        let schema = self
            .report_schema(kind)
            .ok_or_else(|| ReportError::UnknownKind {
                kind: kind.to_string(),
            })?;
        Ok(report::parse(schema, &self.report, raw)?.finish())
    }
}

fn has_invalid_items(format: &str) -> bool {
    StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

impl Default for Profile {
    fn default() -> Self {
        Self::from_str(DEFAULT_PROFILE).expect("Default profile should be valid TOML")
    }
}
