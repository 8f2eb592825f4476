//! Report schemas and the report parser
//!
//! After a batch run the application writes tabular reports whose layout is
//! undocumented and may change between versions. Each report kind has a
//! pinned [`ReportSchema`]; a header that disagrees with it is a hard
//! [`ReportError::SchemaMismatch`], while rows that fail to coerce are
//! collected as [`FieldParseError`]s next to the records that did.

mod parser;
mod schema;
mod value;

pub use parser::{
    parse, parse_file, FieldErrorKind, FieldParseError, ParsedReport, ReportError, ReportReader,
};
pub use schema::{FieldSpec, FieldType, LabelRule, Preamble, ReportSchema};
pub use value::{FieldValue, ReportRecord};
