//! Composition error types

use thiserror::Error;

use crate::template::TemplateError;

/// Errors that can occur while composing a scenario document.
///
/// Every variant except [`ComposeError::Render`] is raised during request
/// validation, before any template is rendered.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The request could not be read
    #[error("invalid scenario request: {0}")]
    Request(#[from] toml::de::Error),

    /// The base template does not exist
    #[error("base template not found: {template}")]
    UnknownBase { template: String },

    /// The named base template is a fragment
    #[error("template {template} is not a base template")]
    NotBase { template: String },

    /// The base template bindings do not fit the base template
    #[error("base template {template}: {source}")]
    Base {
        template: String,
        #[source]
        source: TemplateError,
    },

    /// An entry names a template that does not exist
    #[error("entry {index}: template not found: {template}")]
    UnknownTemplate { index: usize, template: String },

    /// An entry names a base template
    #[error("entry {index}: base template {template} cannot be added as an entry")]
    BaseAsEntry { index: usize, template: String },

    /// An entry's bindings do not fit its template
    #[error("entry {index} ({template}): {source}")]
    Entry {
        index: usize,
        template: String,
        #[source]
        source: TemplateError,
    },

    /// An entry's key placeholder does not hold exactly one name
    #[error("entry {index} ({template}): key placeholder '{placeholder}' must hold a single name")]
    InvalidKey {
        index: usize,
        template: String,
        placeholder: String,
    },

    /// Two entries of the same kind share a key
    #[error("entry {index}: duplicate {kind} '{key}'")]
    DuplicateKey { index: usize, kind: String, key: String },

    /// A section anchor names a section the base template does not have
    #[error("entry {index} ({template}): base template has no section '{section}'")]
    UnknownSection {
        index: usize,
        template: String,
        section: String,
    },

    /// A cross-reference names an entry that is not part of the request
    #[error("entry {index} ({template}): placeholder '{placeholder}' refers to unknown {kind} '{name}'")]
    UnknownReference {
        index: usize,
        template: String,
        placeholder: String,
        kind: String,
        name: String,
    },

    /// An entry is anchored after an entry that was never placed
    #[error("entry {index} ({template}): cannot place after {kind} '{key}', no such entry precedes it")]
    UnresolvedAnchor {
        index: usize,
        template: String,
        kind: String,
        key: String,
    },

    /// Rendering failed after validation passed
    #[error("entry {index} ({template}): {source}")]
    Render {
        index: usize,
        template: String,
        #[source]
        source: TemplateError,
    },
}
