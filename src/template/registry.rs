//! Template store: the library of document fragments

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use super::lexer::{self, Piece, Span};
use super::value::PlaceholderClass;
use crate::compose::AnchorRule;

/// Kind of the full-document template that fragments are merged into
pub const BASE_KIND: &str = "base";

/// Errors that can occur during template operations
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template not found in the store
    #[error("template not found: {name}")]
    NotFound { name: String },

    /// Duplicate template definition
    #[error("duplicate template definition: {name}")]
    Duplicate { name: String },

    /// A placeholder has no binding
    #[error("missing binding for placeholder '{placeholder}' in template {template}")]
    MissingBinding { template: String, placeholder: String },

    /// A bound value has the wrong type for its placeholder class
    #[error("type mismatch for placeholder '{placeholder}' in template {template}: expected {expected}, found {found}")]
    TypeMismatch {
        template: String,
        placeholder: String,
        expected: String,
        found: &'static str,
    },

    /// A bound value has the right type but cannot be written
    #[error("invalid value for placeholder '{placeholder}' in template {template}: {reason}")]
    InvalidValue {
        template: String,
        placeholder: String,
        reason: String,
    },

    /// Template text could not be tokenized
    #[error("malformed template {template}: stray brace at byte {offset}")]
    Malformed { template: String, offset: usize },

    /// Anchor point found where it is not allowed
    #[error("anchor point '{anchor}' in template {template}: {reason}")]
    AnchorPoint {
        template: String,
        anchor: String,
        reason: String,
    },

    /// Library manifest and template text disagree
    #[error("invalid declaration for template {template}: {reason}")]
    InvalidDeclaration { template: String, reason: String },

    /// Error reading a template file or manifest
    #[error("error reading template file {path}: {message}")]
    FileReadError { path: PathBuf, message: String },
}

impl TemplateError {
    fn declaration(template: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDeclaration {
            template: template.to_string(),
            reason: reason.into(),
        }
    }
}

/// An immutable fragment with named placeholders
#[derive(Debug, Clone)]
pub struct Template {
    /// Template identifier
    pub id: String,
    /// Kind of entry this template adds (`platform`, `report`, ...)
    pub kind: String,
    /// Placeholder whose value names the entry
    pub key: Option<String>,
    /// Where rendered blocks are inserted
    pub anchor: Option<AnchorRule>,
    /// Placeholder -> kind of entry it refers to
    pub references: BTreeMap<String, String>,
    /// Entries the base template already contains, by kind
    pub provides: BTreeMap<String, Vec<String>>,
    text: String,
    pieces: Vec<(Piece, Span)>,
    placeholders: Vec<String>,
    anchor_points: Vec<String>,
    classes: HashMap<String, PlaceholderClass>,
}

impl Template {
    /// Tokenize template text. All placeholders start out in the `text` class.
    pub fn parse(
        id: impl Into<String>,
        kind: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        let id = id.into();
        let text = text.into();
        let pieces = lexer::lex(&text).map_err(|offset| TemplateError::Malformed {
            template: id.clone(),
            offset,
        })?;

        let mut placeholders = Vec::new();
        let mut anchor_points = Vec::new();
        for (piece, _) in &pieces {
            match piece {
                Piece::Placeholder(name) if !placeholders.contains(name) => {
                    placeholders.push(name.clone());
                }
                Piece::AnchorPoint(name) => {
                    if anchor_points.contains(name) {
                        return Err(TemplateError::AnchorPoint {
                            template: id,
                            anchor: name.clone(),
                            reason: "declared twice".to_string(),
                        });
                    }
                    anchor_points.push(name.clone());
                }
                _ => {}
            }
        }

        Ok(Self {
            id,
            kind: kind.into(),
            key: None,
            anchor: None,
            references: BTreeMap::new(),
            provides: BTreeMap::new(),
            text,
            pieces,
            placeholders,
            anchor_points,
            classes: HashMap::new(),
        })
    }

    /// Declare the formatting class of a placeholder
    pub fn with_class(mut self, placeholder: impl Into<String>, class: PlaceholderClass) -> Self {
        self.classes.insert(placeholder.into(), class);
        self
    }

    /// Declare the placeholder that names the entry
    pub fn with_key(mut self, placeholder: impl Into<String>) -> Self {
        self.key = Some(placeholder.into());
        self
    }

    /// Set the anchor rule
    pub fn with_anchor(mut self, anchor: AnchorRule) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Declare that a placeholder refers to an entry of another kind
    pub fn with_reference(
        mut self,
        placeholder: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        self.references.insert(placeholder.into(), kind.into());
        self
    }

    /// Declare entries already contained in a base template
    pub fn with_provides<I, S>(mut self, kind: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides
            .entry(kind.into())
            .or_default()
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Raw template text
    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn pieces(&self) -> &[(Piece, Span)] {
        &self.pieces
    }

    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Anchor point names in document order
    pub fn anchor_points(&self) -> &[String] {
        &self.anchor_points
    }

    /// Declared class of a placeholder
    pub fn class_of(&self, placeholder: &str) -> &PlaceholderClass {
        self.classes.get(placeholder).unwrap_or(&PlaceholderClass::Text)
    }

    pub fn is_base(&self) -> bool {
        self.kind == BASE_KIND
    }

    pub fn has_placeholder(&self, name: &str) -> bool {
        self.placeholders.iter().any(|p| p == name)
    }

    /// Check the declarations against the template text
    pub fn validate(&self) -> Result<(), TemplateError> {
        let id = self.id.as_str();
        let mut declared: Vec<&String> = self.classes.keys().collect();
        declared.sort();
        for name in declared {
            if !self.has_placeholder(name) {
                return Err(TemplateError::declaration(
                    id,
                    format!("class declared for unknown placeholder '{}'", name),
                ));
            }
        }
        for name in self.references.keys().chain(self.key.iter()) {
            if !self.has_placeholder(name) {
                return Err(TemplateError::declaration(
                    id,
                    format!("unknown placeholder '{}'", name),
                ));
            }
        }

        if self.is_base() {
            if self.anchor_points.is_empty() {
                return Err(TemplateError::declaration(id, "base template has no anchor points"));
            }
            if self.anchor.is_some() {
                return Err(TemplateError::declaration(
                    id,
                    "base template cannot have an anchor rule",
                ));
            }
            return Ok(());
        }

        if let Some(anchor) = self.anchor_points.first() {
            return Err(TemplateError::AnchorPoint {
                template: self.id.clone(),
                anchor: anchor.clone(),
                reason: "only base templates may declare anchor points".to_string(),
            });
        }
        if !self.provides.is_empty() {
            return Err(TemplateError::declaration(id, "only base templates may provide entries"));
        }
        match &self.anchor {
            None => Err(TemplateError::declaration(id, "fragment has no anchor rule")),
            Some(AnchorRule::After(placeholder)) if !self.references.contains_key(placeholder) => {
                Err(TemplateError::declaration(
                    id,
                    format!("anchor placeholder '{}' is not a reference", placeholder),
                ))
            }
            Some(_) => Ok(()),
        }
    }
}

/// Manifest file describing a template library
#[derive(Deserialize)]
struct Manifest {
    templates: Vec<ManifestEntry>,
}

#[derive(Deserialize)]
struct ManifestEntry {
    id: String,
    file: String,
    kind: String,
    key: Option<String>,
    anchor: Option<AnchorRule>,
    #[serde(default)]
    references: BTreeMap<String, String>,
    #[serde(default)]
    provides: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    placeholders: BTreeMap<String, ClassDecl>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassDecl {
    Name(String),
    Detailed {
        class: String,
        #[serde(default)]
        allowed: Vec<String>,
    },
}

/// Name of the manifest inside a template library directory
pub const MANIFEST_FILE: &str = "library.toml";

const BUILTIN_MANIFEST: &str = include_str!("../../templates/library.toml");

const BUILTIN_FILES: &[(&str, &str)] = &[
    ("base.orb", include_str!("../../templates/base.orb")),
    ("body.orb", include_str!("../../templates/body.orb")),
    ("platform_norad.orb", include_str!("../../templates/platform_norad.orb")),
    ("platform_custom.orb", include_str!("../../templates/platform_custom.orb")),
    ("platform_ground.orb", include_str!("../../templates/platform_ground.orb")),
    ("transmitter.orb", include_str!("../../templates/transmitter.orb")),
    ("link.orb", include_str!("../../templates/link.orb")),
    ("receiver.orb", include_str!("../../templates/receiver.orb")),
    ("analysis_variable.orb", include_str!("../../templates/analysis_variable.orb")),
    ("observer_view.orb", include_str!("../../templates/observer_view.orb")),
    ("analysis_report.orb", include_str!("../../templates/analysis_report.orb")),
];

/// Read-only library of templates, loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: HashMap<String, Template>,
}

impl TemplateStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// The library compiled into the crate
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::from_manifest(BUILTIN_MANIFEST, Path::new(MANIFEST_FILE), |file| {
            BUILTIN_FILES
                .iter()
                .find(|(name, _)| *name == file)
                .map(|(_, text)| text.to_string())
                .ok_or_else(|| TemplateError::FileReadError {
                    path: PathBuf::from(file),
                    message: "not part of the built-in library".to_string(),
                })
        })
    }

    /// Load a library from a directory containing a `library.toml` manifest
    pub fn from_dir(dir: &Path) -> Result<Self, TemplateError> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = read_file(&manifest_path)?;
        Self::from_manifest(&manifest, &manifest_path, |file| read_file(&dir.join(file)))
    }

    fn from_manifest(
        manifest: &str,
        manifest_path: &Path,
        mut load: impl FnMut(&str) -> Result<String, TemplateError>,
    ) -> Result<Self, TemplateError> {
        let manifest: Manifest =
            toml::from_str(manifest).map_err(|e| TemplateError::FileReadError {
                path: manifest_path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut store = Self::new();
        for entry in manifest.templates {
            let text = load(&entry.file)?;
            let mut template = Template::parse(&entry.id, &entry.kind, text)?;
            template.key = entry.key;
            template.anchor = entry.anchor;
            template.references = entry.references;
            template.provides = entry.provides;
            for (placeholder, decl) in entry.placeholders {
                let (name, allowed) = match decl {
                    ClassDecl::Name(name) => (name, Vec::new()),
                    ClassDecl::Detailed { class, allowed } => (class, allowed),
                };
                let class = PlaceholderClass::from_name(&name, allowed).ok_or_else(|| {
                    TemplateError::declaration(
                        &entry.id,
                        format!("unknown class '{}' for placeholder '{}'", name, placeholder),
                    )
                })?;
                template.classes.insert(placeholder, class);
            }
            store.register(template)?;
        }

        tracing::debug!(
            "Loaded {} templates from {}",
            store.templates.len(),
            manifest_path.display()
        );
        Ok(store)
    }

    /// Validate and add a template
    pub fn register(&mut self, template: Template) -> Result<(), TemplateError> {
        if self.templates.contains_key(&template.id) {
            return Err(TemplateError::Duplicate { name: template.id });
        }
        template.validate()?;
        self.templates.insert(template.id.clone(), template);
        Ok(())
    }

    /// Get a template by id
    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.get(id)
    }

    /// Get a template by id, failing if absent
    pub fn require(&self, id: &str) -> Result<&Template, TemplateError> {
        self.get(id).ok_or_else(|| TemplateError::NotFound {
            name: id.to_string(),
        })
    }

    /// Check if a template exists
    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    /// All template ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.templates.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

fn read_file(path: &Path) -> Result<String, TemplateError> {
    std::fs::read_to_string(path).map_err(|e| TemplateError::FileReadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
