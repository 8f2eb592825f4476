//! Document writer
//!
//! Scenario files are written next to their destination under a temporary
//! name and moved into place once complete, so a failed write never leaves
//! a truncated file behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::compose::ComposedDocument;
use crate::profile::{FormatRules, LineEnding};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes composed documents in the application's textual conventions
#[derive(Debug, Clone)]
pub struct DocumentWriter {
    line_ending: LineEnding,
    trailing_newline: bool,
}

impl DocumentWriter {
    pub fn new(rules: &FormatRules) -> Self {
        Self {
            line_ending: rules.line_ending,
            trailing_newline: rules.trailing_newline,
        }
    }

    /// Encode a document as the bytes that go to disk.
    ///
    /// Only line endings change; whitespace is otherwise left untouched.
    pub fn encode(&self, document: &ComposedDocument) -> String {
        let mut text = document.to_text();
        if self.trailing_newline && !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        let ending = self.line_ending.as_str();
        let mut out = String::with_capacity(text.len() + text.len() / 16);
        for line in text.split_inclusive('\n') {
            match line.strip_suffix('\n') {
                Some(body) => {
                    out.push_str(body.strip_suffix('\r').unwrap_or(body));
                    out.push_str(ending);
                }
                None => out.push_str(line),
            }
        }
        out
    }

    /// Write a document to `destination`, replacing any existing file
    pub fn write(&self, document: &ComposedDocument, destination: &Path) -> Result<(), WriteError> {
        let io_err = |source: std::io::Error| WriteError::Io {
            path: destination.to_path_buf(),
            source,
        };
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let bytes = self.encode(document);
        let mut file = NamedTempFile::new_in(dir).map_err(io_err)?;
        file.write_all(bytes.as_bytes()).map_err(io_err)?;
        file.as_file().sync_all().map_err(io_err)?;
        file.persist(destination).map_err(|e| io_err(e.error))?;

        tracing::info!("Wrote {} bytes to {}", bytes.len(), destination.display());
        Ok(())
    }
}
