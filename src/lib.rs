//! SOAP Orb - scenario file generation and report reading for SOAP
//!
//! This library composes SOAP scenario files (`.orb`) from a library of
//! known-valid fragments, writes them to disk, and reads back the tabular
//! reports the application produces when run in batch mode.
//!
//! # Example
//!
//! ```rust
//! use soap_orb::{build, EntryRequest, ScenarioRequest, Value};
//!
//! let request = ScenarioRequest::new("base")
//!     .with_binding("batchmode", true)
//!     .with_binding("warnings", false)
//!     .with_binding("epoch", Value::timestamp("2024-01-01T00:00:00").unwrap())
//!     .with_entry(
//!         EntryRequest::new("platform_ground")
//!             .with("object_name", "DSN:Madrid")
//!             .with("latitude", 40.4294056)
//!             .with("longitude", -4.2488472)
//!             .with("altitude", 0.0)
//!             .with("body", "Earth"),
//!     );
//!
//! let document = build(&request).unwrap();
//! assert!(document.to_text().contains("DEFINE PLATFORM ECR_FIXED \"DSN:Madrid\""));
//! ```

pub mod compose;
pub mod error;
pub mod orb;
pub mod profile;
pub mod report;
pub mod scenario;
pub mod template;
pub mod writer;

pub use compose::{
    AnchorRule, Block, ComposeError, ComposedDocument, Composer, EntryRequest, Placement,
    ScenarioRequest,
};
pub use error::ParseError;
pub use orb::read_platforms;
pub use profile::{Profile, ProfileError};
pub use report::{FieldParseError, ParsedReport, ReportError, ReportRecord, ReportSchema};
pub use scenario::{GroundStation, KeplerPlatform, NoradPlatform, Platform, ScenarioBuilder};
pub use template::{TemplateError, TemplateStore, Value};
pub use writer::{DocumentWriter, WriteError};

use std::path::Path;

use thiserror::Error;

/// Errors that can occur while building a scenario file
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("composition error: {0}")]
    Compose(#[from] ComposeError),

    #[error("write error: {0}")]
    Write(#[from] WriteError),

    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),
}

/// Configuration for the build pipeline
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Formatting and report rules for the target application version
    pub profile: Profile,
    /// Fragment library
    pub store: TemplateStore,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            store: TemplateStore::builtin().expect("Built-in template library should be valid"),
        }
    }
}

impl BuildConfig {
    /// Create a new configuration with the built-in profile and library
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the profile and fragment library from disk, falling back to the
    /// built-in ones for whichever path is not given
    pub fn load(profile: Option<&Path>, templates: Option<&Path>) -> Result<Self, BuildError> {
        let profile = match profile {
            Some(path) => Profile::from_file(path)?,
            None => Profile::default(),
        };
        let store = match templates {
            Some(dir) => TemplateStore::from_dir(dir)?,
            None => TemplateStore::builtin()?,
        };
        tracing::debug!(
            "Build configuration: {} {}, {} templates",
            profile.application.name,
            profile.application.version,
            store.ids().len()
        );
        Ok(Self { profile, store })
    }

    /// Set the format profile
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Set the fragment library
    pub fn with_store(mut self, store: TemplateStore) -> Self {
        self.store = store;
        self
    }
}

/// Compose a scenario file with the built-in profile and library
pub fn build(request: &ScenarioRequest) -> Result<ComposedDocument, BuildError> {
    build_with_config(request, &BuildConfig::default())
}

/// Compose a scenario file with a custom configuration
///
/// # Example
///
/// ```rust
/// use soap_orb::{build_with_config, BuildConfig, Profile, ScenarioRequest, Value};
///
/// let config = BuildConfig::new().with_profile(Profile::default());
/// let request = ScenarioRequest::new("base")
///     .with_binding("batchmode", true)
///     .with_binding("warnings", false)
///     .with_binding("epoch", Value::timestamp("2024-01-01T00:00:00").unwrap());
///
/// let document = build_with_config(&request, &config).unwrap();
/// assert!(document.to_text().starts_with("BATCH_MODE ON"));
/// ```
pub fn build_with_config(
    request: &ScenarioRequest,
    config: &BuildConfig,
) -> Result<ComposedDocument, BuildError> {
    let composer = Composer::new(&config.store, &config.profile.format);
    Ok(composer.compose(request)?)
}

/// Compose a scenario file and write it to `destination`
pub fn write_scenario(
    request: &ScenarioRequest,
    config: &BuildConfig,
    destination: &Path,
) -> Result<ComposedDocument, BuildError> {
    let document = build_with_config(request, config)?;
    DocumentWriter::new(&config.profile.format).write(&document, destination)?;
    Ok(document)
}
