//! Fragment templates for scenario files
//!
//! A template is a piece of `.orb` text with named placeholders. Fragment
//! templates produce one definition block each; the single base template
//! holds the fixed parts of a scenario and marks with anchor points where
//! the fragments go.
//!
//! # Syntax
//!
//! ```text
//! DEFINE PLATFORM ECR_FIXED "{object_name}"     placeholder
//! {@platforms}                                  anchor point (base only)
//! {{ and }}                                     literal braces
//! ```
//!
//! Each placeholder belongs to a formatting class declared in the library
//! manifest. Floats, timestamps and switches are written in the layout the
//! active [`Profile`](crate::Profile) pins.

mod lexer;
mod registry;
mod render;
mod value;

use std::collections::BTreeMap;

pub use registry::{Template, TemplateError, TemplateStore, BASE_KIND, MANIFEST_FILE};
pub use render::{check_bindings, render, render_skeleton, Segment};
pub use value::{PlaceholderClass, Value, REQUEST_TIMESTAMP_FORMATS};

/// Placeholder name -> bound value
pub type Bindings = BTreeMap<String, Value>;
