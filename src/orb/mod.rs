//! Reader for generated scenario files
//!
//! A scenario file is a sequence of settings lines followed by blocks of the
//! form:
//!
//! ```text
//! DEFINE PLATFORM ECR_FIXED "DSN:Madrid"
//!     STATE 40.4294056 -4.2488472 0.0
//!     CENTRAL_BODY "Earth"
//! ```
//!
//! Each line is a list of bare words and quoted strings. The reader keeps
//! source spans so errors can point at the offending text.

pub mod ast;
mod grammar;
pub mod lexer;
mod platforms;

pub use ast::{Atom, Definition, Line, OrbFile, Spanned};
pub use grammar::parse;
pub use platforms::read_platforms;
