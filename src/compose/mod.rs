//! Fragment composition
//!
//! A [`ScenarioRequest`] names a base template and the entries to add. The
//! [`Composer`] validates the request as a whole, renders every entry and
//! places each block according to its template's [`AnchorRule`]:
//!
//! - `section`: appended to a named anchor point of the base template, in
//!   request order;
//! - `after`: directly after the full extent of another entry, including
//!   whatever was already placed after it.
//!
//! Sections are then emitted in the order the base template lists them.

mod anchor;
mod composer;
mod error;
mod request;

pub use anchor::{AnchorRule, Placement};
pub use composer::{compose, Block, ComposedDocument, Composer};
pub use error::ComposeError;
pub use request::{EntryRequest, ScenarioRequest};
