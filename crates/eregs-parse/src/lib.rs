//! Parsers that turn regulation sources into [`eregs_core::Node`] trees.
//!
//! - [`text`]: plain-text regulations carved by landmark search.
//! - [`xml`]: eCFR and Federal Register XML, including tables, appendices,
//!   the interpretations supplement, and preprocessing macros.
//! - [`notice`]: rule documents, their front matter, and the amendments
//!   their amendatory paragraphs describe.

pub mod notice;
pub mod text;
pub mod xml;

mod error;

pub use error::ParseError;
pub use notice::amdpar::{Action, Amendment, Field, parse_amdpar};
pub use notice::{ChangeMap, ChangeRecord, Notice, apply_delays};
pub use text::parse_regulation_text;
pub use xml::macros::apply_macros;
pub use xml::{parse_regulation_xml, parse_section};
