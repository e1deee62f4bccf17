//! Citation grammar.
//!
//! Text is tokenized once by a chumsky lexer that keeps spans. The phrase
//! grammar in [`internal`] is a second set of chumsky parsers over those
//! tokens; its output is resolved against the context into [`Label`]s.
//! External citations are plain regular expressions.
//!
//! [`Label`]: crate::Label

mod lexer;

pub mod external;
pub mod internal;
pub mod interp;

pub use external::{ActCitation, CitationType, ExternalCitation, external_citations};
pub use internal::{ParagraphCitation, expand_through, internal_citations, remove_contained};
pub use interp::interp_header_labels;

/// Convert a byte offset into `text` to a character offset.
pub fn char_offset(text: &str, byte: usize) -> usize {
    text.get(..byte)
        .map_or_else(|| text.chars().count(), |prefix| prefix.chars().count())
}
