//! Regulation model shared by every stage of the pipeline: the node tree,
//! citation labels and grammar, paragraph depth inference, and settings.

pub mod citations;
pub mod depth;
pub mod frozen;
pub mod label;
pub mod markers;
pub mod node;
pub mod settings;
pub mod sort_key;

mod error;

pub use citations::{ParagraphCitation, external_citations, internal_citations};
pub use depth::{MarkerToken, Solution};
pub use error::CoreError;
pub use frozen::FrozenNode;
pub use label::Label;
pub use markers::MarkerType;
pub use node::{INTERP, Node, NodeType, SUBPART};
pub use settings::Settings;
pub use sort_key::normalize_segment;
