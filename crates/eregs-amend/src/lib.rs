//! Versioning for regulation trees: compile a notice's amendments into the
//! next tree, and diff any two trees.

pub mod compiler;
pub mod content;
pub mod diff;
pub mod labels;
pub mod tree;

mod error;

pub use compiler::compile;
pub use content::build_changes;
pub use diff::{Change, Diff, changes_between};
pub use error::AmendError;
pub use labels::{bad_label, find_candidate};
pub use tree::RegulationTree;
