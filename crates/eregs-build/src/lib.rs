//! Builds a regulation's history: every version from a baseline notice
//! onward, the layers for each version, and diffs between them.

pub mod builder;
pub mod notices;
pub mod order;
pub mod registries;
pub mod source;
pub mod watch;

mod error;

pub use builder::{BuildOptions, BuildSummary, Builder, Version, parse_regulation};
pub use error::BuildError;
pub use notices::{PreparedNotice, prepare_notices};
pub use order::{Plan, VersionGroup, notice_order, plan};
pub use registries::Registries;
pub use source::NoticeSource;
pub use watch::{Sighting, watch_node};
