//! Storage for the eregs pipeline: stage checkpoints and output writers.

pub mod checkpoint;
pub mod writer;

mod error;

pub use checkpoint::{CheckpointKey, Checkpointer};
pub use error::StoreError;
pub use writer::{FsWriter, MemoryWriter, Writer};
