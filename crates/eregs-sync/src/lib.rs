//! HTTP collaborators: the Federal Register API and the regulations API
//! that built documents are published to.

pub mod api_writer;
pub mod federal_register;

mod error;

pub use api_writer::ApiWriter;
pub use error::SyncError;
pub use federal_register::FederalRegisterClient;
