//! Care data collaborator boundary.
//!
//! Contracts, periods, appointments and templates are owned by other parts of
//! the platform; billing only reads them through [`CareRecords`].

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryCareRecords;
pub use postgres::PostgresCareRecords;
pub use r#trait::{clip_to_window, CareRecords};
