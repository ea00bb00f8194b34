//! Invoice persistence boundary.
//!
//! The store owns invoice numbering state, payments and the audit trail.
//! Write paths take an actor explicitly; there is no ambient session state.

pub(crate) mod audit;
pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryInvoiceStore;
pub use postgres::PostgresInvoiceStore;
pub use r#trait::{InvoiceStore, InvoiceTx, OPEN_STATUSES};
