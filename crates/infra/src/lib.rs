//! Infrastructure layer: stores, care data access, config and the billing
//! services built on them.

pub mod care_records;
pub mod clock;
pub mod config;
pub mod error;
pub mod invoice_store;
pub mod pg;
pub mod query;
pub mod services;


pub use care_records::{CareRecords, InMemoryCareRecords, PostgresCareRecords};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::BillingConfig;
pub use error::{BillingError, BillingResult, StoreError};
pub use invoice_store::{InMemoryInvoiceStore, InvoiceStore, InvoiceTx, PostgresInvoiceStore};
pub use pg::ensure_schema;
pub use query::{InvoiceFilter, Page, Pagination};
pub use services::{
    BatchInvoiceRun, BatchReport, CreditNoteIssuer, GeneratedInvoice, InvoiceAssembler,
    InvoiceNumberAllocator, InvoiceService, InvoiceTotals, PaymentOutcome, PaymentReconciler,
};
