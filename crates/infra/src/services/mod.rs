//! Billing services: the operations exposed to callers.
//!
//! Each writing operation runs in exactly one `InvoiceTx`; a failure before
//! commit leaves the store untouched.

pub mod assembler;
pub mod batch;
pub mod credit;
pub mod invoices;
pub mod numbering;
pub mod payments;

pub use assembler::{GeneratedInvoice, InvoiceAssembler};
pub use batch::{BatchInvoiceRun, BatchReport};
pub use credit::CreditNoteIssuer;
pub use invoices::{InvoiceService, InvoiceTotals};
pub use numbering::InvoiceNumberAllocator;
pub use payments::{PaymentOutcome, PaymentReconciler};
