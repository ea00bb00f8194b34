//! Billing domain for care contracts.
//!
//! This crate contains the pricing, assembly, numbering, reconciliation and
//! crediting rules as deterministic domain logic (no IO, no storage).

pub mod assembly;
pub mod care;
pub mod credit;
pub mod document;
pub mod invoice;
pub mod numbering;
pub mod pricing;
pub mod status;
pub mod template;

pub use assembly::{assemble, Assembly, ContractInput, PeriodInput};
pub use care::{
    total_minutes, Appointment, BillablePeriod, CareType, ClientDetails, Contract, PriceTimeUnit,
    Sender,
};
pub use credit::{credit_note_lines, ensure_creditable};
pub use document::{
    decode_details, details_total, encode_details, validate_details, verify_total_amount,
    InvoiceDetailLine, InvoicePeriod, DETAILS_SCHEMA_VERSION,
};
pub use invoice::{
    AuditEntry, AuditOperation, ExtraContent, Invoice, InvoiceAmounts, InvoiceUpdate, InvoiceView,
    NewInvoice, NewPayment, Payment,
};
pub use numbering::{format_invoice_number, InvoiceNumber};
pub use pricing::{
    calculator_for, price_period, AccommodationCalculator, AmbulanteCalculator, PeriodCalculator,
    PeriodMeasure, PeriodUsage, PriceTerms, PricedPeriod,
};
pub use status::{
    determine_invoice_status, payment_completion_percentage, reconcile_status, InvoiceStatus,
    InvoiceType, PaymentMethod, PaymentStatus, PAYMENT_TOLERANCE,
};
pub use template::{render_template_items, TemplateItem, TemplateSource};
