use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use carebill_billing::{
    AuditEntry, Invoice, InvoiceNumber, InvoiceStatus, NewInvoice, NewPayment,
    Payment,
};
use carebill_core::{EmployeeId, InvoiceId};

use crate::error::StoreError;
use crate::query::{InvoiceFilter, Page, Pagination};

/// Invoice and payment persistence.
///
/// Reads go straight to the store. Writes only happen inside an
/// [`InvoiceTx`] opened with [`InvoiceStore::begin`], which binds the acting
/// employee for the lifetime of that transaction.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Open a unit of work attributed to `actor`.
    async fn begin(&self, actor: EmployeeId) -> Result<Box<dyn InvoiceTx>, StoreError>;

    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError>;

    async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
        page: Pagination,
    ) -> Result<Page<Invoice>, StoreError>;

    /// Sum of `completed` payments; zero when there are none.
    async fn completed_payment_sum(&self, id: InvoiceId) -> Result<Decimal, StoreError>;

    /// Payments of an invoice, newest first.
    async fn list_payments(&self, id: InvoiceId) -> Result<Vec<Payment>, StoreError>;

    /// Audit trail of an invoice, newest first.
    async fn audit_logs(&self, id: InvoiceId) -> Result<Vec<AuditEntry>, StoreError>;

    async fn count_with_status(&self, status: InvoiceStatus) -> Result<u64, StoreError>;

    /// Sum of `total_amount` over invoices that still expect payment.
    async fn open_amount(&self) -> Result<Decimal, StoreError>;
}

/// One atomic unit of work.
///
/// Dropping a transaction without calling [`InvoiceTx::commit`] discards all
/// of its writes. Every write appends an audit entry attributed to
/// [`InvoiceTx::actor`] within the same transaction.
#[async_trait]
pub trait InvoiceTx: Send {
    fn actor(&self) -> EmployeeId;

    /// Highest sequence already used on `date`, `0` if none. Serializes
    /// concurrent allocators for that date until this transaction ends.
    async fn max_sequence_for_date(&mut self, date: NaiveDate) -> Result<i32, StoreError>;

    async fn insert_invoice(
        &mut self,
        number: &InvoiceNumber,
        invoice: &NewInvoice,
    ) -> Result<Invoice, StoreError>;

    /// Read an invoice and hold it against concurrent writers.
    async fn get_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, StoreError>;

    /// Persist an edited invoice previously read as `before`.
    async fn save_invoice(&mut self, before: &Invoice, after: &Invoice) -> Result<(), StoreError>;

    async fn update_status(
        &mut self,
        id: InvoiceId,
        status: InvoiceStatus,
    ) -> Result<Invoice, StoreError>;

    /// Remove an invoice together with its payments.
    async fn delete_invoice(&mut self, id: InvoiceId) -> Result<(), StoreError>;

    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<Payment, StoreError>;

    async fn completed_payment_sum(&mut self, id: InvoiceId) -> Result<Decimal, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> InvoiceStore for Arc<S>
where
    S: InvoiceStore + ?Sized,
{
    async fn begin(&self, actor: EmployeeId) -> Result<Box<dyn InvoiceTx>, StoreError> {
        (**self).begin(actor).await
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        (**self).get_invoice(id).await
    }

    async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
        page: Pagination,
    ) -> Result<Page<Invoice>, StoreError> {
        (**self).list_invoices(filter, page).await
    }

    async fn completed_payment_sum(&self, id: InvoiceId) -> Result<Decimal, StoreError> {
        (**self).completed_payment_sum(id).await
    }

    async fn list_payments(&self, id: InvoiceId) -> Result<Vec<Payment>, StoreError> {
        (**self).list_payments(id).await
    }

    async fn audit_logs(&self, id: InvoiceId) -> Result<Vec<AuditEntry>, StoreError> {
        (**self).audit_logs(id).await
    }

    async fn count_with_status(&self, status: InvoiceStatus) -> Result<u64, StoreError> {
        (**self).count_with_status(status).await
    }

    async fn open_amount(&self) -> Result<Decimal, StoreError> {
        (**self).open_amount().await
    }
}

/// Statuses whose invoices count toward the open amount.
pub const OPEN_STATUSES: &[InvoiceStatus] = &[
    InvoiceStatus::Outstanding,
    InvoiceStatus::PartiallyPaid,
    InvoiceStatus::Expired,
];
