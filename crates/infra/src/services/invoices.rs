//! Manual invoice operations and read queries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use carebill_billing::{
    reconcile_status, AuditEntry, Invoice, InvoiceStatus, InvoiceUpdate, InvoiceView, NewInvoice,
    Payment,
};
use carebill_core::{EmployeeId, InvoiceId};

use super::numbering::InvoiceNumberAllocator;
use crate::clock::Clock;
use crate::error::{BillingError, BillingResult};
use crate::invoice_store::InvoiceStore;
use crate::query::{InvoiceFilter, Page, Pagination};

/// Aggregate figures for the billing dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub outstanding: u64,
    pub partially_paid: u64,
    pub paid: u64,
    pub overpaid: u64,
    /// Sum of totals of invoices still expecting payment.
    pub open_amount: Decimal,
}

pub struct InvoiceService<S, C> {
    store: S,
    clock: C,
    numbers: InvoiceNumberAllocator,
}

impl<S, C> InvoiceService<S, C>
where
    S: InvoiceStore,
    C: Clock,
{
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            numbers: InvoiceNumberAllocator,
        }
    }

    /// Persist a manually entered invoice under a newly allocated number.
    #[instrument(skip(self, invoice), fields(client_id = %invoice.client_id, actor = %actor), err)]
    pub async fn create_invoice(
        &self,
        invoice: NewInvoice,
        actor: EmployeeId,
    ) -> BillingResult<Invoice> {
        invoice.validate()?;

        let mut tx = self.store.begin(actor).await?;
        let number = self.numbers.allocate(&mut *tx, self.clock.today()).await?;
        let stored = tx.insert_invoice(&number, &invoice).await?;
        tx.commit().await?;

        tracing::info!(invoice_id = %stored.id, invoice_number = %stored.invoice_number, "invoice created");
        Ok(stored)
    }

    /// Edit dates, amounts or extra content of an invoice.
    ///
    /// When the amounts change on an invoice whose status follows its
    /// payments, the status is re-derived in the same transaction.
    #[instrument(skip(self, update), fields(invoice_id = %id, actor = %actor), err)]
    pub async fn update_invoice(
        &self,
        id: InvoiceId,
        update: InvoiceUpdate,
        actor: EmployeeId,
    ) -> BillingResult<Invoice> {
        update.validate()?;

        let mut tx = self.store.begin(actor).await?;
        let before = tx
            .get_invoice(id)
            .await?
            .ok_or(BillingError::InvoiceNotFound(id))?;

        let mut after = before.clone();
        let changed = after.apply_update(&update, self.clock.now())?;
        if changed.is_empty() {
            tx.rollback().await?;
            return Ok(before);
        }
        tx.save_invoice(&before, &after).await?;

        if changed.contains(&"total_amount") && after.status.is_payment_derived() {
            let paid = tx.completed_payment_sum(id).await?;
            let derived = reconcile_status(after.status, after.total_amount, paid);
            if derived != after.status {
                after = tx.update_status(id, derived).await?;
            }
        }
        tx.commit().await?;

        tracing::info!(changed_fields = ?changed, "invoice updated");
        Ok(after)
    }

    #[instrument(skip(self), fields(invoice_id = %id), err)]
    pub async fn get_invoice_by_id(&self, id: InvoiceId) -> BillingResult<InvoiceView> {
        let invoice = self
            .store
            .get_invoice(id)
            .await?
            .ok_or(BillingError::InvoiceNotFound(id))?;
        let total_paid = self.store.completed_payment_sum(id).await?;
        Ok(InvoiceView::new(invoice, total_paid))
    }

    #[instrument(skip(self), err)]
    pub async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
        page: Pagination,
    ) -> BillingResult<Page<Invoice>> {
        Ok(self.store.list_invoices(filter, page).await?)
    }

    /// Administrative removal of an invoice and its payments.
    #[instrument(skip(self), fields(invoice_id = %id, actor = %actor), err)]
    pub async fn delete_invoice(&self, id: InvoiceId, actor: EmployeeId) -> BillingResult<()> {
        let mut tx = self.store.begin(actor).await?;
        if tx.get_invoice(id).await?.is_none() {
            return Err(BillingError::InvoiceNotFound(id));
        }
        tx.delete_invoice(id).await?;
        tx.commit().await?;
        tracing::info!("invoice deleted");
        Ok(())
    }

    /// Audit trail of an invoice, newest first. Entries survive deletion.
    #[instrument(skip(self), fields(invoice_id = %id), err)]
    pub async fn audit_logs(&self, id: InvoiceId) -> BillingResult<Vec<AuditEntry>> {
        Ok(self.store.audit_logs(id).await?)
    }

    #[instrument(skip(self), fields(invoice_id = %id), err)]
    pub async fn list_payments(&self, id: InvoiceId) -> BillingResult<Vec<Payment>> {
        if self.store.get_invoice(id).await?.is_none() {
            return Err(BillingError::InvoiceNotFound(id));
        }
        Ok(self.store.list_payments(id).await?)
    }

    #[instrument(skip(self), err)]
    pub async fn totals(&self) -> BillingResult<InvoiceTotals> {
        let (outstanding, partially_paid, paid, overpaid, open_amount) = tokio::try_join!(
            self.store.count_with_status(InvoiceStatus::Outstanding),
            self.store.count_with_status(InvoiceStatus::PartiallyPaid),
            self.store.count_with_status(InvoiceStatus::Paid),
            self.store.count_with_status(InvoiceStatus::Overpaid),
            self.store.open_amount(),
        )?;
        Ok(InvoiceTotals {
            outstanding,
            partially_paid,
            paid,
            overpaid,
            open_amount,
        })
    }
}
