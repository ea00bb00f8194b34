//! Credit-note issuance.

use tracing::instrument;

use carebill_billing::{
    credit_note_lines, ensure_creditable, ExtraContent, InvoiceStatus, InvoiceType, NewInvoice,
};
use carebill_core::{EmployeeId, InvoiceId};

use super::numbering::InvoiceNumberAllocator;
use crate::clock::Clock;
use crate::config::BillingConfig;
use crate::error::{BillingError, BillingResult};
use crate::invoice_store::InvoiceStore;

pub struct CreditNoteIssuer<S, C> {
    store: S,
    clock: C,
    config: BillingConfig,
    numbers: InvoiceNumberAllocator,
}

impl<S, C> CreditNoteIssuer<S, C>
where
    S: InvoiceStore,
    C: Clock,
{
    pub fn new(store: S, clock: C, config: BillingConfig) -> Self {
        Self {
            store,
            clock,
            config,
            numbers: InvoiceNumberAllocator,
        }
    }

    /// Issue a credit note compensating `invoice_id` and cancel the original.
    ///
    /// Both writes commit together. Returns the id of the credit note.
    #[instrument(skip(self), fields(invoice_id = %invoice_id, actor = %actor), err)]
    pub async fn credit_invoice(
        &self,
        invoice_id: InvoiceId,
        actor: EmployeeId,
    ) -> BillingResult<InvoiceId> {
        let mut tx = self.store.begin(actor).await?;
        let original = tx
            .get_invoice(invoice_id)
            .await?
            .ok_or(BillingError::InvoiceNotFound(invoice_id))?;
        ensure_creditable(&original)?;

        let today = self.clock.today();
        let credit_note = NewInvoice {
            client_id: original.client_id,
            sender_id: original.sender_id,
            issue_date: today,
            due_date: today + self.config.invoice_due(),
            status: InvoiceStatus::Outstanding,
            invoice_type: InvoiceType::CreditNote,
            total_amount: -original.total_amount,
            details: credit_note_lines(&original.details),
            warning_count: 0,
            extra_content: ExtraContent::new(),
            original_invoice_id: Some(original.id),
        };
        credit_note.validate()?;

        let number = self.numbers.allocate(&mut *tx, today).await?;
        let stored = tx.insert_invoice(&number, &credit_note).await?;
        tx.update_status(original.id, InvoiceStatus::Canceled).await?;
        tx.commit().await?;

        tracing::info!(
            credit_note_id = %stored.id,
            invoice_number = %stored.invoice_number,
            "credit note issued"
        );
        Ok(stored.id)
    }
}
