//! Invoice number allocation.

use chrono::NaiveDate;
use tracing::instrument;

use carebill_billing::InvoiceNumber;

use crate::error::BillingResult;
use crate::invoice_store::InvoiceTx;

/// Allocates `INV-YYYYMMDD-NNNN` numbers inside the transaction that
/// persists the invoice.
///
/// The store serializes allocators for the same date until `tx` ends, so the
/// number is only valid for an insert made through the same transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvoiceNumberAllocator;

impl InvoiceNumberAllocator {
    #[instrument(skip(self, tx), fields(actor = %tx.actor()), err)]
    pub async fn allocate(
        &self,
        tx: &mut dyn InvoiceTx,
        date: NaiveDate,
    ) -> BillingResult<InvoiceNumber> {
        let max_sequence = tx.max_sequence_for_date(date).await?;
        let number = InvoiceNumber::next_after(date, max_sequence)?;
        tracing::debug!(invoice_number = %number.number, "allocated invoice number");
        Ok(number)
    }
}
