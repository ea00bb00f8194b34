//! Payment recording and invoice status reconciliation.

use tracing::{instrument, Span};

use carebill_billing::{reconcile_status, InvoiceStatus, NewPayment, Payment};
use carebill_core::EmployeeId;

use crate::error::{BillingError, BillingResult};
use crate::invoice_store::InvoiceStore;

/// Result of recording a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub payment: Payment,
    /// Whether the payment moved the invoice to a different status.
    pub status_changed: bool,
    /// Status of the invoice after the payment.
    pub current_status: InvoiceStatus,
}

pub struct PaymentReconciler<S> {
    store: S,
}

impl<S: InvoiceStore> PaymentReconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Record a payment and, when it is completed, re-derive the invoice
    /// status from the fresh sum of completed payments.
    ///
    /// The payment row and any status change commit together.
    #[instrument(
        skip(self, payment),
        fields(invoice_id = %payment.invoice_id, actor = %actor, status = tracing::field::Empty),
        err
    )]
    pub async fn create_payment(
        &self,
        payment: NewPayment,
        actor: EmployeeId,
    ) -> BillingResult<PaymentOutcome> {
        payment.validate()?;

        let mut tx = self.store.begin(actor).await?;
        let invoice = tx
            .get_invoice(payment.invoice_id)
            .await?
            .ok_or(BillingError::InvoiceNotFound(payment.invoice_id))?;

        let recorded = tx.insert_payment(&payment).await?;

        let mut current_status = invoice.status;
        if payment.is_completed() {
            let paid = tx.completed_payment_sum(invoice.id).await?;
            let derived = reconcile_status(invoice.status, invoice.total_amount, paid);
            if derived != invoice.status {
                current_status = tx.update_status(invoice.id, derived).await?.status;
            }
        }
        tx.commit().await?;

        let status_changed = current_status != invoice.status;
        Span::current().record("status", current_status.as_str());
        if status_changed {
            tracing::info!(from = %invoice.status, to = %current_status, "invoice status changed");
        }

        Ok(PaymentOutcome {
            payment: recorded,
            status_changed,
            current_status,
        })
    }
}
