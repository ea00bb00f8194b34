use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use carebill_billing::{
    AuditEntry, AuditOperation, Invoice, InvoiceNumber, InvoiceStatus, NewInvoice, NewPayment,
    Payment, PaymentStatus,
};
use carebill_core::{sum_money, EmployeeId, InvoiceId, PaymentId};

use super::audit::invoice_change;
use super::r#trait::{InvoiceStore, InvoiceTx, OPEN_STATUSES};
use crate::error::StoreError;
use crate::query::{InvoiceFilter, Page, Pagination};

#[derive(Debug, Default, Clone)]
struct Tables {
    invoices: BTreeMap<InvoiceId, Invoice>,
    payments: Vec<Payment>,
    audit: Vec<AuditEntry>,
    last_invoice_id: i64,
    last_payment_id: i64,
    last_audit_id: i64,
}

impl Tables {
    fn completed_payment_sum(&self, id: InvoiceId) -> Decimal {
        sum_money(
            self.payments
                .iter()
                .filter(|p| p.invoice_id == id && p.payment_status == PaymentStatus::Completed)
                .map(|p| p.amount),
        )
    }

    fn record_audit(
        &mut self,
        invoice_id: InvoiceId,
        operation: AuditOperation,
        actor: EmployeeId,
        before: Option<&Invoice>,
        after: Option<&Invoice>,
    ) -> Result<(), StoreError> {
        let (old_values, new_values, changed_fields) = invoice_change(before, after)?;
        self.last_audit_id += 1;
        self.audit.push(AuditEntry {
            audit_id: self.last_audit_id,
            invoice_id,
            operation,
            changed_by: Some(actor),
            changed_at: Utc::now(),
            old_values,
            new_values,
            changed_fields,
        });
        Ok(())
    }
}

fn matches_filter(invoice: &Invoice, filter: &InvoiceFilter) -> bool {
    filter.client_id.is_none_or(|id| invoice.client_id == id)
        && filter.sender_id.is_none_or(|id| invoice.sender_id == id)
        && filter.status.is_none_or(|status| invoice.status == status)
        && filter.start_date.is_none_or(|start| invoice.issue_date >= start)
        && filter.end_date.is_none_or(|end| invoice.issue_date <= end)
}

/// In-memory invoice store.
///
/// Intended for tests/dev. Transactions are serialized by holding one async
/// mutex for their whole lifetime; writes are staged on a copy of the tables
/// and swapped in on commit.
#[derive(Debug, Default, Clone)]
pub struct InMemoryInvoiceStore {
    tables: Arc<Mutex<Tables>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail, leaving the tables untouched.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl InvoiceStore for InMemoryInvoiceStore {
    async fn begin(&self, actor: EmployeeId) -> Result<Box<dyn InvoiceTx>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTx {
            guard,
            staged,
            actor,
            fail_commit: self.fail_next_commit.clone(),
        }))
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        Ok(self.tables.lock().await.invoices.get(&id).cloned())
    }

    async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
        page: Pagination,
    ) -> Result<Page<Invoice>, StoreError> {
        let tables = self.tables.lock().await;
        let mut matching: Vec<Invoice> = tables
            .invoices
            .values()
            .filter(|invoice| matches_filter(invoice, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.issue_date.cmp(&a.issue_date).then(b.id.cmp(&a.id)));

        Ok(Page {
            items: page.window(&matching),
            total: matching.len() as u64,
            pagination: page,
        })
    }

    async fn completed_payment_sum(&self, id: InvoiceId) -> Result<Decimal, StoreError> {
        Ok(self.tables.lock().await.completed_payment_sum(id))
    }

    async fn list_payments(&self, id: InvoiceId) -> Result<Vec<Payment>, StoreError> {
        let tables = self.tables.lock().await;
        let mut payments: Vec<Payment> = tables
            .payments
            .iter()
            .filter(|p| p.invoice_id == id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.payment_date.cmp(&a.payment_date).then(b.id.cmp(&a.id)));
        Ok(payments)
    }

    async fn audit_logs(&self, id: InvoiceId) -> Result<Vec<AuditEntry>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .audit
            .iter()
            .rev()
            .filter(|entry| entry.invoice_id == id)
            .cloned()
            .collect())
    }

    async fn count_with_status(&self, status: InvoiceStatus) -> Result<u64, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.invoices.values().filter(|i| i.status == status).count() as u64)
    }

    async fn open_amount(&self) -> Result<Decimal, StoreError> {
        let tables = self.tables.lock().await;
        Ok(sum_money(
            tables
                .invoices
                .values()
                .filter(|i| OPEN_STATUSES.contains(&i.status))
                .map(|i| i.total_amount),
        ))
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    actor: EmployeeId,
    fail_commit: Arc<AtomicBool>,
}

impl InMemoryTx {
    fn existing(&self, id: InvoiceId) -> Result<Invoice, StoreError> {
        self.staged
            .invoices
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("invoice {id}")))
    }
}

#[async_trait]
impl InvoiceTx for InMemoryTx {
    fn actor(&self) -> EmployeeId {
        self.actor
    }

    async fn max_sequence_for_date(&mut self, date: NaiveDate) -> Result<i32, StoreError> {
        Ok(self
            .staged
            .invoices
            .values()
            .filter(|i| i.sequence_date == date)
            .map(|i| i.invoice_sequence)
            .max()
            .unwrap_or(0))
    }

    async fn insert_invoice(
        &mut self,
        number: &InvoiceNumber,
        invoice: &NewInvoice,
    ) -> Result<Invoice, StoreError> {
        let duplicate = self.staged.invoices.values().any(|i| {
            i.invoice_number == number.number
                || (i.sequence_date == number.date && i.invoice_sequence == number.sequence)
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "invoice number {} already exists",
                number.number
            )));
        }
        if let Some(original) = invoice.original_invoice_id {
            if !self.staged.invoices.contains_key(&original) {
                return Err(StoreError::NotFound(format!("original invoice {original}")));
            }
        }

        self.staged.last_invoice_id += 1;
        let now = Utc::now();
        let stored = Invoice {
            id: InvoiceId::from_raw(self.staged.last_invoice_id),
            invoice_number: number.number.clone(),
            sequence_date: number.date,
            invoice_sequence: number.sequence,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            status: invoice.status,
            invoice_type: invoice.invoice_type,
            total_amount: invoice.total_amount,
            details: invoice.details.clone(),
            warning_count: invoice.warning_count,
            extra_content: invoice.extra_content.clone(),
            original_invoice_id: invoice.original_invoice_id,
            client_id: invoice.client_id,
            sender_id: invoice.sender_id,
            pdf_attachment_id: None,
            created_at: now,
            updated_at: now,
        };
        self.staged.invoices.insert(stored.id, stored.clone());
        self.staged
            .record_audit(stored.id, AuditOperation::Insert, self.actor, None, Some(&stored))?;
        Ok(stored)
    }

    async fn get_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        Ok(self.staged.invoices.get(&id).cloned())
    }

    async fn save_invoice(&mut self, before: &Invoice, after: &Invoice) -> Result<(), StoreError> {
        self.existing(before.id)?;
        self.staged.invoices.insert(after.id, after.clone());
        self.staged
            .record_audit(after.id, AuditOperation::Update, self.actor, Some(before), Some(after))
    }

    async fn update_status(
        &mut self,
        id: InvoiceId,
        status: InvoiceStatus,
    ) -> Result<Invoice, StoreError> {
        let before = self.existing(id)?;
        let mut after = before.clone();
        after.status = status;
        after.updated_at = Utc::now();
        self.staged.invoices.insert(id, after.clone());
        self.staged
            .record_audit(id, AuditOperation::Status, self.actor, Some(&before), Some(&after))?;
        Ok(after)
    }

    async fn delete_invoice(&mut self, id: InvoiceId) -> Result<(), StoreError> {
        let before = self.existing(id)?;
        self.staged.invoices.remove(&id);
        self.staged.payments.retain(|p| p.invoice_id != id);
        for invoice in self.staged.invoices.values_mut() {
            if invoice.original_invoice_id == Some(id) {
                invoice.original_invoice_id = None;
            }
        }
        self.staged
            .record_audit(id, AuditOperation::Delete, self.actor, Some(&before), None)
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<Payment, StoreError> {
        self.existing(payment.invoice_id)?;
        self.staged.last_payment_id += 1;
        let stored = Payment {
            id: PaymentId::from_raw(self.staged.last_payment_id),
            invoice_id: payment.invoice_id,
            payment_method: payment.payment_method,
            payment_status: payment.payment_status,
            amount: payment.amount,
            payment_date: payment.payment_date,
            payment_reference: payment.payment_reference.clone(),
            notes: payment.notes.clone(),
            recorded_by: self.actor,
            created_at: Utc::now(),
        };
        self.staged.payments.push(stored.clone());
        Ok(stored)
    }

    async fn completed_payment_sum(&mut self, id: InvoiceId) -> Result<Decimal, StoreError> {
        Ok(self.staged.completed_payment_sum(id))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".to_string()));
        }
        let InMemoryTx {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
