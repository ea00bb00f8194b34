//! Postgres-backed invoice store.
//!
//! ## Invoice numbering
//!
//! `max_sequence_for_date` takes a transaction-scoped advisory lock keyed on
//! the allocation date before reading `MAX(invoice_sequence)`, so concurrent
//! allocators for the same day queue behind each other until the holder
//! commits or rolls back. `UNIQUE (sequence_date, invoice_sequence)` and
//! `UNIQUE (invoice_number)` back this up; a violation surfaces as
//! `StoreError::Conflict`.
//!
//! ## Audit trail
//!
//! Every write appends a row to `invoice_audit_log` inside the same
//! transaction, with `changed_by` taken from the actor bound to the
//! transaction. No session variables or triggers are involved.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::{instrument, Span};
use uuid::Uuid;

use carebill_billing::{
    decode_details, encode_details, AuditEntry, AuditOperation, ExtraContent, Invoice,
    InvoiceNumber, InvoiceStatus, InvoiceType, NewInvoice, NewPayment, Payment, PaymentMethod,
    PaymentStatus, DETAILS_SCHEMA_VERSION,
};
use carebill_core::{ClientId, EmployeeId, InvoiceId, PaymentId, SenderId};

use super::audit::{invoice_change, snapshot};
use super::r#trait::{InvoiceStore, InvoiceTx, OPEN_STATUSES};
use crate::error::StoreError;
use crate::pg::{is_unique_violation, map_sqlx_error, parse_tag};
use crate::query::{InvoiceFilter, Page, Pagination};

/// First advisory-lock key; the second is the allocation date as `YYYYMMDD`.
const SEQUENCE_LOCK_NAMESPACE: i32 = 0x1A7E;

const INVOICE_COLUMNS: &str = r#"
    id, invoice_number, sequence_date, invoice_sequence, issue_date, due_date, status,
    invoice_type, total_amount, invoice_details, details_schema_version, warning_count,
    extra_content, original_invoice_id, client_id, sender_id, pdf_attachment_id,
    created_at, updated_at
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, invoice_id, payment_method, payment_status, amount, payment_date,
    payment_reference, notes, recorded_by, created_at
"#;

#[derive(Debug, Clone)]
pub struct PostgresInvoiceStore {
    pool: Arc<PgPool>,
}

impl PostgresInvoiceStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &InvoiceFilter) {
    if let Some(client_id) = filter.client_id {
        qb.push(" AND client_id = ").push_bind(client_id.get());
    }
    if let Some(sender_id) = filter.sender_id {
        qb.push(" AND sender_id = ").push_bind(sender_id.get());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND issue_date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND issue_date <= ").push_bind(end);
    }
}

fn invoices_from_rows(operation: &str, rows: &[sqlx::postgres::PgRow]) -> Result<Vec<Invoice>, StoreError> {
    rows.iter()
        .map(|row| {
            InvoiceRow::from_row(row)
                .map_err(|e| map_sqlx_error(operation, e))
                .and_then(Invoice::try_from)
        })
        .collect()
}

#[async_trait]
impl InvoiceStore for PostgresInvoiceStore {
    #[instrument(skip(self), fields(actor = %actor), err)]
    async fn begin(&self, actor: EmployeeId) -> Result<Box<dyn InvoiceTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTx { tx, actor }))
    }

    #[instrument(skip(self), fields(invoice_id = %id), err)]
    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_invoice", e))?;
        row.map(|row| {
            InvoiceRow::from_row(&row)
                .map_err(|e| map_sqlx_error("get_invoice", e))
                .and_then(Invoice::try_from)
        })
        .transpose()
    }

    #[instrument(skip(self), fields(operation = tracing::field::Empty, invoice_count = tracing::field::Empty), err)]
    async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
        page: Pagination,
    ) -> Result<Page<Invoice>, StoreError> {
        let span = Span::current();
        span.record("operation", "list_invoices");

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM invoices WHERE TRUE");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build()
            .fetch_one(&*self.pool)
            .await
            .and_then(|row| row.try_get("total"))
            .map_err(|e| map_sqlx_error("count_invoices", e))?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE TRUE"
        ));
        push_filter(&mut select, filter);
        select
            .push(" ORDER BY issue_date DESC, id DESC LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(page.offset));
        let rows = select
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_invoices", e))?;

        let items = invoices_from_rows("list_invoices", &rows)?;
        span.record("invoice_count", items.len());
        Ok(Page {
            items,
            total: total.max(0) as u64,
            pagination: page,
        })
    }

    #[instrument(skip(self), fields(invoice_id = %id), err)]
    async fn completed_payment_sum(&self, id: InvoiceId) -> Result<Decimal, StoreError> {
        completed_payment_sum(&*self.pool, id).await
    }

    #[instrument(skip(self), fields(invoice_id = %id), err)]
    async fn list_payments(&self, id: InvoiceId) -> Result<Vec<Payment>, StoreError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE invoice_id = $1 ORDER BY payment_date DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(id.get())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_payments", e))?;
        rows.iter().map(payment_from_row).collect()
    }

    #[instrument(skip(self), fields(invoice_id = %id), err)]
    async fn audit_logs(&self, id: InvoiceId) -> Result<Vec<AuditEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT audit_id, invoice_id, operation, changed_by, changed_at,
                   old_values, new_values, changed_fields
            FROM invoice_audit_log
            WHERE invoice_id = $1
            ORDER BY changed_at DESC, audit_id DESC
            "#,
        )
        .bind(id.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("audit_logs", e))?;

        rows.iter()
            .map(|row| {
                let audit = AuditRow::from_row(row).map_err(|e| map_sqlx_error("audit_logs", e))?;
                AuditEntry::try_from(audit)
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn count_with_status(&self, status: InvoiceStatus) -> Result<u64, StoreError> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM invoices WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&*self.pool)
            .await
            .and_then(|row| row.try_get("total"))
            .map_err(|e| map_sqlx_error("count_with_status", e))?;
        Ok(total.max(0) as u64)
    }

    #[instrument(skip(self), err)]
    async fn open_amount(&self) -> Result<Decimal, StoreError> {
        let statuses: Vec<String> = OPEN_STATUSES.iter().map(|s| s.as_str().to_string()).collect();
        sqlx::query(
            "SELECT COALESCE(SUM(total_amount), 0) AS total FROM invoices WHERE status = ANY($1)",
        )
        .bind(statuses)
        .fetch_one(&*self.pool)
        .await
        .and_then(|row| row.try_get("total"))
        .map_err(|e| map_sqlx_error("open_amount", e))
    }
}

async fn completed_payment_sum<'e, E>(executor: E, id: InvoiceId) -> Result<Decimal, StoreError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        SELECT COALESCE(SUM(amount), 0) AS total
        FROM payments
        WHERE invoice_id = $1 AND payment_status = 'completed'
        "#,
    )
    .bind(id.get())
    .fetch_one(executor)
    .await
    .and_then(|row| row.try_get("total"))
    .map_err(|e| map_sqlx_error("completed_payment_sum", e))
}

/// A unit of work on one pooled connection, attributed to `actor`.
struct PostgresTx {
    tx: Transaction<'static, Postgres>,
    actor: EmployeeId,
}

impl PostgresTx {
    async fn fetch_for_update(&mut self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_invoice_for_update", e))?;
        row.map(|row| {
            InvoiceRow::from_row(&row)
                .map_err(|e| map_sqlx_error("get_invoice_for_update", e))
                .and_then(Invoice::try_from)
        })
        .transpose()
    }

    async fn existing(&mut self, id: InvoiceId) -> Result<Invoice, StoreError> {
        self.fetch_for_update(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("invoice {id}")))
    }

    async fn record_audit(
        &mut self,
        invoice_id: InvoiceId,
        operation: AuditOperation,
        before: Option<&Invoice>,
        after: Option<&Invoice>,
    ) -> Result<(), StoreError> {
        let (old_values, new_values, changed_fields) = invoice_change(before, after)?;
        sqlx::query(
            r#"
            INSERT INTO invoice_audit_log (
                invoice_id, operation, changed_by, old_values, new_values, changed_fields
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(invoice_id.get())
        .bind(operation.as_str())
        .bind(self.actor.get())
        .bind(old_values)
        .bind(new_values)
        .bind(changed_fields)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("record_audit", e))?;
        Ok(())
    }
}

fn date_key(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

#[async_trait]
impl InvoiceTx for PostgresTx {
    fn actor(&self) -> EmployeeId {
        self.actor
    }

    #[instrument(skip(self), fields(operation = tracing::field::Empty), err)]
    async fn max_sequence_for_date(&mut self, date: NaiveDate) -> Result<i32, StoreError> {
        Span::current().record("operation", "max_sequence_for_date");

        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(SEQUENCE_LOCK_NAMESPACE)
            .bind(date_key(date))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_invoice_sequence", e))?;

        sqlx::query(
            r#"
            SELECT COALESCE(MAX(invoice_sequence), 0) AS max_sequence
            FROM invoices
            WHERE sequence_date = $1
            "#,
        )
        .bind(date)
        .fetch_one(&mut *self.tx)
        .await
        .and_then(|row| row.try_get("max_sequence"))
        .map_err(|e| map_sqlx_error("max_sequence_for_date", e))
    }

    #[instrument(skip(self, invoice), fields(invoice_number = %number.number, client_id = %invoice.client_id), err)]
    async fn insert_invoice(
        &mut self,
        number: &InvoiceNumber,
        invoice: &NewInvoice,
    ) -> Result<Invoice, StoreError> {
        let details = encode_details(&invoice.details)?;
        let extra_content = snapshot(&invoice.extra_content)?;

        let sql = format!(
            r#"
            INSERT INTO invoices (
                invoice_number, sequence_date, invoice_sequence, issue_date, due_date, status,
                invoice_type, total_amount, invoice_details, details_schema_version,
                warning_count, extra_content, original_invoice_id, client_id, sender_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {INVOICE_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&number.number)
            .bind(number.date)
            .bind(number.sequence)
            .bind(invoice.issue_date)
            .bind(invoice.due_date)
            .bind(invoice.status.as_str())
            .bind(invoice.invoice_type.as_str())
            .bind(invoice.total_amount)
            .bind(details)
            .bind(DETAILS_SCHEMA_VERSION)
            .bind(invoice.warning_count)
            .bind(extra_content)
            .bind(invoice.original_invoice_id.map(|id| id.get()))
            .bind(invoice.client_id.get())
            .bind(invoice.sender_id.get())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(format!(
                        "invoice number {} already allocated",
                        number.number
                    ))
                } else {
                    map_sqlx_error("insert_invoice", e)
                }
            })?;

        let stored = InvoiceRow::from_row(&row)
            .map_err(|e| map_sqlx_error("insert_invoice", e))
            .and_then(Invoice::try_from)?;
        self.record_audit(stored.id, AuditOperation::Insert, None, Some(&stored))
            .await?;
        Ok(stored)
    }

    async fn get_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        self.fetch_for_update(id).await
    }

    #[instrument(skip(self, before, after), fields(invoice_id = %after.id), err)]
    async fn save_invoice(&mut self, before: &Invoice, after: &Invoice) -> Result<(), StoreError> {
        let details = encode_details(&after.details)?;
        let extra_content = snapshot(&after.extra_content)?;

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET issue_date = $2,
                due_date = $3,
                total_amount = $4,
                invoice_details = $5,
                details_schema_version = $6,
                extra_content = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(after.id.get())
        .bind(after.issue_date)
        .bind(after.due_date)
        .bind(after.total_amount)
        .bind(details)
        .bind(DETAILS_SCHEMA_VERSION)
        .bind(extra_content)
        .bind(after.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_invoice", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("invoice {}", after.id)));
        }
        self.record_audit(after.id, AuditOperation::Update, Some(before), Some(after))
            .await
    }

    #[instrument(skip(self), fields(invoice_id = %id, status = %status), err)]
    async fn update_status(
        &mut self,
        id: InvoiceId,
        status: InvoiceStatus,
    ) -> Result<Invoice, StoreError> {
        let before = self.existing(id).await?;

        let sql = format!(
            "UPDATE invoices SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {INVOICE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.get())
            .bind(status.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_status", e))?;
        let after = InvoiceRow::from_row(&row)
            .map_err(|e| map_sqlx_error("update_status", e))
            .and_then(Invoice::try_from)?;

        self.record_audit(id, AuditOperation::Status, Some(&before), Some(&after))
            .await?;
        Ok(after)
    }

    #[instrument(skip(self), fields(invoice_id = %id), err)]
    async fn delete_invoice(&mut self, id: InvoiceId) -> Result<(), StoreError> {
        let before = self.existing(id).await?;

        sqlx::query("DELETE FROM payments WHERE invoice_id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_payments", e))?;
        sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_invoice", e))?;

        self.record_audit(id, AuditOperation::Delete, Some(&before), None)
            .await
    }

    #[instrument(skip(self, payment), fields(invoice_id = %payment.invoice_id, status = %payment.payment_status), err)]
    async fn insert_payment(&mut self, payment: &NewPayment) -> Result<Payment, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO payments (
                invoice_id, payment_method, payment_status, amount, payment_date,
                payment_reference, notes, recorded_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PAYMENT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(payment.invoice_id.get())
            .bind(payment.payment_method.map(|m| m.as_str()))
            .bind(payment.payment_status.as_str())
            .bind(payment.amount)
            .bind(payment.payment_date)
            .bind(payment.payment_reference.as_deref())
            .bind(payment.notes.as_deref())
            .bind(self.actor.get())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_payment", e))?;
        payment_from_row(&row)
    }

    async fn completed_payment_sum(&mut self, id: InvoiceId) -> Result<Decimal, StoreError> {
        completed_payment_sum(&mut *self.tx, id).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

// SQLx row types

#[derive(Debug)]
struct InvoiceRow {
    id: i64,
    invoice_number: String,
    sequence_date: NaiveDate,
    invoice_sequence: i32,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    status: String,
    invoice_type: String,
    total_amount: Decimal,
    invoice_details: JsonValue,
    details_schema_version: i32,
    warning_count: i32,
    extra_content: JsonValue,
    original_invoice_id: Option<i64>,
    client_id: i64,
    sender_id: i64,
    pdf_attachment_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for InvoiceRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(InvoiceRow {
            id: row.try_get("id")?,
            invoice_number: row.try_get("invoice_number")?,
            sequence_date: row.try_get("sequence_date")?,
            invoice_sequence: row.try_get("invoice_sequence")?,
            issue_date: row.try_get("issue_date")?,
            due_date: row.try_get("due_date")?,
            status: row.try_get("status")?,
            invoice_type: row.try_get("invoice_type")?,
            total_amount: row.try_get("total_amount")?,
            invoice_details: row.try_get("invoice_details")?,
            details_schema_version: row.try_get("details_schema_version")?,
            warning_count: row.try_get("warning_count")?,
            extra_content: row.try_get("extra_content")?,
            original_invoice_id: row.try_get("original_invoice_id")?,
            client_id: row.try_get("client_id")?,
            sender_id: row.try_get("sender_id")?,
            pdf_attachment_id: row.try_get("pdf_attachment_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = StoreError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let details = decode_details(row.details_schema_version, row.invoice_details)?;
        let extra_content: ExtraContent = if row.extra_content.is_null() {
            ExtraContent::new()
        } else {
            serde_json::from_value(row.extra_content)
                .map_err(|e| StoreError::Serialization(format!("column extra_content: {e}")))?
        };

        Ok(Invoice {
            id: InvoiceId::from_raw(row.id),
            invoice_number: row.invoice_number,
            sequence_date: row.sequence_date,
            invoice_sequence: row.invoice_sequence,
            issue_date: row.issue_date,
            due_date: row.due_date,
            status: parse_tag::<InvoiceStatus>("status", &row.status)?,
            invoice_type: parse_tag::<InvoiceType>("invoice_type", &row.invoice_type)?,
            total_amount: row.total_amount,
            details,
            warning_count: row.warning_count,
            extra_content,
            original_invoice_id: row.original_invoice_id.map(InvoiceId::from_raw),
            client_id: ClientId::from_raw(row.client_id),
            sender_id: SenderId::from_raw(row.sender_id),
            pdf_attachment_id: row.pdf_attachment_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn payment_from_row(row: &sqlx::postgres::PgRow) -> Result<Payment, StoreError> {
    let decode = |e| map_sqlx_error("payment_from_row", e);
    let method: Option<String> = row.try_get("payment_method").map_err(decode)?;
    let status: String = row.try_get("payment_status").map_err(decode)?;

    Ok(Payment {
        id: PaymentId::from_raw(row.try_get("id").map_err(decode)?),
        invoice_id: InvoiceId::from_raw(row.try_get("invoice_id").map_err(decode)?),
        payment_method: method
            .as_deref()
            .map(|m| parse_tag::<PaymentMethod>("payment_method", m))
            .transpose()?,
        payment_status: parse_tag::<PaymentStatus>("payment_status", &status)?,
        amount: row.try_get("amount").map_err(decode)?,
        payment_date: row.try_get("payment_date").map_err(decode)?,
        payment_reference: row.try_get("payment_reference").map_err(decode)?,
        notes: row.try_get("notes").map_err(decode)?,
        recorded_by: EmployeeId::from_raw(row.try_get("recorded_by").map_err(decode)?),
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

#[derive(Debug)]
struct AuditRow {
    audit_id: i64,
    invoice_id: i64,
    operation: String,
    changed_by: Option<i64>,
    changed_at: DateTime<Utc>,
    old_values: Option<JsonValue>,
    new_values: Option<JsonValue>,
    changed_fields: Vec<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for AuditRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(AuditRow {
            audit_id: row.try_get("audit_id")?,
            invoice_id: row.try_get("invoice_id")?,
            operation: row.try_get("operation")?,
            changed_by: row.try_get("changed_by")?,
            changed_at: row.try_get("changed_at")?,
            old_values: row.try_get("old_values")?,
            new_values: row.try_get("new_values")?,
            changed_fields: row.try_get("changed_fields")?,
        })
    }
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditEntry {
            audit_id: row.audit_id,
            invoice_id: InvoiceId::from_raw(row.invoice_id),
            operation: parse_tag::<AuditOperation>("operation", &row.operation)?,
            changed_by: row.changed_by.map(EmployeeId::from_raw),
            changed_at: row.changed_at,
            old_values: row.old_values,
            new_values: row.new_values,
            changed_fields: row.changed_fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_lock_key_is_the_calendar_date() {
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        assert_eq!(date_key(date), 20_240_701);
    }
}
