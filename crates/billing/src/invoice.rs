//! Invoice, payment and audit records.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use carebill_core::{
    ensure_money_scale, ClientId, DomainError, DomainResult, EmployeeId, InvoiceId, PaymentId,
    SenderId,
};

use crate::care::string_enum;
use crate::document::{validate_details, verify_total_amount, InvoiceDetailLine};
use crate::status::{payment_completion_percentage, InvoiceStatus, InvoiceType, PaymentMethod, PaymentStatus};

/// Printable key/value pairs rendered from the sender's invoice template.
pub type ExtraContent = BTreeMap<String, String>;

/// A persisted invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub invoice_number: String,
    /// Day the number was allocated on; `(sequence_date, invoice_sequence)` is unique.
    pub sequence_date: NaiveDate,
    pub invoice_sequence: i32,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub invoice_type: InvoiceType,
    pub total_amount: Decimal,
    pub details: Vec<InvoiceDetailLine>,
    pub warning_count: i32,
    pub extra_content: ExtraContent,
    /// Set on credit notes: the invoice they compensate.
    pub original_invoice_id: Option<InvoiceId>,
    pub client_id: ClientId,
    pub sender_id: SenderId,
    pub pdf_attachment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Apply an edit in place, returning the names of the fields it touched.
    ///
    /// Status is not editable; callers re-derive it afterwards if amounts changed.
    pub fn apply_update(
        &mut self,
        update: &InvoiceUpdate,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<&'static str>> {
        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "invoice {} is {} and cannot be modified",
                self.id, self.status
            )));
        }

        let issue_date = update.issue_date.unwrap_or(self.issue_date);
        let due_date = update.due_date.unwrap_or(self.due_date);
        ensure_date_order(issue_date, due_date)?;

        let mut changed = Vec::new();
        if issue_date != self.issue_date {
            self.issue_date = issue_date;
            changed.push("issue_date");
        }
        if due_date != self.due_date {
            self.due_date = due_date;
            changed.push("due_date");
        }

        if let Some(amounts) = &update.amounts {
            if amounts.total_amount != self.total_amount {
                self.total_amount = amounts.total_amount;
                changed.push("total_amount");
            }
            if amounts.details != self.details {
                self.details = amounts.details.clone();
                changed.push("invoice_details");
            }
        }
        if let Some(extra) = &update.extra_content {
            if extra != &self.extra_content {
                self.extra_content = extra.clone();
                changed.push("extra_content");
            }
        }

        if !changed.is_empty() {
            self.updated_at = now;
            changed.push("updated_at");
        }
        Ok(changed)
    }
}

fn ensure_date_order(issue_date: NaiveDate, due_date: NaiveDate) -> DomainResult<()> {
    if due_date < issue_date {
        return Err(DomainError::validation("due date cannot be before issue date"));
    }
    Ok(())
}

/// Write model for a new invoice; the number is assigned when it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoice {
    pub client_id: ClientId,
    pub sender_id: SenderId,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub invoice_type: InvoiceType,
    pub total_amount: Decimal,
    pub details: Vec<InvoiceDetailLine>,
    pub warning_count: i32,
    pub extra_content: ExtraContent,
    pub original_invoice_id: Option<InvoiceId>,
}

impl NewInvoice {
    /// Checks run before any transaction is opened.
    pub fn validate(&self) -> DomainResult<()> {
        if !self.client_id.is_valid() {
            return Err(DomainError::invalid_id(format!(
                "client id must be positive, got {}",
                self.client_id
            )));
        }
        if !self.sender_id.is_valid() {
            return Err(DomainError::invalid_id(format!(
                "sender id must be positive, got {}",
                self.sender_id
            )));
        }
        if !self.status.is_initial() {
            return Err(DomainError::validation(format!(
                "invoice cannot be created with status {}; status is derived from payments",
                self.status
            )));
        }
        if self.warning_count < 0 {
            return Err(DomainError::validation("warning count cannot be negative"));
        }
        match (self.invoice_type, self.original_invoice_id) {
            (InvoiceType::CreditNote, None) => {
                return Err(DomainError::validation(
                    "credit note must reference the original invoice",
                ));
            }
            (InvoiceType::Standard, Some(_)) => {
                return Err(DomainError::validation(
                    "only credit notes reference an original invoice",
                ));
            }
            _ => {}
        }
        ensure_date_order(self.issue_date, self.due_date)?;
        ensure_money_scale("total amount", self.total_amount)?;
        validate_details(&self.details)?;
        verify_total_amount(self.total_amount, &self.details)
    }
}

/// Replacement amounts; total and details are only ever edited together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceAmounts {
    pub total_amount: Decimal,
    pub details: Vec<InvoiceDetailLine>,
}

/// Edit of the mutable invoice fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceUpdate {
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub amounts: Option<InvoiceAmounts>,
    pub extra_content: Option<ExtraContent>,
}

impl InvoiceUpdate {
    pub fn validate(&self) -> DomainResult<()> {
        if self.issue_date.is_none()
            && self.due_date.is_none()
            && self.amounts.is_none()
            && self.extra_content.is_none()
        {
            return Err(DomainError::validation("invoice update contains no changes"));
        }
        if let Some(amounts) = &self.amounts {
            ensure_money_scale("total amount", amounts.total_amount)?;
            validate_details(&amounts.details)?;
            verify_total_amount(amounts.total_amount, &amounts.details)?;
        }
        Ok(())
    }
}

/// An invoice with its payment progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceView {
    pub invoice: Invoice,
    pub total_paid: Decimal,
    pub payment_completion_percentage: Decimal,
}

impl InvoiceView {
    pub fn new(invoice: Invoice, total_paid: Decimal) -> Self {
        let payment_completion_percentage =
            payment_completion_percentage(invoice.total_amount, total_paid);
        Self {
            invoice,
            total_paid,
            payment_completion_percentage,
        }
    }
}

/// A recorded payment; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_id: InvoiceId,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: EmployeeId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub invoice_id: InvoiceId,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn validate(&self) -> DomainResult<()> {
        if !self.invoice_id.is_valid() {
            return Err(DomainError::invalid_id(format!(
                "invoice id must be positive, got {}",
                self.invoice_id
            )));
        }
        if self.amount <= Decimal::ZERO {
            return Err(DomainError::validation("payment amount must be greater than zero"));
        }
        ensure_money_scale("payment amount", self.amount)
    }

    pub fn is_completed(&self) -> bool {
        self.payment_status == PaymentStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOperation {
    Insert,
    Update,
    Status,
    Delete,
}

string_enum!(AuditOperation, "audit operation", {
    Insert => "INSERT",
    Update => "UPDATE",
    Status => "STATUS",
    Delete => "DELETE",
});

/// One change to an invoice, attributed to the employee who made it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub audit_id: i64,
    pub invoice_id: InvoiceId,
    pub operation: AuditOperation,
    pub changed_by: Option<EmployeeId>,
    pub changed_at: DateTime<Utc>,
    pub old_values: Option<JsonValue>,
    pub new_values: Option<JsonValue>,
    pub changed_fields: Vec<String>,
}
