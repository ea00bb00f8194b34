//! Credit-note construction.

use carebill_core::{DomainError, DomainResult};

use crate::document::InvoiceDetailLine;
use crate::invoice::Invoice;
use crate::status::{InvoiceStatus, InvoiceType};

/// Reject originals that cannot be credited.
pub fn ensure_creditable(original: &Invoice) -> DomainResult<()> {
    if original.invoice_type == InvoiceType::CreditNote {
        return Err(DomainError::conflict("cannot credit a credit note"));
    }
    if original.status == InvoiceStatus::Canceled {
        return Err(DomainError::conflict(format!(
            "invoice {} is already canceled",
            original.id
        )));
    }
    Ok(())
}

/// Element-wise negation of detail lines.
///
/// Monetary fields flip sign; periods, the VAT rate and the unit are copied
/// as-is. Warnings belong to the original run and are dropped.
pub fn credit_note_lines(lines: &[InvoiceDetailLine]) -> Vec<InvoiceDetailLine> {
    lines
        .iter()
        .map(|line| InvoiceDetailLine {
            contract_id: line.contract_id,
            contract_type: line.contract_type,
            periods: line.periods.clone(),
            pre_vat_total: -line.pre_vat_total,
            total: -line.total,
            vat: line.vat,
            vat_amount: line.vat_amount.map(|v| -v),
            price: -line.price,
            price_time_unit: line.price_time_unit,
            warnings: Vec::new(),
        })
        .collect()
}
