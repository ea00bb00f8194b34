//! Invoice and payment states, and the payment-derived status function.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use carebill_core::round_money;

use crate::care::string_enum;

/// Payments within this many currency units of the total count as settled.
pub const PAYMENT_TOLERANCE: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Outstanding,
    PartiallyPaid,
    Paid,
    Expired,
    Overpaid,
    Imported,
    Concept,
    /// Superseded by a credit note; terminal.
    Canceled,
}

string_enum!(InvoiceStatus, "invoice status", {
    Outstanding => "outstanding",
    PartiallyPaid => "partially_paid",
    Paid => "paid",
    Expired => "expired",
    Overpaid => "overpaid",
    Imported => "imported",
    Concept => "concept",
    Canceled => "canceled",
});

impl InvoiceStatus {
    /// States an invoice may be created in without any payment history.
    pub fn is_initial(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Outstanding | InvoiceStatus::Concept | InvoiceStatus::Imported
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Canceled)
    }

    /// States produced by [`determine_invoice_status`].
    pub fn is_payment_derived(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Outstanding
                | InvoiceStatus::PartiallyPaid
                | InvoiceStatus::Paid
                | InvoiceStatus::Overpaid
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    Standard,
    CreditNote,
}

string_enum!(InvoiceType, "invoice type", {
    Standard => "standard",
    CreditNote => "credit_note",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    Reversed,
}

string_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    Refunded => "refunded",
    Reversed => "reversed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    CreditCard,
    Check,
    Cash,
    Other,
}

string_enum!(PaymentMethod, "payment method", {
    BankTransfer => "bank_transfer",
    CreditCard => "credit_card",
    Check => "check",
    Cash => "cash",
    Other => "other",
});

/// Status of an invoice given its total and the sum of completed payments.
///
/// Conditions are checked in order and the first match wins, so any payment
/// sum within the tolerance counts as outstanding regardless of the total.
pub fn determine_invoice_status(total: Decimal, paid: Decimal) -> InvoiceStatus {
    let difference = paid - total;
    if paid <= PAYMENT_TOLERANCE {
        InvoiceStatus::Outstanding
    } else if difference < -PAYMENT_TOLERANCE {
        InvoiceStatus::PartiallyPaid
    } else if difference <= PAYMENT_TOLERANCE {
        InvoiceStatus::Paid
    } else {
        InvoiceStatus::Overpaid
    }
}

/// Status after a completed payment on an invoice currently in `current`.
///
/// A canceled invoice stays canceled.
pub fn reconcile_status(current: InvoiceStatus, total: Decimal, paid: Decimal) -> InvoiceStatus {
    if current.is_terminal() {
        return current;
    }
    determine_invoice_status(total, paid)
}

/// `paid / total * 100`, rounded to cents; `0` for a zero total.
pub fn payment_completion_percentage(total: Decimal, paid: Decimal) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }
    round_money(paid / total * Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn status_boundaries() {
        let total = d("1000");
        assert_eq!(determine_invoice_status(total, d("50")), InvoiceStatus::Outstanding);
        assert_eq!(determine_invoice_status(total, d("949")), InvoiceStatus::PartiallyPaid);
        assert_eq!(determine_invoice_status(total, d("950")), InvoiceStatus::Paid);
        assert_eq!(determine_invoice_status(total, d("1050")), InvoiceStatus::Paid);
        assert_eq!(determine_invoice_status(total, d("1050.01")), InvoiceStatus::Overpaid);
        assert_eq!(determine_invoice_status(total, d("0")), InvoiceStatus::Outstanding);
    }

    #[test]
    fn tiny_payments_are_outstanding_even_for_tiny_totals() {
        assert_eq!(determine_invoice_status(d("10"), d("10")), InvoiceStatus::Outstanding);
        assert_eq!(determine_invoice_status(d("10"), d("50.01")), InvoiceStatus::Paid);
    }

    #[test]
    fn canceled_is_never_reactivated() {
        assert_eq!(
            reconcile_status(InvoiceStatus::Canceled, d("100"), d("100")),
            InvoiceStatus::Canceled
        );
        assert_eq!(
            reconcile_status(InvoiceStatus::Concept, d("100"), d("100")),
            InvoiceStatus::Paid
        );
    }

    #[test]
    fn completion_percentage() {
        assert_eq!(payment_completion_percentage(d("0"), d("10")), Decimal::ZERO);
        assert_eq!(payment_completion_percentage(d("200"), d("50")), d("25.00"));
        assert_eq!(payment_completion_percentage(d("300"), d("100")), d("33.33"));
    }

    #[test]
    fn status_tags() {
        assert_eq!(InvoiceStatus::PartiallyPaid.as_str(), "partially_paid");
        assert_eq!("credit_note".parse::<InvoiceType>().unwrap(), InvoiceType::CreditNote);
        assert_eq!(
            serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(),
            "\"bank_transfer\""
        );
    }

    fn rank(status: InvoiceStatus) -> u8 {
        match status {
            InvoiceStatus::Outstanding => 0,
            InvoiceStatus::PartiallyPaid => 1,
            InvoiceStatus::Paid => 2,
            InvoiceStatus::Overpaid => 3,
            other => panic!("not a derived status: {other:?}"),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: paying more never moves an invoice to an earlier state.
        #[test]
        fn status_is_monotonic_in_paid(
            total_cents in 0i64..100_000_000i64,
            paid_cents in 0i64..100_000_000i64,
            extra_cents in 0i64..1_000_000i64,
        ) {
            let total = Decimal::new(total_cents, 2);
            let before = determine_invoice_status(total, Decimal::new(paid_cents, 2));
            let after = determine_invoice_status(total, Decimal::new(paid_cents + extra_cents, 2));
            prop_assert!(rank(after) >= rank(before));
        }
    }
}
