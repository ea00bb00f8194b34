//! Invoice number format: `INV-<YYYYMMDD>-<sequence, at least 4 digits>`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use carebill_core::{DomainError, DomainResult};

pub const INVOICE_NUMBER_PREFIX: &str = "INV";

/// An allocated invoice number and its per-day sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceNumber {
    pub number: String,
    pub date: NaiveDate,
    pub sequence: i32,
}

impl InvoiceNumber {
    /// The number following `max_sequence` on `date`.
    pub fn next_after(date: NaiveDate, max_sequence: i32) -> DomainResult<Self> {
        if max_sequence < 0 {
            return Err(DomainError::invariant(format!(
                "invoice sequence for {date} is negative: {max_sequence}"
            )));
        }
        let sequence = max_sequence
            .checked_add(1)
            .ok_or_else(|| DomainError::invariant(format!("invoice sequence for {date} overflowed")))?;
        Ok(Self {
            number: format_invoice_number(date, sequence),
            date,
            sequence,
        })
    }
}

impl core::fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.number)
    }
}

pub fn format_invoice_number(date: NaiveDate, sequence: i32) -> String {
    format!(
        "{}-{}-{:04}",
        INVOICE_NUMBER_PREFIX,
        date.format("%Y%m%d"),
        sequence
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    #[test]
    fn first_number_of_the_day() {
        let number = InvoiceNumber::next_after(test_date(), 0).unwrap();
        assert_eq!(number.number, "INV-20240701-0001");
        assert_eq!(number.sequence, 1);
    }

    #[test]
    fn pads_to_four_digits_and_grows_beyond() {
        assert_eq!(format_invoice_number(test_date(), 42), "INV-20240701-0042");
        assert_eq!(format_invoice_number(test_date(), 12345), "INV-20240701-12345");
    }

    #[test]
    fn sequential_allocations_never_repeat() {
        let mut max = 0;
        let mut seen = std::collections::HashSet::new();
        for _ in 0..50 {
            let number = InvoiceNumber::next_after(test_date(), max).unwrap();
            assert!(seen.insert(number.number.clone()));
            max = number.sequence;
        }
    }

    #[test]
    fn rejects_overflow() {
        assert!(InvoiceNumber::next_after(test_date(), i32::MAX).is_err());
    }
}
