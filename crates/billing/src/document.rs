//! The persisted invoice detail document.
//!
//! Details are stored as a JSON array of [`InvoiceDetailLine`] next to an
//! explicit schema version. Version 1 is the current shape; documents written
//! with the legacy field names (`contract_name`, `pre_vat_total_price`,
//! `total_price`, numeric amounts, no `vat_amount`) are still readable.
//! Unversioned documents may also hold zero-valued placeholder entries for
//! contracts that were skipped; those are dropped on read.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use carebill_core::{ensure_money_scale, sum_money, ContractId, DomainError, DomainResult};

use crate::care::{CareType, PriceTimeUnit};
use crate::pricing::{PeriodMeasure, PricedPeriod};

/// Schema version written for new documents.
pub const DETAILS_SCHEMA_VERSION: i32 = 1;

/// A priced period as printed on the invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePeriod {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accommodation_time_frame: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ambulante_total_minutes: Option<i64>,
}

impl InvoicePeriod {
    pub fn from_priced(priced: &PricedPeriod) -> Self {
        let (time_frame, minutes) = match &priced.measure {
            PeriodMeasure::TimeFrame(label) => (Some(label.clone()), None),
            PeriodMeasure::TotalMinutes(minutes) => (None, Some(*minutes)),
        };
        Self {
            start_date: priced.period.start,
            end_date: priced.period.end,
            accommodation_time_frame: time_frame,
            ambulante_total_minutes: minutes,
        }
    }
}

/// One contract's share of an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDetailLine {
    pub contract_id: ContractId,
    #[serde(alias = "contract_name")]
    pub contract_type: CareType,
    #[serde(deserialize_with = "null_as_empty")]
    pub periods: Vec<InvoicePeriod>,
    #[serde(alias = "pre_vat_total_price")]
    pub pre_vat_total: Decimal,
    #[serde(alias = "total_price")]
    pub total: Decimal,
    /// VAT percentage the line was priced with.
    pub vat: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vat_amount: Option<Decimal>,
    /// Contract unit price; carried for display, not additive.
    pub price: Decimal,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub price_time_unit: Option<PriceTimeUnit>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub warnings: Vec<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<PriceTimeUnit>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: DomainError| serde::de::Error::custom(e.message())),
    }
}

impl InvoiceDetailLine {
    /// VAT amount of the line; derived for legacy documents that did not store it.
    pub fn vat_amount(&self) -> Decimal {
        self.vat_amount
            .unwrap_or(self.total - self.pre_vat_total)
    }
}

/// Sum of line totals.
pub fn details_total(lines: &[InvoiceDetailLine]) -> Decimal {
    sum_money(lines.iter().map(|l| l.total))
}

/// Invariant: a declared invoice total equals the sum of its line totals.
pub fn verify_total_amount(declared: Decimal, lines: &[InvoiceDetailLine]) -> DomainResult<()> {
    let computed = details_total(lines);
    if declared != computed {
        return Err(DomainError::invariant(format!(
            "total amount {declared} does not match sum of detail totals {computed}"
        )));
    }
    Ok(())
}

/// Structural checks for externally supplied detail lines.
///
/// Every period must carry exactly the measure of its line's care type, and
/// line amounts must be whole cents.
pub fn validate_details(lines: &[InvoiceDetailLine]) -> DomainResult<()> {
    for line in lines {
        if !line.contract_id.is_valid() {
            return Err(DomainError::invalid_id(format!(
                "detail line has invalid contract id {}",
                line.contract_id
            )));
        }
        ensure_money_scale("line pre-VAT total", line.pre_vat_total)?;
        ensure_money_scale("line total", line.total)?;
        if let Some(vat_amount) = line.vat_amount {
            ensure_money_scale("line VAT amount", vat_amount)?;
        }
        for period in &line.periods {
            if period.end_date < period.start_date {
                return Err(DomainError::validation(format!(
                    "period end cannot be before start on contract {}",
                    line.contract_id
                )));
            }
            let well_formed = match line.contract_type {
                CareType::Accommodation => {
                    period.accommodation_time_frame.is_some()
                        && period.ambulante_total_minutes.is_none()
                }
                CareType::Ambulante => {
                    period.ambulante_total_minutes.is_some()
                        && period.accommodation_time_frame.is_none()
                }
            };
            if !well_formed {
                return Err(DomainError::validation(format!(
                    "period of {} contract {} must carry exactly one {} measure",
                    line.contract_type, line.contract_id, line.contract_type
                )));
            }
        }
    }
    Ok(())
}

/// Serialize lines for storage under [`DETAILS_SCHEMA_VERSION`].
pub fn encode_details(lines: &[InvoiceDetailLine]) -> DomainResult<JsonValue> {
    serde_json::to_value(lines)
        .map_err(|e| DomainError::validation(format!("failed to encode invoice details: {e}")))
}

/// Parse a stored detail document written under `schema_version`.
///
/// Version `0` marks documents written before versioning existed; they share
/// the current shape modulo the legacy aliases, and entries with contract id
/// `0` are placeholders for skipped contracts.
pub fn decode_details(schema_version: i32, value: JsonValue) -> DomainResult<Vec<InvoiceDetailLine>> {
    if !(0..=DETAILS_SCHEMA_VERSION).contains(&schema_version) {
        return Err(DomainError::validation(format!(
            "unsupported invoice details schema version {schema_version}"
        )));
    }
    let value = match value {
        JsonValue::Null => return Ok(Vec::new()),
        JsonValue::Array(entries) if schema_version == 0 => JsonValue::Array(
            entries
                .into_iter()
                .filter(|entry| entry.get("contract_id").and_then(JsonValue::as_i64) != Some(0))
                .collect(),
        ),
        other => other,
    };
    serde_json::from_value(value)
        .map_err(|e| DomainError::validation(format!("failed to decode invoice details: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn accommodation_line() -> InvoiceDetailLine {
        InvoiceDetailLine {
            contract_id: ContractId::from_raw(11),
            contract_type: CareType::Accommodation,
            periods: vec![InvoicePeriod {
                start_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                end_date: Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
                accommodation_time_frame: Some("7 days".to_string()),
                ambulante_total_minutes: None,
            }],
            pre_vat_total: d("700.00"),
            total: d("847.00"),
            vat: d("21"),
            vat_amount: Some(d("147.00")),
            price: d("100.00"),
            price_time_unit: Some(PriceTimeUnit::Daily),
            warnings: vec!["multiple billable periods found for contract 11".to_string()],
        }
    }

    #[test]
    fn reserialization_is_lossless() {
        let lines = vec![accommodation_line()];
        let encoded = encode_details(&lines).unwrap();
        let text = serde_json::to_string(&encoded).unwrap();

        let decoded = decode_details(DETAILS_SCHEMA_VERSION, serde_json::from_str(&text).unwrap()).unwrap();
        assert_eq!(decoded, lines);
        let again = serde_json::to_string(&encode_details(&decoded).unwrap()).unwrap();
        assert_eq!(again, text);
    }

    #[test]
    fn writes_only_the_measure_of_the_care_type() {
        let encoded = encode_details(&[accommodation_line()]).unwrap();
        let period = &encoded[0]["periods"][0];
        assert_eq!(period["accommodation_time_frame"], json!("7 days"));
        assert!(period.get("ambulante_total_minutes").is_none());
        assert_eq!(encoded[0]["total"], json!("847.00"));
    }

    #[test]
    fn reads_legacy_documents() {
        let legacy = json!([{
            "contract_id": 3,
            "contract_name": "ambulante",
            "periods": [{
                "start_date": "2024-02-01T00:00:00Z",
                "end_date": "2024-02-29T00:00:00Z",
                "ambulante_total_minutes": 120
            }],
            "pre_vat_total_price": 120,
            "total_price": 145.2,
            "vat": 21,
            "price": 60,
            "price_time_unit": "hourly"
        }]);

        let lines = decode_details(0, legacy).unwrap();
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line.contract_type, CareType::Ambulante);
        assert_eq!(line.total, d("145.2"));
        assert_eq!(line.vat_amount(), d("25.2"));
        assert!(line.warnings.is_empty());
    }

    #[test]
    fn drops_placeholders_for_skipped_contracts() {
        let legacy = json!([
            {
                "contract_id": 11,
                "contract_name": "accommodation",
                "periods": [{
                    "start_date": "2024-01-01T00:00:00Z",
                    "end_date": "2024-01-08T00:00:00Z",
                    "accommodation_time_frame": "7 days"
                }],
                "pre_vat_total_price": 700,
                "total_price": 847,
                "vat": 21,
                "price": 100,
                "price_time_unit": "daily",
                "warnings": null
            },
            {
                "contract_id": 0,
                "contract_name": "",
                "periods": null,
                "pre_vat_total_price": 0,
                "total_price": 0,
                "vat": 0,
                "price": 0,
                "price_time_unit": "",
                "warnings": null
            }
        ]);

        let lines = decode_details(0, legacy).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].contract_id, ContractId::from_raw(11));
        assert_eq!(lines[0].price_time_unit, Some(PriceTimeUnit::Daily));
        assert!(lines[0].warnings.is_empty());
        assert_eq!(lines[0].total, d("847"));
    }

    #[test]
    fn reads_blank_units_and_null_lists_as_empty() {
        let legacy = json!([{
            "contract_id": 5,
            "contract_name": "ambulante",
            "periods": null,
            "pre_vat_total_price": 0,
            "total_price": 0,
            "vat": 0,
            "price": 60,
            "price_time_unit": " ",
            "warnings": ["contract 5 has no price time unit"]
        }]);

        let lines = decode_details(0, legacy).unwrap();
        assert!(lines[0].periods.is_empty());
        assert_eq!(lines[0].price_time_unit, None);
        assert_eq!(lines[0].warnings.len(), 1);
    }

    #[test]
    fn rejects_unknown_units() {
        let mut encoded = encode_details(&[accommodation_line()]).unwrap();
        encoded[0]["price_time_unit"] = json!("fortnightly");
        match decode_details(DETAILS_SCHEMA_VERSION, encoded) {
            Err(DomainError::Validation(msg)) if msg.contains("fortnightly") => {}
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn rejects_future_schema_versions() {
        match decode_details(DETAILS_SCHEMA_VERSION + 1, json!([])) {
            Err(DomainError::Validation(msg)) if msg.contains("schema version") => {}
            other => panic!("expected Validation, got {other:?}"),
        }
        assert!(decode_details(1, JsonValue::Null).unwrap().is_empty());
    }

    #[test]
    fn verifies_declared_total() {
        let lines = vec![accommodation_line(), accommodation_line()];
        assert!(verify_total_amount(d("1694.00"), &lines).is_ok());

        match verify_total_amount(d("1694.01"), &lines) {
            Err(DomainError::InvariantViolation(msg)) if msg.contains("1694.01") => {}
            other => panic!("expected InvariantViolation, got {other:?}"),
        }
    }

    #[test]
    fn validates_period_measures() {
        let mut line = accommodation_line();
        assert!(validate_details(std::slice::from_ref(&line)).is_ok());

        line.periods[0].ambulante_total_minutes = Some(30);
        assert!(validate_details(&[line]).is_err());
    }

    #[test]
    fn rejects_sub_cent_line_amounts() {
        let mut line = accommodation_line();
        line.total = d("847.005");
        match validate_details(&[line]) {
            Err(DomainError::Validation(msg)) if msg.contains("line total") => {}
            other => panic!("expected Validation, got {other:?}"),
        }
    }
}
