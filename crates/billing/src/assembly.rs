//! Invoice assembly as a fold over prefetched contract data.
//!
//! Collaborator lookups happen before assembly; their outcomes (including
//! failures) are handed in as plain values so that the aggregation itself is
//! a pure function of its input. Warnings and line positions follow input
//! order.

use rust_decimal::Decimal;

use crate::care::{total_minutes, Appointment, BillablePeriod, Contract};
use crate::document::{InvoiceDetailLine, InvoicePeriod};
use crate::pricing::{price_period, PeriodUsage, PriceTerms};

/// A period resolved for a contract, with the appointment lookup outcome for
/// appointment-billed care.
#[derive(Debug, Clone)]
pub struct PeriodInput {
    pub period: BillablePeriod,
    /// `None` when the care type does not bill appointments.
    pub appointments: Option<Result<Vec<Appointment>, String>>,
}

impl PeriodInput {
    pub fn elapsed(period: BillablePeriod) -> Self {
        Self {
            period,
            appointments: None,
        }
    }

    pub fn with_appointments(period: BillablePeriod, appointments: Result<Vec<Appointment>, String>) -> Self {
        Self {
            period,
            appointments: Some(appointments),
        }
    }
}

/// Everything known about one contract for this invoicing window.
#[derive(Debug, Clone)]
pub struct ContractInput {
    pub contract: Contract,
    /// Billable period resolution; an `Err` carries the lookup failure.
    pub periods: Result<Vec<PeriodInput>, String>,
}

/// Outcome of assembling an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assembly {
    pub lines: Vec<InvoiceDetailLine>,
    pub warning_count: u32,
    /// Warnings of contracts that produced no line.
    pub unattached_warnings: Vec<String>,
    pub pre_vat_total: Decimal,
    pub total: Decimal,
}

impl Assembly {
    /// Whether nothing could be billed.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Every warning in input order, attached or not.
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .flat_map(|l| l.warnings.iter())
            .chain(self.unattached_warnings.iter())
            .map(String::as_str)
    }

    fn absorb(mut self, outcome: ContractOutcome) -> Self {
        self.warning_count += outcome.warning_count;
        match outcome.line {
            Some(line) => {
                self.pre_vat_total += line.pre_vat_total;
                self.total += line.total;
                self.lines.push(line);
            }
            None => self.unattached_warnings.extend(outcome.warnings),
        }
        self
    }
}

#[derive(Debug, Default)]
struct ContractOutcome {
    line: Option<InvoiceDetailLine>,
    warnings: Vec<String>,
    warning_count: u32,
}

impl ContractOutcome {
    fn warn(&mut self, message: String) {
        self.warnings.push(message);
        self.warning_count += 1;
    }
}

/// Per-line accumulator threaded through a contract's periods.
#[derive(Debug, Default)]
struct LineTotals {
    periods: Vec<InvoicePeriod>,
    pre_vat: Decimal,
    vat: Decimal,
    total: Decimal,
}

/// Assemble detail lines and totals for a set of contracts.
pub fn assemble(contracts: &[ContractInput]) -> Assembly {
    contracts
        .iter()
        .map(assemble_contract)
        .fold(Assembly::default(), Assembly::absorb)
}

fn assemble_contract(input: &ContractInput) -> ContractOutcome {
    let contract = &input.contract;
    let mut outcome = ContractOutcome::default();

    let periods = match &input.periods {
        Ok(periods) => periods,
        Err(err) => {
            outcome.warn(format!(
                "failed to resolve billable periods for contract {}: {}",
                contract.id, err
            ));
            return outcome;
        }
    };

    if periods.is_empty() {
        return outcome;
    }

    if periods.len() > 1 {
        outcome.warn(format!(
            "multiple billable periods found for contract {}, make sure to verify contract details",
            contract.id
        ));
    }

    let terms = PriceTerms::of(contract);
    let totals = periods.iter().fold(LineTotals::default(), |mut totals, input| {
        let usage = match usage_for(contract, input) {
            Ok(usage) => usage,
            Err(warning) => {
                outcome.warn(warning);
                return totals;
            }
        };

        match price_period(contract.care_type, &terms, &usage) {
            Ok(priced) => {
                totals.periods.push(InvoicePeriod::from_priced(&priced));
                totals.pre_vat += priced.pre_vat;
                totals.vat += priced.vat;
                totals.total += priced.total;
            }
            Err(err) => outcome.warn(format!(
                "failed to calculate {} invoice total for contract {}: {}",
                contract.care_type,
                contract.id,
                err.message()
            )),
        }
        totals
    });

    if !totals.periods.is_empty() {
        outcome.line = Some(InvoiceDetailLine {
            contract_id: contract.id,
            contract_type: contract.care_type,
            periods: totals.periods,
            pre_vat_total: totals.pre_vat,
            total: totals.total,
            vat: contract.vat,
            vat_amount: Some(totals.vat),
            price: contract.price,
            price_time_unit: contract.price_time_unit,
            warnings: std::mem::take(&mut outcome.warnings),
        });
    }
    outcome
}

/// Derive what a period consumed, or the warning explaining why it cannot be priced.
fn usage_for(contract: &Contract, input: &PeriodInput) -> Result<PeriodUsage, String> {
    if !contract.care_type.bills_appointments() {
        return Ok(PeriodUsage::elapsed(input.period));
    }

    match &input.appointments {
        Some(Ok(appointments)) if !appointments.is_empty() => Ok(PeriodUsage::appointments(
            input.period,
            total_minutes(appointments),
        )),
        Some(Err(err)) => Err(format!(
            "failed to get appointments for contract {}: {}",
            contract.id, err
        )),
        _ => Err(format!(
            "no appointments found for ambulante contract {} in the specified date range",
            contract.id
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carebill_core::{ClientId, ContractId};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::str::FromStr;

    use crate::care::{CareType, PriceTimeUnit};

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap()
    }

    fn period(days: i64) -> BillablePeriod {
        BillablePeriod::new(test_time(), test_time() + Duration::days(days))
    }

    fn contract(id: i64, care_type: CareType, price: &str, unit: PriceTimeUnit) -> Contract {
        Contract {
            id: ContractId::from_raw(id),
            client_id: ClientId::from_raw(1),
            care_type,
            price: d(price),
            price_time_unit: Some(unit),
            vat: d("21"),
            start_date: test_time(),
            end_date: None,
            hours: None,
            hours_type: None,
            financing_act: None,
            financing_option: None,
        }
    }

    fn daily(id: i64, periods: Result<Vec<PeriodInput>, String>) -> ContractInput {
        ContractInput {
            contract: contract(id, CareType::Accommodation, "100", PriceTimeUnit::Daily),
            periods,
        }
    }

    fn appointment(start_hour: i64, minutes: i64) -> Appointment {
        let start = test_time() + Duration::hours(start_hour);
        Appointment {
            start,
            end: start + Duration::minutes(minutes),
        }
    }

    #[test]
    fn failed_period_lookup_skips_only_that_contract() {
        let inputs = vec![
            daily(1, Ok(vec![PeriodInput::elapsed(period(7))])),
            daily(2, Err("connection reset".to_string())),
            daily(3, Ok(vec![PeriodInput::elapsed(period(7))])),
        ];

        let assembly = assemble(&inputs);

        assert_eq!(assembly.lines.len(), 2);
        assert_eq!(assembly.warning_count, 1);
        assert_eq!(assembly.lines[0].contract_id, ContractId::from_raw(1));
        assert_eq!(assembly.lines[1].contract_id, ContractId::from_raw(3));
        assert_eq!(assembly.total, d("1694.00"));
        assert_eq!(assembly.pre_vat_total, d("1400.00"));
        assert_eq!(
            assembly.unattached_warnings,
            vec!["failed to resolve billable periods for contract 2: connection reset".to_string()]
        );
    }

    #[test]
    fn contracts_without_periods_are_skipped_silently() {
        let assembly = assemble(&[daily(1, Ok(vec![])), daily(2, Ok(vec![]))]);
        assert!(assembly.is_empty());
        assert_eq!(assembly.warning_count, 0);
    }

    #[test]
    fn multiple_periods_warn_but_are_all_priced() {
        let inputs = vec![daily(
            5,
            Ok(vec![PeriodInput::elapsed(period(2)), PeriodInput::elapsed(period(3))]),
        )];

        let assembly = assemble(&inputs);

        assert_eq!(assembly.warning_count, 1);
        let line = &assembly.lines[0];
        assert_eq!(line.periods.len(), 2);
        assert_eq!(line.pre_vat_total, d("500.00"));
        assert_eq!(line.vat_amount, Some(d("105.00")));
        assert_eq!(line.total, d("605.00"));
        assert_eq!(
            line.warnings,
            vec!["multiple billable periods found for contract 5, make sure to verify contract details".to_string()]
        );
    }

    #[test]
    fn bad_period_warns_and_keeps_the_rest_of_the_line() {
        let inputs = vec![daily(
            8,
            Ok(vec![PeriodInput::elapsed(period(0)), PeriodInput::elapsed(period(1))]),
        )];

        let assembly = assemble(&inputs);

        assert_eq!(assembly.warning_count, 2);
        let line = &assembly.lines[0];
        assert_eq!(line.periods.len(), 1);
        assert_eq!(
            line.warnings[1],
            "failed to calculate accommodation invoice total for contract 8: billable period must be at least one day"
        );
    }

    #[test]
    fn ambulante_sums_appointment_minutes_per_period() {
        let inputs = vec![ContractInput {
            contract: contract(4, CareType::Ambulante, "60", PriceTimeUnit::Hourly),
            periods: Ok(vec![PeriodInput::with_appointments(
                period(28),
                Ok(vec![appointment(9, 90), appointment(30, 30)]),
            )]),
        }];

        let assembly = assemble(&inputs);

        let line = &assembly.lines[0];
        assert_eq!(line.periods[0].ambulante_total_minutes, Some(120));
        assert_eq!(line.total, d("145.20"));
        assert_eq!(assembly.warning_count, 0);
    }

    #[test]
    fn ambulante_without_appointments_is_a_warning() {
        let inputs = vec![
            ContractInput {
                contract: contract(4, CareType::Ambulante, "60", PriceTimeUnit::Hourly),
                periods: Ok(vec![PeriodInput::with_appointments(period(28), Ok(vec![]))]),
            },
            ContractInput {
                contract: contract(6, CareType::Ambulante, "60", PriceTimeUnit::Hourly),
                periods: Ok(vec![PeriodInput::with_appointments(
                    period(28),
                    Err("timeout".to_string()),
                )]),
            },
        ];

        let assembly = assemble(&inputs);

        assert!(assembly.is_empty());
        assert_eq!(assembly.warning_count, 2);
        let warnings: Vec<&str> = assembly.warnings().collect();
        assert_eq!(
            warnings,
            vec![
                "no appointments found for ambulante contract 4 in the specified date range",
                "failed to get appointments for contract 6: timeout",
            ]
        );
    }

    #[test]
    fn unsupported_unit_for_care_type_is_recoverable() {
        let inputs = vec![
            ContractInput {
                contract: contract(2, CareType::Accommodation, "100", PriceTimeUnit::Monthly),
                periods: Ok(vec![PeriodInput::elapsed(period(7))]),
            },
            daily(3, Ok(vec![PeriodInput::elapsed(period(1))])),
        ];

        let assembly = assemble(&inputs);

        assert_eq!(assembly.lines.len(), 1);
        assert_eq!(assembly.warning_count, 1);
        assert_eq!(
            assembly.unattached_warnings[0],
            "failed to calculate accommodation invoice total for contract 2: unsupported price time unit: monthly"
        );
    }
}
