//! Per-period price calculators.
//!
//! Every care type has exactly one calculator; [`calculator_for`] is the only
//! place that maps a care type to its pricing rules. Calculators are pure and
//! deterministic so that re-pricing or negating a priced period is exact.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use carebill_core::{round_money, DomainError, DomainResult};

use crate::care::{BillablePeriod, CareType, Contract, PriceTimeUnit};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// The price agreement a period is billed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceTerms {
    pub price: Decimal,
    pub unit: Option<PriceTimeUnit>,
    /// VAT percentage, e.g. `21`.
    pub vat_rate: Decimal,
}

impl PriceTerms {
    pub fn of(contract: &Contract) -> Self {
        Self {
            price: contract.price,
            unit: contract.price_time_unit,
            vat_rate: contract.vat,
        }
    }
}

/// What was consumed during a period.
///
/// `care_minutes` is only meaningful for appointment-billed care and is `0`
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodUsage {
    pub period: BillablePeriod,
    pub care_minutes: i64,
}

impl PeriodUsage {
    pub fn elapsed(period: BillablePeriod) -> Self {
        Self {
            period,
            care_minutes: 0,
        }
    }

    pub fn appointments(period: BillablePeriod, care_minutes: i64) -> Self {
        Self {
            period,
            care_minutes,
        }
    }
}

/// Descriptive measure printed next to a priced period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodMeasure {
    /// e.g. `"7 days"` or `"2 weeks"`; informational only.
    TimeFrame(String),
    TotalMinutes(i64),
}

/// Result of pricing one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedPeriod {
    pub period: BillablePeriod,
    pub pre_vat: Decimal,
    pub vat: Decimal,
    pub total: Decimal,
    pub measure: PeriodMeasure,
}

impl PricedPeriod {
    fn from_pre_vat(
        period: BillablePeriod,
        unrounded: Decimal,
        vat_rate: Decimal,
        measure: PeriodMeasure,
    ) -> Self {
        let pre_vat = round_money(unrounded);
        let vat = round_money(pre_vat * vat_rate / Decimal::ONE_HUNDRED);
        Self {
            period,
            pre_vat,
            vat,
            total: pre_vat + vat,
            measure,
        }
    }
}

/// Pricing rules of one care type.
pub trait PeriodCalculator: Send + Sync {
    fn care_type(&self) -> CareType;

    fn price(&self, terms: &PriceTerms, usage: &PeriodUsage) -> DomainResult<PricedPeriod>;
}

/// Time-accrued care: priced per started day of the period.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccommodationCalculator;

/// Appointment-duration care: priced per delivered minute or hour.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmbulanteCalculator;

/// The single dispatch point from care type to calculator.
pub fn calculator_for(care_type: CareType) -> &'static dyn PeriodCalculator {
    match care_type {
        CareType::Accommodation => &AccommodationCalculator,
        CareType::Ambulante => &AmbulanteCalculator,
    }
}

/// Price one period of a contract with the calculator of its care type.
pub fn price_period(
    care_type: CareType,
    terms: &PriceTerms,
    usage: &PeriodUsage,
) -> DomainResult<PricedPeriod> {
    calculator_for(care_type).price(terms, usage)
}

/// Number of started days in a period: `ceil(hours / 24)`.
pub fn billable_days(period: &BillablePeriod) -> i64 {
    let delta = period.end - period.start;
    let seconds = delta.num_seconds();
    let has_fraction = delta.subsec_nanos() > 0;
    let whole_days = seconds.div_euclid(SECONDS_PER_DAY);
    if seconds.rem_euclid(SECONDS_PER_DAY) > 0 || has_fraction {
        whole_days + 1
    } else {
        whole_days
    }
}

fn ensure_positive_price(terms: &PriceTerms) -> DomainResult<()> {
    if terms.price <= Decimal::ZERO {
        return Err(DomainError::validation("price must be greater than zero"));
    }
    Ok(())
}

fn unsupported(unit: PriceTimeUnit) -> DomainError {
    DomainError::validation(format!("unsupported price time unit: {unit}"))
}

impl PeriodCalculator for AccommodationCalculator {
    fn care_type(&self) -> CareType {
        CareType::Accommodation
    }

    fn price(&self, terms: &PriceTerms, usage: &PeriodUsage) -> DomainResult<PricedPeriod> {
        ensure_positive_price(terms)?;
        let unit = terms
            .unit
            .ok_or_else(|| DomainError::validation("price time unit must be specified"))?;

        let period = usage.period;
        if period.end < period.start {
            return Err(DomainError::validation(
                "billable period end cannot be before start",
            ));
        }

        let days = billable_days(&period);
        if days <= 0 {
            return Err(DomainError::validation(
                "billable period must be at least one day",
            ));
        }
        let day_count = Decimal::from(days);

        let (pre_vat, label) = match unit {
            PriceTimeUnit::Daily => (terms.price * day_count, format!("{days} days")),
            // Accrue the daily rate; the week count is only a label.
            PriceTimeUnit::Weekly => (
                terms.price * day_count / Decimal::from(7),
                format!("{} weeks", days / 7),
            ),
            other => return Err(unsupported(other)),
        };

        Ok(PricedPeriod::from_pre_vat(
            period,
            pre_vat,
            terms.vat_rate,
            PeriodMeasure::TimeFrame(label),
        ))
    }
}

impl PeriodCalculator for AmbulanteCalculator {
    fn care_type(&self) -> CareType {
        CareType::Ambulante
    }

    fn price(&self, terms: &PriceTerms, usage: &PeriodUsage) -> DomainResult<PricedPeriod> {
        ensure_positive_price(terms)?;
        if usage.care_minutes <= 0 {
            return Err(DomainError::validation(
                "total minutes must be greater than zero",
            ));
        }
        let unit = terms
            .unit
            .ok_or_else(|| DomainError::validation("price time unit must be specified"))?;
        let minutes = Decimal::from(usage.care_minutes);

        let pre_vat = match unit {
            PriceTimeUnit::Minute => terms.price * minutes,
            PriceTimeUnit::Hourly => terms.price * minutes / Decimal::from(60),
            other => return Err(unsupported(other)),
        };

        Ok(PricedPeriod::from_pre_vat(
            usage.period,
            pre_vat,
            terms.vat_rate,
            PeriodMeasure::TotalMinutes(usage.care_minutes),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn days_from_start(days: i64) -> BillablePeriod {
        BillablePeriod::new(test_time(), test_time() + Duration::days(days))
    }

    fn terms(price: &str, unit: PriceTimeUnit, vat: &str) -> PriceTerms {
        PriceTerms {
            price: d(price),
            unit: Some(unit),
            vat_rate: d(vat),
        }
    }

    fn expect_validation(result: DomainResult<PricedPeriod>, expected: &str) {
        match result {
            Err(DomainError::Validation(msg)) if msg == expected => {}
            other => panic!("expected Validation({expected:?}), got {other:?}"),
        }
    }

    #[test]
    fn accommodation_daily_prices_every_day() {
        let priced = price_period(
            CareType::Accommodation,
            &terms("100", PriceTimeUnit::Daily, "21"),
            &PeriodUsage::elapsed(days_from_start(7)),
        )
        .unwrap();

        assert_eq!(priced.pre_vat, d("700.00"));
        assert_eq!(priced.vat, d("147.00"));
        assert_eq!(priced.total, d("847.00"));
        assert_eq!(priced.measure, PeriodMeasure::TimeFrame("7 days".to_string()));
    }

    #[test]
    fn accommodation_weekly_accrues_daily_rate() {
        let priced = price_period(
            CareType::Accommodation,
            &terms("70", PriceTimeUnit::Weekly, "0"),
            &PeriodUsage::elapsed(days_from_start(14)),
        )
        .unwrap();

        assert_eq!(priced.pre_vat, d("140"));
        assert_eq!(priced.total, d("140"));
        assert_eq!(priced.measure, PeriodMeasure::TimeFrame("2 weeks".to_string()));
    }

    #[test]
    fn weekly_label_truncates_partial_weeks() {
        let priced = price_period(
            CareType::Accommodation,
            &terms("70", PriceTimeUnit::Weekly, "0"),
            &PeriodUsage::elapsed(days_from_start(10)),
        )
        .unwrap();

        assert_eq!(priced.pre_vat, d("100"));
        assert_eq!(priced.measure, PeriodMeasure::TimeFrame("1 weeks".to_string()));
    }

    #[test]
    fn started_days_are_rounded_up() {
        let period = BillablePeriod::new(test_time(), test_time() + Duration::hours(25));
        assert_eq!(billable_days(&period), 2);

        let period = BillablePeriod::new(test_time(), test_time() + Duration::hours(24));
        assert_eq!(billable_days(&period), 1);
    }

    #[test]
    fn accommodation_rejects_bad_input() {
        let usage = PeriodUsage::elapsed(days_from_start(3));

        expect_validation(
            AccommodationCalculator.price(&terms("0", PriceTimeUnit::Daily, "21"), &usage),
            "price must be greater than zero",
        );

        let no_unit = PriceTerms {
            unit: None,
            ..terms("10", PriceTimeUnit::Daily, "21")
        };
        expect_validation(
            AccommodationCalculator.price(&no_unit, &usage),
            "price time unit must be specified",
        );

        let inverted = PeriodUsage::elapsed(BillablePeriod::new(
            test_time(),
            test_time() - Duration::days(1),
        ));
        expect_validation(
            AccommodationCalculator.price(&terms("10", PriceTimeUnit::Daily, "21"), &inverted),
            "billable period end cannot be before start",
        );

        expect_validation(
            AccommodationCalculator.price(
                &terms("10", PriceTimeUnit::Daily, "21"),
                &PeriodUsage::elapsed(days_from_start(0)),
            ),
            "billable period must be at least one day",
        );

        expect_validation(
            AccommodationCalculator.price(&terms("10", PriceTimeUnit::Hourly, "21"), &usage),
            "unsupported price time unit: hourly",
        );
    }

    #[test]
    fn ambulante_hourly_prices_fraction_of_hours() {
        let priced = price_period(
            CareType::Ambulante,
            &terms("60", PriceTimeUnit::Hourly, "21"),
            &PeriodUsage::appointments(days_from_start(28), 120),
        )
        .unwrap();

        assert_eq!(priced.pre_vat, d("120.00"));
        assert_eq!(priced.vat, d("25.20"));
        assert_eq!(priced.total, d("145.20"));
        assert_eq!(priced.measure, PeriodMeasure::TotalMinutes(120));
    }

    #[test]
    fn ambulante_minute_prices_each_minute() {
        let priced = price_period(
            CareType::Ambulante,
            &terms("1.25", PriceTimeUnit::Minute, "9"),
            &PeriodUsage::appointments(days_from_start(1), 45),
        )
        .unwrap();

        assert_eq!(priced.pre_vat, d("56.25"));
        assert_eq!(priced.vat, d("5.06"));
        assert_eq!(priced.total, d("61.31"));
    }

    #[test]
    fn ambulante_rejects_bad_input() {
        let period = days_from_start(1);

        expect_validation(
            AmbulanteCalculator.price(
                &terms("60", PriceTimeUnit::Hourly, "21"),
                &PeriodUsage::appointments(period, 0),
            ),
            "total minutes must be greater than zero",
        );

        expect_validation(
            AmbulanteCalculator.price(
                &terms("60", PriceTimeUnit::Daily, "21"),
                &PeriodUsage::appointments(period, 30),
            ),
            "unsupported price time unit: daily",
        );

        expect_validation(
            AmbulanteCalculator.price(
                &terms("-1", PriceTimeUnit::Hourly, "21"),
                &PeriodUsage::appointments(period, 30),
            ),
            "price must be greater than zero",
        );
    }

    #[test]
    fn dispatch_selects_matching_calculator() {
        assert_eq!(calculator_for(CareType::Accommodation).care_type(), CareType::Accommodation);
        assert_eq!(calculator_for(CareType::Ambulante).care_type(), CareType::Ambulante);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: pricing is deterministic and totals are the sum of their parts.
        #[test]
        fn pricing_is_deterministic(
            cents in 1i64..10_000_000i64,
            vat in 0u32..30u32,
            days in 1i64..400i64,
            weekly in any::<bool>(),
        ) {
            let unit = if weekly { PriceTimeUnit::Weekly } else { PriceTimeUnit::Daily };
            let terms = PriceTerms {
                price: Decimal::new(cents, 2),
                unit: Some(unit),
                vat_rate: Decimal::from(vat),
            };
            let usage = PeriodUsage::elapsed(days_from_start(days));

            let first = price_period(CareType::Accommodation, &terms, &usage).unwrap();
            let second = price_period(CareType::Accommodation, &terms, &usage).unwrap();

            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.total, first.pre_vat + first.vat);
            prop_assert!(first.pre_vat.scale() <= 2);
        }

        /// Property: ambulante pre-VAT amount grows with delivered minutes.
        #[test]
        fn more_minutes_never_cost_less(
            cents in 1i64..100_000i64,
            minutes in 1i64..10_000i64,
            extra in 0i64..500i64,
        ) {
            let terms = PriceTerms {
                price: Decimal::new(cents, 2),
                unit: Some(PriceTimeUnit::Hourly),
                vat_rate: Decimal::from(21),
            };
            let period = days_from_start(28);
            let base = AmbulanteCalculator
                .price(&terms, &PeriodUsage::appointments(period, minutes))
                .unwrap();
            let more = AmbulanteCalculator
                .price(&terms, &PeriodUsage::appointments(period, minutes + extra))
                .unwrap();

            prop_assert!(more.pre_vat >= base.pre_vat);
        }
    }
}
