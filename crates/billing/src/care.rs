//! Care contracts and the data the calculators price.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use carebill_core::{ClientId, ContractId, SenderId};

/// Generates `as_str`, `Display` and `FromStr` for a closed set of
/// snake_case string tags.
macro_rules! string_enum {
    ($t:ident, $what:literal, { $($variant:ident => $tag:literal),+ $(,)? }) => {
        impl $t {
            pub const ALL: &'static [$t] = &[$($t::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($t::$variant => $tag),+
                }
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $t {
            type Err = carebill_core::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok($t::$variant),)+
                    other => Err(carebill_core::DomainError::validation(format!(
                        "unsupported {}: {}",
                        $what, other
                    ))),
                }
            }
        }
    };
}

pub(crate) use string_enum;

/// Care-delivery model of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareType {
    /// Billed by elapsed time (daily/weekly accrual).
    Accommodation,
    /// Billed by summed appointment duration.
    Ambulante,
}

string_enum!(CareType, "care type", {
    Accommodation => "accommodation",
    Ambulante => "ambulante",
});

impl CareType {
    /// Whether pricing needs the client's appointments for each period.
    pub fn bills_appointments(&self) -> bool {
        matches!(self, CareType::Ambulante)
    }
}

/// Unit a contract price is denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTimeUnit {
    Minute,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

string_enum!(PriceTimeUnit, "price time unit", {
    Minute => "minute",
    Hourly => "hourly",
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
    Yearly => "yearly",
});

/// A client's care contract, as far as billing is concerned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub client_id: ClientId,
    pub care_type: CareType,
    pub price: Decimal,
    /// `None` when the contract was stored without a unit.
    pub price_time_unit: Option<PriceTimeUnit>,
    /// VAT percentage, e.g. `21` for 21%.
    pub vat: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub hours: Option<Decimal>,
    pub hours_type: Option<String>,
    pub financing_act: Option<String>,
    pub financing_option: Option<String>,
}

/// Half-open interval `[start, end)` owed for billing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillablePeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BillablePeriod {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// A scheduled appointment of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Appointment {
    /// Whole minutes between start and end; never negative.
    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes().max(0)
    }
}

/// Sum of appointment durations in minutes.
pub fn total_minutes(appointments: &[Appointment]) -> i64 {
    appointments.iter().map(Appointment::minutes).sum()
}

/// The party an invoice is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: SenderId,
    pub name: String,
}

/// Client master data that invoice templates may print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDetails {
    pub client_id: ClientId,
    pub date_of_birth: Option<NaiveDate>,
    pub filenumber: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use carebill_core::DomainError;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
    }

    #[test]
    fn parses_known_tags_only() {
        assert_eq!("ambulante".parse::<CareType>().unwrap(), CareType::Ambulante);
        assert_eq!("weekly".parse::<PriceTimeUnit>().unwrap(), PriceTimeUnit::Weekly);

        match "fortnightly".parse::<PriceTimeUnit>() {
            Err(DomainError::Validation(msg)) if msg == "unsupported price time unit: fortnightly" => {}
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn tags_round_trip_through_serde() {
        for unit in PriceTimeUnit::ALL {
            let json = serde_json::to_string(unit).unwrap();
            assert_eq!(json, format!("\"{}\"", unit.as_str()));
        }
    }

    #[test]
    fn sums_appointment_minutes() {
        let appointments = vec![
            Appointment { start: at(9, 0), end: at(10, 30) },
            Appointment { start: at(14, 0), end: at(14, 45) },
            // Inverted entries contribute nothing.
            Appointment { start: at(16, 0), end: at(15, 0) },
        ];
        assert_eq!(total_minutes(&appointments), 135);
    }

    #[test]
    fn period_is_half_open() {
        let period = BillablePeriod::new(at(0, 0), at(12, 0));
        assert!(period.contains(at(0, 0)));
        assert!(!period.contains(at(12, 0)));
    }
}
