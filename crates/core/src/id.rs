//! Strongly-typed identifiers used across the billing domain.
//!
//! The surrounding platform keys its rows by positive 64-bit integers, so the
//! newtypes wrap `i64` rather than UUIDs.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a care client (the party being invoiced for).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(i64);

/// Identifier of a care contract.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(i64);

/// Identifier of an invoicing sender (the billing recipient, e.g. a municipality).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(i64);

/// Identifier of an invoice.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(i64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(i64);

/// Identifier of an employee (the actor performing a write).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(i64);

macro_rules! impl_int_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create an identifier, rejecting non-positive values.
            pub fn new(raw: i64) -> Result<Self, DomainError> {
                if raw <= 0 {
                    return Err(DomainError::invalid_id(format!(
                        "{} must be positive, got {}",
                        $name, raw
                    )));
                }
                Ok(Self(raw))
            }

            /// Wrap a value read back from storage without validation.
            pub const fn from_raw(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(&self) -> i64 {
                self.0
            }

            pub const fn is_valid(&self) -> bool {
                self.0 > 0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = i64::from_str(s.trim())
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Self::new(raw)
            }
        }
    };
}

impl_int_newtype!(ClientId, "ClientId");
impl_int_newtype!(ContractId, "ContractId");
impl_int_newtype!(SenderId, "SenderId");
impl_int_newtype!(InvoiceId, "InvoiceId");
impl_int_newtype!(PaymentId, "PaymentId");
impl_int_newtype!(EmployeeId, "EmployeeId");
