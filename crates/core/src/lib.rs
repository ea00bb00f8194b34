//! `carebill-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod money;

pub use error::{DomainError, DomainResult};
pub use id::{ClientId, ContractId, EmployeeId, InvoiceId, PaymentId, SenderId};
pub use money::{ensure_money_scale, round_money, sum_money, MONEY_SCALE};
