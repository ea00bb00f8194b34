//! Money helpers.
//!
//! All amounts are `Decimal` in a single currency. Anything that lands on an
//! invoice is rounded to cents, half away from zero, so that negating a
//! rounded value yields exactly the negation of the unrounded one rounded.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// Decimal places kept for currency amounts.
pub const MONEY_SCALE: u32 = 2;

/// Round a currency amount to cents.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Reject amounts with fractions of a cent; `10.000` passes, `10.005` does not.
pub fn ensure_money_scale(field: &str, amount: Decimal) -> DomainResult<()> {
    if round_money(amount) != amount {
        return Err(DomainError::validation(format!(
            "{field} {amount} has more than {MONEY_SCALE} decimal places"
        )));
    }
    Ok(())
}

/// Sum a sequence of amounts.
pub fn sum_money<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().fold(Decimal::ZERO, |acc, a| acc + a)
}
