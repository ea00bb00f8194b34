//! Shared Postgres helpers.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate invoice number or `(sequence_date, invoice_sequence)` |
//! | Database (foreign key violation) | `23503` | `Backend` | Payment for a deleted invoice, dangling credit-note link |
//! | Database (check constraint violation) | `23514` | `Backend` | Non-positive sequence or amount |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | RowNotFound | N/A | `NotFound` | `fetch_one` on a missing row |
//! | ColumnDecode / Decode | N/A | `Serialization` | Unexpected column contents |
//! | Other | N/A | `Backend` | Pool closed, network errors, etc. |

use sqlx::PgPool;

use crate::error::StoreError;

const SCHEMA: &str = include_str!("../migrations/0001_billing.sql");

/// Apply the billing schema. Statements are idempotent.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    Ok(())
}

/// Map SQLx errors to StoreError.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") | Some("23514") => StoreError::Backend(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => {
            StoreError::NotFound(format!("row not found in {}", operation))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Serialization(format!("decode error in {}: {}", operation, err))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Check if an error is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

/// Parse a text column holding one of the billing string tags.
pub(crate) fn parse_tag<T>(column: &str, raw: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr<Err = carebill_core::DomainError>,
{
    raw.parse::<T>()
        .map_err(|e| StoreError::Serialization(format!("column {column}: {}", e.message())))
}
