//! Postgres-backed care data reads.
//!
//! Reads the platform's `client_details`, `senders`, `contracts`,
//! `appointments` and invoice template tables. Nothing here writes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Row};
use tracing::{instrument, Span};

use carebill_billing::{
    render_template_items, Appointment, BillablePeriod, CareType, ClientDetails, Contract,
    ExtraContent, PriceTimeUnit, Sender, TemplateItem, TemplateSource,
};
use carebill_core::{ClientId, ContractId, SenderId};

use super::r#trait::CareRecords;
use crate::error::StoreError;
use crate::pg::{map_sqlx_error, parse_tag};
use crate::query::Pagination;

const CONTRACT_COLUMNS: &str = r#"
    id, client_id, care_type, price, price_time_unit, vat, start_date, end_date,
    hours, hours_type, financing_act, financing_option
"#;

#[derive(Debug, Clone)]
pub struct PostgresCareRecords {
    pool: Arc<PgPool>,
}

impl PostgresCareRecords {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn contract_by_id(&self, contract_id: ContractId) -> Result<Option<Contract>, StoreError> {
        let sql = format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(contract_id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("contract_by_id", e))?;

        row.map(|row| {
            ContractRow::from_row(&row)
                .map_err(|e| map_sqlx_error("contract_by_id", e))
                .and_then(Contract::try_from)
        })
        .transpose()
    }

    async fn client_details(&self, client_id: ClientId) -> Result<Option<ClientDetails>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, date_of_birth, filenumber
            FROM client_details
            WHERE id = $1
            "#,
        )
        .bind(client_id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("client_details", e))?;

        row.map(|row| -> Result<ClientDetails, sqlx::Error> {
            Ok(ClientDetails {
                client_id: ClientId::from_raw(row.try_get("id")?),
                date_of_birth: row.try_get::<Option<NaiveDate>, _>("date_of_birth")?,
                filenumber: row.try_get("filenumber")?,
            })
        })
        .transpose()
        .map_err(|e| map_sqlx_error("client_details", e))
    }
}

#[async_trait]
impl CareRecords for PostgresCareRecords {
    #[instrument(skip(self), fields(operation = tracing::field::Empty, client_id = %client_id), err)]
    async fn client_sender(&self, client_id: ClientId) -> Result<Option<Sender>, StoreError> {
        Span::current().record("operation", "client_sender");

        let row = sqlx::query(
            r#"
            SELECT s.id, s.name
            FROM client_details cd
            JOIN senders s ON s.id = cd.sender_id
            WHERE cd.id = $1
            "#,
        )
        .bind(client_id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("client_sender", e))?;

        row.map(|row| -> Result<Sender, sqlx::Error> {
            Ok(Sender {
                id: SenderId::from_raw(row.try_get("id")?),
                name: row.try_get("name")?,
            })
        })
        .transpose()
        .map_err(|e| map_sqlx_error("client_sender", e))
    }

    #[instrument(skip(self), fields(operation = tracing::field::Empty, client_id = %client_id, limit = page.limit), err)]
    async fn list_client_contracts(
        &self,
        client_id: ClientId,
        page: Pagination,
    ) -> Result<Vec<Contract>, StoreError> {
        Span::current().record("operation", "list_client_contracts");

        let sql = format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE client_id = $1 ORDER BY id ASC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&sql)
            .bind(client_id.get())
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_client_contracts", e))?;

        rows.iter()
            .map(|row| {
                ContractRow::from_row(row)
                    .map_err(|e| map_sqlx_error("list_client_contracts", e))
                    .and_then(Contract::try_from)
            })
            .collect()
    }

    #[instrument(skip(self), fields(operation = tracing::field::Empty, contract_id = %contract_id), err)]
    async fn billable_periods_for_contract(
        &self,
        contract_id: ContractId,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<BillablePeriod>, StoreError> {
        Span::current().record("operation", "billable_periods_for_contract");

        // The contract lifetime clipped to the window; open-ended contracts run to its end.
        let rows = sqlx::query(
            r#"
            SELECT
                GREATEST(c.start_date, $2) AS period_start,
                LEAST(COALESCE(c.end_date, $3), $3) AS period_end
            FROM contracts c
            WHERE c.id = $1
              AND c.start_date < $3
              AND COALESCE(c.end_date, $3) > $2
            "#,
        )
        .bind(contract_id.get())
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("billable_periods_for_contract", e))?;

        rows.iter()
            .map(|row| {
                Ok(BillablePeriod::new(
                    row.try_get("period_start")?,
                    row.try_get("period_end")?,
                ))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("billable_periods_for_contract", e))
    }

    #[instrument(skip(self), fields(operation = tracing::field::Empty, appointment_count = tracing::field::Empty, client_id = %client_id), err)]
    async fn appointments_starting_in_range(
        &self,
        client_id: ClientId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        Span::current().record("operation", "appointments_starting_in_range");

        let rows = sqlx::query(
            r#"
            SELECT start_time, end_time
            FROM appointments
            WHERE client_id = $1 AND start_time >= $2 AND start_time < $3
            ORDER BY start_time ASC
            "#,
        )
        .bind(client_id.get())
        .bind(start)
        .bind(end)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("appointments_starting_in_range", e))?;

        let appointments = rows
            .iter()
            .map(|row| {
                Ok(Appointment {
                    start: row.try_get("start_time")?,
                    end: row.try_get("end_time")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("appointments_starting_in_range", e))?;

        Span::current().record("appointment_count", appointments.len());
        Ok(appointments)
    }

    #[instrument(skip(self), fields(operation = tracing::field::Empty, client_id = %client_id, contract_id = %contract_id, sender_id = %sender_id), err)]
    async fn invoice_template_items(
        &self,
        client_id: ClientId,
        contract_id: ContractId,
        sender_id: SenderId,
    ) -> Result<ExtraContent, StoreError> {
        Span::current().record("operation", "invoice_template_items");

        let rows = sqlx::query(
            r#"
            SELECT ti.description, ti.source_table, ti.source_column
            FROM sender_invoice_templates t
            JOIN invoice_template_items ti ON ti.id = t.template_item_id
            WHERE t.sender_id = $1
            ORDER BY ti.id ASC
            "#,
        )
        .bind(sender_id.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("invoice_template_items", e))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let description: String = row
                .try_get("description")
                .map_err(|e| map_sqlx_error("invoice_template_items", e))?;
            let table: String = row
                .try_get("source_table")
                .map_err(|e| map_sqlx_error("invoice_template_items", e))?;
            let column: String = row
                .try_get("source_column")
                .map_err(|e| map_sqlx_error("invoice_template_items", e))?;
            if let Some(source) = TemplateSource::from_columns(&table, &column) {
                items.push(TemplateItem {
                    description,
                    source,
                });
            }
        }
        if items.is_empty() {
            return Ok(ExtraContent::new());
        }

        let client = if items.iter().any(|i| i.source.reads_client_details()) {
            self.client_details(client_id).await?
        } else {
            None
        };
        let contract = if items.iter().any(|i| !i.source.reads_client_details()) {
            self.contract_by_id(contract_id).await?
        } else {
            None
        };

        Ok(render_template_items(&items, client.as_ref(), contract.as_ref())?)
    }

    #[instrument(skip(self), fields(operation = tracing::field::Empty), err)]
    async fn list_client_ids(&self) -> Result<Vec<ClientId>, StoreError> {
        Span::current().record("operation", "list_client_ids");

        let rows = sqlx::query("SELECT DISTINCT client_id FROM contracts ORDER BY client_id ASC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_client_ids", e))?;

        rows.iter()
            .map(|row| row.try_get::<i64, _>("client_id").map(ClientId::from_raw))
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("list_client_ids", e))
    }
}

// SQLx row types

#[derive(Debug)]
struct ContractRow {
    id: i64,
    client_id: i64,
    care_type: String,
    price: Decimal,
    price_time_unit: Option<String>,
    vat: Decimal,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    hours: Option<Decimal>,
    hours_type: Option<String>,
    financing_act: Option<String>,
    financing_option: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ContractRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ContractRow {
            id: row.try_get("id")?,
            client_id: row.try_get("client_id")?,
            care_type: row.try_get("care_type")?,
            price: row.try_get("price")?,
            price_time_unit: row.try_get("price_time_unit")?,
            vat: row.try_get("vat")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            hours: row.try_get("hours")?,
            hours_type: row.try_get("hours_type")?,
            financing_act: row.try_get("financing_act")?,
            financing_option: row.try_get("financing_option")?,
        })
    }
}

impl TryFrom<ContractRow> for Contract {
    type Error = StoreError;

    fn try_from(row: ContractRow) -> Result<Self, Self::Error> {
        let care_type: CareType = parse_tag("care_type", &row.care_type)?;
        // An unknown unit is priced as a missing one, which warns per contract.
        let price_time_unit = row
            .price_time_unit
            .as_deref()
            .map(str::trim)
            .filter(|unit| !unit.is_empty())
            .and_then(|unit| match unit.parse::<PriceTimeUnit>() {
                Ok(unit) => Some(unit),
                Err(_) => {
                    tracing::warn!(contract_id = row.id, unit, "unsupported price time unit on contract");
                    None
                }
            });

        Ok(Contract {
            id: ContractId::from_raw(row.id),
            client_id: ClientId::from_raw(row.client_id),
            care_type,
            price: row.price,
            price_time_unit,
            vat: row.vat,
            start_date: row.start_date,
            end_date: row.end_date,
            hours: row.hours,
            hours_type: row.hours_type,
            financing_act: row.financing_act,
            financing_option: row.financing_option,
        })
    }
}
