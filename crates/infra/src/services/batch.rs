//! Periodic invoice generation for every client.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use carebill_core::EmployeeId;

use super::assembler::InvoiceAssembler;
use crate::care_records::CareRecords;
use crate::clock::Clock;
use crate::config::BillingConfig;
use crate::error::{BillingError, BillingResult};
use crate::invoice_store::InvoiceStore;

/// Per-run counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub generated: u32,
    /// Clients with nothing to bill (no sender, contracts or billable items).
    pub skipped: u32,
    pub failed: u32,
}

pub struct BatchInvoiceRun<R, S, C> {
    records: R,
    assembler: InvoiceAssembler<R, S, C>,
    window: chrono::Duration,
    interval_weeks: u32,
}

impl<R, S, C> BatchInvoiceRun<R, S, C>
where
    R: CareRecords + Clone,
    S: InvoiceStore,
    C: Clock,
{
    pub fn new(records: R, store: S, clock: C, config: BillingConfig) -> Self {
        Self {
            window: config.batch_window(),
            interval_weeks: config.batch_interval_weeks.max(1),
            assembler: InvoiceAssembler::new(records.clone(), store, clock, config),
            records,
        }
    }

    /// Runs happen on Mondays of every `interval_weeks`-th ISO week.
    pub fn is_due(&self, today: NaiveDate) -> bool {
        let interval = self.interval_weeks;
        today.weekday() == Weekday::Mon && today.iso_week().week() % interval == 1 % interval
    }

    /// Generate invoices for `[today - window, today)` when a run is due.
    ///
    /// Returns `None` when no run is due. Failures for one client are logged
    /// and counted without stopping the run.
    #[instrument(skip(self), fields(actor = %actor), err)]
    pub async fn run_if_due(
        &self,
        today: NaiveDate,
        actor: EmployeeId,
    ) -> BillingResult<Option<BatchReport>> {
        if !self.is_due(today) {
            tracing::debug!(%today, "no invoice run due");
            return Ok(None);
        }
        self.run(today, actor).await.map(Some)
    }

    pub async fn run(&self, today: NaiveDate, actor: EmployeeId) -> BillingResult<BatchReport> {
        let end = today.and_time(NaiveTime::MIN).and_utc();
        let start = end - self.window;

        let clients = self.records.list_client_ids().await?;
        tracing::info!(client_count = clients.len(), %start, %end, "starting invoice run");

        let mut report = BatchReport::default();
        for client_id in clients {
            match self.assembler.generate_invoice(client_id, start, end, actor).await {
                Ok(generated) => {
                    report.generated += 1;
                    tracing::info!(
                        %client_id,
                        invoice_number = %generated.invoice.invoice_number,
                        warning_count = generated.warning_count,
                        "invoice generated in run"
                    );
                }
                Err(
                    err @ (BillingError::NoSender(_)
                    | BillingError::NoContracts(_)
                    | BillingError::NoBillableItems(_)),
                ) => {
                    report.skipped += 1;
                    tracing::debug!(%client_id, reason = %err, "client skipped in run");
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::error!(%client_id, error = %err, "failed to generate invoice in run");
                }
            }
        }

        tracing::info!(
            generated = report.generated,
            skipped = report.skipped,
            failed = report.failed,
            "invoice run finished"
        );
        Ok(report)
    }
}
