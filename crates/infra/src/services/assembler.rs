//! Invoice generation for a client over a date window.
//!
//! ```text
//! generate_invoice(client, start, end)
//!   ↓
//! 1. Validate input (nothing is read yet)
//!   ↓
//! 2. Resolve sender and contracts (fatal when missing)
//!   ↓
//! 3. Prefetch periods and appointments per contract (failures become values)
//!   ↓
//! 4. assemble() — pure fold into lines, totals and warnings
//!   ↓
//! 5. Render template items (best-effort)
//!   ↓
//! 6. One transaction: allocate number, insert invoice, commit
//! ```

use chrono::{DateTime, Utc};
use tracing::{instrument, Span};

use carebill_billing::{
    assemble, Assembly, Contract, ContractInput, ExtraContent, Invoice, InvoiceStatus,
    InvoiceType, NewInvoice, PeriodInput, Sender,
};
use carebill_core::{ClientId, ContractId, DomainError, EmployeeId};

use super::numbering::InvoiceNumberAllocator;
use crate::care_records::CareRecords;
use crate::clock::Clock;
use crate::config::BillingConfig;
use crate::error::{BillingError, BillingResult};
use crate::invoice_store::InvoiceStore;
use crate::query::Pagination;

/// A freshly generated invoice and the warnings raised while assembling it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedInvoice {
    pub invoice: Invoice,
    pub warning_count: u32,
    pub warnings: Vec<String>,
}

pub struct InvoiceAssembler<R, S, C> {
    records: R,
    store: S,
    clock: C,
    config: BillingConfig,
    numbers: InvoiceNumberAllocator,
}

impl<R, S, C> InvoiceAssembler<R, S, C>
where
    R: CareRecords,
    S: InvoiceStore,
    C: Clock,
{
    pub fn new(records: R, store: S, clock: C, config: BillingConfig) -> Self {
        Self {
            records,
            store,
            clock,
            config,
            numbers: InvoiceNumberAllocator,
        }
    }

    /// Bill every contract of `client_id` for `[start, end)`.
    ///
    /// Per-contract and per-period failures are reported as warnings; the
    /// invoice is still issued for every contract that priced. Missing sender,
    /// contracts or billable items are fatal and leave no trace in the store.
    #[instrument(
        skip(self),
        fields(client_id = %client_id, actor = %actor, invoice_number = tracing::field::Empty, warning_count = tracing::field::Empty),
        err
    )]
    pub async fn generate_invoice(
        &self,
        client_id: ClientId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        actor: EmployeeId,
    ) -> BillingResult<GeneratedInvoice> {
        if !client_id.is_valid() {
            return Err(DomainError::invalid_id(format!(
                "client id must be positive, got {client_id}"
            ))
            .into());
        }
        if end < start {
            return Err(DomainError::validation("end date cannot be before start date").into());
        }

        let sender = self
            .records
            .client_sender(client_id)
            .await?
            .ok_or(BillingError::NoSender(client_id))?;

        let contracts = self
            .records
            .list_client_contracts(client_id, Pagination::first(self.config.contract_page_limit))
            .await?;
        let Some(first_contract) = contracts.first() else {
            return Err(BillingError::NoContracts(client_id));
        };
        let first_contract_id = first_contract.id;

        let mut inputs = Vec::with_capacity(contracts.len());
        for contract in contracts {
            inputs.push(self.contract_input(client_id, contract, start, end).await);
        }

        let assembly = assemble(&inputs);
        for warning in assembly.warnings() {
            tracing::warn!(%client_id, warning, "invoice assembly warning");
        }
        if assembly.is_empty() {
            return Err(BillingError::NoBillableItems(client_id));
        }

        let extra_content = self.extra_content(client_id, &sender, first_contract_id).await;
        let invoice = self.persist(client_id, &sender, &assembly, extra_content, actor).await?;

        let span = Span::current();
        span.record("invoice_number", invoice.invoice_number.as_str());
        span.record("warning_count", assembly.warning_count);
        tracing::info!(
            invoice_id = %invoice.id,
            total_amount = %invoice.total_amount,
            line_count = assembly.lines.len(),
            "invoice generated"
        );

        Ok(GeneratedInvoice {
            invoice,
            warning_count: assembly.warning_count,
            warnings: assembly.warnings().map(str::to_string).collect(),
        })
    }

    async fn contract_input(
        &self,
        client_id: ClientId,
        contract: Contract,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ContractInput {
        let periods = match self
            .records
            .billable_periods_for_contract(contract.id, start, end)
            .await
        {
            Ok(periods) => periods,
            Err(err) => {
                return ContractInput {
                    contract,
                    periods: Err(err.to_string()),
                };
            }
        };

        let mut resolved = Vec::with_capacity(periods.len());
        for period in periods {
            if contract.care_type.bills_appointments() {
                let appointments = self
                    .records
                    .appointments_starting_in_range(client_id, period.start, period.end)
                    .await
                    .map_err(|err| err.to_string());
                resolved.push(PeriodInput::with_appointments(period, appointments));
            } else {
                resolved.push(PeriodInput::elapsed(period));
            }
        }

        ContractInput {
            contract,
            periods: Ok(resolved),
        }
    }

    async fn extra_content(
        &self,
        client_id: ClientId,
        sender: &Sender,
        contract_id: ContractId,
    ) -> ExtraContent {
        match self
            .records
            .invoice_template_items(client_id, contract_id, sender.id)
            .await
        {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(%client_id, sender_id = %sender.id, error = %err, "failed to render invoice template items");
                ExtraContent::new()
            }
        }
    }

    async fn persist(
        &self,
        client_id: ClientId,
        sender: &Sender,
        assembly: &Assembly,
        extra_content: ExtraContent,
        actor: EmployeeId,
    ) -> BillingResult<Invoice> {
        let today = self.clock.today();
        let invoice = NewInvoice {
            client_id,
            sender_id: sender.id,
            issue_date: today,
            due_date: today + self.config.invoice_due(),
            status: InvoiceStatus::Outstanding,
            invoice_type: InvoiceType::Standard,
            total_amount: assembly.total,
            details: assembly.lines.clone(),
            warning_count: i32::try_from(assembly.warning_count).unwrap_or(i32::MAX),
            extra_content,
            original_invoice_id: None,
        };
        invoice.validate()?;

        let mut tx = self.store.begin(actor).await?;
        let number = self.numbers.allocate(&mut *tx, today).await?;
        let stored = tx.insert_invoice(&number, &invoice).await?;
        tx.commit().await?;
        Ok(stored)
    }
}
