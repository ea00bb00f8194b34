use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use carebill_billing::{Appointment, BillablePeriod, Contract, ExtraContent, Sender};
use carebill_core::{ClientId, ContractId, SenderId};

use crate::error::StoreError;
use crate::query::Pagination;

/// Read access to the care data owned by the surrounding platform:
/// senders, contracts, billable periods, appointments and invoice templates.
#[async_trait]
pub trait CareRecords: Send + Sync {
    /// The sender invoices for this client are addressed to, if any.
    async fn client_sender(&self, client_id: ClientId) -> Result<Option<Sender>, StoreError>;

    async fn list_client_contracts(
        &self,
        client_id: ClientId,
        page: Pagination,
    ) -> Result<Vec<Contract>, StoreError>;

    /// Periods of a contract owed within `[window_start, window_end)`.
    async fn billable_periods_for_contract(
        &self,
        contract_id: ContractId,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<BillablePeriod>, StoreError>;

    /// Appointments of a client starting within `[start, end)`.
    async fn appointments_starting_in_range(
        &self,
        client_id: ClientId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Printable values of the sender's invoice template for this client and contract.
    async fn invoice_template_items(
        &self,
        client_id: ClientId,
        contract_id: ContractId,
        sender_id: SenderId,
    ) -> Result<ExtraContent, StoreError>;

    /// Every client with at least one contract.
    async fn list_client_ids(&self) -> Result<Vec<ClientId>, StoreError>;
}

#[async_trait]
impl<S> CareRecords for Arc<S>
where
    S: CareRecords + ?Sized,
{
    async fn client_sender(&self, client_id: ClientId) -> Result<Option<Sender>, StoreError> {
        (**self).client_sender(client_id).await
    }

    async fn list_client_contracts(
        &self,
        client_id: ClientId,
        page: Pagination,
    ) -> Result<Vec<Contract>, StoreError> {
        (**self).list_client_contracts(client_id, page).await
    }

    async fn billable_periods_for_contract(
        &self,
        contract_id: ContractId,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<BillablePeriod>, StoreError> {
        (**self)
            .billable_periods_for_contract(contract_id, window_start, window_end)
            .await
    }

    async fn appointments_starting_in_range(
        &self,
        client_id: ClientId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        (**self)
            .appointments_starting_in_range(client_id, start, end)
            .await
    }

    async fn invoice_template_items(
        &self,
        client_id: ClientId,
        contract_id: ContractId,
        sender_id: SenderId,
    ) -> Result<ExtraContent, StoreError> {
        (**self)
            .invoice_template_items(client_id, contract_id, sender_id)
            .await
    }

    async fn list_client_ids(&self) -> Result<Vec<ClientId>, StoreError> {
        (**self).list_client_ids().await
    }
}

/// The part of a contract's lifetime that falls inside a billing window.
pub fn clip_to_window(
    contract: &Contract,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Option<BillablePeriod> {
    let start = contract.start_date.max(window_start);
    let end = contract.end_date.unwrap_or(window_end).min(window_end);
    (start < end).then(|| BillablePeriod::new(start, end))
}
