use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use carebill_billing::{
    render_template_items, Appointment, BillablePeriod, ClientDetails, Contract, ExtraContent,
    Sender, TemplateItem,
};
use carebill_core::{ClientId, ContractId, SenderId};

use super::r#trait::{clip_to_window, CareRecords};
use crate::error::StoreError;
use crate::query::Pagination;

#[derive(Debug, Default)]
struct CareTables {
    senders: HashMap<ClientId, Sender>,
    contracts: Vec<Contract>,
    periods: HashMap<ContractId, Vec<BillablePeriod>>,
    appointments: HashMap<ClientId, Vec<Appointment>>,
    client_details: HashMap<ClientId, ClientDetails>,
    templates: HashMap<SenderId, Vec<TemplateItem>>,
    failing_period_lookups: HashSet<ContractId>,
    failing_appointment_lookups: HashSet<ClientId>,
    failing_templates: bool,
}

/// In-memory care data.
///
/// Intended for tests/dev. Contracts without explicitly registered periods
/// resolve to their lifetime clipped to the billing window; lookups can be
/// made to fail to exercise partial-failure paths.
#[derive(Debug, Default)]
pub struct InMemoryCareRecords {
    tables: RwLock<CareTables>,
}

impl InMemoryCareRecords {
    pub fn new() -> Self {
        Self::default()
    }

    fn write<F: FnOnce(&mut CareTables)>(&self, f: F) {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut tables);
    }

    fn read<T, F: FnOnce(&CareTables) -> T>(&self, f: F) -> Result<T, StoreError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(f(&tables))
    }

    pub fn set_sender(&self, client_id: ClientId, sender: Sender) {
        self.write(|t| {
            t.senders.insert(client_id, sender);
        });
    }

    pub fn add_contract(&self, contract: Contract) {
        self.write(|t| t.contracts.push(contract));
    }

    /// Register explicit periods, overriding the contract-lifetime default.
    pub fn set_periods(&self, contract_id: ContractId, periods: Vec<BillablePeriod>) {
        self.write(|t| {
            t.periods.insert(contract_id, periods);
        });
    }

    pub fn add_appointment(&self, client_id: ClientId, appointment: Appointment) {
        self.write(|t| t.appointments.entry(client_id).or_default().push(appointment));
    }

    pub fn set_client_details(&self, details: ClientDetails) {
        self.write(|t| {
            t.client_details.insert(details.client_id, details);
        });
    }

    pub fn set_template(&self, sender_id: SenderId, items: Vec<TemplateItem>) {
        self.write(|t| {
            t.templates.insert(sender_id, items);
        });
    }

    pub fn fail_period_lookup(&self, contract_id: ContractId) {
        self.write(|t| {
            t.failing_period_lookups.insert(contract_id);
        });
    }

    pub fn fail_appointment_lookup(&self, client_id: ClientId) {
        self.write(|t| {
            t.failing_appointment_lookups.insert(client_id);
        });
    }

    pub fn fail_template_items(&self) {
        self.write(|t| t.failing_templates = true);
    }
}

#[async_trait]
impl CareRecords for InMemoryCareRecords {
    async fn client_sender(&self, client_id: ClientId) -> Result<Option<Sender>, StoreError> {
        self.read(|t| t.senders.get(&client_id).cloned())
    }

    async fn list_client_contracts(
        &self,
        client_id: ClientId,
        page: Pagination,
    ) -> Result<Vec<Contract>, StoreError> {
        self.read(|t| {
            let mut contracts: Vec<Contract> = t
                .contracts
                .iter()
                .filter(|c| c.client_id == client_id)
                .cloned()
                .collect();
            contracts.sort_by_key(|c| c.id);
            page.window(&contracts)
        })
    }

    async fn billable_periods_for_contract(
        &self,
        contract_id: ContractId,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<BillablePeriod>, StoreError> {
        self.read(|t| {
            if t.failing_period_lookups.contains(&contract_id) {
                return Err(StoreError::Backend(format!(
                    "billable period lookup failed for contract {contract_id}"
                )));
            }
            if let Some(periods) = t.periods.get(&contract_id) {
                return Ok(periods
                    .iter()
                    .filter(|p| p.start < window_end && p.end > window_start)
                    .map(|p| BillablePeriod::new(p.start.max(window_start), p.end.min(window_end)))
                    .collect());
            }
            Ok(t.contracts
                .iter()
                .find(|c| c.id == contract_id)
                .and_then(|c| clip_to_window(c, window_start, window_end))
                .into_iter()
                .collect())
        })?
    }

    async fn appointments_starting_in_range(
        &self,
        client_id: ClientId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.read(|t| {
            if t.failing_appointment_lookups.contains(&client_id) {
                return Err(StoreError::Backend(format!(
                    "appointment lookup failed for client {client_id}"
                )));
            }
            let mut found: Vec<Appointment> = t
                .appointments
                .get(&client_id)
                .map(|all| {
                    all.iter()
                        .filter(|a| a.start >= start && a.start < end)
                        .copied()
                        .collect()
                })
                .unwrap_or_default();
            found.sort_by_key(|a| a.start);
            Ok(found)
        })?
    }

    async fn invoice_template_items(
        &self,
        client_id: ClientId,
        contract_id: ContractId,
        sender_id: SenderId,
    ) -> Result<ExtraContent, StoreError> {
        self.read(|t| {
            if t.failing_templates {
                return Err(StoreError::Backend("template lookup failed".to_string()));
            }
            let Some(items) = t.templates.get(&sender_id) else {
                return Err(StoreError::NotFound(format!(
                    "no invoice template found for sender {sender_id}"
                )));
            };
            let contract = t.contracts.iter().find(|c| c.id == contract_id);
            render_template_items(items, t.client_details.get(&client_id), contract)
                .map_err(StoreError::from)
        })?
    }

    async fn list_client_ids(&self) -> Result<Vec<ClientId>, StoreError> {
        self.read(|t| {
            t.contracts
                .iter()
                .map(|c| c.client_id)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carebill_billing::{CareType, PriceTimeUnit};
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()
    }

    fn contract(id: i64, client: i64, start_offset_days: i64) -> Contract {
        Contract {
            id: ContractId::from_raw(id),
            client_id: ClientId::from_raw(client),
            care_type: CareType::Accommodation,
            price: Decimal::from(100),
            price_time_unit: Some(PriceTimeUnit::Daily),
            vat: Decimal::from(21),
            start_date: test_time() + Duration::days(start_offset_days),
            end_date: None,
            hours: None,
            hours_type: None,
            financing_act: Some("WLZ".to_string()),
            financing_option: None,
        }
    }

    #[tokio::test]
    async fn default_period_is_contract_lifetime_clipped_to_window() {
        let records = InMemoryCareRecords::new();
        records.add_contract(contract(1, 9, 10));

        let periods = records
            .billable_periods_for_contract(
                ContractId::from_raw(1),
                test_time(),
                test_time() + Duration::days(28),
            )
            .await
            .unwrap();

        assert_eq!(
            periods,
            vec![BillablePeriod::new(
                test_time() + Duration::days(10),
                test_time() + Duration::days(28)
            )]
        );
    }

    #[tokio::test]
    async fn contracts_starting_after_window_have_no_period() {
        let records = InMemoryCareRecords::new();
        records.add_contract(contract(1, 9, 40));

        let periods = records
            .billable_periods_for_contract(
                ContractId::from_raw(1),
                test_time(),
                test_time() + Duration::days(28),
            )
            .await
            .unwrap();
        assert!(periods.is_empty());
    }

    #[tokio::test]
    async fn lists_distinct_clients() {
        let records = InMemoryCareRecords::new();
        records.add_contract(contract(1, 9, 0));
        records.add_contract(contract(2, 9, 0));
        records.add_contract(contract(3, 4, 0));

        let ids = records.list_client_ids().await.unwrap();
        assert_eq!(ids, vec![ClientId::from_raw(4), ClientId::from_raw(9)]);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_backend_errors() {
        let records = InMemoryCareRecords::new();
        records.add_contract(contract(1, 9, 0));
        records.fail_period_lookup(ContractId::from_raw(1));

        let err = records
            .billable_periods_for_contract(ContractId::from_raw(1), test_time(), test_time())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
