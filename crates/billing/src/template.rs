//! Sender invoice templates: which client/contract fields get printed.

use serde::{Deserialize, Serialize};

use carebill_core::{DomainError, DomainResult};

use crate::care::{ClientDetails, Contract};
use crate::invoice::ExtraContent;

/// Printed date format, day first.
pub const TEMPLATE_DATE_FORMAT: &str = "%d-%m-%Y";

/// A source column a template item can print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    ClientDateOfBirth,
    ClientFilenumber,
    ContractFinancingAct,
    ContractFinancingOption,
}

impl TemplateSource {
    /// Resolve a `(source_table, source_column)` pair; unknown pairs print nothing.
    pub fn from_columns(table: &str, column: &str) -> Option<Self> {
        match (table, column) {
            ("client_details", "date_of_birth") => Some(Self::ClientDateOfBirth),
            ("client_details", "filenumber") => Some(Self::ClientFilenumber),
            ("contract", "financing_act") => Some(Self::ContractFinancingAct),
            ("contract", "financing_option") => Some(Self::ContractFinancingOption),
            _ => None,
        }
    }

    pub fn reads_client_details(&self) -> bool {
        matches!(self, Self::ClientDateOfBirth | Self::ClientFilenumber)
    }
}

/// One entry of a sender's template; `description` is the printed label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateItem {
    pub description: String,
    pub source: TemplateSource,
}

/// Render template items against the client's details and the contract.
///
/// Missing optional values render as empty strings.
pub fn render_template_items(
    items: &[TemplateItem],
    client: Option<&ClientDetails>,
    contract: Option<&Contract>,
) -> DomainResult<ExtraContent> {
    let mut rendered = ExtraContent::new();
    for item in items {
        let value = if item.source.reads_client_details() {
            let client = client
                .ok_or_else(|| DomainError::validation("no client details found for invoice template"))?;
            match item.source {
                TemplateSource::ClientDateOfBirth => client
                    .date_of_birth
                    .map(|dob| dob.format(TEMPLATE_DATE_FORMAT).to_string())
                    .unwrap_or_default(),
                _ => client.filenumber.clone().unwrap_or_default(),
            }
        } else {
            let contract = contract
                .ok_or_else(|| DomainError::validation("no contract found for invoice template"))?;
            match item.source {
                TemplateSource::ContractFinancingAct => {
                    contract.financing_act.clone().unwrap_or_default()
                }
                _ => contract.financing_option.clone().unwrap_or_default(),
            }
        };
        rendered.insert(item.description.clone(), value);
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use carebill_core::ClientId;
    use chrono::NaiveDate;

    fn item(description: &str, source: TemplateSource) -> TemplateItem {
        TemplateItem {
            description: description.to_string(),
            source,
        }
    }

    #[test]
    fn renders_client_fields() {
        let client = ClientDetails {
            client_id: ClientId::from_raw(1),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 2, 14),
            filenumber: Some("F-0042".to_string()),
        };
        let items = vec![
            item("Geboortedatum", TemplateSource::ClientDateOfBirth),
            item("Dossiernummer", TemplateSource::ClientFilenumber),
        ];

        let rendered = render_template_items(&items, Some(&client), None).unwrap();

        assert_eq!(rendered["Geboortedatum"], "14-02-1990");
        assert_eq!(rendered["Dossiernummer"], "F-0042");
    }

    #[test]
    fn missing_source_record_is_an_error() {
        let items = vec![item("Wet", TemplateSource::ContractFinancingAct)];
        assert!(render_template_items(&items, None, None).is_err());
        assert!(render_template_items(&[], None, None).unwrap().is_empty());
    }

    #[test]
    fn resolves_known_columns_only() {
        assert_eq!(
            TemplateSource::from_columns("contract", "financing_option"),
            Some(TemplateSource::ContractFinancingOption)
        );
        assert_eq!(TemplateSource::from_columns("contract", "price"), None);
    }
}
