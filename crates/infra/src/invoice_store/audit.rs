//! Audit entry construction shared by the store implementations.

use serde::Serialize;
use serde_json::Value as JsonValue;

use carebill_billing::Invoice;

use crate::error::StoreError;

/// JSON snapshot of a row for the audit trail.
pub(crate) fn snapshot<T: Serialize>(value: &T) -> Result<JsonValue, StoreError> {
    serde_json::to_value(value)
        .map_err(|e| StoreError::Serialization(format!("failed to snapshot audit values: {e}")))
}

/// Top-level fields whose values differ between two invoice snapshots.
pub(crate) fn changed_fields(before: &JsonValue, after: &JsonValue) -> Vec<String> {
    let (Some(before), Some(after)) = (before.as_object(), after.as_object()) else {
        return Vec::new();
    };
    let mut fields: Vec<String> = after
        .iter()
        .filter(|(key, value)| before.get(key.as_str()) != Some(*value))
        .map(|(key, _)| key.clone())
        .chain(
            before
                .keys()
                .filter(|key| !after.contains_key(key.as_str()))
                .cloned(),
        )
        .collect();
    fields.sort();
    fields
}

/// Snapshot pair and changed fields for an invoice write.
pub(crate) fn invoice_change(
    before: Option<&Invoice>,
    after: Option<&Invoice>,
) -> Result<(Option<JsonValue>, Option<JsonValue>, Vec<String>), StoreError> {
    let old = before.map(snapshot).transpose()?;
    let new = after.map(snapshot).transpose()?;
    let fields = match (&old, &new) {
        (Some(old), Some(new)) => changed_fields(old, new),
        (None, Some(JsonValue::Object(map))) | (Some(JsonValue::Object(map)), None) => {
            let mut keys: Vec<String> = map.keys().cloned().collect();
            keys.sort();
            keys
        }
        _ => Vec::new(),
    };
    Ok((old, new, fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reports_changed_and_removed_fields() {
        let before = json!({"status": "outstanding", "total_amount": "10", "warning_count": 0});
        let after = json!({"status": "paid", "total_amount": "10"});
        assert_eq!(changed_fields(&before, &after), vec!["status", "warning_count"]);
    }
}
