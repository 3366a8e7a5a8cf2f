use crate::comparison::RankedContract;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============ Stored Records ============

/// A contract level as stored in the collection.
///
/// Only the fields the service reads are typed; anything else the extraction
/// produced is kept in `extra` so records round-trip unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    /// Unique key, required for deletion.
    #[serde(default)]
    pub level_id: String,
    #[serde(default)]
    pub insurer: String,
    #[serde(default)]
    pub contract_name: String,
    #[serde(default)]
    pub level_name: String,
    /// `{category: {guarantee_id: raw_value}}`.
    #[serde(default)]
    pub benefits: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============ API Responses ============

/// Response of `POST /compare`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareResponse {
    /// Markdown table as returned by the model.
    pub table: String,
    /// Rows parsed out of `table`; empty when the reply is not a table.
    pub rows: Vec<RankedContract>,
}

/// Response of `DELETE /api/contracts/delete/:level_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contract_record_keeps_unknown_fields() {
        let raw = json!({
            "level_id": "acme-n1",
            "insurer": "Acme",
            "contract_name": "Santé",
            "level_name": "Niveau 1",
            "benefits": { "optique": { "verres_complexes": "300€" } },
            "date_effet": "2024-01-01"
        });

        let record: ContractRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.level_id, "acme-n1");
        assert_eq!(record.extra["date_effet"], "2024-01-01");
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
    }
}
