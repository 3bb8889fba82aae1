//! Tier-keyed strategy documents.
//!
//! A document is a JSON object mapping tier name to tier record. Tier
//! record values are held as raw JSON so a field that is not being patched
//! is re-encoded exactly as it was read, including fields this crate does
//! not know about. Keys are kept sorted, which makes the encoding canonical.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{StrategyError, StrategyResult};

/// Well-known, overridable fields of a tier record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyField {
    CreateStrategy,
    DeleteStrategy,
    ServiceUpdates,
}

impl StrategyField {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyField::CreateStrategy => "createStrategy",
            StrategyField::DeleteStrategy => "deleteStrategy",
            StrategyField::ServiceUpdates => "serviceUpdates",
        }
    }
}

impl fmt::Display for StrategyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tier's strategy record: field name → raw JSON value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierStrategy {
    fields: BTreeMap<String, Box<RawValue>>,
}

impl PartialEq for TierStrategy {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va.get() == vb.get())
    }
}

impl TierStrategy {
    /// Raw JSON text of a field, if present.
    pub fn raw(&self, field: StrategyField) -> Option<&str> {
        self.fields.get(field.as_str()).map(|v| v.get())
    }

    /// Decode a well-known field. `tier` is only used for error context.
    pub fn get<T: DeserializeOwned>(
        &self,
        tier: &str,
        field: StrategyField,
    ) -> StrategyResult<Option<T>> {
        match self.fields.get(field.as_str()) {
            Some(raw) => serde_json::from_str(raw.get()).map(Some).map_err(|source| {
                StrategyError::MalformedField {
                    tier: tier.to_string(),
                    field: field.as_str(),
                    source,
                }
            }),
            None => Ok(None),
        }
    }

    /// Replace a field with an already-encoded value.
    pub fn set_raw(&mut self, field: StrategyField, value: Box<RawValue>) {
        self.fields.insert(field.as_str().to_string(), value);
    }

    /// Serialize `value` and store it under `field`.
    pub fn set<T: Serialize>(&mut self, field: StrategyField, value: &T) -> StrategyResult<()> {
        let raw = serde_json::value::to_raw_value(value)?;
        self.set_raw(field, raw);
        Ok(())
    }

    /// Names of every field present, known or not.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// A decoded strategy document for one resource kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyDocument {
    tiers: BTreeMap<String, TierStrategy>,
}

impl StrategyDocument {
    /// Decode the document stored under `key`.
    pub fn decode(key: &str, text: &str) -> StrategyResult<Self> {
        serde_json::from_str(text).map_err(|source| StrategyError::MalformedDocument {
            key: key.to_string(),
            source,
        })
    }

    /// Canonical JSON encoding (sorted tiers and fields, compact).
    pub fn encode(&self) -> StrategyResult<String> {
        Ok(serde_json::to_string(&self.tiers)?)
    }

    pub fn tier(&self, name: &str) -> Option<&TierStrategy> {
        self.tiers.get(name)
    }

    /// The named tier, inserting an empty record if absent.
    pub fn tier_or_default(&mut self, name: &str) -> &mut TierStrategy {
        self.tiers.entry(name.to_string()).or_default()
    }

    pub fn insert_tier(&mut self, name: &str, tier: TierStrategy) {
        self.tiers.insert(name.to_string(), tier);
    }

    pub fn tier_names(&self) -> impl Iterator<Item = &str> {
        self.tiers.keys().map(String::as_str)
    }

    pub(crate) fn tiers_mut(&mut self) -> impl Iterator<Item = (&String, &mut TierStrategy)> {
        self.tiers.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "production": {
            "region": "eu-west-1",
            "createStrategy": {"PreferredBackupWindow": "03:01-04:01",  "EngineVersion": "13"},
            "deleteStrategy": {},
            "serviceUpdates": ["a"]
        },
        "development": {"createStrategy": {}, "deleteStrategy": {}}
    }"#;

    #[test]
    fn decodes_tiers_and_fields() {
        let doc = StrategyDocument::decode("postgres", DOC).unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(
            doc.tier_names().collect::<Vec<_>>(),
            vec!["development", "production"]
        );

        let prod = doc.tier("production").unwrap();
        let updates: Vec<String> = prod
            .get("production", StrategyField::ServiceUpdates)
            .unwrap()
            .unwrap();
        assert_eq!(updates, vec!["a"]);
        assert!(prod.field_names().any(|f| f == "region"));
    }

    #[test]
    fn raw_values_keep_their_text() {
        let doc = StrategyDocument::decode("postgres", DOC).unwrap();
        let prod = doc.tier("production").unwrap();
        assert_eq!(
            prod.raw(StrategyField::CreateStrategy),
            Some(r#"{"PreferredBackupWindow": "03:01-04:01",  "EngineVersion": "13"}"#)
        );

        let encoded = doc.encode().unwrap();
        assert!(encoded.contains(r#""EngineVersion": "13""#));
        assert!(encoded.contains(r#""region":"eu-west-1""#));
    }

    #[test]
    fn encoding_is_canonical() {
        let doc = StrategyDocument::decode("postgres", DOC).unwrap();
        let encoded = doc.encode().unwrap();
        let again = StrategyDocument::decode("postgres", &encoded).unwrap();
        assert_eq!(again.encode().unwrap(), encoded);
        assert_eq!(again, doc);
    }

    #[test]
    fn rejects_non_tier_documents() {
        for bad in ["", "[]", r#"{"production": 3}"#, "{not json"] {
            let err = StrategyDocument::decode("redis", bad).unwrap_err();
            assert!(
                matches!(err, StrategyError::MalformedDocument { ref key, .. } if key == "redis"),
                "expected malformed for {bad:?}"
            );
        }
    }

    #[test]
    fn malformed_field_reports_tier() {
        let doc =
            StrategyDocument::decode("redis", r#"{"production": {"serviceUpdates": 7}}"#).unwrap();
        let err = doc
            .tier("production")
            .unwrap()
            .get::<Vec<String>>("production", StrategyField::ServiceUpdates)
            .unwrap_err();
        assert!(matches!(
            err,
            StrategyError::MalformedField { field: "serviceUpdates", .. }
        ));
    }
}
